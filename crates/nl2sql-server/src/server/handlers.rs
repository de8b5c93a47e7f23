use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nl2sql_core::{
    database::Row,
    record::{ConnectionRecord, RecordError},
    storage::ConfigStore,
    workflow::Outcome,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::{ApiError, AppState, Configured};

type ApiResult<T> = Result<T, ApiError>;

#[instrument(skip_all)]
pub async fn health(State(state): State<AppState>, Configured(record): Configured) -> Response {
    match state.db.check(&record).await {
        Ok(()) => Json(json!({
            "status": "healthy",
            "message": "API and database connection are working",
            "database": "connected",
        }))
        .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "unhealthy",
                "message": format!("Database connection failed: {err}"),
                "database": "disconnected",
            })),
        )
            .into_response(),
    }
}

/// Validate, test and store a new connection record.
#[instrument(skip_all)]
pub async fn configure_database(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let record = ConnectionRecord::from_json(&body).map_err(|err| match err {
        RecordError::MissingFields { .. } => ApiError::MissingFields,
        RecordError::Invalid(reason) => {
            ApiError::BadRequest(format!("Failed to connect to database: {reason}"))
        }
    })?;

    state
        .db
        .check(&record)
        .await
        .map_err(|err| ApiError::BadRequest(format!("Failed to connect to database: {err}")))?;

    state.gate.store().save(&record).await?;
    info!(host = %record.host, database = %record.database, "database configuration saved");

    Ok(Json(json!({
        "message": "Database configuration saved successfully",
        "status": "success",
    })))
}

#[instrument(skip_all)]
pub async fn schema(
    State(state): State<AppState>,
    Configured(record): Configured,
) -> ApiResult<Json<Value>> {
    let schema = state
        .db
        .schema(&record)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    if schema.is_empty() {
        return Err(ApiError::Internal("Failed to fetch schema".into()));
    }

    Ok(Json(json!({
        "schema": schema.column_map(),
        "status": "success",
    })))
}

#[derive(Debug)]
struct ConvertRequest {
    query: String,
    execute: bool,
}

impl ConvertRequest {
    /// `query` must be a non-empty string. `execute` is optional and read by
    /// truthiness, so `"true"` and `1` ask for execution while `null`, `false`,
    /// `0` and `""` do not.
    fn from_body(body: &[u8]) -> ApiResult<Self> {
        let body: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        let query = body
            .get("query")
            .and_then(Value::as_str)
            .filter(|query| !query.is_empty())
            .ok_or_else(|| ApiError::BadRequest("Missing query in request body".into()))?;
        Ok(Self {
            query: query.to_string(),
            execute: body.get("execute").is_some_and(truthy),
        })
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub original_query: String,
    pub sql_query: String,
    pub is_safe: bool,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<Row>>,
}

/// Translate a question to SQL, review it, and optionally run it.
#[instrument(skip_all)]
pub async fn convert(
    State(state): State<AppState>,
    Configured(record): Configured,
    body: Bytes,
) -> ApiResult<Json<ConvertResponse>> {
    let request = ConvertRequest::from_body(&body)?;

    let schema = state
        .db
        .schema(&record)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    if schema.is_empty() {
        return Err(ApiError::Internal("Failed to fetch database schema".into()));
    }

    let result = state
        .workflow
        .run(&request.query, &schema.to_ddl())
        .await
        .map_err(|err| ApiError::Internal(format!("{err:#}")))?;

    let results = match (request.execute, result.outcome()) {
        (true, Outcome::Success) => Some(
            state
                .db
                .execute(&record, &result.sql_query)
                .await
                .map_err(|err| ApiError::Execution {
                    message: err.to_string(),
                    sql_query: result.sql_query.clone(),
                })?,
        ),
        _ => None,
    };

    let response = match result.outcome() {
        Outcome::Success => ConvertResponse {
            original_query: request.query,
            sql_query: result.sql_query,
            is_safe: true,
            status: "success",
            warnings: None,
            suggested_fix: None,
            results,
        },
        Outcome::Warning => ConvertResponse {
            original_query: request.query,
            sql_query: result.recommended_sql().to_string(),
            is_safe: false,
            status: "warning",
            warnings: Some(result.error_message.clone()),
            suggested_fix: Some(result.suggested_fix.clone()),
            results,
        },
    };
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_follows_truthiness() {
        let parse = |body: &str| ConvertRequest::from_body(body.as_bytes()).expect("request");
        assert!(parse(r#"{"query":"x","execute":"true"}"#).execute);
        assert!(parse(r#"{"query":"x","execute":1}"#).execute);
        assert!(!parse(r#"{"query":"x","execute":0}"#).execute);
        assert!(!parse(r#"{"query":"x","execute":null}"#).execute);
        assert!(!parse(r#"{"query":"x"}"#).execute);
    }

    #[test]
    fn query_must_be_a_non_empty_string() {
        for body in [r#"{"query":""}"#, r#"{"query":5}"#, r#"{"execute":true}"#, "not json"] {
            assert!(matches!(
                ConvertRequest::from_body(body.as_bytes()),
                Err(ApiError::BadRequest(_))
            ));
        }
    }
}
