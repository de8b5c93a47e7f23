use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nl2sql_core::{gate::GateError, record::REQUIRED_FIELDS, storage::StoreError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors returned by HTTP handlers, rendered as `{error, status: "error", ..}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Database not configured")]
    NotConfigured,
    #[error("Missing required fields")]
    MissingFields,
    #[error("{0}")]
    BadRequest(String),
    #[error("Query execution failed: {message}")]
    Execution { message: String, sql_query: String },
    #[error("{0}")]
    Internal(String),
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::NotConfigured => ApiError::NotConfigured,
            GateError::Storage(err) => err.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            ApiError::NotConfigured => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "status": "error", "code": "DB_NOT_CONFIGURED" }),
            ),
            ApiError::MissingFields => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "required_fields": REQUIRED_FIELDS, "status": "error" }),
            ),
            ApiError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "status": "error" }),
            ),
            ApiError::Execution { sql_query, .. } => {
                error!(%message, "query execution failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": message, "sql_query": sql_query, "status": "error" }),
                )
            }
            ApiError::Internal(_) => {
                error!(%message, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": message, "status": "error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
