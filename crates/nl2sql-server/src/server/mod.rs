//! HTTP API: routing, shared state and the configuration gate extractor.

mod error;
mod handlers;

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, Method},
    routing::{get, post},
    Router,
};
use color_eyre::Result;
use nl2sql_core::{
    database::Database, gate::AccessGate, record::ConnectionRecord, storage::ConfigStore,
    workflow::{SqlAgent, Workflow},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

pub use error::ApiError;

/// Handles shared by every request. The store is reached only through the gate.
#[derive(Clone)]
pub struct AppState {
    pub gate: AccessGate,
    pub db: Arc<dyn Database>,
    pub workflow: Workflow,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        db: Arc<dyn Database>,
        agent: Arc<dyn SqlAgent>,
    ) -> Self {
        Self {
            gate: AccessGate::new(store),
            db,
            workflow: Workflow::new(agent),
        }
    }
}

/// Extractor that admits a request only when a connection record is stored.
/// The record is read fresh for every request.
pub struct Configured(pub ConnectionRecord);

impl FromRequestParts<AppState> for Configured {
    type Rejection = ApiError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let record = state.gate.require().await?;
        Ok(Configured(record))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/database/config", post(handlers::configure_database))
        .route("/api/v1/schema", get(handlers::schema))
        .route("/api/v1/convert", post(handlers::convert))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let agent = state.workflow.agent_name();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, agent, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
