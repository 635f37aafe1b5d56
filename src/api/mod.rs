//! HTTP and websocket surface.
//!
//! ## Endpoints
//!
//! - `POST /projects` - submit a brief (multipart field `file`)
//! - `GET /projects/{id}` - run status and its tasks
//! - `GET /projects/{id}/raw` - persisted raw decomposition
//! - `GET /projects/{id}/query?q=..&k=..` - search the run's index
//! - `GET /tasks` - every known task
//! - `GET /health` - liveness probe
//! - `GET /ws/tasks` - live task snapshot feed

mod error;
mod routes;
mod ws;

pub use error::ApiError;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::core::{ArtifactStore, ServerConfig, TaskRegistry};
use crate::hub::NotificationHub;
use crate::index::ContextRetriever;
use crate::workflow::IntakePipeline;

/// Shared state of the HTTP handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Arc<TaskRegistry>,
    pub hub: Arc<NotificationHub>,
    pub intake: IntakePipeline,
    pub retriever: ContextRetriever,
    pub artifacts: ArtifactStore,
}

/// Build the application router.
pub fn router(state: Arc<AppState>, cors_permissive: bool) -> Router {
    let app = Router::new()
        .route("/projects", post(routes::submit_project))
        .route("/projects/{id}", get(routes::get_project))
        .route("/projects/{id}/raw", get(routes::get_raw))
        .route("/projects/{id}/query", get(routes::query_project))
        .route("/tasks", get(routes::list_tasks))
        .route("/health", get(routes::health))
        .route("/ws/tasks", get(ws::handler))
        .with_state(state);

    if cors_permissive {
        app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    } else {
        app
    }
}

/// Bind and serve until Ctrl+C.
pub async fn serve(state: Arc<AppState>, config: &ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    let listener = TcpListener::bind(addr).await.with_context(|| format!("Failed to bind {addr}"))?;
    info!("AgentFlow listening on http://{}", addr);

    axum::serve(listener, router(state, config.cors_permissive))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
