//! HTTP surface: an interactive form plus a JSON prediction endpoint.

mod api;
mod error;
mod handlers;
mod page;

pub use api::create_router;
pub use error::ServerError;

use crate::config::ServerConfig;
use crate::pipeline::FraudPipeline;
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared, read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<FraudPipeline>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(pipeline: Arc<FraudPipeline>) -> Self {
        Self {
            pipeline,
            started_at: chrono::Utc::now(),
        }
    }
}

/// Serve the form until ctrl+c
pub async fn run_server(config: &ServerConfig, pipeline: Arc<FraudPipeline>) -> anyhow::Result<()> {
    let state = AppState::new(pipeline);
    let started_at = state.started_at;
    let model = state.pipeline.model_name().to_string();
    let app = create_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(address = %addr, model = %model, "Fraud form available at http://{}/", addr);

    let shutdown_signal = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl+c, shutting down");
        }
        let uptime = chrono::Utc::now().signed_duration_since(started_at);
        info!(
            uptime_secs = uptime.num_seconds(),
            "Shutdown signal received, stopping server gracefully"
        );
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("server error")?;

    info!("Server shut down cleanly");
    Ok(())
}
