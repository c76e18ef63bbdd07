//! Prediction serving
//!
//! A thin web form over the published artifacts: one page, one predict
//! endpoint, one health check. The fitted preprocessor, selection, and
//! model load once into an immutable context shared across requests.

mod error;
mod handlers;
mod state;

pub use error::ServingError;
pub use state::ServingContext;

use crate::config::ServingConfig;
use axum::{
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the application router over a loaded serving context
pub fn create_router(ctx: Arc<ServingContext>) -> Router {
    Router::new()
        .route("/", get(handlers::index).post(handlers::predict))
        .route("/health", get(handlers::health))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
}

/// Serve the prediction form until interrupted
pub async fn run_server(config: ServingConfig, ctx: Arc<ServingContext>) -> anyhow::Result<()> {
    let app = create_router(ctx);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "prediction form listening");

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C signal handler");
        info!("shutdown signal received, stopping server");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("server shut down cleanly");
    Ok(())
}
