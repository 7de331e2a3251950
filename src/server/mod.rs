// HTTP surface: /health, /generate, /predict

mod handlers;
pub mod types;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::pipeline::InferencePipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<InferencePipeline>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/generate", post(handlers::generate))
        .route("/predict", post(handlers::predict))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(bind_address: &str, pipeline: Arc<InferencePipeline>) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("invalid bind address '{bind_address}'"))?;

    let app = create_router(AppState { pipeline });

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
