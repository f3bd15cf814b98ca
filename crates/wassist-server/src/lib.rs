pub mod routes;
pub mod state;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("wassist-server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
