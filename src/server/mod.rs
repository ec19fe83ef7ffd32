mod catalog_routes;
pub mod state;
mod sync_routes;

pub use state::ServerState;

use anyhow::Result;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    hash: String,
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        hash: state.hash.clone(),
    })
}

pub fn make_app(state: ServerState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/sync/trigger", post(sync_routes::trigger_sync))
        .route("/v1/sync/status", get(sync_routes::sync_status))
        .route("/v1/sync/history", get(sync_routes::sync_history))
        .route("/v1/albums", get(catalog_routes::list_albums))
        .route("/v1/albums/{id}", get(catalog_routes::get_album))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(state: ServerState, port: u16) -> Result<()> {
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Listening on port {}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}
