pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Call routes: provider ingest + viewer hydration + manual trigger
    let call_routes = Router::new()
        .route(
            "/transcript",
            post(routes::call::ingest_transcript).get(routes::call::recent_transcripts),
        )
        .route(
            "/suggestion",
            post(routes::call::request_suggestion).get(routes::call::recent_suggestions),
        );

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api/call/{call_id}", call_routes)
        .merge(health)
        .route("/ws", get(ws::handler::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
