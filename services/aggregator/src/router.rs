use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{tokens, ws};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/tokens", get(tokens::list_tokens))
        .route("/tokens/:address", get(tokens::get_token))
        .route("/refresh", post(tokens::refresh))
        .route("/websocket", get(tokens::websocket_info));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(tokens::health))
        .route("/metrics", get(tokens::metrics))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
