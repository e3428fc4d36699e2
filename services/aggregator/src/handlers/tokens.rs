use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;

use crate::error::ApiError;
use crate::models::{
    HealthResponse, RefreshResponse, TokenQueryParams, TokenResponse, TokensResponse, WsInfo,
    WsInfoResponse,
};
use crate::service::TokenLookup;
use crate::state::AppState;

/// `GET /api/tokens`: filtered, sorted, paginated dataset view.
///
/// "No data yet" renders as an empty result set, never as an error.
pub async fn list_tokens(
    State(state): State<AppState>,
    Query(params): Query<TokenQueryParams>,
) -> Result<Json<TokensResponse>, ApiError> {
    let (filters, sort, pagination) = params.into_parts()?;
    let page = state.service.get_tokens(&filters, &sort, &pagination).await;
    Ok(Json(TokensResponse::from_page(page)))
}

/// `GET /api/tokens/:address`: single record by normalized address.
pub async fn get_token(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<TokenResponse>, ApiError> {
    match state.service.get_token(&address).await {
        TokenLookup::Found(record) => Ok(Json(TokenResponse::new(record))),
        TokenLookup::NotFound => Err(ApiError::NotFound(address)),
        TokenLookup::NoSnapshot => Err(ApiError::NoSnapshot),
    }
}

/// `POST /api/refresh`: synchronously run one refresh cycle.
pub async fn refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    let outcome = state.service.refresh().await;
    Json(RefreshResponse::from_outcome(outcome))
}

/// `GET /health`: liveness plus store reachability.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = if state.store.ping().await {
        "connected"
    } else {
        "unreachable"
    };
    Json(HealthResponse {
        status: "healthy",
        store,
        connected_sessions: state.hub.session_count(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// `GET /api/websocket`: connection info for socket clients.
pub async fn websocket_info(State(state): State<AppState>) -> Json<WsInfoResponse> {
    Json(WsInfoResponse {
        success: true,
        data: WsInfo {
            path: "/ws",
            connected_clients: state.hub.session_count(),
            message_types: vec!["subscribe", "update-filters", "ping"],
        },
    })
}

/// `GET /metrics`: counter export.
pub async fn metrics(State(state): State<AppState>) -> Json<BTreeMap<String, u64>> {
    Json(state.metrics.export())
}
