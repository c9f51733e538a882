//! HTTP API endpoints for room management.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::state::AppState;
use crate::types::SessionSnapshot;

/// Routes under `/api`
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/rooms", get(list_rooms).post(create_room))
        .route("/api/rooms/{room_id}", get(get_room))
}

/// List all open rooms.
///
/// GET /api/rooms
pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<SessionSnapshot>> {
    Json(state.room_snapshots().await)
}

/// Open a new room.
///
/// POST /api/rooms
pub async fn create_room(State(state): State<Arc<AppState>>) -> Response {
    let session = state.create_room().await;
    (StatusCode::CREATED, Json(session.snapshot().await)).into_response()
}

/// GET /api/rooms/{room_id}
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Response {
    match state.get_room(&room_id.to_uppercase()).await {
        Some(session) => Json(session.snapshot().await).into_response(),
        None => (StatusCode::NOT_FOUND, format!("Room {} not found", room_id)).into_response(),
    }
}
