//! WebSocket message dispatch
//!
//! Resolves the participant's room through the hub, then forwards the request
//! to that room's session. Replies meant only for the sender are returned;
//! everything else goes out through the messenger.

use crate::error::GameError;
use crate::protocol::{ClientMessage, PlayerInput, ServerMessage};
use crate::state::AppState;
use crate::types::*;
use std::sync::Arc;

use crate::game::Session;

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    participant: &ParticipantId,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Join { room_id, nickname } => {
            handle_join(state, participant, room_id, nickname).await
        }
        ClientMessage::Start => handle_start(state, participant).await,
        ClientMessage::Input { input } => handle_input(state, participant, input).await,
        ClientMessage::Leave => {
            leave_room(state, participant).await;
            None
        }
    }
}

/// Client-facing form of a session error
pub fn error_message(err: &GameError) -> ServerMessage {
    ServerMessage::Error {
        code: err.code().to_string(),
        msg: err.to_string(),
    }
}

fn not_in_room() -> ServerMessage {
    ServerMessage::Error {
        code: "NOT_IN_ROOM".to_string(),
        msg: "Join a room first".to_string(),
    }
}

async fn current_session(
    state: &Arc<AppState>,
    participant: &ParticipantId,
) -> Option<Arc<Session>> {
    let room_id = state.hub.room_of(participant).await?;
    state.get_room(&room_id).await
}

async fn handle_join(
    state: &Arc<AppState>,
    participant: &ParticipantId,
    room_id: Option<RoomId>,
    nickname: String,
) -> Option<ServerMessage> {
    if let Some(room) = state.hub.room_of(participant).await {
        return Some(ServerMessage::Error {
            code: "ALREADY_JOINED".to_string(),
            msg: format!("Already in room {}", room),
        });
    }

    match state
        .join_room(room_id.as_deref(), participant, &nickname)
        .await
    {
        Ok((session, player)) => Some(ServerMessage::Joined {
            room_id: session.room_id().clone(),
            player,
        }),
        Err(e) => {
            tracing::warn!("Join from {} rejected: {}", participant, e);
            Some(error_message(&e))
        }
    }
}

async fn handle_start(state: &Arc<AppState>, participant: &ParticipantId) -> Option<ServerMessage> {
    let Some(session) = current_session(state, participant).await else {
        return Some(not_in_room());
    };

    match session.start().await {
        Ok(()) => Some(ServerMessage::Started),
        Err(e) => {
            tracing::warn!("Start in room {} refused: {}", session.room_id(), e);
            Some(error_message(&e))
        }
    }
}

async fn handle_input(
    state: &Arc<AppState>,
    participant: &ParticipantId,
    input: PlayerInput,
) -> Option<ServerMessage> {
    let Some(session) = current_session(state, participant).await else {
        return Some(not_in_room());
    };

    match session.input(participant, input).await {
        Ok(()) => Some(ServerMessage::InputAccepted),
        Err(e) => {
            tracing::warn!("Input from {} rejected: {}", participant, e);
            Some(error_message(&e))
        }
    }
}

/// Take a participant out of their room; closes the room when it empties
pub async fn leave_room(state: &Arc<AppState>, participant: &ParticipantId) {
    let Some(room_id) = state.hub.room_of(participant).await else {
        return;
    };

    if let Some(session) = state.get_room(&room_id).await {
        if let Err(e) = session.on_disconnect(participant).await {
            tracing::error!("Failed to announce departure from {}: {}", room_id, e);
            session.abort(&e.to_string()).await;
        }
    }
    state.hub.unbind(participant).await;
    state.remove_room_if_empty(&room_id).await;
}
