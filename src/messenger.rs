//! Outbound delivery: push to one participant or broadcast to a room.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};

use crate::protocol::ServerMessage;
use crate::types::{ParticipantId, RoomId};

/// Per-connection sender for outbound messages
pub type ParticipantSender = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("participant {0} is not connected")]
    UnknownParticipant(ParticipantId),

    #[error("connection of participant {0} is closed")]
    Closed(ParticipantId),
}

/// Delivery collaborator used by game sessions
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn push_to(
        &self,
        participant: &ParticipantId,
        msg: ServerMessage,
    ) -> Result<(), DeliveryError>;

    async fn broadcast(&self, room: &RoomId, msg: ServerMessage) -> Result<(), DeliveryError>;
}

struct Connection {
    room: Option<RoomId>,
    sender: ParticipantSender,
}

/// Routes messages to WebSocket connections, grouped by room
#[derive(Default)]
pub struct Hub {
    connections: RwLock<HashMap<ParticipantId, Connection>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted connection (not yet in any room)
    pub async fn register(&self, participant: ParticipantId, sender: ParticipantSender) {
        self.connections
            .write()
            .await
            .insert(participant, Connection { room: None, sender });
    }

    pub async fn unregister(&self, participant: &ParticipantId) {
        self.connections.write().await.remove(participant);
    }

    /// Attach a connection to a room so it receives that room's broadcasts
    pub async fn bind(&self, participant: &ParticipantId, room: &RoomId) -> bool {
        match self.connections.write().await.get_mut(participant) {
            Some(conn) => {
                conn.room = Some(room.clone());
                true
            }
            None => false,
        }
    }

    pub async fn unbind(&self, participant: &ParticipantId) {
        if let Some(conn) = self.connections.write().await.get_mut(participant) {
            conn.room = None;
        }
    }

    pub async fn room_of(&self, participant: &ParticipantId) -> Option<RoomId> {
        self.connections
            .read()
            .await
            .get(participant)
            .and_then(|c| c.room.clone())
    }
}

#[async_trait]
impl Messenger for Hub {
    async fn push_to(
        &self,
        participant: &ParticipantId,
        msg: ServerMessage,
    ) -> Result<(), DeliveryError> {
        let connections = self.connections.read().await;
        let conn = connections
            .get(participant)
            .ok_or_else(|| DeliveryError::UnknownParticipant(participant.clone()))?;

        conn.sender
            .send(msg)
            .map_err(|_| DeliveryError::Closed(participant.clone()))
    }

    async fn broadcast(&self, room: &RoomId, msg: ServerMessage) -> Result<(), DeliveryError> {
        let connections = self.connections.read().await;
        for (id, conn) in connections.iter() {
            if conn.room.as_ref() != Some(room) {
                continue;
            }
            // A socket closing mid-broadcast is cleaned up by its own task
            if conn.sender.send(msg.clone()).is_err() {
                tracing::debug!("Skipping closed connection {} in room {}", id, room);
            }
        }
        Ok(())
    }
}
