mod room;

use crate::messenger::Hub;
use crate::questions::QuestionSource;
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::game::Session;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<RoomId, Arc<Session>>>>,
    /// Outbound routing to every open WebSocket
    pub hub: Arc<Hub>,
    pub questions: Arc<dyn QuestionSource>,
    pub config: GameConfig,
}

impl AppState {
    pub fn new(questions: Arc<dyn QuestionSource>, config: GameConfig) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            hub: Arc::new(Hub::new()),
            questions,
            config,
        }
    }
}
