use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PROTOCOL_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a room (created on demand when `room_id` is unknown or missing)
    Join {
        room_id: Option<RoomId>,
        nickname: String,
    },
    Start,
    Input {
        input: PlayerInput,
    },
    Leave,
}

/// Player input for whichever input phase is active
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerInput {
    Category { index: usize },
    Lie { text: String },
    Guess { index: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        participant_id: ParticipantId,
        server_now: String,
    },
    Joined {
        room_id: RoomId,
        player: PlayerSummary,
    },
    /// Membership list; the joiner gets everyone, others get the refreshed list
    Players {
        list: Vec<PlayerSummary>,
    },
    PlayerLeft {
        participant_id: ParticipantId,
    },
    Phase {
        state: GameState,
        ticks: u32,
        server_now: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<PhaseData>,
    },
    /// A player submitted their input for the active phase
    Ready {
        participant_id: ParticipantId,
    },
    InputAccepted,
    Started,
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn phase(state: GameState, ticks: u32, data: Option<PhaseData>) -> Self {
        ServerMessage::Phase {
            state,
            ticks,
            server_now: chrono::Utc::now().to_rfc3339(),
            data,
        }
    }
}

/// Phase-specific payload of a phase-change notice
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseData {
    /// Sent privately: the categories this player may choose from
    Categories { list: Vec<String> },
    /// Sent privately: the player's own question including the truth
    OwnQuestion { question: String, answer: String },
    /// The current player's question, answer redacted
    Question {
        current_player_id: ParticipantId,
        question: String,
    },
    /// Anonymized lies plus the truth, in shuffled order
    Slate {
        current_player_id: ParticipantId,
        answers: Vec<String>,
    },
    Scores {
        current_player_id: ParticipantId,
        score: BTreeMap<ParticipantId, u32>,
        total: BTreeMap<ParticipantId, u32>,
        matrix: BTreeMap<String, MatrixRow>,
    },
    /// Final totals at the end of a full rotation
    Standings { total: BTreeMap<ParticipantId, u32> },
    Reset { reason: String },
}
