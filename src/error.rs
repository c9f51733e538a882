use crate::messenger::DeliveryError;
use crate::questions::QuestionError;
use crate::types::{GameEvent, GameState};

/// Errors raised by a game session
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Invalid transition: {event:?} is not allowed in {state:?}")]
    InvalidTransition { state: GameState, event: GameEvent },

    #[error("Input rejected: {0}")]
    InputRejected(#[from] Rejection),

    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Question data unavailable: {0}")]
    DataUnavailable(#[from] QuestionError),

    #[error("No player left to take a turn")]
    RotationExhausted,

    #[error("Session was stopped")]
    Interrupted,
}

impl GameError {
    /// Machine-readable code sent to clients alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            GameError::InvalidTransition { .. } => "INVALID_TRANSITION",
            GameError::InputRejected(rejection) => rejection.code(),
            GameError::Delivery(_) => "DELIVERY_FAILED",
            GameError::DataUnavailable(_) => "DATA_UNAVAILABLE",
            GameError::RotationExhausted => "ROTATION_EXHAUSTED",
            GameError::Interrupted => "INTERRUPTED",
        }
    }
}

/// Why a participant's request was refused. Never changes session state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("input already sent")]
    AlreadyReady,

    #[error("not accepting this input in {0:?}")]
    NotAccepting(GameState),

    #[error("index {index} out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },

    #[error("input must not be empty")]
    EmptyText,

    #[error("a lie must differ from your own answer")]
    RepeatsTruth,

    #[error("you cannot pick your own lie")]
    OwnLie,

    #[error("the current player does not guess")]
    CurrentPlayer,

    #[error("unknown participant")]
    UnknownPlayer,

    #[error("participant already joined")]
    AlreadyJoined,

    #[error("nickname must not be empty")]
    EmptyNickname,

    #[error("game already in progress")]
    GameInProgress,

    #[error("room is full")]
    RoomFull,

    #[error("need at least {needed} players, have {have}")]
    NotEnoughPlayers { needed: usize, have: usize },
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::AlreadyReady => "ALREADY_READY",
            Rejection::NotAccepting(_) => "NOT_ACCEPTING",
            Rejection::OutOfRange { .. } => "OUT_OF_RANGE",
            Rejection::EmptyText => "EMPTY_TEXT",
            Rejection::RepeatsTruth => "REPEATS_TRUTH",
            Rejection::OwnLie => "OWN_LIE",
            Rejection::CurrentPlayer => "CURRENT_PLAYER",
            Rejection::UnknownPlayer => "UNKNOWN_PLAYER",
            Rejection::AlreadyJoined => "ALREADY_JOINED",
            Rejection::EmptyNickname => "EMPTY_NICKNAME",
            Rejection::GameInProgress => "GAME_IN_PROGRESS",
            Rejection::RoomFull => "ROOM_FULL",
            Rejection::NotEnoughPlayers { .. } => "NOT_ENOUGH_PLAYERS",
        }
    }
}
