use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque ID types for type safety
pub type RoomId = String;
pub type ParticipantId = String;

/// Matrix key used for the slot holding the true answer
pub const TRUTH_KEY: &str = "truth";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    Waiting,
    Starting,
    One,
    InputCategory,
    ShowingChoice,
    Two,
    InputLieText,
    Three,
    InputTrueOption,
    Score,
    Finish,
    Reset,
}

impl GameState {
    /// Whether players may submit input while the session is in this state
    pub fn accepts_input(&self) -> bool {
        matches!(
            self,
            GameState::InputCategory | GameState::InputLieText | GameState::InputTrueOption
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameEvent {
    Launch,
    StartOne,
    Input,
    StartShowChoice,
    StartTwo,
    StartThree,
    StartScore,
    StartFinish,
    StartRepeat,
    StartReset,
}

/// Timing and sizing knobs for one game session.
///
/// Every timed phase waits for a number of ticks; readiness is re-checked once per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub tick_ms: u64,
    pub starting_ticks: u32,
    pub category_ticks: u32,
    pub showing_ticks: u32,
    pub two_ticks: u32,
    pub lie_ticks: u32,
    pub three_ticks: u32,
    pub guess_ticks: u32,
    pub score_ticks: u32,
    pub finish_ticks: u32,
    pub categories_per_player: usize,
    pub min_players: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            starting_ticks: 5,
            category_ticks: 30,
            showing_ticks: 5,
            two_ticks: 5,
            lie_ticks: 30,
            three_ticks: 5,
            guess_ticks: 30,
            score_ticks: 10,
            finish_ticks: 5,
            categories_per_player: 5,
            min_players: 2,
        }
    }
}

impl GameConfig {
    /// Length of one tick, never shorter than a millisecond
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    /// Wall-clock length of a phase lasting `ticks` ticks
    pub fn span(&self, ticks: u32) -> Duration {
        self.tick().saturating_mul(ticks)
    }
}

/// A trivia question with its true answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub category: String,
    pub text: String,
    pub answer: String,
}

/// Who authored an entry of the shuffled slate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOwner {
    Truth,
    Player(ParticipantId),
}

impl SlotOwner {
    /// Key of this owner in the answer matrix
    pub fn key(&self) -> &str {
        match self {
            SlotOwner::Truth => TRUTH_KEY,
            SlotOwner::Player(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerSlot {
    pub text: String,
    pub owner: SlotOwner,
}

/// One row of the reveal matrix: the slot text and everyone who picked it
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MatrixRow {
    pub text: String,
    pub picked_by: Vec<ParticipantId>,
}

/// Public view of a player (no answers, no question)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerSummary {
    pub id: ParticipantId,
    pub name: String,
    pub icon: String,
    pub total_score: u32,
    pub ready: bool,
}

/// Point-in-time view of a session for observers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub room_id: RoomId,
    pub state: GameState,
    pub current_player_id: Option<ParticipantId>,
    pub players: Vec<PlayerSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_tick_is_clamped() {
        let config = GameConfig {
            tick_ms: 0,
            ..GameConfig::default()
        };
        assert_eq!(config.tick(), Duration::from_millis(1));
        assert_eq!(config.span(5), Duration::from_millis(5));
    }

    #[test]
    fn test_huge_span_saturates() {
        let config = GameConfig {
            tick_ms: u64::MAX,
            ..GameConfig::default()
        };
        assert_eq!(config.span(u32::MAX), Duration::MAX);
    }
}
