//! Server configuration from environment variables

use std::path::PathBuf;
use std::str::FromStr;

use crate::types::GameConfig;

pub const DEFAULT_PORT: u16 = 6574;
pub const DEFAULT_QUESTIONS_PATH: &str = "data/questions.json";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Question bank seed file
    pub questions_path: PathBuf,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            questions_path: PathBuf::from(DEFAULT_QUESTIONS_PATH),
            game: GameConfig::default(),
        }
    }
}

/// Read and parse `key`, keeping `default` when unset or malformed
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Invalid value '{}' for {}, using {}", raw, key, default);
                default
            }
        },
        Err(_) => default,
    }
}

impl ServerConfig {
    /// Load config from `BLUFF_*` environment variables
    pub fn from_env() -> Self {
        let defaults = GameConfig::default();

        let game = GameConfig {
            tick_ms: match env_or("BLUFF_TICK_MS", defaults.tick_ms) {
                0 => {
                    tracing::warn!("BLUFF_TICK_MS must be positive, using {}", defaults.tick_ms);
                    defaults.tick_ms
                }
                ms => ms,
            },
            starting_ticks: env_or("BLUFF_STARTING_TICKS", defaults.starting_ticks),
            category_ticks: env_or("BLUFF_CATEGORY_TICKS", defaults.category_ticks),
            showing_ticks: env_or("BLUFF_SHOWING_TICKS", defaults.showing_ticks),
            two_ticks: env_or("BLUFF_TWO_TICKS", defaults.two_ticks),
            lie_ticks: env_or("BLUFF_LIE_TICKS", defaults.lie_ticks),
            three_ticks: env_or("BLUFF_THREE_TICKS", defaults.three_ticks),
            guess_ticks: env_or("BLUFF_GUESS_TICKS", defaults.guess_ticks),
            score_ticks: env_or("BLUFF_SCORE_TICKS", defaults.score_ticks),
            finish_ticks: env_or("BLUFF_FINISH_TICKS", defaults.finish_ticks),
            min_players: env_or("BLUFF_MIN_PLAYERS", defaults.min_players).max(1),
            ..defaults
        };

        let questions_path = std::env::var("BLUFF_QUESTIONS")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_QUESTIONS_PATH));

        let config = Self {
            port: env_or("BLUFF_PORT", DEFAULT_PORT),
            questions_path,
            game,
        };

        tracing::info!(
            port = config.port,
            tick_ms = config.game.tick_ms,
            min_players = config.game.min_players,
            "Server config loaded"
        );
        config
    }
}
