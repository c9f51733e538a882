//! Round orchestration for one room.
//!
//! A [`Session`] owns the player table of its room and, while a game runs, a
//! single driver task that walks the phase table in `fsm.rs`. Input handlers
//! run concurrently with the driver; both go through the session locks,
//! always acquired in the order state → players → round.

mod driver;
mod fsm;
mod input;
pub mod registry;
pub mod score;
pub mod shuffle;

use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::error::{GameError, Rejection};
use crate::messenger::Messenger;
use crate::protocol::{PhaseData, ServerMessage};
use crate::questions::QuestionSource;
use crate::types::*;
use registry::PlayerRegistry;
use shuffle::Slate;

/// Data of the turn in progress
#[derive(Debug, Clone)]
struct RoundState {
    current_id: ParticipantId,
    question: Question,
    slate: Option<Slate>,
}

pub struct Session {
    room_id: RoomId,
    config: GameConfig,
    questions: Arc<dyn QuestionSource>,
    messenger: Arc<dyn Messenger>,
    state: RwLock<GameState>,
    players: RwLock<PlayerRegistry>,
    round: RwLock<Option<RoundState>>,
    /// Stop signal of the running game, replaced on every launch
    stop: Mutex<CancellationToken>,
}

impl Session {
    pub fn new(
        room_id: RoomId,
        config: GameConfig,
        questions: Arc<dyn QuestionSource>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            room_id,
            config,
            questions,
            messenger,
            state: RwLock::new(GameState::Waiting),
            players: RwLock::new(PlayerRegistry::new()),
            round: RwLock::new(None),
            stop: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub async fn state(&self) -> GameState {
        *self.state.read().await
    }

    pub async fn is_empty(&self) -> bool {
        self.players.read().await.is_empty()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        let players = self.players.read().await;
        SessionSnapshot {
            room_id: self.room_id.clone(),
            state: *state,
            current_player_id: players.current_id(),
            players: players.summaries(),
        }
    }

    /// Add a player to the room. Only possible between games.
    pub async fn join(
        &self,
        participant: ParticipantId,
        nickname: &str,
    ) -> Result<PlayerSummary, GameError> {
        let (summary, list) = {
            let state = self.state.read().await;
            if *state != GameState::Waiting {
                return Err(Rejection::GameInProgress.into());
            }
            let mut players = self.players.write().await;
            let summary = players
                .join(participant, nickname, &mut rand::rng())?
                .summary();
            (summary, players.summaries())
        };

        tracing::info!(
            "Player {} ({}) joined room {}",
            summary.name,
            summary.id,
            self.room_id
        );
        self.messenger
            .broadcast(&self.room_id, ServerMessage::Players { list })
            .await?;
        Ok(summary)
    }

    /// Launch a game: WAITING → STARTING, then hand over to a driver task
    pub async fn start(self: &Arc<Self>) -> Result<(), GameError> {
        let token = CancellationToken::new();
        let transition = match self.begin(&token, GameEvent::Launch).await {
            Ok(transition) => transition,
            Err(GameError::InvalidTransition { .. }) => {
                return Err(Rejection::GameInProgress.into())
            }
            Err(e) => return Err(e),
        };

        let have = self.players.read().await.len();
        if have < self.config.min_players {
            return Err(Rejection::NotEnoughPlayers {
                needed: self.config.min_players,
                have,
            }
            .into());
        }

        *self.stop.lock().await = token.clone();
        self.commit(transition, self.config.starting_ticks, None)
            .await?;

        tracing::info!("Game started in room {} with {} players", self.room_id, have);
        let session = Arc::clone(self);
        tokio::spawn(async move { session.run(token).await });
        Ok(())
    }

    /// Remove a departed participant. The last one out stops the game.
    pub async fn on_disconnect(&self, participant: &ParticipantId) -> Result<(), GameError> {
        let list = {
            let mut state = self.state.write().await;
            let mut players = self.players.write().await;
            let Some(player) = players.leave(participant) else {
                return Ok(());
            };
            tracing::info!("Player {} left room {}", player.name, self.room_id);

            if players.is_empty() {
                self.stop.lock().await.cancel();
                *self.round.write().await = None;
                if *state != GameState::Waiting {
                    tracing::info!("Room {} is empty, resetting to WAITING", self.room_id);
                }
                *state = GameState::Waiting;
                return Ok(());
            }
            players.summaries()
        };

        self.messenger
            .broadcast(
                &self.room_id,
                ServerMessage::PlayerLeft {
                    participant_id: participant.clone(),
                },
            )
            .await?;
        self.messenger
            .broadcast(&self.room_id, ServerMessage::Players { list })
            .await?;
        Ok(())
    }

    /// Stop the running game (if any) and return to WAITING
    pub async fn abort(&self, reason: &str) {
        let token = self.stop.lock().await.clone();
        self.force_reset(&token, reason).await;
    }

    /// Forced reset: the game in progress is dropped along with its totals.
    /// A no-op when `token` was already cancelled by someone else.
    async fn force_reset(&self, token: &CancellationToken, reason: &str) {
        let mut state = self.state.write().await;
        if token.is_cancelled() {
            return;
        }
        token.cancel();

        self.players.write().await.restart();
        *self.round.write().await = None;
        *state = GameState::Waiting;
        tracing::warn!("Room {} reset to WAITING: {}", self.room_id, reason);

        let notice = ServerMessage::phase(
            GameState::Waiting,
            0,
            Some(PhaseData::Reset {
                reason: reason.to_string(),
            }),
        );
        if let Err(e) = self.messenger.broadcast(&self.room_id, notice).await {
            tracing::error!("Failed to announce reset of room {}: {}", self.room_id, e);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::messenger::DeliveryError;
    use crate::questions::QuestionBank;
    use async_trait::async_trait;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Target {
        One(ParticipantId),
        Room(RoomId),
    }

    /// Messenger that keeps everything it was asked to deliver
    #[derive(Default)]
    pub struct RecordingMessenger {
        pub sent: std::sync::Mutex<Vec<(Target, ServerMessage)>>,
        pub fail_pushes: std::sync::atomic::AtomicBool,
    }

    impl RecordingMessenger {
        pub fn messages(&self) -> Vec<(Target, ServerMessage)> {
            self.sent.lock().unwrap().clone()
        }

        /// States of all phase broadcasts so far, in order
        pub fn phases(&self) -> Vec<GameState> {
            self.messages()
                .into_iter()
                .filter_map(|(target, msg)| match (target, msg) {
                    (Target::Room(_), ServerMessage::Phase { state, .. }) => Some(state),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn push_to(
            &self,
            participant: &ParticipantId,
            msg: ServerMessage,
        ) -> Result<(), DeliveryError> {
            if self.fail_pushes.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(DeliveryError::Closed(participant.clone()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((Target::One(participant.clone()), msg));
            Ok(())
        }

        async fn broadcast(&self, room: &RoomId, msg: ServerMessage) -> Result<(), DeliveryError> {
            self.sent
                .lock()
                .unwrap()
                .push((Target::Room(room.clone()), msg));
            Ok(())
        }
    }

    /// Millisecond ticks; input windows long enough to end early on readiness
    pub fn fast_config() -> GameConfig {
        GameConfig {
            tick_ms: 2,
            starting_ticks: 1,
            category_ticks: 2000,
            showing_ticks: 1,
            two_ticks: 1,
            lie_ticks: 2000,
            three_ticks: 1,
            guess_ticks: 2000,
            score_ticks: 1,
            finish_ticks: 1,
            ..GameConfig::default()
        }
    }

    pub fn session(config: GameConfig) -> (Arc<Session>, Arc<RecordingMessenger>) {
        session_with(config, Arc::new(QuestionBank::sample()))
    }

    pub fn session_with(
        config: GameConfig,
        questions: Arc<dyn QuestionSource>,
    ) -> (Arc<Session>, Arc<RecordingMessenger>) {
        let messenger = Arc::new(RecordingMessenger::default());
        let session = Arc::new(Session::new(
            "ROOM1".to_string(),
            config,
            questions,
            messenger.clone(),
        ));
        (session, messenger)
    }

    /// Poll until the session settles in `state`
    pub async fn wait_for_state(session: &Session, state: GameState) {
        for _ in 0..2000 {
            if session.state().await == state {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        panic!("session never reached {:?}", state);
    }
}
