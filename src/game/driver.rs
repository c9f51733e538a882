use std::sync::Arc;
use tokio::sync::RwLockWriteGuard;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::score::score_round;
use super::shuffle::shuffle_answers;
use super::{RoundState, Session};
use crate::error::GameError;
use crate::protocol::{PhaseData, ServerMessage};
use crate::questions::QuestionError;
use crate::types::*;

/// A validated state change whose broadcast has not gone out yet.
///
/// Holds the state write lock, so no input is accepted until it is committed.
pub(super) struct Transition<'a> {
    guard: RwLockWriteGuard<'a, GameState>,
    to: GameState,
}

/// Which players a timed phase waits for
#[derive(Debug, Clone, Copy)]
enum Expect {
    /// Fixed-length phase
    Nobody,
    Everyone,
    EveryoneButCurrent,
}

impl Session {
    pub(super) async fn run(self: Arc<Self>, token: CancellationToken) {
        match self.drive(&token).await {
            Ok(()) => tracing::info!("Game in room {} finished", self.room_id),
            Err(GameError::Interrupted) => {
                tracing::info!("Game in room {} was stopped", self.room_id)
            }
            Err(e) => {
                tracing::error!("Game in room {} failed: {}", self.room_id, e);
                self.force_reset(&token, &e.to_string()).await;
            }
        }
    }

    async fn drive(&self, token: &CancellationToken) -> Result<(), GameError> {
        self.wait(token, self.config.starting_ticks, Expect::Nobody)
            .await?;

        self.deal_categories(token).await?;
        self.collect(token, self.config.category_ticks, Expect::Everyone)
            .await?;
        self.show_choice(token).await?;

        let mut event = GameEvent::StartTwo;
        loop {
            self.present_question(token, event).await?;
            self.collect(token, self.config.lie_ticks, Expect::EveryoneButCurrent)
                .await?;
            self.reveal_slate(token).await?;
            self.collect(token, self.config.guess_ticks, Expect::EveryoneButCurrent)
                .await?;
            self.score(token).await?;
            if !self.finish_turn(token).await? {
                break;
            }
            event = GameEvent::StartRepeat;
        }

        self.finish_game(token).await
    }

    /// Validate `event` against the current state and lock the state for the change
    pub(super) async fn begin(
        &self,
        token: &CancellationToken,
        event: GameEvent,
    ) -> Result<Transition<'_>, GameError> {
        let guard = self.state.write().await;
        if token.is_cancelled() {
            return Err(GameError::Interrupted);
        }
        let to = guard
            .next(event)
            .ok_or(GameError::InvalidTransition {
                state: *guard,
                event,
            })?;
        Ok(Transition { guard, to })
    }

    /// Announce the new state, then make it current
    pub(super) async fn commit(
        &self,
        transition: Transition<'_>,
        ticks: u32,
        data: Option<PhaseData>,
    ) -> Result<(), GameError> {
        let Transition { mut guard, to } = transition;
        self.messenger
            .broadcast(&self.room_id, ServerMessage::phase(to, ticks, data))
            .await?;
        tracing::info!("Room {}: {:?} -> {:?}", self.room_id, *guard, to);
        *guard = to;
        Ok(())
    }

    /// Sleep up to `ticks`, checking once per tick whether the expected
    /// players are all ready. The stop signal wins over everything.
    async fn wait(
        &self,
        token: &CancellationToken,
        ticks: u32,
        expect: Expect,
    ) -> Result<(), GameError> {
        let deadline = tokio::time::sleep(self.config.span(ticks));
        tokio::pin!(deadline);
        let mut interval = tokio::time::interval(self.config.tick());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => return Err(GameError::Interrupted),
                _ = &mut deadline => {
                    if !matches!(expect, Expect::Nobody) {
                        tracing::warn!("Room {}: input window timed out", self.room_id);
                    }
                    return Ok(());
                }
                _ = interval.tick() => {
                    let ready = match expect {
                        Expect::Nobody => false,
                        Expect::Everyone => self.players.read().await.all_ready(false),
                        Expect::EveryoneButCurrent => self.players.read().await.all_ready(true),
                    };
                    if ready {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Open an input window and keep it open until everyone expected answered
    async fn collect(
        &self,
        token: &CancellationToken,
        ticks: u32,
        expect: Expect,
    ) -> Result<(), GameError> {
        let transition = self.begin(token, GameEvent::Input).await?;
        self.players.write().await.reset_readiness();
        self.commit(transition, ticks, None).await?;
        self.wait(token, ticks, expect).await
    }

    /// ONE: deal every player a hand of categories
    async fn deal_categories(&self, token: &CancellationToken) -> Result<(), GameError> {
        let categories = self.questions.list_categories().await?;

        let transition = self.begin(token, GameEvent::StartOne).await?;
        let hands: Vec<(ParticipantId, Vec<String>)> = {
            let mut players = self.players.write().await;
            players.assign_categories(
                &categories,
                self.config.categories_per_player,
                &mut rand::rng(),
            );
            players
                .iter()
                .map(|p| (p.id.clone(), p.categories.clone()))
                .collect()
        };
        self.commit(transition, 0, None).await?;

        for (id, list) in hands {
            let msg = ServerMessage::phase(
                GameState::One,
                0,
                Some(PhaseData::Categories { list }),
            );
            self.messenger.push_to(&id, msg).await?;
        }
        Ok(())
    }

    /// SHOWING_CHOICE: fetch everyone's question and show it to its owner
    async fn show_choice(&self, token: &CancellationToken) -> Result<(), GameError> {
        let transition = self.begin(token, GameEvent::StartShowChoice).await?;
        let picks: Vec<(ParticipantId, String)> = {
            let players = self.players.read().await;
            players
                .members()
                .into_iter()
                .filter_map(|id| {
                    let player = players.get(&id)?;
                    let category = player.categories.get(player.category_index)?.clone();
                    Some((id, category))
                })
                .collect()
        };
        self.commit(transition, self.config.showing_ticks, None)
            .await?;

        for (id, category) in picks {
            let question = self.questions.fetch_by_category(&category).await?;
            tracing::debug!("Room {}: {} plays '{}'", self.room_id, id, category);

            let msg = ServerMessage::phase(
                GameState::ShowingChoice,
                self.config.showing_ticks,
                Some(PhaseData::OwnQuestion {
                    question: question.text.clone(),
                    answer: question.answer.clone(),
                }),
            );
            match self.players.write().await.get_mut(&id) {
                Some(player) => player.question = Some(question),
                None => continue,
            }
            self.messenger.push_to(&id, msg).await?;
        }

        self.wait(token, self.config.showing_ticks, Expect::Nobody)
            .await
    }

    /// TWO: the next player's question goes up, answer hidden
    async fn present_question(
        &self,
        token: &CancellationToken,
        event: GameEvent,
    ) -> Result<(), GameError> {
        let transition = self.begin(token, event).await?;
        let (current_id, question) = {
            let mut players = self.players.write().await;
            players.clear_round_fields();
            let current_id = players
                .rotate_current()
                .ok_or(GameError::RotationExhausted)?;
            let question = players
                .get(&current_id)
                .and_then(|p| p.question.clone())
                .ok_or_else(|| QuestionError::NotFound(format!("question of {}", current_id)))?;
            (current_id, question)
        };

        let data = PhaseData::Question {
            current_player_id: current_id.clone(),
            question: question.text.clone(),
        };
        *self.round.write().await = Some(RoundState {
            current_id,
            question,
            slate: None,
        });
        self.commit(transition, self.config.two_ticks, Some(data))
            .await?;

        self.wait(token, self.config.two_ticks, Expect::Nobody)
            .await
    }

    /// THREE: shuffle lies and truth into the slate everyone guesses from
    async fn reveal_slate(&self, token: &CancellationToken) -> Result<(), GameError> {
        let transition = self.begin(token, GameEvent::StartThree).await?;
        let (current_id, truth) = self.round_context().await?;

        let slate = {
            let mut players = self.players.write().await;
            shuffle_answers(&mut players, &current_id, &truth, &mut rand::rng())
        };
        let data = PhaseData::Slate {
            current_player_id: current_id,
            answers: slate.texts(),
        };
        if let Some(round) = self.round.write().await.as_mut() {
            round.slate = Some(slate);
        }
        self.commit(transition, self.config.three_ticks, Some(data))
            .await?;

        self.wait(token, self.config.three_ticks, Expect::Nobody)
            .await
    }

    /// SCORE: award points and reveal who picked what
    async fn score(&self, token: &CancellationToken) -> Result<(), GameError> {
        let transition = self.begin(token, GameEvent::StartScore).await?;
        let (current_id, slate) = {
            let round = self.round.read().await;
            let round = round.as_ref().ok_or(GameError::RotationExhausted)?;
            (round.current_id.clone(), round.slate.clone())
        };

        let data = {
            let mut players = self.players.write().await;
            let result = match &slate {
                Some(slate) => score_round(&players, slate, &current_id),
                None => Default::default(),
            };
            players.apply_scores(&result.deltas);
            players.clear_answers();
            PhaseData::Scores {
                current_player_id: current_id,
                score: result.deltas,
                total: players.totals(),
                matrix: result.matrix,
            }
        };
        self.commit(transition, self.config.score_ticks, Some(data))
            .await?;

        self.wait(token, self.config.score_ticks, Expect::Nobody)
            .await
    }

    /// FINISH: close the turn; returns whether another player is still due
    async fn finish_turn(&self, token: &CancellationToken) -> Result<bool, GameError> {
        let transition = self.begin(token, GameEvent::StartFinish).await?;
        self.players.write().await.finish_turn();
        *self.round.write().await = None;
        self.commit(transition, self.config.finish_ticks, None)
            .await?;

        self.wait(token, self.config.finish_ticks, Expect::Nobody)
            .await?;
        Ok(self.players.read().await.has_unused())
    }

    /// RESET: announce final standings and get the room ready for another game
    async fn finish_game(&self, token: &CancellationToken) -> Result<(), GameError> {
        let transition = self.begin(token, GameEvent::StartReset).await?;
        let total = self.players.read().await.totals();
        self.commit(transition, 0, Some(PhaseData::Standings { total }))
            .await?;

        let mut state = self.state.write().await;
        if token.is_cancelled() {
            return Err(GameError::Interrupted);
        }
        self.players.write().await.restart();
        *self.round.write().await = None;
        self.messenger
            .broadcast(
                &self.room_id,
                ServerMessage::phase(GameState::Waiting, 0, None),
            )
            .await?;
        *state = GameState::Waiting;
        Ok(())
    }

    async fn round_context(&self) -> Result<(ParticipantId, String), GameError> {
        self.round
            .read()
            .await
            .as_ref()
            .map(|r| (r.current_id.clone(), r.question.answer.clone()))
            .ok_or(GameError::RotationExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::questions::QuestionSource;
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;

    /// Lists categories it cannot serve
    struct HollowSource;

    #[async_trait]
    impl QuestionSource for HollowSource {
        async fn list_categories(&self) -> Result<Vec<String>, QuestionError> {
            Ok(vec!["Ghost".to_string()])
        }

        async fn fetch_by_category(&self, category: &str) -> Result<Question, QuestionError> {
            Err(QuestionError::NotFound(category.to_string()))
        }
    }

    /// Every window closes after a few ticks with nobody answering
    fn timeout_config() -> GameConfig {
        GameConfig {
            category_ticks: 3,
            lie_ticks: 3,
            guess_ticks: 3,
            ..fast_config()
        }
    }

    async fn start_with_two(session: &Arc<Session>) {
        session.join("a".into(), "Ann").await.unwrap();
        session.join("b".into(), "Ben").await.unwrap();
        session.start().await.unwrap();
    }

    #[tokio::test]
    async fn test_unanswered_game_runs_to_completion() {
        let (session, messenger) = session(timeout_config());
        start_with_two(&session).await;

        wait_for_state(&session, GameState::Waiting).await;

        use GameState::*;
        let turn = [Two, InputLieText, Three, InputTrueOption, Score, Finish];
        let mut expected = vec![Starting, One, InputCategory, ShowingChoice];
        expected.extend(turn);
        expected.extend(turn);
        expected.extend([Reset, Waiting]);
        assert_eq!(messenger.phases(), expected);

        // Nobody guessed, so nobody scored
        let scores: Vec<_> = messenger
            .messages()
            .into_iter()
            .filter_map(|(_, msg)| match msg {
                ServerMessage::Phase {
                    data: Some(PhaseData::Scores { score, .. }),
                    ..
                } => Some(score),
                _ => None,
            })
            .collect();
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().flat_map(|s| s.values()).all(|v| *v == 0));
    }

    #[tokio::test]
    async fn test_turn_slate_contains_placeholders() {
        let (session, messenger) = session(timeout_config());
        start_with_two(&session).await;
        wait_for_state(&session, GameState::Waiting).await;

        let slate = messenger
            .messages()
            .into_iter()
            .find_map(|(_, msg)| match msg {
                ServerMessage::Phase {
                    data: Some(PhaseData::Slate { answers, current_player_id }),
                    ..
                } => Some((answers, current_player_id)),
                _ => None,
            })
            .unwrap();

        assert_eq!(slate.1, "a");
        assert_eq!(slate.0.len(), 3);
        assert!(slate.0.contains(&"Ann's lie".to_string()));
        assert!(slate.0.contains(&"Ben's lie".to_string()));
    }

    #[tokio::test]
    async fn test_missing_question_resets_session() {
        let (session, messenger) = session_with(timeout_config(), Arc::new(HollowSource));
        start_with_two(&session).await;

        wait_for_state(&session, GameState::Waiting).await;

        let reason = messenger
            .messages()
            .into_iter()
            .find_map(|(_, msg)| match msg {
                ServerMessage::Phase {
                    data: Some(PhaseData::Reset { reason }),
                    ..
                } => Some(reason),
                _ => None,
            })
            .unwrap();
        assert!(reason.contains("Ghost"));
        assert!(!messenger.phases().contains(&GameState::Two));

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.players.len(), 2);
        assert_eq!(snapshot.current_player_id, None);
    }

    #[tokio::test]
    async fn test_zero_tick_game_still_completes() {
        let config = GameConfig {
            tick_ms: 0,
            ..timeout_config()
        };
        let (session, messenger) = session(config);
        start_with_two(&session).await;

        wait_for_state(&session, GameState::Waiting).await;
        assert_eq!(messenger.phases().last(), Some(&GameState::Waiting));
        assert!(messenger.phases().contains(&GameState::Reset));
    }

    #[tokio::test]
    async fn test_out_of_order_event_forces_reset() {
        let (session, messenger) = session(timeout_config());
        session.join("a".into(), "Ann").await.unwrap();
        session.join("b".into(), "Ben").await.unwrap();
        session
            .players
            .write()
            .await
            .get_mut(&"a".to_string())
            .unwrap()
            .total_score = 500;

        let token = CancellationToken::new();
        assert!(matches!(
            session.begin(&token, GameEvent::StartScore).await,
            Err(GameError::InvalidTransition {
                state: GameState::Waiting,
                event: GameEvent::StartScore,
            })
        ));

        // A driver launched on a session in the wrong state hits START_ONE from SCORE
        *session.state.write().await = GameState::Score;
        *session.stop.lock().await = token.clone();
        session.clone().run(token.clone()).await;

        assert!(token.is_cancelled());
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.state, GameState::Waiting);
        assert_eq!(snapshot.players.len(), 2);
        assert!(snapshot.players.iter().all(|p| p.total_score == 0));

        let reason = messenger
            .messages()
            .into_iter()
            .find_map(|(_, msg)| match msg {
                ServerMessage::Phase {
                    state: GameState::Waiting,
                    data: Some(PhaseData::Reset { reason }),
                    ..
                } => Some(reason),
                _ => None,
            })
            .unwrap();
        assert!(reason.contains("StartOne"));
        assert!(!messenger.phases().contains(&GameState::One));
    }

    #[tokio::test]
    async fn test_failed_push_resets_session() {
        let (session, messenger) = session(timeout_config());
        messenger.fail_pushes.store(true, Ordering::SeqCst);
        start_with_two(&session).await;

        wait_for_state(&session, GameState::Waiting).await;

        assert_eq!(
            messenger.phases(),
            vec![GameState::Starting, GameState::One, GameState::Waiting]
        );
    }

    #[tokio::test]
    async fn test_stop_signal_interrupts_wait() {
        let mut config = fast_config();
        config.starting_ticks = 10_000;
        let (session, messenger) = session(config);
        start_with_two(&session).await;

        session.abort("stopped by test").await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(session.state().await, GameState::Waiting);
        assert_eq!(
            messenger.phases(),
            vec![GameState::Starting, GameState::Waiting]
        );
    }
}
