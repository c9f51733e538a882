use super::Session;
use crate::error::{GameError, Rejection};
use crate::protocol::{PlayerInput, ServerMessage};
use crate::types::*;

impl Session {
    /// Accept one input from a player for the active window.
    ///
    /// The first valid input marks the player ready; anything after that in the
    /// same window is rejected and leaves the session untouched.
    pub async fn input(
        &self,
        participant: &ParticipantId,
        input: PlayerInput,
    ) -> Result<(), GameError> {
        {
            let state = self.state.read().await;
            let mut players = self.players.write().await;
            let round = self.round.read().await;

            let player = players
                .get_mut(participant)
                .ok_or(Rejection::UnknownPlayer)?;
            if !state.accepts_input() {
                return Err(Rejection::NotAccepting(*state).into());
            }
            if player.ready {
                return Err(Rejection::AlreadyReady.into());
            }

            match (*state, input) {
                (GameState::InputCategory, PlayerInput::Category { index }) => {
                    let len = player.categories.len();
                    if index >= len {
                        return Err(Rejection::OutOfRange { index, len }.into());
                    }
                    player.category_index = index;
                    tracing::debug!("{} picked category {}", participant, player.categories[index]);
                }
                (GameState::InputLieText, PlayerInput::Lie { text }) => {
                    let text = text.trim();
                    if text.is_empty() {
                        return Err(Rejection::EmptyText.into());
                    }
                    if player.current {
                        let truth = round.as_ref().map(|r| r.question.answer.as_str());
                        if truth.is_some_and(|t| t.trim().eq_ignore_ascii_case(text)) {
                            return Err(Rejection::RepeatsTruth.into());
                        }
                    }
                    player.answer_lie = Some(text.to_string());
                    tracing::debug!("{} submitted a lie", participant);
                }
                (GameState::InputTrueOption, PlayerInput::Guess { index }) => {
                    if player.current {
                        return Err(Rejection::CurrentPlayer.into());
                    }
                    let len = round
                        .as_ref()
                        .and_then(|r| r.slate.as_ref())
                        .map(|s| s.len())
                        .unwrap_or(0);
                    if index >= len {
                        return Err(Rejection::OutOfRange { index, len }.into());
                    }
                    if player.lie_index == Some(index) {
                        return Err(Rejection::OwnLie.into());
                    }
                    player.answer_truth_id = Some(index);
                    tracing::debug!("{} guessed slot {}", participant, index);
                }
                (state, _) => return Err(Rejection::NotAccepting(state).into()),
            }
            player.ready = true;
        }

        let ready = ServerMessage::Ready {
            participant_id: participant.clone(),
        };
        if let Err(e) = self.messenger.broadcast(&self.room_id, ready).await {
            tracing::error!("Room {}: failed to announce input: {}", self.room_id, e);
            self.abort(&e.to_string()).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::game::shuffle::Slate;
    use crate::game::RoundState;

    async fn two_players_in(state: GameState) -> std::sync::Arc<Session> {
        let (session, _) = session(fast_config());
        session.join("a".into(), "Ann").await.unwrap();
        session.join("b".into(), "Ben").await.unwrap();
        {
            let mut players = session.players.write().await;
            for id in ["a", "b"] {
                players.get_mut(&id.to_string()).unwrap().categories =
                    (0..5).map(|i| format!("cat-{}", i)).collect();
            }
            players.get_mut(&"a".to_string()).unwrap().current = true;
            players.get_mut(&"a".to_string()).unwrap().lie_index = Some(2);
            players.get_mut(&"b".to_string()).unwrap().lie_index = Some(1);
        }
        *session.round.write().await = Some(RoundState {
            current_id: "a".into(),
            question: Question {
                category: "cat-0".into(),
                text: "Q ______".into(),
                answer: "Parliament".into(),
            },
            slate: Some(Slate::from_slots(vec![
                AnswerSlot {
                    text: "Parliament".into(),
                    owner: SlotOwner::Truth,
                },
                AnswerSlot {
                    text: "flock".into(),
                    owner: SlotOwner::Player("b".into()),
                },
                AnswerSlot {
                    text: "Ann's lie".into(),
                    owner: SlotOwner::Player("a".into()),
                },
            ])),
        });
        *session.state.write().await = state;
        session
    }

    async fn player(session: &Session, id: &str) -> super::super::registry::Player {
        session.players.read().await.get(&id.to_string()).unwrap().clone()
    }

    fn rejection(err: GameError) -> Rejection {
        match err {
            GameError::InputRejected(r) => r,
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_category_out_of_range_rejected() {
        let session = two_players_in(GameState::InputCategory).await;

        let err = session
            .input(&"b".into(), PlayerInput::Category { index: 5 })
            .await
            .unwrap_err();

        assert_eq!(rejection(err), Rejection::OutOfRange { index: 5, len: 5 });
        assert!(!player(&session, "b").await.ready);
    }

    #[tokio::test]
    async fn test_second_input_is_rejected_without_change() {
        let session = two_players_in(GameState::InputCategory).await;
        let id: ParticipantId = "b".into();

        session
            .input(&id, PlayerInput::Category { index: 3 })
            .await
            .unwrap();
        let after_first = player(&session, "b").await;

        let err = session
            .input(&id, PlayerInput::Category { index: 1 })
            .await
            .unwrap_err();

        assert_eq!(rejection(err), Rejection::AlreadyReady);
        assert_eq!(player(&session, "b").await, after_first);
        assert_eq!(after_first.category_index, 3);
        assert!(after_first.ready);
    }

    #[tokio::test]
    async fn test_lie_validation() {
        let session = two_players_in(GameState::InputLieText).await;

        let err = session
            .input(&"b".into(), PlayerInput::Lie { text: "   ".into() })
            .await
            .unwrap_err();
        assert_eq!(rejection(err), Rejection::EmptyText);

        let err = session
            .input(&"a".into(), PlayerInput::Lie { text: " parliament ".into() })
            .await
            .unwrap_err();
        assert_eq!(rejection(err), Rejection::RepeatsTruth);

        session
            .input(&"b".into(), PlayerInput::Lie { text: " flock ".into() })
            .await
            .unwrap();
        assert_eq!(player(&session, "b").await.answer_lie.as_deref(), Some("flock"));
    }

    #[tokio::test]
    async fn test_guess_validation() {
        let session = two_players_in(GameState::InputTrueOption).await;

        let err = session
            .input(&"b".into(), PlayerInput::Guess { index: 3 })
            .await
            .unwrap_err();
        assert_eq!(rejection(err), Rejection::OutOfRange { index: 3, len: 3 });

        let err = session
            .input(&"b".into(), PlayerInput::Guess { index: 1 })
            .await
            .unwrap_err();
        assert_eq!(rejection(err), Rejection::OwnLie);

        let err = session
            .input(&"a".into(), PlayerInput::Guess { index: 0 })
            .await
            .unwrap_err();
        assert_eq!(rejection(err), Rejection::CurrentPlayer);

        session
            .input(&"b".into(), PlayerInput::Guess { index: 0 })
            .await
            .unwrap();
        let ben = player(&session, "b").await;
        assert_eq!(ben.answer_truth_id, Some(0));
        assert!(ben.ready);
    }

    #[tokio::test]
    async fn test_input_outside_window_or_wrong_kind() {
        let session = two_players_in(GameState::Three).await;
        let err = session
            .input(&"b".into(), PlayerInput::Guess { index: 0 })
            .await
            .unwrap_err();
        assert_eq!(rejection(err), Rejection::NotAccepting(GameState::Three));

        let session = two_players_in(GameState::InputLieText).await;
        let err = session
            .input(&"b".into(), PlayerInput::Category { index: 0 })
            .await
            .unwrap_err();
        assert_eq!(rejection(err), Rejection::NotAccepting(GameState::InputLieText));

        let err = session
            .input(&"stranger".into(), PlayerInput::Lie { text: "x".into() })
            .await
            .unwrap_err();
        assert_eq!(rejection(err), Rejection::UnknownPlayer);
    }
}
