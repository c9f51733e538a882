use super::AppState;
use crate::error::GameError;
use crate::game::Session;
use crate::messenger::Messenger;
use crate::types::*;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

/// Safe character set for room codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 5;

/// Generate a random room code (5 characters)
fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

type Rooms = HashMap<RoomId, Arc<Session>>;

impl AppState {
    /// Open a new room with a fresh code
    pub async fn create_room(&self) -> Arc<Session> {
        let mut rooms = self.rooms.write().await;
        self.open_room(&mut rooms)
    }

    pub async fn get_room(&self, room_id: &str) -> Option<Arc<Session>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Join `participant` to a room, opening it when nobody uses that code yet.
    ///
    /// Runs under the directory lock, so a room closing as its last player
    /// leaves can never swallow the joiner.
    pub async fn join_room(
        &self,
        room_id: Option<&str>,
        participant: &ParticipantId,
        nickname: &str,
    ) -> Result<(Arc<Session>, PlayerSummary), GameError> {
        let mut rooms = self.rooms.write().await;
        let session = self.room_entry(&mut rooms, room_id);
        let code = session.room_id().clone();

        // Bind first so the joiner gets the membership broadcast too
        if !self.hub.bind(participant, &code).await {
            tracing::warn!("Join from unregistered participant {}", participant);
        }

        match session.join(participant.clone(), nickname).await {
            Ok(player) => Ok((session, player)),
            Err(e) => {
                self.hub.unbind(participant).await;
                if session.is_empty().await {
                    rooms.remove(&code);
                    tracing::info!("Closed empty room {}", code);
                }
                Err(e)
            }
        }
    }

    /// Room with the given code (normalized), or a fresh one
    fn room_entry(&self, rooms: &mut Rooms, room_id: Option<&str>) -> Arc<Session> {
        let Some(code) = room_id.map(|c| c.trim().to_uppercase()).filter(|c| !c.is_empty())
        else {
            return self.open_room(rooms);
        };

        if let Some(session) = rooms.get(&code) {
            return session.clone();
        }
        let session = Arc::new(self.new_session(code.clone()));
        rooms.insert(code.clone(), session.clone());
        tracing::info!("Created room {} on join", code);
        session
    }

    fn open_room(&self, rooms: &mut Rooms) -> Arc<Session> {
        // Retry on collision (rare with 28M combinations)
        let code = loop {
            let code = generate_room_code();
            if !rooms.contains_key(&code) {
                break code;
            }
        };

        let session = Arc::new(self.new_session(code.clone()));
        rooms.insert(code.clone(), session.clone());
        tracing::info!("Created room {}", code);
        session
    }

    /// Drop a room once its last player is gone
    pub async fn remove_room_if_empty(&self, room_id: &RoomId) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(session) = rooms.get(room_id) else {
            return false;
        };
        if !session.is_empty().await {
            return false;
        }
        rooms.remove(room_id);
        tracing::info!("Closed empty room {}", room_id);
        true
    }

    /// Snapshots of all rooms, sorted by code
    pub async fn room_snapshots(&self) -> Vec<SessionSnapshot> {
        let sessions: Vec<Arc<Session>> = self.rooms.read().await.values().cloned().collect();
        let mut snapshots = Vec::with_capacity(sessions.len());
        for session in sessions {
            snapshots.push(session.snapshot().await);
        }
        snapshots.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        snapshots
    }

    fn new_session(&self, room_id: RoomId) -> Session {
        let messenger: Arc<dyn Messenger> = self.hub.clone();
        Session::new(
            room_id,
            self.config.clone(),
            self.questions.clone(),
            messenger,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::QuestionBank;

    fn app() -> AppState {
        AppState::new(Arc::new(QuestionBank::sample()), GameConfig::default())
    }

    #[test]
    fn test_room_code_alphabet() {
        for _ in 0..50 {
            let code = generate_room_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));
        }
    }

    #[tokio::test]
    async fn test_create_and_get_room() {
        let state = app();
        let session = state.create_room().await;

        let found = state.get_room(session.room_id()).await.unwrap();
        assert!(Arc::ptr_eq(&session, &found));
        assert!(state.get_room("NOPE1").await.is_none());
    }

    #[tokio::test]
    async fn test_join_room_normalizes_code() {
        let state = app();

        let (first, _) = state
            .join_room(Some(" abcde "), &"p1".to_string(), "Ann")
            .await
            .unwrap();
        assert_eq!(first.room_id(), "ABCDE");
        let (again, ben) = state
            .join_room(Some("ABCDE"), &"p2".to_string(), "Ben")
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(ben.name, "Ben");

        let (fresh, _) = state
            .join_room(None, &"p3".to_string(), "Cid")
            .await
            .unwrap();
        assert_ne!(fresh.room_id(), "ABCDE");
        assert_eq!(state.room_snapshots().await.len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_join_closes_fresh_room() {
        let state = app();

        match state.join_room(Some("ZZZZZ"), &"p1".to_string(), "   ").await {
            Err(err) => assert_eq!(err.code(), "EMPTY_NICKNAME"),
            Ok(_) => panic!("blank nickname accepted"),
        }
        assert!(state.get_room("ZZZZZ").await.is_none());
    }

    #[tokio::test]
    async fn test_join_racing_last_leave_stays_listed() {
        let state = app();
        for round in 0..50 {
            let leaver = format!("leaver-{}", round);
            let joiner = format!("joiner-{}", round);
            let (session, _) = state
                .join_room(Some("RACE1"), &leaver, "Ann")
                .await
                .unwrap();

            let leave = async {
                session.on_disconnect(&leaver).await.unwrap();
                state.remove_room_if_empty(&"RACE1".to_string()).await;
            };
            let join = state.join_room(Some("RACE1"), &joiner, "Ben");
            let (_, joined) = tokio::join!(leave, join);
            let (joined_session, _) = joined.unwrap();

            let listed = state.get_room("RACE1").await.unwrap();
            assert!(Arc::ptr_eq(&listed, &joined_session));

            joined_session.on_disconnect(&joiner).await.unwrap();
            state.remove_room_if_empty(&"RACE1".to_string()).await;
        }
    }

    #[tokio::test]
    async fn test_remove_room_only_when_empty() {
        let state = app();
        let session = state.create_room().await;
        let room_id = session.room_id().clone();
        session.join("p1".into(), "Ann").await.unwrap();

        assert!(!state.remove_room_if_empty(&room_id).await);

        session.on_disconnect(&"p1".to_string()).await.unwrap();
        assert!(state.remove_room_if_empty(&room_id).await);
        assert!(state.get_room(&room_id).await.is_none());
    }
}
