use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use std::collections::{BTreeMap, HashMap};

use crate::error::Rejection;
use crate::types::*;

/// Cosmetic icons handed out on join; also caps the room size
pub const ICON_SET: [&str; 12] = [
    "angry",
    "otter",
    "adjust",
    "pastafarianism",
    "baby",
    "beer",
    "hippo",
    "cannabis",
    "cat",
    "cocktail",
    "dizzy",
    "fighter-jet",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: ParticipantId,
    pub name: String,
    pub icon: String,
    pub categories: Vec<String>,
    pub category_index: usize,
    pub question: Option<Question>,
    /// Slate position of the truth, set on the current player only
    pub shuffled_answer_index: Option<usize>,
    /// Slate position of this player's own lie
    pub lie_index: Option<usize>,
    pub answer_lie: Option<String>,
    pub answer_truth_id: Option<usize>,
    pub total_score: u32,
    pub ready: bool,
    pub used: bool,
    pub current: bool,
}

impl Player {
    fn new(id: ParticipantId, name: String, icon: String) -> Self {
        Self {
            id,
            name,
            icon,
            categories: Vec::new(),
            category_index: 0,
            question: None,
            shuffled_answer_index: None,
            lie_index: None,
            answer_lie: None,
            answer_truth_id: None,
            total_score: 0,
            ready: false,
            used: false,
            current: false,
        }
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            icon: self.icon.clone(),
            total_score: self.total_score,
            ready: self.ready,
        }
    }

    fn clear_round(&mut self) {
        self.shuffled_answer_index = None;
        self.lie_index = None;
        self.answer_lie = None;
        self.answer_truth_id = None;
        self.ready = false;
        self.current = false;
    }
}

/// Join-ordered player table of one session
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<ParticipantId, Player>,
    order: Vec<ParticipantId>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player with a random icon not worn by anyone present
    pub fn join<R: Rng + ?Sized>(
        &mut self,
        id: ParticipantId,
        name: &str,
        rng: &mut R,
    ) -> Result<&Player, Rejection> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Rejection::EmptyNickname);
        }
        if self.players.contains_key(&id) {
            return Err(Rejection::AlreadyJoined);
        }

        let free: Vec<&str> = ICON_SET
            .iter()
            .copied()
            .filter(|icon| !self.players.values().any(|p| p.icon == *icon))
            .collect();
        let icon = free.choose(rng).ok_or(Rejection::RoomFull)?;

        self.order.push(id.clone());
        let player = self
            .players
            .entry(id.clone())
            .or_insert_with(|| Player::new(id, name.to_string(), icon.to_string()));
        Ok(player)
    }

    pub fn leave(&mut self, id: &ParticipantId) -> Option<Player> {
        let player = self.players.remove(id)?;
        self.order.retain(|p| p != id);
        Some(player)
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn get_mut(&mut self, id: &ParticipantId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Present participants in join order
    pub fn members(&self) -> Vec<ParticipantId> {
        self.order.clone()
    }

    /// Players in join order
    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.order.iter().filter_map(|id| self.players.get(id))
    }

    pub fn current_id(&self) -> Option<ParticipantId> {
        self.iter().find(|p| p.current).map(|p| p.id.clone())
    }

    /// Make the first unused player (join order) the current one
    pub fn rotate_current(&mut self) -> Option<ParticipantId> {
        for player in self.players.values_mut() {
            player.current = false;
        }
        let next = self.iter().find(|p| !p.used).map(|p| p.id.clone())?;
        if let Some(player) = self.players.get_mut(&next) {
            player.current = true;
        }
        Some(next)
    }

    /// Mark the current player's turn as done
    pub fn finish_turn(&mut self) {
        for player in self.players.values_mut() {
            if player.current {
                player.used = true;
            }
            player.clear_round();
        }
    }

    pub fn has_unused(&self) -> bool {
        self.players.values().any(|p| !p.used)
    }

    /// Whether every expected player has sent input; the current player is
    /// skipped when `exclude_current` is set
    pub fn all_ready(&self, exclude_current: bool) -> bool {
        self.players
            .values()
            .filter(|p| !(exclude_current && p.current))
            .all(|p| p.ready)
    }

    pub fn reset_readiness(&mut self) {
        for player in self.players.values_mut() {
            player.ready = false;
        }
    }

    /// Deal `per_player` categories to everyone from a shared shuffled pool.
    ///
    /// Players get disjoint hands until the pool runs dry; the pool is then
    /// refilled with everything the player being dealt does not hold yet.
    pub fn assign_categories<R: Rng + ?Sized>(
        &mut self,
        all: &[String],
        per_player: usize,
        rng: &mut R,
    ) {
        let mut pool: Vec<String> = all.to_vec();
        pool.shuffle(rng);

        for id in self.order.clone() {
            let mut hand: Vec<String> = Vec::with_capacity(per_player);
            while hand.len() < per_player {
                if pool.is_empty() {
                    pool = all.iter().filter(|c| !hand.contains(c)).cloned().collect();
                    if pool.is_empty() {
                        break;
                    }
                    pool.shuffle(rng);
                }
                if let Some(category) = pool.pop() {
                    if !hand.contains(&category) {
                        hand.push(category);
                    }
                }
            }

            if let Some(player) = self.players.get_mut(&id) {
                player.categories = hand;
                player.category_index = 0;
            }
        }
    }

    /// Drop everything tied to the round in progress
    pub fn clear_round_fields(&mut self) {
        for player in self.players.values_mut() {
            player.clear_round();
        }
    }

    /// Forget submitted lies and guesses after scoring
    pub fn clear_answers(&mut self) {
        for player in self.players.values_mut() {
            player.answer_lie = None;
            player.answer_truth_id = None;
        }
    }

    /// Fresh state for the next game, after a finished or a failed one.
    /// Only name and icon are kept.
    pub fn restart(&mut self) {
        for player in self.players.values_mut() {
            let fresh = Player::new(
                player.id.clone(),
                std::mem::take(&mut player.name),
                std::mem::take(&mut player.icon),
            );
            *player = fresh;
        }
    }

    pub fn apply_scores(&mut self, deltas: &BTreeMap<ParticipantId, u32>) {
        for (id, delta) in deltas {
            if let Some(player) = self.players.get_mut(id) {
                player.total_score += delta;
            }
        }
    }

    pub fn totals(&self) -> BTreeMap<ParticipantId, u32> {
        self.iter()
            .map(|p| (p.id.clone(), p.total_score))
            .collect()
    }

    pub fn summaries(&self) -> Vec<PlayerSummary> {
        self.iter().map(Player::summary).collect()
    }
}
