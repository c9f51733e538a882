use rand::seq::SliceRandom;
use rand::Rng;

use super::registry::PlayerRegistry;
use crate::types::*;

/// Lies plus the truth in the order players see them
#[derive(Debug, Clone, PartialEq)]
pub struct Slate {
    slots: Vec<AnswerSlot>,
    truth_index: usize,
}

impl Slate {
    pub fn texts(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn truth_index(&self) -> usize {
        self.truth_index
    }

    pub fn owner_at(&self, index: usize) -> Option<&SlotOwner> {
        self.slots.get(index).map(|s| &s.owner)
    }

    pub fn slots(&self) -> &[AnswerSlot] {
        &self.slots
    }
}

/// Placeholder for a player who did not come up with a lie
pub fn placeholder_lie(name: &str) -> String {
    format!("{}'s lie", name)
}

/// Build the shuffled slate for the current round.
///
/// Every present player contributes one slot, the current player included.
/// Each player's `lie_index` and the current player's `shuffled_answer_index`
/// are updated to the final positions.
pub fn shuffle_answers<R: Rng + ?Sized>(
    players: &mut PlayerRegistry,
    current: &ParticipantId,
    truth: &str,
    rng: &mut R,
) -> Slate {
    let mut slots: Vec<AnswerSlot> = players
        .iter()
        .map(|p| {
            let text = match p.answer_lie.as_deref().map(str::trim) {
                Some(lie) if !lie.is_empty() => lie.to_string(),
                _ => placeholder_lie(&p.name),
            };
            AnswerSlot {
                text,
                owner: SlotOwner::Player(p.id.clone()),
            }
        })
        .collect();
    slots.push(AnswerSlot {
        text: truth.to_string(),
        owner: SlotOwner::Truth,
    });

    slots.shuffle(rng);

    let mut truth_index = 0;
    for (index, slot) in slots.iter().enumerate() {
        match &slot.owner {
            SlotOwner::Truth => truth_index = index,
            SlotOwner::Player(id) => {
                if let Some(player) = players.get_mut(id) {
                    player.lie_index = Some(index);
                }
            }
        }
    }
    if let Some(player) = players.get_mut(current) {
        player.shuffled_answer_index = Some(truth_index);
    }

    Slate { slots, truth_index }
}

#[cfg(test)]
impl Slate {
    /// Slate with a fixed layout, for scoring tests
    pub fn from_slots(slots: Vec<AnswerSlot>) -> Self {
        let truth_index = slots
            .iter()
            .position(|s| s.owner == SlotOwner::Truth)
            .unwrap_or_default();
        Self { slots, truth_index }
    }
}
