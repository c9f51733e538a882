use std::collections::BTreeMap;

use super::registry::PlayerRegistry;
use super::shuffle::Slate;
use crate::types::*;

/// Points for picking the truth
pub const TRUTH_POINTS: u32 = 1000;
/// Points for each player fooled by your lie
pub const FOOL_POINTS: u32 = 500;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundScore {
    /// Points earned this round by every present player
    pub deltas: BTreeMap<ParticipantId, u32>,
    /// Slot text and pickers, keyed by slot owner
    pub matrix: BTreeMap<String, MatrixRow>,
}

/// Score one round against the shuffled slate.
///
/// Only ready non-current players count as guessers. The current player's own
/// slot is a decoy: picking it earns nobody anything.
pub fn score_round(players: &PlayerRegistry, slate: &Slate, current: &ParticipantId) -> RoundScore {
    let mut deltas: BTreeMap<ParticipantId, u32> =
        players.iter().map(|p| (p.id.clone(), 0)).collect();
    let mut matrix: BTreeMap<String, MatrixRow> = slate
        .slots()
        .iter()
        .map(|slot| {
            (
                slot.owner.key().to_string(),
                MatrixRow {
                    text: slot.text.clone(),
                    picked_by: Vec::new(),
                },
            )
        })
        .collect();

    for guesser in players.iter() {
        if &guesser.id == current || !guesser.ready {
            continue;
        }
        let Some(picked) = guesser.answer_truth_id else {
            continue;
        };
        let Some(owner) = slate.owner_at(picked) else {
            tracing::warn!("Guess {} of {} is outside the slate", picked, guesser.id);
            continue;
        };

        if let Some(row) = matrix.get_mut(owner.key()) {
            row.picked_by.push(guesser.id.clone());
        }

        match owner {
            SlotOwner::Truth => {
                *deltas.entry(guesser.id.clone()).or_default() += TRUTH_POINTS;
            }
            SlotOwner::Player(author) => {
                if author != &guesser.id && author != current {
                    if let Some(points) = deltas.get_mut(author) {
                        *points += FOOL_POINTS;
                    }
                }
            }
        }
    }

    RoundScore { deltas, matrix }
}
