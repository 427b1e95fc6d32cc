//! Weak-hand detection and redeal voting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GameError;

use super::game::{Phase, SEATS};
use super::piece::Piece;
use super::rules::max_rank;

/// A hand whose strongest piece is at most this rank is weak.
pub const WEAK_HAND_MAX_RANK: u8 = 9;

pub fn is_weak_hand(hand: &[Piece]) -> bool {
    !hand.is_empty() && max_rank(hand) <= WEAK_HAND_MAX_RANK
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedealAnswer {
    Pending,
    Accepted,
    Declined,
}

/// How a fully answered set of offers resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedealResolution {
    /// Nobody accepted; move on to declarations.
    Proceed,
    /// Redeal everything; `starter` leads the new round.
    Redeal { starter: usize },
}

/// Outstanding redeal offers for the current deal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedealOffers {
    answers: BTreeMap<usize, RedealAnswer>,
}

impl RedealOffers {
    /// Offer a redeal to every seat holding a weak hand.
    pub fn from_hands(hands: &[Vec<Piece>]) -> Self {
        let answers = hands
            .iter()
            .enumerate()
            .filter(|(_, hand)| is_weak_hand(hand))
            .map(|(seat, _)| (seat, RedealAnswer::Pending))
            .collect();
        Self { answers }
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn offered_seats(&self) -> impl Iterator<Item = usize> + '_ {
        self.answers.keys().copied()
    }

    pub fn pending_seats(&self) -> Vec<usize> {
        self.answers
            .iter()
            .filter(|(_, a)| **a == RedealAnswer::Pending)
            .map(|(seat, _)| *seat)
            .collect()
    }

    pub fn answer_of(&self, seat: usize) -> Option<RedealAnswer> {
        self.answers.get(&seat).copied()
    }

    /// Record a seat's answer. Each offered seat answers exactly once.
    pub fn answer(&mut self, seat: usize, accept: bool) -> Result<(), GameError> {
        let invalid = |reason: &str| GameError::InvalidPhaseAction {
            phase: Phase::Preparation,
            action: "redeal_decision",
            reason: reason.to_string(),
        };

        match self.answers.get_mut(&seat) {
            None => Err(invalid("seat was not offered a redeal")),
            Some(a) if *a != RedealAnswer::Pending => Err(invalid("redeal already answered")),
            Some(a) => {
                *a = if accept {
                    RedealAnswer::Accepted
                } else {
                    RedealAnswer::Declined
                };
                Ok(())
            }
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.answers.values().all(|a| *a != RedealAnswer::Pending)
    }

    /// Resolution once every offer is answered, `None` while any is pending.
    pub fn resolution(&self, starter: usize) -> Option<RedealResolution> {
        if !self.is_resolved() {
            return None;
        }
        let first_accepting = (0..SEATS)
            .map(|i| (starter + i) % SEATS)
            .find(|seat| self.answer_of(*seat) == Some(RedealAnswer::Accepted));

        Some(match first_accepting {
            Some(starter) => RedealResolution::Redeal { starter },
            None => RedealResolution::Proceed,
        })
    }
}
