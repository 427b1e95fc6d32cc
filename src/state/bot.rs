//! Bot decision-making.
//!
//! A bot sees exactly what the seat's client would see (its [`SeatView`])
//! and must return a legal action. The room feeds bot actions through the
//! same validation path as human ones.

use std::fmt;

use super::declaration::{self, MAX_CONSECUTIVE_ZEROS};
use super::phase::{GameAction, Prompt, SeatView};
use super::piece::Piece;
use super::rules::{self, ComboType};

/// Pieces at or above this rank count as likely pile winners.
const STRONG_RANK: u8 = 10;

/// Trait for bot players.
pub trait BotDecisionMaker: Send + Sync + fmt::Debug {
    /// Accept or decline a redeal of a weak hand.
    fn choose_redeal(&self, hand: &[Piece]) -> bool;

    /// Pick a declaration; `previous` holds the values already declared
    /// this round in order.
    fn choose_declaration(&self, hand: &[Piece], previous: &[u8], consecutive_zeros: u8) -> u8;

    /// Pick hand indices to lead with.
    fn choose_lead(&self, hand: &[Piece]) -> Vec<usize>;

    /// Pick exactly `required` hand indices to follow with.
    fn choose_follow(
        &self,
        hand: &[Piece],
        required: usize,
        leader_combo: ComboType,
        best_rank: u8,
    ) -> Vec<usize>;
}

/// Turn a seat view into the action the bot owes, if any.
pub fn decide(bot: &dyn BotDecisionMaker, view: &SeatView) -> Option<GameAction> {
    let hand = &view.hand;
    let action = match view.prompt.as_ref()? {
        Prompt::Redeal => GameAction::RedealDecision {
            accept: bot.choose_redeal(hand),
        },
        Prompt::Declare {
            previous,
            consecutive_zeros,
        } => GameAction::Declare {
            value: bot.choose_declaration(hand, previous, *consecutive_zeros),
        },
        Prompt::Lead => GameAction::Play {
            pieces: bot.choose_lead(hand),
        },
        Prompt::Follow {
            required,
            leader_combo,
            best_rank,
        } => GameAction::Play {
            pieces: bot.choose_follow(hand, *required, *leader_combo, *best_rank),
        },
    };
    Some(action)
}

/// Default bot: plays strong combos, declares its count of strong pieces.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicBot;

impl HeuristicBot {
    pub fn new() -> Self {
        Self
    }

    fn estimate(hand: &[Piece]) -> u8 {
        hand.iter().filter(|p| p.rank >= STRONG_RANK).count() as u8
    }
}

impl BotDecisionMaker for HeuristicBot {
    fn choose_redeal(&self, hand: &[Piece]) -> bool {
        // Keep a weak hand only if it still holds a combo of three or more.
        !rules::valid_combos(hand)
            .iter()
            .any(|(indices, _)| indices.len() >= 3)
    }

    fn choose_declaration(&self, hand: &[Piece], previous: &[u8], consecutive_zeros: u8) -> u8 {
        if consecutive_zeros >= MAX_CONSECUTIVE_ZEROS {
            return declaration::lowest_nonzero(previous);
        }
        let estimate = Self::estimate(hand);
        declaration::legal_values(previous, consecutive_zeros)
            .into_iter()
            .min_by_key(|&v| (v.abs_diff(estimate), v))
            .unwrap_or_else(|| declaration::lowest_nonzero(previous))
    }

    fn choose_lead(&self, hand: &[Piece]) -> Vec<usize> {
        rules::valid_combos(hand)
            .into_iter()
            .max_by_key(|(indices, _)| {
                let pieces: Vec<Piece> = indices.iter().map(|&i| hand[i]).collect();
                (indices.len(), rules::max_rank(&pieces))
            })
            .map(|(indices, _)| indices)
            .unwrap_or_else(|| vec![0])
    }

    fn choose_follow(
        &self,
        hand: &[Piece],
        required: usize,
        leader_combo: ComboType,
        best_rank: u8,
    ) -> Vec<usize> {
        // Cheapest matching combo that beats the current best.
        let winner = rules::valid_combos(hand)
            .into_iter()
            .filter(|(indices, combo)| indices.len() == required && *combo == leader_combo)
            .map(|(indices, _)| {
                let rank = indices.iter().map(|&i| hand[i].rank).max().unwrap_or(0);
                (rank, indices)
            })
            .filter(|(rank, _)| *rank > best_rank)
            .min_by_key(|(rank, _)| *rank);

        if let Some((_, indices)) = winner {
            return indices;
        }

        // Otherwise discard the weakest pieces.
        let mut by_rank: Vec<usize> = (0..hand.len()).collect();
        by_rank.sort_by_key(|&i| hand[i].rank);
        by_rank.truncate(required);
        by_rank
    }
}
