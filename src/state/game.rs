//! Game state.
//!
//! Tracks the four players, the current round and turn, and builds the
//! public view every snapshot is computed from. All mutation goes through
//! [`PhaseStateMachine`](super::phase::PhaseStateMachine).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::connection::ConnectionRecord;
use super::declaration::declaration_order;
use super::piece::Piece;
use super::redeal::RedealOffers;
use super::rules::{TurnOutcome, TurnPlay};

/// Seats per room.
pub const SEATS: usize = 4;

/// Score that ends the game.
pub const DEFAULT_WIN_SCORE: i32 = 50;

/// Game phase state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    Preparation,
    Declaration,
    Turn,
    Scoring,
    GameOver,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preparation => "PREPARATION",
            Self::Declaration => "DECLARATION",
            Self::Turn => "TURN",
            Self::Scoring => "SCORING",
            Self::GameOver => "GAME_OVER",
        }
    }

    /// Check if the game can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::GameOver)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limits that end a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameRules {
    pub win_score: i32,
    /// Optional cap on rounds played; `None` plays until `win_score` is reached
    pub max_rounds: Option<u32>,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            win_score: DEFAULT_WIN_SCORE,
            max_rounds: None,
        }
    }
}

/// A player in the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePlayer {
    pub name: String,
    pub is_bot: bool,
    pub hand: Vec<Piece>,
    pub declared_piles: u8,
    pub captured_piles: u8,
    pub score: i32,
    pub consecutive_zero_declares: u8,
}

impl GamePlayer {
    pub fn new(name: impl Into<String>, is_bot: bool) -> Self {
        Self {
            name: name.into(),
            is_bot,
            hand: Vec::new(),
            declared_piles: 0,
            captured_piles: 0,
            score: 0,
            consecutive_zero_declares: 0,
        }
    }

    fn to_view(&self, seat: usize, record: Option<&ConnectionRecord>) -> PlayerView {
        PlayerView {
            seat,
            name: self.name.clone(),
            is_bot: self.is_bot,
            hand_size: self.hand.len(),
            declared_piles: self.declared_piles,
            captured_piles: self.captured_piles,
            score: self.score,
            consecutive_zero_declares: self.consecutive_zero_declares,
            is_connected: record.map(|r| r.is_connected).unwrap_or(false),
            is_bot_substitute: record.map(|r| r.is_bot_substitute).unwrap_or(false),
        }
    }
}

/// Pile captured by one turn's winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PileRecord {
    pub turn_number: u32,
    pub seat: usize,
    pub piles: u8,
}

/// Per-round bookkeeping; reset each time PREPARATION is entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    pub round_number: u32,
    pub redeal_multiplier: u32,
    pub starter: usize,
    pub declarations: BTreeMap<usize, u8>,
    pub pile_winners: Vec<PileRecord>,
    pub redeal_offers: RedealOffers,
}

impl Round {
    pub fn new(round_number: u32, redeal_multiplier: u32, starter: usize) -> Self {
        Self {
            round_number,
            redeal_multiplier,
            starter,
            declarations: BTreeMap::new(),
            pile_winners: Vec::new(),
            redeal_offers: RedealOffers::default(),
        }
    }

    /// Seat expected to declare next, if declarations are still open.
    pub fn next_declarer(&self) -> Option<usize> {
        declaration_order(self.starter).get(self.declarations.len()).copied()
    }

    /// Declarations recorded so far, in declaration order.
    pub fn declared_values(&self) -> Vec<u8> {
        declaration_order(self.starter)
            .iter()
            .filter_map(|seat| self.declarations.get(seat).copied())
            .collect()
    }

    pub fn declaration_total(&self) -> u32 {
        self.declarations.values().map(|&v| u32::from(v)).sum()
    }

    pub fn turns_played(&self) -> u32 {
        self.pile_winners.len() as u32
    }
}

/// The trick in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub turn_number: u32,
    pub leader: usize,
    pub plays: Vec<TurnPlay>,
}

impl Turn {
    pub fn new(turn_number: u32, leader: usize) -> Self {
        Self {
            turn_number,
            leader,
            plays: Vec::new(),
        }
    }

    /// Piece count fixed by the leader, once the leader has played.
    pub fn required_count(&self) -> Option<usize> {
        self.plays.first().map(|p| p.pieces.len())
    }

    pub fn next_seat(&self) -> Option<usize> {
        if self.plays.len() >= SEATS {
            None
        } else {
            Some((self.leader + self.plays.len()) % SEATS)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.plays.len() == SEATS
    }
}

/// A finished turn kept for display until the next one resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTurn {
    pub turn_number: u32,
    pub plays: Vec<TurnPlay>,
    pub outcome: TurnOutcome,
}

/// One seat's result for a scored round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundScore {
    pub seat: usize,
    pub declared: u8,
    pub captured: u8,
    pub multiplier: u32,
    pub delta: i32,
    pub total: i32,
}

/// Game session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    pub phase: Phase,
    pub rules: GameRules,
    pub(crate) players: Vec<GamePlayer>,
    pub(crate) round: Round,
    pub(crate) turn: Option<Turn>,
    pub(crate) last_turn: Option<ResolvedTurn>,
    pub(crate) round_scores: Vec<RoundScore>,
    pub(crate) winners: Vec<usize>,
}

impl Game {
    pub(crate) fn new(players: Vec<GamePlayer>, rules: GameRules) -> Self {
        Self {
            phase: Phase::Preparation,
            rules,
            players,
            round: Round::new(1, 1, 0),
            turn: None,
            last_turn: None,
            round_scores: Vec::new(),
            winners: Vec::new(),
        }
    }

    pub fn player(&self, seat: usize) -> Option<&GamePlayer> {
        self.players.get(seat)
    }

    pub fn players(&self) -> &[GamePlayer] {
        &self.players
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn turn(&self) -> Option<&Turn> {
        self.turn.as_ref()
    }

    pub fn last_turn(&self) -> Option<&ResolvedTurn> {
        self.last_turn.as_ref()
    }

    pub fn round_scores(&self) -> &[RoundScore] {
        &self.round_scores
    }

    pub fn winners(&self) -> &[usize] {
        &self.winners
    }

    pub fn hand(&self, seat: usize) -> Option<&[Piece]> {
        self.players.get(seat).map(|p| p.hand.as_slice())
    }

    pub fn hands(&self) -> Vec<Vec<Piece>> {
        self.players.iter().map(|p| p.hand.clone()).collect()
    }

    pub fn all_hands_empty(&self) -> bool {
        self.players.iter().all(|p| p.hand.is_empty())
    }

    /// Phase-specific part of the public view.
    fn phase_detail(&self) -> serde_json::Value {
        match self.phase {
            Phase::Preparation => serde_json::json!({
                "redeal_offers": self.round.redeal_offers,
                "pending": self.round.redeal_offers.pending_seats(),
            }),
            Phase::Declaration => serde_json::json!({
                "order": declaration_order(self.round.starter),
                "declarations": self.round.declarations,
                "next_declarer": self.round.next_declarer(),
            }),
            Phase::Turn => serde_json::json!({
                "turn": self.turn,
                "next_player": self.turn.as_ref().and_then(|t| t.next_seat()),
                "required_count": self.turn.as_ref().and_then(|t| t.required_count()),
                "declarations": self.round.declarations,
                "pile_winners": self.round.pile_winners,
                "last_turn": self.last_turn,
            }),
            Phase::Scoring => serde_json::json!({
                "declarations": self.round.declarations,
                "pile_winners": self.round.pile_winners,
                "last_turn": self.last_turn,
                "round_scores": self.round_scores,
            }),
            Phase::GameOver => serde_json::json!({
                "winners": self.winners,
                "round_scores": self.round_scores,
                "final_scores": self.players.iter().map(|p| p.score).collect::<Vec<_>>(),
            }),
        }
    }

    /// Everything every seat may see. Hands are reduced to their size.
    pub fn public_view(&self, records: &[ConnectionRecord]) -> PublicView {
        let players = self
            .players
            .iter()
            .enumerate()
            .map(|(seat, p)| p.to_view(seat, records.iter().find(|r| r.seat == seat)))
            .collect();

        PublicView {
            phase: self.phase,
            round: RoundView {
                round_number: self.round.round_number,
                redeal_multiplier: self.round.redeal_multiplier,
                starter: self.round.starter,
                turns_played: self.round.turns_played(),
            },
            players,
            detail: self.phase_detail(),
        }
    }
}

/// Public fields of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub seat: usize,
    pub name: String,
    pub is_bot: bool,
    pub hand_size: usize,
    pub declared_piles: u8,
    pub captured_piles: u8,
    pub score: i32,
    pub consecutive_zero_declares: u8,
    pub is_connected: bool,
    pub is_bot_substitute: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundView {
    pub round_number: u32,
    pub redeal_multiplier: u32,
    pub starter: usize,
    pub turns_played: u32,
}

/// The visible game state; the input to every checksum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicView {
    pub phase: Phase,
    pub round: RoundView,
    pub players: Vec<PlayerView>,
    pub detail: serde_json::Value,
}

impl PublicView {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
