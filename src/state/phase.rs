//! Phase state machine.
//!
//! # State Diagram
//!
//! ```text
//!            ┌──────────── redeal accepted ───────────┐
//!            ▼                                        │
//! ┌──────────────┐  offers resolved  ┌─────────────┐  │
//! │ PREPARATION  │──────────────────▶│ DECLARATION │  │
//! └──────┬───────┘                   └──────┬──────┘  │
//!        │ (loops on redeal) ───────────────┼─────────┘
//!        ▲                                  │ 4 declarations
//!        │ no winner                        ▼
//! ┌──────┴───────┐  hands exhausted  ┌─────────────┐
//! │   SCORING    │◀──────────────────│    TURN     │
//! └──────┬───────┘                   └─────────────┘
//!        │ score ≥ win score (or optional round cap)
//!        ▼
//! ┌──────────────┐
//! │  GAME_OVER   │
//! └──────────────┘
//! ```
//!
//! Actions carry only a seat. Whether a human or a bot chose the action is
//! settled by the room before it reaches [`PhaseStateMachine::apply`].

use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::GameError;

use super::connection::ConnectionRecord;
use super::declaration;
use super::game::{
    Game, GamePlayer, GameRules, Phase, PileRecord, PublicView, ResolvedTurn, Round, RoundScore,
    Turn, SEATS,
};
use super::piece::{deal_hands, Color, Piece, PieceKind};
use super::redeal::{RedealOffers, RedealResolution};
use super::rules::{self, ComboType, TurnOutcome, TurnPlay};

/// Who submitted an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "seat", rename_all = "snake_case")]
pub enum ActionSource {
    Human(usize),
    Bot(usize),
}

impl ActionSource {
    pub fn seat(&self) -> usize {
        match self {
            Self::Human(seat) | Self::Bot(seat) => *seat,
        }
    }
}

impl fmt::Display for ActionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human(seat) => write!(f, "human@{}", seat),
            Self::Bot(seat) => write!(f, "bot@{}", seat),
        }
    }
}

/// A player move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameAction {
    RedealDecision { accept: bool },
    Declare { value: u8 },
    /// Indices into the seat's current hand.
    Play { pieces: Vec<usize> },
}

impl GameAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RedealDecision { .. } => "redeal_decision",
            Self::Declare { .. } => "declare",
            Self::Play { .. } => "play",
        }
    }
}

/// An action together with the actor claiming the seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatAction {
    pub source: ActionSource,
    pub action: GameAction,
}

impl SeatAction {
    pub fn human(seat: usize, action: GameAction) -> Self {
        Self {
            source: ActionSource::Human(seat),
            action,
        }
    }

    pub fn bot(seat: usize, action: GameAction) -> Self {
        Self {
            source: ActionSource::Bot(seat),
            action,
        }
    }
}

/// What changed as a result of an action or automatic step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    RoundDealt { round_number: u32, starter: usize, weak_seats: Vec<usize> },
    RedealAnswered { seat: usize, accept: bool },
    Redealt { multiplier: u32, starter: usize },
    DeclarationsOpened { starter: usize },
    Declared { seat: usize, value: u8 },
    Played { seat: usize, combo: ComboType, count: usize },
    TurnResolved { turn_number: u32, outcome: TurnOutcome },
    RoundScored { scores: Vec<RoundScore> },
    GameOver { winners: Vec<usize> },
}

/// What a seat needs to know to choose its next action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatView {
    pub seat: usize,
    pub phase: Phase,
    pub hand: Vec<Piece>,
    pub prompt: Option<Prompt>,
}

/// The action a seat currently owes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Redeal,
    Declare {
        previous: Vec<u8>,
        consecutive_zeros: u8,
    },
    Lead,
    Follow {
        required: usize,
        leader_combo: ComboType,
        best_rank: u8,
    },
}

/// Authoritative game state plus the dealing RNG.
#[derive(Debug, Clone)]
pub struct PhaseStateMachine {
    game: Game,
    rng: StdRng,
}

impl PhaseStateMachine {
    /// Seat the players and deal the first round.
    pub fn new(players: Vec<GamePlayer>, rules: GameRules, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut machine = Self {
            game: Game::new(players, rules),
            rng,
        };
        machine.start_round(1, None, 1);
        machine
    }

    /// Start from a known deal (fixtures and replays). Later deals use `seed`.
    pub fn from_hands(
        players: Vec<GamePlayer>,
        rules: GameRules,
        hands: [Vec<Piece>; SEATS],
        starter: usize,
        seed: Option<u64>,
    ) -> Self {
        let mut machine = Self::new(players, rules, seed);
        machine.install_round(1, 1, Some(starter), hands);
        machine
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn phase(&self) -> Phase {
        self.game.phase
    }

    pub fn public_view(&self, records: &[ConnectionRecord]) -> PublicView {
        self.game.public_view(records)
    }

    /// Seats the machine is currently waiting on.
    pub fn owed_seats(&self) -> Vec<usize> {
        match self.game.phase {
            Phase::Preparation => self.game.round.redeal_offers.pending_seats(),
            Phase::Declaration => self.game.round.next_declarer().into_iter().collect(),
            Phase::Turn => self
                .game
                .turn
                .as_ref()
                .and_then(|t| t.next_seat())
                .into_iter()
                .collect(),
            Phase::Scoring | Phase::GameOver => Vec::new(),
        }
    }

    pub fn seat_view(&self, seat: usize) -> Result<SeatView, GameError> {
        let player = self.game.player(seat).ok_or(GameError::UnknownSeat(seat))?;
        let owes = self.owed_seats().contains(&seat);

        let prompt = if !owes {
            None
        } else {
            match self.game.phase {
                Phase::Preparation => Some(Prompt::Redeal),
                Phase::Declaration => Some(Prompt::Declare {
                    previous: self.game.round.declared_values(),
                    consecutive_zeros: player.consecutive_zero_declares,
                }),
                Phase::Turn => self.game.turn.as_ref().map(|turn| match turn.plays.first() {
                    None => Prompt::Lead,
                    Some(lead) => Prompt::Follow {
                        required: lead.pieces.len(),
                        leader_combo: lead.combo,
                        best_rank: best_matching_rank(&turn.plays),
                    },
                }),
                Phase::Scoring | Phase::GameOver => None,
            }
        };

        Ok(SeatView {
            seat,
            phase: self.game.phase,
            hand: player.hand.clone(),
            prompt,
        })
    }

    /// Validate and apply one action. On error nothing has changed.
    pub fn apply(&mut self, seat: usize, action: &GameAction) -> Result<Vec<GameEvent>, GameError> {
        if seat >= SEATS {
            return Err(GameError::UnknownSeat(seat));
        }

        match (self.game.phase, action) {
            (Phase::Preparation, GameAction::RedealDecision { accept }) => {
                self.apply_redeal_decision(seat, *accept)
            }
            (Phase::Declaration, GameAction::Declare { value }) => self.apply_declare(seat, *value),
            (Phase::Turn, GameAction::Play { pieces }) => self.apply_play(seat, pieces),
            (phase, action) => Err(GameError::InvalidPhaseAction {
                phase,
                action: action.name(),
                reason: format!("{} does not accept {}", phase, action.name()),
            }),
        }
    }

    /// Perform one automatic transition, if the current state calls for it.
    pub fn auto_advance(&mut self) -> Option<Vec<GameEvent>> {
        match self.game.phase {
            Phase::Preparation if self.game.round.redeal_offers.is_empty() => {
                Some(self.open_declarations())
            }
            Phase::Scoring => Some(self.finish_scoring()),
            _ => None,
        }
    }

    fn apply_redeal_decision(&mut self, seat: usize, accept: bool) -> Result<Vec<GameEvent>, GameError> {
        self.game.round.redeal_offers.answer(seat, accept)?;
        let mut events = vec![GameEvent::RedealAnswered { seat, accept }];

        match self.game.round.redeal_offers.resolution(self.game.round.starter) {
            None => {}
            Some(RedealResolution::Proceed) => events.extend(self.open_declarations()),
            Some(RedealResolution::Redeal { starter }) => {
                let multiplier = self.game.round.redeal_multiplier + 1;
                let round_number = self.game.round.round_number;
                events.push(GameEvent::Redealt { multiplier, starter });
                events.extend(self.start_round(round_number, Some(starter), multiplier));
            }
        }
        Ok(events)
    }

    fn apply_declare(&mut self, seat: usize, value: u8) -> Result<Vec<GameEvent>, GameError> {
        let expected = self.game.round.next_declarer();
        if expected != Some(seat) {
            return Err(GameError::InvalidPhaseAction {
                phase: Phase::Declaration,
                action: "declare",
                reason: format!("waiting on seat {:?} to declare", expected),
            });
        }

        let previous = self.game.round.declared_values();
        let zeros = self.game.players[seat].consecutive_zero_declares;
        declaration::validate(seat, value, &previous, zeros)?;

        self.game.round.declarations.insert(seat, value);
        let player = &mut self.game.players[seat];
        player.declared_piles = value;
        player.consecutive_zero_declares = if value == 0 { zeros + 1 } else { 0 };

        if self.game.round.declarations.len() == SEATS {
            self.game.phase = Phase::Turn;
            self.game.turn = Some(Turn::new(1, self.game.round.starter));
        }
        Ok(vec![GameEvent::Declared { seat, value }])
    }

    fn apply_play(&mut self, seat: usize, indices: &[usize]) -> Result<Vec<GameEvent>, GameError> {
        let Some(turn) = self.game.turn.as_ref() else {
            return Err(GameError::InvalidPhaseAction {
                phase: Phase::Turn,
                action: "play",
                reason: "no turn in progress".to_string(),
            });
        };
        if turn.next_seat() != Some(seat) {
            return Err(GameError::InvalidPhaseAction {
                phase: Phase::Turn,
                action: "play",
                reason: format!("waiting on seat {:?} to play", turn.next_seat()),
            });
        }

        let hand = &self.game.players[seat].hand;
        let pieces = select_pieces(hand, indices)?;
        let combo = rules::classify(&pieces);

        match turn.required_count() {
            None if !combo.is_valid() => {
                return Err(GameError::invalid_combination(format!(
                    "leader must play a valid combination, got {}",
                    describe(&pieces)
                )));
            }
            Some(required) if pieces.len() != required => {
                return Err(GameError::invalid_combination(format!(
                    "this turn requires {} pieces, got {}",
                    required,
                    pieces.len()
                )));
            }
            _ => {}
        }

        let mut sorted = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        let hand = &mut self.game.players[seat].hand;
        for i in sorted {
            hand.remove(i);
        }

        let count = pieces.len();
        let mut events = vec![GameEvent::Played { seat, combo, count }];

        let complete = match self.game.turn.as_mut() {
            Some(turn) => {
                turn.plays.push(TurnPlay { seat, pieces, combo });
                turn.is_complete()
            }
            None => false,
        };
        if complete {
            events.extend(self.resolve_current_turn());
        }
        Ok(events)
    }

    fn resolve_current_turn(&mut self) -> Vec<GameEvent> {
        let Some(turn) = self.game.turn.take() else {
            return Vec::new();
        };
        let Some(outcome) = rules::resolve_turn(&turn.plays) else {
            return Vec::new();
        };

        self.game.players[outcome.winner].captured_piles += outcome.piles;
        self.game.round.pile_winners.push(PileRecord {
            turn_number: turn.turn_number,
            seat: outcome.winner,
            piles: outcome.piles,
        });
        let turn_number = turn.turn_number;
        self.game.last_turn = Some(ResolvedTurn {
            turn_number,
            plays: turn.plays,
            outcome,
        });

        let mut events = vec![GameEvent::TurnResolved {
            turn_number,
            outcome,
        }];

        if self.game.all_hands_empty() {
            events.push(self.score_round());
        } else {
            self.game.turn = Some(Turn::new(turn_number + 1, outcome.winner));
        }
        events
    }

    fn score_round(&mut self) -> GameEvent {
        let multiplier = self.game.round.redeal_multiplier;
        let scores: Vec<RoundScore> = self
            .game
            .players
            .iter_mut()
            .enumerate()
            .map(|(seat, p)| {
                let delta = rules::score_delta(p.declared_piles, p.captured_piles, multiplier);
                p.score += delta;
                RoundScore {
                    seat,
                    declared: p.declared_piles,
                    captured: p.captured_piles,
                    multiplier,
                    delta,
                    total: p.score,
                }
            })
            .collect();

        self.game.round_scores = scores.clone();
        self.game.phase = Phase::Scoring;
        GameEvent::RoundScored { scores }
    }

    fn finish_scoring(&mut self) -> Vec<GameEvent> {
        let rules = self.game.rules;
        let top = self.game.players.iter().map(|p| p.score).max().unwrap_or(0);
        let round_number = self.game.round.round_number;
        let out_of_rounds = rules.max_rounds.is_some_and(|max| round_number >= max);

        if top >= rules.win_score || out_of_rounds {
            let winners: Vec<usize> = self
                .game
                .players
                .iter()
                .enumerate()
                .filter(|(_, p)| p.score == top)
                .map(|(seat, _)| seat)
                .collect();
            self.game.winners = winners.clone();
            self.game.phase = Phase::GameOver;
            return vec![GameEvent::GameOver { winners }];
        }

        let starter = self
            .game
            .last_turn
            .as_ref()
            .map(|t| t.outcome.winner)
            .unwrap_or(self.game.round.starter);
        self.start_round(round_number + 1, Some(starter), 1)
    }

    fn open_declarations(&mut self) -> Vec<GameEvent> {
        self.game.phase = Phase::Declaration;
        vec![GameEvent::DeclarationsOpened {
            starter: self.game.round.starter,
        }]
    }

    /// Deal fresh hands and enter PREPARATION.
    fn start_round(&mut self, round_number: u32, starter: Option<usize>, multiplier: u32) -> Vec<GameEvent> {
        let hands = deal_hands(&mut self.rng);
        self.install_round(round_number, multiplier, starter, hands)
    }

    fn install_round(
        &mut self,
        round_number: u32,
        multiplier: u32,
        starter: Option<usize>,
        hands: [Vec<Piece>; SEATS],
    ) -> Vec<GameEvent> {
        let starter = starter.unwrap_or_else(|| red_general_holder(&hands).unwrap_or(0));
        let offers = RedealOffers::from_hands(&hands);
        let weak_seats: Vec<usize> = offers.offered_seats().collect();

        for (player, hand) in self.game.players.iter_mut().zip(hands) {
            player.hand = hand;
            player.declared_piles = 0;
            player.captured_piles = 0;
        }

        let mut round = Round::new(round_number, multiplier, starter);
        round.redeal_offers = offers;
        self.game.round = round;
        self.game.turn = None;
        self.game.last_turn = None;
        self.game.round_scores.clear();
        self.game.phase = Phase::Preparation;

        vec![GameEvent::RoundDealt {
            round_number,
            starter,
            weak_seats,
        }]
    }
}

fn red_general_holder(hands: &[Vec<Piece>]) -> Option<usize> {
    hands.iter().position(|hand| {
        hand.iter()
            .any(|p| p.kind == PieceKind::General && p.color == Color::Red)
    })
}

/// Highest rank among plays matching the leader's combo and size.
fn best_matching_rank(plays: &[TurnPlay]) -> u8 {
    let Some(lead) = plays.first() else {
        return 0;
    };
    plays
        .iter()
        .filter(|p| p.combo == lead.combo && p.pieces.len() == lead.pieces.len())
        .map(|p| rules::max_rank(&p.pieces))
        .max()
        .unwrap_or(0)
}

fn select_pieces(hand: &[Piece], indices: &[usize]) -> Result<Vec<Piece>, GameError> {
    if indices.is_empty() {
        return Err(GameError::invalid_combination("no pieces selected"));
    }
    if indices.len() > rules::MAX_COMBO_SIZE {
        return Err(GameError::invalid_combination(format!(
            "at most {} pieces may be played",
            rules::MAX_COMBO_SIZE
        )));
    }
    let mut seen = Vec::with_capacity(indices.len());
    for &i in indices {
        if i >= hand.len() {
            return Err(GameError::invalid_combination(format!(
                "hand index {} out of range (hand has {})",
                i,
                hand.len()
            )));
        }
        if seen.contains(&i) {
            return Err(GameError::invalid_combination(format!(
                "hand index {} selected twice",
                i
            )));
        }
        seen.push(i);
    }
    Ok(indices.iter().map(|&i| hand[i]).collect())
}

fn describe(pieces: &[Piece]) -> String {
    pieces
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::state::piece::Color::{Black, Red};
    use crate::state::piece::PieceKind::*;
    use pretty_assertions::assert_eq;

    fn p(kind: PieceKind, color: Color) -> Piece {
        Piece::new(kind, color)
    }

    fn players() -> Vec<GamePlayer> {
        (0..SEATS)
            .map(|i| GamePlayer::new(format!("P{}", i), false))
            .collect()
    }

    /// Hands with no weak seat; seat 0 holds the red general.
    fn strong_hands() -> [Vec<Piece>; SEATS] {
        [
            vec![
                p(General, Red),
                p(Soldier, Red),
                p(Soldier, Red),
                p(Chariot, Red),
                p(Horse, Red),
                p(Cannon, Red),
                p(Soldier, Black),
                p(Cannon, Black),
            ],
            vec![
                p(Advisor, Red),
                p(Advisor, Red),
                p(Soldier, Red),
                p(Soldier, Red),
                p(Horse, Red),
                p(Soldier, Black),
                p(Soldier, Black),
                p(Horse, Black),
            ],
            vec![
                p(Elephant, Red),
                p(Elephant, Red),
                p(Chariot, Red),
                p(Soldier, Red),
                p(Cannon, Red),
                p(Soldier, Black),
                p(Soldier, Black),
                p(Horse, Black),
            ],
            vec![
                p(General, Black),
                p(Advisor, Black),
                p(Advisor, Black),
                p(Elephant, Black),
                p(Elephant, Black),
                p(Chariot, Black),
                p(Chariot, Black),
                p(Cannon, Black),
            ],
        ]
    }

    fn weak_hand() -> Vec<Piece> {
        vec![
            p(Elephant, Black),
            p(Chariot, Red),
            p(Chariot, Black),
            p(Horse, Red),
            p(Horse, Black),
            p(Cannon, Red),
            p(Soldier, Black),
            p(Soldier, Black),
        ]
    }

    fn machine(hands: [Vec<Piece>; SEATS], starter: usize) -> PhaseStateMachine {
        PhaseStateMachine::from_hands(players(), GameRules::default(), hands, starter, Some(1))
    }

    fn declare_all(m: &mut PhaseStateMachine, values: [u8; SEATS]) {
        let order = declaration::declaration_order(m.game().round().starter);
        for (i, seat) in order.iter().enumerate() {
            m.apply(*seat, &GameAction::Declare { value: values[i] }).unwrap();
        }
    }

    #[test]
    fn test_no_weak_hands_auto_advances_to_declaration() {
        let mut m = machine(strong_hands(), 0);
        assert_eq!(m.phase(), Phase::Preparation);
        assert!(m.owed_seats().is_empty());

        let events = m.auto_advance().unwrap();
        assert_eq!(events, vec![GameEvent::DeclarationsOpened { starter: 0 }]);
        assert_eq!(m.phase(), Phase::Declaration);
        assert_eq!(m.owed_seats(), vec![0]);
        assert!(m.auto_advance().is_none());
    }

    #[test]
    fn test_all_weak_all_accept_redeals_with_multiplier_two() {
        let hands = [weak_hand(), weak_hand(), weak_hand(), weak_hand()];
        let mut m = machine(hands, 0);
        assert_eq!(m.owed_seats(), vec![0, 1, 2, 3]);

        for seat in 0..3 {
            m.apply(seat, &GameAction::RedealDecision { accept: true }).unwrap();
            assert_eq!(m.game().round().redeal_multiplier, 1);
        }
        let events = m.apply(3, &GameAction::RedealDecision { accept: true }).unwrap();

        assert!(events.contains(&GameEvent::Redealt {
            multiplier: 2,
            starter: 0
        }));
        assert_eq!(m.phase(), Phase::Preparation);
        assert_eq!(m.game().round().redeal_multiplier, 2);
        assert_eq!(m.game().round().round_number, 1);
        assert!(m.game().players().iter().all(|p| p.hand.len() == 8));
    }

    #[test]
    fn test_all_decline_proceeds_with_multiplier_one() {
        let mut hands = strong_hands();
        hands[2] = weak_hand();
        let mut m = machine(hands, 0);
        assert_eq!(m.owed_seats(), vec![2]);

        m.apply(2, &GameAction::RedealDecision { accept: false }).unwrap();
        assert_eq!(m.phase(), Phase::Declaration);
        assert_eq!(m.game().round().redeal_multiplier, 1);
    }

    #[test]
    fn test_wrong_phase_action_is_rejected_without_change() {
        let mut m = machine(strong_hands(), 0);
        let before = m.game().clone();

        let err = m.apply(0, &GameAction::Declare { value: 2 }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPhaseAction);
        let err = m.apply(0, &GameAction::RedealDecision { accept: true }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPhaseAction);
        assert_eq!(m.game(), &before);
    }

    #[test]
    fn test_declaration_scenario() {
        let mut m = machine(strong_hands(), 0);
        m.auto_advance();

        m.apply(0, &GameAction::Declare { value: 3 }).unwrap();
        m.apply(1, &GameAction::Declare { value: 1 }).unwrap();
        m.apply(2, &GameAction::Declare { value: 0 }).unwrap();

        let err = m.apply(3, &GameAction::Declare { value: 4 }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeclarationConstraintViolation);
        assert_eq!(m.phase(), Phase::Declaration);

        m.apply(3, &GameAction::Declare { value: 3 }).unwrap();
        assert_eq!(m.phase(), Phase::Turn);
        assert_ne!(m.game().round().declaration_total(), 8);
        assert_eq!(m.owed_seats(), vec![0]);
    }

    #[test]
    fn test_declaring_out_of_order_is_rejected() {
        let mut m = machine(strong_hands(), 1);
        m.auto_advance();
        let err = m.apply(0, &GameAction::Declare { value: 1 }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPhaseAction);
        assert!(m.apply(1, &GameAction::Declare { value: 1 }).is_ok());
    }

    #[test]
    fn test_leader_pair_follower_single_rejected_leader_wins_by_default() {
        let mut m = machine(strong_hands(), 0);
        m.auto_advance();
        declare_all(&mut m, [2, 2, 2, 1]);

        // Seat 0 leads the red soldier pair (hand indices 1 and 2).
        m.apply(0, &GameAction::Play { pieces: vec![1, 2] }).unwrap();

        let err = m.apply(1, &GameAction::Play { pieces: vec![0] }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCombination);
        assert_eq!(m.game().hand(1).unwrap().len(), 8);

        // Followers discard two non-matching pieces each.
        m.apply(1, &GameAction::Play { pieces: vec![0, 4] }).unwrap();
        m.apply(2, &GameAction::Play { pieces: vec![0, 2] }).unwrap();
        let events = m.apply(3, &GameAction::Play { pieces: vec![0, 5] }).unwrap();

        let outcome = match &events[1] {
            GameEvent::TurnResolved { outcome, .. } => *outcome,
            other => panic!("unexpected event {:?}", other),
        };
        assert_eq!(outcome.winner, 0);
        assert!(outcome.by_default);
        assert_eq!(m.game().player(0).unwrap().captured_piles, 2);
        assert_eq!(m.owed_seats(), vec![0]);
    }

    #[test]
    fn test_leader_must_play_valid_combo() {
        let mut m = machine(strong_hands(), 0);
        m.auto_advance();
        declare_all(&mut m, [2, 2, 2, 1]);

        let err = m.apply(0, &GameAction::Play { pieces: vec![0, 3] }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCombination);
        let err = m.apply(0, &GameAction::Play { pieces: vec![1, 1] }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCombination);
        let err = m.apply(0, &GameAction::Play { pieces: vec![9] }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCombination);
    }

    #[test]
    fn test_full_round_scores_and_starts_next() {
        let mut m = machine(strong_hands(), 0);
        m.auto_advance();
        declare_all(&mut m, [8, 0, 0, 1]);

        // Everyone plays singles, strongest piece first, until hands run out.
        while m.phase() == Phase::Turn {
            let seat = m.owed_seats()[0];
            m.apply(seat, &GameAction::Play { pieces: vec![0] }).unwrap();
        }
        assert_eq!(m.phase(), Phase::Scoring);

        let total: u8 = m.game().players().iter().map(|p| p.captured_piles).sum();
        assert_eq!(total, 8);
        for score in m.game().round_scores() {
            assert_eq!(
                score.delta,
                rules::score_delta(score.declared, score.captured, 1)
            );
        }

        m.auto_advance().unwrap();
        assert_eq!(m.phase(), Phase::Preparation);
        assert_eq!(m.game().round().round_number, 2);
        assert!(m.game().round().declarations.is_empty());
    }

    #[test]
    fn test_zero_streak_blocks_third_zero() {
        let mut m = machine(strong_hands(), 0);
        m.game.players[1].consecutive_zero_declares = 2;
        m.auto_advance();

        m.apply(0, &GameAction::Declare { value: 2 }).unwrap();
        let err = m.apply(1, &GameAction::Declare { value: 0 }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeclarationConstraintViolation);
        let err = m.apply(1, &GameAction::Declare { value: 5 }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeclarationConstraintViolation);
        m.apply(1, &GameAction::Declare { value: 1 }).unwrap();
        assert_eq!(m.game().player(1).unwrap().consecutive_zero_declares, 0);
    }

    #[test]
    fn test_game_over_when_threshold_reached() {
        let mut m = machine(strong_hands(), 0);
        m.game.players[2].score = 49;
        m.game.players[3].score = 49;
        m.auto_advance();
        declare_all(&mut m, [8, 0, 0, 1]);
        while m.phase() == Phase::Turn {
            let seat = m.owed_seats()[0];
            m.apply(seat, &GameAction::Play { pieces: vec![0] }).unwrap();
        }
        m.auto_advance().unwrap();

        let top = m.game().players().iter().map(|p| p.score).max().unwrap();
        assert!(top >= 50);
        assert_eq!(m.phase(), Phase::GameOver);
        for &w in m.game().winners() {
            assert_eq!(m.game().player(w).unwrap().score, top);
        }
        assert!(m.owed_seats().is_empty());
    }

    fn play_out_round(m: &mut PhaseStateMachine) {
        m.auto_advance();
        declare_all(m, [8, 0, 0, 1]);
        while m.phase() == Phase::Turn {
            let seat = m.owed_seats()[0];
            m.apply(seat, &GameAction::Play { pieces: vec![0] }).unwrap();
        }
        assert_eq!(m.phase(), Phase::Scoring);
    }

    #[test]
    fn test_late_round_below_threshold_deals_again() {
        let mut m = machine(strong_hands(), 0);
        m.game.round.round_number = 21;
        play_out_round(&mut m);
        m.auto_advance().unwrap();

        assert!(m.game().players().iter().all(|p| p.score < 50));
        assert_eq!(m.phase(), Phase::Preparation);
        assert_eq!(m.game().round().round_number, 22);
        assert!(m.game().winners().is_empty());
    }

    #[test]
    fn test_round_limit_ends_game_when_configured() {
        let rules = GameRules {
            max_rounds: Some(21),
            ..GameRules::default()
        };
        let mut m =
            PhaseStateMachine::from_hands(players(), rules, strong_hands(), 0, Some(1));
        m.game.round.round_number = 21;
        play_out_round(&mut m);
        m.auto_advance().unwrap();

        assert!(m.game().players().iter().all(|p| p.score < 50));
        assert_eq!(m.phase(), Phase::GameOver);
        assert!(!m.game().winners().is_empty());
    }

    #[test]
    fn test_seat_view_prompts() {
        let mut m = machine(strong_hands(), 0);
        m.auto_advance();
        let view = m.seat_view(0).unwrap();
        assert_eq!(
            view.prompt,
            Some(Prompt::Declare {
                previous: vec![],
                consecutive_zeros: 0
            })
        );
        assert_eq!(m.seat_view(1).unwrap().prompt, None);

        declare_all(&mut m, [2, 2, 2, 1]);
        assert_eq!(m.seat_view(0).unwrap().prompt, Some(Prompt::Lead));
        m.apply(0, &GameAction::Play { pieces: vec![1, 2] }).unwrap();
        assert_eq!(
            m.seat_view(1).unwrap().prompt,
            Some(Prompt::Follow {
                required: 2,
                leader_combo: ComboType::Pair,
                best_rank: 2
            })
        );
        assert!(m.seat_view(7).is_err());
    }

    #[test]
    fn test_red_general_holder_starts_first_round() {
        let mut hands = strong_hands();
        hands.swap(0, 2);
        let m = PhaseStateMachine::new(players(), GameRules::default(), Some(3));
        let holder = red_general_holder(&m.game().hands()).unwrap();
        assert_eq!(m.game().round().starter, holder);
        assert_eq!(red_general_holder(&hands), Some(2));
    }
}
