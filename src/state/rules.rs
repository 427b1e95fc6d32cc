//! Rule engine: combo classification, turn resolution and scoring.
//!
//! Combos are built from one colour only. Multi-kind combos draw from one of
//! two fixed triads, {GENERAL, ADVISOR, ELEPHANT} or {CHARIOT, HORSE, CANNON};
//! same-kind groups of three or more are soldiers only.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::piece::{Piece, PieceKind};

/// Largest group a single play may contain.
pub const MAX_COMBO_SIZE: usize = 6;

/// Classified shape of a group of pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComboType {
    Single,
    Pair,
    ThreeOfAKind,
    Straight,
    FourOfAKind,
    ExtendedStraight,
    FiveOfAKind,
    DoubleStraight,
    Invalid,
}

impl ComboType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "SINGLE",
            Self::Pair => "PAIR",
            Self::ThreeOfAKind => "THREE_OF_A_KIND",
            Self::Straight => "STRAIGHT",
            Self::FourOfAKind => "FOUR_OF_A_KIND",
            Self::ExtendedStraight => "EXTENDED_STRAIGHT",
            Self::FiveOfAKind => "FIVE_OF_A_KIND",
            Self::DoubleStraight => "DOUBLE_STRAIGHT",
            Self::Invalid => "INVALID",
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid)
    }
}

impl fmt::Display for ComboType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of the triad a kind belongs to, if any.
fn triad_of(kind: PieceKind) -> Option<usize> {
    match kind {
        PieceKind::General | PieceKind::Advisor | PieceKind::Elephant => Some(0),
        PieceKind::Chariot | PieceKind::Horse | PieceKind::Cannon => Some(1),
        PieceKind::Soldier => None,
    }
}

/// Position of a kind inside its triad.
fn triad_slot(kind: PieceKind) -> usize {
    match kind {
        PieceKind::General | PieceKind::Chariot => 0,
        PieceKind::Advisor | PieceKind::Horse => 1,
        _ => 2,
    }
}

/// Classify a group of pieces.
pub fn classify(pieces: &[Piece]) -> ComboType {
    let Some(first) = pieces.first() else {
        return ComboType::Invalid;
    };
    if pieces.len() > MAX_COMBO_SIZE || pieces.iter().any(|p| p.color != first.color) {
        return ComboType::Invalid;
    }

    match pieces.len() {
        1 => return ComboType::Single,
        2 => {
            return if pieces[1].kind == first.kind {
                ComboType::Pair
            } else {
                ComboType::Invalid
            };
        }
        _ => {}
    }

    if pieces.iter().all(|p| p.kind == PieceKind::Soldier) {
        return match pieces.len() {
            3 => ComboType::ThreeOfAKind,
            4 => ComboType::FourOfAKind,
            5 => ComboType::FiveOfAKind,
            _ => ComboType::Invalid,
        };
    }

    let Some(triad) = triad_of(first.kind) else {
        return ComboType::Invalid;
    };
    if pieces.iter().any(|p| triad_of(p.kind) != Some(triad)) {
        return ComboType::Invalid;
    }

    let mut counts = [0usize; 3];
    for p in pieces {
        counts[triad_slot(p.kind)] += 1;
    }
    let all_present = counts.iter().all(|&c| c >= 1);
    let max_count = counts.iter().copied().max().unwrap_or(0);

    match pieces.len() {
        3 if counts == [1, 1, 1] => ComboType::Straight,
        4 | 5 if all_present && max_count <= 2 => ComboType::ExtendedStraight,
        6 if counts == [2, 2, 2] => ComboType::DoubleStraight,
        _ => ComboType::Invalid,
    }
}

/// Highest single rank in a group.
pub fn max_rank(pieces: &[Piece]) -> u8 {
    pieces.iter().map(|p| p.rank).max().unwrap_or(0)
}

/// One seat's submission within a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnPlay {
    pub seat: usize,
    pub pieces: Vec<Piece>,
    pub combo: ComboType,
}

/// Winner of a resolved turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub winner: usize,
    pub piles: u8,
    /// True when no follower matched the leader's combo.
    pub by_default: bool,
}

/// Resolve a completed turn. `plays[0]` is the leader.
///
/// Followers compete only with the leader's combo type and piece count; the
/// highest single rank wins and ties go to the earlier submission.
pub fn resolve_turn(plays: &[TurnPlay]) -> Option<TurnOutcome> {
    let leader = plays.first()?;
    let mut best = leader;
    let mut contested = false;

    for play in &plays[1..] {
        if play.combo != leader.combo || play.pieces.len() != leader.pieces.len() {
            continue;
        }
        contested = true;
        if max_rank(&play.pieces) > max_rank(&best.pieces) {
            best = play;
        }
    }

    Some(TurnOutcome {
        winner: best.seat,
        piles: leader.pieces.len() as u8,
        by_default: !contested,
    })
}

/// Score change for one player at the end of a round.
pub fn score_delta(declared: u8, captured: u8, multiplier: u32) -> i32 {
    let declared = i32::from(declared);
    let captured = i32::from(captured);
    let base = match (declared, captured) {
        (0, 0) => 3,
        (0, c) => -c,
        (d, c) if d == c => d + 5,
        (d, c) => -(d - c).abs(),
    };
    base * multiplier as i32
}

/// Every valid combo that can be formed from a hand, as hand indices.
pub fn valid_combos(hand: &[Piece]) -> Vec<(Vec<usize>, ComboType)> {
    let n = hand.len().min(16);
    let mut out = Vec::new();
    for mask in 1u32..(1u32 << n) {
        if mask.count_ones() as usize > MAX_COMBO_SIZE {
            continue;
        }
        let indices: Vec<usize> = (0..n).filter(|i| mask & (1 << i) != 0).collect();
        let pieces: Vec<Piece> = indices.iter().map(|&i| hand[i]).collect();
        let combo = classify(&pieces);
        if combo.is_valid() {
            out.push((indices, combo));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::piece::Color;

    fn p(kind: PieceKind, color: Color) -> Piece {
        Piece::new(kind, color)
    }

    use Color::{Black, Red};
    use PieceKind::*;

    #[test]
    fn test_single_and_pair() {
        assert_eq!(classify(&[p(Horse, Red)]), ComboType::Single);
        assert_eq!(classify(&[p(Horse, Red), p(Horse, Red)]), ComboType::Pair);
        assert_eq!(classify(&[p(Soldier, Black), p(Soldier, Black)]), ComboType::Pair);
        assert_eq!(classify(&[p(Horse, Red), p(Horse, Black)]), ComboType::Invalid);
        assert_eq!(classify(&[p(Horse, Red), p(Cannon, Red)]), ComboType::Invalid);
    }

    #[test]
    fn test_soldier_groups() {
        let s = p(Soldier, Red);
        assert_eq!(classify(&[s, s, s]), ComboType::ThreeOfAKind);
        assert_eq!(classify(&[s, s, s, s]), ComboType::FourOfAKind);
        assert_eq!(classify(&[s, s, s, s, s]), ComboType::FiveOfAKind);
        assert_eq!(classify(&[s, s, p(Soldier, Black)]), ComboType::Invalid);
        // Only soldiers form same-kind groups of three.
        assert_eq!(
            classify(&[p(Horse, Red), p(Horse, Red), p(Horse, Red)]),
            ComboType::Invalid
        );
    }

    #[test]
    fn test_straights() {
        assert_eq!(
            classify(&[p(General, Red), p(Advisor, Red), p(Elephant, Red)]),
            ComboType::Straight
        );
        assert_eq!(
            classify(&[p(Chariot, Black), p(Horse, Black), p(Cannon, Black)]),
            ComboType::Straight
        );
        // Mixed triads
        assert_eq!(
            classify(&[p(General, Red), p(Horse, Red), p(Cannon, Red)]),
            ComboType::Invalid
        );
        // Mixed colours
        assert_eq!(
            classify(&[p(Chariot, Red), p(Horse, Black), p(Cannon, Red)]),
            ComboType::Invalid
        );
    }

    #[test]
    fn test_extended_and_double_straights() {
        let (c, h, n) = (p(Chariot, Red), p(Horse, Red), p(Cannon, Red));
        assert_eq!(classify(&[c, h, n, n]), ComboType::ExtendedStraight);
        assert_eq!(classify(&[c, c, h, n, n]), ComboType::ExtendedStraight);
        assert_eq!(classify(&[c, c, h, h, n, n]), ComboType::DoubleStraight);
        // Missing a kind
        assert_eq!(classify(&[c, c, h, h]), ComboType::Invalid);
        assert_eq!(classify(&[c, c, c, h, n, n]), ComboType::Invalid);
    }

    #[test]
    fn test_empty_and_oversized() {
        assert_eq!(classify(&[]), ComboType::Invalid);
        let s = p(Soldier, Red);
        assert_eq!(classify(&[s; 7]), ComboType::Invalid);
    }

    #[test]
    fn test_resolve_highest_matching_rank_wins() {
        let plays = vec![
            TurnPlay {
                seat: 1,
                pieces: vec![p(Horse, Black), p(Horse, Black)],
                combo: ComboType::Pair,
            },
            TurnPlay {
                seat: 2,
                pieces: vec![p(Chariot, Red), p(Chariot, Red)],
                combo: ComboType::Pair,
            },
            TurnPlay {
                seat: 3,
                pieces: vec![p(General, Red), p(Soldier, Red)],
                combo: ComboType::Invalid,
            },
            TurnPlay {
                seat: 0,
                pieces: vec![p(Cannon, Red), p(Cannon, Red)],
                combo: ComboType::Pair,
            },
        ];
        let outcome = resolve_turn(&plays).unwrap();
        assert_eq!(outcome.winner, 2);
        assert_eq!(outcome.piles, 2);
        assert!(!outcome.by_default);
    }

    #[test]
    fn test_resolve_tie_goes_to_first_submission() {
        let plays = vec![
            TurnPlay {
                seat: 0,
                pieces: vec![p(Cannon, Black)],
                combo: ComboType::Single,
            },
            TurnPlay {
                seat: 1,
                pieces: vec![p(Horse, Red)],
                combo: ComboType::Single,
            },
            TurnPlay {
                seat: 2,
                pieces: vec![p(Horse, Red)],
                combo: ComboType::Single,
            },
        ];
        assert_eq!(resolve_turn(&plays).unwrap().winner, 1);
    }

    #[test]
    fn test_resolve_leader_wins_by_default() {
        let s = p(Soldier, Red);
        let plays = vec![
            TurnPlay {
                seat: 3,
                pieces: vec![s, s],
                combo: ComboType::Pair,
            },
            TurnPlay {
                seat: 0,
                pieces: vec![p(General, Red), p(Horse, Black)],
                combo: ComboType::Invalid,
            },
        ];
        let outcome = resolve_turn(&plays).unwrap();
        assert_eq!(outcome.winner, 3);
        assert!(outcome.by_default);
    }

    #[test]
    fn test_score_delta() {
        assert_eq!(score_delta(2, 2, 1), 7);
        assert_eq!(score_delta(0, 0, 1), 3);
        assert_eq!(score_delta(3, 1, 1), -2);
        assert_eq!(score_delta(0, 4, 1), -4);
        assert_eq!(score_delta(1, 5, 1), -4);
        assert_eq!(score_delta(2, 2, 3), 21);
        assert_eq!(score_delta(0, 2, 2), -4);
    }

    #[test]
    fn test_valid_combos_of_small_hand() {
        let hand = vec![p(Soldier, Red), p(Soldier, Red), p(Horse, Black)];
        let combos = valid_combos(&hand);
        // three singles + one pair
        assert_eq!(combos.len(), 4);
        assert!(combos
            .iter()
            .any(|(idx, c)| *c == ComboType::Pair && idx == &vec![0, 1]));
    }
}
