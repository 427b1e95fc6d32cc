//! Pieces and the 32-piece deck.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Pieces per full deck.
pub const DECK_SIZE: usize = 32;

/// Pieces dealt to each seat per round.
pub const HAND_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PieceKind {
    General,
    Advisor,
    Elephant,
    Chariot,
    Horse,
    Cannon,
    Soldier,
}

impl PieceKind {
    pub const ALL: [PieceKind; 7] = [
        Self::General,
        Self::Advisor,
        Self::Elephant,
        Self::Chariot,
        Self::Horse,
        Self::Cannon,
        Self::Soldier,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "GENERAL",
            Self::Advisor => "ADVISOR",
            Self::Elephant => "ELEPHANT",
            Self::Chariot => "CHARIOT",
            Self::Horse => "HORSE",
            Self::Cannon => "CANNON",
            Self::Soldier => "SOLDIER",
        }
    }

    /// Copies of this kind per colour.
    pub fn copies(&self) -> usize {
        match self {
            Self::General => 1,
            Self::Soldier => 5,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Color {
    Red,
    Black,
}

impl Color {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "RED",
            Self::Black => "BLACK",
        }
    }
}

/// An immutable game piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
    pub rank: u8,
}

impl Piece {
    /// Build a piece with its fixed rank.
    pub fn new(kind: PieceKind, color: Color) -> Self {
        Self {
            kind,
            color,
            rank: rank_of(kind, color),
        }
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}({})", self.kind.as_str(), self.color.as_str(), self.rank)
    }
}

/// Fixed rank for a kind and colour. Red outranks black of the same kind.
pub fn rank_of(kind: PieceKind, color: Color) -> u8 {
    let red = match kind {
        PieceKind::General => 14,
        PieceKind::Advisor => 12,
        PieceKind::Elephant => 10,
        PieceKind::Chariot => 8,
        PieceKind::Horse => 6,
        PieceKind::Cannon => 4,
        PieceKind::Soldier => 2,
    };
    match color {
        Color::Red => red,
        Color::Black => red - 1,
    }
}

/// The full deck in a fixed order (red first, strongest first).
pub fn build_deck() -> Vec<Piece> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for color in [Color::Red, Color::Black] {
        for kind in PieceKind::ALL {
            for _ in 0..kind.copies() {
                deck.push(Piece::new(kind, color));
            }
        }
    }
    deck
}

/// Shuffle a fresh deck and split it into four hands of [`HAND_SIZE`].
/// Each hand is sorted strongest first.
pub fn deal_hands<R: Rng + ?Sized>(rng: &mut R) -> [Vec<Piece>; 4] {
    let mut deck = build_deck();
    deck.shuffle(rng);

    let mut hands: [Vec<Piece>; 4] = Default::default();
    for (i, hand) in hands.iter_mut().enumerate() {
        let mut dealt = deck[i * HAND_SIZE..(i + 1) * HAND_SIZE].to_vec();
        sort_hand(&mut dealt);
        *hand = dealt;
    }
    hands
}

/// Sort strongest first; ties keep a stable kind/colour order.
pub fn sort_hand(hand: &mut [Piece]) {
    hand.sort_by(|a, b| {
        b.rank
            .cmp(&a.rank)
            .then(a.kind.cmp(&b.kind))
            .then(a.color.cmp(&b.color))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_deck_composition() {
        let deck = build_deck();
        assert_eq!(deck.len(), DECK_SIZE);

        let soldiers = deck.iter().filter(|p| p.kind == PieceKind::Soldier).count();
        assert_eq!(soldiers, 10);

        let red_generals: Vec<_> = deck
            .iter()
            .filter(|p| p.kind == PieceKind::General && p.color == Color::Red)
            .collect();
        assert_eq!(red_generals.len(), 1);
        assert_eq!(red_generals[0].rank, 14);
    }

    #[test]
    fn test_ranks() {
        assert_eq!(rank_of(PieceKind::General, Color::Black), 13);
        assert_eq!(rank_of(PieceKind::Elephant, Color::Black), 9);
        assert_eq!(rank_of(PieceKind::Soldier, Color::Red), 2);
        assert_eq!(rank_of(PieceKind::Soldier, Color::Black), 1);
    }

    #[test]
    fn test_deal_is_a_partition() {
        let mut rng = StdRng::seed_from_u64(7);
        let hands = deal_hands(&mut rng);

        let mut all: Vec<Piece> = hands.iter().flatten().copied().collect();
        assert!(hands.iter().all(|h| h.len() == HAND_SIZE));

        let mut deck = build_deck();
        sort_hand(&mut all);
        sort_hand(&mut deck);
        assert_eq!(all, deck);
    }

    #[test]
    fn test_seeded_deal_is_reproducible() {
        let a = deal_hands(&mut StdRng::seed_from_u64(42));
        let b = deal_hands(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_display() {
        let p = Piece::new(PieceKind::Horse, Color::Black);
        assert_eq!(p.to_string(), "HORSE_BLACK(5)");
    }
}
