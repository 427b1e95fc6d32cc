//! Seating a room before its first deal.
//!
//! All four seats must be filled, by a human or a bot, with names unique
//! within the room.

use crate::error::GameError;

use super::game::{GamePlayer, SEATS};

/// Whoever sits in a seat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatOccupant {
    /// Display name
    pub name: String,

    /// Permanently bot-controlled
    pub is_bot: bool,
}

impl SeatOccupant {
    pub fn human(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_bot: false,
        }
    }

    pub fn bot(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_bot: true,
        }
    }
}

/// The four seats of a room being set up.
#[derive(Debug, Clone, Default)]
pub struct Seating {
    seats: [Option<SeatOccupant>; SEATS],
}

impl Seating {
    pub fn new() -> Self {
        Self::default()
    }

    /// Four bots named `Bot 1`..`Bot 4`.
    pub fn all_bots() -> Self {
        let mut seating = Self::new();
        seating.fill_with_bots();
        seating
    }

    /// Seat humans in order, filling the rest with bots.
    pub fn with_humans<I, S>(names: I) -> Result<Self, GameError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seating = Self::new();
        for (seat, name) in names.into_iter().enumerate() {
            seating.sit(seat, SeatOccupant::human(name))?;
        }
        seating.fill_with_bots();
        Ok(seating)
    }

    /// Put an occupant in a seat.
    pub fn sit(&mut self, seat: usize, occupant: SeatOccupant) -> Result<(), GameError> {
        if occupant.name.trim().is_empty() {
            return Err(GameError::InvalidSeating("name must not be empty".to_string()));
        }
        if self.is_taken(&occupant.name) {
            return Err(GameError::InvalidSeating(format!(
                "name {} is already seated",
                occupant.name
            )));
        }
        let slot = self.seats.get_mut(seat).ok_or(GameError::UnknownSeat(seat))?;
        if slot.is_some() {
            return Err(GameError::InvalidSeating(format!("seat {} is taken", seat)));
        }
        *slot = Some(occupant);
        Ok(())
    }

    /// Empty a seat.
    pub fn leave(&mut self, seat: usize) -> Option<SeatOccupant> {
        self.seats.get_mut(seat)?.take()
    }

    /// Put bots in every empty seat.
    pub fn fill_with_bots(&mut self) {
        for seat in 0..SEATS {
            if self.seats[seat].is_some() {
                continue;
            }
            let mut n = seat + 1;
            let name = loop {
                let candidate = format!("Bot {}", n);
                if !self.is_taken(&candidate) {
                    break candidate;
                }
                n += SEATS;
            };
            self.seats[seat] = Some(SeatOccupant::bot(name));
        }
    }

    pub fn occupant(&self, seat: usize) -> Option<&SeatOccupant> {
        self.seats.get(seat).and_then(Option::as_ref)
    }

    pub fn is_full(&self) -> bool {
        self.seats.iter().all(Option::is_some)
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.seats.iter().flatten().any(|o| o.name == name)
    }

    pub fn bot_seats(&self) -> [bool; SEATS] {
        std::array::from_fn(|i| self.seats[i].as_ref().is_some_and(|o| o.is_bot))
    }

    /// Turn a full seating into game players.
    pub fn into_players(self) -> Result<Vec<GamePlayer>, GameError> {
        self.seats
            .into_iter()
            .enumerate()
            .map(|(seat, occupant)| {
                occupant
                    .map(|o| GamePlayer::new(o.name, o.is_bot))
                    .ok_or_else(|| GameError::InvalidSeating(format!("seat {} is empty", seat)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_with_humans_fills_bots() {
        let seating = Seating::with_humans(["Alice", "Bob"]).unwrap();
        assert!(seating.is_full());
        assert_eq!(seating.bot_seats(), [false, false, true, true]);
        assert_eq!(seating.occupant(2).unwrap().name, "Bot 3");

        let players = seating.into_players().unwrap();
        assert_eq!(players[0].name, "Alice");
        assert!(players[3].is_bot);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Seating::with_humans(["Alice", "Alice"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSeating);
    }

    #[test]
    fn test_seat_errors() {
        let mut seating = Seating::new();
        seating.sit(1, SeatOccupant::human("Alice")).unwrap();
        assert!(seating.sit(1, SeatOccupant::human("Bob")).is_err());
        assert_eq!(
            seating.sit(4, SeatOccupant::human("Bob")).unwrap_err().kind(),
            ErrorKind::UnknownSeat
        );
        assert!(seating.sit(2, SeatOccupant::human("  ")).is_err());
    }

    #[test]
    fn test_incomplete_seating_rejected() {
        let mut seating = Seating::new();
        seating.sit(0, SeatOccupant::human("Alice")).unwrap();
        let err = seating.into_players().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSeating);
    }

    #[test]
    fn test_bot_names_avoid_humans() {
        let mut seating = Seating::new();
        seating.sit(0, SeatOccupant::human("Bot 2")).unwrap();
        seating.fill_with_bots();
        assert_eq!(seating.occupant(1).unwrap().name, "Bot 6");
        assert_eq!(seating.leave(1).unwrap().name, "Bot 6");
        assert!(!seating.is_full());
    }
}
