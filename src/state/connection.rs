//! Connection lifecycle per seat.
//!
//! Tracks whether each human seat has a live client, hands out grace tickets
//! on disconnect, and decides when the bot takes a seat over. Every
//! disconnect and reconnect bumps the seat's epoch so that a timer armed for
//! an earlier disconnect can never fire into a later one.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GameError;

use super::phase::ActionSource;
use super::seat::{SeatEvent, SeatState, SeatStatus};

/// Default grace period before a bot takes over (30 seconds).
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(30);

/// Public connection flags for one seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub seat: usize,
    pub is_connected: bool,
    pub is_bot_substitute: bool,
    pub disconnected_at: Option<DateTime<Utc>>,
}

/// Issued on disconnect; redeemed when the grace timer fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraceTicket {
    pub seat: usize,
    pub epoch: u64,
    pub deadline: Instant,
}

/// Connection state for a single seat.
#[derive(Debug, Clone)]
pub struct SeatConnection {
    pub seat: usize,

    /// Seated as a bot; never has a client.
    pub permanent_bot: bool,

    pub state: SeatState,

    /// Bumped on every disconnect and reconnect.
    pub epoch: u64,

    pub disconnected_at: Option<DateTime<Utc>>,
}

impl SeatConnection {
    fn new(seat: usize, permanent_bot: bool) -> Self {
        Self {
            seat,
            permanent_bot,
            state: SeatState::new(),
            epoch: 0,
            disconnected_at: None,
        }
    }

    /// Whether the bot currently chooses this seat's actions.
    pub fn is_bot_controlled(&self) -> bool {
        self.permanent_bot || self.state.is_bot_active()
    }

    pub fn record(&self) -> ConnectionRecord {
        if self.permanent_bot {
            return ConnectionRecord {
                seat: self.seat,
                is_connected: false,
                is_bot_substitute: false,
                disconnected_at: None,
            };
        }
        ConnectionRecord {
            seat: self.seat,
            is_connected: self.state.is_connected(),
            is_bot_substitute: self.state.is_bot_active(),
            disconnected_at: self.disconnected_at,
        }
    }
}

/// Connection tracker for the four seats of one room.
#[derive(Debug, Clone)]
pub struct ConnectionLifecycleTracker {
    seats: Vec<SeatConnection>,
    grace_period: Duration,
}

impl ConnectionLifecycleTracker {
    /// `bot_seats[i]` marks seat `i` as permanently bot-controlled.
    pub fn new(bot_seats: &[bool], grace_period: Duration) -> Self {
        Self {
            seats: bot_seats
                .iter()
                .enumerate()
                .map(|(seat, &is_bot)| SeatConnection::new(seat, is_bot))
                .collect(),
            grace_period,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn get(&self, seat: usize) -> Option<&SeatConnection> {
        self.seats.get(seat)
    }

    fn get_mut(&mut self, seat: usize) -> Result<&mut SeatConnection, GameError> {
        self.seats.get_mut(seat).ok_or(GameError::UnknownSeat(seat))
    }

    pub fn status(&self, seat: usize) -> Option<SeatStatus> {
        self.seats.get(seat).map(|s| *s.state.status())
    }

    /// Start the grace period for a seat.
    ///
    /// Returns `None` when nothing changed: the seat is a permanent bot or is
    /// already disconnected.
    pub fn disconnect(&mut self, seat: usize, now: Instant) -> Result<Option<GraceTicket>, GameError> {
        let grace = self.grace_period;
        let conn = self.get_mut(seat)?;
        if conn.permanent_bot || !conn.state.is_connected() {
            return Ok(None);
        }

        // Seat is connected, so Disconnect is always a valid transition here.
        if conn.state.apply_at(SeatEvent::Disconnect { grace }, now).is_err() {
            return Ok(None);
        }
        conn.epoch += 1;
        conn.disconnected_at = Some(Utc::now());

        Ok(conn.state.status().grace_until().map(|deadline| GraceTicket {
            seat,
            epoch: conn.epoch,
            deadline,
        }))
    }

    /// Redeem a grace ticket. Returns true if the bot took the seat over.
    ///
    /// Stale tickets (epoch moved on) and early ones are no-ops.
    pub fn expire(&mut self, ticket: GraceTicket, now: Instant) -> bool {
        let Some(conn) = self.seats.get_mut(ticket.seat) else {
            return false;
        };
        if conn.epoch != ticket.epoch {
            return false;
        }
        conn.state.apply_at(SeatEvent::GraceExpired, now).is_ok()
    }

    /// Give the seat back to its client. The bot flag clears in the same step.
    ///
    /// Returns true if the seat was not already connected.
    pub fn reconnect(&mut self, seat: usize) -> Result<bool, GameError> {
        let conn = self.get_mut(seat)?;
        if conn.permanent_bot {
            return Err(GameError::SeatNotOwnedByActor {
                seat,
                actor: ActionSource::Human(seat),
            });
        }

        let was_connected = conn.state.is_connected();
        conn.epoch += 1;
        if was_connected {
            return Ok(false);
        }
        conn.state
            .apply_mut(SeatEvent::Reconnect)
            .map_err(|_| GameError::UnknownSeat(seat))?;
        conn.disconnected_at = None;
        Ok(true)
    }

    pub fn is_bot_controlled(&self, seat: usize) -> bool {
        self.seats.get(seat).is_some_and(|s| s.is_bot_controlled())
    }

    /// Whether `source` may act for `seat` right now.
    pub fn controls(&self, seat: usize, source: ActionSource) -> bool {
        if source.seat() != seat {
            return false;
        }
        match source {
            ActionSource::Human(_) => !self.is_bot_controlled(seat),
            ActionSource::Bot(_) => self.is_bot_controlled(seat),
        }
    }

    /// Grace deadline of a seat still waiting for its client.
    pub fn grace_deadline(&self, seat: usize) -> Option<Instant> {
        self.seats.get(seat).and_then(|s| s.state.status().grace_until())
    }

    pub fn records(&self) -> Vec<ConnectionRecord> {
        self.seats.iter().map(SeatConnection::record).collect()
    }

    /// Human seats with a live client.
    pub fn connected_seats(&self) -> Vec<usize> {
        self.seats
            .iter()
            .filter(|s| !s.permanent_bot && s.state.is_connected())
            .map(|s| s.seat)
            .collect()
    }

    pub fn connected_count(&self) -> usize {
        self.connected_seats().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GRACE: Duration = Duration::from_secs(30);

    fn tracker() -> ConnectionLifecycleTracker {
        ConnectionLifecycleTracker::new(&[false, false, false, true], GRACE)
    }

    #[test]
    fn test_initial_records() {
        let tracker = tracker();
        let records = tracker.records();
        assert_eq!(records.len(), 4);
        assert!(records[0].is_connected);
        assert!(!records[3].is_connected);
        assert!(!records[3].is_bot_substitute);
        assert_eq!(tracker.connected_count(), 3);
        assert!(tracker.is_bot_controlled(3));
        assert!(!tracker.is_bot_controlled(0));
    }

    #[test]
    fn test_disconnect_then_expire() {
        let start = Instant::now();
        let mut tracker = tracker();

        let ticket = tracker.disconnect(2, start).unwrap().unwrap();
        assert_eq!(ticket.seat, 2);
        assert_eq!(ticket.deadline, start + GRACE);
        assert!(tracker.disconnect(2, start).unwrap().is_none());

        let record = &tracker.records()[2];
        assert!(!record.is_connected);
        assert!(!record.is_bot_substitute);
        assert!(record.disconnected_at.is_some());

        assert!(!tracker.expire(ticket, start + Duration::from_secs(5)));
        assert!(tracker.expire(ticket, start + GRACE));
        assert!(tracker.records()[2].is_bot_substitute);
        assert!(tracker.controls(2, ActionSource::Bot(2)));
        assert!(!tracker.controls(2, ActionSource::Human(2)));
    }

    #[test]
    fn test_stale_ticket_is_noop() {
        let start = Instant::now();
        let mut tracker = tracker();

        let stale = tracker.disconnect(1, start).unwrap().unwrap();
        assert!(tracker.reconnect(1).unwrap());
        let fresh = tracker.disconnect(1, start).unwrap().unwrap();
        assert!(fresh.epoch > stale.epoch);

        assert!(!tracker.expire(stale, start + GRACE));
        assert!(!tracker.is_bot_controlled(1));
        assert!(tracker.expire(fresh, start + GRACE));
    }

    #[test]
    fn test_reconnect_clears_bot_flag() {
        let start = Instant::now();
        let mut tracker = tracker();
        let ticket = tracker.disconnect(0, start).unwrap().unwrap();
        tracker.expire(ticket, start + GRACE);

        assert!(tracker.reconnect(0).unwrap());
        let record = &tracker.records()[0];
        assert!(record.is_connected);
        assert!(!record.is_bot_substitute);
        assert_eq!(record.disconnected_at, None);
        assert!(!tracker.reconnect(0).unwrap());
    }

    #[test]
    fn test_ownership() {
        let tracker = tracker();
        assert!(tracker.controls(0, ActionSource::Human(0)));
        assert!(!tracker.controls(0, ActionSource::Human(1)));
        assert!(!tracker.controls(0, ActionSource::Bot(0)));
        assert!(tracker.controls(3, ActionSource::Bot(3)));
        assert!(!tracker.controls(3, ActionSource::Human(3)));
    }

    #[test]
    fn test_permanent_bot_seat() {
        let mut tracker = tracker();
        assert!(tracker.disconnect(3, Instant::now()).unwrap().is_none());
        assert!(tracker.reconnect(3).is_err());
        assert!(tracker.disconnect(9, Instant::now()).is_err());
    }
}
