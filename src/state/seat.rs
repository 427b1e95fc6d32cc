//! Seat control state machine.
//!
//! Tracks who is driving a human seat and validates transitions.
//!
//! # State Diagram
//!
//! ```text
//! ┌──────────────┐     disconnect     ┌───────────────────┐
//! │  Connected   │───────────────────▶│ DisconnectedGrace │
//! └──────────────┘                    └─────────┬─────────┘
//!        ▲                                      │ grace expired
//!        │ reconnect                            ▼
//!        │                            ┌───────────────────┐
//!        └────────────────────────────│     BotActive     │
//!                                     └───────────────────┘
//! ```
//!
//! Reconnect is accepted from every state.

use std::fmt;
use std::time::{Duration, Instant};

/// Who controls a human seat right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeatStatus {
    #[default]
    Connected,

    /// Client gone; the seat waits until `grace_until` before a bot takes over.
    DisconnectedGrace {
        since: Instant,
        grace_until: Instant,
    },

    /// Grace expired; the bot plays for the seat.
    BotActive { since: Instant },
}

impl SeatStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn is_bot_active(&self) -> bool {
        matches!(self, Self::BotActive { .. })
    }

    pub fn is_in_grace(&self) -> bool {
        matches!(self, Self::DisconnectedGrace { .. })
    }

    /// Deadline of the current grace period, if any.
    pub fn grace_until(&self) -> Option<Instant> {
        match self {
            Self::DisconnectedGrace { grace_until, .. } => Some(*grace_until),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Connected => "CONNECTED",
            Self::DisconnectedGrace { .. } => "DISCONNECTED_GRACE",
            Self::BotActive { .. } => "BOT_ACTIVE",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State transition events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatEvent {
    Disconnect { grace: Duration },
    GraceExpired,
    Reconnect,
}

/// Error when a state transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: SeatStatus,
    pub event: SeatEvent,
    pub reason: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid transition from {} via {:?}: {}",
            self.from, self.event, self.reason
        )
    }
}

impl std::error::Error for InvalidTransition {}

/// Seat state machine.
#[derive(Debug, Clone, Default)]
pub struct SeatState {
    status: SeatStatus,
}

impl SeatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a seat state at a specific status (for restoring state).
    pub fn at(status: SeatStatus) -> Self {
        Self { status }
    }

    pub fn status(&self) -> &SeatStatus {
        &self.status
    }

    /// Apply an event, returning the new state or an error.
    pub fn apply(&self, event: SeatEvent) -> Result<Self, InvalidTransition> {
        Ok(Self {
            status: self.transition(&event, Instant::now())?,
        })
    }

    /// Apply an event in place.
    pub fn apply_mut(&mut self, event: SeatEvent) -> Result<(), InvalidTransition> {
        self.apply_at(event, Instant::now())
    }

    /// Apply an event as of `now`.
    pub fn apply_at(&mut self, event: SeatEvent, now: Instant) -> Result<(), InvalidTransition> {
        self.status = self.transition(&event, now)?;
        Ok(())
    }

    fn transition(&self, event: &SeatEvent, now: Instant) -> Result<SeatStatus, InvalidTransition> {
        use SeatEvent::*;
        use SeatStatus::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: self.status,
            event: *event,
            reason,
        };

        match (&self.status, event) {
            (Connected, Disconnect { grace }) => Ok(DisconnectedGrace {
                since: now,
                grace_until: now + *grace,
            }),
            (_, Disconnect { .. }) => Err(invalid("Already disconnected")),

            (DisconnectedGrace { grace_until, .. }, GraceExpired) if now >= *grace_until => {
                Ok(BotActive { since: now })
            }
            (DisconnectedGrace { .. }, GraceExpired) => Err(invalid("Grace period not over")),
            (Connected, GraceExpired) => Err(invalid("Seat is connected")),
            (BotActive { .. }, GraceExpired) => Err(invalid("Bot already active")),

            (_, Reconnect) => Ok(Connected),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    pub fn is_bot_active(&self) -> bool {
        self.status.is_bot_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRACE: Duration = Duration::from_secs(30);

    #[test]
    fn test_initial_state() {
        let state = SeatState::new();
        assert!(state.is_connected());
        assert_eq!(*state.status(), SeatStatus::Connected);
    }

    #[test]
    fn test_disconnect_expire_reconnect() {
        let start = Instant::now();
        let mut state = SeatState::new();

        state
            .apply_at(SeatEvent::Disconnect { grace: GRACE }, start)
            .unwrap();
        assert!(state.status().is_in_grace());
        assert_eq!(state.status().grace_until(), Some(start + GRACE));

        state
            .apply_at(SeatEvent::GraceExpired, start + GRACE)
            .unwrap();
        assert!(state.is_bot_active());

        state.apply_mut(SeatEvent::Reconnect).unwrap();
        assert!(state.is_connected());
    }

    #[test]
    fn test_early_expiry_rejected() {
        let start = Instant::now();
        let mut state = SeatState::new();
        state
            .apply_at(SeatEvent::Disconnect { grace: GRACE }, start)
            .unwrap();

        let err = state
            .apply_at(SeatEvent::GraceExpired, start + Duration::from_secs(1))
            .unwrap_err();
        assert_eq!(err.reason, "Grace period not over");
        assert!(state.status().is_in_grace());
    }

    #[test]
    fn test_reconnect_within_grace() {
        let mut state = SeatState::new();
        state
            .apply_mut(SeatEvent::Disconnect { grace: GRACE })
            .unwrap();
        state.apply_mut(SeatEvent::Reconnect).unwrap();
        assert!(state.is_connected());
    }

    #[test]
    fn test_invalid_transitions() {
        let state = SeatState::new();
        assert!(state.apply(SeatEvent::GraceExpired).is_err());

        let disconnected = state
            .apply(SeatEvent::Disconnect {
                grace: Duration::ZERO,
            })
            .unwrap();
        assert!(disconnected
            .apply(SeatEvent::Disconnect { grace: GRACE })
            .is_err());

        let bot = disconnected.apply(SeatEvent::GraceExpired).unwrap();
        assert!(bot.apply(SeatEvent::GraceExpired).is_err());
        assert!(bot.apply(SeatEvent::Disconnect { grace: GRACE }).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(SeatStatus::Connected.to_string(), "CONNECTED");
        let bot = SeatStatus::BotActive {
            since: Instant::now(),
        };
        assert_eq!(bot.to_string(), "BOT_ACTIVE");
    }
}
