//! Error taxonomy for room and game operations.
//!
//! Everything except [`GameError::IntegrityViolation`] and
//! [`GameError::RoomFrozen`] is recoverable: the rejected action leaves the
//! room exactly as it was.

use thiserror::Error;

use crate::state::phase::ActionSource;
use crate::state::game::Phase;

/// Coarse classification of a [`GameError`], stable for callers that only
/// need to branch on the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidPhaseAction,
    DeclarationConstraintViolation,
    InvalidCombination,
    VersionNotRetained,
    SeatNotOwnedByActor,
    UnknownSeat,
    RoomNotFound,
    RoomClosed,
    InvalidSeating,
    IntegrityViolation,
    RoomFrozen,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("{action} is not accepted during {phase}: {reason}")]
    InvalidPhaseAction {
        phase: Phase,
        action: &'static str,
        reason: String,
    },

    #[error("seat {seat} cannot declare {value}: {reason}")]
    DeclarationConstraintViolation {
        seat: usize,
        value: u8,
        reason: String,
    },

    #[error("invalid combination: {reason}")]
    InvalidCombination { reason: String },

    #[error("snapshot version {requested} is not retained (oldest retained: {oldest:?})")]
    VersionNotRetained { requested: u64, oldest: Option<u64> },

    #[error("{actor} does not control seat {seat}")]
    SeatNotOwnedByActor { seat: usize, actor: ActionSource },

    #[error("seat {0} does not exist")]
    UnknownSeat(usize),

    #[error("room {0} not found")]
    RoomNotFound(String),

    #[error("room {0} is closed")]
    RoomClosed(String),

    #[error("invalid seating: {0}")]
    InvalidSeating(String),

    #[error("checksum mismatch at version {version}: expected {expected}, computed {actual}")]
    IntegrityViolation {
        version: u64,
        expected: String,
        actual: String,
    },

    #[error("room {0} is frozen pending operator inspection")]
    RoomFrozen(String),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPhaseAction { .. } => ErrorKind::InvalidPhaseAction,
            Self::DeclarationConstraintViolation { .. } => {
                ErrorKind::DeclarationConstraintViolation
            }
            Self::InvalidCombination { .. } => ErrorKind::InvalidCombination,
            Self::VersionNotRetained { .. } => ErrorKind::VersionNotRetained,
            Self::SeatNotOwnedByActor { .. } => ErrorKind::SeatNotOwnedByActor,
            Self::UnknownSeat(_) => ErrorKind::UnknownSeat,
            Self::RoomNotFound(_) => ErrorKind::RoomNotFound,
            Self::RoomClosed(_) => ErrorKind::RoomClosed,
            Self::InvalidSeating(_) => ErrorKind::InvalidSeating,
            Self::IntegrityViolation { .. } => ErrorKind::IntegrityViolation,
            Self::RoomFrozen(_) => ErrorKind::RoomFrozen,
        }
    }

    /// Whether the room can keep serving after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::IntegrityViolation { .. } | Self::RoomFrozen(_))
    }

    pub(crate) fn invalid_combination(reason: impl Into<String>) -> Self {
        Self::InvalidCombination {
            reason: reason.into(),
        }
    }
}
