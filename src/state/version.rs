//! Snapshot versioning and checksums.
//!
//! Every committed mutation gets the next version number and a SHA-256
//! checksum over the canonical JSON of the public view. `serde_json` object
//! maps are ordered, so the encoding is stable for equal content.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::GameError;

use super::game::{Phase, PublicView};
use super::piece::Piece;

/// Default number of snapshots kept for replay.
pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

/// A committed, versioned copy of the public state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub room_id: String,
    pub version: u64,
    pub checksum: String,
    pub phase: Phase,
    pub phase_data: PublicView,
    pub timestamp: DateTime<Utc>,
    /// Only set on copies addressed to one seat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand: Option<Vec<Piece>>,
}

impl StateSnapshot {
    /// Copy of this snapshot carrying one seat's private hand.
    pub fn for_seat(&self, hand: Vec<Piece>) -> Self {
        Self {
            hand: Some(hand),
            ..self.clone()
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// SHA-256 of the canonical JSON encoding of a public view, lower-case hex.
pub fn checksum_of(view: &PublicView) -> String {
    let canonical = serde_json::to_value(view)
        .and_then(|value| serde_json::to_vec(&value))
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    format!("{:x}", hasher.finalize())
}

/// Monotonic version counter with a bounded snapshot history.
#[derive(Debug, Clone)]
pub struct StateVersionManager {
    room_id: String,
    version: u64,
    capacity: usize,
    history: VecDeque<StateSnapshot>,
}

impl StateVersionManager {
    pub fn new(room_id: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            room_id: room_id.into(),
            version: 0,
            capacity,
            history: VecDeque::with_capacity(capacity),
        }
    }

    /// Last committed version, 0 before the first commit.
    pub fn current_version(&self) -> u64 {
        self.version
    }

    /// Stamp the next version and retain the snapshot.
    pub fn commit(&mut self, view: PublicView) -> StateSnapshot {
        self.version += 1;
        let snapshot = StateSnapshot {
            room_id: self.room_id.clone(),
            version: self.version,
            checksum: checksum_of(&view),
            phase: view.phase,
            phase_data: view,
            timestamp: Utc::now(),
            hand: None,
        };

        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(snapshot.clone());
        snapshot
    }

    pub fn latest(&self) -> Option<&StateSnapshot> {
        self.history.back()
    }

    pub fn oldest_retained(&self) -> Option<u64> {
        self.history.front().map(|s| s.version)
    }

    pub fn snapshot_at(&self, version: u64) -> Result<&StateSnapshot, GameError> {
        let not_retained = || GameError::VersionNotRetained {
            requested: version,
            oldest: self.oldest_retained(),
        };
        let oldest = self.oldest_retained().ok_or_else(not_retained)?;
        if version < oldest || version > self.version {
            return Err(not_retained());
        }
        self.history
            .get((version - oldest) as usize)
            .ok_or_else(not_retained)
    }

    /// Recompute the checksum of `view` and compare it with the latest commit.
    pub fn verify(&self, view: &PublicView) -> Result<(), GameError> {
        let Some(latest) = self.latest() else {
            return Ok(());
        };
        let actual = checksum_of(view);
        if actual == latest.checksum {
            Ok(())
        } else {
            Err(GameError::IntegrityViolation {
                version: latest.version,
                expected: latest.checksum.clone(),
                actual,
            })
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
