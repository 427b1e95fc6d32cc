//! Room configuration, loaded from TOML.
//!
//! ```toml
//! grace_period_ms = 30000
//! win_score = 50
//! rng_seed = 42
//! ```
//!
//! Every field is optional and falls back to its default. `max_rounds` is
//! unset by default; setting it ends the game after that many rounds even
//! if nobody reached `win_score`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::broadcast::{
    DEFAULT_BROADCAST_CAPACITY, DEFAULT_OUTBOX_CAPACITY, DEFAULT_OUTBOX_STALENESS,
};
use crate::state::connection::DEFAULT_GRACE_PERIOD;
use crate::state::game::{GameRules, DEFAULT_WIN_SCORE};
use crate::state::version::DEFAULT_HISTORY_CAPACITY;

/// Default depth of each room's command queue.
pub const DEFAULT_COMMAND_BUFFER: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Tunables for one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// How long a disconnected seat waits before the bot takes over
    pub grace_period_ms: u64,

    /// Snapshots retained for `snapshot_at`
    pub history_capacity: usize,

    /// Unacked deliveries kept per seat
    pub outbox_capacity: usize,

    /// Age after which unacked deliveries are dropped
    pub outbox_staleness_ms: u64,

    pub win_score: i32,

    /// Opt-in round cap; `None` plays until someone reaches `win_score`
    pub max_rounds: Option<u32>,

    /// Fixed seed for reproducible deals
    pub rng_seed: Option<u64>,

    pub command_buffer: usize,

    pub broadcast_capacity: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: DEFAULT_GRACE_PERIOD.as_millis() as u64,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            outbox_staleness_ms: DEFAULT_OUTBOX_STALENESS.as_millis() as u64,
            win_score: DEFAULT_WIN_SCORE,
            max_rounds: None,
            rng_seed: None,
            command_buffer: DEFAULT_COMMAND_BUFFER,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl RoomConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn outbox_staleness(&self) -> Duration {
        Duration::from_millis(self.outbox_staleness_ms)
    }

    pub fn rules(&self) -> GameRules {
        GameRules {
            win_score: self.win_score,
            max_rounds: self.max_rounds,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = Some(rounds);
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period_ms = grace.as_millis() as u64;
        self
    }
}

/// Load a config from a TOML file at the given path.
pub fn load_config(path: &Path) -> Result<RoomConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
