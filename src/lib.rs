//! Liap Tong room state library
//!
//! This crate holds the authoritative state of Liap Tong rooms: four seats,
//! one game, and the versioned snapshots every client is kept in sync with.
//!
//! # Overview
//!
//! - **Phase State Machine** - Preparation (with redeals), declaration, turns
//!   and scoring, with every rule checked before anything changes.
//!
//! - **Versioned Snapshots** - Each accepted change becomes exactly one
//!   snapshot with a monotonic version and a SHA-256 checksum of the public
//!   view.
//!
//! - **Connection Lifecycle** - Disconnected seats get a grace period, after
//!   which a bot plays for them until they reconnect.
//!
//! - **Rooms** - One tokio task per room is its only writer; a registry maps
//!   room ids to handles.
//!
//! # Design Principles
//!
//! 1. **State machines validate transitions** - Rejected actions leave the
//!    room untouched.
//!
//! 2. **One writer per room** - Timers and bots feed the same queue as clients.
//!
//! 3. **No networking** - Transport, auth and persistence live elsewhere.
//!
//! 4. **Serialization-ready** - Snapshots and views serialize to JSON.
//!
//! # Example
//!
//! ```rust
//! use liap_state::{RoomConfig, RoomRegistry, Seating};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), liap_state::GameError> {
//! let registry = RoomRegistry::new(RoomConfig::default().with_seed(1));
//! let first = registry.create_room("room-1", Seating::with_humans(["Alice"])?)?;
//! assert!(first.version >= 1);
//!
//! let sync = registry.full_sync("room-1", 0).await?;
//! assert_eq!(sync.version, registry.status("room-1")?.version);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod room;
pub mod state;

pub use config::{load_config, ConfigError, RoomConfig};
pub use error::{ErrorKind, GameError};
pub use room::{RoomHandle, RoomRegistry, RoomStatus};
pub use state::*;
