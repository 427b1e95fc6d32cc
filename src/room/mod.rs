//! Rooms: the single-writer core, its tokio task, and the registry.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            RoomRegistry                              │
//! │                  DashMap<room_id, RoomHandle>                        │
//! └───────────────┬──────────────────────────────────────────────────────┘
//!                 │ mpsc commands          ▲ watch (latest)  ▲ broadcast
//!                 ▼                        │                 │
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ RoomActor (one task per room)                                        │
//! │                                                                      │
//! │   Room ── PhaseStateMachine ── rules / declaration / redeal          │
//! │     │                                                                │
//! │     ├── ConnectionLifecycleTracker ── grace timers (CancellationToken)│
//! │     ├── StateVersionManager (version, checksum, history)             │
//! │     └── BroadcastCoordinator (subscribers + seat outboxes)           │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod actor;
pub mod core;
pub mod registry;

pub use self::actor::{RoomActor, RoomCommand, RoomHandle};
pub use self::core::{Room, RoomStatus};
pub use self::registry::RoomRegistry;
