//! Game and connection state for one room.
//!
//! - `piece` - Pieces, ranks and the deck
//! - `rules` - Combo classification, turn resolution, scoring
//! - `declaration` - Declaration constraints
//! - `redeal` - Weak hands and redeal voting
//! - `game` - Players, rounds, turns and the public view
//! - `phase` - The phase state machine driving all of the above
//! - `version` - Snapshot versions and checksums
//! - `seat` - Per-seat control state machine
//! - `connection` - Disconnects, grace tickets and bot takeover
//! - `broadcast` - Snapshot fan-out and per-seat outboxes
//! - `bot` - Bot decision-making
//! - `seating` - Filling the four seats before the first deal
//!
//! # Usage
//!
//! ```rust
//! use liap_state::state::{GameAction, GamePlayer, GameRules, PhaseStateMachine};
//!
//! let players = (0..4)
//!     .map(|i| GamePlayer::new(format!("P{}", i), false))
//!     .collect();
//! let mut machine = PhaseStateMachine::new(players, GameRules::default(), Some(7));
//!
//! while machine.auto_advance().is_some() {}
//! for seat in machine.owed_seats() {
//!     let view = machine.seat_view(seat).unwrap();
//!     assert!(view.prompt.is_some());
//! }
//! # let _ = GameAction::Declare { value: 1 };
//! ```

pub mod bot;
pub mod broadcast;
pub mod connection;
pub mod declaration;
pub mod game;
pub mod phase;
pub mod piece;
pub mod redeal;
pub mod rules;
pub mod seat;
pub mod seating;
pub mod version;

// Re-export commonly used types
pub use bot::{BotDecisionMaker, HeuristicBot};
pub use broadcast::{BroadcastCoordinator, Outbox, PendingDelivery};
pub use connection::{ConnectionLifecycleTracker, ConnectionRecord, GraceTicket};
pub use game::{Game, GamePlayer, GameRules, Phase, PublicView, SEATS};
pub use phase::{ActionSource, GameAction, GameEvent, PhaseStateMachine, Prompt, SeatAction, SeatView};
pub use piece::{Color, Piece, PieceKind};
pub use redeal::{RedealAnswer, RedealOffers};
pub use rules::{ComboType, TurnOutcome};
pub use seat::{InvalidTransition, SeatEvent, SeatState, SeatStatus};
pub use seating::{SeatOccupant, Seating};
pub use version::{checksum_of, StateSnapshot, StateVersionManager};
