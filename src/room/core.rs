//! The single writer of one room.
//!
//! Every mutation of a room goes through [`Room`]: seat ownership is checked
//! here, the phase machine validates and applies, and each accepted change is
//! committed as exactly one versioned snapshot and fanned out. After every
//! accepted change the room drives automatic steps and bot-owed actions
//! through the same path until a human is owed an action.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::RoomConfig;
use crate::error::GameError;
use crate::state::bot::{self, BotDecisionMaker};
use crate::state::broadcast::{BroadcastCoordinator, PendingDelivery};
use crate::state::connection::{ConnectionLifecycleTracker, GraceTicket};
use crate::state::game::{Phase, SEATS};
use crate::state::phase::{GameEvent, PhaseStateMachine, SeatAction};
use crate::state::seating::Seating;
use crate::state::version::{StateSnapshot, StateVersionManager};

pub(crate) const LOG_TARGET: &str = "liap::room";

/// Point-in-time summary of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomStatus {
    pub room_id: String,
    pub version: u64,
    pub checksum: String,
    pub phase: Phase,
    pub round_number: u32,
    pub scores: Vec<i32>,
    pub connected: Vec<bool>,
    pub bot_substitutes: Vec<bool>,
}

impl RoomStatus {
    pub fn from_snapshot(snapshot: &StateSnapshot) -> Self {
        let players = &snapshot.phase_data.players;
        Self {
            room_id: snapshot.room_id.clone(),
            version: snapshot.version,
            checksum: snapshot.checksum.clone(),
            phase: snapshot.phase,
            round_number: snapshot.phase_data.round.round_number,
            scores: players.iter().map(|p| p.score).collect(),
            connected: players.iter().map(|p| p.is_connected).collect(),
            bot_substitutes: players.iter().map(|p| p.is_bot_substitute).collect(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }
}

/// Authoritative state of one room.
#[derive(Debug)]
pub struct Room {
    id: String,
    machine: PhaseStateMachine,
    connections: ConnectionLifecycleTracker,
    versions: StateVersionManager,
    broadcast: BroadcastCoordinator,
    bot: Arc<dyn BotDecisionMaker>,
    latest: StateSnapshot,
    frozen: bool,
}

impl Room {
    /// Seat the players, deal the first round and commit version 1.
    pub fn new(
        id: impl Into<String>,
        seating: Seating,
        config: &RoomConfig,
        bot: Arc<dyn BotDecisionMaker>,
    ) -> Result<Self, GameError> {
        let players = seating.into_players()?;
        let machine = PhaseStateMachine::new(players, config.rules(), config.rng_seed);
        Ok(Self::assemble(id.into(), machine, config, bot))
    }

    /// Build a room around an already-dealt machine.
    pub fn with_machine(
        id: impl Into<String>,
        machine: PhaseStateMachine,
        config: &RoomConfig,
        bot: Arc<dyn BotDecisionMaker>,
    ) -> Self {
        Self::assemble(id.into(), machine, config, bot)
    }

    fn assemble(
        id: String,
        machine: PhaseStateMachine,
        config: &RoomConfig,
        bot: Arc<dyn BotDecisionMaker>,
    ) -> Self {
        let bot_seats: Vec<bool> = machine.game().players().iter().map(|p| p.is_bot).collect();
        let connections = ConnectionLifecycleTracker::new(&bot_seats, config.grace_period());
        let mut versions = StateVersionManager::new(id.clone(), config.history_capacity);
        let mut broadcast = BroadcastCoordinator::new(
            config.broadcast_capacity,
            config.outbox_capacity,
            config.outbox_staleness(),
        );

        let latest = versions.commit(machine.public_view(&connections.records()));
        broadcast.publish(&latest, &machine.game().hands(), &human_seats(&connections));
        info!(
            target: LOG_TARGET,
            room = %id,
            version = latest.version,
            starter = machine.game().round().starter,
            "room created"
        );

        let mut room = Self {
            id,
            machine,
            connections,
            versions,
            broadcast,
            bot,
            latest,
            frozen: false,
        };
        room.settle();
        room
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn latest(&self) -> &StateSnapshot {
        &self.latest
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn machine(&self) -> &PhaseStateMachine {
        &self.machine
    }

    pub fn connections(&self) -> &ConnectionLifecycleTracker {
        &self.connections
    }

    pub fn broadcast(&self) -> &BroadcastCoordinator {
        &self.broadcast
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn status(&self) -> RoomStatus {
        RoomStatus::from_snapshot(&self.latest)
    }

    fn ensure_live(&self) -> Result<(), GameError> {
        if self.frozen {
            return Err(GameError::RoomFrozen(self.id.clone()));
        }
        Ok(())
    }

    fn check_seat(seat: usize) -> Result<(), GameError> {
        if seat >= SEATS {
            return Err(GameError::UnknownSeat(seat));
        }
        Ok(())
    }

    /// Validate and apply an action for `seat`, then run automatic steps.
    ///
    /// Returns the snapshot committed for this action.
    pub fn submit(&mut self, seat: usize, action: SeatAction) -> Result<StateSnapshot, GameError> {
        self.ensure_live()?;
        Self::check_seat(seat)?;
        let snapshot = self.apply_action(seat, &action)?;
        self.settle();
        Ok(snapshot)
    }

    fn apply_action(&mut self, seat: usize, action: &SeatAction) -> Result<StateSnapshot, GameError> {
        if !self.connections.controls(seat, action.source) {
            warn!(
                target: LOG_TARGET,
                room = %self.id,
                seat,
                actor = %action.source,
                action = action.action.name(),
                "action from an actor that does not control the seat"
            );
            return Err(GameError::SeatNotOwnedByActor {
                seat,
                actor: action.source,
            });
        }

        let events = self.machine.apply(seat, &action.action).map_err(|err| {
            debug!(
                target: LOG_TARGET,
                room = %self.id,
                seat,
                phase = %self.machine.phase(),
                error = %err,
                "action rejected"
            );
            err
        })?;

        self.log_events(&events);
        Ok(self.commit())
    }

    /// Stamp the current state as the next version and fan it out.
    fn commit(&mut self) -> StateSnapshot {
        let view = self.machine.public_view(&self.connections.records());
        let snapshot = self.versions.commit(view);
        let hands = self.machine.game().hands();
        self.broadcast
            .publish(&snapshot, &hands, &human_seats(&self.connections));

        debug!(
            target: LOG_TARGET,
            room = %self.id,
            version = snapshot.version,
            phase = %snapshot.phase,
            "committed"
        );
        self.latest = snapshot.clone();
        snapshot
    }

    /// Run automatic transitions and bot-owed actions until a human is owed
    /// an action or the game is over.
    fn settle(&mut self) {
        loop {
            if let Some(events) = self.machine.auto_advance() {
                self.log_events(&events);
                self.commit();
                continue;
            }

            let Some(seat) = self
                .machine
                .owed_seats()
                .into_iter()
                .find(|&s| self.connections.is_bot_controlled(s))
            else {
                return;
            };

            if let Err(err) = self.play_bot(seat) {
                error!(
                    target: LOG_TARGET,
                    room = %self.id,
                    seat,
                    error = %err,
                    "bot produced an illegal action"
                );
                return;
            }
        }
    }

    fn play_bot(&mut self, seat: usize) -> Result<StateSnapshot, GameError> {
        let view = self.machine.seat_view(seat)?;
        let action = bot::decide(self.bot.as_ref(), &view).ok_or_else(|| {
            GameError::InvalidPhaseAction {
                phase: view.phase,
                action: "bot",
                reason: "seat owes no action".to_string(),
            }
        })?;
        debug!(
            target: LOG_TARGET,
            room = %self.id,
            seat,
            action = ?action,
            "bot acting"
        );
        self.apply_action(seat, &SeatAction::bot(seat, action))
    }

    fn log_events(&self, events: &[GameEvent]) {
        for event in events {
            match event {
                GameEvent::RoundDealt {
                    round_number,
                    starter,
                    weak_seats,
                } => info!(
                    target: LOG_TARGET,
                    room = %self.id,
                    round = round_number,
                    starter,
                    weak_seats = ?weak_seats,
                    "round dealt"
                ),
                GameEvent::Redealt { multiplier, starter } => info!(
                    target: LOG_TARGET,
                    room = %self.id,
                    multiplier,
                    starter,
                    "redeal accepted"
                ),
                GameEvent::RoundScored { scores } => info!(
                    target: LOG_TARGET,
                    room = %self.id,
                    totals = ?scores.iter().map(|s| s.total).collect::<Vec<_>>(),
                    "round scored"
                ),
                GameEvent::GameOver { winners } => info!(
                    target: LOG_TARGET,
                    room = %self.id,
                    winners = ?winners,
                    "game over"
                ),
                other => debug!(target: LOG_TARGET, room = %self.id, event = ?other, "game event"),
            }
        }
    }

    /// Mark a seat's client as gone and start its grace period.
    pub fn disconnect(&mut self, seat: usize) -> Result<Option<GraceTicket>, GameError> {
        self.ensure_live()?;
        let ticket = self.connections.disconnect(seat, Instant::now())?;
        if let Some(ticket) = &ticket {
            info!(
                target: LOG_TARGET,
                room = %self.id,
                seat,
                epoch = ticket.epoch,
                grace_ms = self.connections.grace_period().as_millis() as u64,
                "seat disconnected"
            );
            self.commit();
        }
        Ok(ticket)
    }

    /// Redeem a grace ticket as of `now`. Returns true if the bot took over.
    pub fn expire_grace(&mut self, ticket: GraceTicket, now: Instant) -> Result<bool, GameError> {
        self.ensure_live()?;
        if !self.connections.expire(ticket, now) {
            debug!(
                target: LOG_TARGET,
                room = %self.id,
                seat = ticket.seat,
                epoch = ticket.epoch,
                "stale grace ticket ignored"
            );
            return Ok(false);
        }
        info!(
            target: LOG_TARGET,
            room = %self.id,
            seat = ticket.seat,
            "grace expired, bot takes over"
        );
        self.commit();
        self.settle();
        Ok(true)
    }

    /// Hand a seat back to its client and return a full snapshot for it.
    pub fn reconnect(&mut self, seat: usize) -> Result<StateSnapshot, GameError> {
        self.ensure_live()?;
        if self.connections.reconnect(seat)? {
            info!(target: LOG_TARGET, room = %self.id, seat, "seat reconnected");
            self.commit();
        }
        let full = self.full_sync(seat)?;
        self.broadcast.resync(seat, full.clone());
        Ok(full)
    }

    /// Latest committed snapshot with the seat's hand, after checking that
    /// the live state still hashes to the committed checksum.
    pub fn full_sync(&mut self, seat: usize) -> Result<StateSnapshot, GameError> {
        self.ensure_live()?;
        Self::check_seat(seat)?;

        let view = self.machine.public_view(&self.connections.records());
        if let Err(err) = self.versions.verify(&view) {
            error!(
                target: LOG_TARGET,
                room = %self.id,
                seat,
                error = %err,
                "integrity violation, freezing room"
            );
            self.frozen = true;
            return Err(err);
        }

        let hand = self
            .machine
            .game()
            .hand(seat)
            .map(<[_]>::to_vec)
            .unwrap_or_default();
        Ok(self.latest.for_seat(hand))
    }

    pub fn snapshot_at(&self, version: u64) -> Result<StateSnapshot, GameError> {
        self.versions.snapshot_at(version).cloned()
    }

    pub fn acknowledge(&mut self, seat: usize, seq: u64) -> Result<u64, GameError> {
        self.broadcast
            .acknowledge(seat, seq)
            .ok_or(GameError::UnknownSeat(seat))
    }

    /// Unacked deliveries for a seat, oldest first.
    pub fn pending_deliveries(&mut self, seat: usize) -> Result<Vec<PendingDelivery>, GameError> {
        let outbox = self
            .broadcast
            .outbox_mut(seat)
            .ok_or(GameError::UnknownSeat(seat))?;
        outbox.prune_stale(Instant::now());
        Ok(outbox.pending().cloned().collect())
    }
}

/// Seats that have (or had) a client and therefore an outbox to fill.
fn human_seats(connections: &ConnectionLifecycleTracker) -> Vec<usize> {
    (0..SEATS)
        .filter(|&s| connections.get(s).is_some_and(|c| !c.permanent_bot))
        .collect()
}
