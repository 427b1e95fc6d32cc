//! Concurrent map of live rooms.
//!
//! Rooms share nothing: the registry only hands out [`RoomHandle`] clones,
//! so no lock is held while a room does work.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::config::RoomConfig;
use crate::error::GameError;
use crate::state::bot::{BotDecisionMaker, HeuristicBot};
use crate::state::broadcast::PendingDelivery;
use crate::state::phase::SeatAction;
use crate::state::seating::Seating;
use crate::state::version::StateSnapshot;

use super::actor::{RoomActor, RoomHandle};
use super::core::{Room, RoomStatus, LOG_TARGET};

/// Every room hosted by this process.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
    config: RoomConfig,
    bot: Arc<dyn BotDecisionMaker>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RoomConfig::default())
    }
}

impl RoomRegistry {
    pub fn new(config: RoomConfig) -> Self {
        Self::with_bot(config, Arc::new(HeuristicBot::new()))
    }

    pub fn with_bot(config: RoomConfig, bot: Arc<dyn BotDecisionMaker>) -> Self {
        Self {
            rooms: DashMap::new(),
            config,
            bot,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Seat a room, deal its first round and start its task.
    ///
    /// The room is built, and any opening bot moves are played, before the
    /// map is touched, so no shard lock is held while it runs.
    /// Must be called from within a tokio runtime.
    pub fn create_room(
        &self,
        room_id: impl Into<String>,
        seating: Seating,
    ) -> Result<StateSnapshot, GameError> {
        let room_id = room_id.into();
        if self.rooms.contains_key(&room_id) {
            return Err(already_exists(&room_id));
        }

        let room = Room::new(room_id.clone(), seating, &self.config, Arc::clone(&self.bot))?;
        let latest = self.insert_room(room)?;
        info!(target: LOG_TARGET, room = %room_id, version = latest.version, "room registered");
        Ok(latest)
    }

    /// Register an already-built room (fixtures and replays).
    ///
    /// The task is only spawned once the id is known to be free; a room that
    /// loses a race for its id is dropped without ever running.
    pub fn insert_room(&self, room: Room) -> Result<StateSnapshot, GameError> {
        let room_id = room.id().to_string();
        match self.rooms.entry(room_id) {
            Entry::Occupied(entry) => Err(already_exists(entry.key())),
            Entry::Vacant(entry) => {
                let (handle, _task) = RoomActor::spawn(room, self.config.command_buffer);
                let latest = handle.latest();
                entry.insert(handle);
                Ok(latest)
            }
        }
    }

    /// Clone of a room's handle; the map guard is released before returning.
    pub fn handle(&self, room_id: &str) -> Result<RoomHandle, GameError> {
        self.rooms
            .get(room_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| GameError::RoomNotFound(room_id.to_string()))
    }

    pub async fn submit_action(
        &self,
        room_id: &str,
        seat: usize,
        action: SeatAction,
    ) -> Result<StateSnapshot, GameError> {
        self.handle(room_id)?.submit(seat, action).await
    }

    /// Stream of public snapshots committed from now on.
    ///
    /// A subscriber that falls behind skips the snapshots it missed and
    /// should recover with [`full_sync`](Self::full_sync).
    pub fn subscribe(
        &self,
        room_id: &str,
    ) -> Result<impl Stream<Item = StateSnapshot> + Send + 'static, GameError> {
        let handle = self.handle(room_id)?;
        let room_id = room_id.to_string();
        Ok(BroadcastStream::new(handle.subscribe()).filter_map(move |item| match item {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(target: LOG_TARGET, room = %room_id, error = %err, "subscriber lagged");
                None
            }
        }))
    }

    /// Latest committed snapshot with the seat's hand.
    pub async fn full_sync(&self, room_id: &str, seat: usize) -> Result<StateSnapshot, GameError> {
        self.handle(room_id)?.full_sync(seat).await
    }

    pub async fn disconnect(&self, room_id: &str, seat: usize) -> Result<(), GameError> {
        self.handle(room_id)?.disconnect(seat).await
    }

    /// Reconnect a seat; returns the full snapshot to send to its client.
    pub async fn reconnect(&self, room_id: &str, seat: usize) -> Result<StateSnapshot, GameError> {
        self.handle(room_id)?.reconnect(seat).await
    }

    pub async fn acknowledge(&self, room_id: &str, seat: usize, seq: u64) -> Result<u64, GameError> {
        self.handle(room_id)?.acknowledge(seat, seq).await
    }

    pub async fn pending_deliveries(
        &self,
        room_id: &str,
        seat: usize,
    ) -> Result<Vec<PendingDelivery>, GameError> {
        self.handle(room_id)?.pending_deliveries(seat).await
    }

    pub async fn snapshot_at(&self, room_id: &str, version: u64) -> Result<StateSnapshot, GameError> {
        self.handle(room_id)?.snapshot_at(version).await
    }

    /// Latest committed snapshot, read without queuing behind the room task.
    pub fn latest(&self, room_id: &str) -> Result<StateSnapshot, GameError> {
        Ok(self.handle(room_id)?.latest())
    }

    pub fn status(&self, room_id: &str) -> Result<RoomStatus, GameError> {
        Ok(RoomStatus::from_snapshot(&self.latest(room_id)?))
    }

    /// Stop a room and remove it from the registry.
    pub async fn close_room(&self, room_id: &str) -> Result<(), GameError> {
        let (_, handle) = self
            .rooms
            .remove(room_id)
            .ok_or_else(|| GameError::RoomNotFound(room_id.to_string()))?;
        handle.close().await;
        info!(target: LOG_TARGET, room = %room_id, "room closed");
        Ok(())
    }

    /// Close every room whose game is over. Returns their ids.
    pub async fn cleanup_finished(&self) -> Vec<String> {
        let finished: Vec<String> = self
            .rooms
            .iter()
            .filter(|entry| entry.value().latest().phase.is_terminal())
            .map(|entry| entry.key().clone())
            .collect();

        for room_id in &finished {
            let _ = self.close_room(room_id).await;
        }
        finished
    }

    pub fn room_ids(&self) -> Vec<String> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

fn already_exists(room_id: &str) -> GameError {
    GameError::InvalidSeating(format!("room {} already exists", room_id))
}
