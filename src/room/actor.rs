//! One tokio task per room.
//!
//! The task owns the [`Room`] and is its only writer. Callers talk to it
//! through a [`RoomHandle`]: commands go over an `mpsc` queue with a oneshot
//! reply, the latest snapshot is readable at any time from a `watch`, and
//! every commit is published on a `broadcast` channel.
//!
//! Grace timers are spawned tasks. When one fires it enqueues
//! [`RoomCommand::GraceExpired`] and never touches the room itself; a
//! reconnect cancels it through its `CancellationToken`.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::GameError;
use crate::state::broadcast::PendingDelivery;
use crate::state::connection::GraceTicket;
use crate::state::phase::SeatAction;
use crate::state::version::StateSnapshot;

use super::core::{Room, LOG_TARGET};

type Reply<T> = oneshot::Sender<Result<T, GameError>>;

/// Messages processed by a room task, in arrival order.
#[derive(Debug)]
pub enum RoomCommand {
    Submit {
        seat: usize,
        action: SeatAction,
        reply: Reply<StateSnapshot>,
    },
    FullSync {
        seat: usize,
        reply: Reply<StateSnapshot>,
    },
    Disconnect {
        seat: usize,
        reply: Reply<()>,
    },
    Reconnect {
        seat: usize,
        reply: Reply<StateSnapshot>,
    },
    /// Enqueued by a grace timer.
    GraceExpired { ticket: GraceTicket },
    Acknowledge {
        seat: usize,
        seq: u64,
        reply: Reply<u64>,
    },
    PendingDeliveries {
        seat: usize,
        reply: Reply<Vec<PendingDelivery>>,
    },
    SnapshotAt {
        version: u64,
        reply: Reply<StateSnapshot>,
    },
    Close { reply: oneshot::Sender<()> },
}

/// Cheap, cloneable access to a running room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    room_id: String,
    tx: mpsc::Sender<RoomCommand>,
    latest: watch::Receiver<StateSnapshot>,
    snapshots: broadcast::Sender<StateSnapshot>,
}

impl RoomHandle {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Last committed snapshot, without waiting on the room task.
    pub fn latest(&self) -> StateSnapshot {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> RoomCommand,
    ) -> Result<T, GameError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| GameError::RoomClosed(self.room_id.clone()))?;
        rx.await
            .map_err(|_| GameError::RoomClosed(self.room_id.clone()))?
    }

    pub async fn submit(&self, seat: usize, action: SeatAction) -> Result<StateSnapshot, GameError> {
        self.request(|reply| RoomCommand::Submit {
            seat,
            action,
            reply,
        })
        .await
    }

    pub async fn full_sync(&self, seat: usize) -> Result<StateSnapshot, GameError> {
        self.request(|reply| RoomCommand::FullSync { seat, reply }).await
    }

    pub async fn disconnect(&self, seat: usize) -> Result<(), GameError> {
        self.request(|reply| RoomCommand::Disconnect { seat, reply }).await
    }

    pub async fn reconnect(&self, seat: usize) -> Result<StateSnapshot, GameError> {
        self.request(|reply| RoomCommand::Reconnect { seat, reply }).await
    }

    pub async fn acknowledge(&self, seat: usize, seq: u64) -> Result<u64, GameError> {
        self.request(|reply| RoomCommand::Acknowledge { seat, seq, reply })
            .await
    }

    pub async fn pending_deliveries(&self, seat: usize) -> Result<Vec<PendingDelivery>, GameError> {
        self.request(|reply| RoomCommand::PendingDeliveries { seat, reply })
            .await
    }

    pub async fn snapshot_at(&self, version: u64) -> Result<StateSnapshot, GameError> {
        self.request(|reply| RoomCommand::SnapshotAt { version, reply })
            .await
    }

    /// Stop the room task. Closing an already closed room is a no-op.
    pub async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(RoomCommand::Close { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

/// The task side of a room.
pub struct RoomActor {
    room: Room,
    rx: mpsc::Receiver<RoomCommand>,
    tx: mpsc::WeakSender<RoomCommand>,
    latest: watch::Sender<StateSnapshot>,
    timers: HashMap<usize, CancellationToken>,
}

impl RoomActor {
    /// Spawn the task for `room` and return a handle to it.
    pub fn spawn(room: Room, command_buffer: usize) -> (RoomHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(command_buffer.max(1));
        let (latest_tx, latest_rx) = watch::channel(room.latest().clone());
        let handle = RoomHandle {
            room_id: room.id().to_string(),
            tx: tx.clone(),
            latest: latest_rx,
            snapshots: room.broadcast().sender(),
        };

        let actor = Self {
            room,
            rx,
            tx: tx.downgrade(),
            latest: latest_tx,
            timers: HashMap::new(),
        };
        let task = tokio::spawn(actor.run());
        (handle, task)
    }

    async fn run(mut self) {
        info!(target: LOG_TARGET, room = %self.room.id(), "room task started");

        while let Some(command) = self.rx.recv().await {
            if !self.handle(command) {
                break;
            }
        }

        for (_, token) in self.timers.drain() {
            token.cancel();
        }
        info!(target: LOG_TARGET, room = %self.room.id(), "room task stopped");
    }

    /// Process one command. Returns false when the room should stop.
    fn handle(&mut self, command: RoomCommand) -> bool {
        match command {
            RoomCommand::Submit {
                seat,
                action,
                reply,
            } => {
                let result = self.room.submit(seat, action);
                self.respond(reply, result);
            }
            RoomCommand::FullSync { seat, reply } => {
                let result = self.room.full_sync(seat);
                self.respond(reply, result);
            }
            RoomCommand::Disconnect { seat, reply } => {
                let result = self.room.disconnect(seat).map(|ticket| {
                    if let Some(ticket) = ticket {
                        self.arm_timer(ticket);
                    }
                });
                self.respond(reply, result);
            }
            RoomCommand::Reconnect { seat, reply } => {
                if let Some(token) = self.timers.remove(&seat) {
                    token.cancel();
                }
                let result = self.room.reconnect(seat);
                self.respond(reply, result);
            }
            RoomCommand::GraceExpired { ticket } => {
                self.timers.remove(&ticket.seat);
                // Timers fire at or after the deadline.
                let now = Instant::now().max(ticket.deadline);
                if let Err(err) = self.room.expire_grace(ticket, now) {
                    warn!(
                        target: LOG_TARGET,
                        room = %self.room.id(),
                        seat = ticket.seat,
                        error = %err,
                        "grace expiry not applied"
                    );
                }
                self.latest.send_replace(self.room.latest().clone());
            }
            RoomCommand::Acknowledge { seat, seq, reply } => {
                let result = self.room.acknowledge(seat, seq);
                self.respond(reply, result);
            }
            RoomCommand::PendingDeliveries { seat, reply } => {
                let result = self.room.pending_deliveries(seat);
                self.respond(reply, result);
            }
            RoomCommand::SnapshotAt { version, reply } => {
                let result = self.room.snapshot_at(version);
                self.respond(reply, result);
            }
            RoomCommand::Close { reply } => {
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    /// Publish the latest snapshot to the watch, then answer the caller.
    fn respond<T>(&self, reply: Reply<T>, result: Result<T, GameError>) {
        self.latest.send_replace(self.room.latest().clone());
        let _ = reply.send(result);
    }

    fn arm_timer(&mut self, ticket: GraceTicket) {
        let Some(tx) = self.tx.upgrade() else {
            return;
        };
        let token = CancellationToken::new();
        if let Some(previous) = self.timers.insert(ticket.seat, token.clone()) {
            previous.cancel();
        }

        let room_id = self.room.id().to_string();
        tokio::spawn(async move {
            let deadline = tokio::time::Instant::from_std(ticket.deadline);
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(target: LOG_TARGET, room = %room_id, seat = ticket.seat, "grace timer cancelled");
                }
                _ = tokio::time::sleep_until(deadline) => {
                    let _ = tx.send(RoomCommand::GraceExpired { ticket }).await;
                }
            }
        });
    }
}
