//! Snapshot fan-out.
//!
//! Public snapshots go to every subscriber over a `tokio::sync::broadcast`
//! channel. Each seat additionally gets an outbox holding its private copy
//! of every snapshot until the client acknowledges it.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::game::SEATS;
use super::piece::Piece;
use super::version::StateSnapshot;

/// Default outbox bound per seat.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 32;

/// Default age after which unacked deliveries are dropped (60 seconds).
pub const DEFAULT_OUTBOX_STALENESS: Duration = Duration::from_secs(60);

/// Default capacity of the room-wide channel.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 128;

/// A delivery waiting for acknowledgment.
#[derive(Debug, Clone)]
pub struct PendingDelivery {
    pub seq: u64,
    pub snapshot: StateSnapshot,
    pub sent_at: Instant,
}

/// Per-seat delivery queue with sequence numbers.
#[derive(Debug, Clone)]
pub struct Outbox {
    /// Sequence number of the last queued delivery
    pub send_seq: u64,

    /// Last sequence acknowledged by the client
    pub ack_seq: u64,

    pending: VecDeque<PendingDelivery>,
    capacity: usize,
    staleness: Duration,
    evicted: u64,
}

impl Outbox {
    pub fn new(capacity: usize, staleness: Duration) -> Self {
        Self {
            send_seq: 0,
            ack_seq: 0,
            pending: VecDeque::new(),
            capacity: capacity.max(1),
            staleness,
            evicted: 0,
        }
    }

    /// Queue a snapshot, evicting the oldest delivery if full.
    pub fn push(&mut self, snapshot: StateSnapshot, now: Instant) -> u64 {
        self.send_seq += 1;
        if self.pending.len() == self.capacity {
            self.pending.pop_front();
            self.evicted += 1;
        }
        self.pending.push_back(PendingDelivery {
            seq: self.send_seq,
            snapshot,
            sent_at: now,
        });
        self.send_seq
    }

    /// Drop everything up to and including `ack`.
    pub fn acknowledge(&mut self, ack: u64) {
        let ack = ack.min(self.send_seq);
        if ack > self.ack_seq {
            self.ack_seq = ack;
        }
        self.pending.retain(|d| d.seq > ack);
    }

    /// Drop deliveries older than the staleness window. Returns how many.
    pub fn prune_stale(&mut self, now: Instant) -> usize {
        let before = self.pending.len();
        let staleness = self.staleness;
        self.pending
            .retain(|d| now.saturating_duration_since(d.sent_at) < staleness);
        before - self.pending.len()
    }

    /// Replace the whole backlog with one full snapshot.
    pub fn reset_with(&mut self, snapshot: StateSnapshot, now: Instant) -> u64 {
        self.pending.clear();
        self.push(snapshot, now)
    }

    /// Unacked deliveries, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &PendingDelivery> {
        self.pending.iter()
    }

    pub fn messages_since(&self, seq: u64) -> Vec<&PendingDelivery> {
        self.pending.iter().filter(|d| d.seq > seq).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Deliveries dropped because the outbox was full.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

/// Room-wide channel plus the four seat outboxes.
#[derive(Debug)]
pub struct BroadcastCoordinator {
    tx: broadcast::Sender<StateSnapshot>,
    outboxes: Vec<Outbox>,
}

impl BroadcastCoordinator {
    pub fn new(channel_capacity: usize, outbox_capacity: usize, staleness: Duration) -> Self {
        let (tx, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            tx,
            outboxes: (0..SEATS)
                .map(|_| Outbox::new(outbox_capacity, staleness))
                .collect(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateSnapshot> {
        self.tx.subscribe()
    }

    pub fn sender(&self) -> broadcast::Sender<StateSnapshot> {
        self.tx.clone()
    }

    /// Send the public snapshot to subscribers and a private copy (with
    /// `hands[seat]`) to each seat outbox listed in `seats`.
    pub fn publish(&mut self, snapshot: &StateSnapshot, hands: &[Vec<Piece>], seats: &[usize]) {
        let now = Instant::now();
        // No receivers is fine.
        let receivers = self.tx.send(snapshot.clone()).unwrap_or(0);
        trace!(version = snapshot.version, receivers, "snapshot broadcast");

        for &seat in seats {
            let Some(outbox) = self.outboxes.get_mut(seat) else {
                continue;
            };
            let hand = hands.get(seat).cloned().unwrap_or_default();
            outbox.prune_stale(now);
            let evicted_before = outbox.evicted();
            let seq = outbox.push(snapshot.for_seat(hand), now);
            if outbox.evicted() > evicted_before {
                debug!(seat, seq, "outbox full, dropped oldest delivery");
            }
        }
    }

    pub fn outbox(&self, seat: usize) -> Option<&Outbox> {
        self.outboxes.get(seat)
    }

    pub fn outbox_mut(&mut self, seat: usize) -> Option<&mut Outbox> {
        self.outboxes.get_mut(seat)
    }

    /// Process an acknowledgment from a seat's client.
    pub fn acknowledge(&mut self, seat: usize, ack: u64) -> Option<u64> {
        let outbox = self.outboxes.get_mut(seat)?;
        outbox.acknowledge(ack);
        Some(outbox.ack_seq)
    }

    /// Reset a seat's outbox to a single full snapshot.
    pub fn resync(&mut self, seat: usize, snapshot: StateSnapshot) -> Option<u64> {
        let outbox = self.outboxes.get_mut(seat)?;
        Some(outbox.reset_with(snapshot, Instant::now()))
    }
}
