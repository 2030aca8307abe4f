//! In-process backend with scriptable channels.
//!
//! Drives the whole pipeline without a network: tests and the `simulate`
//! command push changes and join statuses into channels by name.

use dashmap::DashMap;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

use super::backend::{
    BackendChannel, BackendChannelId, ChannelSignal, ChannelStatus, RealtimeBackend, TableBinding,
};
use super::change::RawChange;

struct MemoryChannel {
    id: BackendChannelId,
    binding: TableBinding,
    tx: mpsc::UnboundedSender<ChannelSignal>,
}

pub struct MemoryBackend {
    channels: DashMap<String, MemoryChannel>,
    next_id: AtomicU64,
    opened: AtomicUsize,
    closed: AtomicUsize,
    auto_ack: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Backend that acknowledges every join immediately
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            next_id: AtomicU64::new(1),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            auto_ack: AtomicBool::new(true),
        }
    }

    /// Backend that leaves joins pending until [`MemoryBackend::emit_status`]
    pub fn manual_ack() -> Self {
        let backend = Self::new();
        backend.auto_ack.store(false, Ordering::Relaxed);
        backend
    }

    /// Push a change to the named channel; false when it is not open
    pub fn emit(&self, channel: &str, change: RawChange) -> bool {
        self.send(channel, ChannelSignal::Change(change))
    }

    /// Push a join status to the named channel; false when it is not open
    pub fn emit_status(&self, channel: &str, status: ChannelStatus) -> bool {
        self.send(channel, ChannelSignal::Status(status))
    }

    /// Push a change to every open channel bound to `table`
    pub fn broadcast(&self, table: &str, change: RawChange) -> usize {
        let mut delivered = 0;
        for entry in self.channels.iter() {
            if entry.binding.table == table
                && entry.tx.send(ChannelSignal::Change(change.clone())).is_ok()
            {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn is_open(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    pub fn binding(&self, channel: &str) -> Option<TableBinding> {
        self.channels.get(channel).map(|entry| entry.binding.clone())
    }

    /// Total number of `open_channel` calls so far
    pub fn opened_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Total number of channels released through `close_channel`
    pub fn closed_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn open_channels(&self) -> usize {
        self.channels.len()
    }

    fn send(&self, channel: &str, signal: ChannelSignal) -> bool {
        self.channels
            .get(channel)
            .map(|entry| entry.tx.send(signal).is_ok())
            .unwrap_or(false)
    }

    fn release(&self, id: BackendChannelId) -> bool {
        let name = self
            .channels
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.key().clone());

        match name {
            Some(name) => self.channels.remove_if(&name, |_, ch| ch.id == id).is_some(),
            None => false,
        }
    }
}

impl RealtimeBackend for MemoryBackend {
    fn open_channel(&self, name: &str, binding: &TableBinding) -> BackendChannel {
        let id = BackendChannelId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, signals) = mpsc::unbounded_channel();

        if self.auto_ack.load(Ordering::Relaxed) {
            let _ = tx.send(ChannelSignal::Status(ChannelStatus::Subscribed));
        }

        self.channels.insert(
            name.to_string(),
            MemoryChannel {
                id,
                binding: binding.clone(),
                tx,
            },
        );
        self.opened.fetch_add(1, Ordering::SeqCst);
        debug!(channel = name, table = %binding.table, id = id.0, "memory channel opened");

        BackendChannel { id, signals }
    }

    fn close_channel(&self, id: BackendChannelId) -> BoxFuture<'static, ()> {
        if self.release(id) {
            self.closed.fetch_add(1, Ordering::SeqCst);
            debug!(id = id.0, "memory channel closed");
        }
        Box::pin(async {})
    }
}
