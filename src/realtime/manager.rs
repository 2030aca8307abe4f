//! Connection manager: channel registry, connection state and reconnects.
//!
//! # Invariants
//! - At most one registry entry per channel name.
//! - Demo mode is resolved once at construction; when active no backend
//!   channel is ever opened.
//! - A `CHANNEL_ERROR` replaces the channel with a fresh one after a backoff
//!   delay. The delay chain resets on the next `SUBSCRIBED`.
//! - A backend `CLOSED` removes the entry, so a later subscribe under the
//!   same name opens a new channel.
//! - Pending reconnect timers survive a single [`ConnectionManager::unsubscribe`]
//!   and are only cancelled by [`ConnectionManager::dispose`].

use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{
    BackendChannelId, ChannelSignal, ChannelStatus, RealtimeBackend, TableBinding,
};
use super::change::{EventKinds, RawChange};
use crate::error::{Backoff, ReconnectPolicy};

/// Callback receiving every change delivered on a channel
pub type EventSink = Arc<dyn Fn(&RawChange) + Send + Sync>;

/// Process-wide connection health, collapsed over all channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }
}

/// Lifecycle of a registered channel. Closed channels leave the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    Subscribing,
    Connected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRequest {
    pub channel: String,
    pub table: String,
    pub filter: Option<String>,
    /// Kinds the caller wants. The channel still carries every kind; the sink
    /// does the filtering, so this can change without re-subscribing.
    pub events: EventKinds,
}

impl SubscriptionRequest {
    pub fn new(channel: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            table: table.into(),
            filter: None,
            events: EventKinds::all(),
        }
    }

    pub fn filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    pub fn events(mut self, events: EventKinds) -> Self {
        self.events = events;
        self
    }
}

/// Read-only snapshot of a registry entry
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub name: String,
    pub table: String,
    pub filter: Option<String>,
    pub phase: ChannelPhase,
}

#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Database schema every table binding lives in
    pub schema: String,
    pub policy: ReconnectPolicy,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            policy: ReconnectPolicy::default(),
        }
    }
}

struct ActiveChannel {
    generation: u64,
    backend_id: BackendChannelId,
    request: Arc<SubscriptionRequest>,
    on_event: EventSink,
    backoff: Arc<Mutex<Backoff>>,
    phase: ChannelPhase,
    pump: JoinHandle<()>,
}

pub struct ConnectionManager {
    me: Weak<ConnectionManager>,
    backend: Arc<dyn RealtimeBackend>,
    options: ManagerOptions,
    demo_mode: bool,
    channels: DashMap<String, ActiveChannel>,
    reconnect_timers: Mutex<HashMap<String, JoinHandle<()>>>,
    state: watch::Sender<ConnectionState>,
    generation: AtomicU64,
}

impl ConnectionManager {
    /// Create the manager. `is_demo_mode_active` is evaluated exactly once.
    pub fn new<F>(
        backend: Arc<dyn RealtimeBackend>,
        options: ManagerOptions,
        is_demo_mode_active: F,
    ) -> Arc<Self>
    where
        F: FnOnce() -> bool,
    {
        let demo_mode = is_demo_mode_active();
        if demo_mode {
            info!("demo mode active, live subscriptions disabled");
        }

        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            backend,
            options,
            demo_mode,
            channels: DashMap::new(),
            reconnect_timers: Mutex::new(HashMap::new()),
            state,
            generation: AtomicU64::new(0),
        })
    }

    /// Subscribe a channel. Must be called from within a Tokio runtime.
    ///
    /// Returns a no-op [`Teardown`] in demo mode, and a teardown for the
    /// existing channel when the name is already registered.
    pub fn subscribe(&self, request: SubscriptionRequest, on_event: EventSink) -> Teardown {
        if self.demo_mode {
            debug!(channel = %request.channel, "demo mode, subscription refused");
            return Teardown::noop();
        }

        let backoff = Arc::new(Mutex::new(self.options.policy.backoff()));
        self.open(Arc::new(request), on_event, backoff)
    }

    /// Release a channel and drop it from the registry. Unknown names are ignored.
    pub async fn unsubscribe(&self, channel: &str) {
        let Some((_, active)) = self.channels.remove(channel) else {
            debug!(channel, "unsubscribe for unknown channel ignored");
            return;
        };

        active.pump.abort();
        self.backend.close_channel(active.backend_id).await;
        self.set_state(ConnectionState::Disconnected);
        info!(channel, "channel removed");
    }

    pub fn active_subscriptions(&self) -> usize {
        self.channels.len()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_demo_mode(&self) -> bool {
        self.demo_mode
    }

    pub fn channel_info(&self, channel: &str) -> Option<ChannelInfo> {
        self.channels.get(channel).map(|active| ChannelInfo {
            name: channel.to_string(),
            table: active.request.table.clone(),
            filter: active.request.filter.clone(),
            phase: active.phase,
        })
    }

    /// Reconnects waiting on their backoff timer
    pub fn pending_reconnects(&self) -> usize {
        self.reconnect_timers.lock().len()
    }

    /// Process-wide teardown: cancel reconnect timers, then release every channel.
    pub async fn dispose(&self) {
        let timers: Vec<_> = self.reconnect_timers.lock().drain().collect();
        for (channel, timer) in timers {
            timer.abort();
            debug!(channel = %channel, "pending reconnect cancelled");
        }

        let names: Vec<String> = self
            .channels
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for name in &names {
            self.unsubscribe(name).await;
        }

        info!(released = names.len(), "connection manager disposed");
    }

    fn open(
        &self,
        request: Arc<SubscriptionRequest>,
        on_event: EventSink,
        backoff: Arc<Mutex<Backoff>>,
    ) -> Teardown {
        let name = request.channel.clone();

        match self.channels.entry(name.clone()) {
            Entry::Occupied(_) => {
                debug!(channel = %name, "channel already active, reusing");
            }
            Entry::Vacant(slot) => {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst);
                let binding = TableBinding::new(&self.options.schema, &request.table)
                    .with_filter(request.filter.clone());
                let channel = self.backend.open_channel(&name, &binding);

                let pump = tokio::spawn(pump_signals(
                    self.me.clone(),
                    name.clone(),
                    generation,
                    channel.signals,
                    on_event.clone(),
                ));

                info!(
                    channel = %name,
                    table = %request.table,
                    filter = ?request.filter,
                    "channel subscribing"
                );

                slot.insert(ActiveChannel {
                    generation,
                    backend_id: channel.id,
                    request,
                    on_event,
                    backoff,
                    phase: ChannelPhase::Subscribing,
                    pump,
                });
            }
        }

        Teardown::new(self.me.clone(), name)
    }

    /// Apply a join status; returns false when the pump should stop.
    fn on_status(&self, channel: &str, generation: u64, status: ChannelStatus) -> bool {
        match status {
            ChannelStatus::Subscribed => {
                let Some(mut active) = self.channels.get_mut(channel) else {
                    return false;
                };
                if active.generation != generation {
                    return false;
                }

                active.phase = ChannelPhase::Connected;
                let retries = {
                    let mut backoff = active.backoff.lock();
                    let attempts = backoff.attempts();
                    backoff.reset();
                    attempts
                };
                drop(active);

                self.set_state(ConnectionState::Connected);
                info!(channel, retries, "channel subscribed");
                true
            }
            ChannelStatus::ChannelError => {
                self.schedule_reconnect(channel, generation);
                false
            }
            ChannelStatus::Closed => {
                let Some((_, closed)) = self
                    .channels
                    .remove_if(channel, |_, active| active.generation == generation)
                else {
                    return false;
                };
                tokio::spawn(self.backend.close_channel(closed.backend_id));

                self.set_state(ConnectionState::Disconnected);
                info!(channel, "channel closed by backend, removed");
                false
            }
        }
    }

    fn schedule_reconnect(&self, channel: &str, generation: u64) {
        let Some((_, stale)) = self
            .channels
            .remove_if(channel, |_, active| active.generation == generation)
        else {
            return;
        };

        self.set_state(ConnectionState::Reconnecting);
        tokio::spawn(self.backend.close_channel(stale.backend_id));

        let ActiveChannel {
            request,
            on_event,
            backoff,
            ..
        } = stale;

        let next = backoff.lock().next_delay();
        let Some(delay) = next else {
            warn!(channel, "reconnect ceiling reached, giving up on channel");
            return;
        };

        warn!(
            channel,
            delay_ms = delay.as_millis() as u64,
            "channel error, scheduling reconnect"
        );

        let me = self.me.clone();
        let key = channel.to_string();
        let mut timers = self.reconnect_timers.lock();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(manager) = me.upgrade() {
                manager.reconnect_timers.lock().remove(&key);
                debug!(channel = %key, "reconnecting");
                let _ = manager.open(request, on_event, backoff);
            }
        });
        if let Some(previous) = timers.insert(channel.to_string(), timer) {
            previous.abort();
        }
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            debug!(state = next.as_str(), "connection state changed");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        for (_, timer) in self.reconnect_timers.get_mut().drain() {
            timer.abort();
        }
        for active in self.channels.iter() {
            active.pump.abort();
        }
    }
}

async fn pump_signals(
    manager: Weak<ConnectionManager>,
    channel: String,
    generation: u64,
    mut signals: mpsc::UnboundedReceiver<ChannelSignal>,
    on_event: EventSink,
) {
    while let Some(signal) = signals.recv().await {
        match signal {
            ChannelSignal::Change(change) => on_event(&change),
            ChannelSignal::Status(status) => {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                if !manager.on_status(&channel, generation, status) {
                    break;
                }
            }
        }
    }
    debug!(channel = %channel, generation, "signal pump finished");
}

/// Handle that releases one channel by name.
#[must_use = "the channel stays open until the teardown runs"]
pub struct Teardown {
    target: Option<(Weak<ConnectionManager>, String)>,
}

impl Teardown {
    fn new(manager: Weak<ConnectionManager>, channel: String) -> Self {
        Self {
            target: Some((manager, channel)),
        }
    }

    /// Teardown that does nothing (demo mode)
    pub fn noop() -> Self {
        Self { target: None }
    }

    pub fn is_noop(&self) -> bool {
        self.target.is_none()
    }

    pub fn channel(&self) -> Option<&str> {
        self.target.as_ref().map(|(_, channel)| channel.as_str())
    }

    pub async fn run(self) {
        if let Some((manager, channel)) = self.target {
            if let Some(manager) = manager.upgrade() {
                manager.unsubscribe(&channel).await;
            }
        }
    }
}

impl std::fmt::Debug for Teardown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Teardown")
            .field("channel", &self.channel())
            .finish()
    }
}
