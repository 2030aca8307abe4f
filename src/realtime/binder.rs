//! Typed binding of one channel to per-event callbacks.
//!
//! Callbacks sit behind a shared holder, so swapping them never touches the
//! channel. Only the stable identifiers (channel name, table, filter and the
//! enabled flag) decide whether the binding has to re-register.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

use super::change::{ChangeEvent, ChangeKind, EventKinds, RawChange};
use super::manager::{ConnectionManager, EventSink, SubscriptionRequest, Teardown};
use crate::model::Row;

type InsertFn<T> = Box<dyn Fn(T) + Send + Sync>;
type UpdateFn<T> = Box<dyn Fn(T, Option<T>) + Send + Sync>;
type DeleteFn<T> = Box<dyn Fn(String, Option<T>) + Send + Sync>;
type ChangeFn = Box<dyn Fn(&RawChange) + Send + Sync>;

/// Callbacks for one table subscription.
pub struct Handlers<T> {
    on_insert: Option<InsertFn<T>>,
    on_update: Option<UpdateFn<T>>,
    on_delete: Option<DeleteFn<T>>,
    on_change: Option<ChangeFn>,
}

impl<T> Default for Handlers<T> {
    fn default() -> Self {
        Self {
            on_insert: None,
            on_update: None,
            on_delete: None,
            on_change: None,
        }
    }
}

impl<T: Row> Handlers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the inserted record
    pub fn on_insert(mut self, f: impl Fn(T) + Send + Sync + 'static) -> Self {
        self.on_insert = Some(Box::new(f));
        self
    }

    /// Called with the new record and, when the backend sent it, the old one
    pub fn on_update(mut self, f: impl Fn(T, Option<T>) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }

    /// Called with the deleted id and, when the backend sent it, the old record
    pub fn on_delete(mut self, f: impl Fn(String, Option<T>) + Send + Sync + 'static) -> Self {
        self.on_delete = Some(Box::new(f));
        self
    }

    /// Called with every raw change, regardless of kind
    pub fn on_change(mut self, f: impl Fn(&RawChange) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Box::new(f));
        self
    }

    fn handles(&self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Insert => self.on_insert.is_some(),
            ChangeKind::Update => self.on_update.is_some(),
            ChangeKind::Delete => self.on_delete.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BindingOptions {
    pub channel: String,
    pub table: String,
    pub filter: Option<String>,
    pub events: EventKinds,
    pub enabled: bool,
}

impl BindingOptions {
    pub fn new(channel: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            table: table.into(),
            filter: None,
            events: EventKinds::all(),
            enabled: true,
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

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn key(&self) -> (&str, &str, Option<&str>, bool) {
        (
            &self.channel,
            &self.table,
            self.filter.as_deref(),
            self.enabled,
        )
    }
}

struct Dispatch<T> {
    events: EventKinds,
    handlers: Handlers<T>,
}

impl<T: Row> Dispatch<T> {
    fn deliver(&self, raw: &RawChange) {
        let handlers = &self.handlers;

        if self.events.contains(raw.event_type) && handlers.handles(raw.event_type) {
            match ChangeEvent::<T>::decode(raw) {
                Ok(ChangeEvent::Insert { record }) => {
                    if let Some(f) = &handlers.on_insert {
                        f(record);
                    }
                }
                Ok(ChangeEvent::Update { record, previous }) => {
                    if let Some(f) = &handlers.on_update {
                        f(record, previous);
                    }
                }
                Ok(ChangeEvent::Delete { id, previous }) => {
                    if let Some(f) = &handlers.on_delete {
                        f(id, previous);
                    }
                }
                Err(err) => {
                    warn!(
                        table = T::TABLE,
                        kind = raw.event_type.as_str(),
                        error = %err,
                        "undecodable change skipped"
                    );
                }
            }
        }

        if let Some(f) = &handlers.on_change {
            f(raw);
        }
    }
}

/// A live binding of one channel to typed callbacks.
///
/// Registers on [`TableSubscription::bind`] (when enabled) and releases the
/// channel on [`TableSubscription::close`] or drop.
pub struct TableSubscription<T: Row> {
    manager: Arc<ConnectionManager>,
    options: BindingOptions,
    dispatch: Arc<RwLock<Dispatch<T>>>,
    teardown: Option<Teardown>,
}

impl<T: Row> TableSubscription<T> {
    pub fn bind(
        manager: Arc<ConnectionManager>,
        options: BindingOptions,
        handlers: Handlers<T>,
    ) -> Self {
        let dispatch = Arc::new(RwLock::new(Dispatch {
            events: options.events,
            handlers,
        }));

        let mut subscription = Self {
            manager,
            options,
            dispatch,
            teardown: None,
        };
        subscription.register();
        subscription
    }

    /// Replace the callbacks; the channel is left untouched.
    pub fn set_handlers(&self, handlers: Handlers<T>) {
        self.dispatch.write().handlers = handlers;
    }

    /// Apply new options, re-registering only when an identifier changed.
    ///
    /// Returns true when the channel was re-registered.
    pub async fn reconfigure(&mut self, options: BindingOptions) -> bool {
        self.dispatch.write().events = options.events;

        if options.key() == self.options.key() {
            self.options = options;
            return false;
        }

        if let Some(teardown) = self.teardown.take() {
            teardown.run().await;
        }
        self.options = options;
        self.register();
        true
    }

    pub async fn set_enabled(&mut self, enabled: bool) -> bool {
        let options = self.options.clone().enabled(enabled);
        self.reconfigure(options).await
    }

    pub fn options(&self) -> &BindingOptions {
        &self.options
    }

    /// Whether a live channel backs this binding (false when disabled or in demo mode)
    pub fn is_registered(&self) -> bool {
        self.teardown
            .as_ref()
            .map(|teardown| !teardown.is_noop())
            .unwrap_or(false)
    }

    pub async fn close(mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown.run().await;
        }
    }

    fn register(&mut self) {
        if !self.options.enabled {
            debug!(channel = %self.options.channel, "binding disabled, not subscribing");
            return;
        }

        let dispatch = self.dispatch.clone();
        let sink: EventSink = Arc::new(move |raw: &RawChange| dispatch.read().deliver(raw));

        let request = SubscriptionRequest::new(&self.options.channel, &self.options.table)
            .filter(self.options.filter.clone())
            .events(self.options.events);

        self.teardown = Some(self.manager.subscribe(request, sink));
    }
}

impl<T: Row> Drop for TableSubscription<T> {
    fn drop(&mut self) {
        let Some(teardown) = self.teardown.take() else {
            return;
        };
        if teardown.is_noop() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(teardown.run());
            }
            Err(_) => {
                debug!(
                    channel = %self.options.channel,
                    "no runtime on drop, channel left for manager dispose"
                );
            }
        }
    }
}
