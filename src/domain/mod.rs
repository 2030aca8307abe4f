//! Domain synchronizers
//!
//! Each synchronizer owns one cached list. `load()` replaces it wholesale from
//! the fetcher; push events merge into it in between. The list is published
//! through a `watch` channel so any number of views can follow it.
//!
//! # Invariants
//! - `loading` is true only until the first load settles; later reloads and
//!   push events never set it again.
//! - A failed load keeps the previous list and marks the view `stale`.
//! - Ids are unique within a list.

pub mod alerts;
pub mod chores;
pub mod events;
pub mod houses;
pub mod transient;
pub mod wellness;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error};

use crate::config::SyncConfig;
use crate::error::categorize_error;
use crate::fetch::Fetcher;
use crate::model::Row;
use crate::notify::Notifier;
use crate::realtime::ConnectionManager;

pub use alerts::{classify, Concern, Severity, WellnessAlert};
pub use chores::ChoreSync;
pub use events::EventSync;
pub use houses::HouseSync;
pub use transient::TransientMarker;
pub use wellness::WellnessSync;

#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// How long a changed chore stays highlighted
    pub highlight: Duration,
    /// How long a house stays marked after a points change
    pub animation: Duration,
    /// Maximum number of wellness logs kept
    pub wellness_limit: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            highlight: Duration::from_millis(2_000),
            animation: Duration::from_millis(1_500),
            wellness_limit: 50,
        }
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            highlight: Duration::from_millis(config.timing.highlight_ms),
            animation: Duration::from_millis(config.timing.animation_ms),
            wellness_limit: config.wellness.limit,
        }
    }
}

/// Collaborators shared by every synchronizer.
#[derive(Clone)]
pub struct SyncContext {
    pub manager: Arc<ConnectionManager>,
    pub fetcher: Arc<dyn Fetcher>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: SyncSettings,
}

impl SyncContext {
    pub fn new(
        manager: Arc<ConnectionManager>,
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            manager,
            fetcher,
            notifier,
            settings: SyncSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SyncSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Published state of one synchronizer.
#[derive(Debug, Clone, PartialEq)]
pub struct ListView<T> {
    pub items: Vec<T>,
    pub loading: bool,
    /// Last load failed; `items` are what the previous load returned
    pub stale: bool,
    pub last_error: Option<String>,
}

impl<T> ListView<T> {
    fn initial() -> Self {
        Self {
            items: Vec::new(),
            loading: true,
            stale: false,
            last_error: None,
        }
    }
}

pub(crate) struct CachedList<T: Row> {
    domain: &'static str,
    state: Mutex<ListView<T>>,
    view: watch::Sender<ListView<T>>,
}

impl<T: Row> CachedList<T> {
    pub(crate) fn new(domain: &'static str) -> Self {
        let (view, _) = watch::channel(ListView::initial());
        Self {
            domain,
            state: Mutex::new(ListView::initial()),
            view,
        }
    }

    /// Mutate under the lock and publish the result.
    pub(crate) fn modify<R>(&self, f: impl FnOnce(&mut ListView<T>) -> R) -> R {
        let mut state = self.state.lock();
        let result = f(&mut state);
        self.view.send_replace(state.clone());
        result
    }

    pub(crate) fn replace(&self, items: Vec<T>) {
        let count = items.len();
        self.modify(|view| {
            view.items = items;
            view.loading = false;
            view.stale = false;
            view.last_error = None;
        });
        debug!(domain = self.domain, count, "list replaced");
    }

    pub(crate) fn fail(&self, err: &anyhow::Error) {
        let message = format!("{err:#}");
        let category = categorize_error(err);
        error!(
            domain = self.domain,
            category = category.as_str(),
            error = %message,
            "load failed, keeping cached list"
        );
        self.modify(|view| {
            view.loading = false;
            view.stale = true;
            view.last_error = Some(message);
        });
    }

    pub(crate) fn snapshot(&self) -> ListView<T> {
        self.state.lock().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ListView<T>> {
        self.view.subscribe()
    }
}

/// Replace the row with the same id, or append. Returns true when appended.
pub(crate) fn upsert<T: Row>(items: &mut Vec<T>, record: T) -> bool {
    match items.iter_mut().find(|item| item.id() == record.id()) {
        Some(existing) => {
            *existing = record;
            false
        }
        None => {
            items.push(record);
            true
        }
    }
}

/// Replace the row with the same id in place; returns the old row.
pub(crate) fn patch<T: Row>(items: &mut [T], record: T) -> Option<T> {
    items
        .iter_mut()
        .find(|item| item.id() == record.id())
        .map(|existing| std::mem::replace(existing, record))
}

pub(crate) fn remove<T: Row>(items: &mut Vec<T>, id: &str) -> Option<T> {
    let index = items.iter().position(|item| item.id() == id)?;
    Some(items.remove(index))
}
