//! Notification publishing
//!
//! Synchronizers describe noteworthy changes ("Red +5 points") through a
//! [`Notifier`]. Rendering is someone else's job: [`BroadcastNotifier`] fans
//! notices out to any number of listeners, [`LogNotifier`] just traces them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeCategory {
    Info,
    Success,
    Warning,
}

impl NoticeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeCategory::Info => "info",
            NoticeCategory::Success => "success",
            NoticeCategory::Warning => "warning",
        }
    }
}

impl fmt::Display for NoticeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget publish contract.
pub trait Notifier: Send + Sync + 'static {
    fn publish(&self, message: &str, category: NoticeCategory);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub category: NoticeCategory,
}

impl Notice {
    pub fn new(message: impl Into<String>, category: NoticeCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            message: message.into(),
            category,
        }
    }
}

/// In-process broadcast of notices to every subscriber.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Arc<Notice>>,
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Notice>> {
        self.tx.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn publish(&self, message: &str, category: NoticeCategory) {
        // No listeners is fine; the notice is simply dropped.
        let _ = self.tx.send(Arc::new(Notice::new(message, category)));
    }
}

/// Notifier that writes notices to the trace log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn publish(&self, message: &str, category: NoticeCategory) {
        info!(category = category.as_str(), "{message}");
    }
}
