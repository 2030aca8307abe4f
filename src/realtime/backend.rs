//! Publish/subscribe contract the connection manager needs from a backend.

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use super::change::RawChange;

/// Identifies one backend channel instance.
///
/// A reconnect opens a new instance under the same channel name, so the
/// name alone cannot tell a stale channel from a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendChannelId(pub u64);

/// Table-change listener configuration (`event: '*'`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableBinding {
    pub schema: String,
    pub table: String,
    /// Server-side filter such as `assigned_to=eq.42`
    pub filter: Option<String>,
}

impl TableBinding {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }
}

/// Join status reported by the backend for a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Subscribed,
    ChannelError,
    Closed,
}

impl ChannelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelStatus::Subscribed => "SUBSCRIBED",
            ChannelStatus::ChannelError => "CHANNEL_ERROR",
            ChannelStatus::Closed => "CLOSED",
        }
    }
}

/// Everything a channel can deliver, in backend order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSignal {
    Status(ChannelStatus),
    Change(RawChange),
}

/// An opened channel: its id plus the ordered signal stream.
pub struct BackendChannel {
    pub id: BackendChannelId,
    pub signals: mpsc::UnboundedReceiver<ChannelSignal>,
}

/// Backend change-stream service.
pub trait RealtimeBackend: Send + Sync + 'static {
    /// Open a channel, attach the table-change listener and start joining.
    ///
    /// Returns immediately; the join acknowledgment arrives later as a
    /// [`ChannelStatus`] on the signal stream.
    fn open_channel(&self, name: &str, binding: &TableBinding) -> BackendChannel;

    /// Release a channel's backend resources.
    fn close_channel(&self, id: BackendChannelId) -> BoxFuture<'static, ()>;
}
