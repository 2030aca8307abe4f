//! # house-sync - Live Sync for House Points, Chores, Events and Wellness
//!
//! Keeps client-side lists in step with a database that pushes row changes
//! over named channels.
//!
//! ## Layers
//!
//! - **Connection Manager**: one registry of channels, idempotent subscribe,
//!   exponential-backoff reconnects, demo mode that never opens a channel
//! - **Subscription Binder**: typed insert/update/delete callbacks over a channel,
//!   re-registered only when the channel identity changes
//! - **Domain Synchronizers**: chores, events, house standings and wellness logs,
//!   each loading once and merging push events afterwards
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use house_sync::{
//!     ConnectionManager, HouseSync, LogNotifier, ManagerOptions, MemoryBackend, MemoryStore,
//!     SyncContext,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = Arc::new(MemoryBackend::new());
//!     let manager = ConnectionManager::new(backend, ManagerOptions::default(), || false);
//!     let ctx = SyncContext::new(manager, Arc::new(MemoryStore::new()), Arc::new(LogNotifier));
//!
//!     let houses = HouseSync::mount(ctx).await;
//!     for house in houses.standings() {
//!         println!("{} {}", house.name, house.total_points);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod model;
pub mod notify;
pub mod realtime;

// Re-export main types for library consumers
pub use config::SyncConfig;
pub use domain::{
    ChoreSync, EventSync, HouseSync, ListView, Severity, SyncContext, SyncSettings, WellnessSync,
};
pub use error::{Backoff, ReconnectPolicy};
pub use fetch::{Fetcher, MemoryStore, RestFetcher};
pub use model::{Chore, Event, EventAttendee, House, Player, WellnessLog};
pub use notify::{BroadcastNotifier, LogNotifier, NoticeCategory, Notifier};
pub use realtime::{
    ConnectionManager, ConnectionState, ManagerOptions, MemoryBackend, TableSubscription,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
