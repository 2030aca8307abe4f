pub mod memory;
pub mod rest;

use anyhow::Result;
use futures::future::BoxFuture;

use crate::model::{Chore, Event, House, Player, WellnessLog};

pub use memory::{FetchCall, MemoryStore};
pub use rest::RestFetcher;

/// Authoritative fetches backing every synchronizer's `load()`.
///
/// Each call returns the full ordered list as the backend sees it.
pub trait Fetcher: Send + Sync + 'static {
    fn chores(&self) -> BoxFuture<'_, Result<Vec<Chore>>>;

    fn events(&self) -> BoxFuture<'_, Result<Vec<Event>>>;

    /// Events the player attends, resolved through the attendee relation
    fn player_events<'a>(&'a self, player_id: &'a str) -> BoxFuture<'a, Result<Vec<Event>>>;

    fn houses(&self) -> BoxFuture<'_, Result<Vec<House>>>;

    fn players(&self) -> BoxFuture<'_, Result<Vec<Player>>>;

    fn wellness_logs<'a>(&'a self, player_id: &'a str)
        -> BoxFuture<'a, Result<Vec<WellnessLog>>>;
}
