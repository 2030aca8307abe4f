//! In-memory tables implementing [`Fetcher`], with failure injection.

use anyhow::{bail, Result};
use dashmap::DashMap;
use futures::future::{self, BoxFuture};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use super::Fetcher;
use crate::model::{Chore, Event, EventAttendee, House, Player, Row, WellnessLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchCall {
    Chores,
    Events,
    PlayerEvents,
    Houses,
    Players,
    WellnessLogs,
}

#[derive(Default)]
struct Tables {
    chores: Vec<Chore>,
    events: Vec<Event>,
    attendees: Vec<EventAttendee>,
    houses: Vec<House>,
    players: Vec<Player>,
    wellness_logs: Vec<WellnessLog>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    calls: DashMap<FetchCall, usize>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_chores(&self, chores: Vec<Chore>) {
        self.tables.write().chores = chores;
    }

    pub fn set_events(&self, events: Vec<Event>) {
        self.tables.write().events = events;
    }

    pub fn set_attendees(&self, attendees: Vec<EventAttendee>) {
        self.tables.write().attendees = attendees;
    }

    pub fn set_houses(&self, houses: Vec<House>) {
        self.tables.write().houses = houses;
    }

    pub fn set_players(&self, players: Vec<Player>) {
        self.tables.write().players = players;
    }

    pub fn set_wellness_logs(&self, logs: Vec<WellnessLog>) {
        self.tables.write().wellness_logs = logs;
    }

    pub fn upsert_house(&self, house: House) {
        upsert(&mut self.tables.write().houses, house);
    }

    pub fn upsert_player(&self, player: Player) {
        upsert(&mut self.tables.write().players, player);
    }

    pub fn upsert_event(&self, event: Event) {
        upsert(&mut self.tables.write().events, event);
    }

    pub fn add_attendee(&self, attendee: EventAttendee) {
        upsert(&mut self.tables.write().attendees, attendee);
    }

    /// Make every fetch fail until switched back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of times a fetch was attempted
    pub fn calls(&self, call: FetchCall) -> usize {
        self.calls.get(&call).map(|count| *count).unwrap_or(0)
    }

    fn read<R>(&self, call: FetchCall, f: impl FnOnce(&Tables) -> R) -> Result<R> {
        *self.calls.entry(call).or_insert(0) += 1;
        if self.offline.load(Ordering::SeqCst) {
            bail!("connection refused: memory store offline");
        }
        Ok(f(&self.tables.read()))
    }
}

fn upsert<T: Row>(rows: &mut Vec<T>, row: T) {
    match rows.iter_mut().find(|existing| existing.id() == row.id()) {
        Some(existing) => *existing = row,
        None => rows.push(row),
    }
}

impl Fetcher for MemoryStore {
    fn chores(&self) -> BoxFuture<'_, Result<Vec<Chore>>> {
        Box::pin(future::ready(
            self.read(FetchCall::Chores, |t| t.chores.clone()),
        ))
    }

    fn events(&self) -> BoxFuture<'_, Result<Vec<Event>>> {
        Box::pin(future::ready(
            self.read(FetchCall::Events, |t| t.events.clone()),
        ))
    }

    fn player_events<'a>(&'a self, player_id: &'a str) -> BoxFuture<'a, Result<Vec<Event>>> {
        Box::pin(future::ready(self.read(FetchCall::PlayerEvents, |t| {
            t.events
                .iter()
                .filter(|event| {
                    t.attendees
                        .iter()
                        .any(|a| a.event_id == event.id && a.player_id == player_id)
                })
                .cloned()
                .collect()
        })))
    }

    fn houses(&self) -> BoxFuture<'_, Result<Vec<House>>> {
        Box::pin(future::ready(
            self.read(FetchCall::Houses, |t| t.houses.clone()),
        ))
    }

    fn players(&self) -> BoxFuture<'_, Result<Vec<Player>>> {
        Box::pin(future::ready(
            self.read(FetchCall::Players, |t| t.players.clone()),
        ))
    }

    fn wellness_logs<'a>(
        &'a self,
        player_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<WellnessLog>>> {
        Box::pin(future::ready(self.read(FetchCall::WellnessLogs, |t| {
            t.wellness_logs
                .iter()
                .filter(|log| log.player_id == player_id)
                .cloned()
                .collect()
        })))
    }
}
