//! Event list synchronizer.
//!
//! Unscoped, push events merge by id. Scoped to a player, membership depends on
//! the attendee relation which a single event row cannot tell us, so inserts
//! and every attendee change fall back to a full reload. A scope change empties
//! the list before reloading so a failed reload never shows another scope.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::debug;

use super::{patch, remove, upsert, CachedList, ListView, SyncContext};
use crate::model::{Event, EventAttendee, Row};
use crate::notify::NoticeCategory;
use crate::realtime::{BindingOptions, Handlers, TableSubscription};

struct EventState {
    ctx: SyncContext,
    scope: RwLock<Option<String>>,
    list: CachedList<Event>,
}

impl EventState {
    async fn load(&self) {
        let scope = self.scope.read().clone();
        let fetched = match scope.as_deref() {
            Some(player) => self.ctx.fetcher.player_events(player).await,
            None => self.ctx.fetcher.events().await,
        };

        match fetched {
            Ok(events) => self.list.replace(events),
            Err(err) => self.list.fail(&err),
        }
    }

    fn is_scoped(&self) -> bool {
        self.scope.read().is_some()
    }

    /// Scoped inserts are silent: the row may not concern the player at all.
    fn on_insert(self: &Arc<Self>, event: Event) {
        if self.is_scoped() {
            debug!(event = %event.id, "scoped insert, reloading");
            spawn_reload(Arc::downgrade(self));
            return;
        }

        self.ctx
            .notifier
            .publish(&format!("New event: {}", event.title), NoticeCategory::Info);
        self.list.modify(|view| upsert(&mut view.items, event));
    }

    fn on_update(&self, event: Event) {
        self.list.modify(|view| patch(&mut view.items, event));
    }

    fn on_delete(&self, id: String) {
        self.list.modify(|view| remove(&mut view.items, &id));
    }
}

fn spawn_reload(state: Weak<EventState>) {
    tokio::spawn(async move {
        if let Some(state) = state.upgrade() {
            state.load().await;
        }
    });
}

fn event_binding(scope: Option<&str>) -> BindingOptions {
    match scope {
        Some(player) => BindingOptions::new(format!("events:player:{player}"), Event::TABLE),
        None => BindingOptions::new("events:all", Event::TABLE),
    }
}

/// Attendee rows only matter under a scope; unscoped the binding is disabled.
fn attendee_binding(scope: Option<&str>) -> BindingOptions {
    let player = scope.unwrap_or_default();
    BindingOptions::new(format!("event_attendees:player:{player}"), EventAttendee::TABLE)
        .filter(Some(format!("player_id=eq.{player}")))
        .enabled(scope.is_some())
}

fn event_handlers(state: &Arc<EventState>) -> Handlers<Event> {
    let on_insert = Arc::downgrade(state);
    let on_update = Arc::downgrade(state);
    let on_delete = Arc::downgrade(state);

    Handlers::new()
        .on_insert(move |event| {
            if let Some(state) = on_insert.upgrade() {
                state.on_insert(event);
            }
        })
        .on_update(move |event, _| {
            if let Some(state) = on_update.upgrade() {
                state.on_update(event);
            }
        })
        .on_delete(move |id, _| {
            if let Some(state) = on_delete.upgrade() {
                state.on_delete(id);
            }
        })
}

fn attendee_handlers(state: &Arc<EventState>) -> Handlers<EventAttendee> {
    let weak = Arc::downgrade(state);
    Handlers::new().on_change(move |raw| {
        debug!(kind = raw.event_type.as_str(), "attendee change, reloading events");
        spawn_reload(weak.clone());
    })
}

/// Live event list, optionally limited to the events one player attends.
pub struct EventSync {
    state: Arc<EventState>,
    events: TableSubscription<Event>,
    attendees: TableSubscription<EventAttendee>,
}

impl EventSync {
    pub async fn mount(ctx: SyncContext, player: Option<String>) -> Self {
        let state = Arc::new(EventState {
            scope: RwLock::new(player.clone()),
            list: CachedList::new("events"),
            ctx,
        });

        state.load().await;

        let manager = state.ctx.manager.clone();
        let events = TableSubscription::bind(
            manager.clone(),
            event_binding(player.as_deref()),
            event_handlers(&state),
        );
        let attendees = TableSubscription::bind(
            manager,
            attendee_binding(player.as_deref()),
            attendee_handlers(&state),
        );

        Self {
            state,
            events,
            attendees,
        }
    }

    pub async fn load(&self) {
        self.state.load().await;
    }

    pub async fn set_player_scope(&mut self, player: Option<String>) {
        if *self.state.scope.read() == player {
            return;
        }

        // Attendance is unknown until the reload, so nothing cached survives.
        *self.state.scope.write() = player.clone();
        self.state.list.modify(|view| view.items.clear());

        self.events.reconfigure(event_binding(player.as_deref())).await;
        self.attendees
            .reconfigure(attendee_binding(player.as_deref()))
            .await;
        self.state.load().await;
    }

    pub fn player_scope(&self) -> Option<String> {
        self.state.scope.read().clone()
    }

    pub fn view(&self) -> ListView<Event> {
        self.state.list.snapshot()
    }

    pub fn events(&self) -> Vec<Event> {
        self.view().items
    }

    pub fn watch(&self) -> watch::Receiver<ListView<Event>> {
        self.state.list.subscribe()
    }

    pub fn is_live(&self) -> bool {
        self.events.is_registered()
    }

    /// Whether the attendee relation is being followed
    pub fn follows_attendees(&self) -> bool {
        self.attendees.is_registered()
    }

    pub async fn unmount(self) {
        self.events.close().await;
        self.attendees.close().await;
    }
}
