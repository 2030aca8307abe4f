//! Chore list synchronizer with an optional player scope.
//!
//! With a scope, only chores whose `assigned_to` equals the player are kept:
//! the channel carries a server-side filter and every merge re-checks it, so a
//! reassignment moves a chore in or out of the list.

use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::debug;

use super::{patch, remove, upsert, CachedList, ListView, SyncContext, TransientMarker};
use crate::model::{Chore, ChoreStatus, Row};
use crate::notify::NoticeCategory;
use crate::realtime::{BindingOptions, Handlers, TableSubscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateOutcome {
    Patched,
    Spliced,
    Evicted,
    Ignored,
}

struct ChoreState {
    ctx: SyncContext,
    scope: RwLock<Option<String>>,
    list: CachedList<Chore>,
    highlight: TransientMarker,
}

impl ChoreState {
    fn admits(&self, chore: &Chore) -> bool {
        match self.scope.read().as_deref() {
            Some(player) => chore.assigned_to.as_deref() == Some(player),
            None => true,
        }
    }

    fn is_scoped(&self) -> bool {
        self.scope.read().is_some()
    }

    async fn load(&self) {
        match self.ctx.fetcher.chores().await {
            Ok(chores) => {
                let scoped = chores.into_iter().filter(|c| self.admits(c)).collect();
                self.list.replace(scoped);
            }
            Err(err) => self.list.fail(&err),
        }
    }

    fn on_insert(&self, chore: Chore) {
        if !self.admits(&chore) {
            debug!(chore = %chore.id, "insert outside player scope ignored");
            return;
        }

        let id = chore.id.clone();
        let message = format!("New chore: {}", chore.title);
        self.list.modify(|view| upsert(&mut view.items, chore));
        self.highlight.mark(&id);
        self.ctx.notifier.publish(&message, NoticeCategory::Info);
    }

    fn on_update(&self, chore: Chore, previous: Option<Chore>) {
        let admitted = self.admits(&chore);
        let scoped = self.is_scoped();
        let id = chore.id.clone();
        let title = chore.title.clone();
        let completed_now = chore.status == ChoreStatus::Completed;

        let (outcome, was_completed) = self.list.modify(|view| {
            let cached = view.items.iter().find(|c| c.id == chore.id);
            let was_completed = previous
                .as_ref()
                .or(cached)
                .map(|c| c.status == ChoreStatus::Completed)
                .unwrap_or(false);

            let outcome = match (cached.is_some(), admitted) {
                (true, true) => {
                    patch(&mut view.items, chore);
                    UpdateOutcome::Patched
                }
                (true, false) => {
                    remove(&mut view.items, &id);
                    UpdateOutcome::Evicted
                }
                (false, true) if scoped => {
                    view.items.push(chore);
                    UpdateOutcome::Spliced
                }
                _ => UpdateOutcome::Ignored,
            };
            (outcome, was_completed)
        });

        debug!(chore = %id, ?outcome, "chore update merged");

        if matches!(outcome, UpdateOutcome::Patched | UpdateOutcome::Spliced) {
            self.highlight.mark(&id);
            if completed_now && !was_completed {
                self.ctx
                    .notifier
                    .publish(&format!("Chore completed: {title}"), NoticeCategory::Success);
            }
        }
    }

    fn on_delete(&self, id: String) {
        let removed = self.list.modify(|view| remove(&mut view.items, &id));
        if removed.is_some() && self.highlight.current().as_deref() == Some(id.as_str()) {
            self.highlight.cancel();
        }
    }
}

fn binding(scope: Option<&str>) -> BindingOptions {
    match scope {
        Some(player) => BindingOptions::new(format!("chores:player:{player}"), Chore::TABLE)
            .filter(Some(format!("assigned_to=eq.{player}"))),
        None => BindingOptions::new("chores:all", Chore::TABLE),
    }
}

fn handlers(state: &Arc<ChoreState>) -> Handlers<Chore> {
    let on_insert = Arc::downgrade(state);
    let on_update = Arc::downgrade(state);
    let on_delete: Weak<ChoreState> = Arc::downgrade(state);

    Handlers::new()
        .on_insert(move |chore| {
            if let Some(state) = on_insert.upgrade() {
                state.on_insert(chore);
            }
        })
        .on_update(move |chore, previous| {
            if let Some(state) = on_update.upgrade() {
                state.on_update(chore, previous);
            }
        })
        .on_delete(move |id, _| {
            if let Some(state) = on_delete.upgrade() {
                state.on_delete(id);
            }
        })
}

/// Live chore list, optionally scoped to one player.
pub struct ChoreSync {
    state: Arc<ChoreState>,
    subscription: TableSubscription<Chore>,
}

impl ChoreSync {
    /// Load the chores, then start following changes.
    pub async fn mount(ctx: SyncContext, player: Option<String>) -> Self {
        let state = Arc::new(ChoreState {
            highlight: TransientMarker::new(ctx.settings.highlight),
            scope: RwLock::new(player.clone()),
            list: CachedList::new("chores"),
            ctx,
        });

        state.load().await;

        let subscription = TableSubscription::bind(
            state.ctx.manager.clone(),
            binding(player.as_deref()),
            handlers(&state),
        );

        Self {
            state,
            subscription,
        }
    }

    /// Authoritative reload; replaces whatever the merges produced.
    pub async fn load(&self) {
        self.state.load().await;
    }

    /// Switch player scope: evicts out-of-scope chores, re-binds and reloads.
    pub async fn set_player_scope(&mut self, player: Option<String>) {
        if *self.state.scope.read() == player {
            return;
        }

        *self.state.scope.write() = player.clone();
        let state = self.state.clone();
        self.state
            .list
            .modify(|view| view.items.retain(|chore| state.admits(chore)));

        self.subscription
            .reconfigure(binding(player.as_deref()))
            .await;
        self.state.load().await;
    }

    pub fn player_scope(&self) -> Option<String> {
        self.state.scope.read().clone()
    }

    pub fn view(&self) -> ListView<Chore> {
        self.state.list.snapshot()
    }

    pub fn chores(&self) -> Vec<Chore> {
        self.view().items
    }

    pub fn watch(&self) -> watch::Receiver<ListView<Chore>> {
        self.state.list.subscribe()
    }

    /// Chore that changed within the highlight window
    pub fn highlighted(&self) -> Option<String> {
        self.state.highlight.current()
    }

    pub fn watch_highlight(&self) -> watch::Receiver<Option<String>> {
        self.state.highlight.subscribe()
    }

    /// Whether push events are flowing (false in demo mode)
    pub fn is_live(&self) -> bool {
        self.subscription.is_registered()
    }

    pub async fn unmount(self) {
        self.subscription.close().await;
        self.state.highlight.cancel();
    }
}
