//! House standings synchronizer.
//!
//! The list is kept sorted by `total_points` descending after every load and
//! every merge. Sorting is stable, so tied houses keep their prior order.

use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::debug;

use super::{remove, upsert, CachedList, ListView, SyncContext, TransientMarker};
use crate::model::{House, Player, Row};
use crate::notify::NoticeCategory;
use crate::realtime::{BindingOptions, ChangeKind, EventKinds, Handlers, TableSubscription};

fn sort_standings(houses: &mut [House]) {
    houses.sort_by(|a, b| b.total_points.cmp(&a.total_points));
}

/// Human-readable description of a point change; `None` when nothing moved.
pub fn describe_delta(name: &str, delta: i64) -> Option<(String, NoticeCategory)> {
    match delta {
        0 => None,
        d if d > 0 => Some((format!("{name} gained {d} points"), NoticeCategory::Success)),
        d => Some((format!("{name} lost {} points", -d), NoticeCategory::Warning)),
    }
}

struct HouseState {
    ctx: SyncContext,
    list: CachedList<House>,
    animating: TransientMarker,
}

impl HouseState {
    async fn load(&self) {
        match self.ctx.fetcher.houses().await {
            Ok(mut houses) => {
                sort_standings(&mut houses);
                self.list.replace(houses);
            }
            Err(err) => self.list.fail(&err),
        }
    }

    fn on_insert(&self, house: House) {
        self.list.modify(|view| {
            upsert(&mut view.items, house);
            sort_standings(&mut view.items);
        });
    }

    fn on_update(self: &Arc<Self>, house: House, previous: Option<House>) {
        let id = house.id.clone();
        let name = house.name.clone();
        let points = house.total_points;

        let cached = self.list.modify(|view| {
            let slot = view.items.iter_mut().find(|h| h.id == house.id)?;
            let cached = std::mem::replace(slot, house);
            sort_standings(&mut view.items);
            Some(cached)
        });

        let Some(cached) = cached else {
            debug!(house = %id, "update for unknown house, reloading standings");
            spawn_reload(Arc::downgrade(self));
            return;
        };

        let before = previous.map(|h| h.total_points).unwrap_or(cached.total_points);
        if let Some((message, category)) = describe_delta(&name, points - before) {
            self.ctx.notifier.publish(&message, category);
        }
        self.animating.mark(&id);
    }

    fn on_delete(&self, id: String) {
        self.list.modify(|view| remove(&mut view.items, &id));
    }

    /// Player totals feed the house aggregate, so any movement means re-fetch.
    fn on_player_update(self: &Arc<Self>, player: Player, previous: Option<Player>) {
        let changed = previous
            .map(|p| p.total_points != player.total_points)
            .unwrap_or(true);

        if changed {
            debug!(player = %player.id, "player points changed, reloading standings");
            spawn_reload(Arc::downgrade(self));
        }
    }
}

fn spawn_reload(state: Weak<HouseState>) {
    tokio::spawn(async move {
        if let Some(state) = state.upgrade() {
            state.load().await;
        }
    });
}

fn house_handlers(state: &Arc<HouseState>) -> Handlers<House> {
    let on_insert = Arc::downgrade(state);
    let on_update = Arc::downgrade(state);
    let on_delete = Arc::downgrade(state);

    Handlers::new()
        .on_insert(move |house| {
            if let Some(state) = on_insert.upgrade() {
                state.on_insert(house);
            }
        })
        .on_update(move |house, previous| {
            if let Some(state) = on_update.upgrade() {
                state.on_update(house, previous);
            }
        })
        .on_delete(move |id, _| {
            if let Some(state) = on_delete.upgrade() {
                state.on_delete(id);
            }
        })
}

fn player_handlers(state: &Arc<HouseState>) -> Handlers<Player> {
    let weak = Arc::downgrade(state);
    Handlers::new().on_update(move |player, previous| {
        if let Some(state) = weak.upgrade() {
            state.on_player_update(player, previous);
        }
    })
}

/// Live house standings.
pub struct HouseSync {
    state: Arc<HouseState>,
    houses: TableSubscription<House>,
    players: TableSubscription<Player>,
}

impl HouseSync {
    pub async fn mount(ctx: SyncContext) -> Self {
        let state = Arc::new(HouseState {
            animating: TransientMarker::new(ctx.settings.animation),
            list: CachedList::new("houses"),
            ctx,
        });

        state.load().await;

        let manager = state.ctx.manager.clone();
        let houses = TableSubscription::bind(
            manager.clone(),
            BindingOptions::new("houses:standings", House::TABLE),
            house_handlers(&state),
        );
        let players = TableSubscription::bind(
            manager,
            BindingOptions::new("players:points", Player::TABLE)
                .events(EventKinds::only(&[ChangeKind::Update])),
            player_handlers(&state),
        );

        Self {
            state,
            houses,
            players,
        }
    }

    pub async fn load(&self) {
        self.state.load().await;
    }

    pub fn view(&self) -> ListView<House> {
        self.state.list.snapshot()
    }

    /// Houses ordered by points, highest first
    pub fn standings(&self) -> Vec<House> {
        self.view().items
    }

    pub fn watch(&self) -> watch::Receiver<ListView<House>> {
        self.state.list.subscribe()
    }

    /// House whose points changed within the animation window
    pub fn animating(&self) -> Option<String> {
        self.state.animating.current()
    }

    pub fn watch_animating(&self) -> watch::Receiver<Option<String>> {
        self.state.animating.subscribe()
    }

    pub fn is_live(&self) -> bool {
        self.houses.is_registered()
    }

    pub async fn unmount(self) {
        self.houses.close().await;
        self.players.close().await;
        self.state.animating.cancel();
    }
}
