//! Wellness log synchronizer.
//!
//! Loads every player's logs, newest first, capped at the configured limit.
//! Alerts are derived with [`classify`] whenever they are asked for.

use anyhow::Result;
use futures::future::try_join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use super::alerts::{classify, Severity, WellnessAlert};
use super::{patch, remove, CachedList, ListView, SyncContext};
use crate::fetch::Fetcher;
use crate::model::{Player, Row, WellnessLog};
use crate::notify::NoticeCategory;
use crate::realtime::{BindingOptions, Handlers, TableSubscription};

struct WellnessState {
    ctx: SyncContext,
    limit: usize,
    list: CachedList<WellnessLog>,
    players: RwLock<HashMap<String, Player>>,
}

async fn fetch_all(
    fetcher: &dyn Fetcher,
    limit: usize,
) -> Result<(Vec<Player>, Vec<WellnessLog>)> {
    let players = fetcher.players().await?;
    let per_player = try_join_all(
        players
            .iter()
            .map(|player| fetcher.wellness_logs(&player.id)),
    )
    .await?;

    let mut logs: Vec<WellnessLog> = per_player.into_iter().flatten().collect();
    logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    logs.truncate(limit);
    Ok((players, logs))
}

impl WellnessState {
    async fn load(&self) {
        match fetch_all(self.ctx.fetcher.as_ref(), self.limit).await {
            Ok((players, logs)) => {
                *self.players.write() = players
                    .into_iter()
                    .map(|player| (player.id.clone(), player))
                    .collect();
                self.list.replace(logs);
            }
            Err(err) => self.list.fail(&err),
        }
    }

    fn player_name(&self, player_id: &str) -> String {
        self.players
            .read()
            .get(player_id)
            .map(|player| player.name.clone())
            .unwrap_or_else(|| "A player".to_string())
    }

    fn on_insert(&self, log: WellnessLog) {
        let alert = classify(&log);
        let name = self.player_name(&log.player_id);

        let limit = self.limit;
        self.list.modify(|view| {
            view.items.retain(|existing| existing.id != log.id);
            view.items.insert(0, log);
            view.items.truncate(limit);
        });

        match alert.severity {
            Severity::High => self.ctx.notifier.publish(
                &format!("{name} needs attention: {}", summarize(&alert)),
                NoticeCategory::Warning,
            ),
            _ => self.ctx.notifier.publish(
                &format!("{name} submitted a wellness check-in"),
                NoticeCategory::Info,
            ),
        }
    }

    fn on_update(&self, log: WellnessLog) {
        let patched = self.list.modify(|view| patch(&mut view.items, log));
        if patched.is_none() {
            debug!("update for a log outside the window ignored");
        }
    }

    fn on_delete(&self, id: String) {
        self.list.modify(|view| remove(&mut view.items, &id));
    }
}

fn summarize(alert: &WellnessAlert) -> String {
    alert
        .concerns
        .iter()
        .map(|concern| concern.describe())
        .collect::<Vec<_>>()
        .join(", ")
}

fn handlers(state: &Arc<WellnessState>) -> Handlers<WellnessLog> {
    let on_insert = Arc::downgrade(state);
    let on_update = Arc::downgrade(state);
    let on_delete = Arc::downgrade(state);

    Handlers::new()
        .on_insert(move |log| {
            if let Some(state) = on_insert.upgrade() {
                state.on_insert(log);
            }
        })
        .on_update(move |log, _| {
            if let Some(state) = on_update.upgrade() {
                state.on_update(log);
            }
        })
        .on_delete(move |id, _| {
            if let Some(state) = on_delete.upgrade() {
                state.on_delete(id);
            }
        })
}

/// Live feed of recent wellness check-ins across all players.
pub struct WellnessSync {
    state: Arc<WellnessState>,
    subscription: TableSubscription<WellnessLog>,
}

impl WellnessSync {
    pub async fn mount(ctx: SyncContext) -> Self {
        let state = Arc::new(WellnessState {
            limit: ctx.settings.wellness_limit,
            list: CachedList::new("wellness"),
            players: RwLock::new(HashMap::new()),
            ctx,
        });

        state.load().await;

        let subscription = TableSubscription::bind(
            state.ctx.manager.clone(),
            BindingOptions::new("wellness_logs:all", WellnessLog::TABLE),
            handlers(&state),
        );

        Self {
            state,
            subscription,
        }
    }

    pub async fn load(&self) {
        self.state.load().await;
    }

    pub fn view(&self) -> ListView<WellnessLog> {
        self.state.list.snapshot()
    }

    pub fn logs(&self) -> Vec<WellnessLog> {
        self.view().items
    }

    pub fn watch(&self) -> watch::Receiver<ListView<WellnessLog>> {
        self.state.list.subscribe()
    }

    pub fn player(&self, player_id: &str) -> Option<Player> {
        self.state.players.read().get(player_id).cloned()
    }

    /// Every cached log paired with its alert
    pub fn alerts(&self) -> Vec<(WellnessLog, WellnessAlert)> {
        self.logs()
            .into_iter()
            .map(|log| {
                let alert = classify(&log);
                (log, alert)
            })
            .collect()
    }

    /// Logs at or above the given severity
    pub fn flagged(&self, at_least: Severity) -> Vec<(WellnessLog, WellnessAlert)> {
        self.alerts()
            .into_iter()
            .filter(|(_, alert)| alert.severity >= at_least)
            .collect()
    }

    pub fn is_live(&self) -> bool {
        self.subscription.is_registered()
    }

    pub async fn unmount(self) {
        self.subscription.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};

    fn log(id: &str, player: &str, minutes: i64) -> WellnessLog {
        WellnessLog {
            id: id.to_string(),
            player_id: player.to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
                + Duration::minutes(minutes),
            sleep_hours: Some(8.0),
            sleep_quality: None,
            energy_level: None,
            soreness: None,
            stress: None,
            mood: None,
            notes: None,
        }
    }

    fn player(id: &str) -> Player {
        Player {
            id: id.to_string(),
            name: id.to_uppercase(),
            house_id: None,
            total_points: 0,
        }
    }

    #[tokio::test]
    async fn test_fetch_all_merges_players_newest_first() {
        let store = MemoryStore::new();
        store.set_players(vec![player("p1"), player("p2")]);
        store.set_wellness_logs(vec![
            log("a", "p1", 0),
            log("b", "p2", 30),
            log("c", "p1", 10),
            log("d", "p2", 5),
        ]);

        let (players, logs) = fetch_all(&store, 3).await.unwrap();
        assert_eq!(players.len(), 2);
        let ids: Vec<_> = logs.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);
    }
}
