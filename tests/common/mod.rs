#![allow(dead_code)]

use std::sync::Arc;

use house_sync::model::{Chore, ChoreStatus, Event, EventAttendee, House, Player, WellnessLog};
use house_sync::{
    BroadcastNotifier, ConnectionManager, ManagerOptions, MemoryBackend, MemoryStore,
    SyncContext,
};

/// Let spawned pumps and reloads run to completion.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Poll `cond` between yields; false if it never held.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..256 {
        if cond() {
            return true;
        }
        tokio::task::yield_now().await;
    }
    cond()
}

pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<BroadcastNotifier>,
    pub manager: Arc<ConnectionManager>,
}

impl Harness {
    pub fn live() -> Self {
        Self::build(false)
    }

    pub fn demo() -> Self {
        Self::build(true)
    }

    fn build(demo: bool) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let manager =
            ConnectionManager::new(backend.clone(), ManagerOptions::default(), move || demo);
        Self {
            backend,
            store: Arc::new(MemoryStore::new()),
            notifier: Arc::new(BroadcastNotifier::new()),
            manager,
        }
    }

    pub fn context(&self) -> SyncContext {
        SyncContext::new(
            self.manager.clone(),
            self.store.clone(),
            self.notifier.clone(),
        )
    }
}

pub fn house(id: &str, points: i64) -> House {
    House {
        id: id.to_string(),
        name: id.to_string(),
        color: None,
        total_points: points,
    }
}

pub fn player(id: &str, points: i64) -> Player {
    Player {
        id: id.to_string(),
        name: id.to_string(),
        house_id: None,
        total_points: points,
    }
}

pub fn chore(id: &str, assigned_to: Option<&str>) -> Chore {
    Chore {
        id: id.to_string(),
        title: format!("chore {id}"),
        description: None,
        assigned_to: assigned_to.map(str::to_string),
        status: ChoreStatus::Pending,
        points: 5,
        due_date: None,
        created_at: None,
    }
}

pub fn event(id: &str) -> Event {
    Event {
        id: id.to_string(),
        title: format!("event {id}"),
        description: None,
        location: None,
        start_time: None,
        end_time: None,
        created_by: None,
    }
}

pub fn attendee(id: &str, event_id: &str, player_id: &str) -> EventAttendee {
    EventAttendee {
        id: id.to_string(),
        event_id: event_id.to_string(),
        player_id: player_id.to_string(),
        status: None,
    }
}

pub fn wellness(id: &str, player_id: &str, minutes: i64) -> WellnessLog {
    use chrono::TimeZone;
    WellnessLog {
        id: id.to_string(),
        player_id: player_id.to_string(),
        created_at: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap()
            + chrono::Duration::minutes(minutes),
        sleep_hours: Some(8.0),
        sleep_quality: Some(4),
        energy_level: Some(4),
        soreness: Some(1),
        stress: Some(1),
        mood: None,
        notes: None,
    }
}
