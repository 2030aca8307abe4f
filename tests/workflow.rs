mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use common::{chore, eventually, house, player, settle};
use house_sync::realtime::{ChannelStatus, ConnectionState, RawChange};
use house_sync::{
    BroadcastNotifier, ChoreSync, ConnectionManager, HouseSync, MemoryBackend, MemoryStore,
    SyncConfig, SyncContext, SyncSettings, WellnessSync,
};
use tempfile::TempDir;
use tokio::time::sleep;

const CONFIG: &str = r#"
[backend]
url = "https://db.example.com"
schema = "club"

[reconnect]
initial_delay_ms = 500
max_delay_ms = 4000

[timing]
animation_ms = 300

[wellness]
limit = 10
"#;

#[tokio::test(start_paused = true)]
async fn config_to_live_standings_and_back() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("house-sync.toml");
    std::fs::write(&path, CONFIG)?;
    let config = SyncConfig::from_file(&path)?;
    config.validate()?;
    assert!(!config.is_demo_mode_active());

    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(BroadcastNotifier::new());
    let mut notices = notifier.subscribe();
    store.set_houses(vec![house("red", 10), house("blue", 20)]);
    store.set_players(vec![player("p1", 0)]);
    store.set_chores(vec![chore("c1", Some("p1"))]);

    let manager = ConnectionManager::new(backend.clone(), config.manager_options(), || {
        config.is_demo_mode_active()
    });
    let ctx = SyncContext::new(manager.clone(), store.clone(), notifier.clone())
        .with_settings(SyncSettings::from(&config));

    let houses = HouseSync::mount(ctx.clone()).await;
    let chores = ChoreSync::mount(ctx.clone(), Some("p1".to_string())).await;
    let wellness = WellnessSync::mount(ctx).await;
    settle().await;

    assert_eq!(manager.active_subscriptions(), 4);
    assert_eq!(manager.connection_state(), ConnectionState::Connected);
    assert_eq!(
        backend.binding("houses:standings").map(|b| b.schema),
        Some("club".to_string())
    );

    // Point change flows through to standings and a notice.
    backend.emit(
        "houses:standings",
        RawChange::update(&house("red", 35), Some(&house("red", 10)))?,
    );
    settle().await;
    assert_eq!(houses.standings()[0].id, "red");
    assert_eq!(notices.try_recv()?.message, "red gained 25 points");
    sleep(Duration::from_millis(301)).await;
    assert_eq!(houses.animating(), None);

    // A dropped channel comes back after the configured initial delay.
    backend.emit_status("chores:player:p1", ChannelStatus::ChannelError);
    settle().await;
    assert_eq!(manager.connection_state(), ConnectionState::Reconnecting);
    sleep(Duration::from_millis(501)).await;
    assert!(eventually(|| manager.connection_state() == ConnectionState::Connected).await);
    assert!(backend.is_open("chores:player:p1"));

    // Events on the new channel still land in the same list.
    backend.emit(
        "chores:player:p1",
        RawChange::insert(&chore("c2", Some("p1")))?,
    );
    settle().await;
    assert_eq!(chores.chores().len(), 2);

    houses.unmount().await;
    chores.unmount().await;
    wellness.unmount().await;
    manager.dispose().await;
    assert_eq!(backend.open_channels(), 0);
    assert_eq!(manager.connection_state(), ConnectionState::Disconnected);
    Ok(())
}

#[tokio::test]
async fn missing_backend_url_means_demo_mode() -> Result<()> {
    let config = SyncConfig::from_toml("[timing]\nhighlight_ms = 100\n")?;
    assert!(config.is_demo_mode_active());

    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(MemoryStore::new());
    store.set_houses(vec![house("red", 1)]);
    let manager = ConnectionManager::new(backend.clone(), config.manager_options(), || {
        config.is_demo_mode_active()
    });
    let ctx = SyncContext::new(manager, store, Arc::new(BroadcastNotifier::new()));

    let houses = HouseSync::mount(ctx).await;
    assert_eq!(houses.standings().len(), 1);
    assert!(!houses.is_live());
    assert_eq!(backend.opened_count(), 0);
    Ok(())
}
