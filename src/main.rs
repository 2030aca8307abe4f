use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use house_sync::domain::Severity;
use house_sync::fetch::Fetcher;
use house_sync::logging::init_logging;
use house_sync::model::{
    Chore, ChoreStatus, Event, EventAttendee, House, Mood, Player, Row, WellnessLog,
};
use house_sync::realtime::RawChange;
use house_sync::{
    BroadcastNotifier, ChoreSync, ConnectionManager, EventSync, HouseSync, LogNotifier,
    MemoryBackend, MemoryStore, NoticeCategory, RestFetcher, SyncConfig, SyncContext,
    SyncSettings, WellnessSync,
};

#[derive(Parser)]
#[command(name = "house-sync")]
#[command(about = "Live house points, chores, events and wellness sync", version)]
#[command(after_help = "Without a configured backend url every command runs against demo data.

Environment:
   HOUSE_SYNC_URL, HOUSE_SYNC_API_KEY, HOUSE_SYNC_SCHEMA, HOUSE_SYNC_DEMO,
   HOUSE_SYNC_LOG, HOUSE_SYNC_LOG_DIR")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show house standings
    Standings,

    /// List chores
    Chores {
        /// Only chores assigned to this player
        #[arg(short, long)]
        player: Option<String>,
    },

    /// List events
    Events {
        /// Only events this player attends
        #[arg(short, long)]
        player: Option<String>,
    },

    /// Show recent wellness check-ins with alerts
    Wellness {
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Stream simulated point changes through the live pipeline
    Simulate {
        #[arg(short, long, default_value = "5")]
        rounds: usize,
    },

    /// Print the reconnect delay schedule
    Backoff {
        #[arg(short, long, default_value = "8")]
        steps: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SyncConfig::load(cli.config.as_deref())?;
    let _guard = init_logging(&config.log)?;

    match cli.command {
        Commands::Standings => {
            let houses = HouseSync::mount(snapshot_context(&config)?).await;
            print_stale(houses.view().last_error.as_deref());
            print_standings(&houses.standings());
        }

        Commands::Chores { player } => {
            let chores = ChoreSync::mount(snapshot_context(&config)?, player.clone()).await;
            print_stale(chores.view().last_error.as_deref());

            let heading = match &player {
                Some(player) => format!("Chores for {player}"),
                None => "All chores".to_string(),
            };
            println!("{}", heading.cyan().bold());
            for chore in chores.chores() {
                let status = match chore.status {
                    ChoreStatus::Completed => "done".green(),
                    ChoreStatus::InProgress => "doing".yellow(),
                    ChoreStatus::Pending => "todo".bright_white(),
                    ChoreStatus::Unknown => "?".dimmed(),
                };
                println!(
                    "  [{}] {} ({} pts) {}",
                    status,
                    chore.title,
                    chore.points,
                    chore.assigned_to.unwrap_or_default().dimmed()
                );
            }
        }

        Commands::Events { player } => {
            let events = EventSync::mount(snapshot_context(&config)?, player).await;
            print_stale(events.view().last_error.as_deref());

            println!("{}", "Events".cyan().bold());
            for event in events.events() {
                let when = event
                    .start_time
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "tbd".to_string());
                println!(
                    "  {} {} {}",
                    when.bright_white(),
                    event.title,
                    event.location.unwrap_or_default().dimmed()
                );
            }
        }

        Commands::Wellness { limit } => {
            let mut ctx = snapshot_context(&config)?;
            if let Some(limit) = limit {
                ctx.settings.wellness_limit = limit.max(1);
            }
            let wellness = WellnessSync::mount(ctx).await;
            print_stale(wellness.view().last_error.as_deref());

            println!("{}", "Wellness check-ins".cyan().bold());
            for (log, alert) in wellness.alerts() {
                let name = wellness
                    .player(&log.player_id)
                    .map(|p| p.name)
                    .unwrap_or(log.player_id.clone());
                let severity = match alert.severity {
                    Severity::High => "HIGH".red().bold(),
                    Severity::Medium => "MED".yellow(),
                    Severity::Low => "ok".green(),
                };
                let concerns: Vec<_> = alert.concerns.iter().map(|c| c.describe()).collect();
                println!(
                    "  {:>4} {} {} {}",
                    severity,
                    log.created_at.format("%m-%d %H:%M"),
                    name,
                    concerns.join(", ").dimmed()
                );
            }
        }

        Commands::Simulate { rounds } => {
            simulate(&config, rounds).await?;
        }

        Commands::Backoff { steps } => {
            let policy = config.reconnect.policy();
            let mut backoff = policy.backoff();
            println!("{}", "Reconnect schedule".cyan().bold());
            for attempt in 1..=steps {
                match backoff.next_delay() {
                    Some(delay) => {
                        println!("  attempt {:>2}: {} ms", attempt, delay.as_millis())
                    }
                    None => {
                        println!("  attempt {:>2}: {}", attempt, "gives up".red());
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// One-time fetches only: the manager is forced into demo mode.
fn snapshot_context(config: &SyncConfig) -> Result<SyncContext> {
    let fetcher: Arc<dyn Fetcher> = match &config.backend.url {
        Some(_) => Arc::new(RestFetcher::from_config(&config.backend)?),
        None => Arc::new(demo_store()),
    };
    let manager = ConnectionManager::new(
        Arc::new(MemoryBackend::new()),
        config.manager_options(),
        || true,
    );

    Ok(SyncContext::new(manager, fetcher, Arc::new(LogNotifier))
        .with_settings(SyncSettings::from(config)))
}

async fn simulate(config: &SyncConfig, rounds: usize) -> Result<()> {
    let backend = Arc::new(MemoryBackend::new());
    let store = Arc::new(demo_store());
    let notifier = Arc::new(BroadcastNotifier::new());
    let mut notices = notifier.subscribe();

    let manager = ConnectionManager::new(backend.clone(), config.manager_options(), || false);
    let ctx = SyncContext::new(manager.clone(), store.clone(), notifier.clone())
        .with_settings(SyncSettings::from(config));

    let houses = HouseSync::mount(ctx).await;
    println!(
        "{} {}",
        "Connection:".cyan().bold(),
        manager.connection_state().as_str()
    );
    print_standings(&houses.standings());

    for round in 0..rounds {
        let standings = houses.standings();
        if standings.is_empty() {
            break;
        }

        // Cycle through houses from the bottom so the order keeps moving.
        let previous = standings[standings.len() - 1 - round % standings.len()].clone();
        let delta = if round % 3 == 2 { -4 } else { 7 + round as i64 };
        let mut updated = previous.clone();
        updated.total_points += delta;

        store.upsert_house(updated.clone());
        backend.broadcast(House::TABLE, RawChange::update(&updated, Some(&previous))?);
        tokio::time::sleep(Duration::from_millis(50)).await;

        println!("\n{} {}", "Round".cyan().bold(), round + 1);
        while let Ok(notice) = notices.try_recv() {
            let line = match notice.category {
                NoticeCategory::Success => notice.message.green(),
                NoticeCategory::Warning => notice.message.yellow(),
                NoticeCategory::Info => notice.message.normal(),
            };
            println!("  {line}");
        }
        print_standings(&houses.standings());
    }

    houses.unmount().await;
    manager.dispose().await;
    Ok(())
}

fn print_stale(error: Option<&str>) {
    if let Some(error) = error {
        println!("{} {}", "stale:".yellow().bold(), error);
    }
}

fn print_standings(houses: &[House]) {
    println!("{}", "Standings".cyan().bold());
    for (rank, house) in houses.iter().enumerate() {
        println!(
            "  {}. {:<12} {:>5}",
            rank + 1,
            house.name.bright_white(),
            house.total_points
        );
    }
}

fn demo_store() -> MemoryStore {
    let store = MemoryStore::new();
    let now = chrono::Utc::now();

    store.set_houses(
        [("h1", "Red", 120), ("h2", "Blue", 135), ("h3", "Green", 98), ("h4", "Gold", 110)]
            .into_iter()
            .map(|(id, name, points)| House {
                id: id.to_string(),
                name: name.to_string(),
                color: Some(name.to_lowercase()),
                total_points: points,
            })
            .collect(),
    );

    let players: Vec<Player> = [("p1", "Ana", "h1"), ("p2", "Ben", "h2"), ("p3", "Caro", "h3")]
        .into_iter()
        .map(|(id, name, house)| Player {
            id: id.to_string(),
            name: name.to_string(),
            house_id: Some(house.to_string()),
            total_points: 30,
        })
        .collect();
    store.set_players(players);

    store.set_chores(
        [
            ("c1", "Take out recycling", "p1", ChoreStatus::Pending, 5),
            ("c2", "Clean kit room", "p2", ChoreStatus::InProgress, 10),
            ("c3", "Pump match balls", "p1", ChoreStatus::Completed, 3),
        ]
        .into_iter()
        .map(|(id, title, player, status, points)| Chore {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            assigned_to: Some(player.to_string()),
            status,
            points,
            due_date: None,
            created_at: Some(now),
        })
        .collect(),
    );

    store.set_events(
        [("e1", "Team dinner", "Clubhouse", 2), ("e2", "Recovery session", "Pool", 5)]
            .into_iter()
            .map(|(id, title, location, days)| Event {
                id: id.to_string(),
                title: title.to_string(),
                description: None,
                location: Some(location.to_string()),
                start_time: Some(now + chrono::Duration::days(days)),
                end_time: None,
                created_by: None,
            })
            .collect(),
    );
    store.set_attendees(vec![EventAttendee {
        id: "a1".to_string(),
        event_id: "e1".to_string(),
        player_id: "p1".to_string(),
        status: Some("going".to_string()),
    }]);

    store.set_wellness_logs(vec![
        WellnessLog {
            id: "w1".to_string(),
            player_id: "p1".to_string(),
            created_at: now - chrono::Duration::hours(2),
            sleep_hours: Some(7.5),
            sleep_quality: Some(4),
            energy_level: Some(4),
            soreness: Some(2),
            stress: Some(2),
            mood: Some(Mood::Good),
            notes: None,
        },
        WellnessLog {
            id: "w2".to_string(),
            player_id: "p2".to_string(),
            created_at: now - chrono::Duration::hours(1),
            sleep_hours: Some(5.0),
            sleep_quality: Some(2),
            energy_level: Some(3),
            soreness: Some(4),
            stress: Some(3),
            mood: Some(Mood::Poor),
            notes: Some("late travel".to_string()),
        },
    ]);

    store
}
