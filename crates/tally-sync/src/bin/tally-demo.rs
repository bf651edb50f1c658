//! # Tally Demo
//!
//! Walks the event cache through a connect, offline, reconnect cycle against
//! an in-memory remote service and prints what the JavaScript host would see.
//!
//! ## Usage
//! ```bash
//! cargo run -p tally-sync --bin tally-demo
//!
//! # Use a specific config file
//! cargo run -p tally-sync --bin tally-demo -- --config ./tally.toml
//!
//! # More logging
//! RUST_LOG=trace cargo run -p tally-sync --bin tally-demo
//! ```

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tally_core::EventRecord;
use tally_sync::{EventCache, EventsAgent, EventsBridge, InMemoryEventService, TallyConfig};
use tracing_subscriber::EnvFilter;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info,tally_sync=debug,tally_core=debug";

/// Events the demo service starts with: (id, name, value)
const SEED_EVENTS: &[(&str, &str, i64)] = &[
    ("CgkIl8XfzJYbEAIQAQ", "Chests opened", 12),
    ("CgkIl8XfzJYbEAIQAg", "Dungeons cleared", 3),
    ("CgkIl8XfzJYbEAIQAw", "Gold collected", 1450),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally Event Cache Demo");
                println!();
                println!("Usage: tally-demo [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let config = TallyConfig::load(config_path)?;
    let remote = Arc::new(InMemoryEventService::with_events(
        SEED_EVENTS.iter().map(|(id, name, value)| seed_event(id, name, *value)),
    ));

    let cache = Arc::new(EventCache::from_config(&config)?);
    let bridge = EventsBridge::from_config(cache.clone(), &config);
    let agent = EventsAgent::new(cache.clone(), config.clone()).start();

    println!("Tally Event Cache Demo");
    println!("======================");
    println!("Bridge interface: {}", bridge.interface_name());
    println!("Reload merge:     {}", config.reload.merge);
    println!();

    println!("Before connecting: {:?}", bridge.get_all_event_data_as_json()?);

    agent.connected(remote.clone()).await?;
    for _ in 0..100 {
        if cache.status().loaded {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    println!("✓ Connected and loaded {} events", cache.status().record_count);

    let (chests, _, _) = SEED_EVENTS[0];
    bridge.increment_event(chests, 1)?;

    println!();
    println!("⚠ Remote service going offline");
    remote.set_online(false);

    bridge.increment_event(chests, 2)?;
    bridge.increment_event(chests, 3)?;
    bridge.increment_event("not-a-real-event", 5)?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    println!("  Local:   {:?}", bridge.get_event_data_as_json(chests)?);
    println!("  Remote:  {:?}", remote.value_of(chests));
    println!("  Pending: {:?}", cache.pending());

    println!();
    println!("✓ Remote service back online");
    remote.set_online(true);
    agent.flush().await?;
    agent.shutdown().await?;

    println!("  Local:   {:?}", bridge.get_event_data_as_json(chests)?);
    println!("  Remote:  {:?}", remote.value_of(chests));
    println!("  Pending: {:?}", cache.pending());

    println!();
    println!("Status:");
    println!("{}", serde_json::to_string_pretty(&cache.status())?);

    Ok(())
}

fn seed_event(id: &str, name: &str, value: i64) -> EventRecord {
    EventRecord {
        id: id.to_string(),
        name: name.to_string(),
        description: format!("{} this season", name),
        formatted_value: value.to_string(),
        icon_ref: Some(format!("content://tally/icons/{}.png", id)),
        value,
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
