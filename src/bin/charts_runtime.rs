//! Charts Runtime - host event ingestion
//!
//! Reads host events as JSON lines on stdin and stores their chart values:
//! - Opens (or creates) the charts database
//! - Spawns the ingestion loop behind a bounded channel
//! - Stops on EOF or CTRL+C, then prints ingestion counters
//!
//! Usage:
//!   charts_runtime < events.jsonl
//!
//! Event line format:
//!   {"event": "sensors.temperature.update", "device_id": "abc", "params": {"values": [{"field": "celsius", "value": 21.5}]}}
//!
//! Environment variables:
//!   CHARTS_DB_PATH - SQLite database path (default: /var/lib/sensorcharts/charts.db)
//!   CHARTS_MAX_DATA_SIZE - Query byte budget (default: 1000000)
//!   CHARTS_EVENT_BUFFER - Channel size (default: 1000)
//!   CHARTS_BUSY_TIMEOUT_MS - SQLite busy timeout (default: 5000)

use dotenv::dotenv;
use log::{error, info, warn};
use sensorcharts::{start_event_ingestion, ChartStore, ChartsConfig, EventDispatcher, HostEvent};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ChartsConfig::from_env();

    info!("🚀 Charts Runtime");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Max data size: {} bytes", config.max_data_size);
    info!("   └─ Channel buffer: {} events", config.event_buffer);

    info!("🔧 Initializing database...");
    let store = Arc::new(ChartStore::open(&config.db_path, &config)?);

    let (tx, rx) = mpsc::channel::<HostEvent>(config.event_buffer);
    let ingestion = tokio::spawn(start_event_ingestion(rx, EventDispatcher::new(store)));

    info!("🔄 Reading events from stdin (CTRL+C to stop)");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_number = 0u64;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => {
                        info!("📭 End of input");
                        break;
                    }
                };
                line_number += 1;
                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<HostEvent>(&line) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            error!("❌ Ingestion task stopped unexpectedly");
                            break;
                        }
                    }
                    Err(e) => warn!("⚠️  Skipping line {}: {}", line_number, e),
                }
            }

            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
                    Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
                }
                break;
            }
        }
    }

    // closing the channel lets ingestion drain and exit
    drop(tx);
    let stats = ingestion.await?;

    info!("✅ Charts runtime stopped ({} events stored)", stats.written);
    Ok(())
}
