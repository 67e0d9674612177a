//! Event ingestion - async channel processor for host events
//!
//! Each event is dispatched as it arrives; failures are logged and counted
//! but never stop the loop.

use crate::events::{DispatchOutcome, EventDispatcher, HostEvent};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

const REPORT_INTERVAL_SECS: u64 = 10;

/// Counters accumulated over one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionStats {
    pub received: u64,
    pub written: u64,
    pub deleted: u64,
    pub ignored: u64,
    pub failed: u64,
}

impl IngestionStats {
    fn record(&mut self, event: &HostEvent, outcome: crate::Result<DispatchOutcome>) {
        self.received += 1;
        match outcome {
            Ok(DispatchOutcome::Written(_)) | Ok(DispatchOutcome::EdgeWritten(_)) => self.written += 1,
            Ok(DispatchOutcome::DeviceDeleted(_)) => self.deleted += 1,
            Ok(DispatchOutcome::Ignored) => self.ignored += 1,
            Err(e) if e.is_validation() => {
                self.failed += 1;
                log::warn!("⚠️  Rejected event \"{}\" ({:?}): {}", event.event, event.device_id, e);
            }
            Err(e) => {
                self.failed += 1;
                log::error!("❌ Failed to store event \"{}\" ({:?}): {}", event.event, event.device_id, e);
            }
        }
    }
}

/// Drain host events from `rx` until every sender is dropped
///
/// Returns the counters of the whole run.
pub async fn start_event_ingestion(
    mut rx: mpsc::Receiver<HostEvent>,
    dispatcher: EventDispatcher,
) -> IngestionStats {
    log::info!("🚀 Starting event ingestion");
    log::info!("   ├─ Channel capacity: {}", rx.max_capacity());
    log::info!("   └─ Waiting for events...");

    let mut stats = IngestionStats::default();
    let mut report_timer = interval(Duration::from_secs(REPORT_INTERVAL_SECS));
    report_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut window_count = 0u64;
    let mut window_start = std::time::Instant::now();

    loop {
        tokio::select! {
            maybe_event = rx.recv() => {
                let Some(event) = maybe_event else {
                    log::info!("⚠️  Event channel closed, stopping ingestion");
                    break;
                };
                let outcome = dispatcher.handle(&event);
                stats.record(&event, outcome);
                window_count += 1;
            }

            _ = report_timer.tick() => {
                if window_count > 0 {
                    let events_per_sec = window_count as f64 / window_start.elapsed().as_secs_f64();
                    log::info!(
                        "📊 Ingestion rate: {:.1} events/sec (total: {}, failed: {}) | channel: {}/{}",
                        events_per_sec,
                        stats.received,
                        stats.failed,
                        rx.len(),
                        rx.max_capacity()
                    );
                }
                window_count = 0;
                window_start = std::time::Instant::now();
            }
        }
    }

    log::info!("✅ Event ingestion stopped");
    log::info!("   ├─ Received: {}", stats.received);
    log::info!("   ├─ Written: {} | Deleted: {}", stats.written, stats.deleted);
    log::info!("   └─ Ignored: {} | Failed: {}", stats.ignored, stats.failed);
    stats
}
