//! Periodic background loops.

use std::sync::Arc;
use std::time::Duration;

use store::Store;
use tokio::task::JoinHandle;

use crate::orchestrator::ShipmentOrchestrator;
use crate::worker::OutboxWorker;

/// Spawns the outbox consumer loop.
pub fn spawn_outbox_worker<S: Store + 'static>(
    worker: Arc<OutboxWorker<S>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = worker.process_pending().await {
                tracing::error!(error = %e, "outbox worker tick failed");
            }
        }
    })
}

/// Spawns the tracking poll loop.
pub fn spawn_tracking_poller<S: Store + 'static>(
    orchestrator: Arc<ShipmentOrchestrator<S>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match orchestrator.poll_tracking().await {
                Ok(summary) => {
                    tracing::debug!(
                        polled = summary.polled,
                        events = summary.events_recorded,
                        failures = summary.failures,
                        "tracking sweep done"
                    );
                }
                Err(e) => tracing::error!(error = %e, "tracking sweep failed"),
            }
        }
    })
}

/// Spawns the daily pickup registration loop.
pub fn spawn_pickup_scheduler<S: Store + 'static>(
    orchestrator: Arc<ShipmentOrchestrator<S>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match orchestrator.register_daily_pickup().await {
                Ok(Some(token)) => tracing::info!(%token, "daily pickup registered"),
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "daily pickup failed"),
            }
        }
    })
}
