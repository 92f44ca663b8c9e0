//! Outbox worker: turns persisted intents into side effects.

use std::sync::Arc;

use metrics::counter;
use store::{OutboxKind, Store};

use crate::error::Result;
use crate::notify::Notifier;
use crate::orchestrator::ShipmentOrchestrator;

/// Consumes pending outbox entries.
///
/// Entries are marked processed only after their side effect succeeds, so a
/// crash mid-batch means redelivery, and every consumer here is idempotent.
pub struct OutboxWorker<S> {
    store: Arc<S>,
    orchestrator: Arc<ShipmentOrchestrator<S>>,
    notifier: Arc<dyn Notifier>,
    batch_size: usize,
}

impl<S: Store> OutboxWorker<S> {
    /// Creates a new worker.
    pub fn new(
        store: Arc<S>,
        orchestrator: Arc<ShipmentOrchestrator<S>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            notifier,
            batch_size: 20,
        }
    }

    /// Processes one batch of pending entries. Returns how many were
    /// completed; entries that fail stay pending for the next tick.
    #[tracing::instrument(skip(self))]
    pub async fn process_pending(&self) -> Result<usize> {
        let pending = self.store.pending_outbox(self.batch_size).await?;
        let mut processed = 0;

        for entry in pending {
            let result = match &entry.kind {
                OutboxKind::GenerateShipment { order_id } => self
                    .orchestrator
                    .generate_shipment(*order_id)
                    .await
                    .map(|_| ()),
                OutboxKind::SendEmail { template, order_id } => {
                    match self.store.get_order(*order_id).await? {
                        Some(order) => self.notifier.send(template, &order).await,
                        None => {
                            // The order vanished; nothing sensible to retry.
                            tracing::warn!(order_id = %order_id, "outbox email for missing order");
                            Ok(())
                        }
                    }
                }
            };

            match result {
                Ok(()) => {
                    self.store.mark_outbox_processed(entry.id).await?;
                    processed += 1;
                    counter!("outbox_processed_total").increment(1);
                }
                Err(e) => {
                    counter!("outbox_failures_total").increment(1);
                    tracing::warn!(outbox_id = %entry.id, error = %e, "outbox entry failed");
                }
            }
        }

        Ok(processed)
    }
}
