//! Applies payment-gateway results to orders.

use std::sync::Arc;

use common::{OrderId, PaymentStatus};
use metrics::counter;
use store::{OutboxKind, Store};

use crate::error::{FulfillmentError, Result};
use crate::gateway::{PaymentGateway, PaymentSession};

/// Email template enqueued when a payment confirms.
pub const PAYMENT_CONFIRMATION_TEMPLATE: &str = "payment_confirmation";

/// What a verified callback did to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackDisposition {
    /// Payment confirmed; shipment generation and the confirmation email are
    /// enqueued.
    Completed,
    /// The order was already settled; nothing changed.
    Replayed,
    /// Payment failed; stock was restored.
    Failed,
}

/// Opens payment sessions and applies gateway callbacks.
#[derive(Clone)]
pub struct PaymentCoordinator<S> {
    store: Arc<S>,
    gateway: Arc<dyn PaymentGateway>,
    /// Where the gateway sends the customer after paying.
    redirect_url: String,
}

impl<S: Store> PaymentCoordinator<S> {
    /// Creates a new coordinator.
    pub fn new(store: Arc<S>, gateway: Arc<dyn PaymentGateway>, redirect_url: String) -> Self {
        Self {
            store,
            gateway,
            redirect_url,
        }
    }

    /// Opens a payment session for a pending order and records the
    /// transaction id on it.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn initiate(&self, order_id: OrderId) -> Result<PaymentSession> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))?;
        if order.payment_status == PaymentStatus::Completed {
            return Err(FulfillmentError::AlreadyPaid(order_id));
        }

        let session = self
            .gateway
            .initiate_payment(order.id, order.total, &self.redirect_url)
            .await?;
        self.store
            .set_payment_session(order.id, &session.transaction_id)
            .await?;

        counter!("payments_initiated_total").increment(1);
        Ok(session)
    }

    /// Verifies and applies one gateway callback.
    ///
    /// A bad signature rejects the payload before any order row is read.
    /// Replays are detected inside the store's conditional transitions
    /// (`complete_payment`, `fail_payment_and_restock`) and change nothing;
    /// a failed payment restocks every line item exactly once.
    #[tracing::instrument(skip_all)]
    pub async fn apply_callback(
        &self,
        raw_body: &str,
        x_verify: &str,
    ) -> Result<CallbackDisposition> {
        let verified = self.gateway.verify_callback(raw_body, x_verify)?;

        let order = self
            .store
            .find_order_by_transaction(&verified.transaction_id)
            .await?
            .ok_or_else(|| FulfillmentError::UnknownTransaction(verified.transaction_id.clone()))?;

        if verified.success {
            let provider_id = verified
                .provider_payment_id
                .as_deref()
                .unwrap_or(&verified.transaction_id);
            let outbox = [
                OutboxKind::GenerateShipment { order_id: order.id },
                OutboxKind::SendEmail {
                    template: PAYMENT_CONFIRMATION_TEMPLATE.to_string(),
                    order_id: order.id,
                },
            ];
            let applied = self
                .store
                .complete_payment(order.id, provider_id, &outbox)
                .await?;
            if applied {
                counter!("payments_completed_total").increment(1);
                tracing::info!(order_id = %order.id, "payment completed");
                Ok(CallbackDisposition::Completed)
            } else {
                tracing::debug!(order_id = %order.id, "payment callback replay");
                Ok(CallbackDisposition::Replayed)
            }
        } else {
            // The store applies the transition only from Pending; a replayed
            // failure, or one racing a success, comes back as false and
            // stock does not move twice.
            let applied = self.store.fail_payment_and_restock(order.id).await?;
            if applied {
                counter!("payments_failed_total").increment(1);
                tracing::info!(order_id = %order.id, "payment failed, stock restored");
                Ok(CallbackDisposition::Failed)
            } else {
                tracing::debug!(order_id = %order.id, "failure callback replay");
                Ok(CallbackDisposition::Replayed)
            }
        }
    }
}
