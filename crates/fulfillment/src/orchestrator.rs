//! Shipment orchestration: the state machine over shipment records.
//!
//! The orchestrator owns every shipment mutation after checkout. Carrier
//! calls go through the [`CarrierApi`] seam; transport failures are retried
//! on a fixed backoff, business rejections are not.

use std::sync::Arc;
use std::time::Duration;

use carrier::{
    CarrierApi, CarrierError, PickupRequest, WaybillRequest, billable_weight, Dimensions,
    PRODUCT_DOMESTIC_PRIORITY, SUB_PRODUCT_COD, SUB_PRODUCT_PREPAID,
};
use chrono::Utc;
use common::{Money, OrderId, PaymentMethod, ShipmentId, ShipmentStatus};
use metrics::counter;
use store::{OrderRecord, ShipmentRecord, Store, TrackingEventRecord};

use crate::error::{FulfillmentError, Result};

/// Orchestrator tuning. Carrier account details and packaging defaults come
/// from [`carrier::CarrierConfig`].
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Waybill generation attempts per trigger.
    pub waybill_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Pickup window, HHMM.
    pub pickup_time: String,
    pub close_time: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            waybill_attempts: 3,
            retry_delay: Duration::from_secs(5),
            pickup_time: "1600".to_string(),
            close_time: "1800".to_string(),
        }
    }
}

/// Outcome of one tracking sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub polled: usize,
    pub events_recorded: usize,
    pub status_changes: usize,
    pub failures: usize,
}

/// Drives shipments from order commit to delivery.
pub struct ShipmentOrchestrator<S> {
    store: Arc<S>,
    carrier: Arc<dyn CarrierApi>,
    carrier_config: carrier::CarrierConfig,
    config: OrchestratorConfig,
}

impl<S: Store> ShipmentOrchestrator<S> {
    /// Creates a new orchestrator.
    pub fn new(
        store: Arc<S>,
        carrier: Arc<dyn CarrierApi>,
        carrier_config: carrier::CarrierConfig,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            carrier,
            carrier_config,
            config,
        }
    }

    /// Generates a carrier shipment for an order.
    ///
    /// Idempotent: an order that already has a shipment gets it back
    /// unchanged. On carrier transport failure the waybill call is retried up
    /// to the configured budget; when the budget is spent the shipment stays
    /// `pending` with `last_error` set and a later trigger can pick it up.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn generate_shipment(&self, order_id: OrderId) -> Result<ShipmentRecord> {
        let existing = self.store.get_shipment_by_order(order_id).await?;
        if let Some(existing) = &existing {
            // Resume only a pending shipment that never got its waybill.
            if existing.awb_number.is_some() || existing.status != ShipmentStatus::Pending {
                tracing::debug!(shipment_id = %existing.id, "shipment already exists");
                return Ok(existing.clone());
            }
        }

        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))?;

        let sub_product = match order.payment_method {
            PaymentMethod::Cod => SUB_PRODUCT_COD,
            PaymentMethod::Prepaid => SUB_PRODUCT_PREPAID,
        };
        let collectible = match order.payment_method {
            PaymentMethod::Cod => order.total,
            PaymentMethod::Prepaid => Money::zero(),
        };

        let dimensions = Dimensions {
            length_cm: self.carrier_config.default_length_cm,
            width_cm: self.carrier_config.default_width_cm,
            height_cm: self.carrier_config.default_height_cm,
        };
        let weight = billable_weight(
            self.carrier_config.default_weight_kg,
            dimensions.length_cm,
            dimensions.width_cm,
            dimensions.height_cm,
        );

        let now = Utc::now();
        let mut shipment = match existing {
            Some(shipment) => shipment,
            None => {
                let shipment = ShipmentRecord {
                    id: ShipmentId::new(),
                    order_id,
                    awb_number: None,
                    pickup_token: None,
                    product_code: PRODUCT_DOMESTIC_PRIORITY.to_string(),
                    sub_product_code: sub_product.to_string(),
                    origin_area: self.carrier_config.origin_area.clone(),
                    destination_area: None,
                    destination_pincode: order.shipping.pincode.clone(),
                    weight_kg: weight,
                    declared_value: order.total,
                    collectible_amount: collectible,
                    status: ShipmentStatus::Pending,
                    label_pdf: None,
                    expected_delivery_date: None,
                    created_at: now,
                    updated_at: now,
                    shipped_at: None,
                    delivered_at: None,
                    last_error: None,
                };
                self.store.insert_shipment(shipment.clone()).await?;
                shipment
            }
        };

        // Best effort; a failed lookup only costs the delivery estimate.
        if let Ok(transit) = self
            .carrier
            .transit_time(
                &order.shipping.pincode,
                PRODUCT_DOMESTIC_PRIORITY,
                sub_product,
                now.date_naive(),
            )
            .await
        {
            shipment.expected_delivery_date = transit.expected_delivery_date;
            shipment.destination_area = transit.area_code;
        }

        let request = build_waybill_request(&order, &shipment, dimensions);

        for attempt in 1..=self.config.waybill_attempts {
            match self.carrier.generate_waybill(&request).await {
                Ok(waybill) => {
                    shipment.awb_number = Some(waybill.awb_number);
                    shipment.label_pdf = waybill.label_pdf;
                    if waybill.destination_area.is_some() {
                        shipment.destination_area = waybill.destination_area;
                    }
                    shipment.pickup_token = waybill.pickup_token;
                    shipment.status = ShipmentStatus::Booked;
                    shipment.last_error = None;
                    self.store.update_shipment(&shipment).await?;
                    counter!("shipments_booked_total").increment(1);
                    tracing::info!(
                        shipment_id = %shipment.id,
                        awb = shipment.awb_number.as_deref().unwrap_or(""),
                        "waybill generated"
                    );
                    return Ok(shipment);
                }
                Err(e) => {
                    shipment.last_error = Some(e.to_string());
                    self.store.update_shipment(&shipment).await?;
                    counter!("waybill_failures_total").increment(1);
                    tracing::warn!(
                        shipment_id = %shipment.id,
                        attempt,
                        error = %e,
                        "waybill generation failed"
                    );
                    if !e.is_retryable() || attempt == self.config.waybill_attempts {
                        break;
                    }
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }

        // Degraded but recorded: the shipment stays pending with last_error.
        Ok(shipment)
    }

    /// Sweeps every active shipment's tracking feed. Errors on one shipment
    /// are recorded on it and do not stop the sweep.
    #[tracing::instrument(skip(self))]
    pub async fn poll_tracking(&self) -> Result<PollSummary> {
        let mut summary = PollSummary::default();

        for mut shipment in self.store.active_shipments().await? {
            let Some(awb) = shipment.awb_number.clone() else {
                continue;
            };
            summary.polled += 1;

            let update = match self.carrier.track(&awb).await {
                Ok(update) => update,
                Err(e) => {
                    summary.failures += 1;
                    shipment.last_error = Some(e.to_string());
                    self.store.update_shipment(&shipment).await?;
                    tracing::warn!(shipment_id = %shipment.id, error = %e, "tracking poll failed");
                    continue;
                }
            };

            let events: Vec<TrackingEventRecord> = update
                .events
                .iter()
                .map(|e| TrackingEventRecord {
                    shipment_id: shipment.id,
                    scan_date: e.scan_date.and_utc(),
                    scan_code: e.scan_code.clone(),
                    scan_description: e.scan_description.clone(),
                    scanned_location: e.scanned_location.clone(),
                    instructions: e.instructions.clone(),
                })
                .collect();
            summary.events_recorded += self.store.record_tracking_events(&events).await?;

            let mut dirty = false;
            if let Some(status) = update.current_status {
                if status != shipment.status {
                    tracing::info!(
                        shipment_id = %shipment.id,
                        from = %shipment.status,
                        to = %status,
                        "shipment status change"
                    );
                    shipment.status = status;
                    summary.status_changes += 1;
                    dirty = true;
                }
                if status == ShipmentStatus::PickedUp && shipment.shipped_at.is_none() {
                    shipment.shipped_at = Some(Utc::now());
                    dirty = true;
                }
                if status == ShipmentStatus::Delivered && shipment.delivered_at.is_none() {
                    shipment.delivered_at = Some(Utc::now());
                    dirty = true;
                }
            }
            if shipment.last_error.is_some() {
                shipment.last_error = None;
                dirty = true;
            }
            if dirty {
                self.store.update_shipment(&shipment).await?;
            }
        }

        counter!("tracking_polls_total").increment(1);
        Ok(summary)
    }

    /// Registers one carrier pickup for an explicit shipment list. Only
    /// booked shipments with a waybill and no pickup token qualify; the whole
    /// batch is stamped with the returned token, or nothing is.
    #[tracing::instrument(skip(self))]
    pub async fn register_pickup(&self, ids: &[ShipmentId]) -> Result<String> {
        let shipments = self.store.shipments_by_ids(ids).await?;
        let eligible: Vec<&ShipmentRecord> = shipments
            .iter()
            .filter(|s| {
                s.awb_number.is_some()
                    && s.status == ShipmentStatus::Booked
                    && s.pickup_token.is_none()
            })
            .collect();
        if eligible.is_empty() {
            return Err(FulfillmentError::NoPickupCandidates);
        }

        let mut piece_count = 0u32;
        for shipment in &eligible {
            piece_count += match self.store.get_order(shipment.order_id).await? {
                Some(order) => order.items.iter().map(|i| i.quantity).sum(),
                None => 1,
            };
        }
        let total_weight: f64 = eligible.iter().map(|s| s.weight_kg).sum();

        let receipt = self
            .carrier
            .register_pickup(&PickupRequest {
                pickup_date: Utc::now().date_naive(),
                pickup_time: self.config.pickup_time.clone(),
                close_time: self.config.close_time.clone(),
                piece_count,
                total_weight_kg: total_weight,
                shipment_count: eligible.len(),
            })
            .await?;

        let eligible_ids: Vec<ShipmentId> = eligible.iter().map(|s| s.id).collect();
        self.store
            .assign_pickup_token(&eligible_ids, &receipt.token)
            .await?;

        counter!("pickups_registered_total").increment(1);
        tracing::info!(
            token = %receipt.token,
            shipments = eligible_ids.len(),
            "pickup registered"
        );
        Ok(receipt.token)
    }

    /// Registers the daily pickup batch: today's booked shipments that are
    /// not yet in any batch. Returns `None` when there is nothing to pick up.
    #[tracing::instrument(skip(self))]
    pub async fn register_daily_pickup(&self) -> Result<Option<String>> {
        let today = Utc::now().date_naive();
        let batch = self.store.shipments_for_pickup(today).await?;
        if batch.is_empty() {
            tracing::debug!("no shipments awaiting pickup");
            return Ok(None);
        }
        let ids: Vec<ShipmentId> = batch.iter().map(|s| s.id).collect();
        self.register_pickup(&ids).await.map(Some)
    }

    /// Cancels a shipment with the carrier. Terminal shipments are rejected;
    /// a transport failure is retried once; a carrier rejection keeps the
    /// current status and records the error.
    #[tracing::instrument(skip(self), fields(shipment_id = %shipment_id))]
    pub async fn cancel(&self, shipment_id: ShipmentId) -> Result<ShipmentRecord> {
        let mut shipment = self
            .store
            .get_shipment(shipment_id)
            .await?
            .ok_or(FulfillmentError::ShipmentNotFound(shipment_id))?;

        if !shipment.status.can_cancel() {
            return Err(FulfillmentError::ShipmentTerminal(shipment.status));
        }

        if let Some(awb) = shipment.awb_number.clone() {
            let mut result = self.carrier.cancel_waybill(&awb).await;
            if matches!(&result, Err(e) if e.is_retryable()) {
                tokio::time::sleep(self.config.retry_delay).await;
                result = self.carrier.cancel_waybill(&awb).await;
            }
            if let Err(e) = result {
                shipment.last_error = Some(e.to_string());
                self.store.update_shipment(&shipment).await?;
                return Err(e.into());
            }
        }

        shipment.status = ShipmentStatus::Cancelled;
        shipment.last_error = None;
        self.store.update_shipment(&shipment).await?;
        counter!("shipments_cancelled_total").increment(1);
        Ok(shipment)
    }

    /// Local tracking view for an AWB, falling back to a live carrier query
    /// when the waybill is not ours.
    pub async fn track_awb(
        &self,
        awb_number: &str,
    ) -> Result<(Option<ShipmentRecord>, Vec<TrackingEventRecord>)> {
        if let Some(shipment) = self.store.get_shipment_by_awb(awb_number).await? {
            let events = self.store.tracking_events(shipment.id).await?;
            return Ok((Some(shipment), events));
        }

        let update = self.carrier.track(awb_number).await?;
        let placeholder = ShipmentId::from_uuid(uuid::Uuid::nil());
        let events = update
            .events
            .into_iter()
            .map(|e| TrackingEventRecord {
                shipment_id: placeholder,
                scan_date: e.scan_date.and_utc(),
                scan_code: e.scan_code,
                scan_description: e.scan_description,
                scanned_location: e.scanned_location,
                instructions: e.instructions,
            })
            .collect();
        Ok((None, events))
    }
}

fn build_waybill_request(
    order: &OrderRecord,
    shipment: &ShipmentRecord,
    dimensions: Dimensions,
) -> WaybillRequest {
    WaybillRequest {
        consignee_name: order.shipping.full_name(),
        consignee_address: order.shipping.address.clone(),
        consignee_pincode: order.shipping.pincode.clone(),
        consignee_phone: order.shipping.phone.clone(),
        consignee_email: order.shipping.email.clone(),
        // Unique per attempt set; the carrier rejects reused references.
        credit_reference: format!("ORD-{}-{}", order.id, Utc::now().timestamp()),
        invoice_number: format!("INV-{}", order.id),
        piece_count: order.items.len().max(1) as u32,
        product_code: shipment.product_code.clone(),
        sub_product_code: shipment.sub_product_code.clone(),
        declared_value_rupees: order.total.as_rupee_f64(),
        collectible_rupees: shipment.collectible_amount.as_rupee_f64(),
        weight_kg: shipment.weight_kg,
        dimensions,
    }
}
