//! The carrier service trait and its in-memory test double.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Duration;

use crate::error::{CarrierError, Result};
use crate::types::{
    PickupReceipt, PickupRequest, Serviceability, TrackingUpdate, TransitTime, Waybill,
    WaybillRequest,
};

/// Carrier operations used by the shipment orchestrator and the API.
///
/// Implementations hold no shipment state and must be safe to call
/// concurrently.
#[async_trait]
pub trait CarrierApi: Send + Sync {
    /// Checks whether a destination pincode is serviceable and COD-capable.
    async fn check_serviceability(&self, pincode: &str) -> Result<Serviceability>;

    /// Estimates delivery date and transit days for a destination.
    async fn transit_time(
        &self,
        dest_pincode: &str,
        product_code: &str,
        sub_product_code: &str,
        pickup_date: chrono::NaiveDate,
    ) -> Result<TransitTime>;

    /// Generates a waybill, returning the AWB number and label.
    async fn generate_waybill(&self, request: &WaybillRequest) -> Result<Waybill>;

    /// Fetches the full scan history for a waybill.
    async fn track(&self, awb_number: &str) -> Result<TrackingUpdate>;

    /// Registers one pickup for a batch of shipments.
    async fn register_pickup(&self, request: &PickupRequest) -> Result<PickupReceipt>;

    /// Cancels a waybill. Only possible before the carrier in-scans it.
    async fn cancel_waybill(&self, awb_number: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct State {
    serviceability: HashMap<String, Serviceability>,
    tracking: HashMap<String, TrackingUpdate>,
    waybill_requests: Vec<WaybillRequest>,
    waybill_seq: u64,
    pickup_seq: u64,
    fail_waybills: u32,
    reject_waybills: Option<String>,
    fail_pickup: bool,
    fail_cancels: u32,
    reject_cancel: bool,
    track_calls: u64,
    cancel_calls: u64,
}

/// In-memory carrier for tests. Unknown pincodes are serviceable with COD by
/// default; behavior is steered through the `set_*`/`fail_*` methods.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCarrier {
    state: Arc<RwLock<State>>,
}

impl InMemoryCarrier {
    /// Creates a new in-memory carrier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the serviceability answer for a pincode.
    pub fn set_serviceability(&self, pincode: &str, answer: Serviceability) {
        self.state
            .write()
            .unwrap()
            .serviceability
            .insert(pincode.to_string(), answer);
    }

    /// Sets the tracking answer for a waybill.
    pub fn set_tracking(&self, awb_number: &str, update: TrackingUpdate) {
        self.state
            .write()
            .unwrap()
            .tracking
            .insert(awb_number.to_string(), update);
    }

    /// Makes the next `n` waybill calls fail with a transport error.
    pub fn fail_next_waybills(&self, n: u32) {
        self.state.write().unwrap().fail_waybills = n;
    }

    /// Makes every waybill call fail with a business rejection.
    pub fn reject_waybills(&self, message: &str) {
        self.state.write().unwrap().reject_waybills = Some(message.to_string());
    }

    /// Makes pickup registration fail with a transport error.
    pub fn fail_pickup(&self, fail: bool) {
        self.state.write().unwrap().fail_pickup = fail;
    }

    /// Makes the next `n` cancel calls fail with a transport error.
    pub fn fail_next_cancels(&self, n: u32) {
        self.state.write().unwrap().fail_cancels = n;
    }

    /// Makes cancellation fail with a business rejection (already picked up).
    pub fn reject_cancel(&self, reject: bool) {
        self.state.write().unwrap().reject_cancel = reject;
    }

    /// Number of waybill generation attempts seen.
    pub fn waybill_calls(&self) -> usize {
        self.state.read().unwrap().waybill_requests.len()
    }

    /// Number of tracking queries seen.
    pub fn track_calls(&self) -> u64 {
        self.state.read().unwrap().track_calls
    }

    /// Number of cancel calls seen.
    pub fn cancel_calls(&self) -> u64 {
        self.state.read().unwrap().cancel_calls
    }

    /// Number of pickups registered.
    pub fn pickup_count(&self) -> u64 {
        self.state.read().unwrap().pickup_seq
    }

    /// The most recent waybill request, if any.
    pub fn last_waybill_request(&self) -> Option<WaybillRequest> {
        self.state.read().unwrap().waybill_requests.last().cloned()
    }
}

#[async_trait]
impl CarrierApi for InMemoryCarrier {
    async fn check_serviceability(&self, pincode: &str) -> Result<Serviceability> {
        let state = self.state.read().unwrap();
        Ok(state
            .serviceability
            .get(pincode)
            .cloned()
            .unwrap_or(Serviceability {
                serviceable: true,
                cod_available: true,
            }))
    }

    async fn transit_time(
        &self,
        _dest_pincode: &str,
        _product_code: &str,
        _sub_product_code: &str,
        pickup_date: chrono::NaiveDate,
    ) -> Result<TransitTime> {
        Ok(TransitTime {
            expected_delivery_date: Some(pickup_date + Duration::days(2)),
            transit_days: Some(2),
            area_code: Some("DEL".to_string()),
            service_center: Some("DEL-HUB".to_string()),
        })
    }

    async fn generate_waybill(&self, request: &WaybillRequest) -> Result<Waybill> {
        let mut state = self.state.write().unwrap();
        state.waybill_requests.push(request.clone());

        if state.fail_waybills > 0 {
            state.fail_waybills -= 1;
            return Err(CarrierError::Transport("connection reset".to_string()));
        }
        if let Some(message) = &state.reject_waybills {
            return Err(CarrierError::Business(message.clone()));
        }

        state.waybill_seq += 1;
        Ok(Waybill {
            awb_number: format!("790{:08}", state.waybill_seq),
            label_pdf: Some(b"%PDF-1.4 label".to_vec()),
            destination_area: Some("DEL".to_string()),
            destination_location: Some("Delhi".to_string()),
            pickup_token: None,
        })
    }

    async fn track(&self, awb_number: &str) -> Result<TrackingUpdate> {
        let mut state = self.state.write().unwrap();
        state.track_calls += 1;
        state
            .tracking
            .get(awb_number)
            .cloned()
            .ok_or_else(|| CarrierError::Business("No information available".to_string()))
    }

    async fn register_pickup(&self, _request: &PickupRequest) -> Result<PickupReceipt> {
        let mut state = self.state.write().unwrap();
        if state.fail_pickup {
            return Err(CarrierError::Transport("gateway timeout".to_string()));
        }
        state.pickup_seq += 1;
        Ok(PickupReceipt {
            token: format!("TOKEN-{}", state.pickup_seq),
        })
    }

    async fn cancel_waybill(&self, _awb_number: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.cancel_calls += 1;
        if state.fail_cancels > 0 {
            state.fail_cancels -= 1;
            return Err(CarrierError::Transport("gateway timeout".to_string()));
        }
        if state.reject_cancel {
            return Err(CarrierError::Business(
                "Shipment already in-scanned".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dimensions;
    use chrono::NaiveDate;

    fn waybill_request() -> WaybillRequest {
        WaybillRequest {
            consignee_name: "Asha Rao".to_string(),
            consignee_address: "14 MG Road".to_string(),
            consignee_pincode: "110001".to_string(),
            consignee_phone: "9876543210".to_string(),
            consignee_email: "asha@example.com".to_string(),
            credit_reference: "REF-1".to_string(),
            invoice_number: "INV-1".to_string(),
            piece_count: 1,
            product_code: "D".to_string(),
            sub_product_code: "P".to_string(),
            declared_value_rupees: 180.0,
            collectible_rupees: 0.0,
            weight_kg: 0.5,
            dimensions: Dimensions {
                length_cm: 20.0,
                width_cm: 15.0,
                height_cm: 10.0,
            },
        }
    }

    #[tokio::test]
    async fn waybills_get_sequential_awb_numbers() {
        let carrier = InMemoryCarrier::new();
        let a = carrier.generate_waybill(&waybill_request()).await.unwrap();
        let b = carrier.generate_waybill(&waybill_request()).await.unwrap();
        assert_ne!(a.awb_number, b.awb_number);
        assert_eq!(carrier.waybill_calls(), 2);
    }

    #[tokio::test]
    async fn transient_waybill_failures_clear_after_budget() {
        let carrier = InMemoryCarrier::new();
        carrier.fail_next_waybills(2);

        assert!(carrier.generate_waybill(&waybill_request()).await.is_err());
        assert!(carrier.generate_waybill(&waybill_request()).await.is_err());
        assert!(carrier.generate_waybill(&waybill_request()).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_awb_is_a_business_error() {
        let carrier = InMemoryCarrier::new();
        let err = carrier.track("79000000000").await.unwrap_err();
        assert!(matches!(err, CarrierError::Business(_)));
    }

    #[tokio::test]
    async fn pickup_produces_shared_token() {
        let carrier = InMemoryCarrier::new();
        let receipt = carrier
            .register_pickup(&PickupRequest {
                pickup_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                pickup_time: "1600".to_string(),
                close_time: "1800".to_string(),
                piece_count: 3,
                total_weight_kg: 1.5,
                shipment_count: 2,
            })
            .await
            .unwrap();
        assert_eq!(receipt.token, "TOKEN-1");
    }
}
