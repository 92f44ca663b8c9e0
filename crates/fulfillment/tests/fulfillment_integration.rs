//! End-to-end fulfillment flows over the in-memory doubles: checkout feeds
//! the outbox, the worker books shipments, callbacks settle payments, and
//! the orchestrator drives tracking, pickups and cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use common::{Money, PaymentMethod, PaymentStatus, ProductId, ShipmentStatus, UserId};
use domain::CheckoutService;
use fulfillment::{
    CallbackDisposition, FulfillmentError, InMemoryGateway, InMemoryNotifier, OrchestratorConfig,
    OutboxWorker, PaymentCoordinator, ShipmentOrchestrator, PAYMENT_CONFIRMATION_TEMPLATE,
};
use store::{InMemoryStore, ProductRecord, ShippingInfo, Store};

use carrier::{InMemoryCarrier, ScanEvent, TrackingUpdate};

fn carrier_config() -> carrier::CarrierConfig {
    carrier::CarrierConfig {
        login_id: "login".into(),
        licence_key: "key".into(),
        tracking_licence_key: "tkey".into(),
        customer_code: "111111".into(),
        cod_customer_code: Some("222222".into()),
        origin_area: "BLR".into(),
        origin_pincode: "560001".into(),
        demo_mode: true,
        warehouse_name: "Warehouse".into(),
        warehouse_address: "1 Industrial Estate".into(),
        warehouse_phone: "9876543210".into(),
        warehouse_contact: "Ops".into(),
        return_address: "1 Industrial Estate".into(),
        return_contact: "Ops".into(),
        return_phone: "9876543210".into(),
        return_pincode: "560001".into(),
        default_weight_kg: 0.5,
        default_length_cm: 20.0,
        default_width_cm: 15.0,
        default_height_cm: 10.0,
        timeout_secs: 30,
    }
}

fn shipping() -> ShippingInfo {
    ShippingInfo {
        first_name: "Asha".to_string(),
        last_name: "Rao".to_string(),
        email: "asha@example.com".to_string(),
        phone: "9876543210".to_string(),
        address: "14 MG Road".to_string(),
        city: "Bengaluru".to_string(),
        state: "Karnataka".to_string(),
        pincode: "110001".to_string(),
    }
}

struct Harness {
    store: Arc<InMemoryStore>,
    carrier: InMemoryCarrier,
    gateway: InMemoryGateway,
    notifier: InMemoryNotifier,
    checkout: CheckoutService<InMemoryStore>,
    coordinator: PaymentCoordinator<InMemoryStore>,
    orchestrator: Arc<ShipmentOrchestrator<InMemoryStore>>,
    worker: OutboxWorker<InMemoryStore>,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let carrier = InMemoryCarrier::new();
        let gateway = InMemoryGateway::default();
        let notifier = InMemoryNotifier::new();

        let orchestrator = Arc::new(ShipmentOrchestrator::new(
            store.clone(),
            Arc::new(carrier.clone()),
            carrier_config(),
            OrchestratorConfig {
                retry_delay: Duration::from_millis(1),
                ..OrchestratorConfig::default()
            },
        ));
        let worker = OutboxWorker::new(
            store.clone(),
            orchestrator.clone(),
            Arc::new(notifier.clone()),
        );
        let coordinator = PaymentCoordinator::new(
            store.clone(),
            Arc::new(gateway.clone()),
            "https://shop.example.com/payment/done".to_string(),
        );

        Self {
            checkout: CheckoutService::new(store.clone()),
            store,
            carrier,
            gateway,
            notifier,
            coordinator,
            orchestrator,
            worker,
        }
    }

    async fn seed_product(&self, id: &str, rupees: i64, stock: i64) {
        self.store
            .upsert_product(ProductRecord {
                id: ProductId::new(id),
                name: format!("Product {id}"),
                price: Money::from_rupees(rupees),
                discounted_price: None,
                stock_quantity: stock,
            })
            .await
            .unwrap();
    }

    async fn place_order(&self, method: PaymentMethod) -> store::OrderRecord {
        let user = UserId::new();
        self.seed_product("SKU-001", 100, 10).await;
        self.store
            .set_cart_item(user, ProductId::new("SKU-001"), 2)
            .await
            .unwrap();
        self.checkout
            .place_order(user, shipping(), method, None)
            .await
            .unwrap()
    }
}

fn scan(date: (u32, u32), code: &str, description: &str, location: &str) -> ScanEvent {
    ScanEvent {
        scan_date: NaiveDate::from_ymd_opt(2026, date.0, date.1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap(),
        scan_code: code.to_string(),
        scan_description: description.to_string(),
        scanned_location: location.to_string(),
        instructions: None,
    }
}

#[tokio::test]
async fn cod_checkout_books_a_shipment_through_the_outbox() {
    let h = Harness::new();
    let order = h.place_order(PaymentMethod::Cod).await;

    let processed = h.worker.process_pending().await.unwrap();
    assert_eq!(processed, 2);

    let shipment = h
        .store
        .get_shipment_by_order(order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Booked);
    assert!(shipment.awb_number.is_some());
    assert_eq!(shipment.sub_product_code, "C");
    assert_eq!(shipment.collectible_amount, order.total);
    assert!(shipment.label_pdf.is_some());

    let sent = h.notifier.sent();
    assert_eq!(sent, vec![("order_confirmation".to_string(), order.id)]);

    // Nothing left pending, and a second tick is a no-op.
    assert_eq!(h.worker.process_pending().await.unwrap(), 0);
}

#[tokio::test]
async fn prepaid_success_callback_completes_and_ships() {
    let h = Harness::new();
    let order = h.place_order(PaymentMethod::Prepaid).await;

    let session = h.coordinator.initiate(order.id).await.unwrap();
    let (body, signature) = h.gateway.signed_callback(&session.transaction_id, "PAY-42", true);

    let disposition = h.coordinator.apply_callback(&body, &signature).await.unwrap();
    assert_eq!(disposition, CallbackDisposition::Completed);

    let order = h.store.get_order(order.id).await.unwrap().unwrap();
    assert!(order.paid);
    assert_eq!(order.payment_status, PaymentStatus::Completed);
    assert_eq!(order.provider_payment_id.as_deref(), Some("PAY-42"));

    h.worker.process_pending().await.unwrap();

    let shipment = h
        .store
        .get_shipment_by_order(order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Booked);
    assert_eq!(shipment.sub_product_code, "P");
    assert!(shipment.collectible_amount.is_zero());

    let sent = h.notifier.sent();
    assert!(sent.contains(&("order_confirmation".to_string(), order.id)));
    assert!(sent.contains(&(PAYMENT_CONFIRMATION_TEMPLATE.to_string(), order.id)));
}

#[tokio::test]
async fn replayed_success_callback_changes_nothing() {
    let h = Harness::new();
    let order = h.place_order(PaymentMethod::Prepaid).await;
    let session = h.coordinator.initiate(order.id).await.unwrap();
    let (body, signature) = h.gateway.signed_callback(&session.transaction_id, "PAY-42", true);

    assert_eq!(
        h.coordinator.apply_callback(&body, &signature).await.unwrap(),
        CallbackDisposition::Completed
    );
    let pending_after_first = h.store.pending_outbox(50).await.unwrap().len();

    assert_eq!(
        h.coordinator.apply_callback(&body, &signature).await.unwrap(),
        CallbackDisposition::Replayed
    );
    assert_eq!(h.store.pending_outbox(50).await.unwrap().len(), pending_after_first);
}

#[tokio::test]
async fn failed_callback_restocks_exactly_once() {
    let h = Harness::new();
    let order = h.place_order(PaymentMethod::Prepaid).await;
    let session = h.coordinator.initiate(order.id).await.unwrap();
    let (body, signature) = h.gateway.signed_callback(&session.transaction_id, "PAY-42", false);

    assert_eq!(
        h.coordinator.apply_callback(&body, &signature).await.unwrap(),
        CallbackDisposition::Failed
    );
    let product = h
        .store
        .get_product(&ProductId::new("SKU-001"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock_quantity, 10);

    let order = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Failed);

    // A second failure for the same transaction must not restock again.
    assert_eq!(
        h.coordinator.apply_callback(&body, &signature).await.unwrap(),
        CallbackDisposition::Replayed
    );
    let product = h
        .store
        .get_product(&ProductId::new("SKU-001"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock_quantity, 10);
}

#[tokio::test]
async fn forged_callback_signature_is_rejected() {
    let h = Harness::new();
    let order = h.place_order(PaymentMethod::Prepaid).await;
    let session = h.coordinator.initiate(order.id).await.unwrap();
    let (body, _) = h.gateway.signed_callback(&session.transaction_id, "PAY-42", true);

    let err = h
        .coordinator
        .apply_callback(&body, "0000###1")
        .await
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::InvalidSignature));

    let order = h.store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn initiating_payment_on_a_paid_order_is_rejected() {
    let h = Harness::new();
    let order = h.place_order(PaymentMethod::Cod).await;

    let err = h.coordinator.initiate(order.id).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::AlreadyPaid(id) if id == order.id));
}

#[tokio::test]
async fn transient_waybill_failures_retry_within_budget() {
    let h = Harness::new();
    let order = h.place_order(PaymentMethod::Cod).await;
    h.carrier.fail_next_waybills(2);

    let shipment = h.orchestrator.generate_shipment(order.id).await.unwrap();

    assert_eq!(shipment.status, ShipmentStatus::Booked);
    assert_eq!(h.carrier.waybill_calls(), 3);
}

#[tokio::test]
async fn exhausted_waybill_budget_leaves_shipment_pending_for_resume() {
    let h = Harness::new();
    let order = h.place_order(PaymentMethod::Cod).await;
    h.carrier.fail_next_waybills(3);

    let shipment = h.orchestrator.generate_shipment(order.id).await.unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Pending);
    assert!(shipment.awb_number.is_none());
    assert!(shipment.last_error.is_some());
    assert_eq!(h.carrier.waybill_calls(), 3);

    // The next trigger resumes the same record instead of re-inserting.
    let resumed = h.orchestrator.generate_shipment(order.id).await.unwrap();
    assert_eq!(resumed.id, shipment.id);
    assert_eq!(resumed.status, ShipmentStatus::Booked);
    assert!(resumed.last_error.is_none());
}

#[tokio::test]
async fn business_rejection_is_not_retried() {
    let h = Harness::new();
    let order = h.place_order(PaymentMethod::Cod).await;
    h.carrier.reject_waybills("Invalid pincode");

    let shipment = h.orchestrator.generate_shipment(order.id).await.unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Pending);
    assert_eq!(h.carrier.waybill_calls(), 1);
    assert!(shipment.last_error.unwrap().contains("Invalid pincode"));
}

#[tokio::test]
async fn pickup_batch_stamps_a_shared_token() {
    let h = Harness::new();
    let a = h.place_order(PaymentMethod::Cod).await;
    let b = h.place_order(PaymentMethod::Cod).await;
    let shipment_a = h.orchestrator.generate_shipment(a.id).await.unwrap();
    let shipment_b = h.orchestrator.generate_shipment(b.id).await.unwrap();

    let token = h.orchestrator.register_daily_pickup().await.unwrap().unwrap();
    assert_eq!(h.carrier.pickup_count(), 1);

    for id in [shipment_a.id, shipment_b.id] {
        let shipment = h.store.get_shipment(id).await.unwrap().unwrap();
        assert_eq!(shipment.pickup_token.as_deref(), Some(token.as_str()));
    }

    // Everything is already batched; the next run finds nothing.
    assert_eq!(h.orchestrator.register_daily_pickup().await.unwrap(), None);
}

#[tokio::test]
async fn pickup_with_no_eligible_shipments_errors() {
    let h = Harness::new();
    let order = h.place_order(PaymentMethod::Cod).await;
    h.carrier.reject_waybills("Invalid pincode");
    let shipment = h.orchestrator.generate_shipment(order.id).await.unwrap();

    // Pending without an AWB cannot be picked up.
    let err = h.orchestrator.register_pickup(&[shipment.id]).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::NoPickupCandidates));
}

#[tokio::test]
async fn tracking_sweep_applies_status_and_timestamps_once() {
    let h = Harness::new();
    let order = h.place_order(PaymentMethod::Cod).await;
    let shipment = h.orchestrator.generate_shipment(order.id).await.unwrap();
    let awb = shipment.awb_number.clone().unwrap();

    h.carrier.set_tracking(
        &awb,
        TrackingUpdate {
            current_status: Some(ShipmentStatus::PickedUp),
            events: vec![scan((3, 2), "PU", "Shipment picked up", "BLR")],
        },
    );
    let summary = h.orchestrator.poll_tracking().await.unwrap();
    assert_eq!(summary.polled, 1);
    assert_eq!(summary.events_recorded, 1);
    assert_eq!(summary.status_changes, 1);

    let after_pickup = h.store.get_shipment(shipment.id).await.unwrap().unwrap();
    assert_eq!(after_pickup.status, ShipmentStatus::PickedUp);
    let shipped_at = after_pickup.shipped_at.unwrap();

    h.carrier.set_tracking(
        &awb,
        TrackingUpdate {
            current_status: Some(ShipmentStatus::Delivered),
            events: vec![
                scan((3, 2), "PU", "Shipment picked up", "BLR"),
                scan((3, 4), "DL", "Shipment delivered", "DEL"),
            ],
        },
    );
    let summary = h.orchestrator.poll_tracking().await.unwrap();
    // The overlapping pickup scan is deduplicated.
    assert_eq!(summary.events_recorded, 1);

    let delivered = h.store.get_shipment(shipment.id).await.unwrap().unwrap();
    assert_eq!(delivered.status, ShipmentStatus::Delivered);
    assert_eq!(delivered.shipped_at.unwrap(), shipped_at);
    assert!(delivered.delivered_at.is_some());

    // Terminal shipments drop out of the sweep.
    let summary = h.orchestrator.poll_tracking().await.unwrap();
    assert_eq!(summary.polled, 0);
}

#[tokio::test]
async fn tracking_failure_is_recorded_and_isolated() {
    let h = Harness::new();
    let a = h.place_order(PaymentMethod::Cod).await;
    let b = h.place_order(PaymentMethod::Cod).await;
    let shipment_a = h.orchestrator.generate_shipment(a.id).await.unwrap();
    let shipment_b = h.orchestrator.generate_shipment(b.id).await.unwrap();

    // Only b has a tracking answer; a's query returns a carrier error.
    h.carrier.set_tracking(
        shipment_b.awb_number.as_deref().unwrap(),
        TrackingUpdate {
            current_status: Some(ShipmentStatus::InTransit),
            events: vec![scan((3, 3), "IT", "Shipment in transit", "BOM")],
        },
    );

    let summary = h.orchestrator.poll_tracking().await.unwrap();
    assert_eq!(summary.polled, 2);
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.status_changes, 1);

    let failed = h.store.get_shipment(shipment_a.id).await.unwrap().unwrap();
    assert!(failed.last_error.is_some());
    let tracked = h.store.get_shipment(shipment_b.id).await.unwrap().unwrap();
    assert_eq!(tracked.status, ShipmentStatus::InTransit);
}

#[tokio::test]
async fn cancel_retries_transport_failure_once() {
    let h = Harness::new();
    let order = h.place_order(PaymentMethod::Cod).await;
    let shipment = h.orchestrator.generate_shipment(order.id).await.unwrap();
    h.carrier.fail_next_cancels(1);

    let cancelled = h.orchestrator.cancel(shipment.id).await.unwrap();
    assert_eq!(cancelled.status, ShipmentStatus::Cancelled);
    assert_eq!(h.carrier.cancel_calls(), 2);
}

#[tokio::test]
async fn cancel_rejection_keeps_current_status() {
    let h = Harness::new();
    let order = h.place_order(PaymentMethod::Cod).await;
    let shipment = h.orchestrator.generate_shipment(order.id).await.unwrap();
    h.carrier.reject_cancel(true);

    let err = h.orchestrator.cancel(shipment.id).await.unwrap_err();
    assert!(matches!(err, FulfillmentError::Carrier(_)));

    let unchanged = h.store.get_shipment(shipment.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, ShipmentStatus::Booked);
    assert!(unchanged.last_error.is_some());
}

#[tokio::test]
async fn cancel_of_terminal_shipment_is_rejected_locally() {
    let h = Harness::new();
    let order = h.place_order(PaymentMethod::Cod).await;
    let mut shipment = h.orchestrator.generate_shipment(order.id).await.unwrap();
    shipment.status = ShipmentStatus::Delivered;
    h.store.update_shipment(&shipment).await.unwrap();

    let err = h.orchestrator.cancel(shipment.id).await.unwrap_err();
    assert!(matches!(
        err,
        FulfillmentError::ShipmentTerminal(ShipmentStatus::Delivered)
    ));
    assert_eq!(h.carrier.cancel_calls(), 0);
}

#[tokio::test]
async fn degraded_waybill_booking_still_drains_the_outbox() {
    let h = Harness::new();
    let order = h.place_order(PaymentMethod::Cod).await;
    h.carrier.fail_next_waybills(u32::MAX);

    // The shipment record exists without a waybill, the email goes out, and
    // the outbox is drained; a later trigger can finish the booking.
    assert_eq!(h.worker.process_pending().await.unwrap(), 2);
    assert!(h.store.pending_outbox(10).await.unwrap().is_empty());

    let shipment = h
        .store
        .get_shipment_by_order(order.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Pending);
    assert!(shipment.awb_number.is_none());
}
