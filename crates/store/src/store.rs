//! The repository trait implemented by every backend.

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{OrderId, ProductId, ShipmentId, UserId};
use uuid::Uuid;

use crate::error::Result;
use crate::records::{
    CartLine, CouponRecord, OrderDraft, OrderRecord, OutboxEntry, OutboxKind, ProductRecord,
    ShipmentRecord, TrackingEventRecord,
};

/// Repository interface for the fulfillment pipeline.
///
/// Methods documented as transactional are all-or-nothing: either every write
/// they describe happens, or none does. The conditional stock decrement inside
/// `commit_order` and `reserve_stock` is the concurrency control point for
/// overselling — no other locking is required.
#[async_trait]
pub trait Store: Send + Sync {
    // -- Products (catalog surface) --

    /// Inserts or replaces a product.
    async fn upsert_product(&self, product: ProductRecord) -> Result<()>;

    /// Looks up a product by id.
    async fn get_product(&self, id: &ProductId) -> Result<Option<ProductRecord>>;

    // -- Cart --

    /// Sets the quantity for a product in a user's cart (0 removes the line).
    async fn set_cart_item(&self, user: UserId, product: ProductId, quantity: u32) -> Result<()>;

    /// Returns the user's cart lines.
    async fn get_cart(&self, user: UserId) -> Result<Vec<CartLine>>;

    // -- Inventory ledger --

    /// Atomically decrements stock for every item, each guarded by
    /// `stock_quantity >= qty`. Transactional: if any item cannot be
    /// satisfied, no stock is decremented and `StockUnavailable` is returned.
    async fn reserve_stock(&self, items: &[(ProductId, u32)]) -> Result<()>;

    /// Unconditionally increments stock for every item (payment-failure
    /// restock path).
    async fn release_stock(&self, items: &[(ProductId, u32)]) -> Result<()>;

    // -- Coupons --

    /// Inserts or replaces a coupon.
    async fn upsert_coupon(&self, coupon: CouponRecord) -> Result<()>;

    /// Looks up a coupon by code, case-insensitively.
    async fn find_coupon(&self, code: &str) -> Result<Option<CouponRecord>>;

    // -- Orders --

    /// Commits an order draft. Transactional: inserts the order and its line
    /// items, conditionally decrements stock per item, increments the
    /// referenced coupon's `used_count` by one, clears the user's cart, and
    /// persists the draft's outbox intents. Fails with `StockUnavailable`
    /// (and no writes) if any decrement would oversell.
    async fn commit_order(&self, draft: OrderDraft) -> Result<OrderRecord>;

    /// Loads an order by id.
    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>>;

    /// Records the gateway transaction id after a payment session is opened.
    async fn set_payment_session(&self, id: OrderId, transaction_id: &str) -> Result<()>;

    /// Finds the order a gateway callback refers to.
    async fn find_order_by_transaction(&self, transaction_id: &str) -> Result<Option<OrderRecord>>;

    /// Marks an order paid. Transactional: sets `paid = true`,
    /// `payment_status = COMPLETED`, stores the provider payment id, and
    /// persists the outbox intents. Returns `false` without writing anything
    /// if the order is already completed (webhook replay).
    async fn complete_payment(
        &self,
        id: OrderId,
        provider_payment_id: &str,
        outbox: &[OutboxKind],
    ) -> Result<bool>;

    /// Marks an order's payment failed and restores stock for every line
    /// item. Transactional, and applied only from `Pending`: returns `false`
    /// without touching stock if the order is already settled, so a
    /// duplicate failure callback cannot restock twice.
    async fn fail_payment_and_restock(&self, id: OrderId) -> Result<bool>;

    // -- Shipments --

    /// Inserts a shipment row.
    async fn insert_shipment(&self, shipment: ShipmentRecord) -> Result<()>;

    /// Replaces a shipment row.
    async fn update_shipment(&self, shipment: &ShipmentRecord) -> Result<()>;

    /// Loads a shipment by id.
    async fn get_shipment(&self, id: ShipmentId) -> Result<Option<ShipmentRecord>>;

    /// Loads the shipment for an order, if one exists.
    async fn get_shipment_by_order(&self, order_id: OrderId) -> Result<Option<ShipmentRecord>>;

    /// Loads a shipment by carrier waybill number.
    async fn get_shipment_by_awb(&self, awb_number: &str) -> Result<Option<ShipmentRecord>>;

    /// Returns every shipment with a waybill number whose status is not
    /// terminal — the tracking-poll working set.
    async fn active_shipments(&self) -> Result<Vec<ShipmentRecord>>;

    /// Returns booked shipments created on `day` that have a waybill number
    /// and no pickup token — the daily pickup batch.
    async fn shipments_for_pickup(&self, day: NaiveDate) -> Result<Vec<ShipmentRecord>>;

    /// Loads shipments by id, skipping unknown ids.
    async fn shipments_by_ids(&self, ids: &[ShipmentId]) -> Result<Vec<ShipmentRecord>>;

    /// Stamps every listed shipment with the same pickup token and moves it
    /// to `pickup_scheduled`. Transactional: the batch is stamped as a whole
    /// or not at all.
    async fn assign_pickup_token(&self, ids: &[ShipmentId], token: &str) -> Result<()>;

    // -- Tracking events --

    /// Upserts scan events, ignoring any whose
    /// (shipment, scan_date, scan_code, scanned_location) key already
    /// exists. Returns the number actually inserted.
    async fn record_tracking_events(&self, events: &[TrackingEventRecord]) -> Result<usize>;

    /// Returns a shipment's scan events, newest first.
    async fn tracking_events(&self, shipment: ShipmentId) -> Result<Vec<TrackingEventRecord>>;

    // -- Outbox --

    /// Persists a standalone intent outside any other transaction.
    async fn enqueue_outbox(&self, kind: OutboxKind) -> Result<()>;

    /// Returns up to `limit` unprocessed outbox entries, oldest first.
    async fn pending_outbox(&self, limit: usize) -> Result<Vec<OutboxEntry>>;

    /// Marks an outbox entry processed.
    async fn mark_outbox_processed(&self, id: Uuid) -> Result<()>;
}
