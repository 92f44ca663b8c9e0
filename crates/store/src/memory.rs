//! In-memory store for tests and local development.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{OrderId, PaymentStatus, ProductId, ShipmentId, ShipmentStatus, UserId};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::records::{
    CartLine, CouponRecord, OrderDraft, OrderRecord, OutboxEntry, OutboxKind, ProductRecord,
    ShipmentRecord, TrackingEventRecord,
};
use crate::store::Store;

type TrackingKey = (ShipmentId, DateTime<Utc>, String, String);

#[derive(Debug, Default)]
struct Inner {
    products: HashMap<ProductId, ProductRecord>,
    carts: HashMap<UserId, HashMap<ProductId, u32>>,
    coupons: HashMap<String, CouponRecord>,
    orders: HashMap<OrderId, OrderRecord>,
    shipments: HashMap<ShipmentId, ShipmentRecord>,
    tracking: Vec<TrackingEventRecord>,
    tracking_keys: HashSet<TrackingKey>,
    outbox: Vec<OutboxEntry>,
}

impl Inner {
    /// Checks every decrement before applying any, so a failed reservation
    /// leaves stock untouched.
    fn reserve(&mut self, items: &[(ProductId, u32)]) -> Result<()> {
        for (product_id, qty) in items {
            let available = self
                .products
                .get(product_id)
                .map(|p| p.stock_quantity)
                .unwrap_or(0);
            if available < *qty as i64 {
                return Err(StoreError::StockUnavailable {
                    product: product_id.clone(),
                    requested: *qty,
                    available,
                });
            }
        }
        for (product_id, qty) in items {
            if let Some(product) = self.products.get_mut(product_id) {
                product.stock_quantity -= *qty as i64;
            }
        }
        Ok(())
    }

    fn release(&mut self, items: &[(ProductId, u32)]) {
        for (product_id, qty) in items {
            if let Some(product) = self.products.get_mut(product_id) {
                product.stock_quantity += *qty as i64;
            }
        }
    }

    fn push_outbox(&mut self, kind: OutboxKind) {
        self.outbox.push(OutboxEntry {
            id: Uuid::new_v4(),
            kind,
            created_at: Utc::now(),
            processed_at: None,
        });
    }
}

/// In-memory store. Every operation holds one lock, which gives the same
/// all-or-nothing semantics as a database transaction.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of unprocessed outbox entries.
    pub fn outbox_len(&self) -> usize {
        self.inner
            .read()
            .unwrap()
            .outbox
            .iter()
            .filter(|e| e.processed_at.is_none())
            .count()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_product(&self, product: ProductRecord) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.products.insert(product.id.clone(), product);
        Ok(())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<ProductRecord>> {
        Ok(self.inner.read().unwrap().products.get(id).cloned())
    }

    async fn set_cart_item(&self, user: UserId, product: ProductId, quantity: u32) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let cart = inner.carts.entry(user).or_default();
        if quantity == 0 {
            cart.remove(&product);
        } else {
            cart.insert(product, quantity);
        }
        Ok(())
    }

    async fn get_cart(&self, user: UserId) -> Result<Vec<CartLine>> {
        let inner = self.inner.read().unwrap();
        let mut lines: Vec<CartLine> = inner
            .carts
            .get(&user)
            .map(|cart| {
                cart.iter()
                    .map(|(product_id, quantity)| CartLine {
                        product_id: product_id.clone(),
                        quantity: *quantity,
                    })
                    .collect()
            })
            .unwrap_or_default();
        lines.sort_by(|a, b| a.product_id.as_str().cmp(b.product_id.as_str()));
        Ok(lines)
    }

    async fn reserve_stock(&self, items: &[(ProductId, u32)]) -> Result<()> {
        self.inner.write().unwrap().reserve(items)
    }

    async fn release_stock(&self, items: &[(ProductId, u32)]) -> Result<()> {
        self.inner.write().unwrap().release(items);
        Ok(())
    }

    async fn upsert_coupon(&self, coupon: CouponRecord) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.coupons.insert(coupon.code.to_lowercase(), coupon);
        Ok(())
    }

    async fn find_coupon(&self, code: &str) -> Result<Option<CouponRecord>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .coupons
            .get(&code.to_lowercase())
            .cloned())
    }

    async fn commit_order(&self, draft: OrderDraft) -> Result<OrderRecord> {
        let mut inner = self.inner.write().unwrap();

        let reservation: Vec<(ProductId, u32)> = draft
            .items
            .iter()
            .map(|item| (item.product_id.clone(), item.quantity))
            .collect();
        inner.reserve(&reservation)?;

        // Past this point every write must happen; nothing below can fail.
        if let Some(coupon_id) = draft.coupon_id {
            if let Some(coupon) = inner.coupons.values_mut().find(|c| c.id == coupon_id) {
                coupon.used_count += 1;
            }
        }

        inner.carts.remove(&draft.user_id);

        let now = Utc::now();
        let order = OrderRecord {
            id: draft.id,
            user_id: draft.user_id,
            shipping: draft.shipping,
            items: draft.items,
            subtotal: draft.subtotal,
            coupon_id: draft.coupon_id,
            discount_percent: draft.discount_percent,
            total: draft.total,
            payment_method: draft.payment_method,
            payment_status: draft.payment_status,
            paid: draft.paid,
            transaction_id: None,
            provider_payment_id: None,
            created_at: now,
            updated_at: now,
        };
        inner.orders.insert(order.id, order.clone());

        for kind in draft.outbox {
            inner.push_outbox(kind);
        }

        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.inner.read().unwrap().orders.get(&id).cloned())
    }

    async fn set_payment_session(&self, id: OrderId, transaction_id: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let order = inner
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;
        order.transaction_id = Some(transaction_id.to_string());
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn find_order_by_transaction(&self, transaction_id: &str) -> Result<Option<OrderRecord>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .orders
            .values()
            .find(|o| o.transaction_id.as_deref() == Some(transaction_id))
            .cloned())
    }

    async fn complete_payment(
        &self,
        id: OrderId,
        provider_payment_id: &str,
        outbox: &[OutboxKind],
    ) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        let order = inner
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;

        if order.payment_status == PaymentStatus::Completed {
            return Ok(false);
        }

        order.paid = true;
        order.payment_status = PaymentStatus::Completed;
        order.provider_payment_id = Some(provider_payment_id.to_string());
        order.updated_at = Utc::now();

        for kind in outbox {
            inner.push_outbox(kind.clone());
        }
        Ok(true)
    }

    async fn fail_payment_and_restock(&self, id: OrderId) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        let order = inner
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;

        // Only a pending payment can fail; the check lives inside the lock
        // so a duplicate failure callback cannot restock twice.
        if order.payment_status != PaymentStatus::Pending {
            return Ok(false);
        }

        order.paid = false;
        order.payment_status = PaymentStatus::Failed;
        order.updated_at = Utc::now();

        let items: Vec<(ProductId, u32)> = order
            .items
            .iter()
            .map(|item| (item.product_id.clone(), item.quantity))
            .collect();
        inner.release(&items);
        Ok(true)
    }

    async fn insert_shipment(&self, shipment: ShipmentRecord) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        inner.shipments.insert(shipment.id, shipment);
        Ok(())
    }

    async fn update_shipment(&self, shipment: &ShipmentRecord) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if !inner.shipments.contains_key(&shipment.id) {
            return Err(StoreError::ShipmentNotFound(shipment.id));
        }
        let mut updated = shipment.clone();
        updated.updated_at = Utc::now();
        inner.shipments.insert(updated.id, updated);
        Ok(())
    }

    async fn get_shipment(&self, id: ShipmentId) -> Result<Option<ShipmentRecord>> {
        Ok(self.inner.read().unwrap().shipments.get(&id).cloned())
    }

    async fn get_shipment_by_order(&self, order_id: OrderId) -> Result<Option<ShipmentRecord>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .shipments
            .values()
            .find(|s| s.order_id == order_id)
            .cloned())
    }

    async fn get_shipment_by_awb(&self, awb_number: &str) -> Result<Option<ShipmentRecord>> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .shipments
            .values()
            .find(|s| s.awb_number.as_deref() == Some(awb_number))
            .cloned())
    }

    async fn active_shipments(&self) -> Result<Vec<ShipmentRecord>> {
        let inner = self.inner.read().unwrap();
        let mut shipments: Vec<ShipmentRecord> = inner
            .shipments
            .values()
            .filter(|s| s.awb_number.is_some() && !s.status.is_terminal())
            .cloned()
            .collect();
        shipments.sort_by_key(|s| s.created_at);
        Ok(shipments)
    }

    async fn shipments_for_pickup(&self, day: NaiveDate) -> Result<Vec<ShipmentRecord>> {
        let inner = self.inner.read().unwrap();
        let mut shipments: Vec<ShipmentRecord> = inner
            .shipments
            .values()
            .filter(|s| {
                s.created_at.date_naive() == day
                    && s.status == ShipmentStatus::Booked
                    && s.pickup_token.is_none()
                    && s.awb_number.is_some()
            })
            .cloned()
            .collect();
        shipments.sort_by_key(|s| s.created_at);
        Ok(shipments)
    }

    async fn shipments_by_ids(&self, ids: &[ShipmentId]) -> Result<Vec<ShipmentRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| inner.shipments.get(id).cloned())
            .collect())
    }

    async fn assign_pickup_token(&self, ids: &[ShipmentId], token: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        for id in ids {
            if !inner.shipments.contains_key(id) {
                return Err(StoreError::ShipmentNotFound(*id));
            }
        }
        let now = Utc::now();
        for id in ids {
            if let Some(shipment) = inner.shipments.get_mut(id) {
                shipment.pickup_token = Some(token.to_string());
                shipment.status = ShipmentStatus::PickupScheduled;
                shipment.updated_at = now;
            }
        }
        Ok(())
    }

    async fn record_tracking_events(&self, events: &[TrackingEventRecord]) -> Result<usize> {
        let mut inner = self.inner.write().unwrap();
        let mut inserted = 0;
        for event in events {
            let key = (
                event.shipment_id,
                event.scan_date,
                event.scan_code.clone(),
                event.scanned_location.clone(),
            );
            if inner.tracking_keys.insert(key) {
                inner.tracking.push(event.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn tracking_events(&self, shipment: ShipmentId) -> Result<Vec<TrackingEventRecord>> {
        let inner = self.inner.read().unwrap();
        let mut events: Vec<TrackingEventRecord> = inner
            .tracking
            .iter()
            .filter(|e| e.shipment_id == shipment)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.scan_date.cmp(&a.scan_date));
        Ok(events)
    }

    async fn enqueue_outbox(&self, kind: OutboxKind) -> Result<()> {
        self.inner.write().unwrap().push_outbox(kind);
        Ok(())
    }

    async fn pending_outbox(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .outbox
            .iter()
            .filter(|e| e.processed_at.is_none())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_outbox_processed(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(entry) = inner.outbox.iter_mut().find(|e| e.id == id) {
            entry.processed_at = Some(Utc::now());
        }
        Ok(())
    }
}
