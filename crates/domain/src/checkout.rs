//! Order placement.

use std::sync::Arc;

use chrono::Utc;
use common::{Money, OrderId, PaymentMethod, PaymentStatus, UserId};
use metrics::counter;
use store::{OrderDraft, OrderItemRecord, OrderRecord, OutboxKind, ShippingInfo, Store};

use crate::coupon::validate_coupon;
use crate::error::{DomainError, Result};

/// Email template enqueued after a successful checkout.
pub const ORDER_CONFIRMATION_TEMPLATE: &str = "order_confirmation";

/// Places orders against the store's transactional `commit_order`.
#[derive(Clone)]
pub struct CheckoutService<S> {
    store: Arc<S>,
}

impl<S: Store> CheckoutService<S> {
    /// Creates a new checkout service.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Places an order from the user's cart.
    ///
    /// Validation happens up front and touches nothing; all writes go through
    /// one `commit_order` call, so a failure anywhere (most importantly a
    /// stock shortfall) leaves the cart, stock and coupon exactly as they
    /// were.
    ///
    /// COD orders are committed already paid, with shipment generation
    /// enqueued immediately. Prepaid orders stay pending until the payment
    /// callback confirms them.
    #[tracing::instrument(skip(self, shipping), fields(user_id = %user_id))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        shipping: ShippingInfo,
        payment_method: PaymentMethod,
        coupon_code: Option<&str>,
    ) -> Result<OrderRecord> {
        if let Some(field) = shipping.first_missing_field() {
            return Err(DomainError::IncompleteShippingInfo { field });
        }

        let cart = self.store.get_cart(user_id).await?;
        if cart.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        // Freeze prices now; the order never recomputes them.
        let mut items = Vec::with_capacity(cart.len());
        let mut subtotal = Money::zero();
        for line in &cart {
            let product = self
                .store
                .get_product(&line.product_id)
                .await?
                .ok_or_else(|| DomainError::ProductNotFound(line.product_id.clone()))?;
            let item = OrderItemRecord {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                unit_price: product.effective_price(),
                quantity: line.quantity,
            };
            subtotal += item.total_price();
            items.push(item);
        }

        let mut coupon_id = None;
        let mut discount_percent = 0;
        if let Some(code) = coupon_code {
            let coupon = self
                .store
                .find_coupon(code)
                .await?
                .ok_or_else(|| DomainError::CouponNotFound(code.to_string()))?;
            discount_percent = validate_coupon(&coupon, subtotal, Utc::now())?;
            coupon_id = Some(coupon.id);
        }

        let total = subtotal - subtotal.discount(discount_percent);

        let order_id = OrderId::new();
        let mut outbox = vec![OutboxKind::SendEmail {
            template: ORDER_CONFIRMATION_TEMPLATE.to_string(),
            order_id,
        }];

        let (payment_status, paid) = match payment_method {
            PaymentMethod::Cod => {
                // Nothing to collect online, so the shipment can be booked
                // right away.
                outbox.push(OutboxKind::GenerateShipment { order_id });
                (PaymentStatus::Completed, true)
            }
            PaymentMethod::Prepaid => (PaymentStatus::Pending, false),
        };

        let order = self
            .store
            .commit_order(OrderDraft {
                id: order_id,
                user_id,
                shipping,
                items,
                subtotal,
                coupon_id,
                discount_percent,
                total,
                payment_method,
                payment_status,
                paid,
                outbox,
            })
            .await
            .inspect_err(|e| {
                if matches!(e, store::StoreError::StockUnavailable { .. }) {
                    counter!("checkout_stock_conflicts_total").increment(1);
                }
            })?;

        counter!("checkout_orders_total", "payment_method" => payment_method.as_str())
            .increment(1);
        tracing::info!(order_id = %order.id, total = %order.total, "order placed");

        Ok(order)
    }

    /// Loads an order.
    pub async fn get_order(&self, id: OrderId) -> Result<OrderRecord> {
        self.store
            .get_order(id)
            .await?
            .ok_or(DomainError::OrderNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::{CouponId, ProductId};
    use store::{CouponRecord, InMemoryStore, ProductRecord};

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            first_name: "Asha".to_string(),
            last_name: "Rao".to_string(),
            email: "asha@example.com".to_string(),
            phone: "9876543210".to_string(),
            address: "14 MG Road".to_string(),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pincode: "560001".to_string(),
        }
    }

    async fn seed_product(store: &InMemoryStore, id: &str, rupees: i64, stock: i64) {
        store
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

    async fn seed_coupon(store: &InMemoryStore, code: &str, percent: u8) {
        store
            .upsert_coupon(CouponRecord {
                id: CouponId::new(),
                code: code.to_string(),
                valid_from: Utc::now() - Duration::days(1),
                valid_to: Utc::now() + Duration::days(1),
                discount_percent: percent,
                active: true,
                max_uses: 0,
                used_count: 0,
                min_order_amount: Money::zero(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn coupon_applies_percentage_discount() {
        let store = Arc::new(InMemoryStore::new());
        let service = CheckoutService::new(store.clone());
        let user = UserId::new();

        seed_product(&store, "SKU-001", 100, 10).await;
        seed_coupon(&store, "SAVE10", 10).await;
        store
            .set_cart_item(user, ProductId::new("SKU-001"), 2)
            .await
            .unwrap();

        let order = service
            .place_order(user, shipping(), PaymentMethod::Prepaid, Some("SAVE10"))
            .await
            .unwrap();

        assert_eq!(order.subtotal, Money::from_rupees(200));
        assert_eq!(order.discount_percent, 10);
        assert_eq!(order.total, Money::from_rupees(180));
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert!(!order.paid);
    }

    #[tokio::test]
    async fn empty_cart_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let service = CheckoutService::new(store);

        let result = service
            .place_order(UserId::new(), shipping(), PaymentMethod::Prepaid, None)
            .await;

        assert!(matches!(result, Err(DomainError::EmptyCart)));
    }

    #[tokio::test]
    async fn incomplete_shipping_rejected_before_any_read() {
        let store = Arc::new(InMemoryStore::new());
        let service = CheckoutService::new(store);

        let mut info = shipping();
        info.pincode = String::new();

        let result = service
            .place_order(UserId::new(), info, PaymentMethod::Prepaid, None)
            .await;

        assert!(matches!(
            result,
            Err(DomainError::IncompleteShippingInfo { field: "pincode" })
        ));
    }

    #[tokio::test]
    async fn insufficient_stock_fails_cleanly() {
        let store = Arc::new(InMemoryStore::new());
        let service = CheckoutService::new(store.clone());
        let user = UserId::new();

        seed_product(&store, "SKU-001", 100, 3).await;
        store
            .set_cart_item(user, ProductId::new("SKU-001"), 5)
            .await
            .unwrap();

        let result = service
            .place_order(user, shipping(), PaymentMethod::Prepaid, None)
            .await;
        assert!(matches!(
            result,
            Err(DomainError::Store(store::StoreError::StockUnavailable { .. }))
        ));

        // Stock and cart untouched.
        let product = store
            .get_product(&ProductId::new("SKU-001"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.stock_quantity, 3);
        assert_eq!(store.get_cart(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cod_order_is_paid_and_enqueues_shipment() {
        let store = Arc::new(InMemoryStore::new());
        let service = CheckoutService::new(store.clone());
        let user = UserId::new();

        seed_product(&store, "SKU-001", 100, 10).await;
        store
            .set_cart_item(user, ProductId::new("SKU-001"), 1)
            .await
            .unwrap();

        let order = service
            .place_order(user, shipping(), PaymentMethod::Cod, None)
            .await
            .unwrap();

        assert!(order.paid);
        assert_eq!(order.payment_status, PaymentStatus::Completed);

        let pending = store.pending_outbox(10).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().any(|e| matches!(
            &e.kind,
            OutboxKind::GenerateShipment { order_id } if *order_id == order.id
        )));
        assert!(pending.iter().any(|e| matches!(
            &e.kind,
            OutboxKind::SendEmail { template, order_id }
                if template == ORDER_CONFIRMATION_TEMPLATE && *order_id == order.id
        )));
    }

    #[tokio::test]
    async fn prepaid_order_does_not_enqueue_shipment() {
        let store = Arc::new(InMemoryStore::new());
        let service = CheckoutService::new(store.clone());
        let user = UserId::new();

        seed_product(&store, "SKU-001", 100, 10).await;
        store
            .set_cart_item(user, ProductId::new("SKU-001"), 1)
            .await
            .unwrap();

        service
            .place_order(user, shipping(), PaymentMethod::Prepaid, None)
            .await
            .unwrap();

        let pending = store.pending_outbox(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(matches!(&pending[0].kind, OutboxKind::SendEmail { .. }));
    }

    #[tokio::test]
    async fn discounted_price_is_frozen_into_items() {
        let store = Arc::new(InMemoryStore::new());
        let service = CheckoutService::new(store.clone());
        let user = UserId::new();

        store
            .upsert_product(ProductRecord {
                id: ProductId::new("SKU-001"),
                name: "Rose Water Toner".to_string(),
                price: Money::from_rupees(100),
                discounted_price: Some(Money::from_rupees(80)),
                stock_quantity: 10,
            })
            .await
            .unwrap();
        store
            .set_cart_item(user, ProductId::new("SKU-001"), 2)
            .await
            .unwrap();

        let order = service
            .place_order(user, shipping(), PaymentMethod::Prepaid, None)
            .await
            .unwrap();

        assert_eq!(order.items[0].unit_price, Money::from_rupees(80));
        assert_eq!(order.subtotal, Money::from_rupees(160));
    }

    #[tokio::test]
    async fn unknown_coupon_rejected_without_commit() {
        let store = Arc::new(InMemoryStore::new());
        let service = CheckoutService::new(store.clone());
        let user = UserId::new();

        seed_product(&store, "SKU-001", 100, 10).await;
        store
            .set_cart_item(user, ProductId::new("SKU-001"), 1)
            .await
            .unwrap();

        let result = service
            .place_order(user, shipping(), PaymentMethod::Prepaid, Some("NOPE"))
            .await;

        assert!(matches!(result, Err(DomainError::CouponNotFound(_))));
        assert_eq!(store.get_cart(user).await.unwrap().len(), 1);
    }
}
