//! Typed records persisted by the store.

use chrono::{DateTime, NaiveDate, Utc};
use common::{CouponId, Money, OrderId, PaymentMethod, PaymentStatus, ProductId, ShipmentId, ShipmentStatus, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog surface consumed by checkout: price and stock only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    /// List price.
    pub price: Money,
    /// Promotional price, when set.
    pub discounted_price: Option<Money>,
    pub stock_quantity: i64,
}

impl ProductRecord {
    /// The price a line item is frozen at: discounted price if present,
    /// otherwise list price.
    pub fn effective_price(&self) -> Money {
        self.discounted_price.unwrap_or(self.price)
    }
}

/// One line of a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Shipping address captured at checkout. Every field is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl ShippingInfo {
    /// Returns the name of the first empty field, if any.
    pub fn first_missing_field(&self) -> Option<&'static str> {
        let fields = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("pincode", &self.pincode),
        ];
        fields
            .into_iter()
            .find(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
    }

    /// Consignee full name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A line item with its price frozen at order-creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl OrderItemRecord {
    /// Returns the total price for this line (quantity * unit_price).
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A committed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: UserId,
    pub shipping: ShippingInfo,
    pub items: Vec<OrderItemRecord>,
    pub subtotal: Money,
    pub coupon_id: Option<CouponId>,
    pub discount_percent: u8,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub paid: bool,
    /// Gateway session/transaction id, set when payment is initiated.
    pub transaction_id: Option<String>,
    /// Gateway payment id, set when the callback confirms payment.
    pub provider_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything `commit_order` needs to persist in one transaction.
///
/// The caller generates the order id up front so outbox intents can
/// reference it.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub id: OrderId,
    pub user_id: UserId,
    pub shipping: ShippingInfo,
    pub items: Vec<OrderItemRecord>,
    pub subtotal: Money,
    pub coupon_id: Option<CouponId>,
    pub discount_percent: u8,
    pub total: Money,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub paid: bool,
    /// Intents persisted with the order and consumed by the outbox worker.
    pub outbox: Vec<OutboxKind>,
}

/// A discount coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponRecord {
    pub id: CouponId,
    /// Unique, matched case-insensitively.
    pub code: String,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub discount_percent: u8,
    pub active: bool,
    /// 0 = unlimited.
    pub max_uses: u32,
    pub used_count: u32,
    pub min_order_amount: Money,
}

/// A carrier shipment, one-to-one with an order.
///
/// Owned exclusively by the shipment orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentRecord {
    pub id: ShipmentId,
    pub order_id: OrderId,
    /// Carrier waybill number, set once waybill generation succeeds.
    pub awb_number: Option<String>,
    /// Shared token for the pickup batch this shipment was registered in.
    pub pickup_token: Option<String>,
    pub product_code: String,
    pub sub_product_code: String,
    pub origin_area: String,
    pub destination_area: Option<String>,
    pub destination_pincode: String,
    pub weight_kg: f64,
    pub declared_value: Money,
    /// Nonzero only for COD shipments.
    pub collectible_amount: Money,
    pub status: ShipmentStatus,
    pub label_pdf: Option<Vec<u8>>,
    pub expected_delivery_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ShipmentRecord {
    /// Returns true if the shipment still needs tracking.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// One scan event from the carrier's tracking feed.
///
/// Append-only; unique on (shipment, scan_date, scan_code, scanned_location)
/// because the carrier returns overlapping event windows across polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEventRecord {
    pub shipment_id: ShipmentId,
    pub scan_date: DateTime<Utc>,
    pub scan_code: String,
    pub scan_description: String,
    pub scanned_location: String,
    pub instructions: Option<String>,
}

/// A persisted intent, written in the same transaction as the state change
/// that implies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboxKind {
    /// Generate a carrier shipment for a paid (or COD) order.
    GenerateShipment { order_id: OrderId },
    /// Send a templated email for an order.
    SendEmail { template: String, order_id: OrderId },
}

/// An outbox row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub kind: OutboxKind,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            first_name: "Asha".to_string(),
            last_name: "Rao".to_string(),
            email: "asha@example.com".to_string(),
            phone: "+91-98765 43210".to_string(),
            address: "14 MG Road".to_string(),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pincode: "560001".to_string(),
        }
    }

    #[test]
    fn effective_price_prefers_discounted() {
        let product = ProductRecord {
            id: ProductId::new("SKU-001"),
            name: "Rose Water Toner".to_string(),
            price: Money::from_rupees(100),
            discounted_price: Some(Money::from_rupees(80)),
            stock_quantity: 10,
        };
        assert_eq!(product.effective_price(), Money::from_rupees(80));
    }

    #[test]
    fn effective_price_falls_back_to_list() {
        let product = ProductRecord {
            id: ProductId::new("SKU-001"),
            name: "Rose Water Toner".to_string(),
            price: Money::from_rupees(100),
            discounted_price: None,
            stock_quantity: 10,
        };
        assert_eq!(product.effective_price(), Money::from_rupees(100));
    }

    #[test]
    fn shipping_info_complete() {
        assert_eq!(shipping().first_missing_field(), None);
    }

    #[test]
    fn shipping_info_reports_first_missing_field() {
        let mut info = shipping();
        info.phone = "  ".to_string();
        assert_eq!(info.first_missing_field(), Some("phone"));
    }

    #[test]
    fn order_item_total_price() {
        let item = OrderItemRecord {
            product_id: ProductId::new("SKU-001"),
            product_name: "Rose Water Toner".to_string(),
            unit_price: Money::from_rupees(100),
            quantity: 3,
        };
        assert_eq!(item.total_price(), Money::from_rupees(300));
    }

    #[test]
    fn outbox_kind_serialization_roundtrip() {
        let kind = OutboxKind::GenerateShipment {
            order_id: OrderId::new(),
        };
        let json = serde_json::to_string(&kind).unwrap();
        let deserialized: OutboxKind = serde_json::from_str(&json).unwrap();
        assert_eq!(kind, deserialized);
    }
}
