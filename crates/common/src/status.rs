//! Payment and shipment status vocabulary shared by the store, the carrier
//! mapping layer, and the orchestrator.

use serde::{Deserialize, Serialize};

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Paid online before dispatch.
    #[default]
    Prepaid,
    /// Cash on delivery; the carrier collects the order total.
    Cod,
}

impl PaymentMethod {
    /// Normalizes a free-form payment method string.
    ///
    /// Matching is case-insensitive; unrecognized values fall back to prepaid.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "COD" | "CASH_ON_DELIVERY" => PaymentMethod::Cod,
            _ => PaymentMethod::Prepaid,
        }
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Prepaid => "PREPAID",
            PaymentMethod::Cod => "COD",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment lifecycle of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Awaiting gateway confirmation.
    #[default]
    Pending,
    /// Confirmed paid (or COD auto-confirmed).
    Completed,
    /// Gateway reported failure; stock has been restored.
    Failed,
}

impl PaymentStatus {
    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
        }
    }

    /// Parses a stored status name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PENDING" => Some(PaymentStatus::Pending),
            "COMPLETED" => Some(PaymentStatus::Completed),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The state of a shipment in its lifecycle.
///
/// State transitions:
/// ```text
/// pending ──► booked ──► pickup_scheduled ──► picked_up ──► in_transit
///                │                                              │
///                │                             out_for_delivery ◄┘──► delivered
///                │                                  │
///                │                             undelivered ──► rto_initiated ──► rto_delivered
///                └──► cancelled (also reachable from pending)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    /// Waybill generation attempted but not yet successful.
    #[default]
    Pending,
    /// Waybill generated; AWB number assigned.
    Booked,
    /// Part of a registered pickup batch.
    PickupScheduled,
    /// In-scanned by the carrier.
    PickedUp,
    /// Moving through the carrier network.
    InTransit,
    /// With the delivery courier.
    OutForDelivery,
    /// Delivered to the consignee (terminal).
    Delivered,
    /// Delivery attempt failed.
    Undelivered,
    /// Return to origin started.
    RtoInitiated,
    /// Returned to origin (terminal).
    RtoDelivered,
    /// Cancelled before pickup (terminal).
    Cancelled,
}

impl ShipmentStatus {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ShipmentStatus::Delivered | ShipmentStatus::Cancelled | ShipmentStatus::RtoDelivered
        )
    }

    /// Returns true if the shipment can still be cancelled with the carrier.
    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "pending",
            ShipmentStatus::Booked => "booked",
            ShipmentStatus::PickupScheduled => "pickup_scheduled",
            ShipmentStatus::PickedUp => "picked_up",
            ShipmentStatus::InTransit => "in_transit",
            ShipmentStatus::OutForDelivery => "out_for_delivery",
            ShipmentStatus::Delivered => "delivered",
            ShipmentStatus::Undelivered => "undelivered",
            ShipmentStatus::RtoInitiated => "rto_initiated",
            ShipmentStatus::RtoDelivered => "rto_delivered",
            ShipmentStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a stored status name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(ShipmentStatus::Pending),
            "booked" => Some(ShipmentStatus::Booked),
            "pickup_scheduled" => Some(ShipmentStatus::PickupScheduled),
            "picked_up" => Some(ShipmentStatus::PickedUp),
            "in_transit" => Some(ShipmentStatus::InTransit),
            "out_for_delivery" => Some(ShipmentStatus::OutForDelivery),
            "delivered" => Some(ShipmentStatus::Delivered),
            "undelivered" => Some(ShipmentStatus::Undelivered),
            "rto_initiated" => Some(ShipmentStatus::RtoInitiated),
            "rto_delivered" => Some(ShipmentStatus::RtoDelivered),
            "cancelled" => Some(ShipmentStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_method_parse_is_case_insensitive() {
        assert_eq!(PaymentMethod::parse("cod"), PaymentMethod::Cod);
        assert_eq!(PaymentMethod::parse("CoD"), PaymentMethod::Cod);
        assert_eq!(PaymentMethod::parse("prepaid"), PaymentMethod::Prepaid);
    }

    #[test]
    fn payment_method_unrecognized_defaults_to_prepaid() {
        assert_eq!(PaymentMethod::parse("bitcoin"), PaymentMethod::Prepaid);
        assert_eq!(PaymentMethod::parse(""), PaymentMethod::Prepaid);
    }

    #[test]
    fn terminal_states() {
        assert!(ShipmentStatus::Delivered.is_terminal());
        assert!(ShipmentStatus::Cancelled.is_terminal());
        assert!(ShipmentStatus::RtoDelivered.is_terminal());
        assert!(!ShipmentStatus::Pending.is_terminal());
        assert!(!ShipmentStatus::Booked.is_terminal());
        assert!(!ShipmentStatus::InTransit.is_terminal());
        assert!(!ShipmentStatus::Undelivered.is_terminal());
        assert!(!ShipmentStatus::RtoInitiated.is_terminal());
    }

    #[test]
    fn can_cancel_from_non_terminal_states() {
        assert!(ShipmentStatus::Pending.can_cancel());
        assert!(ShipmentStatus::Booked.can_cancel());
        assert!(ShipmentStatus::InTransit.can_cancel());
        assert!(!ShipmentStatus::Delivered.can_cancel());
        assert!(!ShipmentStatus::Cancelled.can_cancel());
        assert!(!ShipmentStatus::RtoDelivered.can_cancel());
    }

    #[test]
    fn status_string_roundtrip() {
        for status in [
            ShipmentStatus::Pending,
            ShipmentStatus::Booked,
            ShipmentStatus::PickupScheduled,
            ShipmentStatus::PickedUp,
            ShipmentStatus::InTransit,
            ShipmentStatus::OutForDelivery,
            ShipmentStatus::Delivered,
            ShipmentStatus::Undelivered,
            ShipmentStatus::RtoInitiated,
            ShipmentStatus::RtoDelivered,
            ShipmentStatus::Cancelled,
        ] {
            assert_eq!(ShipmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ShipmentStatus::parse("lost"), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ShipmentStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"out_for_delivery\"");
        let json = serde_json::to_string(&PaymentStatus::Completed).unwrap();
        assert_eq!(json, "\"COMPLETED\"");
    }
}
