//! Fulfillment error types.

use common::{OrderId, ShipmentId, ShipmentStatus};
use thiserror::Error;

/// Errors from payment coordination and shipment orchestration.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Order not found.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// Shipment not found.
    #[error("shipment not found: {0}")]
    ShipmentNotFound(ShipmentId),

    /// The shipment is in a terminal state and cannot change.
    #[error("shipment is {0} and cannot be modified")]
    ShipmentTerminal(ShipmentStatus),

    /// Payment initiation was asked for on an order that is already paid.
    #[error("order already paid: {0}")]
    AlreadyPaid(OrderId),

    /// Pickup registration was asked for but no shipment qualifies.
    #[error("no shipments eligible for pickup")]
    NoPickupCandidates,

    /// The callback signature did not verify. The payload is untrusted and
    /// nothing was mutated.
    #[error("payment callback signature mismatch")]
    InvalidSignature,

    /// A verified callback referenced a transaction we never opened.
    #[error("unknown payment transaction: {0}")]
    UnknownTransaction(String),

    /// The payment gateway could not be reached or answered abnormally.
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// Carrier error.
    #[error(transparent)]
    Carrier(#[from] carrier::CarrierError),

    /// Store error.
    #[error(transparent)]
    Store(#[from] store::StoreError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
