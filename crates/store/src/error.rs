//! Store error types.

use common::{OrderId, ProductId, ShipmentId};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional stock decrement affected zero rows.
    #[error("insufficient stock for {product}: requested {requested}, available {available}")]
    StockUnavailable {
        product: ProductId,
        requested: u32,
        available: i64,
    },

    /// Order not found.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// Shipment not found.
    #[error("shipment not found: {0}")]
    ShipmentNotFound(ShipmentId),

    /// A stored status column holds a value outside the known vocabulary.
    #[error("invalid status value in database: {0}")]
    InvalidStatus(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error (outbox payloads).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
