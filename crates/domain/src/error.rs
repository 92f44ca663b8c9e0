//! Domain error types.

use common::{Money, OrderId, ProductId};
use thiserror::Error;

/// Errors that can occur during checkout and coupon validation.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The user's cart has no lines.
    #[error("cart is empty")]
    EmptyCart,

    /// A required shipping field is blank.
    #[error("missing shipping field: {field}")]
    IncompleteShippingInfo { field: &'static str },

    /// A cart line references a product the catalog no longer has.
    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    /// No active coupon matches the given code.
    #[error("coupon not found: {0}")]
    CouponNotFound(String),

    /// The coupon's validity window does not cover now.
    #[error("coupon expired: {0}")]
    CouponExpired(String),

    /// The coupon's use budget is spent.
    #[error("coupon exhausted: {0}")]
    CouponExhausted(String),

    /// The cart subtotal is below the coupon's minimum.
    #[error("order subtotal below coupon minimum of {required}")]
    MinimumOrderNotMet { required: Money },

    /// Order not found.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// Store error.
    #[error(transparent)]
    Store(#[from] store::StoreError),
}

impl DomainError {
    /// Returns true for caller mistakes, as opposed to infrastructure
    /// failures.
    pub fn is_validation(&self) -> bool {
        !matches!(self, DomainError::Store(store::StoreError::Database(_)))
    }
}

/// Convenience type alias for domain results.
pub type Result<T> = std::result::Result<T, DomainError>;
