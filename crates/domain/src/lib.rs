//! Checkout rules: cart pricing, coupon validation, and the order placement
//! service. Everything here is storage-agnostic; persistence goes through the
//! [`store::Store`] trait and its transactional `commit_order`.

mod checkout;
mod coupon;
mod error;

pub use checkout::CheckoutService;
pub use coupon::validate_coupon;
pub use error::{DomainError, Result};
