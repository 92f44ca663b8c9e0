//! Shared types used across the order-fulfillment workspace.

mod money;
mod status;
mod types;

pub use money::Money;
pub use status::{PaymentMethod, PaymentStatus, ShipmentStatus};
pub use types::{CouponId, OrderId, ProductId, ShipmentId, UserId};
