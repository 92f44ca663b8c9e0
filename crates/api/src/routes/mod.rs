//! Route handlers, grouped by resource.

pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;
pub mod shipping;
