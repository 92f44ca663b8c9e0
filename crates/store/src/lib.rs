//! Persistence layer for the order-fulfillment pipeline.
//!
//! The [`Store`] trait is the repository interface; its composite operations
//! (`commit_order`, `complete_payment`, `fail_payment_and_restock`,
//! `assign_pickup_token`) are explicit transaction scopes — each either fully
//! happens or not at all. Side effects that must survive a crash are persisted
//! as [`OutboxEntry`] rows in the same transaction and consumed by a worker,
//! never fired implicitly.

mod error;
mod memory;
mod postgres;
mod records;
mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use records::{
    CartLine, CouponRecord, OrderDraft, OrderItemRecord, OrderRecord, OutboxEntry, OutboxKind,
    ProductRecord, ShipmentRecord, ShippingInfo, TrackingEventRecord,
};
pub use store::Store;
