//! Fulfillment: everything that happens to an order after checkout.
//!
//! The payment coordinator applies gateway callbacks; the shipment
//! orchestrator drives carrier bookings, tracking and pickups; the outbox
//! worker turns persisted intents into those calls. All external seams
//! ([`PaymentGateway`], [`carrier::CarrierApi`], [`Notifier`]) have in-memory
//! doubles for tests.

mod coordinator;
mod error;
mod gateway;
mod notify;
mod orchestrator;
mod scheduler;
mod worker;

pub use coordinator::{CallbackDisposition, PaymentCoordinator, PAYMENT_CONFIRMATION_TEMPLATE};
pub use error::{FulfillmentError, Result};
pub use gateway::{
    GatewayConfig, InMemoryGateway, PaymentGateway, PaymentSession, PhonePeGateway,
    VerifiedCallback, callback_checksum,
};
pub use notify::{InMemoryNotifier, LogNotifier, Notifier};
pub use orchestrator::{OrchestratorConfig, PollSummary, ShipmentOrchestrator};
pub use scheduler::{spawn_outbox_worker, spawn_pickup_scheduler, spawn_tracking_poller};
pub use worker::OutboxWorker;
