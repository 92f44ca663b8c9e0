//! HTTP API server with observability for the shop fulfillment pipeline.
//!
//! Exposes checkout, payment callback and shipping endpoints over any
//! [`Store`] implementation, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use carrier::CarrierApi;
use domain::CheckoutService;
use fulfillment::{
    Notifier, OrchestratorConfig, OutboxWorker, PaymentCoordinator, PaymentGateway,
    ShipmentOrchestrator,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, Store};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{id}/initiate-payment",
            post(routes::orders::initiate_payment::<S>),
        )
        .route("/payments/callback", post(routes::payments::callback::<S>))
        .route(
            "/shipping/serviceability",
            get(routes::shipping::serviceability::<S>),
        )
        .route("/shipping/track/{awb}", get(routes::shipping::track::<S>))
        .route("/shipping/label/{awb}", get(routes::shipping::label::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires services over a store and its external collaborators. Returns the
/// shared state plus the outbox worker for the background loops.
pub fn build_state<S: Store + 'static>(
    store: Arc<S>,
    carrier_api: Arc<dyn CarrierApi>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    carrier_config: carrier::CarrierConfig,
    payment_redirect_url: String,
) -> (Arc<AppState<S>>, Arc<OutboxWorker<S>>) {
    let orchestrator = Arc::new(ShipmentOrchestrator::new(
        store.clone(),
        carrier_api.clone(),
        carrier_config,
        OrchestratorConfig::default(),
    ));
    let worker = Arc::new(OutboxWorker::new(
        store.clone(),
        orchestrator.clone(),
        notifier,
    ));
    let state = Arc::new(AppState {
        checkout: CheckoutService::new(store.clone()),
        coordinator: PaymentCoordinator::new(store.clone(), gateway, payment_redirect_url),
        orchestrator,
        carrier: carrier_api,
        store,
    });
    (state, worker)
}

/// Creates application state over the in-memory store and test doubles.
/// Used by the binary when no database is configured, and by tests.
pub fn create_default_state() -> (Arc<AppState<InMemoryStore>>, Arc<OutboxWorker<InMemoryStore>>) {
    build_state(
        Arc::new(InMemoryStore::new()),
        Arc::new(carrier::InMemoryCarrier::new()),
        Arc::new(fulfillment::InMemoryGateway::default()),
        Arc::new(fulfillment::LogNotifier),
        carrier::CarrierConfig::from_env(),
        config::Config::from_env().payment_redirect_url,
    )
}
