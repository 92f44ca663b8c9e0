//! API server entry point.

use std::sync::Arc;
use std::time::Duration;

use api::config::Config;
use fulfillment::OutboxWorker;
use store::{PostgresStore, Store};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<S: Store + 'static>(
    state: Arc<api::routes::orders::AppState<S>>,
    worker: Arc<OutboxWorker<S>>,
    config: &Config,
    metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
) {
    // Background loops: outbox drain, tracking sweep, daily pickup.
    let _outbox = fulfillment::spawn_outbox_worker(
        worker,
        Duration::from_secs(config.outbox_interval_secs),
    );
    let _tracking = fulfillment::spawn_tracking_poller(
        state.orchestrator.clone(),
        Duration::from_secs(config.tracking_interval_secs),
    );
    let _pickup = fulfillment::spawn_pickup_scheduler(
        state.orchestrator.clone(),
        Duration::from_secs(config.pickup_interval_secs),
    );

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let config = Config::from_env();

    // 3. Wire the store and external collaborators
    match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url)
                .await
                .expect("failed to connect to database");
            store.run_migrations().await.expect("migrations failed");

            let carrier_config = carrier::CarrierConfig::from_env();
            let carrier_client = carrier::BlueDartClient::new(carrier_config.clone())
                .expect("failed to build carrier client");
            let gateway =
                fulfillment::PhonePeGateway::new(fulfillment::GatewayConfig::from_env())
                    .expect("failed to build payment gateway");

            let (state, worker) = api::build_state(
                Arc::new(store),
                Arc::new(carrier_client),
                Arc::new(gateway),
                Arc::new(fulfillment::LogNotifier),
                carrier_config,
                config.payment_redirect_url.clone(),
            );
            serve(state, worker, &config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            let (state, worker) = api::create_default_state();
            serve(state, worker, &config, metrics_handle).await;
        }
    }
}
