//! Storefront checkout HTTP server.
//!
//! Wires the `PostgreSQL` stores into the order intake service and serves the
//! checkout API, with Prometheus metrics on a separate port.

mod config;
mod probe;

use anyhow::Context;
use axum::{Router, routing::get};
use config::Config;
use probe::DatabaseProbe;
use std::sync::Arc;
use storefront_core::environment::SystemClock;
use storefront_postgres::{
    PostgresAnomalyLog, PostgresCatalog, PostgresOrderStore, PostgresSlotLedger, connect, migrate,
};
use storefront_runtime::metrics::MetricsServer;
use storefront_runtime::{CheckoutEnvironment, OrderIntakeService};
use storefront_web::AppState;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    init_tracing();

    info!("Starting storefront checkout server");

    let config = Config::from_env();
    info!(
        port = config.server.port,
        metrics_port = config.server.metrics_port,
        tax_rate_bps = config.checkout.tax_rate_bps,
        "Configuration loaded"
    );

    // Database
    let pool = connect(&config.pool_settings())
        .await
        .context("Failed to connect to PostgreSQL")?;
    migrate(&pool).await.context("Failed to run migrations")?;

    // Metrics
    let mut metrics = MetricsServer::new(config.metrics_addr()?);
    metrics.start()?;
    let metrics = Arc::new(metrics);

    let metrics_app = Router::new().route(
        "/metrics",
        get({
            let metrics = Arc::clone(&metrics);
            move || async move { metrics.render().unwrap_or_default() }
        }),
    );
    let metrics_listener = tokio::net::TcpListener::bind(metrics.addr())
        .await
        .with_context(|| format!("Failed to bind metrics listener on {}", metrics.addr()))?;
    info!(address = %metrics.addr(), "Metrics endpoint listening");

    let metrics_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_app).await {
            error!(error = %e, "Metrics server failed");
        }
    });

    // Checkout
    let env = CheckoutEnvironment {
        clock: Arc::new(SystemClock),
        catalog: Arc::new(PostgresCatalog::new(pool.clone())),
        ledger: Arc::new(PostgresSlotLedger::new(pool.clone())),
        orders: Arc::new(PostgresOrderStore::new(pool.clone())),
        anomalies: Arc::new(PostgresAnomalyLog::new(pool.clone())),
    };
    let intake = OrderIntakeService::new(env, config.intake_config());
    let state = AppState::new(intake, vec![Arc::new(DatabaseProbe::new(pool.clone()))]);

    let app = storefront_web::router(state);

    let addr = config.api_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API listener on {addr}"))?;
    info!(address = %addr, "Server listening");

    let shutdown = Arc::new(Notify::new());
    let server = tokio::spawn({
        let shutdown = Arc::clone(&shutdown);
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.notified().await })
                .await
        }
    });

    shutdown_signal().await;
    shutdown.notify_one();

    match tokio::time::timeout(config.shutdown_timeout(), server).await {
        Ok(Ok(Ok(()))) => info!("Server stopped"),
        Ok(Ok(Err(e))) => error!(error = %e, "Server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "Server task failed"),
        Err(_) => warn!(
            timeout_secs = config.server.shutdown_timeout,
            "In-flight requests did not finish before the shutdown timeout"
        ),
    }

    metrics_task.abort();
    pool.close().await;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storefront=debug,sqlx=warn".into()),
        )
        .with(fmt::layer().with_target(false))
        .init();
}

/// Graceful shutdown signal handler.
///
/// Waits for:
/// - Ctrl+C (SIGINT)
/// - SIGTERM (in production environments)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
