//! Prometheus metrics for checkout.
//!
//! Metrics are recorded through the `metrics` facade, so recording is a no-op
//! until [`MetricsServer::start`] installs the Prometheus recorder. The server binary
//! exposes [`MetricsServer::render`] on its own listener.
//!
//! # Example
//!
//! ```rust,no_run
//! use storefront_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let _body = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address its scrape endpoint is served on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint should listen on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Describe all checkout metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or a different recorder is
    /// already installed. A second Prometheus install (tests) only logs a warning.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                if message.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping");
                    Ok(())
                } else {
                    Err(MetricsError::Install(message))
                }
            }
        }
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "checkout_orders_placed_total",
        "Orders successfully placed"
    );
    describe_counter!(
        "checkout_rejections_total",
        "Checkout attempts rejected, labelled by reason"
    );
    describe_counter!(
        "checkout_compensations_total",
        "Reservations released because the order could not be persisted"
    );
    describe_counter!(
        "checkout_anomalies_total",
        "Invariant violations written to the anomaly log, labelled by kind"
    );
    describe_histogram!(
        "checkout_place_order_duration_seconds",
        "End-to-end latency of place order"
    );
    describe_counter!(
        "slot_ledger_reservations_total",
        "Reservation attempts, labelled by outcome"
    );
    describe_counter!(
        "slot_ledger_releases_total",
        "Released bookings, labelled by cause"
    );
    describe_counter!(
        "storage_retry_attempts_total",
        "Retries of transient storage failures"
    );
    describe_counter!(
        "storage_retry_successes_total",
        "Operations that succeeded after at least one retry"
    );
    describe_counter!(
        "storage_retry_exhausted_total",
        "Operations that failed after exhausting retries"
    );
}

/// Checkout metrics recorder.
pub struct CheckoutMetrics;

impl CheckoutMetrics {
    /// Record a placed order and how long placing it took.
    pub fn record_placed(duration: Duration) {
        counter!("checkout_orders_placed_total").increment(1);
        histogram!("checkout_place_order_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a rejected checkout.
    pub fn record_rejection(reason: &'static str) {
        counter!("checkout_rejections_total", "reason" => reason).increment(1);
    }

    /// Record a compensating release.
    pub fn record_compensation() {
        counter!("checkout_compensations_total").increment(1);
    }

    /// Record an anomaly.
    pub fn record_anomaly(kind: &'static str) {
        counter!("checkout_anomalies_total", "kind" => kind).increment(1);
    }
}

/// Slot ledger metrics recorder.
pub struct LedgerMetrics;

impl LedgerMetrics {
    /// Record a reservation outcome (`reserved`, `slot_full`, `error`).
    pub fn record_reservation(outcome: &'static str) {
        counter!("slot_ledger_reservations_total", "outcome" => outcome).increment(1);
    }

    /// Record a release (`compensation`, `cancellation`).
    pub fn record_release(cause: &'static str) {
        counter!("slot_ledger_releases_total", "cause" => cause).increment(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn server_without_recorder_renders_nothing() {
        let server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        assert!(server.render().is_none());
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");
    }

    #[test]
    fn records_checkout_metrics() {
        let mut server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        server.start().unwrap();

        CheckoutMetrics::record_placed(Duration::from_millis(20));
        CheckoutMetrics::record_rejection("slot_full");
        LedgerMetrics::record_reservation("reserved");

        // Another test in this binary may own the recorder.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("checkout_orders_placed_total"));
            assert!(rendered.contains("checkout_rejections_total"));
            assert!(rendered.contains("slot_ledger_reservations_total"));
        }
    }
}
