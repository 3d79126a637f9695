//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for every store operation:
//! - Application, renewal, release and cancellation throughput
//! - Waitlist promotions and expiry sweeps
//! - Fleet-level gauges (routes, waiting holders)
//! - Snapshot persistence
//!
//! # Example
//!
//! ```rust,no_run
//! use ridepass_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Install the recorder and expose metrics for scraping
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! if let Some(rendered) = server.render() {
//!     println!("{rendered}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics in Prometheus text format for scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address the exporter reports as its scrape target
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the metrics exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), the call
    /// succeeds without replacing it. In production, ensure this is only
    /// called once.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        // Register all metric descriptions
        register_metrics();

        // Build the Prometheus exporter
        let builder = PrometheusBuilder::new()
            // Configure histogram buckets for latency measurements
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        // Try to install the recorder
        // In tests, this may fail if a recorder is already installed
        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics recorder installed - scrape target http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    // Multiple MetricsServer instances may be created in tests
                    tracing::warn!(
                        "Metrics recorder already initialized, skipping re-initialization"
                    );
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder hasn't been installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Allocation Metrics
    describe_counter!(
        "allocation_applications_total",
        "Total number of pass applications processed"
    );
    describe_counter!(
        "allocation_admissions_total",
        "Applications that were seated immediately"
    );
    describe_counter!(
        "allocation_waitlisted_total",
        "Applications parked on a route waitlist"
    );
    describe_counter!(
        "allocation_failures_total",
        "Operations rejected with an allocation error"
    );
    describe_counter!("allocation_renewals_total", "Passes renewed");
    describe_counter!("allocation_releases_total", "Passes released");
    describe_counter!(
        "allocation_cancellations_total",
        "Passes cancelled by their holders"
    );
    describe_counter!(
        "allocation_promotions_total",
        "Waiters promoted into freed seats"
    );
    describe_counter!(
        "allocation_expirations_total",
        "Passes retired by the expiry sweep"
    );
    describe_histogram!(
        "allocation_apply_duration_seconds",
        "Application processing latency"
    );
    describe_histogram!(
        "allocation_renew_duration_seconds",
        "Renewal processing latency"
    );
    describe_histogram!(
        "allocation_release_duration_seconds",
        "Release and cancellation latency"
    );
    describe_histogram!(
        "allocation_sweep_duration_seconds",
        "Expiry sweep latency"
    );

    // Fleet Metrics
    describe_gauge!("fleet_routes", "Number of registered routes");
    describe_gauge!(
        "fleet_waiting_passes",
        "Holders currently waiting across all routes"
    );

    // Snapshot Metrics
    describe_counter!(
        "snapshot_saves_total",
        "Engine snapshots written to disk"
    );
    describe_counter!(
        "snapshot_loads_total",
        "Engine snapshots restored from disk"
    );
}

/// Allocation metrics recorder.
pub struct AllocationMetrics;

impl AllocationMetrics {
    /// Record a processed application.
    pub fn record_application(seated: bool, duration: Duration) {
        counter!("allocation_applications_total").increment(1);
        if seated {
            counter!("allocation_admissions_total").increment(1);
        } else {
            counter!("allocation_waitlisted_total").increment(1);
        }
        histogram!("allocation_apply_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a rejected operation.
    pub fn record_failure() {
        counter!("allocation_failures_total").increment(1);
    }

    /// Record a renewal.
    pub fn record_renewal(duration: Duration) {
        counter!("allocation_renewals_total").increment(1);
        histogram!("allocation_renew_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a release.
    pub fn record_release(duration: Duration) {
        counter!("allocation_releases_total").increment(1);
        histogram!("allocation_release_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a verified cancellation.
    pub fn record_cancellation(duration: Duration) {
        counter!("allocation_cancellations_total").increment(1);
        histogram!("allocation_release_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a waiter promoted into a seat.
    pub fn record_promotion() {
        counter!("allocation_promotions_total").increment(1);
    }

    /// Record an expiry sweep.
    pub fn record_sweep(expired: usize, duration: Duration) {
        counter!("allocation_expirations_total").increment(expired as u64);
        histogram!("allocation_sweep_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Fleet metrics recorder.
pub struct FleetMetrics;

impl FleetMetrics {
    /// Record the number of registered routes.
    #[allow(clippy::cast_precision_loss)] // Note: Precision loss acceptable for gauge values
    pub fn record_routes(count: usize) {
        gauge!("fleet_routes").set(count as f64);
    }

    /// Record the number of waiting holders.
    #[allow(clippy::cast_precision_loss)] // Note: Precision loss acceptable for gauge values
    pub fn record_waiting(count: usize) {
        gauge!("fleet_waiting_passes").set(count as f64);
    }
}

/// Snapshot persistence metrics recorder.
pub struct SnapshotMetrics;

impl SnapshotMetrics {
    /// Record a snapshot save.
    pub fn record_save() {
        counter!("snapshot_saves_total").increment(1);
    }

    /// Record a snapshot load.
    pub fn record_load() {
        counter!("snapshot_loads_total").increment(1);
    }
}
