//! # Ridepass Runtime
//!
//! Concurrent runtime around the allocation engine.
//!
//! The core crate is deliberately synchronous and single-threaded. This crate
//! wraps an [`AllocationEngine`](ridepass_core::AllocationEngine) in an
//! [`EngineStore`] that:
//!
//! - serializes mutations through a write lock so the occupancy books stay
//!   consistent under concurrent callers
//! - broadcasts every [`Notice`](ridepass_core::Notice) the engine emits to
//!   any number of subscribers (promotion alerts, waitlist-pressure warnings,
//!   expiries)
//! - persists and restores engine snapshots as JSON files
//! - reports health and records Prometheus metrics for every operation
//!
//! ## Core Components
//!
//! - **`EngineStore`**: cloneable handle over one shared engine
//! - **`HealthCheck` / `HealthReport`**: component health aggregation
//! - **`metrics`**: Prometheus exporter and operation recorders
//!
//! ## Example
//!
//! ```ignore
//! use ridepass_core::{AllocationEngine, Application, HolderId, SystemClock};
//! use ridepass_runtime::EngineStore;
//! use std::sync::Arc;
//!
//! let store = EngineStore::new(AllocationEngine::new(Arc::new(SystemClock)));
//! let mut notices = store.subscribe();
//!
//! let (pass, _) = store
//!     .apply(Application::new(HolderId::new(), route_id, profile))
//!     .await?;
//! println!("holder seated: {}", pass.state);
//! ```

use std::sync::Arc;
use tokio::sync::RwLock;

/// Prometheus metrics for observability
pub mod metrics;

/// Error types for the runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur while persisting or restoring engine state.
    ///
    /// Engine-level failures (unknown routes, duplicate holders, capacity
    /// violations) are reported as
    /// [`AllocationError`](ridepass_core::AllocationError) and pass through
    /// the store untouched. `StoreError` covers only the runtime's own
    /// concerns, which today means snapshot serialization and file io.
    #[derive(Debug, Error)]
    pub enum StoreError {
        /// A snapshot could not be encoded or decoded as JSON
        #[error("Snapshot serialization failed: {0}")]
        Serialization(#[from] serde_json::Error),

        /// A snapshot file could not be read or written
        #[error("Snapshot io failed: {0}")]
        Io(#[from] std::io::Error),
    }
}

pub use error::StoreError;

// ===== Health Types =====

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HealthStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is experiencing issues but still operational
    /// (e.g., waitlist pressure past the alert threshold)
    Degraded,
    /// Component is not functioning
    Unhealthy,
}

impl HealthStatus {
    /// Returns true if status is healthy
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Returns true if status is degraded
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded)
    }

    /// Returns true if status is unhealthy
    #[must_use]
    pub const fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy)
    }

    /// Combine two statuses, taking the worst
    #[must_use]
    pub const fn worst(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unhealthy, _) | (_, Self::Unhealthy) => Self::Unhealthy,
            (Self::Degraded, _) | (_, Self::Degraded) => Self::Degraded,
            (Self::Healthy, Self::Healthy) => Self::Healthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check result for a single component
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthCheck {
    /// Component name
    pub component: String,
    /// Health status
    pub status: HealthStatus,
    /// Optional message with details
    pub message: Option<String>,
    /// Additional metadata
    pub metadata: Vec<(String, String)>,
}

impl HealthCheck {
    /// Create a healthy check result
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            message: None,
            metadata: Vec::new(),
        }
    }

    /// Create a degraded check result with a message
    pub fn degraded(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Degraded,
            message: Some(message.into()),
            metadata: Vec::new(),
        }
    }

    /// Create an unhealthy check result with a message
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            metadata: Vec::new(),
        }
    }

    /// Add metadata to the check result
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

/// Overall health report aggregating multiple component checks
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthReport {
    /// Overall status (worst of all components)
    pub status: HealthStatus,
    /// Individual component checks
    pub checks: Vec<HealthCheck>,
    /// Timestamp of the report
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthReport {
    /// Create a new health report from component checks
    #[must_use]
    pub fn new(checks: Vec<HealthCheck>) -> Self {
        let status = checks
            .iter()
            .map(|c| c.status)
            .fold(HealthStatus::Healthy, HealthStatus::worst);

        Self {
            status,
            checks,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Returns true if all components are healthy
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }

    /// Returns true if any component is degraded
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.status.is_degraded()
    }

    /// Returns true if any component is unhealthy
    #[must_use]
    pub const fn is_unhealthy(&self) -> bool {
        self.status.is_unhealthy()
    }
}

// ===== Engine Store =====

/// Shared, lock-serialized access to one allocation engine
pub mod store {
    use super::{Arc, HealthCheck, RwLock, StoreError};
    use crate::metrics::{AllocationMetrics, FleetMetrics, SnapshotMetrics};
    use ridepass_core::{
        AllocationEngine, AllocationError, Application, CancellationProof, Clock, EngineConfig,
        HolderId, NewRoute, Notice, Notices, Pass, PassId, Renewal, Route, RouteId, RoutePatch,
        Snapshot,
    };
    use std::path::Path;
    use std::time::{Duration, Instant};
    use tokio::sync::broadcast;
    use tokio::time::MissedTickBehavior;

    /// Default capacity of the notice broadcast channel
    const DEFAULT_BROADCAST_CAPACITY: usize = 16;

    /// Concurrent handle over a single [`AllocationEngine`].
    ///
    /// All mutations take the write lock, so every seat grant, promotion and
    /// expiry observes the books exactly as the engine left them. Notices are
    /// published to the broadcast channel only after the lock is released,
    /// which keeps slow subscribers from stalling allocation.
    ///
    /// The store is cheap to clone. Clones share the same engine and the same
    /// broadcast channel.
    #[derive(Clone)]
    pub struct EngineStore {
        /// The engine, guarded against concurrent mutation
        engine: Arc<RwLock<AllocationEngine>>,
        /// Fan-out channel for waitlist movements
        notices: broadcast::Sender<Notice>,
    }

    impl EngineStore {
        /// Create a store around an engine with the default broadcast capacity
        #[must_use]
        pub fn new(engine: AllocationEngine) -> Self {
            Self::with_broadcast_capacity(engine, DEFAULT_BROADCAST_CAPACITY)
        }

        /// Create a store with a custom broadcast channel capacity.
        ///
        /// Slow subscribers that fall more than `capacity` notices behind
        /// observe a lagged error and skip ahead; the store itself never
        /// blocks on them.
        #[must_use]
        pub fn with_broadcast_capacity(engine: AllocationEngine, capacity: usize) -> Self {
            let (notices, _) = broadcast::channel(capacity);
            Self {
                engine: Arc::new(RwLock::new(engine)),
                notices,
            }
        }

        // ===== Route administration =====

        /// Create a route
        ///
        /// # Errors
        ///
        /// Returns error if the code is already taken or the capacity is zero.
        pub async fn create_route(&self, details: NewRoute) -> Result<Route, AllocationError> {
            let mut engine = self.engine.write().await;
            let result = engine.create_route(details);
            let routes = engine.route_count();
            drop(engine);

            match &result {
                Ok(route) => {
                    tracing::info!(
                        route = %route.id,
                        code = %route.code,
                        capacity = route.capacity,
                        "route created"
                    );
                    FleetMetrics::record_routes(routes);
                }
                Err(error) => {
                    tracing::debug!(%error, "route creation rejected");
                    AllocationMetrics::record_failure();
                }
            }
            result
        }

        /// Update a route, cascading identity and fare changes onto its passes
        ///
        /// # Errors
        ///
        /// Returns error if the route is unknown, the new code collides, or
        /// the capacity would shrink below current occupancy.
        pub async fn update_route(
            &self,
            id: RouteId,
            patch: RoutePatch,
        ) -> Result<Route, AllocationError> {
            let mut engine = self.engine.write().await;
            let result = engine.update_route(id, &patch);
            drop(engine);

            match &result {
                Ok(route) => {
                    tracing::info!(route = %route.id, code = %route.code, "route updated");
                }
                Err(error) => {
                    tracing::debug!(route = %id, %error, "route update rejected");
                    AllocationMetrics::record_failure();
                }
            }
            result
        }

        /// Delete a route that holds no seats and has no waitlist
        ///
        /// # Errors
        ///
        /// Returns error if the route is unknown or still has seated or
        /// waiting passes.
        pub async fn delete_route(&self, id: RouteId) -> Result<Route, AllocationError> {
            let mut engine = self.engine.write().await;
            let result = engine.delete_route(id);
            let routes = engine.route_count();
            drop(engine);

            match &result {
                Ok(route) => {
                    tracing::info!(route = %route.id, code = %route.code, "route deleted");
                    FleetMetrics::record_routes(routes);
                }
                Err(error) => {
                    tracing::debug!(route = %id, %error, "route deletion rejected");
                    AllocationMetrics::record_failure();
                }
            }
            result
        }

        /// Zero the occupancy counter of every route.
        ///
        /// Pass states are left untouched, so the books disagree with the
        /// counters until the affected passes are re-seated or retired. Meant
        /// for season rollover, not routine use.
        pub async fn reset_occupancy(&self) -> usize {
            let mut engine = self.engine.write().await;
            let reset = engine.reset_occupancy();
            drop(engine);

            tracing::warn!(routes = reset, "occupancy counters reset");
            reset
        }

        // ===== Pass lifecycle =====

        /// Process an application, seating the holder or appending them to
        /// the route's waitlist
        ///
        /// # Errors
        ///
        /// Returns error if the route is unknown or the holder already has a
        /// live pass.
        #[tracing::instrument(skip(self, application), name = "store_apply")]
        pub async fn apply(
            &self,
            application: Application,
        ) -> Result<(Pass, Notices), AllocationError> {
            let started = Instant::now();
            let mut engine = self.engine.write().await;
            let result = engine.apply(application);
            let waiting = engine.waiting_total();
            drop(engine);

            match &result {
                Ok((pass, notices)) => {
                    tracing::info!(
                        pass = %pass.id,
                        route = %pass.route,
                        state = %pass.state,
                        "application processed"
                    );
                    AllocationMetrics::record_application(pass.state.is_active(), started.elapsed());
                    FleetMetrics::record_waiting(waiting);
                    self.publish(notices.clone());
                }
                Err(error) => {
                    tracing::debug!(%error, "application rejected");
                    AllocationMetrics::record_failure();
                }
            }
            result
        }

        /// Renew a pass, optionally moving it to another route
        ///
        /// # Errors
        ///
        /// Returns error if the pass is unknown or terminal, or the
        /// destination route does not exist.
        #[tracing::instrument(skip(self, renewal), name = "store_renew")]
        pub async fn renew(
            &self,
            id: PassId,
            renewal: Renewal,
        ) -> Result<(Pass, Notices), AllocationError> {
            let started = Instant::now();
            let mut engine = self.engine.write().await;
            let result = engine.renew(id, renewal);
            let waiting = engine.waiting_total();
            drop(engine);

            match &result {
                Ok((pass, notices)) => {
                    tracing::info!(
                        pass = %pass.id,
                        route = %pass.route,
                        state = %pass.state,
                        valid_until = %pass.valid_until,
                        "pass renewed"
                    );
                    AllocationMetrics::record_renewal(started.elapsed());
                    FleetMetrics::record_waiting(waiting);
                    self.publish(notices.clone());
                }
                Err(error) => {
                    tracing::debug!(pass = %id, %error, "renewal rejected");
                    AllocationMetrics::record_failure();
                }
            }
            result
        }

        /// Cancel a pass after verifying the holder's confirmation details
        ///
        /// # Errors
        ///
        /// Returns error if the pass is unknown or terminal, or the proof
        /// does not match the pass on record.
        pub async fn cancel(
            &self,
            id: PassId,
            proof: CancellationProof,
        ) -> Result<Notices, AllocationError> {
            let started = Instant::now();
            let mut engine = self.engine.write().await;
            let result = engine.cancel(id, &proof);
            let waiting = engine.waiting_total();
            drop(engine);

            match &result {
                Ok(notices) => {
                    tracing::info!(pass = %id, "pass cancelled");
                    AllocationMetrics::record_cancellation(started.elapsed());
                    FleetMetrics::record_waiting(waiting);
                    self.publish(notices.clone());
                }
                Err(error) => {
                    tracing::debug!(pass = %id, %error, "cancellation rejected");
                    AllocationMetrics::record_failure();
                }
            }
            result
        }

        /// Release a pass without confirmation checks, freeing its seat for
        /// the oldest waiter
        ///
        /// # Errors
        ///
        /// Returns error if the pass is unknown or terminal.
        #[tracing::instrument(skip(self), name = "store_release")]
        pub async fn release(&self, id: PassId) -> Result<Notices, AllocationError> {
            let started = Instant::now();
            let mut engine = self.engine.write().await;
            let result = engine.release(id);
            let waiting = engine.waiting_total();
            drop(engine);

            match &result {
                Ok(notices) => {
                    tracing::info!(pass = %id, "pass released");
                    AllocationMetrics::record_release(started.elapsed());
                    FleetMetrics::record_waiting(waiting);
                    self.publish(notices.clone());
                }
                Err(error) => {
                    tracing::debug!(pass = %id, %error, "release rejected");
                    AllocationMetrics::record_failure();
                }
            }
            result
        }

        /// Seat the oldest waiter on a route if it has a vacancy
        ///
        /// # Errors
        ///
        /// Returns error if the route is unknown.
        pub async fn promote(
            &self,
            route: RouteId,
        ) -> Result<Option<(Pass, Notices)>, AllocationError> {
            let mut engine = self.engine.write().await;
            let result = engine.promote(route);
            let waiting = engine.waiting_total();
            drop(engine);

            match &result {
                Ok(Some((pass, notices))) => {
                    tracing::info!(pass = %pass.id, route = %route, "waiter promoted");
                    FleetMetrics::record_waiting(waiting);
                    self.publish(notices.clone());
                }
                Ok(None) => {
                    tracing::debug!(route = %route, "no promotion possible");
                }
                Err(error) => {
                    tracing::debug!(route = %route, %error, "promotion rejected");
                    AllocationMetrics::record_failure();
                }
            }
            result
        }

        /// Expire every pass whose validity has lapsed, then refill the
        /// freed seats from the waitlists
        ///
        /// # Errors
        ///
        /// Returns error if the bookkeeping for an affected route fails,
        /// which indicates a corrupted snapshot import.
        pub async fn expire_lapsed(&self) -> Result<(Vec<Pass>, Notices), AllocationError> {
            let started = Instant::now();
            let mut engine = self.engine.write().await;
            let result = engine.expire_lapsed();
            let waiting = engine.waiting_total();
            drop(engine);

            match &result {
                Ok((expired, notices)) => {
                    if !expired.is_empty() {
                        tracing::info!(count = expired.len(), "passes expired");
                    }
                    AllocationMetrics::record_sweep(expired.len(), started.elapsed());
                    FleetMetrics::record_waiting(waiting);
                    self.publish(notices.clone());
                }
                Err(error) => {
                    tracing::error!(%error, "expiry sweep failed");
                    AllocationMetrics::record_failure();
                }
            }
            result
        }

        /// Spawn a background task that runs the expiry sweep on an interval.
        ///
        /// The first sweep runs immediately. The task runs until the returned
        /// handle is aborted or the runtime shuts down.
        #[must_use]
        pub fn spawn_expiry_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
            let store = self.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    match store.expire_lapsed().await {
                        Ok((expired, _)) if !expired.is_empty() => {
                            tracing::info!(count = expired.len(), "expiry sweep retired passes");
                        }
                        Ok(_) => {}
                        Err(error) => {
                            tracing::error!(%error, "expiry sweep failed");
                        }
                    }
                }
            })
        }

        // ===== Queries =====

        /// Look up a route
        pub async fn route(&self, id: RouteId) -> Option<Route> {
            self.engine.read().await.route(id)
        }

        /// All routes, ordered by code
        pub async fn routes(&self) -> Vec<Route> {
            self.engine.read().await.routes()
        }

        /// Number of registered routes
        pub async fn route_count(&self) -> usize {
            self.engine.read().await.route_count()
        }

        /// Look up a pass
        pub async fn pass(&self, id: PassId) -> Option<Pass> {
            self.engine.read().await.pass(id)
        }

        /// The holder's live pass, if they have one
        pub async fn pass_for_holder(&self, holder: HolderId) -> Option<Pass> {
            self.engine.read().await.pass_for_holder(holder)
        }

        /// A route's waitlist, oldest application first
        pub async fn waitlist(&self, route: RouteId) -> Vec<Pass> {
            self.engine.read().await.waitlist(route)
        }

        /// Passes on a route in the given state, oldest first
        pub async fn passes_on_route(
            &self,
            route: RouteId,
            state: ridepass_core::PassState,
        ) -> Vec<Pass> {
            self.engine.read().await.passes_on_route(route, state)
        }

        /// Number of passes ever issued, in any state
        pub async fn pass_count(&self) -> usize {
            self.engine.read().await.pass_count()
        }

        /// Number of holders waiting across all routes
        pub async fn waiting_total(&self) -> usize {
            self.engine.read().await.waiting_total()
        }

        // ===== Notices =====

        /// Subscribe to the notice stream.
        ///
        /// Receivers see every notice published after the call. Subscribe
        /// before triggering the operation whose notices you want to observe.
        #[must_use]
        pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
            self.notices.subscribe()
        }

        fn publish(&self, notices: Notices) {
            for notice in notices {
                if matches!(notice, Notice::Promoted { .. }) {
                    AllocationMetrics::record_promotion();
                }
                // Send fails only when nobody is subscribed.
                let _ = self.notices.send(notice);
            }
        }

        // ===== Health =====

        /// Check the health of the allocation books.
        ///
        /// Degraded when any waitlist has grown past the engine's alert
        /// threshold, unhealthy if any route reports more seated passes than
        /// capacity (possible only via a hand-edited snapshot).
        pub async fn health(&self) -> HealthCheck {
            let engine = self.engine.read().await;
            let routes = engine.routes();
            let passes = engine.pass_count();
            let waiting = engine.waiting_total();
            let threshold = engine.config().waitlist_alert_threshold();
            let pressured: Vec<String> = routes
                .iter()
                .filter(|route| engine.waiting_count(route.id) > threshold)
                .map(|route| route.code.clone())
                .collect();
            drop(engine);

            let overbooked: Vec<String> = routes
                .iter()
                .filter(|route| route.occupancy > route.capacity)
                .map(|route| route.code.clone())
                .collect();

            let check = if overbooked.is_empty() {
                if pressured.is_empty() {
                    HealthCheck::healthy("engine_store")
                } else {
                    HealthCheck::degraded(
                        "engine_store",
                        format!("waitlist pressure on {}", pressured.join(", ")),
                    )
                }
            } else {
                HealthCheck::unhealthy(
                    "engine_store",
                    format!("overbooked routes: {}", overbooked.join(", ")),
                )
            };

            check
                .with_metadata("routes", routes.len().to_string())
                .with_metadata("passes", passes.to_string())
                .with_metadata("waiting_total", waiting.to_string())
        }

        // ===== Persistence =====

        /// Serialize the current engine state as pretty-printed JSON
        ///
        /// # Errors
        ///
        /// Returns error if serialization fails.
        pub async fn snapshot_json(&self) -> Result<String, StoreError> {
            let snapshot = self.engine.read().await.snapshot();
            Ok(serde_json::to_string_pretty(&snapshot)?)
        }

        /// Capture the current engine state
        pub async fn snapshot(&self) -> Snapshot {
            self.engine.read().await.snapshot()
        }

        /// Write the current engine state to a JSON file
        ///
        /// # Errors
        ///
        /// Returns error if serialization or the file write fails.
        pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
            let json = self.snapshot_json().await?;
            tokio::fs::write(path.as_ref(), json).await?;
            SnapshotMetrics::record_save();
            tracing::info!(path = %path.as_ref().display(), "snapshot saved");
            Ok(())
        }

        /// Rebuild a store around a previously captured snapshot
        #[must_use]
        pub fn restore(snapshot: Snapshot, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
            Self::new(AllocationEngine::from_snapshot(snapshot, config, clock))
        }

        /// Restore a store from a snapshot file written by
        /// [`save_snapshot`](Self::save_snapshot)
        ///
        /// # Errors
        ///
        /// Returns error if the file cannot be read or does not contain a
        /// valid snapshot.
        pub async fn load_snapshot(
            path: impl AsRef<Path>,
            config: EngineConfig,
            clock: Arc<dyn Clock>,
        ) -> Result<Self, StoreError> {
            let json = tokio::fs::read_to_string(path.as_ref()).await?;
            let snapshot: Snapshot = serde_json::from_str(&json)?;
            SnapshotMetrics::record_load();
            tracing::info!(path = %path.as_ref().display(), "snapshot loaded");
            Ok(Self::restore(snapshot, config, clock))
        }
    }
}

pub use store::EngineStore;

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)] // Tests can unwrap

    use super::*;
    use ridepass_core::{Application, CancellationProof, EngineConfig, Notice, PassState};
    use ridepass_testing::helpers::{campus_engine, fill_route, student_profile};
    use ridepass_testing::test_clock;
    use std::sync::Arc;

    fn campus_store() -> (EngineStore, Vec<ridepass_core::Route>) {
        let (engine, routes) = campus_engine(Arc::new(test_clock()));
        (EngineStore::new(engine), routes)
    }

    #[tokio::test]
    async fn store_processes_applications() {
        let (store, routes) = campus_store();
        let holder = ridepass_core::HolderId::new();

        let (pass, notices) = store
            .apply(Application::new(
                holder,
                routes[0].id,
                student_profile("Asha", "21BCE001"),
            ))
            .await
            .unwrap();

        assert_eq!(pass.state, PassState::Active);
        assert!(notices.is_empty());
        assert_eq!(store.pass_for_holder(holder).await.unwrap().id, pass.id);
        assert_eq!(store.route(routes[0].id).await.unwrap().occupancy, 1);
    }

    #[tokio::test]
    #[allow(clippy::panic)] // Tests are allowed to panic on failures
    async fn subscribers_see_promotions() {
        let (mut engine, routes) = campus_engine(Arc::new(test_clock()));
        let seated = fill_route(&mut engine, routes[0].id, 51);
        let store = EngineStore::new(engine);

        let mut notices = store.subscribe();
        store.release(seated[0].id).await.unwrap();

        let notice = notices.recv().await.unwrap();
        match notice {
            Notice::Promoted { pass, route, .. } => {
                assert_eq!(pass, seated[50].id);
                assert_eq!(route, routes[0].id);
            }
            other => panic!("expected promotion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_requires_matching_proof() {
        let (store, routes) = campus_store();
        let (pass, _) = store
            .apply(Application::new(
                ridepass_core::HolderId::new(),
                routes[1].id,
                student_profile("Ravi", "21BCE002"),
            ))
            .await
            .unwrap();

        let wrong = CancellationProof::new("21BCE999", &pass.route_code, "9876543210");
        assert!(store.cancel(pass.id, wrong).await.is_err());

        let right = CancellationProof::new("21BCE002", &pass.route_code, "9876543210");
        store.cancel(pass.id, right).await.unwrap();
        assert_eq!(
            store.pass(pass.id).await.unwrap().state,
            PassState::Cancelled
        );
    }

    #[tokio::test]
    async fn health_degrades_under_waitlist_pressure() {
        let (mut engine, routes) = campus_engine(Arc::new(test_clock()));
        // Capacity 50 plus 11 waiters pushes past the default threshold of 10.
        fill_route(&mut engine, routes[0].id, 61);
        let store = EngineStore::new(engine);

        let check = store.health().await;
        assert!(check.status.is_degraded());
        assert!(check.message.unwrap().contains("R001"));
    }

    #[tokio::test]
    async fn health_reports_clean_books() {
        let (store, _) = campus_store();
        let check = store.health().await;
        assert!(check.status.is_healthy());
        assert!(check
            .metadata
            .iter()
            .any(|(key, value)| key == "routes" && value == "4"));
    }

    #[tokio::test]
    async fn snapshot_roundtrips_through_file() {
        let (mut engine, routes) = campus_engine(Arc::new(test_clock()));
        fill_route(&mut engine, routes[0].id, 3);
        let store = EngineStore::new(engine);
        let before = store.snapshot().await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books.json");
        store.save_snapshot(&path).await.unwrap();

        let restored =
            EngineStore::load_snapshot(&path, EngineConfig::default(), Arc::new(test_clock()))
                .await
                .unwrap();
        assert_eq!(restored.snapshot().await, before);
        assert_eq!(restored.pass_count().await, 3);
    }

    #[test]
    fn health_status_worst_prefers_failures() {
        assert_eq!(
            HealthStatus::Healthy.worst(HealthStatus::Degraded),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::Degraded.worst(HealthStatus::Unhealthy),
            HealthStatus::Unhealthy
        );
        assert!(HealthStatus::Healthy
            .worst(HealthStatus::Healthy)
            .is_healthy());
    }

    #[test]
    fn health_report_aggregates_checks() {
        let report = HealthReport::new(vec![
            HealthCheck::healthy("engine_store"),
            HealthCheck::degraded("metrics", "exporter not installed"),
        ]);
        assert!(report.is_degraded());
        assert_eq!(report.checks.len(), 2);
    }
}
