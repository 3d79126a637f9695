//! The allocation engine: admission, renewal, release, and promotion.
//!
//! The engine orchestrates the route registry and the pass ledger under one
//! invariant: a route's occupancy always equals the number of `Active`
//! passes assigned to it, and never exceeds capacity. Every operation
//! validates before it mutates, so a failed call leaves no partial state.
//!
//! Release-and-promote and cross-route renewal run as single synchronous
//! units; callers serialize access (see the runtime store), which makes
//! their intermediate steps externally unobservable.

use crate::environment::Clock;
use crate::error::AllocationError;
use crate::ledger::PassLedger;
use crate::policy::RenewalPolicy;
use crate::registry::RouteRegistry;
use crate::snapshot::Snapshot;
use crate::types::{
    Application, CancellationProof, HolderId, NewRoute, Notice, Notices, Pass, PassId, PassState,
    Renewal, Route, RouteId, RoutePatch,
};
use std::collections::BTreeSet;
use std::sync::Arc;

// ============================================================================
// Configuration
// ============================================================================

/// Tunables for the allocation engine
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    waitlist_alert_threshold: usize,
    policy: RenewalPolicy,
}

impl EngineConfig {
    /// Waitlist length past which a pressure notice is emitted
    pub const DEFAULT_ALERT_THRESHOLD: usize = 10;

    /// Creates a config from explicit parts
    #[must_use]
    pub const fn new(waitlist_alert_threshold: usize, policy: RenewalPolicy) -> Self {
        Self {
            waitlist_alert_threshold,
            policy,
        }
    }

    /// Sets the waitlist alert threshold
    #[must_use]
    pub const fn with_alert_threshold(mut self, threshold: usize) -> Self {
        self.waitlist_alert_threshold = threshold;
        self
    }

    /// Sets the renewal-period policy
    #[must_use]
    pub const fn with_policy(mut self, policy: RenewalPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current alert threshold
    #[must_use]
    pub const fn waitlist_alert_threshold(&self) -> usize {
        self.waitlist_alert_threshold
    }

    /// Current renewal-period policy
    #[must_use]
    pub const fn policy(&self) -> RenewalPolicy {
        self.policy
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            waitlist_alert_threshold: Self::DEFAULT_ALERT_THRESHOLD,
            policy: RenewalPolicy::default(),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Single logical owner of route and pass state.
///
/// Operations are synchronous and fast with no internal suspension points;
/// external steps (payment confirmation, identity lookup) happen strictly
/// before an operation is invoked. Mutating operations return the
/// [`Notices`] they produced so the caller can hand them to the
/// notification sink.
pub struct AllocationEngine {
    registry: RouteRegistry,
    ledger: PassLedger,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl AllocationEngine {
    /// Creates an empty engine with default configuration
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_config(EngineConfig::default(), clock)
    }

    /// Creates an empty engine with the given configuration
    #[must_use]
    pub fn with_config(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: RouteRegistry::new(),
            ledger: PassLedger::new(),
            config,
            clock,
        }
    }

    /// Rebuilds an engine from a snapshot, verbatim.
    ///
    /// Occupancy counters are restored as captured, not recomputed; a
    /// snapshot taken after `reset_occupancy` keeps its suspended invariant.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: RouteRegistry::from_routes(snapshot.routes),
            ledger: PassLedger::from_passes(snapshot.passes),
            config,
            clock,
        }
    }

    /// The engine's configuration
    #[must_use]
    pub const fn config(&self) -> EngineConfig {
        self.config
    }

    // ========================================================================
    // Route administration
    // ========================================================================

    /// Creates a route with occupancy zero.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::DuplicateCode`] or
    /// [`AllocationError::InvalidCapacity`] when validation fails.
    pub fn create_route(&mut self, details: NewRoute) -> Result<Route, AllocationError> {
        self.registry.create(details)
    }

    /// Updates a route and cascades denormalized fields onto its passes.
    ///
    /// Code and name changes reach every non-terminal pass on the route;
    /// a price change refreshes the quote on `Waiting` passes only. The
    /// route change and the cascade form one unit: a failed validation
    /// touches neither.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::RouteNotFound`],
    /// [`AllocationError::DuplicateCode`],
    /// [`AllocationError::InvalidCapacity`], or
    /// [`AllocationError::CapacityBelowOccupancy`].
    pub fn update_route(&mut self, id: RouteId, patch: &RoutePatch) -> Result<Route, AllocationError> {
        let updated = self.registry.update(id, patch)?;
        if patch.touches_pass_fields() {
            self.ledger.cascade_route_update(&updated, patch.price.is_some());
        }
        Ok(updated)
    }

    /// Deletes a route nobody holds or awaits a seat on.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::RouteNotFound`] for an unknown id and
    /// [`AllocationError::RouteOccupied`] while the route has occupancy or
    /// a non-empty waitlist.
    pub fn delete_route(&mut self, id: RouteId) -> Result<Route, AllocationError> {
        self.registry.require(id)?;
        if self.ledger.waiting_count(id) > 0 {
            return Err(AllocationError::RouteOccupied(id));
        }
        self.registry.remove(id)
    }

    /// Zeroes every route's occupancy counter without touching pass states.
    ///
    /// Bulk administrative override with a deliberate asymmetry: until
    /// stale passes are expired or removed, occupancy no longer matches the
    /// `Active` pass count. Returns the number of routes reset.
    pub fn reset_occupancy(&mut self) -> usize {
        self.registry.reset_occupancy()
    }

    // ========================================================================
    // Pass lifecycle
    // ========================================================================

    /// Admits a new application: `Active` while seats remain, `Waiting`
    /// once the route is full.
    ///
    /// Duplicate and existence checks run before any occupancy change, so a
    /// rejected application never mutates route state. The validity window
    /// runs to the next renewal-policy cutoff.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::AlreadyReserved`] when the holder already
    /// has a non-terminal pass and [`AllocationError::RouteNotFound`] for
    /// an unknown route.
    pub fn apply(&mut self, application: Application) -> Result<(Pass, Notices), AllocationError> {
        let Application {
            holder,
            route: route_id,
            profile,
        } = application;

        if self.ledger.for_holder(holder).is_some() {
            return Err(AllocationError::AlreadyReserved(holder));
        }
        let route = self.registry.require(route_id)?.clone();

        let state = if route.has_vacancy() {
            PassState::Active
        } else {
            PassState::Waiting
        };
        if state.is_active() {
            self.registry.adjust_occupancy(route_id, 1)?;
        }

        let now = self.clock.now();
        let pass = Pass {
            id: PassId::new(),
            holder,
            route: route_id,
            route_code: route.code.clone(),
            route_name: route.name.clone(),
            price: route.price,
            state,
            created_at: now,
            valid_until: self.config.policy.next_cutoff(now),
            profile,
        };
        self.ledger.insert(pass.clone());

        let mut notices = Notices::new();
        if state.is_waiting() {
            self.note_waitlisted(pass.id, &route, &mut notices);
        }
        Ok((pass, notices))
    }

    /// Renews a pass, optionally moving it to another route.
    ///
    /// In place, the validity window is refreshed; an `Active` pass keeps
    /// its seat and a `Waiting` pass is re-admitted through the occupancy
    /// choke point, taking a seat if one is free and otherwise keeping its
    /// queue position. Across routes, the destination is validated first,
    /// then the old seat is freed (promoting there), then the pass is
    /// admitted against the destination exactly like a new application;
    /// its denormalized fields follow the destination. `created_at` never
    /// changes, so the pass queues by its original application time.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::PassNotFound`] for unknown or terminal
    /// passes and [`AllocationError::RouteNotFound`] when the requested
    /// destination does not exist; the old seat stays held in that case.
    pub fn renew(&mut self, id: PassId, renewal: Renewal) -> Result<(Pass, Notices), AllocationError> {
        let (current_route, current_state) = {
            let pass = self.ledger.get(id).ok_or(AllocationError::PassNotFound(id))?;
            if pass.state.is_terminal() {
                return Err(AllocationError::PassNotFound(id));
            }
            (pass.route, pass.state)
        };

        let now = self.clock.now();
        let valid_until = self.config.policy.next_cutoff(now);
        let mut notices = Notices::new();

        match renewal.route {
            Some(target) if target != current_route => {
                // Destination first; a bad target must not cost the old seat.
                self.registry.require(target)?;

                if current_state.is_active() {
                    self.registry.adjust_occupancy(current_route, -1)?;
                    self.promote_into_vacancy(current_route, &mut notices)?;
                }

                let destination = self.registry.require(target)?.clone();
                let admitted = if destination.has_vacancy() {
                    PassState::Active
                } else {
                    PassState::Waiting
                };
                if admitted.is_active() {
                    self.registry.adjust_occupancy(target, 1)?;
                }

                let pass = self
                    .ledger
                    .get_mut(id)
                    .ok_or(AllocationError::PassNotFound(id))?;
                pass.route = target;
                pass.route_code = destination.code.clone();
                pass.route_name = destination.name.clone();
                pass.price = destination.price;
                pass.state = admitted;
                pass.valid_until = valid_until;
                if let Some(profile) = renewal.profile {
                    pass.profile = profile;
                }
                let renewed = pass.clone();

                if admitted.is_waiting() {
                    self.note_waitlisted(id, &destination, &mut notices);
                }
                Ok((renewed, notices))
            }
            _ => {
                if current_state.is_waiting() && self.registry.require(current_route)?.has_vacancy()
                {
                    self.registry.adjust_occupancy(current_route, 1)?;
                    self.ledger.set_state(id, PassState::Active)?;
                }

                let pass = self
                    .ledger
                    .get_mut(id)
                    .ok_or(AllocationError::PassNotFound(id))?;
                pass.valid_until = valid_until;
                if let Some(profile) = renewal.profile {
                    pass.profile = profile;
                }
                Ok((pass.clone(), notices))
            }
        }
    }

    /// Cancels a pass after the holder restates its details.
    ///
    /// The roll number and mobile must match exactly; the route code is
    /// compared case-insensitively. On a match this is [`Self::release`].
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::PassNotFound`] for unknown or terminal
    /// passes and [`AllocationError::ConfirmationMismatch`] when the
    /// restated details differ from the pass on record.
    pub fn cancel(
        &mut self,
        id: PassId,
        proof: &CancellationProof,
    ) -> Result<Notices, AllocationError> {
        {
            let pass = self.ledger.get(id).ok_or(AllocationError::PassNotFound(id))?;
            if pass.state.is_terminal() {
                return Err(AllocationError::PassNotFound(id));
            }
            let matches = pass.profile.roll_number == proof.roll_number
                && pass.route_code.eq_ignore_ascii_case(&proof.route_code)
                && pass.profile.mobile == proof.mobile;
            if !matches {
                return Err(AllocationError::ConfirmationMismatch);
            }
        }
        self.release(id)
    }

    /// Releases a pass: seat freed, oldest waiter promoted, state
    /// `Cancelled`.
    ///
    /// Used by administrative force-removal; voluntary cancellation goes
    /// through [`Self::cancel`]. Freeing the seat and promoting into it run
    /// as one unit, so the seat never shows vacant once the call returns.
    /// Releasing a `Waiting` pass just cancels it; it held no seat.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::PassNotFound`] for unknown or terminal
    /// passes.
    pub fn release(&mut self, id: PassId) -> Result<Notices, AllocationError> {
        let (route, state) = {
            let pass = self.ledger.get(id).ok_or(AllocationError::PassNotFound(id))?;
            if pass.state.is_terminal() {
                return Err(AllocationError::PassNotFound(id));
            }
            (pass.route, pass.state)
        };

        let mut notices = Notices::new();
        if state.is_active() {
            self.registry.adjust_occupancy(route, -1)?;
            self.promote_into_vacancy(route, &mut notices)?;
        }
        self.ledger.set_state(id, PassState::Cancelled)?;
        Ok(notices)
    }

    /// Promotes the oldest waiter on a route if a seat is free.
    ///
    /// No-op (returns `Ok(None)`) when nobody waits or the route is full.
    /// Promotion is strict FIFO on `created_at` with the pass id as a
    /// stable tiebreak.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::RouteNotFound`] for an unknown route.
    pub fn promote(&mut self, route: RouteId) -> Result<Option<(Pass, Notices)>, AllocationError> {
        self.registry.require(route)?;
        let mut notices = Notices::new();
        match self.promote_into_vacancy(route, &mut notices)? {
            Some(promoted) => {
                let pass = self
                    .ledger
                    .get(promoted)
                    .cloned()
                    .ok_or(AllocationError::PassNotFound(promoted))?;
                Ok(Some((pass, notices)))
            }
            None => Ok(None),
        }
    }

    /// Expires every non-terminal pass whose validity window has ended,
    /// then promotes remaining waiters into the freed seats.
    ///
    /// The sweep runs before promotion, so a lapsed waiter is never
    /// promoted. Returns the expired passes alongside the notices.
    ///
    /// # Errors
    ///
    /// Propagates registry failures; none occur while the occupancy
    /// invariant holds.
    pub fn expire_lapsed(&mut self) -> Result<(Vec<Pass>, Notices), AllocationError> {
        let now = self.clock.now();
        let lapsed = self.ledger.lapsed(now);
        let mut notices = Notices::new();
        let mut vacated: BTreeSet<RouteId> = BTreeSet::new();
        let mut expired = Vec::with_capacity(lapsed.len());

        for pass in lapsed {
            if pass.state.is_active() {
                self.registry.adjust_occupancy(pass.route, -1)?;
                vacated.insert(pass.route);
            }
            self.ledger.set_state(pass.id, PassState::Expired)?;
            notices.push(Notice::Expired {
                pass: pass.id,
                route: pass.route,
            });
            expired.push(Pass {
                state: PassState::Expired,
                ..pass
            });
        }

        for route in vacated {
            while self.promote_into_vacancy(route, &mut notices)?.is_some() {}
        }

        Ok((expired, notices))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Looks up a route
    #[must_use]
    pub fn route(&self, id: RouteId) -> Option<Route> {
        self.registry.get(id).cloned()
    }

    /// All routes, sorted by code
    #[must_use]
    pub fn routes(&self) -> Vec<Route> {
        self.registry.list()
    }

    /// Number of routes
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.registry.count()
    }

    /// Looks up a pass
    #[must_use]
    pub fn pass(&self, id: PassId) -> Option<Pass> {
        self.ledger.get(id).cloned()
    }

    /// The holder's non-terminal pass, if any
    #[must_use]
    pub fn pass_for_holder(&self, holder: HolderId) -> Option<Pass> {
        self.ledger.for_holder(holder).cloned()
    }

    /// Passes on a route in the given state, in FIFO order
    #[must_use]
    pub fn passes_on_route(&self, route: RouteId, state: PassState) -> Vec<Pass> {
        self.ledger.on_route(route, state)
    }

    /// The route's waitlist, oldest application first
    #[must_use]
    pub fn waitlist(&self, route: RouteId) -> Vec<Pass> {
        self.ledger.waitlist_for(route).into_iter().cloned().collect()
    }

    /// Number of `Waiting` passes on a route
    #[must_use]
    pub fn waiting_count(&self, route: RouteId) -> usize {
        self.ledger.waiting_count(route)
    }

    /// Number of `Waiting` passes across all routes
    #[must_use]
    pub fn waiting_total(&self) -> usize {
        self.ledger.waiting_total()
    }

    /// Number of passes, terminal ones included
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.ledger.count()
    }

    /// Captures the current routes and passes
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            routes: self.registry.export(),
            passes: self.ledger.export(),
        }
    }

    /// Verifies the occupancy bookkeeping for every route.
    ///
    /// Returns false if any counter disagrees with the seated passes on its
    /// route or exceeds capacity. Operations keep this true by construction;
    /// the check exists for debug assertions and for vetting imported
    /// snapshots. Note that `reset_occupancy` intentionally breaks it until
    /// the affected passes are retired.
    #[must_use]
    pub fn check_invariants(&self) -> bool {
        self.registry.list().iter().all(|route| {
            let seated = self.ledger.on_route(route.id, PassState::Active).len();
            let occupancy = usize::try_from(route.occupancy).unwrap_or(usize::MAX);
            occupancy == seated && route.occupancy <= route.capacity
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Seats the oldest waiter if the route has a free seat.
    fn promote_into_vacancy(
        &mut self,
        route_id: RouteId,
        notices: &mut Notices,
    ) -> Result<Option<PassId>, AllocationError> {
        if !self.registry.require(route_id)?.has_vacancy() {
            return Ok(None);
        }
        let Some(next) = self.ledger.waitlist_for(route_id).first().map(|pass| pass.id) else {
            return Ok(None);
        };

        self.registry.adjust_occupancy(route_id, 1)?;
        let pass = self
            .ledger
            .get_mut(next)
            .ok_or(AllocationError::PassNotFound(next))?;
        pass.state = PassState::Active;
        notices.push(Notice::Promoted {
            pass: next,
            route: route_id,
            holder: pass.holder,
            holder_name: pass.profile.full_name(),
        });
        Ok(Some(next))
    }

    /// Emits the queued notice, plus a pressure notice past the threshold.
    ///
    /// Counts the waitlist after insertion, so the pass that just queued is
    /// included.
    fn note_waitlisted(&self, pass: PassId, route: &Route, notices: &mut Notices) {
        let position = self.ledger.waiting_count(route.id);
        notices.push(Notice::Waitlisted {
            pass,
            route: route.id,
            position,
        });
        if position > self.config.waitlist_alert_threshold {
            notices.push(Notice::WaitlistPressure {
                route: route.id,
                route_code: route.code.clone(),
                waiting: position,
            });
        }
    }
}
