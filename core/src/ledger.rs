//! Pass ledger: the set of reservation records.
//!
//! Pure data operations with no business rules. The allocation engine is
//! the only writer of `state` and `route`; everything else reads.

use crate::error::AllocationError;
use crate::types::{HolderId, Pass, PassId, PassState, Route, RouteId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// The set of passes, keyed by id
#[derive(Clone, Debug, Default)]
pub struct PassLedger {
    passes: HashMap<PassId, Pass>,
}

impl PassLedger {
    /// Creates an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self {
            passes: HashMap::new(),
        }
    }

    /// Rebuilds a ledger from previously exported passes
    #[must_use]
    pub fn from_passes(passes: HashMap<PassId, Pass>) -> Self {
        Self { passes }
    }

    /// Records a pass
    pub(crate) fn insert(&mut self, pass: Pass) {
        self.passes.insert(pass.id, pass);
    }

    /// Looks up a pass by id
    #[must_use]
    pub fn get(&self, id: PassId) -> Option<&Pass> {
        self.passes.get(&id)
    }

    /// Mutable lookup, reserved for the engine
    pub(crate) fn get_mut(&mut self, id: PassId) -> Option<&mut Pass> {
        self.passes.get_mut(&id)
    }

    /// Flips a pass to a new lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::PassNotFound`] for an unknown id.
    pub(crate) fn set_state(
        &mut self,
        id: PassId,
        state: PassState,
    ) -> Result<(), AllocationError> {
        let pass = self
            .passes
            .get_mut(&id)
            .ok_or(AllocationError::PassNotFound(id))?;
        pass.state = state;
        Ok(())
    }

    /// The holder's `Active` or `Waiting` pass, if any.
    ///
    /// Terminal passes are invisible here; a holder may hold at most one
    /// non-terminal pass at a time.
    #[must_use]
    pub fn for_holder(&self, holder: HolderId) -> Option<&Pass> {
        self.passes
            .values()
            .find(|pass| pass.holder == holder && pass.is_non_terminal())
    }

    /// Passes on a route in the given state, in FIFO order
    #[must_use]
    pub fn on_route(&self, route: RouteId, state: PassState) -> Vec<Pass> {
        let mut passes: Vec<Pass> = self
            .passes
            .values()
            .filter(|pass| pass.route == route && pass.state == state)
            .cloned()
            .collect();
        passes.sort_by(fifo_order);
        passes
    }

    /// The route's waitlist, oldest application first.
    ///
    /// Ordered by `created_at` ascending with the pass id as a stable
    /// tiebreak, so promotion is strict FIFO.
    #[must_use]
    pub fn waitlist_for(&self, route: RouteId) -> Vec<&Pass> {
        let mut waiting: Vec<&Pass> = self
            .passes
            .values()
            .filter(|pass| pass.route == route && pass.state.is_waiting())
            .collect();
        waiting.sort_by(|a, b| fifo_order(a, b));
        waiting
    }

    /// Length of the route's waitlist
    #[must_use]
    pub fn waiting_count(&self, route: RouteId) -> usize {
        self.passes
            .values()
            .filter(|pass| pass.route == route && pass.state.is_waiting())
            .count()
    }

    /// Number of `Waiting` passes across all routes
    #[must_use]
    pub fn waiting_total(&self) -> usize {
        self.passes
            .values()
            .filter(|pass| pass.state.is_waiting())
            .count()
    }

    /// Non-terminal passes whose validity window ended before `now`,
    /// in FIFO order
    #[must_use]
    pub fn lapsed(&self, now: DateTime<Utc>) -> Vec<Pass> {
        let mut lapsed: Vec<Pass> = self
            .passes
            .values()
            .filter(|pass| pass.is_non_terminal() && pass.valid_until < now)
            .cloned()
            .collect();
        lapsed.sort_by(fifo_order);
        lapsed
    }

    /// Refreshes the denormalized route fields on a route's passes.
    ///
    /// Code and name are copied to every non-terminal pass; the price quote
    /// is refreshed only while a pass is still `Waiting`. Returns the number
    /// of passes touched.
    pub(crate) fn cascade_route_update(&mut self, route: &Route, update_price: bool) -> usize {
        let mut touched = 0;
        for pass in self
            .passes
            .values_mut()
            .filter(|pass| pass.route == route.id && pass.is_non_terminal())
        {
            pass.route_code = route.code.clone();
            pass.route_name = route.name.clone();
            if update_price && pass.state.is_waiting() {
                pass.price = route.price;
            }
            touched += 1;
        }
        touched
    }

    /// All passes, oldest first
    #[must_use]
    pub fn list(&self) -> Vec<Pass> {
        let mut passes: Vec<Pass> = self.passes.values().cloned().collect();
        passes.sort_by(fifo_order);
        passes
    }

    /// Number of passes, terminal ones included
    #[must_use]
    pub fn count(&self) -> usize {
        self.passes.len()
    }

    /// Checks whether the ledger holds no passes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Clones the backing map for a snapshot
    #[must_use]
    pub fn export(&self) -> HashMap<PassId, Pass> {
        self.passes.clone()
    }
}

fn fifo_order(a: &Pass, b: &Pass) -> std::cmp::Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HolderProfile, Money};
    use chrono::TimeZone;

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, second).unwrap()
    }

    fn pass(holder: HolderId, route: RouteId, state: PassState, created: DateTime<Utc>) -> Pass {
        Pass {
            id: PassId::new(),
            holder,
            route,
            route_code: "R001".to_string(),
            route_name: "North Campus Route".to_string(),
            price: Money::from_rupees(5000),
            state,
            created_at: created,
            valid_until: Utc.with_ymd_and_hms(2025, 5, 31, 23, 59, 59).unwrap(),
            profile: HolderProfile::default(),
        }
    }

    #[test]
    fn test_for_holder_ignores_terminal_passes() {
        let mut ledger = PassLedger::new();
        let holder = HolderId::new();
        let route = RouteId::new();

        ledger.insert(pass(holder, route, PassState::Cancelled, at(0)));
        assert!(ledger.for_holder(holder).is_none());

        let waiting = pass(holder, route, PassState::Waiting, at(1));
        let waiting_id = waiting.id;
        ledger.insert(waiting);
        assert_eq!(ledger.for_holder(holder).map(|p| p.id), Some(waiting_id));
    }

    #[test]
    fn test_waitlist_is_fifo_by_created_at() {
        let mut ledger = PassLedger::new();
        let route = RouteId::new();

        let second = pass(HolderId::new(), route, PassState::Waiting, at(2));
        let first = pass(HolderId::new(), route, PassState::Waiting, at(1));
        let seated = pass(HolderId::new(), route, PassState::Active, at(0));
        let (first_id, second_id) = (first.id, second.id);
        ledger.insert(second);
        ledger.insert(first);
        ledger.insert(seated);

        let order: Vec<PassId> = ledger.waitlist_for(route).iter().map(|p| p.id).collect();
        assert_eq!(order, vec![first_id, second_id]);
        assert_eq!(ledger.waiting_count(route), 2);
    }

    #[test]
    fn test_waitlist_ties_break_by_id() {
        let mut ledger = PassLedger::new();
        let route = RouteId::new();

        let mut ids: Vec<PassId> = (0..4)
            .map(|_| {
                let p = pass(HolderId::new(), route, PassState::Waiting, at(1));
                let id = p.id;
                ledger.insert(p);
                id
            })
            .collect();
        ids.sort();

        let order: Vec<PassId> = ledger.waitlist_for(route).iter().map(|p| p.id).collect();
        assert_eq!(order, ids);
    }

    #[test]
    fn test_lapsed_skips_terminal_passes() {
        let mut ledger = PassLedger::new();
        let route = RouteId::new();

        let mut live = pass(HolderId::new(), route, PassState::Active, at(0));
        live.valid_until = at(10);
        let live_id = live.id;
        let mut done = pass(HolderId::new(), route, PassState::Cancelled, at(0));
        done.valid_until = at(10);
        let mut fresh = pass(HolderId::new(), route, PassState::Waiting, at(0));
        fresh.valid_until = at(30);
        ledger.insert(live);
        ledger.insert(done);
        ledger.insert(fresh);

        let lapsed: Vec<PassId> = ledger.lapsed(at(20)).iter().map(|p| p.id).collect();
        assert_eq!(lapsed, vec![live_id]);
    }

    #[test]
    fn test_cascade_refreshes_non_terminal_passes_only() {
        let mut ledger = PassLedger::new();
        let route_id = RouteId::new();

        let active = pass(HolderId::new(), route_id, PassState::Active, at(0));
        let waiting = pass(HolderId::new(), route_id, PassState::Waiting, at(1));
        let cancelled = pass(HolderId::new(), route_id, PassState::Cancelled, at(2));
        let (active_id, waiting_id, cancelled_id) = (active.id, waiting.id, cancelled.id);
        ledger.insert(active);
        ledger.insert(waiting);
        ledger.insert(cancelled);

        let renamed = Route {
            id: route_id,
            code: "R010".to_string(),
            name: "Ring Road Route".to_string(),
            price: Money::from_rupees(6000),
            capacity: 50,
            occupancy: 1,
        };
        assert_eq!(ledger.cascade_route_update(&renamed, true), 2);

        let active = ledger.get(active_id).unwrap();
        assert_eq!(active.route_code, "R010");
        // Active passes keep their originally quoted price.
        assert_eq!(active.price, Money::from_rupees(5000));

        let waiting = ledger.get(waiting_id).unwrap();
        assert_eq!(waiting.route_code, "R010");
        assert_eq!(waiting.price, Money::from_rupees(6000));

        let cancelled = ledger.get(cancelled_id).unwrap();
        assert_eq!(cancelled.route_code, "R001");
        assert_eq!(cancelled.price, Money::from_rupees(5000));
    }
}
