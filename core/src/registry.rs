//! Route registry: the set of resource pools passes are admitted against.
//!
//! The registry owns route records and their occupancy counters. All
//! occupancy changes flow through [`RouteRegistry::adjust_occupancy`], the
//! single choke point that enforces the `0 <= occupancy <= capacity` bounds.
//! Only the engine in this crate can reach it.

use crate::error::AllocationError;
use crate::types::{NewRoute, Route, RouteId, RoutePatch};
use std::collections::HashMap;

/// The set of routes, keyed by id
#[derive(Clone, Debug, Default)]
pub struct RouteRegistry {
    routes: HashMap<RouteId, Route>,
}

impl RouteRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Rebuilds a registry from previously exported routes
    #[must_use]
    pub fn from_routes(routes: HashMap<RouteId, Route>) -> Self {
        Self { routes }
    }

    /// Creates a route with occupancy zero.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::InvalidCapacity`] for a zero capacity and
    /// [`AllocationError::DuplicateCode`] when another route already uses
    /// the code (case-insensitive).
    pub fn create(&mut self, details: NewRoute) -> Result<Route, AllocationError> {
        if details.capacity == 0 {
            return Err(AllocationError::InvalidCapacity);
        }
        if self.code_in_use(&details.code, None) {
            return Err(AllocationError::DuplicateCode(details.code));
        }

        let route = Route {
            id: RouteId::new(),
            code: details.code,
            name: details.name,
            price: details.price,
            capacity: details.capacity,
            occupancy: 0,
        };
        self.routes.insert(route.id, route.clone());
        Ok(route)
    }

    /// Applies a patch to a route, validating every changed field first.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::RouteNotFound`] for an unknown id,
    /// [`AllocationError::DuplicateCode`] when the new code collides with
    /// another route, [`AllocationError::InvalidCapacity`] for a zero
    /// capacity, and [`AllocationError::CapacityBelowOccupancy`] when the
    /// new capacity is smaller than the seats already taken. Shrinking to
    /// exactly the current occupancy succeeds.
    pub fn update(&mut self, id: RouteId, patch: &RoutePatch) -> Result<Route, AllocationError> {
        let current_occupancy = self
            .routes
            .get(&id)
            .ok_or(AllocationError::RouteNotFound(id))?
            .occupancy;

        if let Some(code) = &patch.code {
            if self.code_in_use(code, Some(id)) {
                return Err(AllocationError::DuplicateCode(code.clone()));
            }
        }
        if let Some(capacity) = patch.capacity {
            if capacity == 0 {
                return Err(AllocationError::InvalidCapacity);
            }
            if capacity < current_occupancy {
                return Err(AllocationError::CapacityBelowOccupancy {
                    requested: capacity,
                    occupancy: current_occupancy,
                });
            }
        }

        let route = self
            .routes
            .get_mut(&id)
            .ok_or(AllocationError::RouteNotFound(id))?;
        if let Some(code) = &patch.code {
            route.code = code.clone();
        }
        if let Some(name) = &patch.name {
            route.name = name.clone();
        }
        if let Some(price) = patch.price {
            route.price = price;
        }
        if let Some(capacity) = patch.capacity {
            route.capacity = capacity;
        }
        Ok(route.clone())
    }

    /// Removes a route that no longer seats anyone.
    ///
    /// The registry only sees occupancy; the engine additionally refuses
    /// deletion while passes wait on the route.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::RouteNotFound`] for an unknown id and
    /// [`AllocationError::RouteOccupied`] while occupancy is above zero.
    pub fn remove(&mut self, id: RouteId) -> Result<Route, AllocationError> {
        let occupancy = self
            .routes
            .get(&id)
            .ok_or(AllocationError::RouteNotFound(id))?
            .occupancy;
        if occupancy > 0 {
            return Err(AllocationError::RouteOccupied(id));
        }
        self.routes
            .remove(&id)
            .ok_or(AllocationError::RouteNotFound(id))
    }

    /// Moves a route's occupancy by `delta`, holding the invariant bounds.
    ///
    /// This is the single choke point for occupancy changes; only the
    /// allocation engine calls it. Returns the adjusted occupancy.
    pub(crate) fn adjust_occupancy(
        &mut self,
        id: RouteId,
        delta: i64,
    ) -> Result<u32, AllocationError> {
        let route = self
            .routes
            .get_mut(&id)
            .ok_or(AllocationError::RouteNotFound(id))?;

        let adjusted = i64::from(route.occupancy) + delta;
        if adjusted < 0 {
            return Err(AllocationError::NegativeOccupancy(id));
        }
        let adjusted = u32::try_from(adjusted).map_err(|_| AllocationError::CapacityExceeded {
            route: id,
            capacity: route.capacity,
        })?;
        if adjusted > route.capacity {
            return Err(AllocationError::CapacityExceeded {
                route: id,
                capacity: route.capacity,
            });
        }

        route.occupancy = adjusted;
        Ok(adjusted)
    }

    /// Zeroes every route's occupancy counter.
    ///
    /// Bulk administrative override. Pass states are NOT touched, so the
    /// occupancy invariant is suspended until stale passes are expired or
    /// removed. Returns the number of routes reset.
    pub fn reset_occupancy(&mut self) -> usize {
        for route in self.routes.values_mut() {
            route.occupancy = 0;
        }
        self.routes.len()
    }

    /// Looks up a route by id
    #[must_use]
    pub fn get(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(&id)
    }

    /// Looks up a route, turning absence into an error
    pub(crate) fn require(&self, id: RouteId) -> Result<&Route, AllocationError> {
        self.routes.get(&id).ok_or(AllocationError::RouteNotFound(id))
    }

    /// All routes, sorted by code for stable listings
    #[must_use]
    pub fn list(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self.routes.values().cloned().collect();
        routes.sort_by(|a, b| {
            a.code
                .to_ascii_lowercase()
                .cmp(&b.code.to_ascii_lowercase())
        });
        routes
    }

    /// Number of routes
    #[must_use]
    pub fn count(&self) -> usize {
        self.routes.len()
    }

    /// Checks whether the registry holds no routes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Clones the backing map for a snapshot
    #[must_use]
    pub fn export(&self) -> HashMap<RouteId, Route> {
        self.routes.clone()
    }

    fn code_in_use(&self, code: &str, exclude: Option<RouteId>) -> bool {
        self.routes
            .values()
            .any(|route| exclude != Some(route.id) && route.code.eq_ignore_ascii_case(code))
    }
}
