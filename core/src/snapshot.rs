//! Persisted state layout.
//!
//! Two collections keyed by id, mirroring exactly what the engine owns. A
//! snapshot taken between completed operations upholds the occupancy
//! invariant; restore re-enters through
//! [`AllocationEngine::from_snapshot`](crate::engine::AllocationEngine::from_snapshot).

use crate::types::{Pass, PassId, Route, RouteId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A consistent picture of all routes and passes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Routes keyed by id
    pub routes: HashMap<RouteId, Route>,

    /// Passes keyed by id, terminal ones included
    pub passes: HashMap<PassId, Pass>,
}

impl Snapshot {
    /// Number of routes captured
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Number of passes captured
    #[must_use]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }
}
