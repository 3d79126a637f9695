//! Seat allocation for capacity-bounded transit routes.
//!
//! This crate models a fleet of routes with fixed seat capacities and the
//! passes that occupy those seats. Applications are admitted while seats
//! remain and waitlisted once a route fills; freed seats go to the oldest
//! waiter automatically. It provides:
//!
//! - Seat-bounded admission with automatic waitlisting
//! - Strict FIFO promotion when seats free up
//! - Cutoff-based validity windows and an expiry sweep
//! - Route administration that cascades onto issued passes
//! - Snapshot capture and restore
//!
//! # Pass lifecycle
//!
//! ```text
//!              apply
//!                │
//!     seat free  │  route full
//!        ┌───────┴───────┐
//!        ▼               ▼
//!     Active ◄──────  Waiting
//!        │   promote     │
//!        │               │
//!        ▼               ▼
//!    Cancelled       Cancelled
//!     Expired         Expired
//! ```
//!
//! Release and cancellation end a pass in `Cancelled`; the expiry sweep ends
//! lapsed passes in `Expired`. Both free the seat and promote in the same
//! step, so occupancy always equals the number of `Active` passes.
//!
//! # Quick Start
//!
//! ```no_run
//! use ridepass_core::{
//!     AllocationEngine, Application, HolderId, HolderProfile, Money, NewRoute, SystemClock,
//! };
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), ridepass_core::AllocationError> {
//! let mut engine = AllocationEngine::new(Arc::new(SystemClock));
//!
//! let route = engine.create_route(NewRoute::new(
//!     "R001",
//!     "North Campus Route",
//!     Money::from_rupees(5000),
//!     50,
//! ))?;
//!
//! let (pass, _notices) = engine.apply(Application::new(
//!     HolderId::new(),
//!     route.id,
//!     HolderProfile::default(),
//! ))?;
//! println!("pass {} is {}", pass.id, pass.state);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use smallvec::SmallVec;

pub mod engine;
pub mod environment;
pub mod error;
pub mod ledger;
pub mod policy;
pub mod registry;
pub mod snapshot;
pub mod types;

pub use engine::{AllocationEngine, EngineConfig};
pub use environment::{Clock, SystemClock};
pub use error::AllocationError;
pub use ledger::PassLedger;
pub use policy::RenewalPolicy;
pub use registry::RouteRegistry;
pub use snapshot::Snapshot;
pub use types::{
    Application, CancellationProof, HolderId, HolderProfile, Money, NewRoute, Notice, Notices,
    Pass, PassId, PassState, Renewal, Route, RouteId, RoutePatch,
};
