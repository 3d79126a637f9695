//! Typed failures surfaced by engine operations.
//!
//! Every failure is local, synchronous, and non-retryable as issued: callers
//! must change the request (pick another route or code, wait for a seat)
//! rather than retry identically. A failed operation never leaves partial
//! state behind.

use crate::types::{HolderId, PassId, RouteId};
use thiserror::Error;

/// Errors returned by the allocation engine and its owned stores
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// The referenced route does not exist
    #[error("route not found: {0}")]
    RouteNotFound(RouteId),

    /// The referenced pass does not exist, or is already terminal.
    ///
    /// Cancelled and Expired passes are treated as absent: no operation
    /// transitions out of a terminal state.
    #[error("pass not found: {0}")]
    PassNotFound(PassId),

    /// The holder already has an `Active` or `Waiting` pass
    #[error("holder {0} already has an active or waiting pass")]
    AlreadyReserved(HolderId),

    /// Another route already uses this code (codes are case-insensitive)
    #[error("route code {0:?} is already in use")]
    DuplicateCode(String),

    /// Seating another pass would push occupancy past capacity
    #[error("route {route} is at capacity {capacity}")]
    CapacityExceeded {
        /// The full route
        route: RouteId,
        /// Its configured capacity
        capacity: u32,
    },

    /// A capacity update would fall below the seats already taken
    #[error("capacity {requested} is below current occupancy {occupancy}")]
    CapacityBelowOccupancy {
        /// The capacity the update asked for
        requested: u32,
        /// Seats currently taken
        occupancy: u32,
    },

    /// An occupancy adjustment would take the counter below zero
    #[error("occupancy for route {0} would fall below zero")]
    NegativeOccupancy(RouteId),

    /// Routes must seat at least one pass
    #[error("route capacity must be at least 1")]
    InvalidCapacity,

    /// The route still has seated or waiting passes and cannot be deleted
    #[error("route {0} still has active or waiting passes")]
    RouteOccupied(RouteId),

    /// The restated pass details do not match the pass on record
    #[error("pass details do not match the pass on record")]
    ConfirmationMismatch,

    /// The renewal cutoff date does not exist in every calendar year
    #[error("no such calendar date in every year: month {month}, day {day}")]
    InvalidCutoff {
        /// Requested cutoff month (1-12)
        month: u32,
        /// Requested cutoff day of month
        day: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_referent() {
        let route = RouteId::new();
        let message = AllocationError::RouteNotFound(route).to_string();
        assert!(message.contains(&route.to_string()));

        let message = AllocationError::DuplicateCode("R001".to_string()).to_string();
        assert!(message.contains("R001"));
    }

    #[test]
    fn test_capacity_errors_carry_both_sides() {
        let err = AllocationError::CapacityBelowOccupancy {
            requested: 3,
            occupancy: 7,
        };
        let message = err.to_string();
        assert!(message.contains('3'));
        assert!(message.contains('7'));
    }
}
