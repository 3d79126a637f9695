//! Domain types for the allocation engine.
//!
//! Routes are finite-capacity resource pools; passes are reservations
//! admitted against them. A pass is either seated (`Active`), queued
//! (`Waiting`), or in a terminal state (`Cancelled`, `Expired`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a route
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteId(Uuid);

impl RouteId {
    /// Creates a new random `RouteId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `RouteId` from a UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RouteId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RouteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PassId(Uuid);

impl PassId {
    /// Creates a new random `PassId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `PassId` from a UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PassId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of a pass holder, supplied by the identity provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HolderId(Uuid);

impl HolderId {
    /// Creates a new random `HolderId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a `HolderId` from a UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for HolderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money
// ============================================================================

/// Money amount in paise (avoids floating point issues)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Creates a new `Money` amount from paise
    #[must_use]
    pub const fn from_paise(paise: u64) -> Self {
        Self(paise)
    }

    /// Creates a `Money` amount from whole rupees
    #[must_use]
    pub const fn from_rupees(rupees: u64) -> Self {
        Self(rupees * 100)
    }

    /// Returns the amount in paise
    #[must_use]
    pub const fn paise(&self) -> u64 {
        self.0
    }

    /// Checks if this amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "₹{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Routes
// ============================================================================

/// A finite-capacity resource pool that passes are admitted against
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Unique route identifier
    pub id: RouteId,

    /// Short human-facing label, unique across routes (case-insensitive)
    pub code: String,

    /// Descriptive route name
    pub name: String,

    /// Price quoted to applicants
    pub price: Money,

    /// Maximum number of seated passes
    pub capacity: u32,

    /// Number of passes currently seated.
    ///
    /// Writable only through the registry's occupancy choke point; always
    /// equals the number of `Active` passes on this route once an engine
    /// operation has completed.
    pub occupancy: u32,
}

impl Route {
    /// Checks whether at least one seat is free
    #[must_use]
    pub const fn has_vacancy(&self) -> bool {
        self.occupancy < self.capacity
    }

    /// Number of free seats
    #[must_use]
    pub const fn remaining_seats(&self) -> u32 {
        self.capacity.saturating_sub(self.occupancy)
    }
}

/// Fields required to create a route
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRoute {
    /// Short human-facing label, unique across routes (case-insensitive)
    pub code: String,

    /// Descriptive route name
    pub name: String,

    /// Price quoted to applicants
    pub price: Money,

    /// Maximum number of seated passes, at least 1
    pub capacity: u32,
}

impl NewRoute {
    /// Creates a new route definition
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>, price: Money, capacity: u32) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            price,
            capacity,
        }
    }
}

/// Partial update for a route; absent fields are left unchanged
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePatch {
    /// New route code, checked for collisions case-insensitively
    pub code: Option<String>,

    /// New route name
    pub name: Option<String>,

    /// New price; refreshes the quote on `Waiting` passes only
    pub price: Option<Money>,

    /// New capacity; must not fall below current occupancy
    pub capacity: Option<u32>,
}

impl RoutePatch {
    /// Creates an empty patch
    #[must_use]
    pub const fn new() -> Self {
        Self {
            code: None,
            name: None,
            price: None,
            capacity: None,
        }
    }

    /// Sets a new route code
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets a new route name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets a new price
    #[must_use]
    pub const fn with_price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }

    /// Sets a new capacity
    #[must_use]
    pub const fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Checks whether the patch changes anything at all
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.code.is_none() && self.name.is_none() && self.price.is_none() && self.capacity.is_none()
    }

    /// Checks whether the patch touches fields denormalized onto passes
    #[must_use]
    pub const fn touches_pass_fields(&self) -> bool {
        self.code.is_some() || self.name.is_some() || self.price.is_some()
    }
}

// ============================================================================
// Passes
// ============================================================================

/// Lifecycle state of a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassState {
    /// Admitted and holding a seat
    Active,

    /// Queued for the next free seat on its route
    Waiting,

    /// Released by the holder or an administrator; terminal
    Cancelled,

    /// Validity window elapsed; terminal
    Expired,
}

impl PassState {
    /// Checks whether this state is terminal (no transitions leave it)
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Expired)
    }

    /// Checks whether the pass holds a seat
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Checks whether the pass is queued
    #[must_use]
    pub const fn is_waiting(self) -> bool {
        matches!(self, Self::Waiting)
    }
}

impl std::fmt::Display for PassState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Waiting => write!(f, "waiting"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Holder details carried on a pass.
///
/// Opaque to the engine: copied through unchanged, never interpreted beyond
/// the cancellation confirmation check and display names in notices.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderProfile {
    /// Given name
    pub first_name: String,

    /// Middle name, may be empty
    pub middle_name: String,

    /// Family name
    pub last_name: String,

    /// Guardian's name
    pub guardian_name: String,

    /// Institutional roll number
    pub roll_number: String,

    /// Branch or department
    pub branch: String,

    /// Year of study
    pub study_year: String,

    /// Blood group
    pub blood_group: String,

    /// Holder's mobile number
    pub mobile: String,

    /// Guardian's mobile number
    pub guardian_mobile: String,

    /// Residential address
    pub residential_address: String,

    /// Permanent address
    pub permanent_address: String,

    /// Reference to an uploaded photo, if any
    pub photo_url: Option<String>,
}

impl HolderProfile {
    /// Full display name, skipping empty name parts
    #[must_use]
    pub fn full_name(&self) -> String {
        [&self.first_name, &self.middle_name, &self.last_name]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A reservation for a seat on a route
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pass {
    /// Unique pass identifier
    pub id: PassId,

    /// The holder this pass belongs to
    pub holder: HolderId,

    /// The route currently assigned
    pub route: RouteId,

    /// Denormalized route code, kept consistent with the assigned route
    pub route_code: String,

    /// Denormalized route name, kept consistent with the assigned route
    pub route_name: String,

    /// Quoted price. Frozen once the pass is `Active`; refreshed on route
    /// price changes while `Waiting`.
    pub price: Money,

    /// Current lifecycle state
    pub state: PassState,

    /// Creation timestamp; the FIFO ordering key for waitlists. Never
    /// changes, including across renewals.
    pub created_at: DateTime<Utc>,

    /// End of the validity window, set on admission and refreshed on renewal
    pub valid_until: DateTime<Utc>,

    /// Holder details, copied through unchanged
    pub profile: HolderProfile,
}

impl Pass {
    /// Checks whether the pass is `Active` or `Waiting`
    #[must_use]
    pub const fn is_non_terminal(&self) -> bool {
        !self.state.is_terminal()
    }
}

// ============================================================================
// Operation inputs
// ============================================================================

/// A request for a new pass
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    /// Requesting holder, supplied by the identity provider
    pub holder: HolderId,

    /// Target route
    pub route: RouteId,

    /// Holder details to carry on the pass
    pub profile: HolderProfile,
}

impl Application {
    /// Creates a new application
    #[must_use]
    pub const fn new(holder: HolderId, route: RouteId, profile: HolderProfile) -> Self {
        Self {
            holder,
            route,
            profile,
        }
    }
}

/// Optional changes accompanying a renewal
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renewal {
    /// Move the pass to this route; `None` renews in place
    pub route: Option<RouteId>,

    /// Replace the holder details carried on the pass
    pub profile: Option<HolderProfile>,
}

impl Renewal {
    /// Creates an in-place renewal with no changes
    #[must_use]
    pub const fn new() -> Self {
        Self {
            route: None,
            profile: None,
        }
    }

    /// Requests reassignment to another route
    #[must_use]
    pub const fn with_route(mut self, route: RouteId) -> Self {
        self.route = Some(route);
        self
    }

    /// Replaces the holder details
    #[must_use]
    pub fn with_profile(mut self, profile: HolderProfile) -> Self {
        self.profile = Some(profile);
        self
    }
}

/// Details a holder must restate to voluntarily cancel a pass.
///
/// All three fields must match the pass on record; administrative removal
/// does not require them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationProof {
    /// Roll number on the pass profile
    pub roll_number: String,

    /// Code of the route the pass is assigned to
    pub route_code: String,

    /// Holder's mobile number on the pass profile
    pub mobile: String,
}

impl CancellationProof {
    /// Creates a cancellation confirmation
    #[must_use]
    pub fn new(
        roll_number: impl Into<String>,
        route_code: impl Into<String>,
        mobile: impl Into<String>,
    ) -> Self {
        Self {
            roll_number: roll_number.into(),
            route_code: route_code.into(),
            mobile: mobile.into(),
        }
    }
}

// ============================================================================
// Notices
// ============================================================================

/// Informational events emitted by engine operations.
///
/// Notices are fire-and-forget: the notification sink consumes them, but
/// delivery is never transactional with the state change that produced them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    /// An application or renewal landed on a route's waitlist
    Waitlisted {
        /// The queued pass
        pass: PassId,
        /// The full route
        route: RouteId,
        /// Position in the waitlist, starting at 1
        position: usize,
    },

    /// A waiting pass was moved into a freed seat
    Promoted {
        /// The promoted pass
        pass: PassId,
        /// The route it now holds a seat on
        route: RouteId,
        /// The holder of the promoted pass
        holder: HolderId,
        /// Display name for the notification sink
        holder_name: String,
    },

    /// A route's waitlist grew past the configured alert threshold
    WaitlistPressure {
        /// The route under pressure
        route: RouteId,
        /// Route code for display
        route_code: String,
        /// Current waitlist length
        waiting: usize,
    },

    /// A pass lapsed during an expiry sweep
    Expired {
        /// The expired pass
        pass: PassId,
        /// The route it referenced
        route: RouteId,
    },
}

/// Notices produced by a single engine operation.
///
/// Most operations emit zero or one notice; a release that triggers a
/// promotion emits a couple, so the list stays inline in the common case.
pub type Notices = SmallVec<[Notice; 4]>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(RouteId::new(), RouteId::new());
        assert_ne!(PassId::new(), PassId::new());
        assert_ne!(HolderId::new(), HolderId::new());
    }

    #[test]
    fn test_id_display_matches_uuid() {
        let id = RouteId::new();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
    }

    #[test]
    fn test_money_from_rupees() {
        let price = Money::from_rupees(5000);
        assert_eq!(price.paise(), 500_000);
        assert!(!price.is_zero());
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_paise(450_050).to_string(), "₹4500.50");
        assert_eq!(Money::from_paise(5).to_string(), "₹0.05");
    }

    #[test]
    fn test_pass_state_terminality() {
        assert!(!PassState::Active.is_terminal());
        assert!(!PassState::Waiting.is_terminal());
        assert!(PassState::Cancelled.is_terminal());
        assert!(PassState::Expired.is_terminal());
    }

    #[test]
    fn test_pass_state_display() {
        assert_eq!(PassState::Waiting.to_string(), "waiting");
        assert_eq!(PassState::Expired.to_string(), "expired");
    }

    #[test]
    fn test_full_name_skips_empty_parts() {
        let profile = HolderProfile {
            first_name: "Asha".to_string(),
            last_name: "Verma".to_string(),
            ..HolderProfile::default()
        };
        assert_eq!(profile.full_name(), "Asha Verma");

        let with_middle = HolderProfile {
            middle_name: "K".to_string(),
            ..profile
        };
        assert_eq!(with_middle.full_name(), "Asha K Verma");
    }

    #[test]
    fn test_route_vacancy() {
        let route = Route {
            id: RouteId::new(),
            code: "R001".to_string(),
            name: "North Campus Route".to_string(),
            price: Money::from_rupees(5000),
            capacity: 2,
            occupancy: 1,
        };
        assert!(route.has_vacancy());
        assert_eq!(route.remaining_seats(), 1);

        let full = Route {
            occupancy: 2,
            ..route
        };
        assert!(!full.has_vacancy());
        assert_eq!(full.remaining_seats(), 0);
    }

    #[test]
    fn test_route_patch_builders() {
        let patch = RoutePatch::new()
            .with_code("R009")
            .with_price(Money::from_rupees(4800));
        assert!(!patch.is_empty());
        assert!(patch.touches_pass_fields());
        assert_eq!(patch.name, None);
        assert_eq!(patch.capacity, None);

        let capacity_only = RoutePatch::new().with_capacity(60);
        assert!(!capacity_only.touches_pass_fields());
        assert!(RoutePatch::new().is_empty());
    }
}
