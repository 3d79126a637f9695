//! # Ridepass Testing
//!
//! Testing utilities and fixtures for the ridepass allocation engine.
//!
//! This crate provides:
//! - Deterministic clocks for driving admission and expiry timelines
//! - Fixture builders for routes, profiles, and pre-filled engines
//! - Property-based testing strategies for domain types and op sequences
//! - A fluent Given-When-Then harness for engine operations
//!
//! ## Example
//!
//! ```ignore
//! use ridepass_testing::{helpers, test_clock, EngineTest};
//! use std::sync::Arc;
//!
//! let (mut engine, routes) = helpers::campus_engine(Arc::new(test_clock()));
//! let passes = helpers::fill_route(&mut engine, routes[0].id, 51);
//! let seated = passes[0].id;
//!
//! EngineTest::new()
//!     .given(engine)
//!     .when(move |engine| engine.release(seated))
//!     .then_notices(|notices| {
//!         assert_eq!(notices.len(), 1); // the 51st applicant takes the seat
//!     })
//!     .run();
//! ```

use chrono::{DateTime, Duration, Utc};
use ridepass_core::Clock;


/// Deterministic clock implementations.
///
/// The engine reads time through the [`Clock`] trait, so tests pin or steer
/// it: [`FixedClock`] for single-instant tests, [`AdjustableClock`] when a
/// scenario spans a renewal cutoff.
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use std::sync::{Mutex, MutexGuard, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use ridepass_testing::mocks::FixedClock;
    /// use ridepass_core::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that tests move forward explicitly.
    ///
    /// Expiry scenarios apply in one renewal cycle, then advance past the
    /// cutoff and sweep. Shared through an `Arc`, so the handle the test
    /// keeps steers the clock the engine reads.
    #[derive(Debug)]
    pub struct AdjustableClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl AdjustableClock {
        /// Create a clock starting at the given instant
        #[must_use]
        pub const fn new(start: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(start),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, delta: Duration) {
            *self.lock() += delta;
        }

        /// Jump the clock to an absolute instant
        pub fn set(&self, now: DateTime<Utc>) {
            *self.lock() = now;
        }

        fn lock(&self) -> MutexGuard<'_, DateTime<Utc>> {
            self.now.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl Clock for AdjustableClock {
        fn now(&self) -> DateTime<Utc> {
            *self.lock()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Create an adjustable clock starting at the default test instant
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn adjustable_test_clock() -> AdjustableClock {
        AdjustableClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Fixture builders for routes, profiles, and pre-filled engines.
pub mod helpers {
    use super::Clock;
    use ridepass_core::{
        AllocationEngine, Application, HolderId, HolderProfile, Money, NewRoute, Pass, Route,
        RouteId,
    };
    use std::sync::Arc;

    /// The four campus routes used across the test suite
    #[must_use]
    pub fn campus_routes() -> Vec<NewRoute> {
        vec![
            NewRoute::new("R001", "North Campus Route", Money::from_rupees(5000), 50),
            NewRoute::new("R002", "South Campus Route", Money::from_rupees(4500), 50),
            NewRoute::new("R003", "East Campus Route", Money::from_rupees(5500), 50),
            NewRoute::new("R004", "West Campus Route", Money::from_rupees(4000), 50),
        ]
    }

    /// A filled-in applicant profile
    #[must_use]
    pub fn student_profile(first_name: &str, roll_number: &str) -> HolderProfile {
        HolderProfile {
            first_name: first_name.to_string(),
            last_name: "Sharma".to_string(),
            guardian_name: "R. Sharma".to_string(),
            roll_number: roll_number.to_string(),
            branch: "Computer Science".to_string(),
            study_year: "2".to_string(),
            blood_group: "B+".to_string(),
            mobile: "9876543210".to_string(),
            guardian_mobile: "9876500000".to_string(),
            residential_address: "12 College Hostel, Block A".to_string(),
            permanent_address: "44 MG Road".to_string(),
            ..HolderProfile::default()
        }
    }

    /// A fresh engine with the four campus routes created, in code order
    ///
    /// # Panics
    ///
    /// Panics if any fixture route is rejected, which indicates a bug in
    /// the fixtures themselves.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn campus_engine(clock: Arc<dyn Clock>) -> (AllocationEngine, Vec<Route>) {
        let mut engine = AllocationEngine::new(clock);
        let routes = campus_routes()
            .into_iter()
            .map(|details| {
                engine
                    .create_route(details)
                    .expect("fixture routes should be valid")
            })
            .collect();
        (engine, routes)
    }

    /// Applies `count` distinct holders to the route and returns their
    /// passes in application order.
    ///
    /// # Panics
    ///
    /// Panics if any application is rejected.
    #[allow(clippy::expect_used)]
    pub fn fill_route(engine: &mut AllocationEngine, route: RouteId, count: usize) -> Vec<Pass> {
        (0..count)
            .map(|index| {
                let name = format!("Holder{index}");
                let roll = format!("CS-{index:04}");
                engine
                    .apply(Application::new(
                        HolderId::new(),
                        route,
                        student_profile(&name, &roll),
                    ))
                    .expect("fixture application should be admitted or waitlisted")
                    .0
            })
            .collect()
    }
}

/// Property-based testing strategies using proptest.
pub mod properties {
    use proptest::prelude::*;
    use ridepass_core::{HolderProfile, Money};

    /// Strategy for prices up to ₹10,000
    pub fn arb_money() -> impl Strategy<Value = Money> {
        (0u64..=1_000_000).prop_map(Money::from_paise)
    }

    /// Strategy for seat capacities in the fleet's realistic range
    pub fn arb_capacity() -> impl Strategy<Value = u32> {
        1u32..=60
    }

    /// Strategy for applicant profiles
    pub fn arb_profile() -> impl Strategy<Value = HolderProfile> {
        ("[A-Z][a-z]{2,8}", "[A-Z][a-z]{2,8}", "[A-Z]{2}-[0-9]{4}", "9[0-9]{9}").prop_map(
            |(first_name, last_name, roll_number, mobile)| HolderProfile {
                first_name,
                last_name,
                roll_number,
                mobile,
                ..HolderProfile::default()
            },
        )
    }

    /// One step in a generated operation sequence.
    ///
    /// Holder and route values are raw indices; the property test maps them
    /// into its pools modulo the pool size, so every generated value is
    /// meaningful.
    #[derive(Clone, Debug)]
    pub enum EngineOp {
        /// Apply for a pass as the indexed holder
        Apply {
            /// Index into the holder pool
            holder: usize,
        },
        /// Release the indexed holder's live pass, if any
        Release {
            /// Index into the holder pool
            holder: usize,
        },
        /// Renew the indexed holder's live pass, possibly onto another route
        Renew {
            /// Index into the holder pool
            holder: usize,
            /// Renew onto the next route over instead of in place
            cross_route: bool,
        },
        /// Attempt an explicit promotion on the indexed route
        Promote {
            /// Index into the route pool
            route: usize,
        },
        /// Move the clock forward
        AdvanceDays {
            /// Days to advance
            days: u16,
        },
        /// Run the expiry sweep
        ExpireLapsed,
    }

    /// Strategy for operation sequences of at most `len` steps
    pub fn arb_ops(len: usize) -> impl Strategy<Value = Vec<EngineOp>> {
        let op = prop_oneof![
            3 => (0usize..32).prop_map(|holder| EngineOp::Apply { holder }),
            2 => (0usize..32).prop_map(|holder| EngineOp::Release { holder }),
            2 => ((0usize..32), any::<bool>())
                .prop_map(|(holder, cross_route)| EngineOp::Renew { holder, cross_route }),
            1 => (0usize..8).prop_map(|route| EngineOp::Promote { route }),
            1 => (1u16..240).prop_map(|days| EngineOp::AdvanceDays { days }),
            1 => Just(EngineOp::ExpireLapsed),
        ];
        prop::collection::vec(op, 0..len)
    }
}

// Re-export commonly used items
pub use engine_test::EngineTest;
pub use mocks::{AdjustableClock, FixedClock, adjustable_test_clock, test_clock};
