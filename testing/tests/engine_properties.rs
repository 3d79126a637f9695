//! Property tests for the allocation engine's bookkeeping invariants.
//!
//! Randomized operation sequences run against a small fleet, and the books
//! are checked after every step:
//! - occupancy equals the number of `Active` passes, within capacity
//! - no holder ever has two live passes
//! - waitlists stay in application order

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use chrono::Duration;
use proptest::prelude::*;
use ridepass_core::{
    AllocationEngine, Application, HolderId, Money, NewRoute, Notice, PassState, Renewal, RouteId,
};
use ridepass_testing::AdjustableClock;
use ridepass_testing::engine_test::assertions::assert_occupancy_consistent;
use ridepass_testing::helpers;
use ridepass_testing::mocks::adjustable_test_clock;
use ridepass_testing::properties::{EngineOp, arb_ops};
use std::sync::Arc;

const HOLDER_POOL: usize = 12;

/// Four small routes so sequences actually hit the waitlist paths.
fn small_fleet(engine: &mut AllocationEngine) -> Vec<RouteId> {
    [
        ("R001", "North Campus Route", 5000u64, 2u32),
        ("R002", "South Campus Route", 4500, 2),
        ("R003", "East Campus Route", 5500, 2),
        ("R004", "West Campus Route", 4000, 1),
    ]
    .into_iter()
    .map(|(code, name, rupees, capacity)| {
        engine
            .create_route(NewRoute::new(code, name, Money::from_rupees(rupees), capacity))
            .unwrap()
            .id
    })
    .collect()
}

/// Executes one generated step. Duplicate applications are expected noise;
/// every other operation must succeed, which is itself part of the property.
fn run_op(
    engine: &mut AllocationEngine,
    clock: &AdjustableClock,
    holders: &[HolderId],
    routes: &[RouteId],
    op: &EngineOp,
) {
    match *op {
        EngineOp::Apply { holder } => {
            let index = holder % holders.len();
            let roll = format!("PB-{index:04}");
            // Distinct timestamps keep the application order unambiguous.
            clock.advance(Duration::seconds(1));
            let _ = engine.apply(Application::new(
                holders[index],
                routes[index % routes.len()],
                helpers::student_profile("Prop", &roll),
            ));
        }
        EngineOp::Release { holder } => {
            if let Some(pass) = engine.pass_for_holder(holders[holder % holders.len()]) {
                engine.release(pass.id).unwrap();
            }
        }
        EngineOp::Renew {
            holder,
            cross_route,
        } => {
            if let Some(pass) = engine.pass_for_holder(holders[holder % holders.len()]) {
                let renewal = if cross_route {
                    let current = routes.iter().position(|&r| r == pass.route).unwrap_or(0);
                    Renewal::new().with_route(routes[(current + 1) % routes.len()])
                } else {
                    Renewal::new()
                };
                engine.renew(pass.id, renewal).unwrap();
            }
        }
        EngineOp::Promote { route } => {
            engine.promote(routes[route % routes.len()]).unwrap();
        }
        EngineOp::AdvanceDays { days } => {
            clock.advance(Duration::days(i64::from(days)));
        }
        EngineOp::ExpireLapsed => {
            engine.expire_lapsed().unwrap();
        }
    }
}

fn check_books(engine: &AllocationEngine, holders: &[HolderId]) {
    assert_occupancy_consistent(engine);

    for &holder in holders {
        let live: usize = engine
            .routes()
            .iter()
            .map(|route| {
                let active = engine.passes_on_route(route.id, PassState::Active);
                let waiting = engine.passes_on_route(route.id, PassState::Waiting);
                active
                    .iter()
                    .chain(waiting.iter())
                    .filter(|pass| pass.holder == holder)
                    .count()
            })
            .sum();
        assert!(live <= 1, "holder {holder} has {live} live passes");
    }

    for route in engine.routes() {
        let waitlist = engine.waitlist(route.id);
        let mut expected = waitlist.clone();
        expected.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        assert_eq!(waitlist, expected, "waitlist out of order on {}", route.code);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: No sequence of operations unbalances the books.
    #[test]
    fn prop_books_stay_balanced(ops in arb_ops(40)) {
        let clock = Arc::new(adjustable_test_clock());
        let mut engine = AllocationEngine::new(clock.clone());
        let routes = small_fleet(&mut engine);
        let holders: Vec<HolderId> = (0..HOLDER_POOL).map(|_| HolderId::new()).collect();

        for op in &ops {
            run_op(&mut engine, &clock, &holders, &routes, op);
            check_books(&engine, &holders);
        }
    }

    /// Property: Seats freed one at a time promote waiters in exactly the
    /// order they applied.
    #[test]
    fn prop_promotion_follows_application_order(waiters in 2usize..10) {
        let clock = Arc::new(adjustable_test_clock());
        let mut engine = AllocationEngine::new(clock.clone());
        let route = engine
            .create_route(NewRoute::new("R001", "North Campus Route", Money::from_rupees(5000), 1))
            .unwrap()
            .id;

        let mut applied = Vec::new();
        for index in 0..=waiters {
            clock.advance(Duration::seconds(1));
            let name = format!("Holder{index}");
            let roll = format!("CS-{index:04}");
            let (pass, _) = engine
                .apply(Application::new(
                    HolderId::new(),
                    route,
                    helpers::student_profile(&name, &roll),
                ))
                .unwrap();
            applied.push(pass.id);
        }

        let mut promotions = Vec::new();
        for index in 0..waiters {
            let notices = engine.release(applied[index]).unwrap();
            match notices.as_slice() {
                [Notice::Promoted { pass, .. }] => promotions.push(*pass),
                other => prop_assert!(false, "expected exactly one promotion, got {other:?}"),
            }
        }
        prop_assert_eq!(promotions, applied[1..].to_vec());
    }

    /// Property: A snapshot taken after any history restores losslessly.
    #[test]
    fn prop_snapshot_survives_any_history(ops in arb_ops(30)) {
        let clock = Arc::new(adjustable_test_clock());
        let mut engine = AllocationEngine::new(clock.clone());
        let routes = small_fleet(&mut engine);
        let holders: Vec<HolderId> = (0..HOLDER_POOL).map(|_| HolderId::new()).collect();

        for op in &ops {
            run_op(&mut engine, &clock, &holders, &routes, op);
        }

        let snapshot = engine.snapshot();
        let restored = AllocationEngine::from_snapshot(snapshot.clone(), engine.config(), clock.clone());
        prop_assert_eq!(restored.snapshot(), snapshot);
    }
}
