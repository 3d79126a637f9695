//! Integration tests for concurrent access to the engine store
//!
//! Tests validate that the write lock serializes allocation, so capacity is
//! never oversold and the occupancy books stay balanced no matter how many
//! tasks mutate the store at once.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use ridepass_core::{
    AllocationEngine, Application, HolderId, Money, NewRoute, PassState, Snapshot,
};
use ridepass_runtime::EngineStore;
use ridepass_testing::helpers::{campus_engine, fill_route, student_profile};
use ridepass_testing::test_clock;
use std::sync::Arc;

// ============================================================================
// Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn empty_store() -> EngineStore {
    EngineStore::new(AllocationEngine::new(Arc::new(test_clock())))
}

/// Asserts that every route's occupancy matches its seated passes, stays
/// within capacity, and that no route has a free seat while holders wait.
fn assert_books_balanced(snapshot: &Snapshot) {
    for route in snapshot.routes.values() {
        let seated = snapshot
            .passes
            .values()
            .filter(|pass| pass.route == route.id && pass.state == PassState::Active)
            .count();
        let waiting = snapshot
            .passes
            .values()
            .filter(|pass| pass.route == route.id && pass.state == PassState::Waiting)
            .count();

        assert_eq!(
            route.occupancy as usize, seated,
            "occupancy counter diverged from seated passes on {}",
            route.code
        );
        assert!(
            route.occupancy <= route.capacity,
            "route {} oversold: {}/{}",
            route.code,
            route.occupancy,
            route.capacity
        );
        if route.occupancy < route.capacity {
            assert_eq!(
                waiting, 0,
                "route {} has free seats but {} holders waiting",
                route.code, waiting
            );
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_applications_never_oversell_capacity() {
    init_tracing();
    let store = empty_store();
    let route = store
        .create_route(NewRoute::new(
            "R001",
            "North Campus Route",
            Money::from_rupees(5000),
            5,
        ))
        .await
        .unwrap();

    let handles: Vec<_> = (0..30)
        .map(|index| {
            let store = store.clone();
            let route_id = route.id;
            tokio::spawn(async move {
                let roll = format!("21BCE{index:03}");
                store
                    .apply(Application::new(
                        HolderId::new(),
                        route_id,
                        student_profile("Holder", &roll),
                    ))
                    .await
            })
        })
        .collect();

    let mut seated = 0;
    let mut waitlisted = 0;
    for joined in futures::future::join_all(handles).await {
        let (pass, _) = joined.unwrap().unwrap();
        match pass.state {
            PassState::Active => seated += 1,
            PassState::Waiting => waitlisted += 1,
            other => panic!("unexpected pass state {other}"),
        }
    }

    assert_eq!(seated, 5);
    assert_eq!(waitlisted, 25);

    let route = store.route(route.id).await.unwrap();
    assert_eq!(route.occupancy, 5);
    assert_eq!(store.waitlist(route.id).await.len(), 25);
    assert_books_balanced(&store.snapshot().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn releases_and_applications_interleave_without_losing_seats() {
    let clock = Arc::new(test_clock());
    let mut engine = AllocationEngine::new(clock);
    let route = engine
        .create_route(NewRoute::new(
            "R002",
            "South Campus Route",
            Money::from_rupees(4500),
            10,
        ))
        .unwrap();
    // 10 seated, 10 waiting.
    let passes = fill_route(&mut engine, route.id, 20);
    let store = EngineStore::new(engine);

    let mut handles = Vec::new();
    for pass in passes.iter().take(10) {
        let store = store.clone();
        let id = pass.id;
        handles.push(tokio::spawn(async move { store.release(id).await.map(|_| ()) }));
    }
    for index in 0..5 {
        let store = store.clone();
        let route_id = route.id;
        handles.push(tokio::spawn(async move {
            let roll = format!("22BCE{index:03}");
            store
                .apply(Application::new(
                    HolderId::new(),
                    route_id,
                    student_profile("Late", &roll),
                ))
                .await
                .map(|_| ())
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // 25 passes issued, 10 cancelled. The 15 live ones fill all 10 seats
    // and leave 5 waiting, regardless of interleaving.
    let snapshot = store.snapshot().await;
    assert_books_balanced(&snapshot);
    assert_eq!(store.pass_count().await, 25);
    assert_eq!(store.route(route.id).await.unwrap().occupancy, 10);
    assert_eq!(store.waiting_total().await, 5);
    let cancelled = snapshot
        .passes
        .values()
        .filter(|pass| pass.state == PassState::Cancelled)
        .count();
    assert_eq!(cancelled, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_fleet_traffic_keeps_every_route_balanced() {
    let (mut engine, routes) = campus_engine(Arc::new(test_clock()));
    // Shrink the fleet to force contention.
    let seeded: Vec<_> = routes
        .iter()
        .map(|route| {
            let patch = ridepass_core::RoutePatch::new().with_capacity(3);
            engine.update_route(route.id, &patch).unwrap()
        })
        .collect();
    let store = EngineStore::new(engine);

    let handles: Vec<_> = (0..40)
        .map(|index| {
            let store = store.clone();
            let route_id = seeded[index % seeded.len()].id;
            tokio::spawn(async move {
                let roll = format!("23BCE{index:03}");
                let holder = HolderId::new();
                let (pass, _) = store
                    .apply(Application::new(
                        holder,
                        route_id,
                        student_profile("Mixed", &roll),
                    ))
                    .await
                    .unwrap();
                // Every third holder changes their mind immediately.
                if index % 3 == 0 {
                    store.release(pass.id).await.unwrap();
                }
            })
        })
        .collect();
    for joined in futures::future::join_all(handles).await {
        joined.unwrap();
    }

    let snapshot = store.snapshot().await;
    assert_books_balanced(&snapshot);
    assert_eq!(snapshot.pass_count(), 40);
}

#[tokio::test]
async fn clones_share_one_engine() {
    let (engine, routes) = campus_engine(Arc::new(test_clock()));
    let store = EngineStore::new(engine);
    let clone = store.clone();

    clone
        .apply(Application::new(
            HolderId::new(),
            routes[0].id,
            student_profile("Shared", "21BCE777"),
        ))
        .await
        .unwrap();

    assert_eq!(store.pass_count().await, 1);
    assert_eq!(store.route(routes[0].id).await.unwrap().occupancy, 1);
}
