//! Campus Demo - A morning at the transport office
//!
//! Walks the full pass lifecycle against a live store: route setup,
//! applications spilling onto a waitlist, a cancellation that promotes the
//! oldest waiter, a cross-route renewal, a capacity bump, and finally
//! snapshot persistence plus a metrics dump.
//!
//! # Running the Example
//!
//! ```bash
//! cargo run -p campus-demo
//! ```

#![allow(missing_docs)]
#![allow(clippy::expect_used)] // Examples can use expect

use ridepass_core::{
    AllocationEngine, Application, CancellationProof, EngineConfig, HolderId, HolderProfile, Money,
    NewRoute, Notice, Renewal, RoutePatch, SystemClock,
};
use ridepass_runtime::EngineStore;
use ridepass_runtime::metrics::MetricsServer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn student(first_name: &str, roll_number: &str, mobile: &str) -> HolderProfile {
    HolderProfile {
        first_name: first_name.to_string(),
        last_name: "Nair".to_string(),
        guardian_name: "K. Nair".to_string(),
        roll_number: roll_number.to_string(),
        branch: "Mechanical Engineering".to_string(),
        study_year: "3".to_string(),
        blood_group: "O+".to_string(),
        mobile: mobile.to_string(),
        guardian_mobile: "9400000000".to_string(),
        residential_address: "Hostel Block C, Room 214".to_string(),
        permanent_address: "7 Beach Road, Kochi".to_string(),
        ..HolderProfile::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_demo=info,ridepass_runtime=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Campus Demo");

    // 2. Install the Prometheus recorder
    let addr: std::net::SocketAddr = "127.0.0.1:9090".parse()?;
    let mut metrics_server = MetricsServer::new(addr);
    metrics_server.start()?;

    // 3. Create the store
    let store = EngineStore::new(AllocationEngine::new(Arc::new(SystemClock)));
    tracing::info!("Store initialized");

    // 4. Print every notice the engine emits
    let mut notices = store.subscribe();
    let listener = tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(Notice::Waitlisted { position, .. }) => {
                    tracing::info!(position, "NOTICE: applicant joined the waitlist");
                }
                Ok(Notice::Promoted { holder_name, .. }) => {
                    tracing::info!(%holder_name, "NOTICE: seat assigned from waitlist");
                }
                Ok(Notice::WaitlistPressure {
                    route_code,
                    waiting,
                    ..
                }) => {
                    tracing::warn!(%route_code, waiting, "NOTICE: waitlist pressure");
                }
                Ok(Notice::Expired { pass, .. }) => {
                    tracing::info!(%pass, "NOTICE: pass expired");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notice listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // 5. Register the campus routes (demo-sized capacities)
    let north = store
        .create_route(NewRoute::new(
            "R001",
            "North Campus Route",
            Money::from_rupees(5000),
            3,
        ))
        .await?;
    let south = store
        .create_route(NewRoute::new(
            "R002",
            "South Campus Route",
            Money::from_rupees(4500),
            2,
        ))
        .await?;
    for route in store.routes().await {
        tracing::info!(code = %route.code, fare = %route.price, seats = route.capacity, "route open");
    }

    // 6. Six students apply for the three north seats
    let applicants = [
        ("Asha", "21ME101", "9400000101"),
        ("Bilal", "21ME102", "9400000102"),
        ("Chitra", "21ME103", "9400000103"),
        ("Dev", "21ME104", "9400000104"),
        ("Esha", "21ME105", "9400000105"),
        ("Farid", "21ME106", "9400000106"),
    ];
    let mut passes = Vec::new();
    for (name, roll, mobile) in applicants {
        let (pass, _) = store
            .apply(Application::new(
                HolderId::new(),
                north.id,
                student(name, roll, mobile),
            ))
            .await?;
        tracing::info!(
            holder = %pass.profile.full_name(),
            state = %pass.state,
            valid_until = %pass.valid_until,
            "application settled"
        );
        passes.push(pass);
    }

    // 7. Asha cancels, which hands her seat to Dev (the oldest waiter)
    let asha = &passes[0];
    store
        .cancel(
            asha.id,
            CancellationProof::new("21ME101", &asha.route_code, "9400000101"),
        )
        .await?;

    // 8. Esha gives up on the north route and renews onto the south one
    let esha = &passes[4];
    let (moved, _) = store
        .renew(esha.id, Renewal::new().with_route(south.id))
        .await?;
    tracing::info!(
        holder = %moved.profile.full_name(),
        route = %moved.route_code,
        state = %moved.state,
        "renewal settled"
    );

    // 9. A bigger bus arrives for the north route
    store
        .update_route(north.id, RoutePatch::new().with_capacity(5))
        .await?;
    while let Some((promoted, _)) = store.promote(north.id).await? {
        tracing::info!(holder = %promoted.profile.full_name(), "backfilled after capacity bump");
    }

    // 10. Expiry sweep (nothing lapses mid-season)
    let (expired, _) = store.expire_lapsed().await?;
    tracing::info!(count = expired.len(), "expiry sweep complete");

    // 11. Health and occupancy summary
    let health = store.health().await;
    tracing::info!(status = %health.status, "health check");
    for route in store.routes().await {
        tracing::info!(
            code = %route.code,
            occupancy = route.occupancy,
            capacity = route.capacity,
            waiting = store.waitlist(route.id).await.len(),
            "route summary"
        );
    }

    // 12. Persist the books and restore them
    let path = std::env::temp_dir().join("campus-demo-books.json");
    store.save_snapshot(&path).await?;
    let restored =
        EngineStore::load_snapshot(&path, EngineConfig::default(), Arc::new(SystemClock)).await?;
    tracing::info!(
        passes = restored.pass_count().await,
        routes = restored.route_count().await,
        "books restored from snapshot"
    );

    // 13. Dump the recorded metrics
    if let Some(rendered) = metrics_server.render() {
        tracing::info!("--- Prometheus metrics ---\n{rendered}");
    }

    // Give the listener a moment to drain, then stop it.
    tokio::time::sleep(Duration::from_millis(100)).await;
    listener.abort();

    tracing::info!("Campus Demo complete");
    Ok(())
}
