mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as Days;
use uuid::Uuid;

use common::{driver_request, fleet, fleet_on, today};
use fleet_manager::cache::QueryStatus;
use fleet_manager::clients::{InMemoryPlatform, Operation};
use fleet_manager::models::driver::{DriverFilters, DriverStatus, UpdateDriverRequest};
use fleet_manager::services::{MutationKind, MutationState};
use fleet_manager::{AppError, RequestContext};

#[tokio::test]
async fn test_identical_lists_issue_one_remote_call() {
    let fleet = fleet();
    let filters = DriverFilters::default();

    let first = fleet.state.drivers.drivers(&fleet.ctx, &filters).await.unwrap();
    let second = fleet.state.drivers.drivers(&fleet.ctx, &filters).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(fleet.platform.call_count(Operation::Select, "drivers"), 1);
}

#[tokio::test]
async fn test_concurrent_identical_lists_share_the_request() {
    let fleet = fleet_on(InMemoryPlatform::new().with_latency(Duration::from_millis(20)));
    let filters = DriverFilters::default();

    let (a, b) = tokio::join!(
        fleet.state.drivers.drivers(&fleet.ctx, &filters),
        fleet.state.drivers.drivers(&fleet.ctx, &filters),
    );

    assert!(a.unwrap().is_some());
    assert!(b.unwrap().is_some());
    assert_eq!(fleet.platform.call_count(Operation::Select, "drivers"), 1);
}

#[tokio::test]
async fn test_create_invalidates_and_next_list_contains_row() {
    let fleet = fleet();
    let filters = DriverFilters::default();

    let before = fleet.state.drivers.drivers(&fleet.ctx, &filters).await.unwrap().unwrap();
    assert!(before.is_empty());

    let created = fleet
        .state
        .drivers
        .create(&fleet.ctx, driver_request("LIC-001", today() + Days::days(200)))
        .await
        .unwrap();
    assert_eq!(created.status, DriverStatus::Active);
    assert!(created.updated_at >= created.created_at);
    assert_eq!(fleet.state.drivers.mutation_state(MutationKind::Create), MutationState::Success);

    let snapshot = fleet.state.drivers.drivers_snapshot(&fleet.ctx, &filters);
    assert!(snapshot.is_stale);

    let after = fleet.state.drivers.drivers(&fleet.ctx, &filters).await.unwrap().unwrap();
    assert_eq!(fleet.platform.call_count(Operation::Select, "drivers"), 2);
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, created.id);
}

#[tokio::test]
async fn test_update_missing_id_is_not_found_and_keeps_cache() {
    let fleet = fleet();
    let filters = DriverFilters::default();
    fleet
        .state
        .drivers
        .create(&fleet.ctx, driver_request("LIC-001", today() + Days::days(200)))
        .await
        .unwrap();
    let cached = fleet.state.drivers.drivers(&fleet.ctx, &filters).await.unwrap().unwrap();

    let result = fleet
        .state
        .drivers
        .update(
            &fleet.ctx,
            Uuid::new_v4(),
            UpdateDriverRequest {
                phone: Some("+34 600 000 000".to_string()),
                ..UpdateDriverRequest::default()
            },
        )
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(matches!(
        fleet.state.drivers.mutation_state(MutationKind::Update),
        MutationState::Error(AppError::NotFound(_))
    ));

    let snapshot = fleet.state.drivers.drivers_snapshot(&fleet.ctx, &filters);
    assert!(!snapshot.is_stale);
    assert_eq!(snapshot.data, Some(cached));
}

#[tokio::test]
async fn test_delete_then_list_omits_row() {
    let fleet = fleet();
    let keep = fleet
        .state
        .drivers
        .create(&fleet.ctx, driver_request("LIC-001", today() + Days::days(200)))
        .await
        .unwrap();
    let gone = fleet
        .state
        .drivers
        .create(&fleet.ctx, driver_request("LIC-002", today() + Days::days(200)))
        .await
        .unwrap();

    fleet.state.drivers.delete(&fleet.ctx, gone.id).await.unwrap();
    // Borrar dos veces no es un error
    fleet.state.drivers.delete(&fleet.ctx, gone.id).await.unwrap();

    let drivers = fleet
        .state
        .drivers
        .drivers(&fleet.ctx, &DriverFilters::default())
        .await
        .unwrap()
        .unwrap();
    let ids: Vec<Uuid> = drivers.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![keep.id]);
}

#[tokio::test]
async fn test_expiring_licenses_exclude_exactly_thirty_days() {
    let fleet = fleet();
    for (license, days) in [("AT-30", 30), ("IN-29", 29), ("IN-0", 0), ("OUT-90", 90)] {
        fleet
            .state
            .drivers
            .create(&fleet.ctx, driver_request(license, today() + Days::days(days)))
            .await
            .unwrap();
    }

    let expiring = fleet
        .state
        .drivers
        .expiring_licenses_at(&fleet.ctx, 30, today())
        .await
        .unwrap()
        .unwrap();

    let licenses: Vec<&str> = expiring.iter().map(|d| d.license_number.as_str()).collect();
    assert_eq!(licenses, vec!["IN-0", "IN-29"]);
}

#[tokio::test]
async fn test_expiry_window_beyond_calendar_is_validation_error() {
    let fleet = fleet();

    let result = fleet
        .state
        .drivers
        .expiring_licenses_at(&fleet.ctx, 1_000_000_000, today())
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(fleet.platform.call_count(Operation::Select, "drivers"), 0);
}

#[tokio::test]
async fn test_status_counts_refresh_after_update() {
    let fleet = fleet();
    let driver = fleet
        .state
        .drivers
        .create(&fleet.ctx, driver_request("LIC-001", today() + Days::days(200)))
        .await
        .unwrap();

    let counts = fleet.state.drivers.status_counts(&fleet.ctx).await.unwrap().unwrap();
    assert_eq!(counts.get(&DriverStatus::Active), Some(&1));

    fleet
        .state
        .drivers
        .update(
            &fleet.ctx,
            driver.id,
            UpdateDriverRequest {
                status: Some(DriverStatus::OnLeave),
                ..UpdateDriverRequest::default()
            },
        )
        .await
        .unwrap();

    let counts = fleet.state.drivers.status_counts(&fleet.ctx).await.unwrap().unwrap();
    assert_eq!(counts.get(&DriverStatus::Active), None);
    assert_eq!(counts.get(&DriverStatus::OnLeave), Some(&1));
}

#[tokio::test]
async fn test_without_tenant_nothing_is_fetched() {
    let fleet = fleet();
    let anonymous = RequestContext::anonymous();

    let drivers = fleet.state.drivers.drivers(&anonymous, &DriverFilters::default()).await.unwrap();
    let counts = fleet.state.drivers.status_counts(&anonymous).await.unwrap();

    assert!(drivers.is_none());
    assert!(counts.is_none());
    assert_eq!(fleet.platform.call_count(Operation::Select, "drivers"), 0);
    assert_eq!(
        fleet.state.drivers.drivers_snapshot(&anonymous, &DriverFilters::default()).status,
        QueryStatus::Idle
    );
}

#[tokio::test]
async fn test_concurrent_updates_last_settled_write_wins() {
    let fleet = fleet_on(InMemoryPlatform::new());
    let driver = fleet
        .state
        .drivers
        .create(&fleet.ctx, driver_request("LIC-001", today() + Days::days(200)))
        .await
        .unwrap();

    let phone = |p: &str| UpdateDriverRequest {
        phone: Some(p.to_string()),
        ..UpdateDriverRequest::default()
    };
    let drivers = Arc::clone(&fleet.state.drivers);
    let ctx = fleet.ctx.clone();

    let (first, second) = tokio::join!(
        drivers.update(&ctx, driver.id, phone("+34 111 111 111")),
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            drivers.update(&ctx, driver.id, phone("+34 222 222 222")).await
        }
    );
    first.unwrap();
    let last = second.unwrap();

    let read = drivers.driver(&ctx, driver.id).await.unwrap().unwrap();
    assert_eq!(read.phone, last.phone);
    assert_eq!(read.phone.as_deref(), Some("+34 222 222 222"));
    assert_eq!(read.first_name, driver.first_name);
}

#[tokio::test]
async fn test_failed_fetch_exposes_error_state() {
    let fleet = fleet();
    let filters = DriverFilters::default();
    fleet
        .platform
        .fail_next(Operation::Select, "drivers", AppError::Network("connection reset".to_string()));

    let result = fleet.state.drivers.drivers(&fleet.ctx, &filters).await;
    assert!(matches!(result, Err(AppError::Network(_))));
    let snapshot = fleet.state.drivers.drivers_snapshot(&fleet.ctx, &filters);
    assert_eq!(snapshot.status, QueryStatus::Error);

    let retried = fleet.state.drivers.drivers(&fleet.ctx, &filters).await.unwrap();
    assert!(retried.is_some());
    assert_eq!(
        fleet.state.drivers.drivers_snapshot(&fleet.ctx, &filters).status,
        QueryStatus::Success
    );
}

#[tokio::test]
async fn test_invalid_payload_is_rejected_locally() {
    let fleet = fleet();
    let mut request = driver_request("LIC-001", today());
    request.first_name = "   ".to_string();

    let result = fleet.state.drivers.create(&fleet.ctx, request).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(fleet.platform.call_count(Operation::Insert, "drivers"), 0);
}
