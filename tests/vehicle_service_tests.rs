mod common;

use chrono::Duration as Days;
use serde_json::json;
use uuid::Uuid;

use common::{fleet, today, vehicle_request};
use fleet_manager::clients::Operation;
use fleet_manager::models::vehicle::{UpdateVehicleRequest, VehicleFilters, VehicleStatus};
use fleet_manager::{AppError, RequestContext};

#[tokio::test]
async fn test_status_counts_treat_missing_status_as_available() {
    let fleet = fleet();
    fleet
        .state
        .vehicles
        .create(&fleet.ctx, vehicle_request("1234-ABC", Some(VehicleStatus::Available)))
        .await
        .unwrap();
    fleet
        .state
        .vehicles
        .create(&fleet.ctx, vehicle_request("5678-DEF", None))
        .await
        .unwrap();
    fleet
        .state
        .vehicles
        .create(&fleet.ctx, vehicle_request("9012-GHI", Some(VehicleStatus::Maintenance)))
        .await
        .unwrap();

    let counts = fleet.state.vehicles.status_counts(&fleet.ctx).await.unwrap().unwrap();

    assert_eq!(counts.get(&VehicleStatus::Available), Some(&2));
    assert_eq!(counts.get(&VehicleStatus::Maintenance), Some(&1));
    assert_eq!(counts.get(&VehicleStatus::InUse), None);
}

#[tokio::test]
async fn test_seeded_null_status_reads_as_available() {
    let fleet = fleet();
    let tenant = fleet.ctx.tenant_id.unwrap();
    fleet.platform.seed(
        "vehicles",
        vec![json!({
            "company_id": tenant,
            "make": "Renault",
            "model": "Master",
            "year": 2019,
            "license_plate": "0000-ZZZ",
            "status": null,
        })],
    );

    let vehicles = fleet
        .state
        .vehicles
        .vehicles(&fleet.ctx, &VehicleFilters::default())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(vehicles.len(), 1);
    assert_eq!(vehicles[0].status, None);
    assert_eq!(vehicles[0].effective_status(), VehicleStatus::Available);
}

#[tokio::test]
async fn test_update_status_invalidates_counts() {
    let fleet = fleet();
    let vehicle = fleet
        .state
        .vehicles
        .create(&fleet.ctx, vehicle_request("1234-ABC", None))
        .await
        .unwrap();

    let counts = fleet.state.vehicles.status_counts(&fleet.ctx).await.unwrap().unwrap();
    assert_eq!(counts.get(&VehicleStatus::Available), Some(&1));
    let selects = fleet.platform.call_count(Operation::Select, "vehicles");

    let updated = fleet
        .state
        .vehicles
        .update_status(&fleet.ctx, vehicle.id, VehicleStatus::InUse)
        .await
        .unwrap();
    assert_eq!(updated.status, Some(VehicleStatus::InUse));

    let counts = fleet.state.vehicles.status_counts(&fleet.ctx).await.unwrap().unwrap();
    assert_eq!(counts.get(&VehicleStatus::Available), None);
    assert_eq!(counts.get(&VehicleStatus::InUse), Some(&1));
    assert_eq!(fleet.platform.call_count(Operation::Select, "vehicles"), selects + 1);
}

#[tokio::test]
async fn test_service_due_is_strict_and_ordered() {
    let fleet = fleet();
    for (plate, days) in [("LATE-10", 10), ("SOON-2", 2), ("EDGE-14", 14), ("FAR-60", 60)] {
        let mut request = vehicle_request(plate, None);
        request.next_service_date = Some(today() + Days::days(days));
        fleet.state.vehicles.create(&fleet.ctx, request).await.unwrap();
    }
    fleet
        .state
        .vehicles
        .create(&fleet.ctx, vehicle_request("NONE-0", None))
        .await
        .unwrap();

    let due = fleet
        .state
        .vehicles
        .service_due(&fleet.ctx, 14, today())
        .await
        .unwrap()
        .unwrap();

    let plates: Vec<&str> = due.iter().map(|v| v.license_plate.as_str()).collect();
    assert_eq!(plates, vec!["SOON-2", "LATE-10"]);
}

#[tokio::test]
async fn test_service_window_beyond_calendar_is_validation_error() {
    let fleet = fleet();

    let result = fleet.state.vehicles.service_due(&fleet.ctx, i64::MAX, today()).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(fleet.platform.call_count(Operation::Select, "vehicles"), 0);
}

#[tokio::test]
async fn test_duplicate_plate_is_validation_error() {
    let fleet = fleet();
    fleet
        .state
        .vehicles
        .create(&fleet.ctx, vehicle_request("1234-ABC", None))
        .await
        .unwrap();

    let result = fleet
        .state
        .vehicles
        .create(&fleet.ctx, vehicle_request("1234-ABC", None))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_other_tenant_cannot_see_or_update_vehicle() {
    let fleet = fleet();
    let vehicle = fleet
        .state
        .vehicles
        .create(&fleet.ctx, vehicle_request("1234-ABC", None))
        .await
        .unwrap();

    // Mismo estado de app, otro tenant
    let stranger = RequestContext::for_tenant(Uuid::new_v4());
    let visible = fleet
        .state
        .vehicles
        .vehicles(&stranger, &VehicleFilters::default())
        .await
        .unwrap()
        .unwrap();
    assert!(visible.is_empty());

    let result = fleet
        .state
        .vehicles
        .update(
            &stranger,
            vehicle.id,
            UpdateVehicleRequest {
                model: Some("Sprinter".to_string()),
                ..UpdateVehicleRequest::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}
