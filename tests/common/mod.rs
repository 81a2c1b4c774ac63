#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use fleet_manager::clients::InMemoryPlatform;
use fleet_manager::models::driver::CreateDriverRequest;
use fleet_manager::models::vehicle::{CreateVehicleRequest, VehicleStatus};
use fleet_manager::{AppState, RequestContext};

pub struct TestFleet {
    pub platform: Arc<InMemoryPlatform>,
    pub state: AppState,
    pub ctx: RequestContext,
}

/// Plataforma en memoria, estado de la app y un tenant listo para usar
pub fn fleet() -> TestFleet {
    fleet_on(InMemoryPlatform::new())
}

pub fn fleet_on(platform: InMemoryPlatform) -> TestFleet {
    let platform = Arc::new(platform);
    let state = AppState::in_memory(platform.clone()).expect("app state");
    TestFleet {
        platform,
        state,
        ctx: RequestContext::for_tenant(Uuid::new_v4()),
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

pub fn driver_request(license_number: &str, license_expiry: NaiveDate) -> CreateDriverRequest {
    CreateDriverRequest {
        first_name: "Lucía".to_string(),
        last_name: "Martín".to_string(),
        email: Some(format!("{}@fleet.test", license_number.to_lowercase())),
        phone: None,
        license_number: license_number.to_string(),
        license_class: Some("C".to_string()),
        license_expiry,
        hire_date: None,
        status: None,
        user_id: None,
    }
}

pub fn vehicle_request(plate: &str, status: Option<VehicleStatus>) -> CreateVehicleRequest {
    CreateVehicleRequest {
        make: "Iveco".to_string(),
        model: "Daily".to_string(),
        year: 2022,
        vin: None,
        license_plate: plate.to_string(),
        status,
        mileage: None,
        fuel_type: Some("diesel".to_string()),
        last_service_date: None,
        next_service_date: None,
        assigned_driver_id: None,
    }
}
