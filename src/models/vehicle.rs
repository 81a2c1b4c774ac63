//! Modelo de Vehicle
//! 
//! Este módulo contiene el struct Vehicle y sus variantes para CRUD operations.
//! Mapea la tabla `vehicles`; un `status` nulo cuenta como `available`.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::query::{window_end, Filter, FilterSet, OrderBy};
use super::Entity;
use crate::utils::errors::AppResult;
use crate::utils::validation::{validate_non_negative_decimal, validate_not_blank, VIN_REGEX};

/// Estado del vehículo
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    #[default]
    Available,
    InUse,
    Maintenance,
    OutOfService,
}

impl VehicleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "available",
            VehicleStatus::InUse => "in_use",
            VehicleStatus::Maintenance => "maintenance",
            VehicleStatus::OutOfService => "out_of_service",
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vehicle principal - fila de la tabla vehicles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vehicle {
    pub id: Uuid,
    pub company_id: Uuid,
    pub make: String,
    pub model: String,
    pub year: i32,
    #[serde(default)]
    pub vin: Option<String>,
    pub license_plate: String,
    #[serde(default)]
    pub status: Option<VehicleStatus>,
    #[serde(default)]
    pub mileage: Option<Decimal>,
    #[serde(default)]
    pub fuel_type: Option<String>,
    #[serde(default)]
    pub last_service_date: Option<NaiveDate>,
    #[serde(default)]
    pub next_service_date: Option<NaiveDate>,
    #[serde(default)]
    pub assigned_driver_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    /// Estado efectivo (nulo → `available`)
    pub fn effective_status(&self) -> VehicleStatus {
        self.status.unwrap_or_default()
    }

    pub fn display_name(&self) -> String {
        format!("{} {} {} ({})", self.year, self.make, self.model, self.license_plate)
    }
}

impl Entity for Vehicle {
    const TABLE: &'static str = "vehicles";
    const RESOURCE: &'static str = "Vehicle";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Request para crear un nuevo vehículo
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateVehicleRequest {
    #[validate(length(min = 2, max = 100), custom = "validate_not_blank")]
    pub make: String,

    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub model: String,

    #[validate(range(min = 1900, max = 2100))]
    pub year: i32,

    #[validate(regex = "VIN_REGEX")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,

    #[validate(length(min = 2, max = 20), custom = "validate_not_blank")]
    pub license_plate: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VehicleStatus>,

    #[validate(custom = "validate_non_negative_decimal")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mileage: Option<Decimal>,

    #[validate(length(min = 2, max = 20))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_service_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_service_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_driver_id: Option<Uuid>,
}

/// Request para actualizar un vehículo existente (merge parcial)
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateVehicleRequest {
    #[validate(length(min = 2, max = 100), custom = "validate_not_blank")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,

    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[validate(range(min = 1900, max = 2100))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    #[validate(regex = "VIN_REGEX")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,

    #[validate(length(min = 2, max = 20), custom = "validate_not_blank")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_plate: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VehicleStatus>,

    #[validate(custom = "validate_non_negative_decimal")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mileage: Option<Decimal>,

    #[validate(length(min = 2, max = 20))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_service_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_service_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_driver_id: Option<Uuid>,
}

impl UpdateVehicleRequest {
    pub fn status(status: VehicleStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Filtros para búsqueda de vehículos
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleFilters {
    pub status: Option<VehicleStatus>,
    pub make: Option<String>,
    pub fuel_type: Option<String>,
    pub assigned_driver_id: Option<Uuid>,
    pub year_from: Option<i32>,
    pub year_to: Option<i32>,
    pub service_due_before: Option<NaiveDate>,
}

impl VehicleFilters {
    /// Vehículos con servicio previsto antes de `today + days`
    pub fn service_due_within(days: i64, today: NaiveDate) -> AppResult<Self> {
        Ok(Self {
            service_due_before: Some(window_end(today, days)?),
            ..Self::default()
        })
    }

    pub fn to_filter_set(&self) -> FilterSet {
        FilterSet::new()
            .with_opt("status", self.status, Filter::eq)
            .with_opt("make", self.make.as_ref(), Filter::eq)
            .with_opt("fuel_type", self.fuel_type.as_ref(), Filter::eq)
            .with_opt("assigned_driver_id", self.assigned_driver_id, Filter::eq)
            .with_opt("year", self.year_from, Filter::gte)
            .with_opt("year", self.year_to, Filter::lte)
            .with_opt("next_service_date", self.service_due_before, Filter::lt)
    }

    pub fn order(&self) -> Option<OrderBy> {
        if self.service_due_before.is_some() {
            Some(OrderBy::asc("next_service_date"))
        } else {
            Vehicle::default_order()
        }
    }
}
