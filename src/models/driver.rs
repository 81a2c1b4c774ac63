//! Modelo de Driver
//! 
//! Este módulo contiene el struct Driver y sus variantes para CRUD operations.
//! Mapea la tabla `drivers`; `id`, `created_at` y `updated_at` los asigna la plataforma.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::query::{window_end, Filter, FilterSet, OrderBy};
use super::{null_as_default, Entity};
use crate::utils::errors::AppResult;
use crate::utils::validation::validate_not_blank;

/// Estado laboral del conductor
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    #[default]
    Active,
    Inactive,
    OnLeave,
    Terminated,
}

impl DriverStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverStatus::Active => "active",
            DriverStatus::Inactive => "inactive",
            DriverStatus::OnLeave => "on_leave",
            DriverStatus::Terminated => "terminated",
        }
    }
}

impl fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Driver principal - fila de la tabla drivers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Driver {
    pub id: Uuid,
    pub company_id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub license_number: String,
    #[serde(default)]
    pub license_class: Option<String>,
    pub license_expiry: NaiveDate,
    #[serde(default)]
    pub hire_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: DriverStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Driver {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Entity for Driver {
    const TABLE: &'static str = "drivers";
    const RESOURCE: &'static str = "Driver";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Request para crear un nuevo conductor
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateDriverRequest {
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub first_name: String,

    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub last_name: String,

    #[validate(email)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[validate(length(min = 7, max = 20))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[validate(length(min = 4, max = 30), custom = "validate_not_blank")]
    pub license_number: String,

    #[validate(length(min = 1, max = 10))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_class: Option<String>,

    pub license_expiry: NaiveDate,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hire_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DriverStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

/// Request para actualizar un conductor existente (merge parcial)
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateDriverRequest {
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[validate(email)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[validate(length(min = 7, max = 20))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[validate(length(min = 4, max = 30), custom = "validate_not_blank")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,

    #[validate(length(min = 1, max = 10))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_class: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_expiry: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hire_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DriverStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

/// Filtros para búsqueda de conductores
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriverFilters {
    pub status: Option<DriverStatus>,
    pub license_class: Option<String>,
    /// Busca por apellido (`*` como comodín)
    pub last_name: Option<String>,
    pub user_id: Option<Uuid>,
    pub license_expiring_before: Option<NaiveDate>,
}

impl DriverFilters {
    /// Conductores cuya licencia vence antes de `today + days`
    pub fn expiring_within(days: i64, today: NaiveDate) -> AppResult<Self> {
        Ok(Self {
            license_expiring_before: Some(window_end(today, days)?),
            ..Self::default()
        })
    }

    pub fn to_filter_set(&self) -> FilterSet {
        FilterSet::new()
            .with_opt("status", self.status, Filter::eq)
            .with_opt("license_class", self.license_class.as_ref(), Filter::eq)
            .with_opt("last_name", self.last_name.as_ref(), |name| Filter::ilike(name.clone()))
            .with_opt("user_id", self.user_id, Filter::eq)
            .with_opt("license_expiry", self.license_expiring_before, Filter::lt)
    }

    /// Orden natural para la consulta de vencimientos
    pub fn order(&self) -> Option<OrderBy> {
        if self.license_expiring_before.is_some() {
            Some(OrderBy::asc("license_expiry"))
        } else {
            Driver::default_order()
        }
    }
}
