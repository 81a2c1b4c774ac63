//! Modelo de Company
//! 
//! Este módulo contiene el struct Company (el tenant) y sus variantes para CRUD
//! operations. El `id` de la company es el tenant id que acota todas las demás tablas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::query::{Filter, FilterSet, OrderBy};
use super::{null_as_default, Entity};
use crate::utils::validation::{validate_not_blank, validate_timezone, CURRENCY_REGEX};

/// Unidad de distancia preferida
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    #[default]
    Miles,
    Kilometers,
}

/// Unidad de combustible preferida
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FuelUnit {
    #[default]
    Gallons,
    Liters,
}

/// Preferencias de la company (columna JSON `settings`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(default)]
pub struct CompanySettings {
    #[validate(custom = "validate_timezone")]
    pub timezone: String,

    #[validate(regex = "CURRENCY_REGEX")]
    pub currency: String,

    pub distance_unit: DistanceUnit,

    pub fuel_unit: FuelUnit,
}

impl Default for CompanySettings {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            currency: "USD".to_string(),
            distance_unit: DistanceUnit::default(),
            fuel_unit: FuelUnit::default(),
        }
    }
}

/// Company principal - fila de la tabla companies
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub settings: CompanySettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Company {
    const TABLE: &'static str = "companies";
    const RESOURCE: &'static str = "Company";
    const TENANT_COLUMN: &'static str = "id";
    const IS_TENANT_ROOT: bool = true;

    fn id(&self) -> Uuid {
        self.id
    }

    fn default_order() -> Option<OrderBy> {
        Some(OrderBy::asc("name"))
    }
}

/// Request para crear una nueva company
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCompanyRequest {
    #[validate(length(min = 2, max = 255), custom = "validate_not_blank")]
    pub name: String,

    #[validate(email)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[validate(length(min = 7, max = 20))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[validate(length(max = 500))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[validate]
    pub settings: CompanySettings,
}

impl CreateCompanyRequest {
    /// Company mínima con preferencias por defecto
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            phone: None,
            address: None,
            city: None,
            state: None,
            postal_code: None,
            country: None,
            settings: CompanySettings::default(),
        }
    }
}

/// Request para actualizar una company existente (merge parcial)
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateCompanyRequest {
    #[validate(length(min = 2, max = 255), custom = "validate_not_blank")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[validate(email)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[validate(length(min = 7, max = 20))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[validate(length(max = 500))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[validate]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<CompanySettings>,
}

/// Filtros para búsqueda de companies
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyFilters {
    pub name: Option<String>,
    pub country: Option<String>,
}

impl CompanyFilters {
    pub fn to_filter_set(&self) -> FilterSet {
        FilterSet::new()
            .with_opt("name", self.name.as_ref(), |name| Filter::ilike(name.clone()))
            .with_opt("country", self.country.as_ref(), Filter::eq)
    }
}
