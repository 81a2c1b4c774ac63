//! Modelos del sistema
//! 
//! Este módulo contiene los registros que devuelve la plataforma (una forma
//! canónica por entidad), los payloads de creación/actualización y los filtros.

pub mod auth;
pub mod company;
pub mod context;
pub mod document;
pub mod driver;
pub mod query;
pub mod vehicle;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use query::OrderBy;

pub use context::RequestContext;

/// Registro de una tabla remota con tenant
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Tabla en la plataforma
    const TABLE: &'static str;

    /// Nombre legible para mensajes de error
    const RESOURCE: &'static str;

    /// Columna que acota por tenant
    const TENANT_COLUMN: &'static str = "company_id";

    /// La entidad es el propio tenant (la columna de tenant es su id)
    const IS_TENANT_ROOT: bool = false;

    fn id(&self) -> Uuid;

    fn default_order() -> Option<OrderBy> {
        Some(OrderBy::desc("created_at"))
    }
}

/// `null` en la fila se trata como el valor por defecto
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
