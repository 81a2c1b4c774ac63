//! Services module
//! 
//! Binding layer: un servicio por entidad con consultas cacheadas por
//! (entidad, tenant, filtros) y mutaciones que invalidan la entidad completa,
//! más el servicio de autenticación.

pub mod auth_service;
pub mod company_service;
pub mod document_service;
pub mod driver_service;
pub mod mutation;
pub mod resource;
pub mod vehicle_service;

pub use auth_service::AuthService;
pub use company_service::CompanyService;
pub use document_service::DocumentService;
pub use driver_service::DriverService;
pub use mutation::{MutationState, MutationTracker};
pub use resource::{EntityResource, MutationKind};
pub use vehicle_service::VehicleService;
