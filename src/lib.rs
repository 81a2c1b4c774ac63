//! Fleet manager
//! 
//! Capa de datos para la gestión de flotas: conductores, vehículos, companies
//! y documentos sobre una plataforma alojada de base de datos, auth y storage.
//! El access layer (`repositories`) traduce cada operación en una llamada de
//! tabla; el binding layer (`services`) cachea las consultas por tenant y
//! filtros y las invalida tras cada mutación.

pub mod cache;
pub mod clients;
pub mod config;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod utils;

pub use models::RequestContext;
pub use state::AppState;
pub use utils::errors::{AppError, AppResult};
