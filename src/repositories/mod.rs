//! Repositorios - access layer
//! 
//! Operaciones sin estado por entidad: cada llamada traduce filtros, ids y
//! payloads parciales en una operación de tabla de la plataforma.

pub mod company_repository;
pub mod document_repository;
pub mod driver_repository;
pub mod table_repository;
pub mod vehicle_repository;

pub use company_repository::CompanyRepository;
pub use document_repository::DocumentRepository;
pub use driver_repository::DriverRepository;
pub use table_repository::TableRepository;
pub use vehicle_repository::VehicleRepository;
