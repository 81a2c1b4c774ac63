//! Configuración del proyecto
//! 
//! Variables de entorno de la plataforma y del binding layer.

pub mod environment;

pub use environment::*;
