//! Utilidades del sistema
//! 
//! Este módulo contiene utilidades para manejo de errores, validación
//! y lectura de tokens JWT.

pub mod errors;
pub mod jwt;
pub mod validation;
