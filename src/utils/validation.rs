//! Utilidades de validación
//! 
//! Este módulo contiene los patrones y validadores custom que usan los
//! payloads de creación y actualización (`validator`).

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use validator::{ValidationError, ValidationErrors, ValidationErrorsKind};

lazy_static! {
    /// VIN de 17 caracteres (sin I, O ni Q)
    pub static ref VIN_REGEX: Regex = Regex::new(r"^[A-HJ-NPR-Z0-9]{17}$").unwrap();

    /// Código de moneda ISO 4217
    pub static ref CURRENCY_REGEX: Regex = Regex::new(r"^[A-Z]{3}$").unwrap();
}

/// Validar que un string no esté vacío
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("not_blank");
        error.message = Some("must not be blank".into());
        return Err(error);
    }
    Ok(())
}

/// Validar que un decimal no sea negativo (kilometraje, capacidades)
pub fn validate_non_negative_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut error = ValidationError::new("non_negative");
        error.add_param("value".into(), &value.to_string());
        error.message = Some("must not be negative".into());
        return Err(error);
    }
    Ok(())
}

/// Validar una zona horaria IANA ("UTC" o "Region/City")
pub fn validate_timezone(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value == "UTC" || (value.contains('/') && !value.starts_with('/') && !value.ends_with('/')) {
        return Ok(());
    }
    let mut error = ValidationError::new("timezone");
    error.add_param("value".into(), &value.to_string());
    error.message = Some("must be an IANA timezone like 'America/Chicago'".into());
    Err(error)
}

/// Validar que un archivo no venga vacío
pub fn validate_not_empty_bytes(value: &[u8]) -> Result<(), ValidationError> {
    if value.is_empty() {
        let mut error = ValidationError::new("not_empty");
        error.message = Some("file content is empty".into());
        return Err(error);
    }
    Ok(())
}

/// Resumir los errores de validación en un mensaje estable: el primer campo en
/// orden alfabético (recorriendo structs anidados) con su mensaje o código.
pub fn describe_validation_errors(errors: &ValidationErrors) -> String {
    let mut fields: Vec<(&str, &ValidationErrorsKind)> =
        errors.errors().iter().map(|(field, kind)| (*field, kind)).collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in fields {
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(error) = list.first() {
                    let detail = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid {}", error.code));
                    return format!("{}: {}", field, detail);
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                return format!("{}.{}", field, describe_validation_errors(inner));
            }
            ValidationErrorsKind::List(items) => {
                if let Some((index, inner)) = items.iter().next() {
                    return format!("{}[{}].{}", field, index, describe_validation_errors(inner));
                }
            }
        }
    }

    "invalid payload".to_string()
}
