//! Sistema de manejo de errores
//! 
//! Este módulo define la taxonomía de errores que devuelve cada llamada a la
//! plataforma (tablas, auth y storage) y la clasificación de las respuestas HTTP.

use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Errores principales de la aplicación
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Claves donde la plataforma suele dejar el mensaje legible
const MESSAGE_KEYS: &[&str] = &["message", "msg", "error_description", "error", "details", "errors"];

impl AppError {
    /// Código estable del error, útil para logs
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Network(_) => "NETWORK_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Mensaje que se muestra al usuario final (sin prefijo ni código)
    pub fn user_message(&self) -> &str {
        match self {
            AppError::Network(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Unauthorized(msg)
            | AppError::Unknown(msg) => msg,
        }
    }

    /// Clasificar una respuesta no exitosa de la plataforma.
    ///
    /// Primero se mira el código de PostgreSQL/PostgREST del cuerpo y después el
    /// status HTTP.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();

        let message = parsed
            .as_ref()
            .and_then(extract_error_message)
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Unexpected response")
                    .to_string()
            });

        let code = parsed
            .as_ref()
            .and_then(|v| v.get("code"))
            .and_then(|c| match c {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        if let Some(code) = code.as_deref() {
            if code == "42501" {
                return AppError::Unauthorized(message);
            }
            if code == "PGRST116" {
                return AppError::NotFound(message);
            }
            if code.starts_with("23") || code.starts_with("22") {
                return AppError::Validation(message);
            }
        }

        // La API de auth responde 400 a credenciales inválidas
        let auth_code = parsed
            .as_ref()
            .and_then(|v| v.get("error_code").or_else(|| v.get("error")))
            .and_then(Value::as_str);
        if matches!(auth_code, Some("invalid_grant" | "invalid_credentials")) {
            return AppError::Unauthorized(message);
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(message),
            StatusCode::NOT_FOUND => AppError::NotFound(message),
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                AppError::Validation(message)
            }
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                AppError::Network(message)
            }
            _ => AppError::Unknown(message),
        }
    }
}

/// Extraer el primer mensaje legible de una estructura de error (posiblemente anidada)
pub fn extract_error_message(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(map) => MESSAGE_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(extract_error_message),
        Value::Array(items) => items.iter().find_map(extract_error_message),
        _ => None,
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::Unknown(format!("Invalid response body: {}", err))
        } else if let Some(status) = err.status() {
            AppError::from_response(status, "")
        } else {
            AppError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Unknown(format!("Malformed row: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(crate::utils::validation::describe_validation_errors(&errors))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::Unauthorized(format!("Invalid session token: {}", err))
    }
}

/// Función helper para crear errores de validación
pub fn validation_error(field: &str, message: &str) -> AppError {
    AppError::Validation(format!("{}: {}", field, message))
}

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}

/// Función helper para crear errores de sesión sin tenant
pub fn missing_tenant_error() -> AppError {
    AppError::Unauthorized("No company is associated with this session".to_string())
}
