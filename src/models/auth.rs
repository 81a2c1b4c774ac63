//! Modelos de autenticación
//! 
//! Sesiones y usuarios tal como los devuelve la API de auth de la plataforma,
//! más el perfil (`profiles`) que enlaza un usuario con su company.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use super::{Entity, RequestContext};
use crate::utils::validation::validate_not_blank;

/// Usuario de auth
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
}

impl AuthUser {
    /// Tenant guardado en los metadatos del usuario
    pub fn metadata_company_id(&self) -> Option<Uuid> {
        self.user_metadata
            .get("company_id")
            .and_then(Value::as_str)
            .and_then(|id| Uuid::parse_str(id).ok())
    }
}

/// Sesión autenticada
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Resultado del registro: con confirmación por e-mail no hay sesión todavía
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<Session>,
}

/// Sesión más el contexto explícito que usan las demás llamadas
#[derive(Debug, Clone, PartialEq)]
pub struct UserSession {
    pub session: Session,
    pub context: RequestContext,
}

/// Request de login
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1))]
    pub password: String,
}

/// Datos de perfil que acompañan al registro
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignUpProfile {
    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub first_name: String,

    #[validate(length(min = 1, max = 100), custom = "validate_not_blank")]
    pub last_name: String,

    #[validate(length(min = 7, max = 20))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<Uuid>,
}

/// Request de registro
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 8, max = 72))]
    pub password: String,

    #[validate]
    pub profile: SignUpProfile,
}

/// Cambios sobre el usuario de auth
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UserAttributes {
    #[validate(length(min = 8, max = 72))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Rol del usuario dentro de su company
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Manager,
    #[default]
    Dispatcher,
}

/// Perfil - fila de la tabla profiles (id = id del usuario de auth)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub company_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Profile {
    const TABLE: &'static str = "profiles";
    const RESOURCE: &'static str = "Profile";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Fila de perfil a insertar (el id lo fija el usuario de auth)
#[derive(Debug, Clone, Serialize, Validate)]
pub struct NewProfile {
    pub id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_from_platform_payload() {
        let company_id = Uuid::new_v4();
        let session: Session = serde_json::from_value(json!({
            "access_token": "a.b.c",
            "refresh_token": "r1",
            "expires_in": 3600,
            "user": {
                "id": Uuid::new_v4(),
                "email": "ana@fleet.test",
                "user_metadata": { "company_id": company_id.to_string() }
            }
        }))
        .unwrap();

        assert_eq!(session.token_type, "bearer");
        assert_eq!(session.user.metadata_company_id(), Some(company_id));
    }

    #[test]
    fn test_sign_up_validation_is_nested() {
        let request = SignUpRequest {
            email: "ana@fleet.test".to_string(),
            password: "short".to_string(),
            profile: SignUpProfile {
                first_name: "".to_string(),
                last_name: "Ruiz".to_string(),
                phone: None,
                company_id: None,
            },
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.errors().contains_key("password"));
        assert!(errors.errors().contains_key("profile"));
    }
}
