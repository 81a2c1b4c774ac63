//! Utilidades JWT
//! 
//! Lectura de los claims del token de sesión que emite la plataforma. El
//! tenant (`company_id`) puede venir como claim propio o dentro de
//! `user_metadata`.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::utils::errors::{AppError, AppResult};

/// Claims del token de sesión
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<Value>,
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
}

impl JwtClaims {
    /// Usuario autenticado
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    /// Tenant del token: claim propio primero, luego `user_metadata.company_id`
    pub fn tenant_id(&self) -> Option<Uuid> {
        self.company_id
            .as_deref()
            .and_then(|id| Uuid::parse_str(id).ok())
            .or_else(|| {
                self.user_metadata
                    .as_ref()
                    .and_then(|meta| meta.get("company_id"))
                    .and_then(Value::as_str)
                    .and_then(|id| Uuid::parse_str(id).ok())
            })
    }
}

/// Generar un token HS256 (lo usa la plataforma en memoria)
pub fn generate_token(
    user_id: Uuid,
    email: Option<&str>,
    company_id: Option<Uuid>,
    secret: &str,
    ttl_seconds: i64,
) -> AppResult<String> {
    let now = chrono::Utc::now();
    let expires_at = now + chrono::Duration::seconds(ttl_seconds);

    let claims = JwtClaims {
        sub: user_id.to_string(),
        email: email.map(str::to_string),
        company_id: company_id.map(|id| id.to_string()),
        role: Some("authenticated".to_string()),
        user_metadata: None,
        exp: expires_at.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    let encoding_key = EncodingKey::from_secret(secret.as_ref());

    encode(&Header::default(), &claims, &encoding_key)
        .map_err(|e| AppError::Unknown(format!("Error generando token: {}", e)))
}

/// Verificar firma y expiración con el secreto de la plataforma
pub fn verify_token(token: &str, secret: &str) -> AppResult<JwtClaims> {
    validate_token_format(token)?;

    let decoding_key = DecodingKey::from_secret(secret.as_ref());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;

    let token_data = decode::<JwtClaims>(token, &decoding_key, &validation)?;
    Ok(token_data.claims)
}

/// Leer los claims sin verificar la firma (cuando no hay secreto configurado).
/// La plataforma sigue validando el token en cada llamada.
pub fn decode_unverified(token: &str) -> AppResult<JwtClaims> {
    validate_token_format(token)?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let token_data = decode::<JwtClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(token_data.claims)
}

/// Leer claims verificando sólo si hay secreto
pub fn read_claims(token: &str, secret: Option<&str>) -> AppResult<JwtClaims> {
    match secret {
        Some(secret) => verify_token(token, secret),
        None => decode_unverified(token),
    }
}

/// Validar formato de token (básico)
pub fn validate_token_format(token: &str) -> AppResult<()> {
    if token.is_empty() {
        return Err(AppError::Unauthorized("Token must not be empty".to_string()));
    }

    if token.split('.').count() != 3 {
        return Err(AppError::Unauthorized("Token must have 3 dot-separated parts".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-with-enough-length";

    #[test]
    fn test_generate_and_verify_token() {
        let user_id = Uuid::new_v4();
        let company_id = Uuid::new_v4();

        let token = generate_token(user_id, Some("ana@fleet.test"), Some(company_id), SECRET, 3600).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();

        assert_eq!(claims.user_id(), Some(user_id));
        assert_eq!(claims.tenant_id(), Some(company_id));
        assert_eq!(claims.email.as_deref(), Some("ana@fleet.test"));
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_wrong_secret_is_unauthorized() {
        let token = generate_token(Uuid::new_v4(), None, None, SECRET, 3600).unwrap();
        assert!(matches!(verify_token(&token, "other-secret"), Err(AppError::Unauthorized(_))));

        // sin secreto se leen los claims igualmente
        let claims = read_claims(&token, None).unwrap();
        assert_eq!(claims.tenant_id(), None);
    }

    #[test]
    fn test_tenant_from_user_metadata() {
        let company_id = Uuid::new_v4();
        let claims = JwtClaims {
            sub: Uuid::new_v4().to_string(),
            email: None,
            company_id: None,
            role: None,
            user_metadata: Some(serde_json::json!({ "company_id": company_id.to_string() })),
            exp: 0,
            iat: 0,
        };
        assert_eq!(claims.tenant_id(), Some(company_id));
    }

    #[test]
    fn test_token_format() {
        assert!(validate_token_format("").is_err());
        assert!(validate_token_format("abc.def").is_err());
        assert!(validate_token_format("a.b.c").is_ok());
    }
}
