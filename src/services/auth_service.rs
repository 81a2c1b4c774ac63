//! Servicio de autenticación
//! 
//! Login, registro y gestión de la sesión sobre la API de auth de la
//! plataforma. Cada sesión se traduce en un `RequestContext` explícito: el
//! tenant sale de los claims del token, después de los metadatos del usuario
//! y, si no, de la tabla `profiles`.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::clients::{AuthProvider, TableBackend};
use crate::models::auth::{
    AuthUser, NewProfile, Profile, Session, SignInRequest, SignUpOutcome, SignUpRequest, UserAttributes, UserRole,
    UserSession,
};
use crate::models::company::{Company, CreateCompanyRequest};
use crate::models::RequestContext;
use crate::repositories::{CompanyRepository, TableRepository};
use crate::utils::errors::{AppError, AppResult};
use crate::utils::jwt::read_claims;

pub struct AuthService {
    auth: Arc<dyn AuthProvider>,
    profiles: TableRepository<Profile>,
    companies: CompanyRepository,
    jwt_secret: Option<String>,
}

impl AuthService {
    pub fn new(auth: Arc<dyn AuthProvider>, backend: Arc<dyn TableBackend>, jwt_secret: Option<String>) -> Self {
        Self {
            auth,
            profiles: TableRepository::new(backend.clone()),
            companies: CompanyRepository::new(backend),
            jwt_secret,
        }
    }

    /// Iniciar sesión y resolver el contexto (tenant + usuario)
    pub async fn sign_in(&self, request: SignInRequest) -> AppResult<UserSession> {
        request.validate()?;

        let session = self
            .auth
            .sign_in_with_password(request.email.trim(), &request.password)
            .await?;

        let user_session = self.user_session(session).await?;
        info!(
            "✅ Sesión iniciada para {} (tenant: {:?})",
            request.email, user_session.context.tenant_id
        );
        Ok(user_session)
    }

    /// Contexto explícito a partir de una sesión de la plataforma
    pub async fn user_session(&self, session: Session) -> AppResult<UserSession> {
        let context = self.resolve_context(&session).await?;
        Ok(UserSession { session, context })
    }

    async fn resolve_context(&self, session: &Session) -> AppResult<RequestContext> {
        let claims = read_claims(&session.access_token, self.jwt_secret.as_deref())?;
        let user_id = claims.user_id().unwrap_or(session.user.id);

        let mut tenant_id = claims.tenant_id().or_else(|| session.user.metadata_company_id());

        if tenant_id.is_none() {
            let lookup = RequestContext::anonymous().with_token(session.access_token.clone());
            tenant_id = match self.profiles.get_by_id(&lookup, user_id).await {
                Ok(profile) => profile.company_id,
                Err(AppError::NotFound(_)) => None,
                Err(error) => return Err(error),
            };
            debug!("👤 Tenant resuelto desde profiles: {:?}", tenant_id);
        }

        Ok(RequestContext {
            tenant_id,
            user_id: Some(user_id),
            access_token: Some(session.access_token.clone()),
        })
    }

    /// Registro con los datos de perfil como metadatos del usuario
    pub async fn sign_up(&self, request: SignUpRequest) -> AppResult<SignUpOutcome> {
        request.validate()?;

        let metadata = serde_json::to_value(&request.profile)?;
        let outcome = self
            .auth
            .sign_up(request.email.trim(), &request.password, metadata)
            .await?;

        if outcome.session.is_none() {
            info!("📧 Registro de {} pendiente de confirmación", request.email);
        }
        Ok(outcome)
    }

    /// Crear la company del usuario recién registrado y su perfil de admin.
    /// Devuelve una sesión renovada cuyo token ya lleva el tenant.
    pub async fn onboard_company(&self, current: &UserSession, request: CreateCompanyRequest) -> AppResult<UserSession> {
        if current.context.tenant_id.is_some() {
            return Err(AppError::Validation("This user already belongs to a company".to_string()));
        }

        let token = current.session.access_token.clone();
        let ctx = RequestContext::anonymous().with_token(token.clone());
        let company: Company = self.companies.create(&ctx, &request).await?;

        let attributes = UserAttributes {
            password: None,
            data: Some(json!({ "company_id": company.id.to_string() })),
        };
        let user = self.auth.update_user(&token, &attributes).await?;

        let profile = admin_profile(&user);
        let tenant_ctx = RequestContext::for_tenant(company.id).with_token(token);
        self.profiles.create(&tenant_ctx, &profile).await?;

        info!("🏢 Company {} creada para {}", company.name, user.id);

        match current.session.refresh_token.as_deref() {
            Some(refresh_token) => self.refresh(refresh_token).await,
            None => {
                warn!("⚠️ Sesión sin refresh token, el tenant sólo va en el contexto");
                let mut session = current.session.clone();
                session.user = user;
                Ok(UserSession {
                    session,
                    context: tenant_ctx.with_user(current.session.user.id),
                })
            }
        }
    }

    pub async fn sign_out(&self, ctx: &RequestContext) -> AppResult<()> {
        let Some(token) = ctx.token() else {
            return Ok(());
        };
        self.auth.sign_out(token).await?;
        info!("👋 Sesión cerrada");
        Ok(())
    }

    pub async fn send_password_reset(&self, email: &str, redirect_to: Option<&str>) -> AppResult<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::Validation("email: must not be empty".to_string()));
        }
        self.auth.send_password_reset(email, redirect_to).await
    }

    pub async fn update_password(&self, ctx: &RequestContext, new_password: &str) -> AppResult<AuthUser> {
        let token = ctx
            .token()
            .ok_or_else(|| AppError::Unauthorized("A session is required to change the password".to_string()))?;

        let attributes = UserAttributes {
            password: Some(new_password.to_string()),
            data: None,
        };
        attributes.validate()?;

        self.auth.update_user(token, &attributes).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> AppResult<UserSession> {
        let session = self.auth.refresh_session(refresh_token).await?;
        self.user_session(session).await
    }
}

fn metadata_text(user: &AuthUser, key: &str) -> Option<String> {
    user.user_metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn admin_profile(user: &AuthUser) -> NewProfile {
    let fallback = user
        .email
        .as_deref()
        .and_then(|email| email.split('@').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("Admin")
        .to_string();

    NewProfile {
        id: user.id,
        first_name: metadata_text(user, "first_name").unwrap_or(fallback),
        last_name: metadata_text(user, "last_name").unwrap_or_else(|| "-".to_string()),
        email: user.email.clone(),
        role: UserRole::Admin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_admin_profile_falls_back_to_email() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some("ops@fleet.test".to_string()),
            user_metadata: json!({ "last_name": "Ruiz" }),
        };
        let profile = admin_profile(&user);

        assert_eq!(profile.first_name, "ops");
        assert_eq!(profile.last_name, "Ruiz");
        assert_eq!(profile.role, UserRole::Admin);
    }
}
