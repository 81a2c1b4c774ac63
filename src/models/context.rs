//! Contexto explícito de cada llamada: tenant, usuario y token de sesión.

use uuid::Uuid;

use crate::utils::errors::{missing_tenant_error, AppResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub access_token: Option<String>,
}

impl RequestContext {
    /// Contexto de una sesión con tenant resuelto
    pub fn new(tenant_id: Uuid, access_token: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            user_id: None,
            access_token: Some(access_token.into()),
        }
    }

    /// Sin sesión ni tenant: el binding layer no consulta nada
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Tenant sin token (clave anónima / service role)
    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_token(mut self, access_token: impl Into<String>) -> Self {
        self.access_token = Some(access_token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn require_tenant(&self) -> AppResult<Uuid> {
        self.tenant_id.ok_or_else(missing_tenant_error)
    }
}
