use std::sync::Arc;

use uuid::Uuid;

use super::TableRepository;
use crate::clients::TableBackend;
use crate::models::company::{Company, CompanyFilters, CompanySettings, CreateCompanyRequest, UpdateCompanyRequest};
use crate::models::RequestContext;
use crate::utils::errors::AppResult;

#[derive(Clone)]
pub struct CompanyRepository {
    table: TableRepository<Company>,
}

impl CompanyRepository {
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self {
            table: TableRepository::new(backend),
        }
    }

    /// Con tenant en el contexto sólo se ve la company propia
    pub async fn get_all(&self, ctx: &RequestContext, filters: &CompanyFilters) -> AppResult<Vec<Company>> {
        self.table.get_all(ctx, &filters.to_filter_set()).await
    }

    pub async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Company> {
        self.table.get_by_id(ctx, id).await
    }

    /// Company del tenant de la sesión
    pub async fn get_current(&self, ctx: &RequestContext) -> AppResult<Company> {
        let tenant_id = ctx.require_tenant()?;
        self.table.get_by_id(ctx, tenant_id).await
    }

    pub async fn create(&self, ctx: &RequestContext, request: &CreateCompanyRequest) -> AppResult<Company> {
        self.table.create(ctx, request).await
    }

    pub async fn update(&self, ctx: &RequestContext, id: Uuid, request: &UpdateCompanyRequest) -> AppResult<Company> {
        self.table.update(ctx, id, request).await
    }

    /// Sustituir los ajustes de la company del tenant
    pub async fn update_settings(&self, ctx: &RequestContext, settings: CompanySettings) -> AppResult<Company> {
        let tenant_id = ctx.require_tenant()?;
        let request = UpdateCompanyRequest {
            settings: Some(settings),
            ..UpdateCompanyRequest::default()
        };
        self.table.update(ctx, tenant_id, &request).await
    }

    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        self.table.delete(ctx, id).await
    }
}
