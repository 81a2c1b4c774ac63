//! Servicio de companies (tenants)

use std::sync::Arc;

use uuid::Uuid;

use super::mutation::MutationState;
use super::resource::{EntityResource, MutationKind};
use crate::cache::CacheRuntime;
use crate::clients::TableBackend;
use crate::models::company::{Company, CompanyFilters, CompanySettings, CreateCompanyRequest, UpdateCompanyRequest};
use crate::models::RequestContext;
use crate::repositories::CompanyRepository;
use crate::utils::errors::AppResult;

pub struct CompanyService {
    repository: CompanyRepository,
    resource: EntityResource<Company>,
}

impl CompanyService {
    pub fn new(backend: Arc<dyn TableBackend>, runtime: &CacheRuntime) -> Self {
        Self {
            repository: CompanyRepository::new(backend),
            resource: EntityResource::new(runtime),
        }
    }

    pub fn repository(&self) -> &CompanyRepository {
        &self.repository
    }

    /// Company del tenant de la sesión
    pub async fn company(&self, ctx: &RequestContext) -> AppResult<Option<Arc<Company>>> {
        let Some(tenant_id) = ctx.tenant_id else {
            return Ok(None);
        };
        let repository = self.repository.clone();
        let owned_ctx = ctx.clone();

        self.resource
            .detail(ctx, tenant_id, move || {
                let repository = repository.clone();
                let ctx = owned_ctx.clone();
                async move { repository.get_current(&ctx).await }
            })
            .await
    }

    pub async fn companies(&self, ctx: &RequestContext, filters: &CompanyFilters) -> AppResult<Option<Arc<Vec<Company>>>> {
        let repository = self.repository.clone();
        let owned_ctx = ctx.clone();
        let owned_filters = filters.clone();

        self.resource
            .list(ctx, &filters.to_filter_set(), move || {
                let repository = repository.clone();
                let ctx = owned_ctx.clone();
                let filters = owned_filters.clone();
                async move { repository.get_all(&ctx, &filters).await }
            })
            .await
    }

    /// Alta de un tenant nuevo (no requiere tenant en el contexto)
    pub async fn create_company(&self, ctx: &RequestContext, request: CreateCompanyRequest) -> AppResult<Company> {
        self.resource
            .mutate(MutationKind::Create, self.repository.create(ctx, &request))
            .await
    }

    pub async fn update_company(&self, ctx: &RequestContext, id: Uuid, request: UpdateCompanyRequest) -> AppResult<Company> {
        self.resource
            .mutate(MutationKind::Update, async {
                ctx.require_tenant()?;
                self.repository.update(ctx, id, &request).await
            })
            .await
    }

    pub async fn update_settings(&self, ctx: &RequestContext, settings: CompanySettings) -> AppResult<Company> {
        self.resource
            .mutate(MutationKind::Update, self.repository.update_settings(ctx, settings))
            .await
    }

    pub async fn delete_company(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        self.resource
            .mutate(MutationKind::Delete, async {
                ctx.require_tenant()?;
                self.repository.delete(ctx, id).await
            })
            .await
    }

    pub fn mutation_state(&self, kind: MutationKind) -> MutationState {
        self.resource.mutation_state(kind)
    }

    pub fn clear_cache(&self) {
        self.resource.clear()
    }
}
