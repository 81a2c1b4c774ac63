//! Servicio de conductores
//! 
//! Binding layer de `drivers`: listados y detalle cacheados por tenant y
//! filtros, conteos y vencimientos de licencia, y mutaciones que invalidan
//! todas las consultas de conductores.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::mutation::MutationState;
use super::resource::{EntityResource, MutationKind};
use crate::cache::{CacheRuntime, QueryCache, QueryKey, QuerySnapshot};
use crate::clients::TableBackend;
use crate::models::driver::{CreateDriverRequest, Driver, DriverFilters, DriverStatus, UpdateDriverRequest};
use crate::models::query::FilterSet;
use crate::models::{Entity, RequestContext};
use crate::repositories::DriverRepository;
use crate::utils::errors::AppResult;

pub struct DriverService {
    repository: DriverRepository,
    resource: EntityResource<Driver>,
    status_counts: Arc<QueryCache<BTreeMap<DriverStatus, usize>>>,
    license_warning_days: i64,
}

impl DriverService {
    pub fn new(backend: Arc<dyn TableBackend>, runtime: &CacheRuntime, license_warning_days: i64) -> Self {
        let mut resource: EntityResource<Driver> = EntityResource::new(runtime);
        let status_counts = resource.derived();

        Self {
            repository: DriverRepository::new(backend),
            resource,
            status_counts,
            license_warning_days,
        }
    }

    pub fn repository(&self) -> &DriverRepository {
        &self.repository
    }

    pub async fn drivers(&self, ctx: &RequestContext, filters: &DriverFilters) -> AppResult<Option<Arc<Vec<Driver>>>> {
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

    pub async fn driver(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Option<Arc<Driver>>> {
        let repository = self.repository.clone();
        let owned_ctx = ctx.clone();

        self.resource
            .detail(ctx, id, move || {
                let repository = repository.clone();
                let ctx = owned_ctx.clone();
                async move { repository.get_by_id(&ctx, id).await }
            })
            .await
    }

    /// Licencias que vencen dentro de la ventana de aviso configurada
    pub async fn expiring_licenses(&self, ctx: &RequestContext) -> AppResult<Option<Arc<Vec<Driver>>>> {
        let today = Utc::now().date_naive();
        self.expiring_licenses_at(ctx, self.license_warning_days, today).await
    }

    pub async fn expiring_licenses_at(
        &self,
        ctx: &RequestContext,
        days: i64,
        today: NaiveDate,
    ) -> AppResult<Option<Arc<Vec<Driver>>>> {
        self.drivers(ctx, &DriverFilters::expiring_within(days, today)?).await
    }

    pub async fn status_counts(&self, ctx: &RequestContext) -> AppResult<Option<Arc<BTreeMap<DriverStatus, usize>>>> {
        let repository = self.repository.clone();
        let owned_ctx = ctx.clone();

        self.resource
            .query(
                &self.status_counts,
                ctx,
                |tenant| QueryKey::scoped(Driver::TABLE, tenant, "status_counts", &FilterSet::new()),
                move || {
                    let repository = repository.clone();
                    let ctx = owned_ctx.clone();
                    async move { repository.status_counts(&ctx).await }
                },
            )
            .await
    }

    pub async fn create(&self, ctx: &RequestContext, request: CreateDriverRequest) -> AppResult<Driver> {
        self.resource
            .mutate(MutationKind::Create, self.repository.create(ctx, &request))
            .await
    }

    pub async fn update(&self, ctx: &RequestContext, id: Uuid, request: UpdateDriverRequest) -> AppResult<Driver> {
        self.resource
            .mutate(MutationKind::Update, async {
                ctx.require_tenant()?;
                self.repository.update(ctx, id, &request).await
            })
            .await
    }

    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        self.resource
            .mutate(MutationKind::Delete, async {
                ctx.require_tenant()?;
                self.repository.delete(ctx, id).await
            })
            .await
    }

    pub fn drivers_snapshot(&self, ctx: &RequestContext, filters: &DriverFilters) -> QuerySnapshot<Vec<Driver>> {
        self.resource.list_snapshot(ctx, &filters.to_filter_set())
    }

    pub fn mutation_state(&self, kind: MutationKind) -> MutationState {
        self.resource.mutation_state(kind)
    }

    pub fn reset_mutation(&self, kind: MutationKind) {
        self.resource.reset_mutation(kind)
    }

    pub async fn refetch_stale(&self) -> usize {
        self.resource.refetch_stale().await
    }

    pub fn clear_cache(&self) {
        self.resource.clear()
    }
}
