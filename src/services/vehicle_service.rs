//! Servicio de vehículos
//! 
//! Binding layer de `vehicles`.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use super::mutation::MutationState;
use super::resource::{EntityResource, MutationKind};
use crate::cache::{CacheRuntime, QueryCache, QueryKey, QuerySnapshot};
use crate::clients::TableBackend;
use crate::models::query::FilterSet;
use crate::models::vehicle::{CreateVehicleRequest, UpdateVehicleRequest, Vehicle, VehicleFilters, VehicleStatus};
use crate::models::{Entity, RequestContext};
use crate::repositories::VehicleRepository;
use crate::utils::errors::AppResult;

pub struct VehicleService {
    repository: VehicleRepository,
    resource: EntityResource<Vehicle>,
    status_counts: Arc<QueryCache<BTreeMap<VehicleStatus, usize>>>,
}

impl VehicleService {
    pub fn new(backend: Arc<dyn TableBackend>, runtime: &CacheRuntime) -> Self {
        let mut resource: EntityResource<Vehicle> = EntityResource::new(runtime);
        let status_counts = resource.derived();

        Self {
            repository: VehicleRepository::new(backend),
            resource,
            status_counts,
        }
    }

    pub fn repository(&self) -> &VehicleRepository {
        &self.repository
    }

    pub async fn vehicles(&self, ctx: &RequestContext, filters: &VehicleFilters) -> AppResult<Option<Arc<Vec<Vehicle>>>> {
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

    pub async fn vehicle(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Option<Arc<Vehicle>>> {
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

    /// Vehículos con servicio previsto antes de `today + days`
    pub async fn service_due(&self, ctx: &RequestContext, days: i64, today: NaiveDate) -> AppResult<Option<Arc<Vec<Vehicle>>>> {
        self.vehicles(ctx, &VehicleFilters::service_due_within(days, today)?).await
    }

    pub async fn status_counts(&self, ctx: &RequestContext) -> AppResult<Option<Arc<BTreeMap<VehicleStatus, usize>>>> {
        let repository = self.repository.clone();
        let owned_ctx = ctx.clone();

        self.resource
            .query(
                &self.status_counts,
                ctx,
                |tenant| QueryKey::scoped(Vehicle::TABLE, tenant, "status_counts", &FilterSet::new()),
                move || {
                    let repository = repository.clone();
                    let ctx = owned_ctx.clone();
                    async move { repository.status_counts(&ctx).await }
                },
            )
            .await
    }

    pub async fn create(&self, ctx: &RequestContext, request: CreateVehicleRequest) -> AppResult<Vehicle> {
        self.resource
            .mutate(MutationKind::Create, self.repository.create(ctx, &request))
            .await
    }

    pub async fn update(&self, ctx: &RequestContext, id: Uuid, request: UpdateVehicleRequest) -> AppResult<Vehicle> {
        self.resource
            .mutate(MutationKind::Update, async {
                ctx.require_tenant()?;
                self.repository.update(ctx, id, &request).await
            })
            .await
    }

    pub async fn update_status(&self, ctx: &RequestContext, id: Uuid, status: VehicleStatus) -> AppResult<Vehicle> {
        self.resource
            .mutate(MutationKind::Update, async {
                ctx.require_tenant()?;
                self.repository.update_status(ctx, id, status).await
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

    pub fn vehicles_snapshot(&self, ctx: &RequestContext, filters: &VehicleFilters) -> QuerySnapshot<Vec<Vehicle>> {
        self.resource.list_snapshot(ctx, &filters.to_filter_set())
    }

    pub fn mutation_state(&self, kind: MutationKind) -> MutationState {
        self.resource.mutation_state(kind)
    }

    pub async fn refetch_stale(&self) -> usize {
        self.resource.refetch_stale().await
    }

    pub fn clear_cache(&self) {
        self.resource.clear()
    }
}
