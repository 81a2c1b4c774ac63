use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use super::TableRepository;
use crate::clients::TableBackend;
use crate::models::query::FilterSet;
use crate::models::vehicle::{CreateVehicleRequest, UpdateVehicleRequest, Vehicle, VehicleFilters, VehicleStatus};
use crate::models::RequestContext;
use crate::utils::errors::AppResult;

#[derive(Clone)]
pub struct VehicleRepository {
    table: TableRepository<Vehicle>,
}

impl VehicleRepository {
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self {
            table: TableRepository::new(backend),
        }
    }

    pub async fn get_all(&self, ctx: &RequestContext, filters: &VehicleFilters) -> AppResult<Vec<Vehicle>> {
        self.table
            .get_all_ordered(ctx, &filters.to_filter_set(), filters.order())
            .await
    }

    pub async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Vehicle> {
        self.table.get_by_id(ctx, id).await
    }

    pub async fn create(&self, ctx: &RequestContext, request: &CreateVehicleRequest) -> AppResult<Vehicle> {
        self.table.create(ctx, request).await
    }

    pub async fn update(&self, ctx: &RequestContext, id: Uuid, request: &UpdateVehicleRequest) -> AppResult<Vehicle> {
        self.table.update(ctx, id, request).await
    }

    /// Cambio de estado como update parcial de una sola columna
    pub async fn update_status(&self, ctx: &RequestContext, id: Uuid, status: VehicleStatus) -> AppResult<Vehicle> {
        self.table.update(ctx, id, &UpdateVehicleRequest::status(status)).await
    }

    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        self.table.delete(ctx, id).await
    }

    /// Conteo por estado (estado nulo = disponible), calculado en local
    pub async fn status_counts(&self, ctx: &RequestContext) -> AppResult<BTreeMap<VehicleStatus, usize>> {
        let vehicles = self.table.get_all(ctx, &FilterSet::new()).await?;
        Ok(count_by_status(&vehicles))
    }
}

pub fn count_by_status(vehicles: &[Vehicle]) -> BTreeMap<VehicleStatus, usize> {
    let mut counts = BTreeMap::new();
    for vehicle in vehicles {
        *counts.entry(vehicle.effective_status()).or_insert(0) += 1;
    }
    counts
}
