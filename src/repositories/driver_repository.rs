use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;

use super::TableRepository;
use crate::clients::TableBackend;
use crate::models::driver::{CreateDriverRequest, Driver, DriverFilters, DriverStatus, UpdateDriverRequest};
use crate::models::query::FilterSet;
use crate::models::RequestContext;
use crate::utils::errors::AppResult;

#[derive(Clone)]
pub struct DriverRepository {
    table: TableRepository<Driver>,
}

impl DriverRepository {
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self {
            table: TableRepository::new(backend),
        }
    }

    pub async fn get_all(&self, ctx: &RequestContext, filters: &DriverFilters) -> AppResult<Vec<Driver>> {
        self.table
            .get_all_ordered(ctx, &filters.to_filter_set(), filters.order())
            .await
    }

    pub async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Driver> {
        self.table.get_by_id(ctx, id).await
    }

    pub async fn create(&self, ctx: &RequestContext, request: &CreateDriverRequest) -> AppResult<Driver> {
        self.table.create(ctx, request).await
    }

    pub async fn update(&self, ctx: &RequestContext, id: Uuid, request: &UpdateDriverRequest) -> AppResult<Driver> {
        self.table.update(ctx, id, request).await
    }

    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        self.table.delete(ctx, id).await
    }

    /// Conteo por estado, calculado tras traer los conductores
    pub async fn status_counts(&self, ctx: &RequestContext) -> AppResult<BTreeMap<DriverStatus, usize>> {
        let drivers = self.table.get_all(ctx, &FilterSet::new()).await?;
        Ok(count_by_status(&drivers))
    }
}

pub fn count_by_status(drivers: &[Driver]) -> BTreeMap<DriverStatus, usize> {
    drivers.iter().fold(BTreeMap::new(), |mut counts, driver| {
        *counts.entry(driver.status).or_insert(0) += 1;
        counts
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::InMemoryPlatform;
    use chrono::{Duration, NaiveDate};
    use serde_json::json;

    #[tokio::test]
    async fn test_expiring_licenses_is_strict() {
        let platform = Arc::new(InMemoryPlatform::new());
        let tenant = Uuid::new_v4();
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

        let row = |license: &str, days: i64| {
            json!({
                "company_id": tenant.to_string(),
                "first_name": "Test",
                "last_name": license,
                "license_number": license,
                "license_expiry": (today + Duration::days(days)).to_string(),
                "status": "active",
            })
        };
        platform.seed("drivers", vec![row("L30", 30), row("L29", 29), row("L5", 5)]);

        let repo = DriverRepository::new(platform);
        let filters = DriverFilters::expiring_within(30, today).unwrap();
        let expiring = repo
            .get_all(&RequestContext::for_tenant(tenant), &filters)
            .await
            .unwrap();

        let licenses: Vec<_> = expiring.iter().map(|d| d.license_number.as_str()).collect();
        assert_eq!(licenses, vec!["L5", "L29"]);
    }
}
