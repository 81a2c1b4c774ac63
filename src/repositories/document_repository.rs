use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use super::TableRepository;
use crate::clients::TableBackend;
use crate::models::document::{Document, DocumentFilters, DocumentStatus, NewDocument, UpdateDocumentRequest};
use crate::models::query::{Filter, FilterSet};
use crate::models::RequestContext;
use crate::utils::errors::AppResult;

#[derive(Clone)]
pub struct DocumentRepository {
    table: TableRepository<Document>,
}

impl DocumentRepository {
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self {
            table: TableRepository::new(backend),
        }
    }

    pub async fn get_all(&self, ctx: &RequestContext, filters: &DocumentFilters) -> AppResult<Vec<Document>> {
        self.table
            .get_all_ordered(ctx, &filters.to_filter_set(), filters.order())
            .await
    }

    pub async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Document> {
        self.table.get_by_id(ctx, id).await
    }

    pub async fn create(&self, ctx: &RequestContext, document: &NewDocument) -> AppResult<Document> {
        self.table.create(ctx, document).await
    }

    pub async fn update(&self, ctx: &RequestContext, id: Uuid, request: &UpdateDocumentRequest) -> AppResult<Document> {
        self.table.update(ctx, id, request).await
    }

    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        self.table.delete(ctx, id).await
    }

    /// Pasar a `expired` los pendientes/aprobados con vencimiento anterior a hoy
    pub async fn expire_overdue(&self, ctx: &RequestContext, today: NaiveDate) -> AppResult<Vec<Document>> {
        let filters = FilterSet::new()
            .with("status", Filter::one_of(DocumentStatus::expirable()))
            .with("expiry_date", Filter::lt(today));
        let patch = UpdateDocumentRequest {
            status: Some(DocumentStatus::Expired),
            ..UpdateDocumentRequest::default()
        };

        let expired = self.table.update_where(ctx, &filters, &patch).await?;
        if !expired.is_empty() {
            info!("⌛ {} documentos marcados como vencidos", expired.len());
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::InMemoryPlatform;
    use serde_json::json;

    #[tokio::test]
    async fn test_expire_overdue_only_touches_open_documents() {
        let platform = Arc::new(InMemoryPlatform::new());
        let tenant = Uuid::new_v4();
        let driver_id = Uuid::new_v4();
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

        let row = |name: &str, status: &str, expiry: &str| {
            json!({
                "company_id": tenant.to_string(),
                "driver_id": driver_id.to_string(),
                "document_type": "medical",
                "status": status,
                "file_name": name,
                "file_path": format!("{}/{}/{}", tenant, driver_id, name),
                "expiry_date": expiry,
            })
        };
        platform.seed(
            "documents",
            vec![
                row("a.pdf", "approved", "2026-10-01"),
                row("b.pdf", "pending", "2026-10-18"),
                row("c.pdf", "rejected", "2026-10-01"),
                row("d.pdf", "approved", "2026-10-19"),
            ],
        );

        let repo = DocumentRepository::new(platform);
        let ctx = RequestContext::for_tenant(tenant);
        let expired = repo.expire_overdue(&ctx, today).await.unwrap();

        let mut names: Vec<_> = expired.iter().map(|d| d.file_name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);

        let rejected = repo
            .get_all(&ctx, &DocumentFilters { status: Some(DocumentStatus::Rejected), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(rejected.len(), 1);
    }
}
