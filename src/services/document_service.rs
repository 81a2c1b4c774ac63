//! Servicio de documentos de conductores
//! 
//! Los archivos viven en storage (`{company}/{driver}/{uuid}-{nombre}`) y la
//! tabla `documents` guarda el puntero y el estado de revisión.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use super::mutation::MutationState;
use super::resource::{EntityResource, MutationKind};
use crate::cache::{CacheRuntime, QuerySnapshot};
use crate::clients::{ObjectStorage, TableBackend, UploadRequest};
use crate::models::document::{
    Document, DocumentFilters, DocumentStatus, NewDocument, ReviewDecision, UpdateDocumentRequest, UploadDocumentRequest,
};
use crate::models::RequestContext;
use crate::repositories::DocumentRepository;
use crate::utils::errors::{validation_error, AppError, AppResult};

pub struct DocumentService {
    repository: DocumentRepository,
    storage: Arc<dyn ObjectStorage>,
    resource: EntityResource<Document>,
    bucket: String,
    signed_url_ttl_secs: u64,
}

/// Ruta del objeto en storage
pub fn storage_path(company_id: Uuid, driver_id: Uuid, file_name: &str) -> String {
    let safe_name: String = file_name
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{}/{}/{}-{}", company_id, driver_id, Uuid::new_v4(), safe_name)
}

impl DocumentService {
    pub fn new(
        backend: Arc<dyn TableBackend>,
        storage: Arc<dyn ObjectStorage>,
        runtime: &CacheRuntime,
        bucket: impl Into<String>,
        signed_url_ttl_secs: u64,
    ) -> Self {
        Self {
            repository: DocumentRepository::new(backend),
            storage,
            resource: EntityResource::new(runtime),
            bucket: bucket.into(),
            signed_url_ttl_secs,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub async fn documents(&self, ctx: &RequestContext, filters: &DocumentFilters) -> AppResult<Option<Arc<Vec<Document>>>> {
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

    pub async fn driver_documents(&self, ctx: &RequestContext, driver_id: Uuid) -> AppResult<Option<Arc<Vec<Document>>>> {
        self.documents(ctx, &DocumentFilters::for_driver(driver_id)).await
    }

    pub async fn expiring(&self, ctx: &RequestContext, days: i64, today: NaiveDate) -> AppResult<Option<Arc<Vec<Document>>>> {
        self.documents(ctx, &DocumentFilters::expiring_within(days, today)?).await
    }

    pub async fn document(&self, ctx: &RequestContext, id: Uuid) -> AppResult<Option<Arc<Document>>> {
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

    /// Subir el archivo y registrar el documento como `pending`
    pub async fn upload_document(&self, ctx: &RequestContext, request: UploadDocumentRequest) -> AppResult<Document> {
        self.resource
            .mutate(MutationKind::Create, self.store_and_register(ctx, request))
            .await
    }

    async fn store_and_register(&self, ctx: &RequestContext, request: UploadDocumentRequest) -> AppResult<Document> {
        request.validate()?;
        let company_id = ctx.require_tenant()?;

        let upload = UploadRequest {
            bucket: self.bucket.clone(),
            path: storage_path(company_id, request.driver_id, &request.file_name),
            content_type: request.content_type.clone(),
            metadata: request.storage_metadata(company_id),
        };

        let target = self.storage.create_upload_target(&upload, ctx.token()).await?;
        let file_size = request.bytes.len() as i64;
        self.storage.upload(&target, request.bytes).await?;
        info!("📤 Documento subido a {}/{}", target.bucket, target.path);

        let document = NewDocument {
            driver_id: request.driver_id,
            document_type: request.document_type,
            status: DocumentStatus::Pending,
            file_name: request.file_name,
            file_path: target.path.clone(),
            content_type: Some(request.content_type),
            file_size: Some(file_size),
            expiry_date: request.expiry_date,
            notes: request.notes,
        };

        match self.repository.create(ctx, &document).await {
            Ok(created) => Ok(created),
            Err(error) => {
                // Sin fila no queda nada que apunte al objeto
                if let Err(cleanup) = self
                    .storage
                    .remove(&self.bucket, &[target.path.clone()], ctx.token())
                    .await
                {
                    warn!("⚠️ No se pudo borrar el objeto huérfano {}: {}", target.path, cleanup);
                }
                Err(error)
            }
        }
    }

    /// URL firmada de descarga del archivo de un documento
    pub async fn download_url(&self, ctx: &RequestContext, id: Uuid) -> AppResult<String> {
        ctx.require_tenant()?;
        let document = self.repository.get_by_id(ctx, id).await?;
        self.storage
            .create_download_url(&self.bucket, &document.file_path, self.signed_url_ttl_secs, ctx.token())
            .await
    }

    /// Aprobar o rechazar un documento pendiente
    pub async fn review(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        decision: ReviewDecision,
        notes: Option<String>,
    ) -> AppResult<Document> {
        self.resource
            .mutate(MutationKind::Update, async {
                ctx.require_tenant()?;
                let document = self.repository.get_by_id(ctx, id).await?;
                let target = decision.target_status();

                if document.status != DocumentStatus::Pending || !document.status.can_transition_to(target) {
                    return Err(validation_error(
                        "status",
                        &format!("cannot move a {} document to {}", document.status, target),
                    ));
                }

                let request = UpdateDocumentRequest {
                    status: Some(target),
                    notes,
                    reviewed_by: ctx.user_id,
                    reviewed_at: Some(Utc::now()),
                    ..UpdateDocumentRequest::default()
                };
                self.repository.update(ctx, id, &request).await
            })
            .await
    }

    pub async fn update_document(&self, ctx: &RequestContext, id: Uuid, request: UpdateDocumentRequest) -> AppResult<Document> {
        self.resource
            .mutate(MutationKind::Update, async {
                ctx.require_tenant()?;
                if let Some(status) = request.status {
                    let current = self.repository.get_by_id(ctx, id).await?;
                    if current.status != status && !current.status.can_transition_to(status) {
                        return Err(validation_error(
                            "status",
                            &format!("cannot move a {} document to {}", current.status, status),
                        ));
                    }
                }
                self.repository.update(ctx, id, &request).await
            })
            .await
    }

    /// Marcar como vencidos los documentos abiertos con fecha pasada
    pub async fn expire_overdue(&self, ctx: &RequestContext, today: NaiveDate) -> AppResult<Vec<Document>> {
        self.resource
            .mutate(MutationKind::Update, async {
                ctx.require_tenant()?;
                self.repository.expire_overdue(ctx, today).await
            })
            .await
    }

    /// Borrar la fila y después el objeto
    pub async fn delete_document(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        self.resource
            .mutate(MutationKind::Delete, async {
                ctx.require_tenant()?;
                let existing = match self.repository.get_by_id(ctx, id).await {
                    Ok(document) => Some(document),
                    Err(AppError::NotFound(_)) => None,
                    Err(error) => return Err(error),
                };

                self.repository.delete(ctx, id).await?;

                if let Some(document) = existing {
                    if let Err(error) = self
                        .storage
                        .remove(&self.bucket, &[document.file_path.clone()], ctx.token())
                        .await
                    {
                        warn!("⚠️ Documento {} borrado pero el objeto quedó: {}", id, error);
                    }
                }
                Ok(())
            })
            .await
    }

    pub fn documents_snapshot(&self, ctx: &RequestContext, filters: &DocumentFilters) -> QuerySnapshot<Vec<Document>> {
        self.resource.list_snapshot(ctx, &filters.to_filter_set())
    }

    pub fn mutation_state(&self, kind: MutationKind) -> MutationState {
        self.resource.mutation_state(kind)
    }

    pub fn clear_cache(&self) {
        self.resource.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_path_layout() {
        let company = Uuid::new_v4();
        let driver = Uuid::new_v4();
        let path = storage_path(company, driver, "scans/licence.pdf");

        let parts: Vec<&str> = path.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], company.to_string());
        assert_eq!(parts[1], driver.to_string());
        assert!(parts[2].ends_with("-scans_licence.pdf"));
    }
}
