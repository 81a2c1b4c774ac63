mod common;

use chrono::Duration as Days;
use uuid::Uuid;

use common::{driver_request, fleet, today, TestFleet};
use fleet_manager::clients::Operation;
use fleet_manager::models::document::{
    Document, DocumentFilters, DocumentStatus, DocumentType, ReviewDecision, UploadDocumentRequest,
};
use fleet_manager::{AppError, RequestContext};

fn upload_request(driver_id: Uuid, file_name: &str) -> UploadDocumentRequest {
    UploadDocumentRequest {
        driver_id,
        document_type: DocumentType::License,
        file_name: file_name.to_string(),
        content_type: "application/pdf".to_string(),
        bytes: b"%PDF-1.7 licencia".to_vec(),
        expiry_date: Some(today() + Days::days(365)),
        notes: None,
    }
}

async fn uploaded(fleet: &TestFleet, file_name: &str) -> Document {
    let driver = fleet
        .state
        .drivers
        .create(&fleet.ctx, driver_request("LIC-DOC", today() + Days::days(365)))
        .await
        .unwrap();
    fleet
        .state
        .documents
        .upload_document(&fleet.ctx, upload_request(driver.id, file_name))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_upload_stores_object_and_pending_row() {
    let fleet = fleet();
    let tenant = fleet.ctx.tenant_id.unwrap();
    let document = uploaded(&fleet, "carnet.pdf").await;

    assert_eq!(document.status, DocumentStatus::Pending);
    assert_eq!(document.file_name, "carnet.pdf");
    assert_eq!(document.file_size, Some(17));
    assert!(document
        .file_path
        .starts_with(&format!("{}/{}/", tenant, document.driver_id)));
    assert!(document.file_path.ends_with("-carnet.pdf"));

    let bucket = fleet.state.documents.bucket();
    assert_eq!(
        fleet.platform.object(bucket, &document.file_path),
        Some(b"%PDF-1.7 licencia".to_vec())
    );
    assert_eq!(
        fleet.platform.object_content_type(bucket, &document.file_path).as_deref(),
        Some("application/pdf")
    );
}

#[tokio::test]
async fn test_failed_insert_removes_uploaded_object() {
    let fleet = fleet();
    fleet
        .platform
        .fail_next(Operation::Insert, "documents", AppError::Network("timeout".to_string()));

    let result = fleet
        .state
        .documents
        .upload_document(&fleet.ctx, upload_request(Uuid::new_v4(), "seguro.pdf"))
        .await;

    assert!(matches!(result, Err(AppError::Network(_))));
    assert_eq!(fleet.platform.call_count(Operation::Upload, "documents"), 1);
    assert_eq!(fleet.platform.call_count(Operation::Remove, "documents"), 1);
    assert!(fleet.platform.rows("documents").is_empty());
}

#[tokio::test]
async fn test_upload_rejects_empty_file() {
    let fleet = fleet();
    let mut request = upload_request(Uuid::new_v4(), "vacio.pdf");
    request.bytes.clear();

    let result = fleet.state.documents.upload_document(&fleet.ctx, request).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(fleet.platform.call_count(Operation::Upload, "documents"), 0);
}

#[tokio::test]
async fn test_review_only_from_pending() {
    let fleet = fleet();
    let reviewer = Uuid::new_v4();
    let ctx = fleet.ctx.clone().with_user(reviewer);
    let document = uploaded(&fleet, "medico.pdf").await;

    let approved = fleet
        .state
        .documents
        .review(&ctx, document.id, ReviewDecision::Approve, Some("ok".to_string()))
        .await
        .unwrap();
    assert_eq!(approved.status, DocumentStatus::Approved);
    assert_eq!(approved.reviewed_by, Some(reviewer));
    assert!(approved.reviewed_at.is_some());

    let again = fleet
        .state
        .documents
        .review(&ctx, document.id, ReviewDecision::Reject, None)
        .await;
    assert!(matches!(again, Err(AppError::Validation(_))));

    let cached = fleet.state.documents.document(&ctx, document.id).await.unwrap().unwrap();
    assert_eq!(cached.status, DocumentStatus::Approved);
}

#[tokio::test]
async fn test_expire_overdue_moves_open_documents() {
    let fleet = fleet();
    let driver = fleet
        .state
        .drivers
        .create(&fleet.ctx, driver_request("LIC-EXP", today() + Days::days(365)))
        .await
        .unwrap();

    let mut overdue = upload_request(driver.id, "vencido.pdf");
    overdue.expiry_date = Some(today() - Days::days(1));
    let mut due_today = upload_request(driver.id, "hoy.pdf");
    due_today.expiry_date = Some(today());

    let overdue = fleet.state.documents.upload_document(&fleet.ctx, overdue).await.unwrap();
    let due_today = fleet.state.documents.upload_document(&fleet.ctx, due_today).await.unwrap();

    let pending = DocumentFilters {
        status: Some(DocumentStatus::Pending),
        ..DocumentFilters::default()
    };
    let before = fleet.state.documents.documents(&fleet.ctx, &pending).await.unwrap().unwrap();
    assert_eq!(before.len(), 2);

    let expired = fleet.state.documents.expire_overdue(&fleet.ctx, today()).await.unwrap();
    let ids: Vec<Uuid> = expired.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![overdue.id]);
    assert_eq!(expired[0].status, DocumentStatus::Expired);

    let after = fleet.state.documents.documents(&fleet.ctx, &pending).await.unwrap().unwrap();
    let ids: Vec<Uuid> = after.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![due_today.id]);
}

#[tokio::test]
async fn test_delete_removes_row_and_object() {
    let fleet = fleet();
    let document = uploaded(&fleet, "formacion.pdf").await;
    let bucket = fleet.state.documents.bucket().to_string();

    fleet.state.documents.delete_document(&fleet.ctx, document.id).await.unwrap();

    assert!(fleet.platform.object(&bucket, &document.file_path).is_none());
    assert!(fleet.platform.rows("documents").is_empty());

    // Sin fila no hay objeto que borrar
    fleet.state.documents.delete_document(&fleet.ctx, document.id).await.unwrap();
    assert_eq!(fleet.platform.call_count(Operation::Remove, &bucket), 1);
}

#[tokio::test]
async fn test_download_url_points_at_stored_object() {
    let fleet = fleet();
    let document = uploaded(&fleet, "antecedentes.pdf").await;

    let url = fleet
        .state
        .documents
        .download_url(&fleet.ctx, document.id)
        .await
        .unwrap();

    assert!(url.contains(&document.file_path));
    assert!(url.contains("expires_in=3600"));

    let missing = fleet.state.documents.download_url(&fleet.ctx, Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_driver_documents_are_listed_per_driver() {
    let fleet = fleet();
    let document = uploaded(&fleet, "carnet.pdf").await;

    let listed = fleet
        .state
        .documents
        .driver_documents(&fleet.ctx, document.driver_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(listed.len(), 1);

    let other = fleet
        .state
        .documents
        .driver_documents(&fleet.ctx, Uuid::new_v4())
        .await
        .unwrap()
        .unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn test_review_and_download_require_tenant() {
    let fleet = fleet();
    let document = uploaded(&fleet, "psicotecnico.pdf").await;
    let bucket = fleet.state.documents.bucket().to_string();
    let anonymous = RequestContext::anonymous();
    let selects = fleet.platform.call_count(Operation::Select, "documents");

    let reviewed = fleet
        .state
        .documents
        .review(&anonymous, document.id, ReviewDecision::Approve, None)
        .await;
    assert!(matches!(reviewed, Err(AppError::Unauthorized(_))));

    let url = fleet.state.documents.download_url(&anonymous, document.id).await;
    assert!(matches!(url, Err(AppError::Unauthorized(_))));

    // Sin tenant no se toca ni la tabla ni el storage
    assert_eq!(fleet.platform.call_count(Operation::Select, "documents"), selects);
    assert_eq!(fleet.platform.call_count(Operation::Update, "documents"), 0);
    assert_eq!(fleet.platform.call_count(Operation::Download, &bucket), 0);
    assert_eq!(fleet.platform.rows("documents")[0]["status"], "pending");
}
