//! Modelo de Document
//! 
//! Documentos de un conductor (licencia, médico, seguro...). El contenido vive en
//! el storage externo; la fila guarda el puntero (`file_path`) y el ciclo de
//! revisión `pending → approved | rejected`, o `expired`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::query::{window_end, Filter, FilterSet, OrderBy};
use super::{null_as_default, Entity};
use crate::utils::errors::AppResult;
use crate::utils::validation::{validate_not_blank, validate_not_empty_bytes};

/// Tipo de documento (conjunto cerrado)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    License,
    Medical,
    Insurance,
    Background,
    Training,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::License => "license",
            DocumentType::Medical => "medical",
            DocumentType::Insurance => "insurance",
            DocumentType::Background => "background",
            DocumentType::Training => "training",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estado de revisión del documento
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Expired => "expired",
        }
    }

    /// Transiciones permitidas. `rejected` y `expired` son finales.
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (DocumentStatus::Pending, DocumentStatus::Approved)
                | (DocumentStatus::Pending, DocumentStatus::Rejected)
                | (DocumentStatus::Pending, DocumentStatus::Expired)
                | (DocumentStatus::Approved, DocumentStatus::Expired)
        )
    }

    /// Estados que pasan a `expired` cuando vence `expiry_date`
    pub fn expirable() -> [DocumentStatus; 2] {
        [DocumentStatus::Pending, DocumentStatus::Approved]
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decisión de revisión
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn target_status(&self) -> DocumentStatus {
        match self {
            ReviewDecision::Approve => DocumentStatus::Approved,
            ReviewDecision::Reject => DocumentStatus::Rejected,
        }
    }
}

/// Document principal - fila de la tabla documents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub company_id: Uuid,
    pub driver_id: Uuid,
    pub document_type: DocumentType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: DocumentStatus,
    pub file_name: String,
    pub file_path: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reviewed_by: Option<Uuid>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Document {
    const TABLE: &'static str = "documents";
    const RESOURCE: &'static str = "Document";

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Subida de un documento nuevo (contenido + metadatos)
#[derive(Debug, Clone, Validate)]
pub struct UploadDocumentRequest {
    pub driver_id: Uuid,

    pub document_type: DocumentType,

    #[validate(length(min = 1, max = 255), custom = "validate_not_blank")]
    pub file_name: String,

    #[validate(length(min = 3, max = 100))]
    pub content_type: String,

    #[validate(custom = "validate_not_empty_bytes")]
    pub bytes: Vec<u8>,

    pub expiry_date: Option<NaiveDate>,

    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl UploadDocumentRequest {
    /// Metadatos que viajan con el objeto en storage
    pub fn storage_metadata(&self, company_id: Uuid) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        metadata.insert("company_id".to_string(), company_id.to_string());
        metadata.insert("driver_id".to_string(), self.driver_id.to_string());
        metadata.insert("document_type".to_string(), self.document_type.to_string());
        metadata
    }
}

/// Fila a insertar tras subir el archivo
#[derive(Debug, Clone, Serialize, Validate)]
pub struct NewDocument {
    pub driver_id: Uuid,
    pub document_type: DocumentType,
    pub status: DocumentStatus,
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,
    #[validate(length(min = 1))]
    pub file_path: String,
    pub content_type: Option<String>,
    pub file_size: Option<i64>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Cambio parcial de un documento
#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct UpdateDocumentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DocumentStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,

    #[validate(length(max = 1000))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Filtros para búsqueda de documentos
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentFilters {
    pub driver_id: Option<Uuid>,
    pub document_type: Option<DocumentType>,
    pub status: Option<DocumentStatus>,
    pub expiring_before: Option<NaiveDate>,
}

impl DocumentFilters {
    pub fn for_driver(driver_id: Uuid) -> Self {
        Self {
            driver_id: Some(driver_id),
            ..Self::default()
        }
    }

    pub fn expiring_within(days: i64, today: NaiveDate) -> AppResult<Self> {
        Ok(Self {
            expiring_before: Some(window_end(today, days)?),
            ..Self::default()
        })
    }

    pub fn to_filter_set(&self) -> FilterSet {
        FilterSet::new()
            .with_opt("driver_id", self.driver_id, Filter::eq)
            .with_opt("document_type", self.document_type, Filter::eq)
            .with_opt("status", self.status, Filter::eq)
            .with_opt("expiry_date", self.expiring_before, Filter::lt)
    }

    pub fn order(&self) -> Option<OrderBy> {
        if self.expiring_before.is_some() {
            Some(OrderBy::asc("expiry_date"))
        } else {
            Document::default_order()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use DocumentStatus::*;

        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Expired));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Expired.can_transition_to(Pending));
        assert_eq!(ReviewDecision::Reject.target_status(), Rejected);
    }

    #[test]
    fn test_upload_validation() {
        let request = UploadDocumentRequest {
            driver_id: Uuid::new_v4(),
            document_type: DocumentType::Medical,
            file_name: "medical.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: Vec::new(),
            expiry_date: None,
            notes: None,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("bytes"));

        let metadata = request.storage_metadata(Uuid::nil());
        assert_eq!(metadata.get("document_type").map(String::as_str), Some("medical"));
    }
}
