//! Clients - acceso a la plataforma
//! 
//! La plataforma (tablas, auth y storage) se expone como tres traits. Hay dos
//! implementaciones: el cliente HTTP real y una plataforma en memoria para
//! tests y ejecuciones offline.

pub mod in_memory;
pub mod platform_client;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::auth::{AuthUser, Session, SignUpOutcome, UserAttributes};
use crate::models::query::{FilterSet, TableQuery};
use crate::utils::errors::AppResult;

pub use in_memory::{InMemoryPlatform, Operation};
pub use platform_client::PlatformClient;

/// Operaciones de tabla estilo PostgREST
#[async_trait]
pub trait TableBackend: Send + Sync {
    async fn select(&self, table: &str, query: &TableQuery, token: Option<&str>) -> AppResult<Vec<Value>>;

    /// Insertar una fila y devolverla tal como quedó persistida
    async fn insert(&self, table: &str, row: Value, token: Option<&str>) -> AppResult<Value>;

    /// Merge parcial sobre todas las filas que cumplen los filtros
    async fn update(&self, table: &str, filters: &FilterSet, patch: Value, token: Option<&str>) -> AppResult<Vec<Value>>;

    /// Borrar las filas que cumplen los filtros y devolverlas
    async fn delete(&self, table: &str, filters: &FilterSet, token: Option<&str>) -> AppResult<Vec<Value>>;
}

/// API de autenticación
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<Session>;

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> AppResult<SignUpOutcome>;

    async fn sign_out(&self, access_token: &str) -> AppResult<()>;

    async fn send_password_reset(&self, email: &str, redirect_to: Option<&str>) -> AppResult<()>;

    async fn update_user(&self, access_token: &str, attributes: &UserAttributes) -> AppResult<AuthUser>;

    async fn refresh_session(&self, refresh_token: &str) -> AppResult<Session>;
}

/// Petición de destino firmado para subir un objeto
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub bucket: String,
    pub path: String,
    pub content_type: String,
    pub metadata: BTreeMap<String, String>,
}

/// Destino firmado devuelto por storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTarget {
    pub bucket: String,
    pub path: String,
    pub signed_url: String,
    pub token: String,
    pub content_type: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Almacenamiento de objetos
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn create_upload_target(&self, request: &UploadRequest, token: Option<&str>) -> AppResult<UploadTarget>;

    async fn upload(&self, target: &UploadTarget, bytes: Vec<u8>) -> AppResult<()>;

    async fn create_download_url(&self, bucket: &str, path: &str, expires_in: u64, token: Option<&str>) -> AppResult<String>;

    async fn remove(&self, bucket: &str, paths: &[String], token: Option<&str>) -> AppResult<()>;
}

/// Las tres superficies juntas
pub trait Platform: TableBackend + AuthProvider + ObjectStorage {}

impl<T: TableBackend + AuthProvider + ObjectStorage> Platform for T {}
