//! Cliente HTTP para la plataforma (REST de tablas, auth y storage)
//! 
//! Todas las llamadas devuelven `AppResult`; las respuestas no exitosas se
//! clasifican con `AppError::from_response`.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{AuthProvider, ObjectStorage, TableBackend, UploadRequest, UploadTarget};
use crate::config::EnvironmentConfig;
use crate::models::auth::{AuthUser, Session, SignUpOutcome, UserAttributes};
use crate::models::query::{FilterSet, TableQuery};
use crate::utils::errors::{AppError, AppResult};

/// Cliente HTTP de la plataforma
#[derive(Clone)]
pub struct PlatformClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct SignedUploadResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SignedDownloadResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl PlatformClient {
    /// Crear nuevo cliente con timeout configurable
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        info!("🔗 Cliente de plataforma configurado: {}", base_url);

        Ok(Self {
            client,
            base_url,
            anon_key: anon_key.into(),
        })
    }

    pub fn from_config(config: &EnvironmentConfig) -> AppResult<Self> {
        Self::new(&config.platform_url, &config.platform_anon_key, config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1/{}", self.base_url, path)
    }

    /// Cabeceras comunes: apikey siempre, Bearer con el token de sesión o la clave anónima
    fn authorize(&self, builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(token.unwrap_or(&self.anon_key))
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> AppResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("⚠️ Respuesta {} de la plataforma: {}", status, body);
            return Err(AppError::from_response(status, &body));
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn expect_success(response: Response) -> AppResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!("⚠️ Respuesta {} de la plataforma: {}", status, body);
        Err(AppError::from_response(status, &body))
    }
}

/// Codificar cada segmento de la ruta de un objeto
fn encode_object_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl TableBackend for PlatformClient {
    async fn select(&self, table: &str, query: &TableQuery, token: Option<&str>) -> AppResult<Vec<Value>> {
        debug!("🔍 GET {} {:?}", table, query.to_query_pairs());

        let response = self
            .authorize(self.client.get(self.rest_url(table)), token)
            .query(&query.to_query_pairs())
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn insert(&self, table: &str, row: Value, token: Option<&str>) -> AppResult<Value> {
        debug!("➕ POST {}", table);

        let response = self
            .authorize(self.client.post(self.rest_url(table)), token)
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        let mut rows: Vec<Value> = Self::read_json(response).await?;
        if rows.is_empty() {
            return Err(AppError::Unknown(format!("Insert into {} returned no row", table)));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, table: &str, filters: &FilterSet, patch: Value, token: Option<&str>) -> AppResult<Vec<Value>> {
        debug!("✏️ PATCH {} {:?}", table, filters.to_query_pairs());

        let response = self
            .authorize(self.client.patch(self.rest_url(table)), token)
            .header("Prefer", "return=representation")
            .query(&filters.to_query_pairs())
            .json(&patch)
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn delete(&self, table: &str, filters: &FilterSet, token: Option<&str>) -> AppResult<Vec<Value>> {
        debug!("🗑️ DELETE {} {:?}", table, filters.to_query_pairs());

        let response = self
            .authorize(self.client.delete(self.rest_url(table)), token)
            .header("Prefer", "return=representation")
            .query(&filters.to_query_pairs())
            .send()
            .await?;

        Self::read_json(response).await
    }
}

#[async_trait]
impl AuthProvider for PlatformClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<Session> {
        info!("🔐 Login de {}", email);

        let response = self
            .authorize(self.client.post(self.auth_url("token")), None)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> AppResult<SignUpOutcome> {
        info!("📝 Registro de {}", email);

        let response = self
            .authorize(self.client.post(self.auth_url("signup")), None)
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await?;

        let body: Value = Self::read_json(response).await?;

        // Con confirmación por e-mail la respuesta es el usuario sin sesión
        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)?;
            return Ok(SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            });
        }

        let user_value = body.get("user").cloned().unwrap_or(body);
        Ok(SignUpOutcome {
            user: serde_json::from_value(user_value)?,
            session: None,
        })
    }

    async fn sign_out(&self, access_token: &str) -> AppResult<()> {
        let response = self
            .authorize(self.client.post(self.auth_url("logout")), Some(access_token))
            .send()
            .await?;

        Self::expect_success(response).await
    }

    async fn send_password_reset(&self, email: &str, redirect_to: Option<&str>) -> AppResult<()> {
        let mut request = self
            .authorize(self.client.post(self.auth_url("recover")), None)
            .json(&json!({ "email": email }));
        if let Some(redirect) = redirect_to {
            request = request.query(&[("redirect_to", redirect)]);
        }

        Self::expect_success(request.send().await?).await
    }

    async fn update_user(&self, access_token: &str, attributes: &UserAttributes) -> AppResult<AuthUser> {
        let response = self
            .authorize(self.client.put(self.auth_url("user")), Some(access_token))
            .json(attributes)
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> AppResult<Session> {
        let response = self
            .authorize(self.client.post(self.auth_url("token")), None)
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        Self::read_json(response).await
    }
}

#[async_trait]
impl ObjectStorage for PlatformClient {
    async fn create_upload_target(&self, request: &UploadRequest, token: Option<&str>) -> AppResult<UploadTarget> {
        let path = encode_object_path(&request.path);
        let url = self.storage_url(&format!("object/upload/sign/{}/{}", request.bucket, path));

        let response = self
            .authorize(self.client.post(url), token)
            .send()
            .await?;
        let signed: SignedUploadResponse = Self::read_json(response).await?;

        let signed_url = format!("{}/storage/v1{}", self.base_url, signed.url);
        let upload_token = signed
            .url
            .split_once("token=")
            .map(|(_, t)| t.split('&').next().unwrap_or_default().to_string())
            .ok_or_else(|| AppError::Unknown("Signed upload URL without token".to_string()))?;

        Ok(UploadTarget {
            bucket: request.bucket.clone(),
            path: request.path.clone(),
            signed_url,
            token: upload_token,
            content_type: request.content_type.clone(),
            metadata: request.metadata.clone(),
        })
    }

    async fn upload(&self, target: &UploadTarget, bytes: Vec<u8>) -> AppResult<()> {
        debug!("📤 Subiendo {} bytes a {}/{}", bytes.len(), target.bucket, target.path);

        let metadata = serde_json::to_vec(&target.metadata)?;
        let response = self
            .client
            .put(&target.signed_url)
            .header("apikey", &self.anon_key)
            .header("Content-Type", &target.content_type)
            .header("x-upsert", "false")
            .header("x-metadata", base64::engine::general_purpose::STANDARD.encode(metadata))
            .body(bytes)
            .send()
            .await?;

        Self::expect_success(response).await
    }

    async fn create_download_url(&self, bucket: &str, path: &str, expires_in: u64, token: Option<&str>) -> AppResult<String> {
        let url = self.storage_url(&format!("object/sign/{}/{}", bucket, encode_object_path(path)));

        let response = self
            .authorize(self.client.post(url), token)
            .json(&json!({ "expiresIn": expires_in }))
            .send()
            .await?;
        let signed: SignedDownloadResponse = Self::read_json(response).await?;

        Ok(format!("{}/storage/v1{}", self.base_url, signed.signed_url))
    }

    async fn remove(&self, bucket: &str, paths: &[String], token: Option<&str>) -> AppResult<()> {
        let response = self
            .authorize(self.client.delete(self.storage_url(&format!("object/{}", bucket))), token)
            .json(&json!({ "prefixes": paths }))
            .send()
            .await?;

        Self::expect_success(response).await
    }
}
