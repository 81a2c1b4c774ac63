//! Plataforma en memoria
//! 
//! Implementa tablas, auth y storage dentro del proceso, con las mismas reglas
//! que la plataforma real donde importan: ids y timestamps asignados en el
//! servidor, restricciones únicas, aislamiento por tenant según los claims del
//! token y errores con los mismos códigos. Cuenta las llamadas por operación y
//! permite inyectar fallos, así que es la base de los tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use http::StatusCode;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AuthProvider, ObjectStorage, TableBackend, UploadRequest, UploadTarget};
use crate::models::auth::{AuthUser, Session, SignUpOutcome, UserAttributes};
use crate::models::company::Company;
use crate::models::query::{compare_values, FilterSet, TableQuery};
use crate::models::Entity;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::jwt::{generate_token, verify_token, JwtClaims};

const ACCESS_TOKEN_TTL_SECS: i64 = 3600;
const BCRYPT_COST: u32 = 4;

/// Operación contada por la plataforma
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    Upload,
    Download,
    Remove,
}

struct StoredUser {
    id: Uuid,
    email: String,
    password_hash: String,
    user_metadata: Value,
}

impl StoredUser {
    fn to_auth_user(&self) -> AuthUser {
        AuthUser {
            id: self.id,
            email: Some(self.email.clone()),
            user_metadata: self.user_metadata.clone(),
        }
    }

    fn company_id(&self) -> Option<Uuid> {
        self.to_auth_user().metadata_company_id()
    }
}

struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    users: HashMap<String, StoredUser>,
    revoked_tokens: HashSet<String>,
    refresh_tokens: HashMap<String, String>,
    password_resets: Vec<String>,
    objects: HashMap<(String, String), StoredObject>,
    pending_uploads: HashMap<String, (String, String)>,
    calls: HashMap<(Operation, String), usize>,
    failures: HashMap<(Operation, String), VecDeque<AppError>>,
}

/// Plataforma completa en memoria
pub struct InMemoryPlatform {
    state: Mutex<State>,
    jwt_secret: String,
    tenant_columns: HashMap<String, String>,
    unique_columns: Vec<(String, String)>,
    latency: Option<Duration>,
    confirm_email: bool,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        let mut tenant_columns = HashMap::new();
        tenant_columns.insert(Company::TABLE.to_string(), Company::TENANT_COLUMN.to_string());

        Self {
            state: Mutex::new(State::default()),
            jwt_secret: format!("in-memory-{}", Uuid::new_v4()),
            tenant_columns,
            unique_columns: vec![
                ("vehicles".to_string(), "vin".to_string()),
                ("vehicles".to_string(), "license_plate".to_string()),
                ("drivers".to_string(), "license_number".to_string()),
            ],
            latency: None,
            confirm_email: false,
        }
    }

    /// Retraso artificial en cada operación de tabla
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// El registro no devuelve sesión hasta confirmar el e-mail
    pub fn with_email_confirmation(mut self) -> Self {
        self.confirm_email = true;
        self
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tenant_column(&self, table: &str) -> &str {
        self.tenant_columns
            .get(table)
            .map(String::as_str)
            .unwrap_or("company_id")
    }

    /// Insertar filas directamente (sin token ni contadores)
    pub fn seed(&self, table: &str, rows: Vec<Value>) -> Vec<Value> {
        let mut state = self.state();
        let stored: Vec<Value> = rows.into_iter().map(with_server_fields).collect();
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(stored.iter().cloned());
        stored
    }

    /// Copia de las filas de una tabla
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn call_count(&self, operation: Operation, target: &str) -> usize {
        self.state()
            .calls
            .get(&(operation, target.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Llamadas de tabla (select/insert/update/delete) sobre una tabla
    pub fn table_calls(&self, table: &str) -> usize {
        [Operation::Select, Operation::Insert, Operation::Update, Operation::Delete]
            .into_iter()
            .map(|op| self.call_count(op, table))
            .sum()
    }

    /// La próxima operación de ese tipo sobre ese destino falla con `error`
    pub fn fail_next(&self, operation: Operation, target: &str, error: AppError) {
        self.state()
            .failures
            .entry((operation, target.to_string()))
            .or_default()
            .push_back(error);
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.state()
            .objects
            .get(&(bucket.to_string(), path.to_string()))
            .map(|o| o.bytes.clone())
    }

    pub fn object_content_type(&self, bucket: &str, path: &str) -> Option<String> {
        self.state()
            .objects
            .get(&(bucket.to_string(), path.to_string()))
            .map(|o| o.content_type.clone())
    }

    /// E-mails para los que se pidió restablecer la contraseña
    pub fn password_reset_requests(&self) -> Vec<String> {
        self.state().password_resets.clone()
    }

    /// Contar la llamada y consumir un fallo inyectado si lo hay
    async fn enter(&self, operation: Operation, target: &str) -> AppResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        *state.calls.entry((operation, target.to_string())).or_insert(0) += 1;

        if let Some(error) = state
            .failures
            .get_mut(&(operation, target.to_string()))
            .and_then(VecDeque::pop_front)
        {
            warn!("💥 Fallo inyectado en {:?} {}", operation, target);
            return Err(error);
        }
        Ok(())
    }

    fn claims(&self, token: Option<&str>) -> AppResult<Option<JwtClaims>> {
        let Some(token) = token else {
            return Ok(None);
        };

        if self.state().revoked_tokens.contains(token) {
            return Err(AppError::from_response(
                StatusCode::UNAUTHORIZED,
                r#"{"message":"JWT has been revoked"}"#,
            ));
        }

        verify_token(token, &self.jwt_secret).map(Some)
    }

    fn tenant_of(&self, token: Option<&str>) -> AppResult<Option<String>> {
        Ok(self
            .claims(token)?
            .and_then(|claims| claims.tenant_id())
            .map(|id| id.to_string()))
    }

    fn issue_session(&self, state: &mut State, email: &str) -> AppResult<Session> {
        let user = state
            .users
            .get(email)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", email)))?;

        let access_token = generate_token(
            user.id,
            Some(&user.email),
            user.company_id(),
            &self.jwt_secret,
            ACCESS_TOKEN_TTL_SECS,
        )?;
        let refresh_token = Uuid::new_v4().simple().to_string();
        let auth_user = user.to_auth_user();

        state.refresh_tokens.insert(refresh_token.clone(), email.to_string());

        Ok(Session {
            access_token,
            refresh_token: Some(refresh_token),
            token_type: "bearer".to_string(),
            expires_in: ACCESS_TOKEN_TTL_SECS,
            expires_at: Some(Utc::now().timestamp() + ACCESS_TOKEN_TTL_SECS),
            user: auth_user,
        })
    }

    fn check_unique(&self, rows: &[Value], table: &str, candidate: &Value, skip_id: Option<&Value>) -> AppResult<()> {
        let tenant_column = self.tenant_column(table);

        for (unique_table, column) in &self.unique_columns {
            if unique_table != table {
                continue;
            }
            let Some(value) = candidate.get(column).filter(|v| !v.is_null()) else {
                continue;
            };

            let duplicate = rows.iter().any(|row| {
                row.get("id") != skip_id
                    && row.get(tenant_column) == candidate.get(tenant_column)
                    && row.get(column) == Some(value)
            });

            if duplicate {
                let body = json!({
                    "code": "23505",
                    "message": format!("duplicate key value violates unique constraint \"{}_{}_key\"", table, column),
                });
                return Err(AppError::from_response(StatusCode::CONFLICT, &body.to_string()));
            }
        }
        Ok(())
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn with_server_fields(row: Value) -> Value {
    let mut object = match row {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let now = now_timestamp();
    object
        .entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    object.entry("created_at").or_insert_with(|| Value::String(now.clone()));
    object.insert("updated_at".to_string(), Value::String(now));
    Value::Object(object)
}

fn rls_violation(table: &str) -> AppError {
    let body = json!({
        "code": "42501",
        "message": format!("new row violates row-level security policy for table \"{}\"", table),
    });
    AppError::from_response(StatusCode::FORBIDDEN, &body.to_string())
}

fn owned_by(row: &Value, column: &str, tenant: &Option<String>) -> bool {
    match tenant {
        Some(tenant) => row.get(column).and_then(Value::as_str) == Some(tenant.as_str()),
        None => true,
    }
}

#[async_trait]
impl TableBackend for InMemoryPlatform {
    async fn select(&self, table: &str, query: &TableQuery, token: Option<&str>) -> AppResult<Vec<Value>> {
        self.enter(Operation::Select, table).await?;
        let tenant = self.tenant_of(token)?;
        let tenant_column = self.tenant_column(table);

        let state = self.state();
        let mut rows: Vec<Value> = state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| owned_by(row, tenant_column, &tenant))
                    .filter(|row| query.filters.matches(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(state);

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = match (a.get(&order.column), b.get(&order.column)) {
                    (Some(x), Some(y)) if !x.is_null() && !y.is_null() => {
                        compare_values(x, y).unwrap_or(std::cmp::Ordering::Equal)
                    }
                    (Some(x), _) if !x.is_null() => std::cmp::Ordering::Less,
                    (_, Some(y)) if !y.is_null() => std::cmp::Ordering::Greater,
                    _ => std::cmp::Ordering::Equal,
                };
                if order.ascending { ordering } else { ordering.reverse() }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        debug!("🔍 [memoria] {} filas de {}", rows.len(), table);
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value, token: Option<&str>) -> AppResult<Value> {
        self.enter(Operation::Insert, table).await?;
        let tenant = self.tenant_of(token)?;
        let tenant_column = self.tenant_column(table);

        if !row.is_object() {
            return Err(AppError::Validation("Row must be a JSON object".to_string()));
        }
        // La raíz de tenant (companies) se crea sin tenant previo
        if tenant_column != "id" && !owned_by(&row, tenant_column, &tenant) {
            return Err(rls_violation(table));
        }

        let stored = with_server_fields(row);
        let mut state = self.state();
        let rows = state.tables.entry(table.to_string()).or_default();
        self.check_unique(rows, table, &stored, None)?;
        rows.push(stored.clone());

        debug!("➕ [memoria] fila insertada en {}", table);
        Ok(stored)
    }

    async fn update(&self, table: &str, filters: &FilterSet, patch: Value, token: Option<&str>) -> AppResult<Vec<Value>> {
        self.enter(Operation::Update, table).await?;
        let tenant = self.tenant_of(token)?;
        let tenant_column = self.tenant_column(table);

        let Value::Object(patch) = patch else {
            return Err(AppError::Validation("Patch must be a JSON object".to_string()));
        };
        if tenant.is_some() && patch.contains_key(tenant_column) {
            let moved = patch.get(tenant_column).and_then(Value::as_str) != tenant.as_deref();
            if moved {
                return Err(rls_violation(table));
            }
        }

        let mut state = self.state();
        let rows = state.tables.entry(table.to_string()).or_default();

        let mut candidates = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if owned_by(row, tenant_column, &tenant) && filters.matches(row) {
                let mut merged = row.clone();
                if let Value::Object(object) = &mut merged {
                    for (key, value) in &patch {
                        object.insert(key.clone(), value.clone());
                    }
                    object.insert("updated_at".to_string(), Value::String(now_timestamp()));
                }
                candidates.push((index, merged));
            }
        }

        for (_, merged) in &candidates {
            self.check_unique(rows, table, merged, merged.get("id"))?;
        }

        let mut updated = Vec::with_capacity(candidates.len());
        for (index, merged) in candidates {
            rows[index] = merged.clone();
            updated.push(merged);
        }

        debug!("✏️ [memoria] {} filas actualizadas en {}", updated.len(), table);
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &FilterSet, token: Option<&str>) -> AppResult<Vec<Value>> {
        self.enter(Operation::Delete, table).await?;
        let tenant = self.tenant_of(token)?;
        let tenant_column = self.tenant_column(table).to_string();

        let mut state = self.state();
        let rows = state.tables.entry(table.to_string()).or_default();

        let (removed, kept): (Vec<Value>, Vec<Value>) = rows
            .drain(..)
            .partition(|row| owned_by(row, &tenant_column, &tenant) && filters.matches(row));
        *rows = kept;

        debug!("🗑️ [memoria] {} filas borradas de {}", removed.len(), table);
        Ok(removed)
    }
}

#[async_trait]
impl AuthProvider for InMemoryPlatform {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> AppResult<Session> {
        let email = email.trim().to_lowercase();
        let mut state = self.state();

        let valid = match state.users.get(&email) {
            Some(user) => bcrypt::verify(password, &user.password_hash)
                .map_err(|e| AppError::Unknown(format!("Error verificando contraseña: {}", e)))?,
            None => false,
        };
        if !valid {
            return Err(AppError::from_response(
                StatusCode::BAD_REQUEST,
                r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
            ));
        }

        info!("🔐 [memoria] sesión iniciada para {}", email);
        self.issue_session(&mut state, &email)
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> AppResult<SignUpOutcome> {
        let email = email.trim().to_lowercase();
        let password_hash = bcrypt::hash(password, BCRYPT_COST)
            .map_err(|e| AppError::Unknown(format!("Error hasheando contraseña: {}", e)))?;

        let mut state = self.state();
        if state.users.contains_key(&email) {
            return Err(AppError::from_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                r#"{"code":422,"error_code":"user_already_exists","msg":"User already registered"}"#,
            ));
        }

        let user = StoredUser {
            id: Uuid::new_v4(),
            email: email.clone(),
            password_hash,
            user_metadata: if metadata.is_object() { metadata } else { json!({}) },
        };
        let auth_user = user.to_auth_user();
        state.users.insert(email.clone(), user);

        info!("📝 [memoria] usuario registrado: {}", email);

        let session = if self.confirm_email {
            None
        } else {
            Some(self.issue_session(&mut state, &email)?)
        };

        Ok(SignUpOutcome { user: auth_user, session })
    }

    async fn sign_out(&self, access_token: &str) -> AppResult<()> {
        let claims = self
            .claims(Some(access_token))?
            .ok_or_else(|| AppError::Unauthorized("Missing session".to_string()))?;

        let mut state = self.state();
        state.revoked_tokens.insert(access_token.to_string());
        if let Some(email) = claims.email.as_deref() {
            state.refresh_tokens.retain(|_, owner| owner != email);
        }
        Ok(())
    }

    async fn send_password_reset(&self, email: &str, _redirect_to: Option<&str>) -> AppResult<()> {
        // Se registra aunque el usuario no exista (no se revela)
        self.state().password_resets.push(email.trim().to_lowercase());
        Ok(())
    }

    async fn update_user(&self, access_token: &str, attributes: &UserAttributes) -> AppResult<AuthUser> {
        let claims = self
            .claims(Some(access_token))?
            .ok_or_else(|| AppError::Unauthorized("Missing session".to_string()))?;
        let email = claims
            .email
            .ok_or_else(|| AppError::Unauthorized("Session without e-mail".to_string()))?;

        let password_hash = match &attributes.password {
            Some(password) => Some(
                bcrypt::hash(password, BCRYPT_COST)
                    .map_err(|e| AppError::Unknown(format!("Error hasheando contraseña: {}", e)))?,
            ),
            None => None,
        };

        let mut state = self.state();
        let user = state
            .users
            .get_mut(&email)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", email)))?;

        if let Some(hash) = password_hash {
            user.password_hash = hash;
        }
        if let (Some(Value::Object(data)), Value::Object(current)) = (&attributes.data, &mut user.user_metadata) {
            for (key, value) in data {
                current.insert(key.clone(), value.clone());
            }
        }

        Ok(user.to_auth_user())
    }

    async fn refresh_session(&self, refresh_token: &str) -> AppResult<Session> {
        let mut state = self.state();
        let email = state.refresh_tokens.remove(refresh_token).ok_or_else(|| {
            AppError::from_response(
                StatusCode::BAD_REQUEST,
                r#"{"error":"invalid_grant","error_description":"Invalid Refresh Token"}"#,
            )
        })?;

        self.issue_session(&mut state, &email)
    }
}

#[async_trait]
impl ObjectStorage for InMemoryPlatform {
    async fn create_upload_target(&self, request: &UploadRequest, token: Option<&str>) -> AppResult<UploadTarget> {
        self.claims(token)?;

        let key = (request.bucket.clone(), request.path.clone());
        let mut state = self.state();
        if state.objects.contains_key(&key) {
            return Err(AppError::from_response(
                StatusCode::CONFLICT,
                r#"{"statusCode":"409","error":"Duplicate","message":"The resource already exists"}"#,
            ));
        }

        let upload_token = Uuid::new_v4().simple().to_string();
        state.pending_uploads.insert(upload_token.clone(), key);

        Ok(UploadTarget {
            bucket: request.bucket.clone(),
            path: request.path.clone(),
            signed_url: format!("memory://{}/{}?token={}", request.bucket, request.path, upload_token),
            token: upload_token,
            content_type: request.content_type.clone(),
            metadata: request.metadata.clone(),
        })
    }

    async fn upload(&self, target: &UploadTarget, bytes: Vec<u8>) -> AppResult<()> {
        self.enter(Operation::Upload, &target.bucket).await?;

        let mut state = self.state();
        let key = state
            .pending_uploads
            .remove(&target.token)
            .ok_or_else(|| AppError::Unauthorized("Invalid upload token".to_string()))?;

        debug!("📤 [memoria] {} bytes en {}/{}", bytes.len(), key.0, key.1);
        state.objects.insert(
            key,
            StoredObject {
                bytes,
                content_type: target.content_type.clone(),
            },
        );
        Ok(())
    }

    async fn create_download_url(&self, bucket: &str, path: &str, expires_in: u64, token: Option<&str>) -> AppResult<String> {
        self.enter(Operation::Download, bucket).await?;
        self.claims(token)?;

        if !self.state().objects.contains_key(&(bucket.to_string(), path.to_string())) {
            return Err(AppError::from_response(
                StatusCode::NOT_FOUND,
                r#"{"statusCode":"404","error":"not_found","message":"Object not found"}"#,
            ));
        }

        Ok(format!(
            "memory://{}/{}?token={}&expires_in={}",
            bucket,
            path,
            Uuid::new_v4().simple(),
            expires_in
        ))
    }

    async fn remove(&self, bucket: &str, paths: &[String], token: Option<&str>) -> AppResult<()> {
        self.enter(Operation::Remove, bucket).await?;
        self.claims(token)?;

        let mut state = self.state();
        for path in paths {
            state.objects.remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }
}
