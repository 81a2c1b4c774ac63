//! Repositorio genérico sobre una tabla de la plataforma
//! 
//! Contrato común de todas las entidades: listado con filtros, lectura por id,
//! alta, merge parcial y borrado. El tenant del contexto acota siempre la
//! consulta y se inyecta en las altas.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::clients::TableBackend;
use crate::models::query::{Filter, FilterSet, OrderBy, TableQuery};
use crate::models::{Entity, RequestContext};
use crate::utils::errors::{not_found_error, validation_error, AppError, AppResult};

pub struct TableRepository<E: Entity> {
    backend: Arc<dyn TableBackend>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for TableRepository<E> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> TableRepository<E> {
    pub fn new(backend: Arc<dyn TableBackend>) -> Self {
        Self {
            backend,
            _entity: PhantomData,
        }
    }

    /// Filtros del caller más la columna de tenant del contexto
    fn scoped(&self, ctx: &RequestContext, filters: &FilterSet) -> FilterSet {
        match ctx.tenant_id {
            Some(tenant_id) => filters.clone().with(E::TENANT_COLUMN, Filter::eq(tenant_id)),
            None => filters.clone(),
        }
    }

    fn by_id(&self, ctx: &RequestContext, id: Uuid) -> FilterSet {
        self.scoped(ctx, &FilterSet::new().with("id", Filter::eq(id)))
    }

    fn decode(row: Value) -> AppResult<E> {
        serde_json::from_value(row).map_err(AppError::from)
    }

    fn decode_all(rows: Vec<Value>) -> AppResult<Vec<E>> {
        rows.into_iter().map(Self::decode).collect()
    }

    /// Payload parcial como objeto JSON no vacío
    fn patch_value<P: Serialize>(payload: &P) -> AppResult<Value> {
        let patch = serde_json::to_value(payload)?;
        match &patch {
            Value::Object(map) if !map.is_empty() => Ok(patch),
            Value::Object(_) => Err(validation_error("payload", "no fields to update")),
            _ => Err(validation_error("payload", "must be an object")),
        }
    }

    /// Todas las filas que cumplen los filtros, en el orden por defecto
    pub async fn get_all(&self, ctx: &RequestContext, filters: &FilterSet) -> AppResult<Vec<E>> {
        self.get_all_ordered(ctx, filters, E::default_order()).await
    }

    pub async fn get_all_ordered(
        &self,
        ctx: &RequestContext,
        filters: &FilterSet,
        order: Option<OrderBy>,
    ) -> AppResult<Vec<E>> {
        let query = TableQuery::new(self.scoped(ctx, filters)).order_by(order);
        debug!("📋 Listando {} ({:?})", E::TABLE, query.to_query_pairs());

        let rows = self.backend.select(E::TABLE, &query, ctx.token()).await?;
        Self::decode_all(rows)
    }

    pub async fn get_by_id(&self, ctx: &RequestContext, id: Uuid) -> AppResult<E> {
        let query = TableQuery::new(self.by_id(ctx, id)).limit(1);

        let row = self
            .backend
            .select(E::TABLE, &query, ctx.token())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_found_error(E::RESOURCE, &id.to_string()))?;

        Self::decode(row)
    }

    /// Alta: valida el payload e inyecta el tenant del contexto
    pub async fn create<P>(&self, ctx: &RequestContext, payload: &P) -> AppResult<E>
    where
        P: Serialize + Validate + Sync,
    {
        payload.validate()?;

        let mut row = serde_json::to_value(payload)?;
        if !E::IS_TENANT_ROOT {
            let tenant_id = ctx.require_tenant()?;
            if let Value::Object(map) = &mut row {
                map.insert(E::TENANT_COLUMN.to_string(), Value::String(tenant_id.to_string()));
            }
        }

        let created = Self::decode(self.backend.insert(E::TABLE, row, ctx.token()).await?)?;
        info!("✅ {} creado: {}", E::RESOURCE, created.id());
        Ok(created)
    }

    /// Merge parcial por id; ninguna fila afectada es `NotFound`
    pub async fn update<P>(&self, ctx: &RequestContext, id: Uuid, payload: &P) -> AppResult<E>
    where
        P: Serialize + Validate + Sync,
    {
        payload.validate()?;
        let patch = Self::patch_value(payload)?;

        let row = self
            .backend
            .update(E::TABLE, &self.by_id(ctx, id), patch, ctx.token())
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_found_error(E::RESOURCE, &id.to_string()))?;

        info!("✏️ {} actualizado: {}", E::RESOURCE, id);
        Self::decode(row)
    }

    /// Merge parcial sobre todas las filas que cumplen los filtros
    pub async fn update_where<P>(&self, ctx: &RequestContext, filters: &FilterSet, payload: &P) -> AppResult<Vec<E>>
    where
        P: Serialize + Sync,
    {
        let patch = Self::patch_value(payload)?;
        let rows = self
            .backend
            .update(E::TABLE, &self.scoped(ctx, filters), patch, ctx.token())
            .await?;

        debug!("✏️ {} filas de {} actualizadas", rows.len(), E::TABLE);
        Self::decode_all(rows)
    }

    /// Borrado inmediato; un id inexistente sólo se registra
    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> AppResult<()> {
        let removed = self
            .backend
            .delete(E::TABLE, &self.by_id(ctx, id), ctx.token())
            .await?;

        if removed.is_empty() {
            warn!("⚠️ {} {} no existía, nada que borrar", E::RESOURCE, id);
        } else {
            info!("🗑️ {} borrado: {}", E::RESOURCE, id);
        }
        Ok(())
    }
}
