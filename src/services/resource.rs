//! Binding layer genérico por entidad
//! 
//! Agrupa las cachés de una entidad (listados, detalle y consultas derivadas)
//! con el seguimiento de sus mutaciones. Una mutación exitosa invalida todas
//! las cachés del grupo.

use std::future::Future;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::mutation::{MutationState, MutationTracker};
use crate::cache::{CacheControl, CacheRuntime, QueryCache, QueryKey, QuerySnapshot};
use crate::models::query::{Filter, FilterSet};
use crate::models::{Entity, RequestContext};
use crate::utils::errors::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

pub struct EntityResource<E: Entity> {
    runtime: CacheRuntime,
    lists: Arc<QueryCache<Vec<E>>>,
    details: Arc<QueryCache<E>>,
    members: Vec<Arc<dyn CacheControl>>,
    create: MutationTracker,
    update: MutationTracker,
    delete: MutationTracker,
}

impl<E: Entity> EntityResource<E> {
    pub fn new(runtime: &CacheRuntime) -> Self {
        let lists: Arc<QueryCache<Vec<E>>> = Arc::new(QueryCache::new(runtime));
        let details: Arc<QueryCache<E>> = Arc::new(QueryCache::new(runtime));
        let members: Vec<Arc<dyn CacheControl>> = vec![
            lists.clone() as Arc<dyn CacheControl>,
            details.clone() as Arc<dyn CacheControl>,
        ];

        Self {
            runtime: runtime.clone(),
            lists,
            details,
            members,
            create: MutationTracker::new(),
            update: MutationTracker::new(),
            delete: MutationTracker::new(),
        }
    }

    /// Nueva caché para una consulta derivada; se invalida con el resto
    pub fn derived<T: Send + Sync + 'static>(&mut self) -> Arc<QueryCache<T>> {
        let cache: Arc<QueryCache<T>> = Arc::new(QueryCache::new(&self.runtime));
        self.members.push(cache.clone());
        cache
    }

    pub fn list_key(tenant_id: Uuid, filters: &FilterSet) -> QueryKey {
        QueryKey::new(E::TABLE, tenant_id, filters)
    }

    pub fn detail_key(tenant_id: Uuid, id: Uuid) -> QueryKey {
        QueryKey::scoped(E::TABLE, tenant_id, "detail", &FilterSet::new().with("id", Filter::eq(id)))
    }

    /// Consulta cacheada; sin tenant no se consulta nada y el resultado es `None`
    pub async fn query<T, F, Fut>(
        &self,
        cache: &QueryCache<T>,
        ctx: &RequestContext,
        key: impl FnOnce(Uuid) -> QueryKey,
        fetch: F,
    ) -> AppResult<Option<Arc<T>>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let Some(tenant_id) = ctx.tenant_id else {
            debug!("⏸️ Sin tenant, consulta de {} omitida", E::TABLE);
            return Ok(None);
        };

        cache.fetch(key(tenant_id), fetch).await.map(Some)
    }

    pub async fn list<F, Fut>(&self, ctx: &RequestContext, filters: &FilterSet, fetch: F) -> AppResult<Option<Arc<Vec<E>>>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Vec<E>>> + Send + 'static,
    {
        self.query(&self.lists, ctx, |tenant| Self::list_key(tenant, filters), fetch)
            .await
    }

    pub async fn detail<F, Fut>(&self, ctx: &RequestContext, id: Uuid, fetch: F) -> AppResult<Option<Arc<E>>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<E>> + Send + 'static,
    {
        self.query(&self.details, ctx, |tenant| Self::detail_key(tenant, id), fetch)
            .await
    }

    pub fn list_snapshot(&self, ctx: &RequestContext, filters: &FilterSet) -> QuerySnapshot<Vec<E>> {
        match ctx.tenant_id {
            Some(tenant_id) => self.lists.snapshot(&Self::list_key(tenant_id, filters)),
            None => QuerySnapshot::default(),
        }
    }

    pub fn detail_snapshot(&self, ctx: &RequestContext, id: Uuid) -> QuerySnapshot<E> {
        match ctx.tenant_id {
            Some(tenant_id) => self.details.snapshot(&Self::detail_key(tenant_id, id)),
            None => QuerySnapshot::default(),
        }
    }

    fn tracker(&self, kind: MutationKind) -> &MutationTracker {
        match kind {
            MutationKind::Create => &self.create,
            MutationKind::Update => &self.update,
            MutationKind::Delete => &self.delete,
        }
    }

    /// Ejecutar una mutación; si sale bien se invalida toda la entidad
    pub async fn mutate<T, Fut>(&self, kind: MutationKind, mutation: Fut) -> AppResult<T>
    where
        Fut: Future<Output = AppResult<T>>,
    {
        let result = self.tracker(kind).run(mutation).await;

        if result.is_ok() {
            self.invalidate_all();
            if self.runtime.config.refetch_on_invalidate {
                self.refetch_stale().await;
            }
        }
        result
    }

    pub fn mutation_state(&self, kind: MutationKind) -> MutationState {
        self.tracker(kind).state()
    }

    pub fn reset_mutation(&self, kind: MutationKind) {
        self.tracker(kind).reset();
    }

    pub fn invalidate_all(&self) {
        for cache in &self.members {
            cache.invalidate_all();
        }
    }

    pub async fn refetch_stale(&self) -> usize {
        let mut refetched = 0;
        for cache in &self.members {
            refetched += cache.refetch_stale().await;
        }
        refetched
    }

    pub fn clear(&self) {
        for cache in &self.members {
            cache.clear();
        }
    }
}
