//! Caché de consultas
//! 
//! Cada consulta se identifica por (entidad, tenant, huella de filtros).
//! Consultas idénticas comparten resultado y, mientras hay una petición en
//! vuelo, comparten la misma petición. La invalidación marca las entradas como
//! obsoletas; una petición que estaba en vuelo al invalidar se asienta como
//! obsoleta y la siguiente lectura vuelve a la plataforma.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use tracing::{debug, info};
use uuid::Uuid;

use super::{CacheConfig, CacheMetrics, CacheRuntime};
use crate::models::query::FilterSet;
use crate::utils::errors::{AppError, AppResult};

type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, AppResult<T>> + Send + Sync>;
type InFlight<T> = Shared<BoxFuture<'static, AppResult<Arc<T>>>>;

/// Identidad de una consulta cacheada
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub entity: &'static str,
    pub tenant_id: Uuid,
    pub fingerprint: String,
}

impl QueryKey {
    pub fn new(entity: &'static str, tenant_id: Uuid, filters: &FilterSet) -> Self {
        Self {
            entity,
            tenant_id,
            fingerprint: filters.fingerprint(),
        }
    }

    /// Consulta derivada (detalle, conteos...) sobre la misma entidad
    pub fn scoped(entity: &'static str, tenant_id: Uuid, scope: &str, filters: &FilterSet) -> Self {
        Self {
            entity,
            tenant_id,
            fingerprint: format!("{}:{}", scope, filters.fingerprint()),
        }
    }
}

/// Estado de carga de una consulta
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Vista de una entrada para el consumidor
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<AppError>,
    pub is_stale: bool,
    pub is_fetching: bool,
}

impl<T> Default for QuerySnapshot<T> {
    fn default() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            is_stale: false,
            is_fetching: false,
        }
    }
}

struct CacheEntry<T> {
    status: QueryStatus,
    data: Option<Arc<T>>,
    error: Option<AppError>,
    updated_at: Instant,
    stale: bool,
    in_flight: Option<(u64, InFlight<T>)>,
    settled_id: u64,
    fetcher: Fetcher<T>,
}

impl<T> CacheEntry<T> {
    fn fresh_data(&self, config: &CacheConfig) -> Option<Arc<T>> {
        if self.status != QueryStatus::Success || self.stale {
            return None;
        }
        if !config.is_fresh(self.updated_at.elapsed()) {
            return None;
        }
        self.data.clone()
    }
}

struct CacheState<T> {
    entries: HashMap<QueryKey, CacheEntry<T>>,
    next_id: u64,
}

/// Control de una caché sin conocer su tipo de resultado
pub trait CacheControl: Send + Sync {
    /// Marcar como obsoleto todo lo cacheado (invalidación gruesa)
    fn invalidate_all(&self);

    fn refetch_stale(&self) -> BoxFuture<'_, usize>;

    fn clear(&self);
}

/// Caché de consultas para un tipo de resultado
pub struct QueryCache<T> {
    state: Mutex<CacheState<T>>,
    config: CacheConfig,
    metrics: Arc<CacheMetrics>,
}

impl<T: Send + Sync + 'static> QueryCache<T> {
    pub fn new(runtime: &CacheRuntime) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                next_id: 1,
            }),
            config: runtime.config.clone(),
            metrics: Arc::clone(&runtime.metrics),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, CacheState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resultado de la consulta: de caché si está fresco, uniéndose a la
    /// petición en vuelo si la hay, o pidiéndolo a la plataforma.
    pub async fn fetch<F, Fut>(&self, key: QueryKey, fetcher: F) -> AppResult<Arc<T>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let fetcher: Fetcher<T> = Arc::new(move || fetcher().boxed());
        self.fetch_with(key, fetcher).await
    }

    async fn fetch_with(&self, key: QueryKey, fetcher: Fetcher<T>) -> AppResult<Arc<T>> {
        let (id, request) = {
            let mut guard = self.state();
            let state = &mut *guard;

            if let Some(entry) = state.entries.get_mut(&key) {
                if let Some(data) = entry.fresh_data(&self.config) {
                    self.metrics.hit(key.entity);
                    debug!("📥 Cache HIT {} ({})", key.entity, key.fingerprint);
                    return Ok(data);
                }
                if let Some((id, request)) = &entry.in_flight {
                    self.metrics.hit(key.entity);
                    debug!("🔗 Uniéndose a la petición en vuelo {} ({})", key.entity, key.fingerprint);
                    (*id, request.clone())
                } else {
                    Self::start(&mut state.next_id, entry, fetcher)
                }
            } else {
                let mut entry = CacheEntry {
                    status: QueryStatus::Idle,
                    data: None,
                    error: None,
                    updated_at: Instant::now(),
                    stale: false,
                    in_flight: None,
                    settled_id: 0,
                    fetcher: Arc::clone(&fetcher),
                };
                let started = Self::start(&mut state.next_id, &mut entry, fetcher);
                state.entries.insert(key.clone(), entry);
                Self::evict_overflow(state, self.config.max_entries);
                started
            }
        };

        let result = request.await;
        self.settle(&key, id, &result);
        result
    }

    /// Arrancar una petición compartida para la entrada
    fn start(next_id: &mut u64, entry: &mut CacheEntry<T>, fetcher: Fetcher<T>) -> (u64, InFlight<T>) {
        let id = *next_id;
        *next_id += 1;

        let request = fetcher().map(|result| result.map(Arc::new)).boxed().shared();

        entry.status = QueryStatus::Loading;
        entry.in_flight = Some((id, request.clone()));
        entry.fetcher = fetcher;
        (id, request)
    }

    /// Aplicar el resultado de la petición `id` (idempotente entre los que esperaban)
    fn settle(&self, key: &QueryKey, id: u64, result: &AppResult<Arc<T>>) {
        let mut state = self.state();
        let Some(entry) = state.entries.get_mut(key) else {
            return;
        };
        if entry.settled_id >= id {
            return;
        }

        let current = matches!(&entry.in_flight, Some((in_flight, _)) if *in_flight == id);
        if current {
            entry.in_flight = None;
        }
        entry.settled_id = id;

        match result {
            Ok(data) => {
                self.metrics.miss(key.entity);
                entry.data = Some(Arc::clone(data));
                entry.error = None;
                entry.updated_at = Instant::now();
                // Invalidada mientras estaba en vuelo: el dato llega ya obsoleto
                entry.stale = !current;
                if entry.in_flight.is_none() {
                    entry.status = QueryStatus::Success;
                }
            }
            Err(error) => {
                self.metrics.miss(key.entity);
                self.metrics.fetch_error(key.entity);
                entry.error = Some(error.clone());
                if entry.in_flight.is_none() {
                    entry.status = QueryStatus::Error;
                }
            }
        }
    }

    /// Quitar las entradas menos recientemente actualizadas que no están en vuelo
    fn evict_overflow(state: &mut CacheState<T>, max_entries: usize) {
        while state.entries.len() > max_entries {
            let oldest = state
                .entries
                .iter()
                .filter(|(_, entry)| entry.in_flight.is_none())
                .min_by_key(|(_, entry)| entry.updated_at)
                .map(|(key, _)| key.clone());

            match oldest {
                Some(key) => {
                    debug!("🧹 Desalojando {} ({})", key.entity, key.fingerprint);
                    state.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Invalidación puntual de una consulta
    pub fn invalidate(&self, key: &QueryKey) {
        let mut state = self.state();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.stale = true;
            entry.in_flight = None;
            self.metrics.invalidation(key.entity);
        }
    }

    pub fn snapshot(&self, key: &QueryKey) -> QuerySnapshot<T> {
        let state = self.state();
        match state.entries.get(key) {
            Some(entry) => QuerySnapshot {
                status: entry.status,
                data: entry.data.clone(),
                error: entry.error.clone(),
                is_stale: entry.stale || !self.config.is_fresh(entry.updated_at.elapsed()),
                is_fetching: entry.in_flight.is_some(),
            },
            None => QuerySnapshot::default(),
        }
    }

    /// Dato cacheado sin ir a la plataforma (aunque esté obsoleto)
    pub fn peek(&self, key: &QueryKey) -> Option<Arc<T>> {
        self.state().entries.get(key).and_then(|entry| entry.data.clone())
    }

    /// Volver a pedir todas las consultas obsoletas; devuelve cuántas se pidieron
    pub async fn refetch_stale(&self) -> usize {
        let stale: Vec<(QueryKey, Fetcher<T>)> = {
            let state = self.state();
            state
                .entries
                .iter()
                .filter(|(_, entry)| entry.stale && entry.in_flight.is_none())
                .map(|(key, entry)| (key.clone(), Arc::clone(&entry.fetcher)))
                .collect()
        };

        let count = stale.len();
        if count > 0 {
            info!("🔄 Refrescando {} consultas obsoletas", count);
        }
        join_all(stale.into_iter().map(|(key, fetcher)| self.fetch_with(key, fetcher))).await;
        count
    }

    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vaciar la caché (cambio de sesión)
    pub fn clear(&self) {
        self.state().entries.clear();
    }
}

impl<T: Send + Sync + 'static> CacheControl for QueryCache<T> {
    fn invalidate_all(&self) {
        let mut state = self.state();
        let mut entities = Vec::new();
        for (key, entry) in state.entries.iter_mut() {
            entry.stale = true;
            entry.in_flight = None;
            if !entities.contains(&key.entity) {
                entities.push(key.entity);
            }
        }
        drop(state);

        for entity in entities {
            self.metrics.invalidation(entity);
            debug!("♻️ Consultas de {} marcadas como obsoletas", entity);
        }
    }

    fn refetch_stale(&self) -> BoxFuture<'_, usize> {
        QueryCache::refetch_stale(self).boxed()
    }

    fn clear(&self) {
        QueryCache::clear(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::query::Filter;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn cache<T: Send + Sync + 'static>(config: CacheConfig) -> QueryCache<T> {
        QueryCache::new(&CacheRuntime::new(config).unwrap())
    }

    fn key(tenant: Uuid) -> QueryKey {
        QueryKey::new("drivers", tenant, &FilterSet::new().with("status", Filter::eq("active")))
    }

    fn counting_fetcher(
        calls: Arc<AtomicUsize>,
        delay: Duration,
    ) -> impl Fn() -> BoxFuture<'static, AppResult<Vec<u32>>> + Send + Sync + 'static {
        move || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) as u32 + 1;
                tokio::time::sleep(delay).await;
                Ok(vec![n])
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn test_identical_queries_hit_cache() {
        let cache = cache::<Vec<u32>>(CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let tenant = Uuid::new_v4();

        let first = cache.fetch(key(tenant), counting_fetcher(calls.clone(), Duration::ZERO)).await.unwrap();
        let second = cache.fetch(key(tenant), counting_fetcher(calls.clone(), Duration::ZERO)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.snapshot(&key(tenant)).status, QueryStatus::Success);
    }

    #[tokio::test]
    async fn test_concurrent_queries_share_one_request() {
        let cache = cache::<Vec<u32>>(CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let tenant = Uuid::new_v4();

        let (a, b) = tokio::join!(
            cache.fetch(key(tenant), counting_fetcher(calls.clone(), Duration::from_millis(20))),
            cache.fetch(key(tenant), counting_fetcher(calls.clone(), Duration::from_millis(20))),
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tenants_do_not_share_entries() {
        let cache = cache::<Vec<u32>>(CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));

        cache.fetch(key(Uuid::new_v4()), counting_fetcher(calls.clone(), Duration::ZERO)).await.unwrap();
        cache.fetch(key(Uuid::new_v4()), counting_fetcher(calls.clone(), Duration::ZERO)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidation_forces_refetch() {
        let cache = cache::<Vec<u32>>(CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let tenant = Uuid::new_v4();

        cache.fetch(key(tenant), counting_fetcher(calls.clone(), Duration::ZERO)).await.unwrap();
        cache.invalidate_all();
        assert!(cache.snapshot(&key(tenant)).is_stale);

        let refreshed = cache.fetch(key(tenant), counting_fetcher(calls.clone(), Duration::ZERO)).await.unwrap();
        assert_eq!(*refreshed, vec![2]);
        assert!(!cache.snapshot(&key(tenant)).is_stale);
    }

    #[tokio::test]
    async fn test_fetch_in_flight_during_invalidation_settles_stale() {
        let cache = Arc::new(cache::<Vec<u32>>(CacheConfig::default()));
        let calls = Arc::new(AtomicUsize::new(0));
        let tenant = Uuid::new_v4();

        let pending = {
            let cache = Arc::clone(&cache);
            let fetcher = counting_fetcher(calls.clone(), Duration::from_millis(30));
            tokio::spawn(async move { cache.fetch(key(tenant), fetcher).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.invalidate_all();

        let old = pending.await.unwrap().unwrap();
        assert_eq!(*old, vec![1]);
        assert!(cache.snapshot(&key(tenant)).is_stale);

        let fresh = cache.fetch(key(tenant), counting_fetcher(calls.clone(), Duration::ZERO)).await.unwrap();
        assert_eq!(*fresh, vec![2]);
    }

    #[tokio::test]
    async fn test_error_then_success_states() {
        let cache = cache::<Vec<u32>>(CacheConfig::default());
        let tenant = Uuid::new_v4();

        let failed = cache
            .fetch(key(tenant), || async { Err::<Vec<u32>, _>(AppError::Network("offline".into())) })
            .await;
        assert!(failed.is_err());
        let snapshot = cache.snapshot(&key(tenant));
        assert_eq!(snapshot.status, QueryStatus::Error);
        assert_eq!(snapshot.error, Some(AppError::Network("offline".into())));

        cache.fetch(key(tenant), || async { Ok(vec![7u32]) }).await.unwrap();
        let snapshot = cache.snapshot(&key(tenant));
        assert_eq!(snapshot.status, QueryStatus::Success);
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_stale_time_expires_entries() {
        let config = CacheConfig::default().with_stale_time(Some(Duration::from_millis(10)));
        let cache = cache::<Vec<u32>>(config);
        let calls = Arc::new(AtomicUsize::new(0));
        let tenant = Uuid::new_v4();

        cache.fetch(key(tenant), counting_fetcher(calls.clone(), Duration::ZERO)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.fetch(key(tenant), counting_fetcher(calls.clone(), Duration::ZERO)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_max_entries_evicts_oldest() {
        let cache = cache::<Vec<u32>>(CacheConfig::default().with_max_entries(2));
        let tenants: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        for tenant in &tenants {
            cache.fetch(key(*tenant), || async { Ok(vec![1u32]) }).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.snapshot(&key(tenants[0])).status, QueryStatus::Idle);
    }

    #[tokio::test]
    async fn test_refetch_stale_reuses_stored_fetcher() {
        let cache = cache::<Vec<u32>>(CacheConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let tenant = Uuid::new_v4();

        cache.fetch(key(tenant), counting_fetcher(calls.clone(), Duration::ZERO)).await.unwrap();
        cache.invalidate_all();

        assert_eq!(cache.refetch_stale().await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.peek(&key(tenant)).as_deref(), Some(&vec![2]));
        assert_eq!(cache.refetch_stale().await, 0);
    }
}
