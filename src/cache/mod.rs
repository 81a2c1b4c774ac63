//! Cache
//! 
//! Caché de consultas del binding layer: una entrada por (entidad, tenant,
//! filtros), de-duplicación de peticiones en vuelo e invalidación tras cada
//! mutación.

pub mod cache_config;
pub mod metrics;
pub mod query_cache;

use std::sync::Arc;

pub use cache_config::CacheConfig;
pub use metrics::CacheMetrics;
pub use query_cache::{CacheControl, QueryCache, QueryKey, QuerySnapshot, QueryStatus};

/// Configuración y métricas compartidas por todas las cachés
#[derive(Clone)]
pub struct CacheRuntime {
    pub config: CacheConfig,
    pub metrics: Arc<CacheMetrics>,
}

impl CacheRuntime {
    pub fn new(config: CacheConfig) -> prometheus::Result<Self> {
        Ok(Self {
            config,
            metrics: Arc::new(CacheMetrics::new()?),
        })
    }
}
