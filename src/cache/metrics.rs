//! Métricas de la caché de consultas (registro Prometheus propio)

use prometheus::{opts, Encoder, IntCounterVec, Registry, TextEncoder};

pub struct CacheMetrics {
    registry: Registry,
    hits: IntCounterVec,
    misses: IntCounterVec,
    invalidations: IntCounterVec,
    fetch_errors: IntCounterVec,
}

impl CacheMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let hits = IntCounterVec::new(
            opts!("fleet_query_cache_hits_total", "Queries served from cache or joined in flight"),
            &["entity"],
        )?;
        let misses = IntCounterVec::new(
            opts!("fleet_query_cache_misses_total", "Queries that reached the platform"),
            &["entity"],
        )?;
        let invalidations = IntCounterVec::new(
            opts!("fleet_query_cache_invalidations_total", "Invalidations after mutations"),
            &["entity"],
        )?;
        let fetch_errors = IntCounterVec::new(
            opts!("fleet_query_cache_fetch_errors_total", "Fetches that settled with an error"),
            &["entity"],
        )?;

        registry.register(Box::new(hits.clone()))?;
        registry.register(Box::new(misses.clone()))?;
        registry.register(Box::new(invalidations.clone()))?;
        registry.register(Box::new(fetch_errors.clone()))?;

        Ok(Self {
            registry,
            hits,
            misses,
            invalidations,
            fetch_errors,
        })
    }

    pub fn hit(&self, entity: &str) {
        self.hits.with_label_values(&[entity]).inc();
    }

    pub fn miss(&self, entity: &str) {
        self.misses.with_label_values(&[entity]).inc();
    }

    pub fn invalidation(&self, entity: &str) {
        self.invalidations.with_label_values(&[entity]).inc();
    }

    pub fn fetch_error(&self, entity: &str) {
        self.fetch_errors.with_label_values(&[entity]).inc();
    }

    pub fn hits_for(&self, entity: &str) -> u64 {
        self.hits.with_label_values(&[entity]).get()
    }

    pub fn misses_for(&self, entity: &str) -> u64 {
        self.misses.with_label_values(&[entity]).get()
    }

    pub fn invalidations_for(&self, entity: &str) -> u64 {
        self.invalidations.with_label_values(&[entity]).get()
    }

    /// Exposición en formato texto
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!("⚠️ Error codificando métricas: {}", e);
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
