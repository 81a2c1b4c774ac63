//! Configuración de cache
//! 
//! Este módulo contiene la configuración de la caché de consultas.

use std::time::Duration;

/// Configuración del cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Ventana en la que un resultado se sirve sin volver a la plataforma.
    /// `None`: sólo la invalidación lo marca como obsoleto.
    pub stale_time: Option<Duration>,
    pub max_entries: usize,
    /// Volver a pedir las consultas obsoletas justo después de invalidar
    pub refetch_on_invalidate: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time: Some(Duration::from_secs(300)), // 5 minutos
            max_entries: 500,
            refetch_on_invalidate: false,
        }
    }
}

impl CacheConfig {
    pub fn with_stale_time(mut self, stale_time: Option<Duration>) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn with_refetch_on_invalidate(mut self, enabled: bool) -> Self {
        self.refetch_on_invalidate = enabled;
        self
    }

    /// ¿Sigue fresco un resultado con esta antigüedad?
    pub fn is_fresh(&self, age: Duration) -> bool {
        match self.stale_time {
            Some(stale_time) => age < stale_time,
            None => true,
        }
    }
}
