//! Configuración de variables de entorno
//! 
//! Este módulo carga la configuración de la plataforma (URL, clave anónima,
//! secreto JWT), del bucket de documentos y de la caché de consultas.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use crate::cache::CacheConfig;

/// Ventana máxima de aviso de licencias (10 años)
const MAX_WARNING_DAYS: i64 = 3650;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub platform_url: String,
    pub platform_anon_key: String,
    pub platform_jwt_secret: Option<String>,
    pub documents_bucket: String,
    pub request_timeout: Duration,
    pub signed_url_ttl_secs: u64,
    pub license_warning_days: i64,
    pub cache_stale_time: Option<Duration>,
    pub cache_max_entries: usize,
    pub cache_refetch_on_invalidate: bool,
}

impl EnvironmentConfig {
    /// Configuración mínima para una plataforma dada, con valores por defecto
    pub fn for_platform(platform_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let cache = CacheConfig::default();
        Self {
            environment: "development".to_string(),
            platform_url: platform_url.into(),
            platform_anon_key: anon_key.into(),
            platform_jwt_secret: None,
            documents_bucket: "documents".to_string(),
            request_timeout: Duration::from_secs(30),
            signed_url_ttl_secs: 3600,
            license_warning_days: 30,
            cache_stale_time: cache.stale_time,
            cache_max_entries: cache.max_entries,
            cache_refetch_on_invalidate: cache.refetch_on_invalidate,
        }
    }

    /// Cargar desde variables de entorno (llamar a `dotenvy::dotenv()` antes)
    pub fn from_env() -> Result<Self> {
        let platform_url = required("PLATFORM_URL")?;
        let anon_key = required("PLATFORM_ANON_KEY")?;
        let defaults = Self::for_platform(platform_url.trim_end_matches('/'), anon_key);

        let stale_secs: Option<u64> = optional("CACHE_STALE_TIME_SECS")?;
        let cache_stale_time = match stale_secs {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.cache_stale_time,
        };

        Ok(Self {
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            platform_jwt_secret: env::var("PLATFORM_JWT_SECRET").ok().filter(|s| !s.is_empty()),
            documents_bucket: env::var("DOCUMENTS_BUCKET").unwrap_or(defaults.documents_bucket),
            request_timeout: optional("REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            signed_url_ttl_secs: optional("SIGNED_URL_TTL_SECS")?.unwrap_or(defaults.signed_url_ttl_secs),
            license_warning_days: match optional("LICENSE_WARNING_DAYS")? {
                Some(days) => warning_days(days)?,
                None => defaults.license_warning_days,
            },
            cache_stale_time,
            cache_max_entries: optional("CACHE_MAX_ENTRIES")?.unwrap_or(defaults.cache_max_entries),
            cache_refetch_on_invalidate: optional("CACHE_REFETCH_ON_INVALIDATE")?
                .unwrap_or(defaults.cache_refetch_on_invalidate),
            ..defaults
        })
    }

    /// Configuración de la caché de consultas
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::default()
            .with_stale_time(self.cache_stale_time)
            .with_max_entries(self.cache_max_entries)
            .with_refetch_on_invalidate(self.cache_refetch_on_invalidate)
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("{} must be set", name))
}

fn warning_days(days: i64) -> Result<i64> {
    if !(0..=MAX_WARNING_DAYS).contains(&days) {
        bail!("LICENSE_WARNING_DAYS must be between 0 and {}", MAX_WARNING_DAYS);
    }
    Ok(days)
}

fn optional<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("{} must be a valid value", name)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_platform() {
        let config = EnvironmentConfig::for_platform("http://localhost:54321", "anon");
        assert_eq!(config.environment, "development");
        assert_eq!(config.documents_bucket, "documents");
        assert_eq!(config.license_warning_days, 30);
        assert_eq!(config.cache_config().max_entries, CacheConfig::default().max_entries);
    }

    #[test]
    fn test_optional_parse_error_is_reported() {
        env::set_var("FLEET_TEST_BAD_NUMBER", "abc");
        let result: Result<Option<u64>> = optional("FLEET_TEST_BAD_NUMBER");
        assert!(result.is_err());
        env::remove_var("FLEET_TEST_BAD_NUMBER");

        let missing: Option<u64> = optional("FLEET_TEST_MISSING_NUMBER").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_warning_days_are_bounded() {
        assert_eq!(warning_days(0).unwrap(), 0);
        assert_eq!(warning_days(MAX_WARNING_DAYS).unwrap(), MAX_WARNING_DAYS);
        assert!(warning_days(-1).is_err());
        assert!(warning_days(1_000_000_000).is_err());
    }

    #[test]
    fn test_cache_config_clamps_max_entries() {
        let mut config = EnvironmentConfig::for_platform("http://localhost:54321", "anon");
        config.cache_max_entries = 0;
        config.cache_stale_time = None;

        let cache = config.cache_config();
        assert_eq!(cache.max_entries, 1);
        assert_eq!(cache.stale_time, None);
    }
}
