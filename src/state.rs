//! Shared application state
//! 
//! Este módulo agrupa los servicios del binding layer sobre una única
//! implementación de la plataforma.

use std::sync::Arc;

use tracing::info;

use crate::cache::CacheRuntime;
use crate::clients::{InMemoryPlatform, Platform, PlatformClient};
use crate::config::environment::EnvironmentConfig;
use crate::models::RequestContext;
use crate::services::{AuthService, CompanyService, DocumentService, DriverService, VehicleService};
use crate::utils::errors::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub cache: CacheRuntime,
    pub auth: Arc<AuthService>,
    pub drivers: Arc<DriverService>,
    pub vehicles: Arc<VehicleService>,
    pub companies: Arc<CompanyService>,
    pub documents: Arc<DocumentService>,
}

impl AppState {
    pub fn new<P: Platform + 'static>(platform: Arc<P>, config: EnvironmentConfig) -> AppResult<Self> {
        let cache = CacheRuntime::new(config.cache_config())
            .map_err(|e| AppError::Unknown(format!("Error registrando métricas de caché: {}", e)))?;

        let auth = AuthService::new(platform.clone(), platform.clone(), config.platform_jwt_secret.clone());
        let drivers = DriverService::new(platform.clone(), &cache, config.license_warning_days);
        let vehicles = VehicleService::new(platform.clone(), &cache);
        let companies = CompanyService::new(platform.clone(), &cache);
        let documents = DocumentService::new(
            platform.clone(),
            platform,
            &cache,
            config.documents_bucket.clone(),
            config.signed_url_ttl_secs,
        );

        Ok(Self {
            config,
            cache,
            auth: Arc::new(auth),
            drivers: Arc::new(drivers),
            vehicles: Arc::new(vehicles),
            companies: Arc::new(companies),
            documents: Arc::new(documents),
        })
    }

    /// Estado sobre el cliente HTTP de la plataforma
    pub fn connect(config: EnvironmentConfig) -> AppResult<Self> {
        let client = PlatformClient::from_config(&config)?;
        info!("🚚 Fleet manager conectado a {}", client.base_url());
        Self::new(Arc::new(client), config)
    }

    /// Estado sobre una plataforma en memoria (tests, ejecuciones offline)
    pub fn in_memory(platform: Arc<InMemoryPlatform>) -> AppResult<Self> {
        let mut config = EnvironmentConfig::for_platform("memory://fleet", "anon");
        config.platform_jwt_secret = Some(platform.jwt_secret().to_string());
        Self::new(platform, config)
    }

    /// Olvidar todo lo cacheado (cambio de usuario o de tenant)
    pub fn clear_caches(&self) {
        self.drivers.clear_cache();
        self.vehicles.clear_cache();
        self.companies.clear_cache();
        self.documents.clear_cache();
    }

    /// Cerrar sesión y vaciar las cachés
    pub async fn sign_out(&self, ctx: &RequestContext) -> AppResult<()> {
        self.auth.sign_out(ctx).await?;
        self.clear_caches();
        Ok(())
    }

    /// Métricas de la caché en formato texto
    pub fn metrics(&self) -> String {
        self.cache.metrics.render()
    }
}
