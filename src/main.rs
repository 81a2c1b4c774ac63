use anyhow::{Context, Result};
use chrono::Utc;
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fleet_manager::config::environment::EnvironmentConfig;
use fleet_manager::models::auth::SignInRequest;
use fleet_manager::models::document::{DocumentFilters, DocumentStatus};
use fleet_manager::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging (RUST_LOG, por defecto info)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚚 Fleet Manager");
    info!("================");

    let config = EnvironmentConfig::from_env()?;
    let warning_days = config.license_warning_days;
    let state = AppState::connect(config)?;

    let email = std::env::var("FLEET_EMAIL").context("FLEET_EMAIL must be set")?;
    let password = std::env::var("FLEET_PASSWORD").context("FLEET_PASSWORD must be set")?;

    let session = state.auth.sign_in(SignInRequest { email, password }).await?;
    let ctx = session.context.clone();

    if ctx.tenant_id.is_none() {
        warn!("⚠️ El usuario no pertenece a ninguna company, nada que mostrar");
        state.sign_out(&ctx).await?;
        return Ok(());
    }

    if let Some(company) = state.companies.company(&ctx).await? {
        info!("🏢 {} ({})", company.name, company.settings.timezone);
    }

    if let Some(counts) = state.drivers.status_counts(&ctx).await? {
        info!("👥 Conductores:");
        for (status, count) in counts.iter() {
            info!("   {}: {}", status, count);
        }
    }

    if let Some(counts) = state.vehicles.status_counts(&ctx).await? {
        info!("🚛 Vehículos:");
        for (status, count) in counts.iter() {
            info!("   {}: {}", status, count);
        }
    }

    if let Some(expiring) = state.drivers.expiring_licenses(&ctx).await? {
        info!("🪪 Licencias que vencen en {} días: {}", warning_days, expiring.len());
        for driver in expiring.iter() {
            info!("   {} - {}", driver.full_name(), driver.license_expiry);
        }
    }

    let pending = DocumentFilters {
        status: Some(DocumentStatus::Pending),
        ..DocumentFilters::default()
    };
    if let Some(documents) = state.documents.documents(&ctx, &pending).await? {
        info!("📄 Documentos pendientes de revisión: {}", documents.len());
    }

    info!("📊 Resumen generado {}", Utc::now().format("%Y-%m-%d %H:%M"));
    state.sign_out(&ctx).await?;
    Ok(())
}
