use std::net::SocketAddr;
use std::sync::Arc;

use server::auth::oidc::{OidcClient, OidcSettings};
use server::auth::roles::{PgRoleStore, RoleStore, StaticRoleStore};
use server::auth::session::SessionKeys;
use server::config::{ConfigError, RoleSource, Settings};
use server::db::{self, AppState};
use server::repo::weather::{ForecastStore, MemoryForecastStore, PgForecastStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present; OS environment wins.
    let _ = dotenvy::dotenv();

    server::telemetry::init_logging();
    let flags = server::config::load_feature_flags();
    if flags.telemetry {
        server::telemetry::init_telemetry();
    }
    server::health::record_start_time();

    let settings = Settings::from_env()?;

    let pool = settings
        .database_url
        .as_deref()
        .map(|url| db::create_pool(url, settings.max_connections))
        .transpose()?;

    let forecasts: Arc<dyn ForecastStore> = match &pool {
        Some(pool) => {
            db::run_migrations(pool).await?;
            Arc::new(PgForecastStore::new(pool.clone()))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, forecasts are kept in memory");
            Arc::new(MemoryForecastStore::new())
        }
    };

    let roles: Arc<dyn RoleStore> = match (&settings.role_source, &pool) {
        (RoleSource::Database, Some(pool)) => Arc::new(PgRoleStore::new(pool.clone())),
        (RoleSource::Database, None) => return Err(ConfigError::Missing("DATABASE_URL").into()),
        (RoleSource::Static(list), _) => Arc::new(StaticRoleStore::new(list.iter().cloned())),
    };

    server::seed::seed(forecasts.as_ref(), settings.development).await?;

    let mut state = AppState::new(
        forecasts,
        roles,
        SessionKeys::new(settings.session_secret.as_bytes(), settings.session_ttl_minutes),
        settings.cookies.clone(),
    );
    if let Some(pool) = pool {
        state = state.with_pool(pool);
    }
    if flags.oidc {
        state = state.with_oidc(OidcClient::new(OidcSettings::from_env()?)?);
    } else {
        tracing::info!("OIDC login disabled, /login answers 503");
    }

    let static_dir = settings
        .static_dir
        .is_dir()
        .then_some(settings.static_dir.as_path());
    let app = server::openapi::app_router(state, flags, static_dir);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr).await?;
    tracing::info!(addr = %settings.bind_addr, "Listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
