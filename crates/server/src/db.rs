use axum::extract::FromRef;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::sync::Arc;

use crate::auth::cookies::CookieSettings;
use crate::auth::login_state::LoginStateStore;
use crate::auth::oidc::OidcClient;
use crate::auth::roles::RoleStore;
use crate::auth::session::SessionKeys;
use crate::repo::weather::ForecastStore;

/// Shared application state passed to Axum handlers via `State`.
/// Derives `FromRef` so handlers can extract single fields directly.
#[derive(Clone, FromRef)]
pub struct AppState {
    /// `None` when the server runs without a database (in-memory stores).
    pub pool: Option<Pool<Postgres>>,
    pub forecasts: Arc<dyn ForecastStore>,
    pub roles: Arc<dyn RoleStore>,
    pub sessions: Arc<SessionKeys>,
    pub cookies: Arc<CookieSettings>,
    pub oidc: Option<Arc<OidcClient>>,
    pub login_states: Arc<LoginStateStore>,
}

impl AppState {
    /// State without a database or identity provider.
    pub fn new(
        forecasts: Arc<dyn ForecastStore>,
        roles: Arc<dyn RoleStore>,
        sessions: SessionKeys,
        cookies: CookieSettings,
    ) -> Self {
        Self {
            pool: None,
            forecasts,
            roles,
            sessions: Arc::new(sessions),
            cookies: Arc::new(cookies),
            oidc: None,
            login_states: Arc::new(LoginStateStore::default()),
        }
    }

    pub fn with_pool(mut self, pool: Pool<Postgres>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_oidc(mut self, client: OidcClient) -> Self {
        self.oidc = Some(Arc::new(client));
        self
    }
}

/// Create a connection pool. Uses `connect_lazy` so no connections open
/// until the first query.
pub fn create_pool(database_url: &str, max_connections: u32) -> Result<Pool<Postgres>, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect_lazy(database_url)
}

/// Run database migrations against the given pool.
pub async fn run_migrations(pool: &Pool<Postgres>) -> Result<(), sqlx::migrate::MigrateError> {
    tracing::info!("Applying database migrations");
    sqlx::migrate!("../../migrations").run(pool).await?;
    tracing::info!("Migrations applied");
    Ok(())
}
