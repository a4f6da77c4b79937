use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use sqlx::{Pool, Postgres};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use crate::auth::roles::RoleStore;

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Upper bound on each dependency check.
const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Record the application start time. Call once during startup.
pub fn record_start_time() {
    START_TIME.get_or_init(Instant::now);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Reachability {
    Ok,
    Unreachable,
    NotConfigured,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RoleStoreHealth {
    /// `database`, `static` or `memory`.
    pub source: String,
    pub status: Reachability,
}

/// Liveness plus the state of the stores requests depend on.
///
/// `status` is `degraded` when the database or role store cannot be
/// reached; signed-in requests fail with 503 until it recovers.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub db: Reachability,
    pub roles: RoleStoreHealth,
    pub uptime_seconds: u64,
    pub version: String,
}

async fn check_dependency<E: std::fmt::Display>(
    what: &'static str,
    check: impl Future<Output = Result<(), E>>,
) -> Reachability {
    match tokio::time::timeout(CHECK_TIMEOUT, check).await {
        Ok(Ok(())) => Reachability::Ok,
        Ok(Err(e)) => {
            tracing::warn!(dependency = what, error = %e, "Dependency check failed");
            Reachability::Unreachable
        }
        Err(_) => {
            tracing::warn!(dependency = what, "Dependency check timed out");
            Reachability::Unreachable
        }
    }
}

/// Report database and role-store reachability.
///
/// Sits outside the session layer, so it never triggers a claims refresh.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "All dependencies reachable", body = HealthResponse),
        (status = 503, description = "Database or role store unreachable", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(
    State(pool): State<Option<Pool<Postgres>>>,
    State(roles): State<Arc<dyn RoleStore>>,
) -> (StatusCode, Json<HealthResponse>) {
    let db = match &pool {
        None => Reachability::NotConfigured,
        Some(pool) => {
            check_dependency("database", async {
                sqlx::query_scalar::<_, i32>("SELECT 1")
                    .fetch_one(pool)
                    .await
                    .map(|_| ())
            })
            .await
        }
    };
    let roles = RoleStoreHealth {
        source: roles.source().to_string(),
        status: check_dependency("role_store", roles.ping()).await,
    };

    let degraded = db == Reachability::Unreachable || roles.status == Reachability::Unreachable;
    let (code, status) = if degraded {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            db,
            roles,
            uptime_seconds: START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
