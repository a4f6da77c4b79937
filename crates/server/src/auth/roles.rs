use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use std::collections::HashMap;
use std::sync::RwLock;

/// Roles every user gets from [`StaticRoleStore::default`].
pub const DEFAULT_ROLES: &[&str] = &["User", "SampleRole"];

/// Why the authoritative role set could not be read.
#[derive(Debug, thiserror::Error)]
pub enum RoleLookupError {
    #[error("role store query failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("role store unavailable: {0}")]
    Unavailable(String),
}

/// Source of truth for a user's roles.
///
/// Implementations are read-only from the caller's perspective and are
/// queried on every request that carries a session.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn roles_for_user(&self, user_id: &str) -> Result<Vec<String>, RoleLookupError>;

    /// Short label for where roles come from, shown by `/health`.
    fn source(&self) -> &'static str;

    /// Confirm the store can answer lookups.
    async fn ping(&self) -> Result<(), RoleLookupError> {
        Ok(())
    }
}

/// Roles read from the `user_roles` table.
#[derive(Clone)]
pub struct PgRoleStore {
    pool: Pool<Postgres>,
}

impl PgRoleStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleStore for PgRoleStore {
    async fn roles_for_user(&self, user_id: &str) -> Result<Vec<String>, RoleLookupError> {
        let roles = sqlx::query_scalar::<_, String>(
            "SELECT role FROM user_roles WHERE user_id = $1 ORDER BY role",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    fn source(&self) -> &'static str {
        "database"
    }

    async fn ping(&self) -> Result<(), RoleLookupError> {
        sqlx::query_scalar::<_, i32>("SELECT 1 FROM user_roles LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(())
    }
}

/// Hands every user the same fixed role list.
#[derive(Debug, Clone)]
pub struct StaticRoleStore {
    roles: Vec<String>,
}

impl StaticRoleStore {
    pub fn new(roles: impl IntoIterator<Item = String>) -> Self {
        Self {
            roles: roles.into_iter().collect(),
        }
    }

    /// Parse a comma-separated role list such as `User,SampleRole`.
    pub fn from_csv(csv: &str) -> Self {
        Self::new(
            csv.split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from),
        )
    }
}

impl Default for StaticRoleStore {
    fn default() -> Self {
        Self::new(DEFAULT_ROLES.iter().map(|r| r.to_string()))
    }
}

#[async_trait]
impl RoleStore for StaticRoleStore {
    async fn roles_for_user(&self, _user_id: &str) -> Result<Vec<String>, RoleLookupError> {
        Ok(self.roles.clone())
    }

    fn source(&self) -> &'static str {
        "static"
    }
}

/// In-process role table that can be edited while the server runs.
/// Users without an entry have no roles.
#[derive(Debug, Default)]
pub struct MemoryRoleStore {
    roles: RwLock<HashMap<String, Vec<String>>>,
    unavailable: RwLock<Option<String>>,
}

impl MemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_roles(&self, user_id: &str, roles: &[&str]) {
        let mut table = self.roles.write().unwrap_or_else(|e| e.into_inner());
        table.insert(
            user_id.to_string(),
            roles.iter().map(|r| r.to_string()).collect(),
        );
    }

    /// Make every lookup fail with `reason` until [`MemoryRoleStore::recover`].
    pub fn fail_with(&self, reason: &str) {
        *self.unavailable.write().unwrap_or_else(|e| e.into_inner()) = Some(reason.to_string());
    }

    pub fn recover(&self) {
        *self.unavailable.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn check_available(&self) -> Result<(), RoleLookupError> {
        match self
            .unavailable
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            Some(reason) => Err(RoleLookupError::Unavailable(reason)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn roles_for_user(&self, user_id: &str) -> Result<Vec<String>, RoleLookupError> {
        self.check_available()?;
        let table = self.roles.read().unwrap_or_else(|e| e.into_inner());
        Ok(table.get(user_id).cloned().unwrap_or_default())
    }

    fn source(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), RoleLookupError> {
        self.check_available()
    }
}
