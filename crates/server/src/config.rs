use shared_types::{AppConfig, FeatureFlags};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::auth::cookies::CookieSettings;
use crate::auth::session::{DEFAULT_SESSION_TTL_MINUTES, MAX_SESSION_TTL_MINUTES};

static FLAGS: OnceLock<FeatureFlags> = OnceLock::new();

/// Path to the config file, relative to the project root.
const CONFIG_PATH: &str = "config.toml";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Read `config.toml`, parse feature flags, and store them in the global
/// `OnceLock`. Safe to call multiple times; only the first call has effect.
///
/// If the file is missing or unparseable, all flags default to `false`.
/// Call after logging is initialised so the outcome is recorded.
pub fn load_feature_flags() -> &'static FeatureFlags {
    FLAGS.get_or_init(|| match std::fs::read_to_string(CONFIG_PATH) {
        Ok(contents) => parse_feature_flags(&contents),
        Err(e) => {
            tracing::warn!(
                path = CONFIG_PATH,
                error = %e,
                "Config file not found, all features off"
            );
            FeatureFlags::default()
        }
    })
}

fn parse_feature_flags(contents: &str) -> FeatureFlags {
    let config: AppConfig = toml::from_str(contents).unwrap_or_else(|e| {
        tracing::warn!(
            path = CONFIG_PATH,
            error = %e,
            "Config file unparseable, all features off"
        );
        AppConfig::default()
    });
    tracing::info!(
        oidc = config.features.oidc,
        telemetry = config.features.telemetry,
        api_docs = config.features.api_docs,
        "Feature flags loaded"
    );
    config.features
}

/// Where role claims come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSource {
    /// The `user_roles` table.
    Database,
    /// The same fixed list for every user.
    Static(Vec<String>),
}

/// Process settings read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub development: bool,
    pub session_secret: String,
    pub session_ttl_minutes: i64,
    pub static_dir: PathBuf,
    pub role_source: RoleSource,
    pub cookies: CookieSettings,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let database_url = get("DATABASE_URL").or_else(|| get("DB_CONNECTION"));

        let max_connections = parse_or("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"), 10)?;

        let development = get("DEPLOY_ENV")
            .map(|env| env.eq_ignore_ascii_case("development"))
            .unwrap_or(false);

        let session_secret = get("SESSION_SECRET").ok_or(ConfigError::Missing("SESSION_SECRET"))?;

        let session_ttl_minutes = parse_or(
            "SESSION_TTL_MINUTES",
            get("SESSION_TTL_MINUTES"),
            DEFAULT_SESSION_TTL_MINUTES,
        )?;
        if !(1..=MAX_SESSION_TTL_MINUTES).contains(&session_ttl_minutes) {
            return Err(ConfigError::Invalid {
                var: "SESSION_TTL_MINUTES",
                reason: format!("must be between 1 and {MAX_SESSION_TTL_MINUTES}"),
            });
        }

        let cookies = CookieSettings {
            secure: parse_or("COOKIE_SECURE", get("COOKIE_SECURE"), true)?,
            domain: get("COOKIE_DOMAIN").map(|d| d.trim().to_string()),
        };

        let static_dir = PathBuf::from(get("STATIC_DIR").unwrap_or_else(|| "wwwroot".to_string()));

        let role_source = match get("ROLE_SOURCE").as_deref() {
            None | Some("static") => RoleSource::Static(
                get("DEFAULT_ROLES")
                    .map(|csv| {
                        csv.split(',')
                            .map(str::trim)
                            .filter(|r| !r.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_else(|| {
                        crate::auth::roles::DEFAULT_ROLES
                            .iter()
                            .map(|r| r.to_string())
                            .collect()
                    }),
            ),
            Some("database") => RoleSource::Database,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "ROLE_SOURCE",
                    reason: format!("expected `database` or `static`, got `{other}`"),
                })
            }
        };

        Ok(Self {
            bind_addr,
            database_url,
            max_connections,
            development,
            session_secret,
            session_ttl_minutes,
            static_dir,
            role_source,
            cookies,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
