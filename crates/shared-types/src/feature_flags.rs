use serde::{Deserialize, Serialize};

/// Feature flags controlling which optional integrations are active.
///
/// Loaded from `config.toml` at server startup. Every field defaults to
/// `false` so that a missing or incomplete config file disables all
/// optional features.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FeatureFlags {
    /// OpenID Connect login at `/login`.
    #[serde(default)]
    pub oidc: bool,
    /// OTLP trace and log export.
    #[serde(default)]
    pub telemetry: bool,
    /// Swagger UI at `/swagger`.
    #[serde(default)]
    pub api_docs: bool,
}

/// Top-level config file structure matching `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub features: FeatureFlags,
}
