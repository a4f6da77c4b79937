use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
};
use serde::Deserialize;

use super::principal::Principal;
use crate::config::ConfigError;

/// OAuth client with auth URL, token URL, and redirect URL set.
type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

const SCOPES: [&str; 3] = ["openid", "profile", "email"];

/// Identity provider endpoints and client registration.
#[derive(Debug, Clone)]
pub struct OidcSettings {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub domain_hint: Option<String>,
}

impl OidcSettings {
    /// Read `OIDC_*` variables.
    ///
    /// Endpoints come from `OIDC_TENANT_ID` (Microsoft identity platform) or
    /// from explicit `OIDC_AUTH_URL`, `OIDC_TOKEN_URL` and `OIDC_USERINFO_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let client_id = get("OIDC_CLIENT_ID").ok_or(ConfigError::Missing("OIDC_CLIENT_ID"))?;
        let redirect_url =
            get("OIDC_REDIRECT_URL").ok_or(ConfigError::Missing("OIDC_REDIRECT_URL"))?;

        let (auth_url, token_url, userinfo_url) = match get("OIDC_TENANT_ID") {
            Some(tenant) => (
                format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0/authorize"),
                format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token"),
                "https://graph.microsoft.com/oidc/userinfo".to_string(),
            ),
            None => (
                get("OIDC_AUTH_URL").ok_or(ConfigError::Missing("OIDC_AUTH_URL"))?,
                get("OIDC_TOKEN_URL").ok_or(ConfigError::Missing("OIDC_TOKEN_URL"))?,
                get("OIDC_USERINFO_URL").ok_or(ConfigError::Missing("OIDC_USERINFO_URL"))?,
            ),
        };

        Ok(Self {
            client_id,
            client_secret: get("OIDC_CLIENT_SECRET"),
            redirect_url,
            auth_url,
            token_url,
            userinfo_url,
            domain_hint: get("OIDC_DOMAIN_HINT"),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("invalid identity provider URL: {0}")]
    Url(#[from] oauth2::url::ParseError),
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    #[error("userinfo request failed: {0}")]
    UserInfo(#[from] reqwest::Error),
}

/// An authorization redirect plus the secrets needed to finish it.
pub struct AuthorizationRequest {
    pub url: String,
    pub csrf_state: String,
    pub pkce_verifier: PkceCodeVerifier,
}

/// Claims returned by the userinfo endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
}

impl UserInfo {
    /// Principal for a fresh login, before roles are attached.
    pub fn into_principal(self, roles: Vec<String>) -> Principal {
        let email = self.email.or(self.preferred_username);
        Principal::new(Some(self.sub), self.name, email, roles)
    }
}

/// Authorization-code + PKCE client for a single identity provider.
pub struct OidcClient {
    settings: OidcSettings,
    oauth: ConfiguredClient,
    http: reqwest::Client,
}

impl OidcClient {
    pub fn new(settings: OidcSettings) -> Result<Self, OidcError> {
        let mut oauth = BasicClient::new(ClientId::new(settings.client_id.clone()))
            .set_auth_uri(AuthUrl::new(settings.auth_url.clone())?)
            .set_token_uri(TokenUrl::new(settings.token_url.clone())?)
            .set_redirect_uri(RedirectUrl::new(settings.redirect_url.clone())?);
        if let Some(secret) = &settings.client_secret {
            oauth = oauth.set_client_secret(ClientSecret::new(secret.clone()));
        }

        // Token endpoint must not follow redirects (SSRF guard).
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            settings,
            oauth,
            http,
        })
    }

    /// Build the identity provider redirect with a fresh CSRF state and PKCE pair.
    pub fn authorize(&self) -> AuthorizationRequest {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = self
            .oauth
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge);
        for scope in SCOPES {
            request = request.add_scope(Scope::new(scope.to_string()));
        }
        if let Some(hint) = &self.settings.domain_hint {
            request = request.add_extra_param("domain_hint", hint.clone());
        }

        let (url, csrf) = request.url();
        AuthorizationRequest {
            url: url.to_string(),
            csrf_state: csrf.secret().clone(),
            pkce_verifier,
        }
    }

    /// Exchange the authorization code and read the user's claims.
    pub async fn complete(
        &self,
        code: String,
        verifier: PkceCodeVerifier,
    ) -> Result<UserInfo, OidcError> {
        let token = self
            .oauth
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(verifier)
            .request_async(&self.http)
            .await
            .map_err(|e| OidcError::TokenExchange(e.to_string()))?;

        let info = self
            .http
            .get(&self.settings.userinfo_url)
            .bearer_auth(token.access_token().secret())
            .send()
            .await?
            .error_for_status()?
            .json::<UserInfo>()
            .await?;
        Ok(info)
    }
}
