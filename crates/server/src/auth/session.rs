use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::principal::Principal;

/// Default session lifetime: 14 days, renewed on activity.
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 14 * 24 * 60;

/// Longest accepted session lifetime: one year.
pub const MAX_SESSION_TTL_MINUTES: i64 = 365 * 24 * 60;

/// Signed payload stored in the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    /// Unique token identifier, so two sessions issued in the same second differ.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid session token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("session expiry is out of range")]
    Expiry,
}

/// A freshly signed session credential.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// A session cookie that passed signature and expiry checks.
#[derive(Debug, Clone)]
pub struct ValidSession {
    pub principal: Principal,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ValidSession {
    /// Sliding expiration: renew once more than half the lifetime has elapsed.
    pub fn needs_sliding_renewal(&self, now: DateTime<Utc>) -> bool {
        let lifetime = self.expires_at - self.issued_at;
        now - self.issued_at > lifetime / 2
    }
}

/// Signs and verifies session tokens with an HMAC secret.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionKeys {
    /// `ttl_minutes` is clamped to `1..=MAX_SESSION_TTL_MINUTES`.
    pub fn new(secret: &[u8], ttl_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::minutes(ttl_minutes.clamp(1, MAX_SESSION_TTL_MINUTES)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a session for `principal`, valid for the configured lifetime.
    pub fn issue(&self, principal: &Principal) -> Result<IssuedSession, SessionError> {
        self.issue_at(principal, Utc::now())
    }

    pub fn issue_at(
        &self,
        principal: &Principal,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, SessionError> {
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or(SessionError::Expiry)?;
        let claims = SessionClaims {
            sub: principal.id.clone(),
            name: principal.name.clone(),
            email: principal.email.clone(),
            roles: principal.roles().to_vec(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Some(uuid::Uuid::new_v4().to_string()),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok(IssuedSession { token, expires_at })
    }

    /// Verify signature and expiry and rebuild the principal.
    pub fn validate(&self, token: &str) -> Result<ValidSession, SessionError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &Validation::default())?;
        let claims = data.claims;
        let issued_at = Utc
            .timestamp_opt(claims.iat, 0)
            .single()
            .unwrap_or_else(Utc::now);
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .unwrap_or(issued_at);
        Ok(ValidSession {
            principal: Principal::new(claims.sub, claims.name, claims.email, claims.roles),
            issued_at,
            expires_at,
        })
    }
}
