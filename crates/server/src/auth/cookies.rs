use axum::http::header::{self, InvalidHeaderValue};
use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use cookie::{Cookie, SameSite};

pub const SESSION_COOKIE: &str = "weatherdesk_session";

/// Attributes applied to every session cookie the server writes.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub secure: bool,
    pub domain: Option<String>,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            secure: true,
            domain: None,
        }
    }
}

impl CookieSettings {
    fn base<'c>(&self, value: &'c str) -> cookie::CookieBuilder<'c> {
        let mut builder = Cookie::build((SESSION_COOKIE, value))
            .http_only(true)
            .same_site(SameSite::Lax)
            .path("/")
            .secure(self.secure);
        if let Some(domain) = &self.domain {
            builder = builder.domain(domain.clone());
        }
        builder
    }

    /// Set-Cookie value carrying a session token until `expires_at`.
    pub fn session_cookie(
        &self,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<HeaderValue, InvalidHeaderValue> {
        let seconds = (expires_at - Utc::now()).num_seconds().max(0);
        let cookie = self
            .base(token)
            .max_age(cookie::time::Duration::seconds(seconds))
            .build();
        HeaderValue::from_str(&cookie.to_string())
    }

    /// Set-Cookie value that removes the session cookie.
    pub fn clear_cookie(&self) -> HeaderValue {
        let cookie = self.base("").max_age(cookie::time::Duration::ZERO).build();
        HeaderValue::from_str(&cookie.to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("weatherdesk_session=; Max-Age=0; Path=/"))
    }

    pub fn append_session(&self, headers: &mut HeaderMap, token: &str, expires_at: DateTime<Utc>) {
        match self.session_cookie(token, expires_at) {
            Ok(value) => {
                headers.append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "Session cookie is not a valid header value"),
        }
    }

    pub fn append_clear(&self, headers: &mut HeaderMap) {
        headers.append(header::SET_COOKIE, self.clear_cookie());
    }
}

/// The session token from the Cookie header, if present and non-empty.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    extract_cookie(headers, SESSION_COOKIE).filter(|v| !v.is_empty())
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}
