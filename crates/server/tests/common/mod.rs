use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use server::auth::cookies::{CookieSettings, SESSION_COOKIE};
use server::auth::roles::MemoryRoleStore;
use server::auth::session::SessionKeys;
use server::auth::Principal;
use server::db::AppState;
use server::repo::weather::MemoryForecastStore;
use shared_types::FeatureFlags;
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"integration-test-session-secret";
pub const TEST_TTL_MINUTES: i64 = 60;

/// Router wired to in-memory stores, plus handles to those stores.
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub roles: Arc<MemoryRoleStore>,
    pub forecasts: Arc<MemoryForecastStore>,
    pub keys: SessionKeys,
}

#[allow(dead_code)]
pub fn test_app() -> TestApp {
    test_app_with_pool(None)
}

/// Like [`test_app`], with `pool` as the database handle `/health` checks.
#[allow(dead_code)]
pub fn test_app_with_pool(pool: Option<Pool<Postgres>>) -> TestApp {
    let roles = Arc::new(MemoryRoleStore::new());
    let forecasts = Arc::new(MemoryForecastStore::new());
    let keys = SessionKeys::new(TEST_SECRET, TEST_TTL_MINUTES);
    let mut state = AppState::new(
        forecasts.clone(),
        roles.clone(),
        keys.clone(),
        CookieSettings {
            secure: false,
            domain: None,
        },
    );
    if let Some(pool) = pool {
        state = state.with_pool(pool);
    }
    let flags = FeatureFlags {
        api_docs: true,
        ..Default::default()
    };

    TestApp {
        router: server::openapi::app_router(state, &flags, None),
        roles,
        forecasts,
        keys,
    }
}

#[allow(dead_code)]
pub fn principal(id: &str, roles: &[&str]) -> Principal {
    Principal::new(
        Some(id.to_string()),
        Some("Ann Example".to_string()),
        Some("ann@example.edu".to_string()),
        roles.iter().map(|r| r.to_string()),
    )
}

#[allow(dead_code)]
/// A `Cookie` header value carrying a session for `principal`.
pub fn session_cookie(keys: &SessionKeys, principal: &Principal) -> String {
    let issued = keys.issue(principal).unwrap();
    format!("{SESSION_COOKIE}={}", issued.token)
}

#[allow(dead_code)]
pub fn session_cookie_issued_at(
    keys: &SessionKeys,
    principal: &Principal,
    at: DateTime<Utc>,
) -> String {
    let issued = keys.issue_at(principal, at).unwrap();
    format!("{SESSION_COOKIE}={}", issued.token)
}

#[allow(dead_code)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

#[allow(dead_code)]
impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }

    /// Set-Cookie values that target the session cookie.
    pub fn session_set_cookies(&self) -> Vec<String> {
        let prefix = format!("{SESSION_COOKIE}=");
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter(|v| v.starts_with(&prefix))
            .map(String::from)
            .collect()
    }

    /// Token from the single session Set-Cookie, if any.
    pub fn renewed_token(&self) -> Option<String> {
        let cookies = self.session_set_cookies();
        assert!(cookies.len() <= 1, "more than one session cookie: {cookies:?}");
        let cookie = cookies.into_iter().next()?;
        let value = cookie.split(';').next()?.split_once('=')?.1.to_string();
        (!value.is_empty()).then_some(value)
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(header::LOCATION).and_then(|v| v.to_str().ok())
    }
}

#[allow(dead_code)]
/// Send a request with an optional Cookie header and collect the response.
pub async fn send(app: &Router, method: &str, uri: &str, cookie: Option<&str>) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        body: String::from_utf8(body.to_vec()).unwrap(),
    }
}

#[allow(dead_code)]
pub async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> TestResponse {
    send(app, "GET", uri, cookie).await
}
