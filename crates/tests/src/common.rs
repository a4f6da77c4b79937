use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use client::{ApiClient, MemoryHistory};
use reqwest::cookie::Jar;
use server::auth::cookies::{CookieSettings, SESSION_COOKIE};
use server::auth::roles::MemoryRoleStore;
use server::auth::session::SessionKeys;
use server::auth::Principal;
use server::db::AppState;
use server::repo::weather::MemoryForecastStore;
use shared_types::{AppError, CurrentUser, FeatureFlags};

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Test server failed");
    });
    format!("http://{addr}")
}

/// Build a client rooted at `base` whose browser sits at `at`.
pub fn client_at(base: &str, at: &str) -> (ApiClient, Arc<MemoryHistory>) {
    let history = Arc::new(MemoryHistory::at(at));
    let client = ApiClient::builder(base)
        .navigator(history.clone())
        .build()
        .expect("Failed to build client");
    (client, history)
}

// ---------------------------------------------------------------------------
// Scripted backend
// ---------------------------------------------------------------------------

/// Shared state of the scripted backend: request counts per path and the
/// profile `/api/user/me` answers with (401 when unset).
#[derive(Clone, Default)]
pub struct MockState {
    hits: Arc<Mutex<HashMap<String, usize>>>,
    me: Arc<Mutex<Option<CurrentUser>>>,
}

impl MockState {
    fn record(&self, path: &str) {
        *self
            .hits
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default() += 1;
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn sign_in(&self, user: CurrentUser) {
        *self.me.lock().unwrap() = Some(user);
    }
}

async fn no_content(State(state): State<MockState>) -> StatusCode {
    state.record("/no-content");
    StatusCode::NO_CONTENT
}

async fn unauthorized(State(state): State<MockState>) -> AppError {
    state.record("/unauthorized");
    AppError::unauthorized("Authentication required")
}

async fn server_error(State(state): State<MockState>) -> AppError {
    state.record("/boom");
    AppError::internal("Something broke")
}

async fn json_error(State(state): State<MockState>) -> Response {
    state.record("/json-error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "x" })),
    )
        .into_response()
}

async fn plain_text(State(state): State<MockState>) -> &'static str {
    state.record("/plain");
    "hello from the server"
}

async fn bad_json(State(state): State<MockState>) -> Response {
    state.record("/bad-json");
    ([(header::CONTENT_TYPE, "application/json")], "{oops").into_response()
}

async fn slow(State(state): State<MockState>) -> &'static str {
    state.record("/slow");
    tokio::time::sleep(Duration::from_secs(5)).await;
    "too late"
}

/// Reflect the request headers, method and body back as JSON.
async fn echo(State(state): State<MockState>, req: Request) -> Json<serde_json::Value> {
    state.record("/echo");
    let method = req.method().to_string();
    let headers: HashMap<String, String> = header_map(req.headers());
    let body = axum::body::to_bytes(req.into_body(), usize::MAX)
        .await
        .unwrap_or_default();
    Json(serde_json::json!({
        "method": method,
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
        .collect()
}

async fn me(State(state): State<MockState>) -> Response {
    state.record("/api/user/me");
    tokio::time::sleep(Duration::from_millis(50)).await;
    let user = state.me.lock().unwrap().clone();
    match user {
        Some(user) => Json(user).into_response(),
        None => AppError::unauthorized("Authentication required").into_response(),
    }
}

/// Scripted backend standing in for the real API.
pub async fn spawn_mock() -> (String, MockState) {
    let state = MockState::default();
    let router = Router::new()
        .route("/no-content", get(no_content))
        .route("/unauthorized", get(unauthorized))
        .route("/boom", get(server_error))
        .route("/json-error", get(json_error))
        .route("/plain", get(plain_text))
        .route("/bad-json", get(bad_json))
        .route("/slow", get(slow))
        .route("/echo", any(echo))
        .route("/api/user/me", get(me))
        .with_state(state.clone());
    (spawn(router).await, state)
}

pub fn sample_user() -> CurrentUser {
    CurrentUser {
        id: "u1".into(),
        name: Some("Ann Example".into()),
        email: Some("ann@example.edu".into()),
        roles: vec!["User".into(), "SampleRole".into()],
        claims: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Real backend
// ---------------------------------------------------------------------------

pub const TEST_SECRET: &[u8] = b"client-server-test-secret";

/// The real application router on a local port, with in-memory stores.
pub struct RealServer {
    pub base: String,
    pub roles: Arc<MemoryRoleStore>,
    pub forecasts: Arc<MemoryForecastStore>,
    pub keys: SessionKeys,
}

impl RealServer {
    pub async fn start() -> Self {
        let roles = Arc::new(MemoryRoleStore::new());
        let forecasts = Arc::new(MemoryForecastStore::new());
        let keys = SessionKeys::new(TEST_SECRET, 60);
        let state = AppState::new(
            forecasts.clone(),
            roles.clone(),
            keys.clone(),
            CookieSettings {
                secure: false,
                domain: None,
            },
        );
        let router = server::openapi::app_router(state, &FeatureFlags::default(), None);

        Self {
            base: spawn(router).await,
            roles,
            forecasts,
            keys,
        }
    }

    /// A client whose cookie jar already holds a session for `principal`.
    pub fn signed_in_client(&self, principal: &Principal, at: &str) -> SignedInClient {
        let url: reqwest::Url = self.base.parse().expect("Invalid base url");
        let token = self.keys.issue(principal).expect("Failed to issue session").token;
        let jar = Arc::new(Jar::default());
        jar.add_cookie_str(&format!("{SESSION_COOKIE}={token}; Path=/"), &url);

        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .build()
            .expect("Failed to build http client");
        let history = Arc::new(MemoryHistory::at(at));
        let client = ApiClient::builder(&self.base)
            .navigator(history.clone())
            .http_client(http)
            .build()
            .expect("Failed to build client");

        SignedInClient {
            client,
            history,
            jar,
            url,
            initial_token: token,
        }
    }
}

pub struct SignedInClient {
    pub client: ApiClient,
    pub history: Arc<MemoryHistory>,
    pub jar: Arc<Jar>,
    pub url: reqwest::Url,
    pub initial_token: String,
}

impl SignedInClient {
    /// The session token the jar would send next.
    pub fn current_token(&self) -> Option<String> {
        use reqwest::cookie::CookieStore;

        let header = self.jar.cookies(&self.url)?;
        let prefix = format!("{SESSION_COOKIE}=");
        header
            .to_str()
            .ok()?
            .split("; ")
            .find_map(|pair| pair.strip_prefix(&prefix).map(String::from))
    }
}

pub fn principal(id: &str, roles: &[&str]) -> Principal {
    Principal::new(
        Some(id.to_string()),
        Some("Ann Example".to_string()),
        Some("ann@example.edu".to_string()),
        roles.iter().map(|r| r.to_string()),
    )
}
