use std::time::{Duration, Instant};

use client::{ClientError, FetchOptions, Fetched, Navigator, ResponseBody};
use pretty_assertions::assert_eq;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Method, StatusCode};
use serde_json::json;
use shared_types::AppErrorKind;
use tokio_util::sync::CancellationToken;

use crate::common::{client_at, spawn_mock};

#[tokio::test]
async fn no_content_skips_body_parsing() {
    let (base, state) = spawn_mock().await;
    let (client, history) = client_at(&base, "/");

    let res = client
        .fetch("/no-content", FetchOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(res, Fetched::NoContent);
    assert_eq!(state.hits("/no-content"), 1);
    assert!(history.navigations().is_empty());
}

#[tokio::test]
async fn unauthorized_navigates_to_login_once() {
    let (base, _state) = spawn_mock().await;
    let (client, history) = client_at(&base, "/fetch?page=2");

    let res = client
        .fetch("/unauthorized", FetchOptions::default(), None)
        .await
        .unwrap();

    let Fetched::Redirected(redirect) = res else {
        panic!("expected a login redirect");
    };
    assert_eq!(redirect.return_url, "/fetch?page=2");
    assert_eq!(
        history.navigations(),
        vec!["/login?returnUrl=%2Ffetch%3Fpage%3D2".to_string()]
    );
    assert_eq!(history.current_location().path, "/login");
}

#[tokio::test]
async fn unauthorized_with_skip_redirect_is_an_error() {
    let (base, _state) = spawn_mock().await;
    let (client, history) = client_at(&base, "/");

    let err = client
        .fetch(
            "/unauthorized",
            FetchOptions::default().skip_redirect_on_401(),
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    assert!(history.navigations().is_empty());
}

#[tokio::test]
async fn server_error_carries_status_url_and_body() {
    let (base, _state) = spawn_mock().await;
    let (client, _history) = client_at(&base, "/");

    let err = client
        .fetch("/boom", FetchOptions::default(), None)
        .await
        .unwrap_err();

    let ClientError::Http(http) = err else {
        panic!("expected an HTTP error");
    };
    assert_eq!(http.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(http.url, "/boom");
    assert_eq!(http.app_error().unwrap().kind, AppErrorKind::InternalError);
    assert_eq!(http.friendly_message(), "Something broke");
}

#[tokio::test]
async fn error_body_is_kept_as_sent() {
    let (base, state) = spawn_mock().await;
    let (client, history) = client_at(&base, "/");

    let err = client
        .fetch("/json-error", FetchOptions::default(), None)
        .await
        .unwrap_err();

    let ClientError::Http(http) = err else {
        panic!("expected an HTTP error");
    };
    assert_eq!(http.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(http.url, "/json-error");
    assert_eq!(http.body, ResponseBody::Json(json!({ "error": "x" })));
    assert!(http.app_error().is_none());
    assert_eq!(state.hits("/json-error"), 1);
    assert!(history.navigations().is_empty());
}

#[tokio::test]
async fn non_json_body_is_returned_as_text() {
    let (base, _state) = spawn_mock().await;
    let (client, _history) = client_at(&base, "/");

    let res = client
        .fetch("/plain", FetchOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(
        res,
        Fetched::Data(ResponseBody::Text("hello from the server".into()))
    );
}

#[tokio::test]
async fn text_body_decodes_into_string() {
    let (base, _state) = spawn_mock().await;
    let (client, _history) = client_at(&base, "/");

    let res: Fetched<String> = client.get_json("/plain").await.unwrap();

    assert_eq!(res.data().as_deref(), Some("hello from the server"));
}

#[tokio::test]
async fn malformed_json_is_returned_as_text() {
    let (base, _state) = spawn_mock().await;
    let (client, _history) = client_at(&base, "/");

    let res = client
        .fetch("/bad-json", FetchOptions::default(), None)
        .await
        .unwrap();

    assert_eq!(res, Fetched::Data(ResponseBody::Text("{oops".into())));
}

#[tokio::test]
async fn default_headers_and_json_body_are_sent() {
    let (base, _state) = spawn_mock().await;
    let (client, _history) = client_at(&base, "/");

    let options = FetchOptions::method(Method::POST)
        .json(&json!({"summary": "Mild"}))
        .unwrap();
    let echoed = client
        .fetch("/echo", options, None)
        .await
        .unwrap()
        .data()
        .unwrap();

    let echoed = echoed.as_json().unwrap();
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["headers"]["accept"], "application/json");
    assert_eq!(echoed["headers"]["content-type"], "application/json");
    assert_eq!(echoed["body"], r#"{"summary":"Mild"}"#);
}

#[tokio::test]
async fn get_without_body_has_no_content_type() {
    let (base, _state) = spawn_mock().await;
    let (client, _history) = client_at(&base, "/");

    let echoed = client
        .fetch(
            "/echo",
            FetchOptions::default().header(ACCEPT, HeaderValue::from_static("text/plain")),
            None,
        )
        .await
        .unwrap()
        .data()
        .unwrap();

    let echoed = echoed.as_json().unwrap();
    assert_eq!(echoed["headers"]["accept"], "text/plain");
    assert!(echoed["headers"].get("content-type").is_none());
}

#[tokio::test]
async fn cancellation_aborts_the_request() {
    let (base, state) = spawn_mock().await;
    let (client, _history) = client_at(&base, "/");
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let err = client
        .fetch("/slow", FetchOptions::default(), Some(&token))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(state.hits("/slow"), 1);
}

#[tokio::test]
async fn already_cancelled_token_sends_nothing() {
    let (base, state) = spawn_mock().await;
    let (client, _history) = client_at(&base, "/");
    let token = CancellationToken::new();
    token.cancel();

    let err = client
        .fetch("/plain", FetchOptions::default(), Some(&token))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Cancelled));
    assert_eq!(state.hits("/plain"), 0);
}
