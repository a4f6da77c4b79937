use std::sync::Arc;

use chrono::{Days, Local};
use client::weather::ensure_forecasts;
use client::{AuthenticatedRoute, ClientError, Fetched, Location, QueryClient, RouteLoad};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use server::repo::weather::ForecastStore;
use shared_types::NewWeatherForecast;

use crate::common::{client_at, principal, RealServer};

async fn seed_week(server: &RealServer) {
    let today = Local::now().date_naive();
    let rows: Vec<NewWeatherForecast> = (0..7)
        .map(|i| NewWeatherForecast {
            date: today.checked_add_days(Days::new(i)).unwrap(),
            temperature_c: 20,
            summary: Some("Mild".into()),
        })
        .collect();
    server.forecasts.insert_many(&rows).await.unwrap();
}

#[tokio::test]
async fn anonymous_client_is_sent_to_login() {
    let server = RealServer::start().await;
    let (client, history) = client_at(&server.base, "/fetch");
    let route = AuthenticatedRoute::new(client, Arc::new(QueryClient::new()));

    let load = route.before_load(&Location::parse("/fetch")).await.unwrap();

    assert!(matches!(load, RouteLoad::Redirected(_)));
    assert_eq!(
        history.navigations(),
        vec!["/login?returnUrl=%2Ffetch".to_string()]
    );
}

#[tokio::test]
async fn signed_in_client_loads_profile_and_forecasts() {
    let server = RealServer::start().await;
    server.roles.set_roles("u1", &["User", "SampleRole"]);
    seed_week(&server).await;
    let session = server.signed_in_client(&principal("u1", &["User", "SampleRole"]), "/fetch");
    let queries = Arc::new(QueryClient::new());
    let route = AuthenticatedRoute::new(session.client.clone(), queries.clone());

    let RouteLoad::Ready(ctx) = route.before_load(&Location::parse("/fetch")).await.unwrap() else {
        panic!("expected the route to be ready");
    };
    assert_eq!(ctx.user().email.as_deref(), Some("ann@example.edu"));

    let forecasts = ensure_forecasts(&session.client, &queries)
        .await
        .unwrap()
        .data()
        .unwrap();
    assert_eq!(forecasts.len(), 7);
    assert_eq!(forecasts[0].temperature_f, 67);
    assert!(session.history.navigations().is_empty());
}

#[tokio::test]
async fn missing_role_surfaces_as_http_error() {
    let server = RealServer::start().await;
    server.roles.set_roles("u1", &["User"]);
    let session = server.signed_in_client(&principal("u1", &["User"]), "/fetch");

    let err = ensure_forecasts(&session.client, &QueryClient::new())
        .await
        .unwrap_err();

    let ClientError::Http(http) = err else {
        panic!("expected an HTTP error");
    };
    assert_eq!(http.status, StatusCode::FORBIDDEN);
    assert_eq!(http.url, "/api/weatherforecast");
    assert!(session.history.navigations().is_empty());
}

#[tokio::test]
async fn renewed_session_cookie_is_kept_by_the_client() {
    let server = RealServer::start().await;
    server.roles.set_roles("u1", &["User"]);
    let session = server.signed_in_client(&principal("u1", &["User", "SampleRole"]), "/");

    let first = session
        .client
        .get_json::<shared_types::CurrentUser>("/api/user/me")
        .await
        .unwrap();

    let Fetched::Data(me) = first else {
        panic!("expected the profile");
    };
    assert_eq!(me.roles, vec!["User".to_string()]);

    let renewed = session.current_token().expect("jar should hold a session");
    assert_ne!(renewed, session.initial_token);
    let principal = server.keys.validate(&renewed).unwrap().principal;
    assert!(!principal.has_role("SampleRole"));
}

#[tokio::test]
async fn role_store_outage_is_reported_not_redirected() {
    let server = RealServer::start().await;
    server.roles.fail_with("database unavailable");
    let session = server.signed_in_client(&principal("u1", &["User"]), "/me");
    let route = AuthenticatedRoute::new(session.client.clone(), Arc::new(QueryClient::new()));

    let err = route
        .before_load(&Location::parse("/me"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert!(session.history.navigations().is_empty());
}
