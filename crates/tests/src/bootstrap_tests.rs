use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use client::user::me_query_key;
use client::{AuthenticatedRoute, Location, QueryClient, RouteLoad};
use pretty_assertions::assert_eq;
use shared_types::CurrentUser;

use crate::common::{client_at, sample_user, spawn_mock};

#[tokio::test]
async fn before_load_resolves_the_user() {
    let (base, state) = spawn_mock().await;
    state.sign_in(sample_user());
    let (client, _history) = client_at(&base, "/me");
    let route = AuthenticatedRoute::new(client, Arc::new(QueryClient::new()));

    let load = route.before_load(&Location::parse("/me")).await.unwrap();

    let RouteLoad::Ready(ctx) = load else {
        panic!("expected the route to be ready");
    };
    assert_eq!(ctx.id(), "u1");
    assert_eq!(ctx.display_name(), "Ann Example");
    assert!(ctx.has_role("SampleRole"));
}

#[tokio::test]
async fn concurrent_mounts_issue_one_request() {
    let (base, state) = spawn_mock().await;
    state.sign_in(sample_user());
    let (client, _history) = client_at(&base, "/");
    let queries = Arc::new(QueryClient::new());
    let route = AuthenticatedRoute::new(client, queries.clone());

    let location = Location::parse("/fetch");
    let (a, b, c) = tokio::join!(
        route.before_load(&location),
        route.before_load(&location),
        route.before_load(&location),
    );

    for load in [a, b, c] {
        assert!(matches!(load.unwrap(), RouteLoad::Ready(_)));
    }
    assert_eq!(state.hits("/api/user/me"), 1);
    assert_eq!(
        queries.get_query_data::<CurrentUser>(&me_query_key()),
        Some(sample_user())
    );
}

#[tokio::test]
async fn cached_profile_is_reused_across_navigations() {
    let (base, state) = spawn_mock().await;
    state.sign_in(sample_user());
    let (client, history) = client_at(&base, "/");
    let route = AuthenticatedRoute::new(client, Arc::new(QueryClient::new()));

    route.before_load(&Location::parse("/")).await.unwrap();
    history.visit("/fetch");
    route.before_load(&Location::parse("/fetch")).await.unwrap();
    history.visit("/me");
    route.before_load(&Location::parse("/me")).await.unwrap();

    assert_eq!(state.hits("/api/user/me"), 1);
}

#[tokio::test]
async fn stale_profile_is_refetched() {
    let (base, state) = spawn_mock().await;
    state.sign_in(sample_user());
    let (client, _history) = client_at(&base, "/");
    let route = AuthenticatedRoute::new(
        client,
        Arc::new(QueryClient::with_stale_time(Duration::from_millis(10))),
    );

    route.before_load(&Location::parse("/")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    route.before_load(&Location::parse("/")).await.unwrap();

    assert_eq!(state.hits("/api/user/me"), 2);
}

#[tokio::test]
async fn signed_out_user_is_redirected_once() {
    let (base, state) = spawn_mock().await;
    let (client, history) = client_at(&base, "/fetch");
    let route = AuthenticatedRoute::new(client, Arc::new(QueryClient::new()));

    let location = Location::parse("/fetch");
    let (a, b) = tokio::join!(route.before_load(&location), route.before_load(&location));

    assert!(matches!(a.unwrap(), RouteLoad::Redirected(_)));
    assert!(matches!(b.unwrap(), RouteLoad::Redirected(_)));
    assert_eq!(state.hits("/api/user/me"), 1);
    assert_eq!(
        history.navigations(),
        vec!["/login?returnUrl=%2Ffetch".to_string()]
    );
}

#[tokio::test]
async fn render_runs_once_with_the_resolved_user() {
    let (base, state) = spawn_mock().await;
    state.sign_in(sample_user());
    let (client, _history) = client_at(&base, "/me");
    let route = AuthenticatedRoute::new(client, Arc::new(QueryClient::new()));
    let renders = AtomicUsize::new(0);

    let rendered = route
        .load_and_render(&Location::parse("/me"), |ctx| {
            renders.fetch_add(1, Ordering::SeqCst);
            format!("Hello, {}", ctx.display_name())
        })
        .await
        .unwrap();

    assert_eq!(rendered.as_deref(), Some("Hello, Ann Example"));
    assert_eq!(renders.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn redirected_load_never_renders() {
    let (base, _state) = spawn_mock().await;
    let (client, _history) = client_at(&base, "/me");
    let route = AuthenticatedRoute::new(client, Arc::new(QueryClient::new()));
    let renders = AtomicUsize::new(0);

    let rendered = route
        .load_and_render(&Location::parse("/me"), |_| {
            renders.fetch_add(1, Ordering::SeqCst);
        })
        .await
        .unwrap();

    assert_eq!(rendered, None);
    assert_eq!(renders.load(Ordering::SeqCst), 0);
}
