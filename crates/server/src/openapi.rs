use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use shared_types::{
    AppError, AppErrorKind, ClaimInfo, CurrentUser, FeatureFlags, WeatherForecastResponse,
};
use std::path::Path;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{login, middleware::session_middleware};
use crate::db::AppState;
use crate::health::{self, HealthResponse, Reachability, RoleStoreHealth};
use crate::request_context::request_context;
use crate::rest;
use crate::telemetry::OtelTraceLayer;

/// OpenAPI documentation for the API.
#[derive(OpenApi)]
#[openapi(
    paths(
        rest::me,
        rest::list_forecasts,
        health::health_check,
    ),
    components(schemas(
        CurrentUser,
        ClaimInfo,
        WeatherForecastResponse,
        AppError,
        AppErrorKind,
        HealthResponse,
        RoleStoreHealth,
        Reachability,
    )),
    tags(
        (name = "user", description = "Signed-in user profile"),
        (name = "weather", description = "Sample weather forecasts"),
        (name = "health", description = "Database and role-store reachability")
    ),
    info(
        title = "Weatherdesk API",
        description = "Session-authenticated sample API",
        version = "1.0.0"
    )
)]
pub struct ApiDoc;

/// Build the full application router.
///
/// Request path, outermost first: request id, HTTP trace, session
/// validation and claims refresh, OpenTelemetry span, request-context span,
/// handler. `/health`, API docs and static files bypass the session layer.
pub fn app_router(state: AppState, flags: &FeatureFlags, static_dir: Option<&Path>) -> Router {
    let session_routes = Router::new()
        .merge(rest::api_router())
        .route("/login", get(login::login))
        .route("/signin-oidc", get(login::signin_callback))
        .route("/logout", get(login::logout).post(login::logout))
        .layer(from_fn(request_context))
        .layer(OtelTraceLayer)
        .layer(from_fn_with_state(state.clone(), session_middleware));

    let mut router = Router::new()
        .merge(session_routes)
        .route("/health", get(health::health_check))
        .with_state(state);

    if flags.api_docs {
        router = router
            .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()));
    }

    if let Some(dir) = static_dir {
        let spa = ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")));
        router = router.fallback_service(spa);
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
