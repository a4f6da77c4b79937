pub mod user;
pub mod weather;

use axum::{routing::get, Router};
use crate::db::AppState;

pub use user::*;
pub use weather::*;

/// Build the REST API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/user/me", get(user::me))
        .route("/api/weatherforecast", get(weather::list_forecasts))
}
