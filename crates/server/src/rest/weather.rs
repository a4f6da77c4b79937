use axum::{extract::State, Json};
use shared_types::{AppError, WeatherForecastResponse};
use std::sync::Arc;

use crate::auth::{RoleRequired, SampleRole};
use crate::repo::weather::{ForecastStore, FORECAST_PAGE_SIZE};

// ---------------------------------------------------------------------------
// GET /api/weatherforecast
// ---------------------------------------------------------------------------

/// The 20 most recent forecasts, newest first.
#[utoipa::path(
    get,
    path = "/api/weatherforecast",
    responses(
        (status = 200, description = "Latest forecasts", body = Vec<WeatherForecastResponse>),
        (status = 401, description = "Not signed in", body = AppError),
        (status = 403, description = "SampleRole required", body = AppError)
    ),
    tag = "weather"
)]
pub async fn list_forecasts(
    State(store): State<Arc<dyn ForecastStore>>,
    _role: RoleRequired<SampleRole>,
) -> Result<Json<Vec<WeatherForecastResponse>>, AppError> {
    let forecasts = store.latest(FORECAST_PAGE_SIZE).await?;
    Ok(Json(
        forecasts.into_iter().map(WeatherForecastResponse::from).collect(),
    ))
}
