use shared_types::WeatherForecastResponse;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::fetch::{ApiClient, FetchOptions, Fetched};
use crate::query::{QueryClient, QueryKey};

pub const FORECAST_URL: &str = "/api/weatherforecast";

pub fn forecast_query_key() -> QueryKey {
    QueryKey::new(["weather"])
}

pub async fn fetch_forecasts(
    api: &ApiClient,
    cancel: Option<&CancellationToken>,
) -> Result<Fetched<Vec<WeatherForecastResponse>>, ClientError> {
    api.fetch_json(FORECAST_URL, FetchOptions::default(), cancel)
        .await
}

/// Forecasts through the query cache under `["weather"]`.
pub async fn ensure_forecasts(
    api: &ApiClient,
    queries: &QueryClient,
) -> Result<Fetched<Vec<WeatherForecastResponse>>, ClientError> {
    queries
        .ensure_query_data(&forecast_query_key(), || fetch_forecasts(api, None))
        .await
}
