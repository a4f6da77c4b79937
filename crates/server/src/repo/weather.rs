use async_trait::async_trait;
use shared_types::{AppError, NewWeatherForecast, WeatherForecast};
use sqlx::{Pool, Postgres};
use std::sync::RwLock;

use crate::error_convert::{SqlxErrorExt, ValidateRequest};

/// How many forecasts `GET /api/weatherforecast` returns.
pub const FORECAST_PAGE_SIZE: i64 = 20;

/// Storage for weather forecasts.
#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// The `limit` forecasts with the latest dates, newest first.
    async fn latest(&self, limit: i64) -> Result<Vec<WeatherForecast>, AppError>;

    /// Validate and insert forecasts. Returns how many rows were written.
    async fn insert_many(&self, forecasts: &[NewWeatherForecast]) -> Result<u64, AppError>;

    async fn is_empty(&self) -> Result<bool, AppError>;
}

fn validate_all(forecasts: &[NewWeatherForecast]) -> Result<(), AppError> {
    forecasts.iter().try_for_each(ValidateRequest::validate_request)
}

/// Forecasts in the `weather_forecasts` table.
#[derive(Clone)]
pub struct PgForecastStore {
    pool: Pool<Postgres>,
}

impl PgForecastStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ForecastStore for PgForecastStore {
    async fn latest(&self, limit: i64) -> Result<Vec<WeatherForecast>, AppError> {
        sqlx::query_as::<_, WeatherForecast>(
            r#"
            SELECT id, date, temperature_c, summary
            FROM weather_forecasts
            ORDER BY date DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
    }

    async fn insert_many(&self, forecasts: &[NewWeatherForecast]) -> Result<u64, AppError> {
        validate_all(forecasts)?;

        let mut tx = self.pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;
        let mut written = 0;
        for f in forecasts {
            let result = sqlx::query(
                "INSERT INTO weather_forecasts (date, temperature_c, summary) VALUES ($1, $2, $3)",
            )
            .bind(f.date)
            .bind(f.temperature_c)
            .bind(f.summary.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(SqlxErrorExt::into_app_error)?;
            written += result.rows_affected();
        }
        tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;

        Ok(written)
    }

    async fn is_empty(&self) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM weather_forecasts)")
            .fetch_one(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_app_error)?;
        Ok(!exists)
    }
}

/// Forecasts held in process memory.
#[derive(Debug, Default)]
pub struct MemoryForecastStore {
    rows: RwLock<Vec<WeatherForecast>>,
}

impl MemoryForecastStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ForecastStore for MemoryForecastStore {
    async fn latest(&self, limit: i64) -> Result<Vec<WeatherForecast>, AppError> {
        let mut rows = self.rows.read().unwrap_or_else(|e| e.into_inner()).clone();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        rows.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn insert_many(&self, forecasts: &[NewWeatherForecast]) -> Result<u64, AppError> {
        validate_all(forecasts)?;

        let mut rows = self.rows.write().unwrap_or_else(|e| e.into_inner());
        let mut next_id = rows.iter().map(|r| r.id).max().unwrap_or(0);
        for f in forecasts {
            next_id += 1;
            rows.push(WeatherForecast {
                id: next_id,
                date: f.date,
                temperature_c: f.temperature_c,
                summary: f.summary.clone(),
            });
        }
        Ok(forecasts.len() as u64)
    }

    async fn is_empty(&self) -> Result<bool, AppError> {
        Ok(self.rows.read().unwrap_or_else(|e| e.into_inner()).is_empty())
    }
}
