use chrono::{Days, Local, NaiveDate};
use shared_types::{AppError, NewWeatherForecast};

use crate::repo::weather::ForecastStore;

/// Sample forecasts relative to `today`: five days back through four ahead.
pub fn sample_forecasts(today: NaiveDate) -> Vec<NewWeatherForecast> {
    const SAMPLES: [(i64, i32, &str); 10] = [
        (-5, 18, "Cool"),
        (-4, 22, "Mild"),
        (-3, 35, "Hot"),
        (-2, 15, "Chilly"),
        (-1, 8, "Freezing"),
        (0, 25, "Warm"),
        (1, 28, "Balmy"),
        (2, 12, "Cold"),
        (3, 32, "Scorching"),
        (4, 20, "Pleasant"),
    ];

    SAMPLES
        .iter()
        .filter_map(|&(offset, temperature_c, summary)| {
            let date = if offset < 0 {
                today.checked_sub_days(Days::new(offset.unsigned_abs()))
            } else {
                today.checked_add_days(Days::new(offset.unsigned_abs()))
            }?;
            Some(NewWeatherForecast {
                date,
                temperature_c,
                summary: Some(summary.to_string()),
            })
        })
        .collect()
}

/// Startup data. Development gets sample forecasts when the table is
/// empty; production seeding is a no-op.
pub async fn seed(store: &dyn ForecastStore, development: bool) -> Result<u64, AppError> {
    if !development {
        return Ok(0);
    }
    if !store.is_empty().await? {
        tracing::debug!("Forecasts already present, skipping development seed");
        return Ok(0);
    }

    let written = store
        .insert_many(&sample_forecasts(Local::now().date_naive()))
        .await?;
    tracing::info!(rows = written, "Seeded development forecasts");
    Ok(written)
}
