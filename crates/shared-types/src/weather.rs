use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Convert Celsius to Fahrenheit the way the forecast API always has:
/// `32 + C / 0.5556`, truncated toward zero.
pub fn celsius_to_fahrenheit(temperature_c: i32) -> i32 {
    32 + (f64::from(temperature_c) / 0.5556) as i32
}

/// A stored weather forecast row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct WeatherForecast {
    pub id: i64,
    pub date: NaiveDate,
    pub temperature_c: i32,
    pub summary: Option<String>,
}

impl WeatherForecast {
    pub fn temperature_f(&self) -> i32 {
        celsius_to_fahrenheit(self.temperature_c)
    }
}

/// A forecast about to be inserted.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "validation", derive(validator::Validate))]
pub struct NewWeatherForecast {
    pub date: NaiveDate,
    #[cfg_attr(
        feature = "validation",
        validate(range(min = -100, max = 100, message = "Temperature must be between -100 and 100"))
    )]
    pub temperature_c: i32,
    #[cfg_attr(
        feature = "validation",
        validate(length(max = 100, message = "Summary must be at most 100 characters"))
    )]
    pub summary: Option<String>,
}

/// API shape of a forecast, as served by `GET /api/weatherforecast`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct WeatherForecastResponse {
    pub date: NaiveDate,
    pub temperature_c: i32,
    #[serde(default)]
    pub temperature_f: i32,
    #[serde(default)]
    pub summary: Option<String>,
}

impl From<WeatherForecast> for WeatherForecastResponse {
    fn from(w: WeatherForecast) -> Self {
        Self {
            date: w.date,
            temperature_c: w.temperature_c,
            temperature_f: w.temperature_f(),
            summary: w.summary,
        }
    }
}
