//! Open-Meteo forecast client
//!
//! This module fetches current conditions and the hourly series for a
//! coordinate pair and normalizes them into [`WeatherReport`]. Parsing is
//! strict about the response shape (the `current` and `hourly` blocks must be
//! present) and lenient about individual readings, which default to zero.

use std::ops::Range;
use std::time::Duration;

use chrono::NaiveDateTime;
use futures::future::BoxFuture;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use super::{Compass, CurrentConditions, ForecastPoint, RainDescription, WeatherReport};

/// Base URL for the Open-Meteo API
pub const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com/v1";

/// Default per-request timeout for provider calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Fields requested for both the current block and the hourly series
const WEATHER_FIELDS: &str =
    "temperature_2m,relativehumidity_2m,wind_speed_10m,wind_gusts_10m,wind_direction_10m,rain,uv_index";

/// Maximum number of hourly steps kept as history before "now"
pub const HISTORY_HOURS: usize = 24;

/// The provider has no feels-like value; this fixed offset stands in for it
pub const FEELS_LIKE_OFFSET: f64 = 1.5;

/// Errors that can occur when fetching weather data
#[derive(Debug, Error)]
pub enum WeatherError {
    /// HTTP request failed or returned an error status
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// No response within the allowed time
    #[error("Request timed out after {0:?}")]
    TimedOut(Duration),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Hourly arrays do not line up with the time axis
    #[error("Inconsistent hourly data: {0}")]
    InconsistentHourly(String),

    /// Invalid time format in response
    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),
}

/// Coarse failure classes callers recover from identically
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport failure, error status or timeout
    Network,
    /// The response did not have the expected shape
    MalformedResponse,
}

impl WeatherError {
    pub fn kind(&self) -> FailureKind {
        match self {
            WeatherError::RequestFailed(_) | WeatherError::TimedOut(_) => FailureKind::Network,
            WeatherError::ParseError(_)
            | WeatherError::InconsistentHourly(_)
            | WeatherError::InvalidTimeFormat(_) => FailureKind::MalformedResponse,
        }
    }
}

/// Connection settings for the forecast provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL, without the `/forecast` path
    pub base_url: String,
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: OPEN_METEO_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ProviderConfig {
    /// Builds the HTTP client shared by the provider clients
    pub fn build_http_client(&self) -> Result<Client, WeatherError> {
        Ok(Client::builder().timeout(self.request_timeout).build()?)
    }
}

/// Anything that can produce a [`WeatherReport`] for a coordinate pair.
///
/// The returned future owns everything it needs, so the caller can spawn it
/// right away and the call itself marks the moment the request was issued.
pub trait WeatherSource: Send + Sync + 'static {
    fn fetch_weather(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> BoxFuture<'static, Result<WeatherReport, WeatherError>>;
}

/// Client for fetching weather data from the Open-Meteo API
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
}

impl Default for WeatherClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherClient {
    /// Create a new WeatherClient against the public Open-Meteo endpoint
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: OPEN_METEO_BASE_URL.to_string(),
        }
    }

    /// Create a new WeatherClient with a custom HTTP client and base URL
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Create a new WeatherClient with a custom base URL (mock servers, proxies)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// The full request URL for a coordinate pair
    fn forecast_url(&self, lat: f64, lon: f64) -> String {
        format!(
            "{}/forecast?latitude={}&longitude={}&hourly={}&current={}&wind_speed_unit=ms&timezone=auto",
            self.base_url.trim_end_matches('/'),
            lat,
            lon,
            WEATHER_FIELDS,
            WEATHER_FIELDS
        )
    }

    /// Fetch and normalize weather data for the given coordinates
    ///
    /// Issues exactly one request and caches nothing.
    ///
    /// # Returns
    /// * `Ok(WeatherReport)` - Current conditions, hourly series and history window
    /// * `Err(WeatherError)` - If the request fails or the response is malformed
    pub async fn fetch_report(&self, lat: f64, lon: f64) -> Result<WeatherReport, WeatherError> {
        let url = self.forecast_url(lat, lon);
        tracing::debug!(latitude = lat, longitude = lon, "requesting forecast");

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let text = response.text().await?;
        let api_response: OpenMeteoResponse = serde_json::from_str(&text)?;

        parse_response(api_response)
    }
}

impl WeatherSource for WeatherClient {
    fn fetch_weather(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> BoxFuture<'static, Result<WeatherReport, WeatherError>> {
        let client = self.clone();
        Box::pin(async move { client.fetch_report(latitude, longitude).await })
    }
}

/// Normalize a parsed Open-Meteo response into a WeatherReport
fn parse_response(response: OpenMeteoResponse) -> Result<WeatherReport, WeatherError> {
    let current = normalize_current(&response.current);
    let forecast = parse_hourly_data(&response.hourly)?;
    let now = response.current.time.as_deref().map(parse_datetime).transpose()?;

    Ok(WeatherReport::new(current, forecast, now))
}

/// Map the current block onto CurrentConditions, defaulting missing readings
fn normalize_current(current: &CurrentBlock) -> CurrentConditions {
    let temperature = current.temperature_2m.unwrap_or(0.0);
    let rain = current.rain.unwrap_or(0.0);

    CurrentConditions {
        temperature,
        feels_like: temperature - FEELS_LIKE_OFFSET,
        wind_speed: current.wind_speed_10m.unwrap_or(0.0),
        gust_speed: current.wind_gusts_10m.unwrap_or(0.0),
        wind_direction: Compass::from_degrees(current.wind_direction_10m),
        wind_direction_degrees: current.wind_direction_10m.unwrap_or(0.0),
        humidity_percent: current.relativehumidity_2m.unwrap_or(0.0),
        rain_intensity: rain,
        rain_description: RainDescription::from_intensity(rain),
        uv_index: current.uv_index.unwrap_or(0.0),
    }
}

/// Zip the parallel hourly arrays into ForecastPoints, one per time step
fn parse_hourly_data(hourly: &HourlyBlock) -> Result<Vec<ForecastPoint>, WeatherError> {
    let len = hourly.time.len();

    let series = [
        ("temperature_2m", &hourly.temperature_2m),
        ("relativehumidity_2m", &hourly.relativehumidity_2m),
        ("wind_speed_10m", &hourly.wind_speed_10m),
        ("wind_gusts_10m", &hourly.wind_gusts_10m),
        ("rain", &hourly.rain),
        ("wind_direction_10m", &hourly.wind_direction_10m),
        ("uv_index", &hourly.uv_index),
    ];
    for (name, values) in series {
        if let Some(values) = values {
            if values.len() != len {
                return Err(WeatherError::InconsistentHourly(format!(
                    "{} has {} values for {} time steps",
                    name,
                    values.len(),
                    len
                )));
            }
        }
    }

    let mut forecasts = Vec::with_capacity(len);
    for (i, time) in hourly.time.iter().enumerate() {
        forecasts.push(ForecastPoint {
            timestamp: parse_datetime(time)?,
            temperature: value_at(&hourly.temperature_2m, i),
            humidity: value_at(&hourly.relativehumidity_2m, i),
            wind_speed: value_at(&hourly.wind_speed_10m, i),
            wind_gust: value_at(&hourly.wind_gusts_10m, i),
            rain: value_at(&hourly.rain, i),
            wind_direction_degrees: value_at(&hourly.wind_direction_10m, i),
            uv_index: value_at(&hourly.uv_index, i),
        });
    }

    Ok(forecasts)
}

/// Reading at index `i`, 0 when the series or the value is missing
fn value_at(values: &Option<Vec<Option<f64>>>, i: usize) -> f64 {
    values
        .as_ref()
        .and_then(|v| v.get(i).copied().flatten())
        .unwrap_or(0.0)
}

/// The history window for a forecast series.
///
/// Finds the step whose timestamp equals `now` and returns the up to
/// [`HISTORY_HOURS`] steps strictly before it. When `now` is absent or not on
/// the time axis the window is empty.
pub fn history_window(forecast: &[ForecastPoint], now: Option<NaiveDateTime>) -> Range<usize> {
    let Some(now) = now else {
        return 0..0;
    };
    match forecast.iter().position(|p| p.timestamp == now) {
        Some(now_index) => now_index.saturating_sub(HISTORY_HOURS)..now_index,
        None => 0..0,
    }
}

/// Parse an ISO 8601 local datetime (e.g., "2024-07-15T05:00")
fn parse_datetime(datetime_str: &str) -> Result<NaiveDateTime, WeatherError> {
    NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| WeatherError::InvalidTimeFormat(datetime_str.to_string()))
}

/// Open-Meteo API response structure
#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    current: CurrentBlock,
    hourly: HourlyBlock,
}

/// Current weather block; every reading may be missing or null
#[derive(Debug, Deserialize)]
struct CurrentBlock {
    time: Option<String>,
    temperature_2m: Option<f64>,
    #[serde(alias = "relative_humidity_2m")]
    relativehumidity_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_gusts_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
    rain: Option<f64>,
    uv_index: Option<f64>,
}

/// Hourly series; `time` is the axis the other arrays are aligned to
#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    temperature_2m: Option<Vec<Option<f64>>>,
    #[serde(alias = "relative_humidity_2m")]
    relativehumidity_2m: Option<Vec<Option<f64>>>,
    wind_speed_10m: Option<Vec<Option<f64>>>,
    wind_gusts_10m: Option<Vec<Option<f64>>>,
    rain: Option<Vec<Option<f64>>>,
    wind_direction_10m: Option<Vec<Option<f64>>>,
    uv_index: Option<Vec<Option<f64>>>,
}
