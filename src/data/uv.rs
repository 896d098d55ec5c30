//! UV index client
//!
//! Fetches the current UV index for a coordinate pair as an independent
//! request. Failures here resolve to an index of 0 and never touch the
//! primary weather snapshot.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::weather::{WeatherError, OPEN_METEO_BASE_URL};

/// Client for the single-value UV index query
#[derive(Debug, Clone)]
pub struct UvIndexClient {
    client: Client,
    base_url: String,
}

impl Default for UvIndexClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UvIndexClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: OPEN_METEO_BASE_URL.to_string(),
        }
    }

    /// Create a UvIndexClient sharing an existing HTTP client
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Fetch the current UV index, rounded to the nearest whole number.
    ///
    /// Returns 0 on any failure. There is no retry; the failure is logged
    /// and reported only here.
    pub async fn fetch_uv_index(&self, lat: f64, lon: f64) -> u32 {
        match self.try_fetch_uv_index(lat, lon).await {
            Ok(uv) => round_index(uv),
            Err(err) => {
                tracing::warn!(error = %err, latitude = lat, longitude = lon, "UV index fetch failed");
                0
            }
        }
    }

    /// Fetch the raw UV index. A response without a reading yields 0.0.
    pub async fn try_fetch_uv_index(&self, lat: f64, lon: f64) -> Result<f64, WeatherError> {
        let url = format!(
            "{}/forecast?latitude={}&longitude={}&current=uv_index",
            self.base_url.trim_end_matches('/'),
            lat,
            lon
        );

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let text = response.text().await?;
        let parsed: UvResponse = serde_json::from_str(&text)?;

        Ok(parsed.current.and_then(|c| c.uv_index).unwrap_or(0.0))
    }
}

/// Round half-up to a whole index, negative readings clamp to 0
fn round_index(uv: f64) -> u32 {
    if uv.is_finite() && uv > 0.0 {
        (uv + 0.5).floor() as u32
    } else {
        0
    }
}

/// Exposure level for a rounded UV index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UvLevel {
    Low,
    Moderate,
    High,
    VeryHigh,
    Extreme,
}

impl UvLevel {
    pub fn from_index(index: u32) -> Self {
        match index {
            0..=2 => UvLevel::Low,
            3..=5 => UvLevel::Moderate,
            6..=7 => UvLevel::High,
            8..=10 => UvLevel::VeryHigh,
            _ => UvLevel::Extreme,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UvLevel::Low => "Low",
            UvLevel::Moderate => "Moderate",
            UvLevel::High => "High",
            UvLevel::VeryHigh => "Very High",
            UvLevel::Extreme => "Extreme",
        }
    }

    /// Short protection advice for the level
    pub fn advice(&self) -> &'static str {
        match self {
            UvLevel::Low => "No protection required.",
            UvLevel::Moderate => "Take precautions.",
            UvLevel::High => "Protection required.",
            UvLevel::VeryHigh => "Extra protection needed.",
            UvLevel::Extreme => "Avoid direct sunlight.",
        }
    }
}

#[derive(Debug, Deserialize)]
struct UvResponse {
    current: Option<UvCurrent>,
}

#[derive(Debug, Deserialize)]
struct UvCurrent {
    uv_index: Option<f64>,
}
