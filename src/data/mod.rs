//! Core data models for segment weather monitoring
//!
//! This module contains the types shared by the provider clients, the store
//! and the presentation layer: monitored segments, normalized current
//! conditions, hourly forecast points and the per-fetch snapshot.

pub mod segment;
pub mod uv;
pub mod weather;

pub use segment::{all_segments, default_segment, get_segment_by_id, resolve, resolve_or_default, RegistryError};
pub use uv::{UvIndexClient, UvLevel};
pub use weather::{FailureKind, ProviderConfig, WeatherClient, WeatherError};

use std::ops::Range;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// A monitored site with fixed coordinates
///
/// Uses `&'static str` for string fields so the registry can be a static
/// array. Like the registry itself, segments are reference data and are only
/// serialized, never deserialized; look them up by id with
/// [`get_segment_by_id`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    /// Unique, stable identifier
    pub id: &'static str,
    /// Display name of the site
    pub name: &'static str,
    /// Region or country label
    pub location_label: &'static str,
    /// Latitude coordinate
    pub latitude: f64,
    /// Longitude coordinate
    pub longitude: f64,
}

/// Eight-point compass direction derived from wind degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compass {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
    /// The provider did not report a direction
    #[serde(rename = "N/A")]
    Unavailable,
}

impl Compass {
    const POINTS: [Compass; 8] = [
        Compass::N,
        Compass::NE,
        Compass::E,
        Compass::SE,
        Compass::S,
        Compass::SW,
        Compass::W,
        Compass::NW,
    ];

    /// Converts wind degrees to a compass point.
    ///
    /// Each point covers the 45 degree sector starting at its bearing, so
    /// 44 is still N and 46 is NE. The sector index is taken modulo 8. An
    /// absent reading maps straight to [`Compass::Unavailable`] without
    /// evaluating the formula.
    ///
    /// This truncates rather than rounding to the nearest point: a bearing in
    /// the upper half of a sector, such as 30 or 350, stays on the sector's
    /// own point (N and NW) instead of moving up to the next one.
    pub fn from_degrees(degrees: Option<f64>) -> Self {
        match degrees {
            Some(deg) if deg.is_finite() => {
                let sector = (deg / 45.0).floor() as i64;
                Self::POINTS[sector.rem_euclid(8) as usize]
            }
            _ => Compass::Unavailable,
        }
    }

    /// Short label, "N/A" when unavailable
    pub fn as_str(&self) -> &'static str {
        match self {
            Compass::N => "N",
            Compass::NE => "NE",
            Compass::E => "E",
            Compass::SE => "SE",
            Compass::S => "S",
            Compass::SW => "SW",
            Compass::W => "W",
            Compass::NW => "NW",
            Compass::Unavailable => "N/A",
        }
    }
}

impl std::fmt::Display for Compass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic rain label. Localization belongs to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RainDescription {
    #[serde(rename = "Dry")]
    Dry,
    #[serde(rename = "Light rain")]
    LightRain,
}

impl RainDescription {
    /// Any positive rain intensity counts as light rain
    pub fn from_intensity(rain_mm_per_hour: f64) -> Self {
        if rain_mm_per_hour > 0.0 {
            RainDescription::LightRain
        } else {
            RainDescription::Dry
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RainDescription::Dry => "Dry",
            RainDescription::LightRain => "Light rain",
        }
    }
}

impl std::fmt::Display for RainDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized current conditions for a segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    /// Air temperature in Celsius
    pub temperature: f64,
    /// Approximate feels-like temperature in Celsius.
    ///
    /// The provider does not supply this value. It is derived as
    /// `temperature - 1.5` and is NOT a measured or modelled reading.
    pub feels_like: f64,
    /// Wind speed in m/s
    pub wind_speed: f64,
    /// Wind gust speed in m/s
    pub gust_speed: f64,
    /// Wind direction as a compass point
    pub wind_direction: Compass,
    /// Wind direction in degrees, 0 when not reported
    pub wind_direction_degrees: f64,
    /// Relative humidity percentage (0-100)
    pub humidity_percent: f64,
    /// Rain intensity in mm/h
    pub rain_intensity: f64,
    /// Dry / light rain label
    pub rain_description: RainDescription,
    /// UV index
    pub uv_index: f64,
}

/// One hourly step of the provider's time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Local time of the step, as reported by the provider
    pub timestamp: NaiveDateTime,
    /// Temperature in Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    /// Wind speed in m/s
    pub wind_speed: f64,
    /// Wind gust speed in m/s
    pub wind_gust: f64,
    /// Rain in mm
    pub rain: f64,
    /// Wind direction in degrees
    pub wind_direction_degrees: f64,
    /// UV index
    pub uv_index: f64,
}

/// Everything one successful fetch produced.
///
/// The history window is stored as a range into `forecast`, so it can never
/// refer to points from another fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    /// Current conditions
    pub current: CurrentConditions,
    /// Hourly points in ascending time order
    pub forecast: Vec<ForecastPoint>,
    history: Range<usize>,
}

impl WeatherReport {
    /// Builds a report, deriving the history window from the provider's
    /// "current" timestamp. See [`weather::history_window`].
    pub fn new(
        current: CurrentConditions,
        forecast: Vec<ForecastPoint>,
        now: Option<NaiveDateTime>,
    ) -> Self {
        let history = weather::history_window(&forecast, now);
        Self {
            current,
            forecast,
            history,
        }
    }

    /// Up to 24 hourly points strictly before the "current" step
    pub fn history(&self) -> &[ForecastPoint] {
        &self.forecast[self.history.clone()]
    }
}

/// Immutable result of one fetch cycle for one segment.
///
/// Either all of current/forecast/history are present (same fetch) or none
/// are. A failed fetch produces the absent variant rather than keeping stale
/// fields.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    /// The segment this fetch was issued for
    pub segment_id: &'static str,
    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,
    report: Option<WeatherReport>,
}

impl WeatherSnapshot {
    /// Snapshot from a successful fetch
    pub fn available(segment_id: &'static str, report: WeatherReport) -> Self {
        Self {
            segment_id,
            fetched_at: Utc::now(),
            report: Some(report),
        }
    }

    /// Snapshot from a failed fetch: every data field is absent
    pub fn unavailable(segment_id: &'static str) -> Self {
        Self {
            segment_id,
            fetched_at: Utc::now(),
            report: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.report.is_some()
    }

    pub fn report(&self) -> Option<&WeatherReport> {
        self.report.as_ref()
    }

    pub fn current(&self) -> Option<&CurrentConditions> {
        self.report.as_ref().map(|r| &r.current)
    }

    pub fn forecast(&self) -> Option<&[ForecastPoint]> {
        self.report.as_ref().map(|r| r.forecast.as_slice())
    }

    pub fn history(&self) -> Option<&[ForecastPoint]> {
        self.report.as_ref().map(|r| r.history())
    }
}

// Absent data serializes as explicit nulls, never as zero readings.
impl Serialize for WeatherSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("WeatherSnapshot", 5)?;
        state.serialize_field("segment_id", self.segment_id)?;
        state.serialize_field("fetched_at", &self.fetched_at)?;
        state.serialize_field("current", &self.current())?;
        state.serialize_field("forecast", &self.forecast())?;
        state.serialize_field("history", &self.history())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(hour: u32) -> ForecastPoint {
        ForecastPoint {
            timestamp: chrono::NaiveDate::from_ymd_opt(2024, 7, 15)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
            temperature: 15.0 + hour as f64,
            humidity: 60.0,
            wind_speed: 4.0,
            wind_gust: 7.5,
            rain: 0.0,
            wind_direction_degrees: 180.0,
            uv_index: 1.0,
        }
    }

    fn conditions() -> CurrentConditions {
        CurrentConditions {
            temperature: 20.0,
            feels_like: 18.5,
            wind_speed: 5.0,
            gust_speed: 9.0,
            wind_direction: Compass::S,
            wind_direction_degrees: 180.0,
            humidity_percent: 70.0,
            rain_intensity: 0.0,
            rain_description: RainDescription::Dry,
            uv_index: 3.0,
        }
    }

    #[test]
    fn test_compass_reference_values() {
        assert_eq!(Compass::from_degrees(Some(0.0)), Compass::N);
        assert_eq!(Compass::from_degrees(Some(44.0)), Compass::N);
        assert_eq!(Compass::from_degrees(Some(46.0)), Compass::NE);
        assert_eq!(Compass::from_degrees(Some(90.0)), Compass::E);
        assert_eq!(Compass::from_degrees(Some(360.0)), Compass::N);
        assert_eq!(Compass::from_degrees(None), Compass::Unavailable);
    }

    #[test]
    fn test_compass_sector_boundaries() {
        assert_eq!(Compass::from_degrees(Some(22.5)), Compass::N);
        assert_eq!(Compass::from_degrees(Some(45.0)), Compass::NE);
        assert_eq!(Compass::from_degrees(Some(359.9)), Compass::NW);
        assert_eq!(Compass::from_degrees(Some(-10.0)), Compass::NW);
        assert_eq!(Compass::from_degrees(Some(720.0)), Compass::N);
    }

    #[test]
    fn test_compass_upper_half_sector_is_not_rounded_up() {
        assert_eq!(Compass::from_degrees(Some(30.0)), Compass::N);
        assert_eq!(Compass::from_degrees(Some(350.0)), Compass::NW);
        assert_eq!(Compass::from_degrees(Some(112.0)), Compass::E);
    }

    #[test]
    fn test_compass_display_labels() {
        assert_eq!(Compass::SW.to_string(), "SW");
        assert_eq!(Compass::Unavailable.to_string(), "N/A");
        assert_eq!(
            serde_json::to_string(&Compass::Unavailable).unwrap(),
            "\"N/A\""
        );
    }

    #[test]
    fn test_rain_description_from_intensity() {
        assert_eq!(RainDescription::from_intensity(0.0), RainDescription::Dry);
        assert_eq!(RainDescription::from_intensity(0.1), RainDescription::LightRain);
        assert_eq!(RainDescription::LightRain.to_string(), "Light rain");
        assert_eq!(
            serde_json::to_string(&RainDescription::LightRain).unwrap(),
            "\"Light rain\""
        );
    }

    #[test]
    fn test_report_history_is_slice_of_forecast() {
        let forecast: Vec<ForecastPoint> = (0..6).map(point).collect();
        let now = Some(forecast[4].timestamp);
        let report = WeatherReport::new(conditions(), forecast.clone(), now);

        assert_eq!(report.history(), &forecast[0..4]);
    }

    #[test]
    fn test_unavailable_snapshot_has_no_fields() {
        let snapshot = WeatherSnapshot::unavailable("delft");

        assert!(!snapshot.is_available());
        assert!(snapshot.current().is_none());
        assert!(snapshot.forecast().is_none());
        assert!(snapshot.history().is_none());
        assert_eq!(snapshot.segment_id, "delft");
    }

    #[test]
    fn test_available_snapshot_exposes_all_fields() {
        let forecast: Vec<ForecastPoint> = (0..3).map(point).collect();
        let report = WeatherReport::new(conditions(), forecast, Some(point(2).timestamp));
        let snapshot = WeatherSnapshot::available("aruba", report);

        assert!(snapshot.is_available());
        assert_eq!(snapshot.current().map(|c| c.temperature), Some(20.0));
        assert_eq!(snapshot.forecast().map(<[_]>::len), Some(3));
        assert_eq!(snapshot.history().map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_snapshot_serializes_history_points() {
        let forecast: Vec<ForecastPoint> = (0..3).map(point).collect();
        let report = WeatherReport::new(conditions(), forecast, Some(point(1).timestamp));
        let snapshot = WeatherSnapshot::available("melbourne", report);

        let json = serde_json::to_value(&snapshot).expect("Failed to serialize snapshot");

        assert_eq!(json["segment_id"], "melbourne");
        assert_eq!(json["forecast"].as_array().map(Vec::len), Some(3));
        assert_eq!(json["history"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["current"]["wind_direction"], "S");
    }

    #[test]
    fn test_unavailable_snapshot_serializes_without_data() {
        let json = serde_json::to_value(WeatherSnapshot::unavailable("delft"))
            .expect("Failed to serialize snapshot");

        assert_eq!(json["segment_id"], "delft");
        assert!(json["current"].is_null());
        assert!(json["forecast"].is_null());
        assert!(json["history"].is_null());
    }
}
