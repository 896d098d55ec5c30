//! Plain-text and JSON output for published snapshots
//!
//! Absent data is always written out as "unavailable" (or `null` in JSON),
//! never as zero readings.

use serde::Serialize;

use crate::data::{Segment, UvLevel, WeatherSnapshot};

/// One JSON record per published snapshot
#[derive(Debug, Serialize)]
struct SnapshotRecord<'a> {
    segment: &'a Segment,
    #[serde(flatten)]
    snapshot: &'a WeatherSnapshot,
    uv_index: Option<u32>,
    uv_level: Option<UvLevel>,
}

fn heading(segment: &Segment) -> String {
    format!("[{}, {}]", segment.name, segment.location_label)
}

/// Line shown while the first fetch for a segment is outstanding
pub fn loading_line(segment: &Segment) -> String {
    format!("{} loading...", heading(segment))
}

/// One-line summary of a snapshot
///
/// `uv_index` is the separately fetched, rounded UV index, if any.
pub fn summary_line(segment: &Segment, snapshot: &WeatherSnapshot, uv_index: Option<u32>) -> String {
    let (Some(current), Some(forecast), Some(history)) =
        (snapshot.current(), snapshot.forecast(), snapshot.history())
    else {
        return format!("{} weather unavailable", heading(segment));
    };

    let uv = match uv_index {
        Some(index) => format!("UV {} ({})", index, UvLevel::from_index(index).label()),
        None => format!("UV {:.1}", current.uv_index),
    };

    format!(
        "{} {:.1}\u{00B0}C (feels ~{:.1}\u{00B0}C) | wind {:.1} m/s gust {:.1} m/s {} ({:.0}\u{00B0}) | humidity {:.0}% | {} {:.1} mm/h | {} | history {}h forecast {}h | fetched {}",
        heading(segment),
        current.temperature,
        current.feels_like,
        current.wind_speed,
        current.gust_speed,
        current.wind_direction,
        current.wind_direction_degrees,
        current.humidity_percent,
        current.rain_description,
        current.rain_intensity,
        uv,
        history.len(),
        forecast.len(),
        snapshot.fetched_at.format("%H:%M:%SZ"),
    )
}

/// A snapshot as a single JSON line
pub fn json_line(
    segment: &Segment,
    snapshot: &WeatherSnapshot,
    uv_index: Option<u32>,
) -> Result<String, serde_json::Error> {
    serde_json::to_string(&SnapshotRecord {
        segment,
        snapshot,
        uv_index,
        uv_level: uv_index.map(UvLevel::from_index),
    })
}
