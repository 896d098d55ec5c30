//! Static registry of monitored segments
//!
//! This module contains the fixed list of monitored sites with their
//! geographic coordinates. The registry is reference data: ids never change
//! at runtime and the first entry is the default selection.

use thiserror::Error;

use super::Segment;

/// Errors from registry lookups
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The id is not part of the registry
    #[error("Unknown segment: '{0}'")]
    NotFound(String),
}

/// Static array of all monitored segments, in display order
pub static SEGMENTS: [Segment; 3] = [
    Segment {
        id: "delft",
        name: "Delft (HQ)",
        location_label: "Netherlands",
        latitude: 52.0116,
        longitude: 4.3571,
    },
    Segment {
        id: "aruba",
        name: "Aruba",
        location_label: "Caribbean",
        latitude: 12.5211,
        longitude: -69.9683,
    },
    Segment {
        id: "melbourne",
        name: "Melbourne",
        location_label: "Australia",
        latitude: -37.8136,
        longitude: 144.9631,
    },
];

/// Get a segment by its ID
///
/// # Returns
///
/// Returns `Some(&Segment)` if found, `None` otherwise. Lookups are case
/// sensitive.
///
/// # Example
///
/// ```
/// use segwatch::data::segment::get_segment_by_id;
///
/// if let Some(segment) = get_segment_by_id("aruba") {
///     println!("Found: {}", segment.name);
/// }
/// ```
pub fn get_segment_by_id(id: &str) -> Option<&'static Segment> {
    SEGMENTS.iter().find(|segment| segment.id == id)
}

/// Resolve a segment id, failing with [`RegistryError::NotFound`]
pub fn resolve(id: &str) -> Result<&'static Segment, RegistryError> {
    get_segment_by_id(id).ok_or_else(|| RegistryError::NotFound(id.to_string()))
}

/// The segment selected when nothing else is: the first registry entry
pub fn default_segment() -> &'static Segment {
    &SEGMENTS[0]
}

/// Resolve a segment id, falling back to [`default_segment`] for unknown ids
pub fn resolve_or_default(id: &str) -> &'static Segment {
    resolve(id).unwrap_or_else(|err| {
        tracing::warn!(%err, fallback = default_segment().id, "falling back to default segment");
        default_segment()
    })
}

/// Get all monitored segments in registry order
///
/// # Example
///
/// ```
/// use segwatch::data::segment::all_segments;
///
/// for segment in all_segments() {
///     println!("{}: ({}, {})", segment.name, segment.latitude, segment.longitude);
/// }
/// ```
pub fn all_segments() -> &'static [Segment] {
    &SEGMENTS
}
