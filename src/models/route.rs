//! Route models: transport modes, options and their ordered steps

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport mode a route option was computed for
///
/// The derived ordering drives rendering order: driving first, then transit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Driving,
    Transit,
}

impl TransportMode {
    /// Lowercase key used in embedded JSON and logs
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            TransportMode::Driving => "driving",
            TransportMode::Transit => "transit",
        }
    }

    /// Human-readable label shown in rendered documents
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TransportMode::Driving => "自驾",
            TransportMode::Transit => "公交",
        }
    }

    /// Decorative icon shown next to the label
    #[must_use]
    pub fn icon(self) -> &'static str {
        match self {
            TransportMode::Driving => "🚗",
            TransportMode::Transit => "🚇",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One instruction of a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStep {
    /// Turn-by-turn instruction text
    pub instruction: String,
    /// Duration in whole minutes
    #[serde(rename = "duration")]
    pub duration_min: u32,
    /// Distance in meters
    #[serde(rename = "distance")]
    pub distance_meters: u32,
}

impl RouteStep {
    #[must_use]
    pub fn new(instruction: impl Into<String>, duration_min: u32, distance_meters: u32) -> Self {
        Self {
            instruction: instruction.into(),
            duration_min,
            distance_meters,
        }
    }
}

/// A complete route for one transport mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelOption {
    pub mode: TransportMode,
    /// Total duration in minutes
    pub duration_min: u32,
    /// Total distance in kilometers, formatted with one fraction digit
    pub distance_km: String,
    /// Cost description (e.g. fare or toll); may be empty
    pub cost: String,
    pub steps: Vec<RouteStep>,
    /// Path as `"lng,lat;lng,lat;..."`
    pub polyline: String,
}

/// Format meters as kilometers with one fraction digit
#[must_use]
pub fn format_distance_km(meters: u64) -> String {
    format!("{:.1}", meters as f64 / 1000.0)
}

/// Join polyline fragments in order, skipping empty fragments
#[must_use]
pub fn join_polylines<'a, I>(fragments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    fragments
        .into_iter()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(";")
}

/// Split a polyline into `(lng, lat)` points; malformed points are skipped
#[must_use]
pub fn parse_polyline(polyline: &str) -> Vec<(f64, f64)> {
    polyline
        .split(';')
        .filter_map(|point| {
            let (lng, lat) = point.split_once(',')?;
            Some((lng.trim().parse().ok()?, lat.trim().parse().ok()?))
        })
        .collect()
}
