//! Location model for geocoded route endpoints

use serde::{Deserialize, Serialize};

/// A geocoded address
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// The free-text address this location was resolved from
    pub name: String,
    /// Administrative area code, used as the city hint for transit queries
    pub adcode: Option<String>,
}

impl Location {
    /// Create location with an administrative area code
    #[must_use]
    pub fn with_adcode(longitude: f64, latitude: f64, name: String, adcode: String) -> Self {
        Self {
            longitude,
            latitude,
            name,
            adcode: Some(adcode),
        }
    }

    /// Parse a `"lng,lat"` coordinate pair as returned by the map provider
    #[must_use]
    pub fn parse_lng_lat(raw: &str) -> Option<(f64, f64)> {
        let (lng, lat) = raw.trim().split_once(',')?;
        let lng = lng.trim().parse::<f64>().ok()?;
        let lat = lat.trim().parse::<f64>().ok()?;

        if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        Some((lng, lat))
    }

    /// Format as a `"lng,lat"` query parameter (six fraction digits, the provider's precision)
    #[must_use]
    pub fn to_lng_lat(&self) -> String {
        format!("{:.6},{:.6}", self.longitude, self.latitude)
    }
}
