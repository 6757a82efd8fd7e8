//! Daily weather forecast model

use serde::{Deserialize, Serialize};

/// Forecast for a single day, merged with the lifestyle advisories for that day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherDay {
    /// Forecast date (`YYYY-MM-DD`, or `今天` for the placeholder)
    pub date: String,
    /// Minimum temperature in Celsius
    pub temp_min: i32,
    /// Maximum temperature in Celsius
    pub temp_max: i32,
    /// Daytime condition text
    pub condition: String,
    /// Dressing advisory, empty when the provider returned none for the date
    pub dressing_advice: String,
    /// UV advisory, empty when the provider returned none for the date
    pub uv_advice: String,
}

impl WeatherDay {
    /// Substitute day used when the weather provider is unavailable
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            date: "今天".to_string(),
            temp_min: 15,
            temp_max: 25,
            condition: "晴".to_string(),
            dressing_advice: "适宜".to_string(),
            uv_advice: String::new(),
        }
    }

    /// Format the temperature range, e.g. `15~25°C`
    #[must_use]
    pub fn format_temperature(&self) -> String {
        format!("{}~{}°C", self.temp_min, self.temp_max)
    }
}
