//! Configuration management for `TripPlan`
//!
//! Handles loading configuration from files and environment variables,
//! and provides validation for all configuration settings.

use crate::error::PlannerError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for the `TripPlan` service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripPlanConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// AMap routing configuration
    #[serde(default)]
    pub routing: RoutingConfig,
    /// QWeather configuration
    #[serde(default)]
    pub weather: WeatherConfig,
    /// Ctrip ticket search configuration
    #[serde(default)]
    pub tickets: TicketsConfig,
    /// Tavily dish lookup configuration
    #[serde(default)]
    pub dishes: DishesConfig,
    /// Article crawler configuration
    #[serde(default)]
    pub articles: ArticlesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server and artifact settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Base URL used when composing links to generated artifacts
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Directory the HTML and Markdown documents are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Artifacts older than this are deleted by the cleanup task
    #[serde(default = "default_artifact_max_age")]
    pub artifact_max_age_minutes: u32,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_minutes: u32,
}

/// AMap web service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_routing_base_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    #[serde(default = "default_provider_max_retries")]
    pub max_retries: u32,
}

/// QWeather settings
///
/// Credentials are tried in order: a signing key (`private_key_path`, `key_id`
/// and `project_id` together), then a static bearer token, then the API key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_weather_api_host")]
    pub api_host: String,
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    /// PKCS#8 PEM file holding the Ed25519 key tokens are signed with
    pub private_key_path: Option<String>,
    /// Credential id sent as the token `kid`
    pub key_id: Option<String>,
    /// Project id sent as the token `sub`
    pub project_id: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    #[serde(default = "default_provider_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketsConfig {
    #[serde(default = "default_tickets_suggest_url")]
    pub suggest_url: String,
    /// Client id sent with every suggest request
    #[serde(default = "default_tickets_client_id")]
    pub client_id: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    #[serde(default = "default_provider_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DishesConfig {
    #[serde(default = "default_dishes_endpoint")]
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Number of lookups running at once
    #[serde(default = "default_dishes_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    #[serde(default)]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticlesConfig {
    #[serde(default = "default_articles_concurrency")]
    pub concurrency: usize,
    /// Base politeness delay per page; the actual delay is drawn from `[base/2, base]`
    #[serde(default = "default_articles_jitter")]
    pub jitter_millis: u64,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_articles_user_agent")]
    pub user_agent: String,
}

/// Plan store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory of the plan database
    #[serde(default = "default_storage_path")]
    pub path: String,
    #[serde(default = "default_plan_expiry")]
    pub plan_expiry_hours: u32,
    /// How often expired plans are swept from the database
    #[serde(default = "default_purge_interval")]
    pub purge_interval_minutes: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_port() -> u16 {
    8080
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_output_dir() -> String {
    "static/plans".to_string()
}

fn default_artifact_max_age() -> u32 {
    120
}

fn default_cleanup_interval() -> u32 {
    10
}

fn default_routing_base_url() -> String {
    "https://restapi.amap.com".to_string()
}

fn default_timeout() -> u32 {
    10
}

fn default_provider_max_retries() -> u32 {
    2
}

fn default_weather_api_host() -> String {
    "https://devapi.qweather.com".to_string()
}

fn default_tickets_suggest_url() -> String {
    "https://m.ctrip.com/restapi/soa2/20684/suggest".to_string()
}

fn default_tickets_client_id() -> String {
    "09031078417829145376".to_string()
}

fn default_dishes_endpoint() -> String {
    "https://api.tavily.com/search".to_string()
}

fn default_dishes_concurrency() -> usize {
    5
}

fn default_articles_concurrency() -> usize {
    3
}

fn default_articles_jitter() -> u64 {
    1000
}

fn default_articles_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
        .to_string()
}

fn default_storage_path() -> String {
    dirs::data_dir()
        .map(|dir| dir.join("tripplan").join("plans"))
        .unwrap_or_else(|| PathBuf::from("data/plans"))
        .to_string_lossy()
        .into_owned()
}

fn default_plan_expiry() -> u32 {
    24
}

fn default_purge_interval() -> u32 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            public_base_url: default_public_base_url(),
            output_dir: default_output_dir(),
            artifact_max_age_minutes: default_artifact_max_age(),
            cleanup_interval_minutes: default_cleanup_interval(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: default_routing_base_url(),
            api_key: None,
            timeout_seconds: default_timeout(),
            max_retries: default_provider_max_retries(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_host: default_weather_api_host(),
            api_key: None,
            bearer_token: None,
            private_key_path: None,
            key_id: None,
            project_id: None,
            timeout_seconds: default_timeout(),
            max_retries: default_provider_max_retries(),
        }
    }
}

impl Default for TicketsConfig {
    fn default() -> Self {
        Self {
            suggest_url: default_tickets_suggest_url(),
            client_id: default_tickets_client_id(),
            timeout_seconds: default_timeout(),
            max_retries: default_provider_max_retries(),
        }
    }
}

impl Default for DishesConfig {
    fn default() -> Self {
        Self {
            endpoint: default_dishes_endpoint(),
            api_key: None,
            concurrency: default_dishes_concurrency(),
            timeout_seconds: default_timeout(),
            max_retries: 0,
        }
    }
}

impl Default for ArticlesConfig {
    fn default() -> Self {
        Self {
            concurrency: default_articles_concurrency(),
            jitter_millis: default_articles_jitter(),
            timeout_seconds: default_timeout(),
            max_retries: 0,
            user_agent: default_articles_user_agent(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            plan_expiry_hours: default_plan_expiry(),
            purge_interval_minutes: default_purge_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn artifact_max_age(&self) -> Duration {
        Duration::from_secs(u64::from(self.artifact_max_age_minutes) * 60)
    }

    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.cleanup_interval_minutes) * 60)
    }
}

/// Fields needed to sign QWeather request tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeatherSigningKey<'a> {
    pub private_key_path: &'a str,
    pub key_id: &'a str,
    pub project_id: &'a str,
}

impl WeatherConfig {
    /// The signing settings, when all three are set
    #[must_use]
    pub fn signing_key(&self) -> Option<WeatherSigningKey<'_>> {
        fn non_empty(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|v| !v.is_empty())
        }
        Some(WeatherSigningKey {
            private_key_path: non_empty(&self.private_key_path)?,
            key_id: non_empty(&self.key_id)?,
            project_id: non_empty(&self.project_id)?,
        })
    }
}

impl ArticlesConfig {
    #[must_use]
    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_millis)
    }
}

impl StorageConfig {
    #[must_use]
    pub fn plan_expiry(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.plan_expiry_hours))
    }

    #[must_use]
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.purge_interval_minutes) * 60)
    }
}

impl TripPlanConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path()
                .filter(|path| path.exists())
                .unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. TRIPPLAN_ROUTING__API_KEY
        builder = builder.add_source(
            Environment::with_prefix("TRIPPLAN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: TripPlanConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tripplan").join("config.toml"))
    }

    /// Apply default values to empty or zero configuration fields
    ///
    /// Retry counts are left alone since zero is a valid setting.
    pub fn apply_defaults(&mut self) {
        if self.server.port == 0 {
            self.server.port = default_port();
        }
        if self.server.public_base_url.is_empty() {
            self.server.public_base_url = default_public_base_url();
        }
        if self.server.output_dir.is_empty() {
            self.server.output_dir = default_output_dir();
        }
        if self.server.artifact_max_age_minutes == 0 {
            self.server.artifact_max_age_minutes = default_artifact_max_age();
        }
        if self.server.cleanup_interval_minutes == 0 {
            self.server.cleanup_interval_minutes = default_cleanup_interval();
        }
        if self.routing.base_url.is_empty() {
            self.routing.base_url = default_routing_base_url();
        }
        if self.weather.api_host.is_empty() {
            self.weather.api_host = default_weather_api_host();
        }
        if self.tickets.suggest_url.is_empty() {
            self.tickets.suggest_url = default_tickets_suggest_url();
        }
        if self.tickets.client_id.is_empty() {
            self.tickets.client_id = default_tickets_client_id();
        }
        if self.dishes.endpoint.is_empty() {
            self.dishes.endpoint = default_dishes_endpoint();
        }
        if self.dishes.concurrency == 0 {
            self.dishes.concurrency = default_dishes_concurrency();
        }
        if self.articles.concurrency == 0 {
            self.articles.concurrency = default_articles_concurrency();
        }
        if self.articles.user_agent.is_empty() {
            self.articles.user_agent = default_articles_user_agent();
        }
        for timeout in [
            &mut self.routing.timeout_seconds,
            &mut self.weather.timeout_seconds,
            &mut self.tickets.timeout_seconds,
            &mut self.dishes.timeout_seconds,
            &mut self.articles.timeout_seconds,
        ] {
            if *timeout == 0 {
                *timeout = default_timeout();
            }
        }
        if self.storage.path.is_empty() {
            self.storage.path = default_storage_path();
        }
        if self.storage.plan_expiry_hours == 0 {
            self.storage.plan_expiry_hours = default_plan_expiry();
        }
        if self.storage.purge_interval_minutes == 0 {
            self.storage.purge_interval_minutes = default_purge_interval();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        Ok(())
    }

    /// Check that the credentials plan generation depends on are present
    ///
    /// Not part of [`validate`](Self::validate): the server can start without
    /// them and report provider failures per request.
    pub fn validate_api_keys(&self) -> Result<()> {
        if self.routing.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(PlannerError::config(
                "AMap API key is missing. Set routing.api_key or TRIPPLAN_ROUTING__API_KEY.",
            )
            .into());
        }

        let has_weather_credentials = self.weather.signing_key().is_some()
            || [&self.weather.api_key, &self.weather.bearer_token]
                .iter()
                .any(|value| value.as_deref().is_some_and(|v| !v.is_empty()));
        if !has_weather_credentials {
            return Err(PlannerError::config(
                "QWeather credentials are missing. Set weather.private_key_path with key_id and project_id, weather.bearer_token or weather.api_key.",
            )
            .into());
        }

        Ok(())
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        let timeouts = [
            ("Routing", self.routing.timeout_seconds),
            ("Weather", self.weather.timeout_seconds),
            ("Tickets", self.tickets.timeout_seconds),
            ("Dishes", self.dishes.timeout_seconds),
            ("Articles", self.articles.timeout_seconds),
        ];
        for (section, timeout) in timeouts {
            if timeout > 300 {
                return Err(PlannerError::config(format!(
                    "{section} timeout cannot exceed 300 seconds"
                ))
                .into());
            }
        }

        let retries = [
            ("Routing", self.routing.max_retries),
            ("Weather", self.weather.max_retries),
            ("Tickets", self.tickets.max_retries),
            ("Dishes", self.dishes.max_retries),
            ("Articles", self.articles.max_retries),
        ];
        for (section, max_retries) in retries {
            if max_retries > 10 {
                return Err(
                    PlannerError::config(format!("{section} max retries cannot exceed 10")).into(),
                );
            }
        }

        if self.dishes.concurrency > 64 || self.articles.concurrency > 64 {
            return Err(PlannerError::config("Worker concurrency cannot exceed 64").into());
        }

        if self.articles.jitter_millis > 60_000 {
            return Err(PlannerError::config("Article jitter cannot exceed 60000 ms").into());
        }

        if self.storage.plan_expiry_hours > 720 {
            return Err(
                PlannerError::config("Plan expiry cannot exceed 720 hours (30 days)").into(),
            );
        }

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(PlannerError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(PlannerError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        let urls = [
            ("Public base URL", &self.server.public_base_url),
            ("AMap base URL", &self.routing.base_url),
            ("QWeather API host", &self.weather.api_host),
            ("Ctrip suggest URL", &self.tickets.suggest_url),
            ("Tavily endpoint", &self.dishes.endpoint),
        ];
        for (name, url) in urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(PlannerError::config(format!(
                    "{name} must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        let signing_fields = [
            &self.weather.private_key_path,
            &self.weather.key_id,
            &self.weather.project_id,
        ];
        let set = signing_fields
            .iter()
            .filter(|value| value.as_deref().is_some_and(|v| !v.is_empty()))
            .count();
        if set != 0 && set != signing_fields.len() {
            return Err(PlannerError::config(
                "QWeather token signing needs private_key_path, key_id and project_id together",
            )
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TripPlanConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.output_dir, "static/plans");
        assert_eq!(config.routing.base_url, "https://restapi.amap.com");
        assert_eq!(config.weather.timeout_seconds, 10);
        assert_eq!(config.dishes.max_retries, 0);
        assert_eq!(config.articles.jitter(), Duration::from_secs(1));
        assert_eq!(config.storage.plan_expiry(), chrono::Duration::hours(24));
        assert_eq!(config.storage.purge_interval(), Duration::from_secs(3600));
        assert_eq!(config.server.cleanup_interval(), Duration::from_secs(600));
        assert_eq!(config.server.artifact_max_age(), Duration::from_secs(7200));
        assert_eq!(config.logging.level, "info");
        assert!(config.routing.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_keys_are_required_for_planning() {
        let mut config = TripPlanConfig::default();
        let result = config.validate_api_keys();
        assert!(result.unwrap_err().to_string().contains("AMap API key"));

        config.routing.api_key = Some("amap_key_123".to_string());
        let result = config.validate_api_keys();
        assert!(result.unwrap_err().to_string().contains("QWeather"));

        config.weather.bearer_token = Some("jwt".to_string());
        assert!(config.validate_api_keys().is_ok());
    }

    #[test]
    fn test_signing_key_satisfies_weather_credentials() {
        let mut config = TripPlanConfig::default();
        config.routing.api_key = Some("amap_key_123".to_string());
        config.weather.private_key_path = Some("/etc/tripplan/ed25519-private.pem".to_string());
        config.weather.key_id = Some("KEY123".to_string());
        assert!(config.weather.signing_key().is_none());
        assert!(config.validate_api_keys().is_err());

        config.weather.project_id = Some("PROJ456".to_string());
        let key = config.weather.signing_key().unwrap();
        assert_eq!(key.key_id, "KEY123");
        assert_eq!(key.project_id, "PROJ456");
        assert!(config.validate_api_keys().is_ok());
    }

    #[test]
    fn test_partial_signing_settings_are_rejected() {
        let mut config = TripPlanConfig::default();
        config.weather.key_id = Some("KEY123".to_string());
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("private_key_path"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = TripPlanConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = TripPlanConfig::default();
        config.weather.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));

        let mut config = TripPlanConfig::default();
        config.articles.max_retries = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_non_http_urls() {
        let mut config = TripPlanConfig::default();
        config.dishes.endpoint = "ftp://api.tavily.com".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Tavily endpoint"));
    }

    #[test]
    fn test_apply_defaults_keeps_zero_retries() {
        let mut config = TripPlanConfig::default();
        config.routing.max_retries = 0;
        config.dishes.concurrency = 0;
        config.tickets.timeout_seconds = 0;
        config.logging.format = String::new();

        config.apply_defaults();
        assert_eq!(config.routing.max_retries, 0);
        assert_eq!(config.dishes.concurrency, 5);
        assert_eq!(config.tickets.timeout_seconds, 10);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9090
public_base_url = "https://trip.example.com"

[routing]
api_key = "amap_key_123"
max_retries = 0

[articles]
concurrency = 8
"#
        )
        .unwrap();

        let config = TripPlanConfig::load_from_path(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.public_base_url, "https://trip.example.com");
        assert_eq!(config.server.output_dir, "static/plans");
        assert_eq!(config.routing.api_key.as_deref(), Some("amap_key_123"));
        assert_eq!(config.routing.max_retries, 0);
        assert_eq!(config.articles.concurrency, 8);
        assert_eq!(config.tickets.client_id, "09031078417829145376");
    }

    #[test]
    fn test_config_path_generation() {
        let path = TripPlanConfig::get_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("tripplan"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }
}
