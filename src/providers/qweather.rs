//! QWeather adapter: city lookup, 3-day forecast and lifestyle indices

use super::de::lenient_string;
use super::http::{HttpSettings, build_client, fetch_json, url_with_query};
use super::qweather_auth::TokenSigner;
use super::{ProviderError, ProviderResult, WeatherProvider};
use crate::config::WeatherConfig;
use crate::models::WeatherDay;
use async_trait::async_trait;
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

const GEO_PATH: &str = "/geo/v2/city/lookup";
const FORECAST_PATH: &str = "/v7/weather/3d";
const INDICES_PATH: &str = "/v7/indices/3d";

/// Index type for dressing advice
const INDEX_DRESSING: &str = "3";
/// Index type for UV advice
const INDEX_UV: &str = "5";

/// Weather provider backed by the QWeather API
pub struct QWeatherProvider {
    client: ClientWithMiddleware,
    api_host: String,
    api_key: Option<String>,
    bearer_token: Option<String>,
    signer: Option<TokenSigner>,
}

impl QWeatherProvider {
    pub fn new(config: &WeatherConfig) -> ProviderResult<Self> {
        let settings = HttpSettings::new(config.timeout_seconds, config.max_retries);
        Ok(Self {
            client: build_client(&settings)?,
            api_host: config.api_host.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            bearer_token: config.bearer_token.clone().filter(|t| !t.is_empty()),
            signer: config
                .signing_key()
                .map(|key| TokenSigner::load(&key))
                .transpose()?,
        })
    }

    /// Authenticated GET
    ///
    /// A signed token takes precedence over a static bearer token, which takes
    /// precedence over the API key header.
    fn get(&self, path: &str, params: &[(&str, &str)]) -> ProviderResult<RequestBuilder> {
        let url = url_with_query(&format!("{}{path}", self.api_host), params);
        let request = self.client.get(url).header("Accept", "application/json");

        if let Some(signer) = &self.signer {
            let token = signer.token()?;
            return Ok(request.header("Authorization", format!("Bearer {token}")));
        }

        match (&self.bearer_token, &self.api_key) {
            (Some(token), _) => Ok(request.header("Authorization", format!("Bearer {token}"))),
            (None, Some(key)) => Ok(request.header("X-QW-Api-Key", key.as_str())),
            (None, None) => Err(ProviderError::Config(
                "QWeather credentials are not configured".to_string(),
            )),
        }
    }

    async fn city_id(&self, city: &str, cancel: &CancellationToken) -> ProviderResult<String> {
        let request = self.get(GEO_PATH, &[("location", city)])?;
        let response: GeoResponse = fetch_json(request, cancel, "QWeather city lookup").await?;
        check_code(&response.code, "city lookup")?;

        response
            .location
            .into_iter()
            .map(|l| l.id)
            .find(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::NoResults(format!("City not found: {city}")))
    }
}

#[async_trait]
impl WeatherProvider for QWeatherProvider {
    #[instrument(skip(self, cancel))]
    async fn fetch_weather(
        &self,
        city: &str,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<WeatherDay>> {
        let city_id = self.city_id(city, cancel).await?;
        debug!("Resolved city {} to id {}", city, city_id);

        let forecast_request = self.get(FORECAST_PATH, &[("location", city_id.as_str())])?;
        let indices_request = self.get(
            INDICES_PATH,
            &[("location", city_id.as_str()), ("type", "3,5")],
        )?;

        let (forecast, indices) = tokio::try_join!(
            fetch_json::<ForecastResponse>(forecast_request, cancel, "QWeather forecast"),
            fetch_json::<IndicesResponse>(indices_request, cancel, "QWeather indices"),
        )?;
        check_code(&forecast.code, "forecast")?;
        check_code(&indices.code, "indices")?;

        let days = merge_forecast(forecast, indices);
        if days.is_empty() {
            return Err(ProviderError::NoResults(format!("No forecast for {city}")));
        }
        Ok(days)
    }
}

fn check_code(code: &str, what: &str) -> ProviderResult<()> {
    if code == "200" {
        Ok(())
    } else {
        Err(ProviderError::NoResults(format!("QWeather {what} returned code {code}")))
    }
}

/// Outer-join forecast days with advisories by date, keeping forecast order
fn merge_forecast(forecast: ForecastResponse, indices: IndicesResponse) -> Vec<WeatherDay> {
    forecast
        .daily
        .into_iter()
        .filter_map(|day| {
            let (Ok(temp_min), Ok(temp_max)) =
                (day.temp_min.trim().parse::<i32>(), day.temp_max.trim().parse::<i32>())
            else {
                warn!("Skipping forecast day {} with unparseable temperatures", day.fx_date);
                return None;
            };

            let advice = |kind: &str| {
                indices
                    .daily
                    .iter()
                    .find(|i| i.date == day.fx_date && i.kind == kind)
                    .map(|i| i.text.clone())
                    .unwrap_or_default()
            };

            Some(WeatherDay {
                dressing_advice: advice(INDEX_DRESSING),
                uv_advice: advice(INDEX_UV),
                date: day.fx_date,
                temp_min,
                temp_max,
                condition: day.text_day,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    code: String,
    #[serde(default)]
    location: Vec<GeoLocation>,
}

#[derive(Debug, Deserialize)]
struct GeoLocation {
    #[serde(default, deserialize_with = "lenient_string")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    code: String,
    #[serde(default)]
    daily: Vec<ForecastDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastDay {
    #[serde(default)]
    fx_date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    temp_max: String,
    #[serde(default, deserialize_with = "lenient_string")]
    temp_min: String,
    #[serde(default)]
    text_day: String,
}

#[derive(Debug, Deserialize)]
struct IndicesResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    code: String,
    #[serde(default)]
    daily: Vec<IndexDay>,
}

#[derive(Debug, Deserialize)]
struct IndexDay {
    #[serde(default)]
    date: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    kind: String,
    #[serde(default)]
    text: String,
}
