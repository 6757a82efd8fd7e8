//! External data providers
//!
//! Each adapter turns one upstream API into the crate's value objects:
//! - `amap`: geocoding plus driving and transit routes
//! - `qweather`: three-day forecast merged with lifestyle advisories, signed
//!   with short-lived tokens from `qweather_auth` when a key is configured
//! - `ctrip`: attraction ticket deep links
//! - `tavily`: dish summaries, fanned out through the worker pool
//! - `articles`: article pages crawled and converted to Markdown
//!
//! Adapters never panic; every failure is a [`ProviderError`].

pub mod amap;
pub mod articles;
pub mod ctrip;
pub mod de;
pub mod error;
pub mod http;
pub mod qweather;
pub mod qweather_auth;
pub mod tavily;

use crate::models::{Article, DishDetail, TicketInfo, TransportMode, TravelOption, WeatherDay};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

pub use amap::AmapRouteProvider;
pub use articles::{ArticleCrawler, CsdnArticleProvider};
pub use ctrip::CtripTicketProvider;
pub use error::{ProviderError, ProviderResult};
pub use qweather::QWeatherProvider;
pub use tavily::{DishInfoService, TavilyDishProvider};

/// Route options keyed by transport mode
pub type RouteOptions = BTreeMap<TransportMode, TravelOption>;

/// Resolves two free-text addresses to route options
#[async_trait]
pub trait RouteProvider: Send + Sync {
    /// Returns at least one mode on success
    async fn fetch_routes(
        &self,
        origin: &str,
        destination: &str,
        cancel: &CancellationToken,
    ) -> ProviderResult<RouteOptions>;
}

/// Multi-day forecast for a city name
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch_weather(
        &self,
        city: &str,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<WeatherDay>>;
}

/// Ticket deep links for a keyword; an empty list is a valid answer
#[async_trait]
pub trait TicketProvider: Send + Sync {
    async fn fetch_tickets(
        &self,
        keyword: &str,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<TicketInfo>>;
}

/// Summary for a single dish name
#[async_trait]
pub trait DishProvider: Send + Sync {
    async fn fetch_dish(&self, name: &str, cancel: &CancellationToken)
    -> ProviderResult<DishDetail>;
}

/// A single article page
#[async_trait]
pub trait ArticleProvider: Send + Sync {
    async fn fetch_article(&self, url: &str, cancel: &CancellationToken)
    -> ProviderResult<Article>;
}
