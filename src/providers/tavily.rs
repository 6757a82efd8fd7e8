//! Dish summaries from the Tavily search API
//!
//! [`TavilyDishProvider`] answers one dish at a time. [`DishInfoService`] fans a
//! batch of names out through the worker pool and keeps a per-batch ledger.

use super::de::lenient_string;
use super::http::{HttpSettings, build_client, fetch_json, with_json_body};
use super::{DishProvider, ProviderError, ProviderResult};
use crate::config::DishesConfig;
use crate::models::DishDetail;
use crate::models::dish::normalize_summary;
use crate::worker_pool::WorkerPool;
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Dish provider backed by Tavily's answer-enabled search
pub struct TavilyDishProvider {
    client: ClientWithMiddleware,
    endpoint: String,
    api_key: Option<String>,
}

impl TavilyDishProvider {
    pub fn new(config: &DishesConfig) -> ProviderResult<Self> {
        let settings = HttpSettings::new(config.timeout_seconds, config.max_retries);
        Ok(Self {
            client: build_client(&settings)?,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: String,
    search_depth: &'a str,
    max_results: u32,
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    answer: String,
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default, deserialize_with = "lenient_string")]
    content: String,
    #[serde(default, deserialize_with = "lenient_string")]
    url: String,
}

#[async_trait]
impl DishProvider for TavilyDishProvider {
    #[instrument(skip(self, cancel))]
    async fn fetch_dish(&self, name: &str, cancel: &CancellationToken) -> ProviderResult<DishDetail> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Config("Tavily API key is not configured".to_string()))?;

        let body = SearchRequest {
            api_key,
            query: format!("{name} 的详细食材清单、热量、过敏原。请直接以 'AI总结:' 开头。"),
            search_depth: "advanced",
            max_results: 1,
            include_answer: true,
        };
        let request = with_json_body(self.client.post(&self.endpoint), &body)?;
        let response: SearchResponse = fetch_json(request, cancel, "Tavily search").await?;

        dish_from(name, response)
    }
}

/// Prefer the AI answer, fall back to the first result's content
fn dish_from(name: &str, response: SearchResponse) -> ProviderResult<DishDetail> {
    let first = response.results.into_iter().next();
    let raw = if response.answer.trim().is_empty() {
        first.as_ref().map(|r| r.content.as_str()).unwrap_or_default()
    } else {
        response.answer.as_str()
    };

    let content_markdown = normalize_summary(raw)
        .ok_or_else(|| ProviderError::NoResults(format!("No summary for dish '{name}'")))?;

    Ok(DishDetail {
        title: name.to_string(),
        content_markdown,
        source_url: first.map(|r| r.url).unwrap_or_default(),
    })
}

/// Bookkeeping shared by the workers of one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchLedger {
    pub attempted: usize,
    pub succeeded: usize,
    /// Source URLs of successful lookups, in completion order
    pub sources: Vec<String>,
}

/// Outcome of one batch lookup
#[derive(Debug, Clone)]
pub struct DishBatch {
    pub details: Vec<DishDetail>,
    pub ledger: BatchLedger,
}

/// Looks up many dishes concurrently through the worker pool
#[derive(Clone)]
pub struct DishInfoService {
    provider: Arc<dyn DishProvider>,
    concurrency: usize,
}

impl DishInfoService {
    #[must_use]
    pub fn new(provider: Arc<dyn DishProvider>, concurrency: usize) -> Self {
        Self {
            provider,
            concurrency,
        }
    }

    /// Look up every name; names that fail are left out of the result
    pub async fn lookup(&self, names: Vec<String>, cancel: &CancellationToken) -> DishBatch {
        let ledger = Arc::new(Mutex::new(BatchLedger::default()));
        let pool = WorkerPool::new(self.concurrency).with_cancellation(cancel.clone());

        let details = {
            let provider = Arc::clone(&self.provider);
            let ledger = Arc::clone(&ledger);
            let cancel = cancel.clone();

            pool.run(names, move |name: String| {
                let provider = Arc::clone(&provider);
                let ledger = Arc::clone(&ledger);
                let cancel = cancel.clone();
                async move {
                    ledger.lock().await.attempted += 1;
                    let detail = provider.fetch_dish(&name, &cancel).await?;

                    let mut ledger = ledger.lock().await;
                    ledger.succeeded += 1;
                    if !detail.source_url.is_empty() {
                        ledger.sources.push(detail.source_url.clone());
                    }
                    debug!("Dish '{}' summarized", name);
                    Ok::<_, ProviderError>(detail)
                }
            })
            .await
        };

        let ledger = ledger.lock().await.clone();
        info!(
            "Dish batch done: {} attempted, {} succeeded, {} source(s)",
            ledger.attempted,
            ledger.succeeded,
            ledger.sources.len()
        );

        DishBatch { details, ledger }
    }
}
