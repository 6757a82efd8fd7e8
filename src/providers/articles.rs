//! Article crawling for CSDN-style blog pages
//!
//! [`CsdnArticleProvider`] fetches and converts one page; [`ArticleCrawler`]
//! runs many through the worker pool with a jittered delay per page.

use super::http::{HttpSettings, build_client, fetch_text};
use super::{ArticleProvider, ProviderError, ProviderResult};
use crate::config::ArticlesConfig;
use crate::models::Article;
use crate::worker_pool::WorkerPool;
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

const SOURCE_TAG: &str = "csdn";

/// Fetches a single article page and converts its body to Markdown
pub struct CsdnArticleProvider {
    client: ClientWithMiddleware,
}

impl CsdnArticleProvider {
    pub fn new(config: &ArticlesConfig) -> ProviderResult<Self> {
        let settings = HttpSettings::new(config.timeout_seconds, config.max_retries)
            .with_user_agent(config.user_agent.as_str());
        Ok(Self {
            client: build_client(&settings)?,
        })
    }
}

#[async_trait]
impl ArticleProvider for CsdnArticleProvider {
    #[instrument(skip(self, cancel))]
    async fn fetch_article(&self, url: &str, cancel: &CancellationToken) -> ProviderResult<Article> {
        let body = fetch_text(self.client.get(url), cancel, "Article page").await?;
        parse_article(url, &body)
    }
}

fn selector(css: &str) -> ProviderResult<Selector> {
    Selector::parse(css).map_err(|e| ProviderError::Malformed(format!("Bad selector '{css}': {e:?}")))
}

fn first_text(document: &Html, css: &str) -> ProviderResult<String> {
    let sel = selector(css)?;
    Ok(document
        .select(&sel)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .unwrap_or_default())
}

/// Extract title and Markdown body from an article page
pub fn parse_article(url: &str, html: &str) -> ProviderResult<Article> {
    let mut document = Html::parse_document(html);

    let mut title = first_text(&document, "h1#articleContentId")?;
    if title.is_empty() {
        title = first_text(&document, "h1")?;
    }

    let content_id = {
        let primary = selector("#content_views")?;
        let fallback = selector("article")?;
        document
            .select(&primary)
            .next()
            .or_else(|| document.select(&fallback).next())
            .map(|e| e.id())
            .ok_or_else(|| ProviderError::NoResults(format!("No article content in {url}")))?
    };

    let noise = {
        let sel = selector(".copy-btn, script, style")?;
        document
            .tree
            .get(content_id)
            .and_then(ElementRef::wrap)
            .map(|content| content.select(&sel).map(|e| e.id()).collect::<Vec<_>>())
            .unwrap_or_default()
    };
    for id in noise {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    let inner = document
        .tree
        .get(content_id)
        .and_then(ElementRef::wrap)
        .map(|content| content.inner_html())
        .ok_or_else(|| ProviderError::Malformed(format!("Article content vanished in {url}")))?;

    Ok(Article {
        doc_id: format!("{SOURCE_TAG}_{}", extract_id(url)),
        source: SOURCE_TAG.to_string(),
        url: url.to_string(),
        title,
        content_markdown: html2md::rewrite_html(&inner, false).trim().to_string(),
    })
}

/// Last path segment without extension, e.g. `.../details/135.html` -> `135`
fn extract_id(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let Some((_, segment)) = path.rsplit_once('/') else {
        return "unknown".to_string();
    };
    match segment.split('.').next() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => "unknown".to_string(),
    }
}

/// Crawls a batch of article URLs through the worker pool
#[derive(Clone)]
pub struct ArticleCrawler {
    provider: Arc<dyn ArticleProvider>,
    concurrency: usize,
    jitter: Duration,
}

impl ArticleCrawler {
    #[must_use]
    pub fn new(provider: Arc<dyn ArticleProvider>, concurrency: usize, jitter: Duration) -> Self {
        Self {
            provider,
            concurrency,
            jitter,
        }
    }

    /// Crawl every URL; pages that fail are left out of the result
    pub async fn crawl(&self, urls: Vec<String>, cancel: &CancellationToken) -> Vec<Article> {
        let pool = WorkerPool::new(self.concurrency)
            .with_jitter(self.jitter)
            .with_cancellation(cancel.clone());

        let provider = Arc::clone(&self.provider);
        let cancel = cancel.clone();
        let articles = pool
            .run(urls, move |url: String| {
                let provider = Arc::clone(&provider);
                let cancel = cancel.clone();
                async move { provider.fetch_article(&url, &cancel).await }
            })
            .await;

        debug!("Crawled {} article(s)", articles.len());
        articles
    }
}
