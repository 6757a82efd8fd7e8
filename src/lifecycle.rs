//! Plan lifecycle: build, render, write artifacts and persist per thread

use crate::aggregator::PlanAggregator;
use crate::error::PlannerError;
use crate::models::{PlanArtifacts, PlanQuery, PlanRecord, TravelPlan};
use crate::render::{render_html, render_markdown};
use crate::store::PlanStore;
use chrono::{Duration, Utc};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// A plan generation request bound to a conversation thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub thread_id: String,
    pub user_id: u64,
    pub query: PlanQuery,
}

/// Result of a successful generation
#[derive(Debug, Clone)]
pub struct GeneratedPlan {
    pub plan: TravelPlan,
    pub artifacts: PlanArtifacts,
    /// Short confirmation shown to the user
    pub summary: String,
}

/// Ties plan generation to artifact files and the plan store
#[derive(Clone)]
pub struct PlanLifecycle {
    aggregator: PlanAggregator,
    store: Arc<dyn PlanStore>,
    output_dir: PathBuf,
    public_base_url: String,
    expiry: Duration,
}

impl PlanLifecycle {
    #[must_use]
    pub fn new(
        aggregator: PlanAggregator,
        store: Arc<dyn PlanStore>,
        output_dir: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            aggregator,
            store,
            output_dir: output_dir.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            expiry: Duration::hours(24),
        }
    }

    /// How long a stored plan stays retrievable
    #[must_use]
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn PlanStore> {
        &self.store
    }

    /// Generate both documents for a request and record them under its thread id
    ///
    /// Nothing is written when the plan cannot be built. A failing store is
    /// logged and does not fail the request.
    #[instrument(skip(self, request, cancel), fields(thread_id = %request.thread_id))]
    pub async fn generate(
        &self,
        request: &PlanRequest,
        cancel: &CancellationToken,
    ) -> Result<GeneratedPlan, PlannerError> {
        let query = &request.query;
        let plan = self.aggregator.build(query, cancel).await?;

        let markdown = render_markdown(&plan);
        let html = render_html(&plan)?;

        if cancel.is_cancelled() {
            return Err(PlannerError::Cancelled);
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let stem = artifact_stem();
        let html_name = format!("{stem}.html");
        let markdown_name = format!("{stem}.md");
        let html_path = self.output_dir.join(&html_name);
        let markdown_path = self.output_dir.join(&markdown_name);

        write_artifacts(&html_path, &html, &markdown_path, &markdown).await?;

        let artifacts = PlanArtifacts {
            html_path: html_path.display().to_string(),
            markdown_path: markdown_path.display().to_string(),
            h5_url: self.static_url(&html_name),
            markdown_url: self.static_url(&markdown_name),
            download_url: self.download_url(&markdown_name),
        };
        info!("Wrote plan artifacts {} and {}", artifacts.html_path, artifacts.markdown_path);

        let now = Utc::now();
        let record = PlanRecord::new(
            request.thread_id.as_str(),
            request.user_id,
            query,
            plan.clone(),
            artifacts.clone(),
            now,
            now + self.expiry,
        );
        if let Err(e) = self.store.save_or_update(record).await {
            warn!("Failed to persist plan for thread {}: {:#}", request.thread_id, e);
        }

        Ok(GeneratedPlan {
            plan,
            artifacts,
            summary: format!("已成功为规划 {} 到 {} 的行程", query.origin, query.destination),
        })
    }

    fn static_url(&self, file_name: &str) -> String {
        format!("{}/static/plans/{file_name}", self.public_base_url)
    }

    fn download_url(&self, file_name: &str) -> String {
        format!(
            "{}/api/travel/download?filename={}",
            self.public_base_url,
            urlencoding::encode(file_name)
        )
    }
}

/// Write both documents; a failed Markdown write removes the HTML written before it
async fn write_artifacts(
    html_path: &Path,
    html: &str,
    markdown_path: &Path,
    markdown: &str,
) -> std::io::Result<()> {
    tokio::fs::write(html_path, html).await?;
    if let Err(e) = tokio::fs::write(markdown_path, markdown).await {
        if let Err(cleanup) = tokio::fs::remove_file(html_path).await {
            warn!("Failed to remove {}: {}", html_path.display(), cleanup);
        }
        return Err(e);
    }
    Ok(())
}

/// Unique file stem, e.g. `plan_1718000000000_4821`
fn artifact_stem() -> String {
    let suffix: u32 = rand::rng().random_range(1000..10_000);
    format!("plan_{}_{suffix}", Utc::now().timestamp_millis())
}

/// Whether a file name looks like one written by [`PlanLifecycle::generate`]
#[must_use]
pub fn is_artifact_name(name: &str) -> bool {
    name.starts_with("plan_") && (name.ends_with(".html") || name.ends_with(".md"))
}
