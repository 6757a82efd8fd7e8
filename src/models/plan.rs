//! Travel plan, its request and its persisted record

use super::{TicketInfo, TransportMode, TravelOption, WeatherDay};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters of a plan generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanQuery {
    /// City used for the weather lookup
    pub city: String,
    pub origin: String,
    pub destination: String,
    /// Keyword for the ticket search
    #[serde(default)]
    pub ticket_keyword: String,
}

impl PlanQuery {
    #[must_use]
    pub fn new(
        city: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
        ticket_keyword: impl Into<String>,
    ) -> Self {
        Self {
            city: city.into(),
            origin: origin.into(),
            destination: destination.into(),
            ticket_keyword: ticket_keyword.into(),
        }
    }
}

/// Aggregated travel plan
///
/// A plan built by the aggregator always carries at least one route option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelPlan {
    pub city: String,
    pub origin: String,
    pub destination: String,
    /// Chronologically ordered forecast
    pub weather_list: Vec<WeatherDay>,
    pub route_options: BTreeMap<TransportMode, TravelOption>,
    pub tickets: Vec<TicketInfo>,
}

impl TravelPlan {
    /// Title used for the rendered documents and the stored record
    #[must_use]
    pub fn title(&self) -> String {
        format!("{}到{}的旅行计划", self.origin, self.destination)
    }
}

/// Locations of the two rendered documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanArtifacts {
    pub html_path: String,
    pub markdown_path: String,
    /// Public URL of the HTML page
    pub h5_url: String,
    /// Public URL of the Markdown file
    pub markdown_url: String,
    /// Attachment download URL of the Markdown file
    pub download_url: String,
}

/// Plan as stored by a [`crate::store::PlanStore`], keyed by thread id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub thread_id: String,
    pub user_id: u64,
    pub title: String,
    pub city: String,
    pub origin: String,
    pub destination: String,
    pub ticket_keyword: String,
    pub html_path: String,
    pub markdown_path: String,
    pub h5_url: String,
    pub markdown_url: String,
    pub download_url: String,
    pub plan: TravelPlan,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PlanRecord {
    /// Build a fresh record; `created_at` and `updated_at` are both set to `now`
    #[must_use]
    pub fn new(
        thread_id: impl Into<String>,
        user_id: u64,
        query: &PlanQuery,
        plan: TravelPlan,
        artifacts: PlanArtifacts,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            user_id,
            title: plan.title(),
            city: query.city.clone(),
            origin: query.origin.clone(),
            destination: query.destination.clone(),
            ticket_keyword: query.ticket_keyword.clone(),
            html_path: artifacts.html_path,
            markdown_path: artifacts.markdown_path,
            h5_url: artifacts.h5_url,
            markdown_url: artifacts.markdown_url,
            download_url: artifacts.download_url,
            plan,
            created_at: now,
            updated_at: now,
            expires_at,
        }
    }

    /// Whether the record has passed its expiry at `now`
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
