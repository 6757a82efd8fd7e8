//! Ctrip suggest adapter for attraction ticket links

use super::de::{lenient_object, lenient_string};
use super::http::{HttpSettings, build_client, fetch_json, with_json_body};
use super::{ProviderResult, TicketProvider};
use crate::config::TicketsConfig;
use crate::models::TicketInfo;
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Search tab for sights and tickets
const SIGHT_TAB: u32 = 10;
const SIGHT_TYPE: &str = "sight";

/// Ticket provider backed by the Ctrip mobile suggest endpoint
pub struct CtripTicketProvider {
    client: ClientWithMiddleware,
    suggest_url: String,
    client_id: String,
}

impl CtripTicketProvider {
    pub fn new(config: &TicketsConfig) -> ProviderResult<Self> {
        let settings = HttpSettings::new(config.timeout_seconds, config.max_retries);
        Ok(Self {
            client: build_client(&settings)?,
            suggest_url: config.suggest_url.clone(),
            client_id: config.client_id.clone(),
        })
    }
}

#[async_trait]
impl TicketProvider for CtripTicketProvider {
    #[instrument(skip(self, cancel))]
    async fn fetch_tickets(
        &self,
        keyword: &str,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<TicketInfo>> {
        let payload = json!({
            "client": {
                "locale": "zh-CN",
                "currency": "CNY",
                "cid": self.client_id,
                "variables": [
                    {"key": "CHANNEL_ID", "value": "116"},
                    {"key": "NEED_BASE_SUGGEST", "value": "true"},
                ],
            },
            "tab": SIGHT_TAB,
            "keyword": keyword,
            "channel": "H5",
        });

        let request = with_json_body(
            self.client.post(&self.suggest_url).header("cid", self.client_id.as_str()),
            &payload,
        )?;
        let response: SuggestResponse = fetch_json(request, cancel, "Ctrip suggest").await?;

        let tickets = tickets_from(response);
        debug!("Found {} ticket link(s) for '{}'", tickets.len(), keyword);
        Ok(tickets)
    }
}

/// Keep named sights with a usable link, in upstream order, dropping duplicate links
fn tickets_from(response: SuggestResponse) -> Vec<TicketInfo> {
    let mut seen = HashSet::new();

    response
        .modules
        .into_iter()
        .flat_map(|module| module.items)
        .filter(|item| item.kind == SIGHT_TYPE && !item.name.trim().is_empty())
        .filter_map(|item| {
            let url = item.deep_link()?;
            seen.insert(url.clone())
                .then(|| TicketInfo::new(item.name.trim(), url))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct SuggestResponse {
    #[serde(default)]
    modules: Vec<SuggestModule>,
}

#[derive(Debug, Deserialize)]
struct SuggestModule {
    #[serde(default)]
    items: Vec<SuggestItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestItem {
    #[serde(default, deserialize_with = "lenient_string")]
    name: String,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    kind: String,
    #[serde(default, deserialize_with = "lenient_object")]
    url: Option<ItemUrl>,
    #[serde(default, deserialize_with = "lenient_string")]
    id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    district_id: String,
}

#[derive(Debug, Deserialize)]
struct ItemUrl {
    #[serde(default, deserialize_with = "lenient_string")]
    h5: String,
}

impl SuggestItem {
    /// The H5 link, or one constructed from the district and POI ids
    fn deep_link(&self) -> Option<String> {
        if let Some(h5) = self.url.as_ref().map(|u| u.h5.trim()).filter(|h| !h.is_empty()) {
            return Some(h5.to_string());
        }

        let poi_id = self.id.trim();
        if poi_id.is_empty() {
            return None;
        }
        let district = match self.district_id.trim() {
            "" => "0",
            d => d,
        };
        Some(format!(
            "https://m.ctrip.com/webapp/you/gspoi/sight/{district}/0.html?poiId={poi_id}"
        ))
    }
}
