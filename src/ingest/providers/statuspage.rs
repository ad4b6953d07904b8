// src/ingest/providers/statuspage.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;

use super::feed::{self, FeedItem};
use super::{
    decode_data, per_service_feed_ingestions, status_from_keywords, FeedIngestionData,
};
use crate::ingest::text::{first_paragraph, plain_text, remove_elements};
use crate::ingest::types::{
    IncidentReference, IngestionDescriptor, ServiceConfig, StatusProvider, Update,
};
use crate::ingest::window::TimeWindow;

const RESOLVED_KEYWORDS: [&str; 2] = ["<strong>Resolved</strong>", "<strong>Completed</strong>"];

/// Atlassian Statuspage history feeds (`/history.rss`).
pub struct StatuspageProvider {
    client: reqwest::Client,
}

impl StatuspageProvider {
    pub const NAME: &'static str = "statuspage";

    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Map windowed feed items to updates; components are filled in later.
    pub fn updates_from_items(data: &FeedIngestionData, items: Vec<FeedItem>) -> Vec<Update> {
        items
            .into_iter()
            .filter_map(|it| {
                let date = it.published_at?;
                Some(Update {
                    title: plain_text(&it.title),
                    description: latest_update(&it.description),
                    status: status_from_keywords(&it.description, &RESOLVED_KEYWORDS),
                    incident_reference: IncidentReference::Known(it.link.clone()),
                    link: it.link,
                    date,
                    service_key: data.service_key.clone(),
                    service_name: data.service_name.clone(),
                    components: None,
                })
            })
            .collect()
    }

    async fn fetch_components(&self, incident_url: &str) -> Result<Option<String>> {
        tracing::debug!(incident = incident_url, "fetching components");
        let page = feed::fetch_page(&self.client, incident_url)
            .await
            .context("incident page")?;
        Ok(parse_components(&page))
    }
}

fn latest_update(description: &str) -> String {
    first_paragraph(&remove_elements(description, "small"))
}

/// Text of the incident page's "components affected" section, lead-in removed.
pub fn parse_components(page: &str) -> Option<String> {
    static RE_SECTION: OnceCell<Regex> = OnceCell::new();
    static RE_LEAD: OnceCell<Regex> = OnceCell::new();
    let re_section = RE_SECTION.get_or_init(|| {
        Regex::new(r#"(?is)class="[^"]*\bcomponents-affected\b[^"]*"[^>]*>(.*?)</div>"#).unwrap()
    });
    let re_lead = RE_LEAD.get_or_init(|| Regex::new(r"(?i)This.*?:\s").unwrap());

    let section = plain_text(re_section.captures(page)?.get(1)?.as_str());
    if section.is_empty() {
        return None;
    }
    let cleaned = re_lead.replace_all(&section, "").trim().to_string();
    Some(cleaned).filter(|s| !s.is_empty())
}

#[async_trait]
impl StatusProvider for StatuspageProvider {
    fn build_ingestions(&self, services: &[ServiceConfig]) -> Vec<IngestionDescriptor> {
        per_service_feed_ingestions(Self::NAME, services)
    }

    async fn fetch_recent_updates(
        &self,
        data: &serde_json::Value,
        window: &TimeWindow,
    ) -> Result<Vec<Update>> {
        let data: FeedIngestionData = decode_data(Self::NAME, data)?;
        let items = feed::fetch_items(&self.client, &data.feed_url, window).await;
        let mut updates = Self::updates_from_items(&data, items);

        for update in &mut updates {
            match self.fetch_components(&update.link).await {
                Ok(components) => update.components = components,
                Err(e) => {
                    tracing::warn!(error = ?e, incident = %update.link, "failed to fetch components");
                }
            }
        }
        Ok(updates)
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
