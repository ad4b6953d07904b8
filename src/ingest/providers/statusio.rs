// src/ingest/providers/statusio.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;

use super::feed::{self, FeedItem};
use super::{
    decode_data, per_service_feed_ingestions, status_from_keywords, FeedIngestionData,
};
use crate::ingest::text::{plain_text, remove_elements};
use crate::ingest::types::{
    IncidentReference, IngestionDescriptor, ServiceConfig, StatusProvider, Update,
};
use crate::ingest::window::TimeWindow;

const RESOLVED_KEYWORDS: [&str; 2] = ["<strong>Resolved</strong>", "<strong>Completed</strong>"];
const MESSAGE_SEPARATOR: &str = "<br /><br />";

/// Status.io incident feeds.
pub struct StatusioProvider {
    client: reqwest::Client,
}

impl StatusioProvider {
    pub const NAME: &'static str = "statusio";

    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

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

/// The feed keeps the whole history oldest-first, each message terminated by a
/// blank line; the message before the trailing terminator is the latest.
fn latest_update(description: &str) -> String {
    let messages: Vec<&str> = description.split(MESSAGE_SEPARATOR).collect();
    let latest = match messages.len() {
        0 | 1 => description,
        n => messages[n - 2],
    };
    plain_text(&remove_elements(latest, "small"))
}

/// Text of the "Components" row in the incident page's event panel.
pub fn parse_components(page: &str) -> Option<String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| {
        Regex::new(
            r#"(?is)class="[^"]*\bevent_inner_title\b[^"]*"[^>]*>\s*Components\s*</div>.*?class="[^"]*\bevent_inner_text\b[^"]*"[^>]*>(.*?)</div>"#,
        )
        .unwrap()
    });
    let section = plain_text(re.captures(page)?.get(1)?.as_str());
    Some(section).filter(|s| !s.is_empty())
}

#[async_trait]
impl StatusProvider for StatusioProvider {
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
