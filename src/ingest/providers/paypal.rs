// src/ingest/providers/paypal.rs
use anyhow::Result;
use async_trait::async_trait;

use super::feed::{self, FeedItem};
use super::{
    decode_data, per_service_feed_ingestions_with, status_from_keywords, FeedIngestionData,
};
use crate::ingest::text::{plain_text, remove_elements};
use crate::ingest::types::{
    IncidentReference, IngestionDescriptor, ServiceConfig, StatusProvider, Update,
};
use crate::ingest::window::TimeWindow;

pub const FEED_URL: &str = "https://www.paypal-status.com/feed/rss";
const RESOLVED_KEYWORDS: [&str; 2] = ["<strong>Resolved: ", "<strong>Completed: "];
const MESSAGE_SIGNAL: &str = "<br /><strong>";

/// PayPal status feed. Every service reads the same feed.
pub struct PaypalProvider {
    client: reqwest::Client,
}

impl PaypalProvider {
    pub const NAME: &'static str = "paypal";

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
}

/// Messages are newest-first, each opened by `<br /><strong>`; the first one
/// after the leading signal is the latest.
fn latest_update(description: &str) -> String {
    let latest = match description.split(MESSAGE_SIGNAL).nth(1) {
        Some(message) => format!("{MESSAGE_SIGNAL}{message}"),
        None => description.to_string(),
    };
    plain_text(&remove_elements(&latest, "small"))
}

#[async_trait]
impl StatusProvider for PaypalProvider {
    fn build_ingestions(&self, services: &[ServiceConfig]) -> Vec<IngestionDescriptor> {
        per_service_feed_ingestions_with(Self::NAME, services, |_| Some(FEED_URL.to_string()))
    }

    async fn fetch_recent_updates(
        &self,
        data: &serde_json::Value,
        window: &TimeWindow,
    ) -> Result<Vec<Update>> {
        let data: FeedIngestionData = decode_data(Self::NAME, data)?;
        let items = feed::fetch_items(&self.client, &data.feed_url, window).await;
        Ok(Self::updates_from_items(&data, items))
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
