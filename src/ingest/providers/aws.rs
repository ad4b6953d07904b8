// src/ingest/providers/aws.rs
use anyhow::Result;
use async_trait::async_trait;

use super::feed::{self, FeedItem};
use super::{decode_data, per_service_feed_ingestions, FeedIngestionData};
use crate::ingest::text::plain_text;
use crate::ingest::types::{
    IncidentReference, IngestionDescriptor, ServiceConfig, StatusProvider, Update, UpdateStatus,
};
use crate::ingest::window::TimeWindow;

const RESOLVED_TITLE_KEYWORDS: [&str; 1] = ["[RESOLVED]"];

/// AWS Health Dashboard per-service RSS feeds.
pub struct AwsProvider {
    client: reqwest::Client,
}

impl AwsProvider {
    pub const NAME: &'static str = "aws";

    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Only the most recently published item becomes an update; AWS posts every
    /// note of an incident as its own item and carries no incident id.
    pub fn update_from_items(data: &FeedIngestionData, items: Vec<FeedItem>) -> Option<Update> {
        let latest = items
            .into_iter()
            .filter(|it| it.published_at.is_some())
            .max_by_key(|it| it.published_at)?;
        Some(Update {
            status: status_from(&latest.title),
            title: plain_text(&latest.title),
            description: plain_text(&latest.description),
            link: latest.link,
            date: latest.published_at?,
            service_key: data.service_key.clone(),
            service_name: data.service_name.clone(),
            incident_reference: IncidentReference::Absent,
            components: None,
        })
    }
}

fn status_from(title: &str) -> UpdateStatus {
    if RESOLVED_TITLE_KEYWORDS.iter().any(|k| title.contains(k)) {
        UpdateStatus::Resolved
    } else {
        UpdateStatus::Active
    }
}

#[async_trait]
impl StatusProvider for AwsProvider {
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
        Ok(Self::update_from_items(&data, items).into_iter().collect())
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}
