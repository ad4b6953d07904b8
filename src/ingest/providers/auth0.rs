// src/ingest/providers/auth0.rs
use anyhow::Result;
use async_trait::async_trait;

use super::feed::{self, FeedItem};
use super::{
    decode_data, per_service_feed_ingestions_with, status_from_keywords, FeedIngestionData,
};
use crate::ingest::text::{first_paragraph, plain_text, remove_elements};
use crate::ingest::types::{
    IncidentReference, IngestionDescriptor, ServiceConfig, StatusProvider, Update,
};
use crate::ingest::window::TimeWindow;

const FEED_BASE_URL: &str = "https://status.auth0.com/feed?domain=";
const RESOLVED_KEYWORDS: [&str; 2] = ["<strong>Resolved</strong>", "<strong>Completed</strong>"];

/// Auth0 tenant status feeds, one per configured `domain`.
pub struct Auth0Provider {
    client: reqwest::Client,
}

impl Auth0Provider {
    pub const NAME: &'static str = "auth0";

    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn feed_url(domain: &str) -> String {
        format!("{FEED_BASE_URL}{}", domain.trim())
    }

    pub fn updates_from_items(data: &FeedIngestionData, items: Vec<FeedItem>) -> Vec<Update> {
        items
            .into_iter()
            .filter_map(|it| {
                let date = it.published_at?;
                Some(Update {
                    title: plain_text(&it.title),
                    description: first_paragraph(&remove_elements(&it.description, "small")),
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

#[async_trait]
impl StatusProvider for Auth0Provider {
    fn build_ingestions(&self, services: &[ServiceConfig]) -> Vec<IngestionDescriptor> {
        per_service_feed_ingestions_with(Self::NAME, services, |s| {
            s.domain
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .map(Self::feed_url)
        })
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_url_is_scoped_to_the_tenant_domain() {
        let p = Auth0Provider::new(reqwest::Client::new());
        let out = p.build_ingestions(&[
            ServiceConfig {
                key: "login".into(),
                name: "Login".into(),
                domain: Some("acme.eu.auth0.com".into()),
                ..Default::default()
            },
            ServiceConfig {
                key: "nodomain".into(),
                name: "No Domain".into(),
                ..Default::default()
            },
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "login@auth0");
        assert_eq!(out[0].provider_name, "auth0");
        assert_eq!(
            out[0].data["feedUrl"],
            "https://status.auth0.com/feed?domain=acme.eu.auth0.com"
        );
        assert_eq!(out[0].data["serviceName"], "Login");
    }
}
