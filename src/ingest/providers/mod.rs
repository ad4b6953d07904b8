// src/ingest/providers/mod.rs
pub mod auth0;
pub mod aws;
pub mod feed;
pub mod google_cloud;
pub mod gsuite;
pub mod paypal;
pub mod slack;
pub mod statusio;
pub mod statuspage;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::ingest::types::{IngestionDescriptor, ServiceConfig, UpdateStatus};

/// Descriptor payload for adapters that read one feed per service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedIngestionData {
    pub feed_url: String,
    pub service_name: String,
    pub service_key: String,
}

/// One `"<key>@<provider>"` descriptor per service that has a feed URL.
pub(crate) fn per_service_feed_ingestions(
    provider: &str,
    services: &[ServiceConfig],
) -> Vec<IngestionDescriptor> {
    per_service_feed_ingestions_with(provider, services, |s| s.feed_url.clone())
}

/// Like [`per_service_feed_ingestions`], with the feed URL derived by
/// `feed_url`. Services it yields `None` for are skipped.
pub(crate) fn per_service_feed_ingestions_with<F>(
    provider: &str,
    services: &[ServiceConfig],
    feed_url: F,
) -> Vec<IngestionDescriptor>
where
    F: Fn(&ServiceConfig) -> Option<String>,
{
    services
        .iter()
        .filter_map(|s| {
            let Some(feed_url) = feed_url(s) else {
                tracing::warn!(provider, service = %s.key, "service has no feed URL, skipping");
                return None;
            };
            let data = FeedIngestionData {
                feed_url,
                service_name: s.name.clone(),
                service_key: s.key.clone(),
            };
            Some(IngestionDescriptor {
                name: format!("{}@{}", s.key, provider),
                provider_name: provider.to_string(),
                data: serde_json::to_value(data).ok()?,
            })
        })
        .collect()
}

/// `Resolved` when the raw description carries any of `keywords`.
pub(crate) fn status_from_keywords(description: &str, keywords: &[&str]) -> UpdateStatus {
    if keywords.iter().any(|k| description.contains(k)) {
        UpdateStatus::Resolved
    } else {
        UpdateStatus::Active
    }
}

pub(crate) fn decode_data<T: DeserializeOwned>(provider: &str, data: &serde_json::Value) -> Result<T> {
    serde_json::from_value(data.clone())
        .with_context(|| format!("decoding {provider} ingestion data"))
}
