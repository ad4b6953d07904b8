// src/ingest/providers/google_cloud.rs
use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};

use super::decode_data;
use crate::ingest::text::plain_text;
use crate::ingest::types::{
    IncidentReference, IngestionDescriptor, ServiceConfig, StatusProvider, Update, UpdateStatus,
};
use crate::ingest::window::TimeWindow;

const RESOLVED_KEYWORDS: [&str; 3] = [
    "We thank you for your patience while we worked on resolving the issue.",
    "We thank you for your patience while we're working on resolving the issue.",
    "has been resolved for all",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCloudIngestionData {
    pub base_url: String,
    pub incidents_url: String,
    pub services: Vec<GoogleCloudService>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleCloudService {
    pub key: String,
    pub name: String,
    /// Google's own product id, matched against `service_key` in incidents.
    pub ingestion_key: String,
}

#[derive(Debug, Deserialize)]
pub struct Incident {
    service_key: String,
    external_desc: String,
    uri: String,
    #[serde(default)]
    end: Option<String>,
    #[serde(rename = "most-recent-update")]
    most_recent_update: MostRecentUpdate,
}

#[derive(Debug, Deserialize)]
struct MostRecentUpdate {
    text: String,
    modified: DateTime<Utc>,
}

/// Google Cloud status dashboard (`incidents.json`), one job per dashboard.
pub struct GoogleCloudProvider {
    client: reqwest::Client,
}

impl GoogleCloudProvider {
    pub const NAME: &'static str = "google-cloud";

    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn updates_from_incidents(
        data: &GoogleCloudIngestionData,
        incidents: Vec<Incident>,
        window: &TimeWindow,
    ) -> Vec<Update> {
        let total = incidents.len();
        let updates: Vec<Update> = incidents
            .into_iter()
            .filter_map(|incident| {
                let Some(service) = data
                    .services
                    .iter()
                    .find(|s| s.ingestion_key == incident.service_key)
                else {
                    tracing::warn!(service = %incident.service_key, "removing service not registered");
                    return None;
                };
                Some(Update {
                    status: status_from(incident.end.as_deref(), &incident.external_desc),
                    title: plain_text(&incident.external_desc),
                    description: plain_text(&incident.most_recent_update.text),
                    date: incident.most_recent_update.modified,
                    service_name: service.name.clone(),
                    service_key: service.key.clone(),
                    link: incident_link(&data.base_url, &incident.uri),
                    incident_reference: IncidentReference::Known(incident.uri),
                    components: None,
                })
            })
            .filter(|u| window.contains(u.date))
            .collect();
        tracing::debug!(
            url = %data.incidents_url,
            recent = updates.len(),
            total,
            "filtered recent updates"
        );
        updates
    }

    async fn read_incidents(&self, url: &str) -> Vec<Incident> {
        match self.try_read_incidents(url).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = ?e, url, "failed to fetch incidents");
                counter!("ingest_provider_errors_total").increment(1);
                Vec::new()
            }
        }
    }

    async fn try_read_incidents(&self, url: &str) -> Result<Vec<Incident>> {
        self.client
            .get(url)
            .send()
            .await
            .context("incidents get()")?
            .error_for_status()
            .context("incidents non-2xx")?
            .json()
            .await
            .context("incidents json")
    }
}

fn incident_link(base_url: &str, uri: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        uri.trim_start_matches('/')
    )
}

fn status_from(end: Option<&str>, description: &str) -> UpdateStatus {
    let ended = end.is_some_and(|e| !e.is_empty());
    if ended || RESOLVED_KEYWORDS.iter().any(|k| description.contains(k)) {
        UpdateStatus::Resolved
    } else {
        UpdateStatus::Active
    }
}

#[async_trait]
impl StatusProvider for GoogleCloudProvider {
    fn build_ingestions(&self, services: &[ServiceConfig]) -> Vec<IngestionDescriptor> {
        let mut by_base_url: BTreeMap<&str, Vec<GoogleCloudService>> = BTreeMap::new();
        for s in services {
            let Some(base_url) = s.base_url.as_deref() else {
                tracing::warn!(provider = Self::NAME, service = %s.key, "service has no base_url, skipping");
                continue;
            };
            by_base_url.entry(base_url).or_default().push(GoogleCloudService {
                key: s.key.clone(),
                name: s.name.clone(),
                ingestion_key: s.service_key.clone().unwrap_or_else(|| s.key.clone()),
            });
        }

        by_base_url
            .into_iter()
            .filter_map(|(base_url, services)| {
                let data = GoogleCloudIngestionData {
                    base_url: base_url.to_string(),
                    incidents_url: format!("{}/incidents.json", base_url.trim_end_matches('/')),
                    services,
                };
                Some(IngestionDescriptor {
                    name: format!("{}@{}", base_url, Self::NAME),
                    provider_name: Self::NAME.to_string(),
                    data: serde_json::to_value(data).ok()?,
                })
            })
            .collect()
    }

    async fn fetch_recent_updates(
        &self,
        data: &serde_json::Value,
        window: &TimeWindow,
    ) -> Result<Vec<Update>> {
        let data: GoogleCloudIngestionData = decode_data(Self::NAME, data)?;
        let incidents = self.read_incidents(&data.incidents_url).await;
        tracing::debug!(url = %data.incidents_url, count = incidents.len(), "collected incidents");
        Ok(Self::updates_from_incidents(&data, incidents, window))
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn services_grouped_by_base_url() {
        let p = GoogleCloudProvider::new(reqwest::Client::new());
        let svc = |key: &str, base: &str| ServiceConfig {
            key: key.into(),
            name: key.to_uppercase(),
            base_url: Some(base.into()),
            service_key: Some(format!("id-{key}")),
            ..Default::default()
        };
        let out = p.build_ingestions(&[
            svc("gce", "https://status.cloud.google.com"),
            svc("gcs", "https://status.cloud.google.com"),
            svc("firebase", "https://status.firebase.google.com"),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "https://status.cloud.google.com@google-cloud");
        assert_eq!(
            out[0].data["incidentsUrl"],
            "https://status.cloud.google.com/incidents.json"
        );
        assert_eq!(out[0].data["services"].as_array().unwrap().len(), 2);
        assert_eq!(out[1].name, "https://status.firebase.google.com@google-cloud");
    }

    #[test]
    fn end_or_keyword_resolves() {
        assert_eq!(status_from(Some("2020-10-10T10:00:00Z"), "x"), UpdateStatus::Resolved);
        assert_eq!(
            status_from(None, "The issue has been resolved for all affected users"),
            UpdateStatus::Resolved
        );
        assert_eq!(status_from(None, "Investigating"), UpdateStatus::Active);
    }
}
