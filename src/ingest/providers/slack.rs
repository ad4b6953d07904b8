// src/ingest/providers/slack.rs
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

const API_URL: &str = "https://status.slack.com/api/v2.0.0/history";
const RESOLVED_STATUSES: [&str; 3] = ["ok", "completed", "cancelled"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackIngestionData {
    pub api_url: String,
    pub service_name: String,
    pub service_key: String,
}

#[derive(Debug, Deserialize)]
pub struct Incident {
    id: serde_json::Value,
    title: String,
    status: String,
    url: String,
    #[serde(default)]
    services: Vec<String>,
    #[serde(default)]
    notes: Vec<Note>,
}

#[derive(Debug, Deserialize)]
struct Note {
    date_created: DateTime<Utc>,
    body: String,
}

/// Slack's own status history API. Slack is a single service, so one job.
pub struct SlackStatusProvider {
    client: reqwest::Client,
}

impl SlackStatusProvider {
    pub const NAME: &'static str = "slack";

    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// The latest note of each incident becomes one update.
    pub fn updates_from_incidents(
        data: &SlackIngestionData,
        incidents: Vec<Incident>,
        window: &TimeWindow,
    ) -> Vec<Update> {
        let total = incidents.len();
        let updates: Vec<Update> = incidents
            .into_iter()
            .filter_map(|incident| {
                let last_note = incident.notes.iter().max_by_key(|n| n.date_created)?;
                let reference = match &incident.id {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some(Update {
                    description: plain_text(&last_note.body),
                    date: last_note.date_created,
                    title: incident.title,
                    service_name: data.service_name.clone(),
                    service_key: data.service_key.clone(),
                    status: if RESOLVED_STATUSES.contains(&incident.status.as_str()) {
                        UpdateStatus::Resolved
                    } else {
                        UpdateStatus::Active
                    },
                    link: incident.url,
                    incident_reference: IncidentReference::Known(reference),
                    components: Some(incident.services.join(", ")).filter(|s| !s.is_empty()),
                })
            })
            .filter(|u| window.contains(u.date))
            .collect();
        tracing::debug!(url = %data.api_url, recent = updates.len(), total, "filtered recent updates");
        updates
    }

    async fn read_incidents(&self, url: &str) -> Vec<Incident> {
        let res: Result<Vec<Incident>> = async {
            self.client
                .get(url)
                .send()
                .await
                .context("history get()")?
                .error_for_status()
                .context("history non-2xx")?
                .json()
                .await
                .context("history json")
        }
        .await;
        res.unwrap_or_else(|e| {
            tracing::warn!(error = ?e, url, "failed to fetch incidents");
            counter!("ingest_provider_errors_total").increment(1);
            Vec::new()
        })
    }
}

#[async_trait]
impl StatusProvider for SlackStatusProvider {
    fn build_ingestions(&self, services: &[ServiceConfig]) -> Vec<IngestionDescriptor> {
        let Some(service) = services.first() else {
            return Vec::new();
        };
        let data = SlackIngestionData {
            api_url: service.feed_url.clone().unwrap_or_else(|| API_URL.to_string()),
            service_name: service.name.clone(),
            service_key: service.key.clone(),
        };
        match serde_json::to_value(data) {
            Ok(data) => vec![IngestionDescriptor {
                name: format!("{}@{}", Self::NAME, Self::NAME),
                provider_name: Self::NAME.to_string(),
                data,
            }],
            Err(_) => Vec::new(),
        }
    }

    async fn fetch_recent_updates(
        &self,
        data: &serde_json::Value,
        window: &TimeWindow,
    ) -> Result<Vec<Update>> {
        let data: SlackIngestionData = decode_data(Self::NAME, data)?;
        let incidents = self.read_incidents(&data.api_url).await;
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
    fn single_stable_descriptor() {
        let p = SlackStatusProvider::new(reqwest::Client::new());
        assert!(p.build_ingestions(&[]).is_empty());
        let out = p.build_ingestions(&[ServiceConfig {
            key: "slack".into(),
            name: "Slack".into(),
            ..Default::default()
        }]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "slack@slack");
        assert_eq!(out[0].data["apiUrl"], API_URL);
    }
}
