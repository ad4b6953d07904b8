// src/notify/webhook.rs
use anyhow::{Context, Result};
use reqwest::Client;

use super::Notifier;
use crate::ingest::types::Update;

/// Generic HTTP channel: posts `{"update": ...}` once. The receiver owns
/// durability, so failures are reported and dropped.
pub struct WebhookNotifier {
    webhook_url: Option<String>,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            webhook_url,
            client: Client::new(),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, update: &Update) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            tracing::debug!("Messaging webhook disabled (no MESSAGING_WEBHOOK)");
            return Ok(());
        };

        let body = serde_json::json!({ "update": update });
        self.client
            .post(url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("webhook post to {url}"))?
            .error_for_status()
            .context("webhook non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
