// src/notify/slack.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use metrics::counter;
use reqwest::Client;
use thiserror::Error;

use super::message::{MessageBuilder, SlackMessage, COLOR_SUCCESS, COLOR_WARNING};
use super::Notifier;
use crate::ingest::types::{Update, UpdateStatus};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum SlackError {
    /// Slack answered with a non-2xx status.
    #[error("slack webhook responded with HTTP {status}")]
    Http { status: u16 },

    /// The webhook was revoked, removed or its channel archived.
    #[error("invalid slack webhook (HTTP {status})")]
    InvalidWebhook { status: u16 },

    #[error("Invalid icon extension {0}")]
    UnsupportedIcon(String),

    #[error("slack request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

enum Disposition {
    Retry,
    InvalidWebhook,
    Fail,
}

fn classify(status: u16) -> Disposition {
    match status {
        400 | 500..=599 => Disposition::Retry,
        403 | 404 | 410 => Disposition::InvalidWebhook,
        _ => Disposition::Fail,
    }
}

/// Outbound POST of a rendered message. Swappable for tests.
#[async_trait::async_trait]
pub trait SlackTransport: Send + Sync {
    async fn post(&self, url: &str, message: &SlackMessage) -> Result<(), SlackError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl SlackTransport for ReqwestTransport {
    async fn post(&self, url: &str, message: &SlackMessage) -> Result<(), SlackError> {
        let rsp = self.client.post(url).json(message).send().await?;
        let status = rsp.status();
        if !status.is_success() {
            return Err(SlackError::Http {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

pub struct SlackNotifier {
    webhook_url: Option<String>,
    icon_url: Option<String>,
    transport: Arc<dyn SlackTransport>,
    max_attempts: u32,
    retry_interval: Duration,
}

impl SlackNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            webhook_url,
            icon_url: None,
            transport: Arc::new(ReqwestTransport::default()),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    pub fn with_icon(mut self, icon_url: Option<String>) -> Self {
        self.icon_url = icon_url;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn SlackTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_retries(mut self, max_attempts: u32, interval: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_interval = interval;
        self
    }

    /// Render an update as a Block Kit message.
    pub fn build_message(&self, update: &Update) -> Result<SlackMessage, SlackError> {
        let summary = format!("{}: {}", update.service_name, update.title);
        let color = match update.status {
            UpdateStatus::Resolved => COLOR_SUCCESS,
            _ => COLOR_WARNING,
        };
        let builder = MessageBuilder::new()
            .notification_text(summary.clone())
            .title(&update.title, &update.link)
            .color(color)
            .fallback(summary);
        let builder = match &self.icon_url {
            Some(icon) => builder.image_section(&update.description, icon, &update.service_name)?,
            None => builder.text_section(&update.description),
        };
        let components = update
            .components
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(|c| format!("Components affected: {c}"));
        Ok(builder.context(components.as_deref()).build())
    }

    /// POST with a bounded retry loop.
    ///
    /// 400 and 5xx are retried after a fixed pause until the attempt budget is
    /// spent; 403/404/410 fail at once as [`SlackError::InvalidWebhook`]; any
    /// other status or error shape fails at once, unchanged.
    pub async fn send_to_webhook(&self, url: &str, message: &SlackMessage) -> Result<(), SlackError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let status = match self.transport.post(url, message).await {
                Ok(()) => return Ok(()),
                Err(SlackError::Http { status }) => status,
                Err(other) => return Err(other),
            };
            match classify(status) {
                Disposition::Retry if attempt < self.max_attempts => {
                    tracing::warn!(status, attempt, "failed to send to slack, retrying");
                    counter!("notify_slack_retries_total").increment(1);
                    tokio::time::sleep(self.retry_interval).await;
                }
                Disposition::InvalidWebhook => return Err(SlackError::InvalidWebhook { status }),
                Disposition::Retry | Disposition::Fail => return Err(SlackError::Http { status }),
            }
        }
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, update: &Update) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            tracing::debug!("Slack disabled (no SLACK_WEBHOOK_URL)");
            return Ok(());
        };
        let message = self.build_message(update)?;
        self.send_to_webhook(url, &message).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
