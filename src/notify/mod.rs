// src/notify/mod.rs
pub mod message;
pub mod slack;
pub mod webhook;

use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use metrics::counter;

use crate::config::Settings;
use crate::ingest::types::Update;
use slack::{ReqwestTransport, SlackNotifier};
use webhook::WebhookNotifier;

/// A notification channel. A channel without a destination reports success
/// without sending anything.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, update: &Update) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Per-update delivery tally across channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Fans one update out to every channel. Each channel fails on its own; no
/// error leaves this type.
#[derive(Clone, Default)]
pub struct NotifierMux {
    channels: Vec<Arc<dyn Notifier>>,
}

impl std::fmt::Debug for NotifierMux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierMux")
            .field(
                "channels",
                &self.channels.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl NotifierMux {
    pub fn new(channels: Vec<Arc<dyn Notifier>>) -> Self {
        Self { channels }
    }

    /// HTTP webhook + Slack, each enabled by its URL being configured.
    pub fn from_settings(settings: &Settings, client: reqwest::Client) -> Self {
        let webhook =
            WebhookNotifier::new(settings.messaging_webhook.clone()).with_client(client.clone());
        let slack = SlackNotifier::new(settings.slack_webhook_url.clone())
            .with_icon(settings.slack_icon_url.clone())
            .with_transport(Arc::new(ReqwestTransport::new(client)))
            .with_retries(settings.slack_max_attempts, settings.slack_retry_interval);
        Self::new(vec![Arc::new(webhook), Arc::new(slack)])
    }

    pub async fn notify(&self, update: &Update) -> DispatchReport {
        let results = join_all(
            self.channels
                .iter()
                .map(|c| async move { (c.name(), c.send(update).await) }),
        )
        .await;

        let mut report = DispatchReport::default();
        for (channel, res) in results {
            match res {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    counter!("notify_channel_errors_total", "channel" => channel).increment(1);
                    tracing::error!(channel, title = %update.title, error = ?e, "failed to send update");
                }
            }
        }
        report
    }
}
