// src/config/settings.rs
use std::env;
use std::time::Duration;

use crate::ingest::dedup::DEFAULT_TTL;
use crate::ingest::scheduler::IngestSchedulerCfg;
use crate::ingest::window::DEFAULT_LOOKBACK_MINS;
use crate::ingest::IngestOptions;
use crate::notify::slack::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL};

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
/// `REDIS_URL` value selecting the process-local dedup store.
pub const MEMORY_STORE_URL: &str = "memory://";

/// Worker settings, read from the environment (after `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub ingest_all_history: bool,
    /// `DANGER_NO_CACHE`: deliver without recording fingerprints.
    pub dry_run: bool,
    pub lookback_mins: u64,
    pub poll_interval_secs: u64,
    pub concurrency: usize,
    pub redis_url: String,
    pub dedup_ttl: Duration,
    pub messaging_webhook: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub slack_icon_url: Option<String>,
    pub slack_max_attempts: u32,
    pub slack_retry_interval: Duration,
    /// Bind address for `/health` + `/metrics`; disabled when unset.
    pub admin_addr: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ingest_all_history: false,
            dry_run: false,
            lookback_mins: DEFAULT_LOOKBACK_MINS,
            poll_interval_secs: 60,
            concurrency: 10,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            dedup_ttl: DEFAULT_TTL,
            messaging_webhook: None,
            slack_webhook_url: None,
            slack_icon_url: None,
            slack_max_attempts: DEFAULT_MAX_ATTEMPTS,
            slack_retry_interval: DEFAULT_RETRY_INTERVAL,
            admin_addr: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            ingest_all_history: env_flag("INGEST_ALL_HISTORY"),
            dry_run: env_flag("DANGER_NO_CACHE"),
            lookback_mins: env_parse("INGEST_LOOKBACK_MINS").unwrap_or(d.lookback_mins),
            poll_interval_secs: env_parse("POLL_INTERVAL_SECS").unwrap_or(d.poll_interval_secs),
            concurrency: env_parse("INGEST_CONCURRENCY").unwrap_or(d.concurrency),
            redis_url: env_string("REDIS_URL").unwrap_or(d.redis_url),
            dedup_ttl: env_parse("DEDUP_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.dedup_ttl),
            messaging_webhook: env_string("MESSAGING_WEBHOOK"),
            slack_webhook_url: env_string("SLACK_WEBHOOK_URL"),
            slack_icon_url: env_string("SLACK_ICON_URL"),
            slack_max_attempts: env_parse("SLACK_MAX_ATTEMPTS").unwrap_or(d.slack_max_attempts),
            slack_retry_interval: env_parse("SLACK_RETRY_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.slack_retry_interval),
            admin_addr: env_string("ADMIN_ADDR"),
        }
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            lookback_mins: self.lookback_mins,
            ingest_all_history: self.ingest_all_history,
            dry_run: self.dry_run,
        }
    }

    pub fn scheduler(&self) -> IngestSchedulerCfg {
        IngestSchedulerCfg {
            interval_secs: self.poll_interval_secs,
            concurrency: self.concurrency,
        }
    }

    pub fn uses_memory_store(&self) -> bool {
        self.redis_url.eq_ignore_ascii_case(MEMORY_STORE_URL)
    }
}

/// Non-empty, trimmed value.
fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

fn env_flag(key: &str) -> bool {
    env_string(key).is_some_and(|v| {
        matches!(
            v.to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}
