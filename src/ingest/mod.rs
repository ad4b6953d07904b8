// src/ingest/mod.rs
pub mod config;
pub mod dedup;
pub mod providers;
pub mod registry;
pub mod scheduler;
pub mod text;
pub mod types;
pub mod validate;
pub mod window;

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::ingest::dedup::DedupCache;
use crate::ingest::registry::ProviderRegistry;
use crate::ingest::types::Update;
use crate::ingest::validate::check_valid_update_at;
use crate::ingest::window::{
    window_from_lookback, Clock, SystemClock, DEFAULT_LOOKBACK_MINS, FULL_HISTORY_LOOKBACK_MINS,
};
use crate::notify::NotifierMux;

/// Errors that abort a cycle. Everything else is absorbed per record or per channel.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Provider {0} is not defined")]
    UnknownProvider(String),

    #[error("adapter {provider} failed: {source:#}")]
    Adapter {
        provider: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("dedup cache unavailable: {0:#}")]
    Cache(#[source] anyhow::Error),
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Ingestion cycles started.");
        describe_counter!(
            "ingest_run_failures_total",
            "Ingestion cycles aborted by configuration or unexpected errors."
        );
        describe_counter!("ingest_updates_total", "Updates returned by adapters.");
        describe_counter!("ingest_invalid_total", "Updates dropped by validation.");
        describe_counter!(
            "ingest_duplicate_total",
            "Updates skipped because their fingerprint was already recorded."
        );
        describe_counter!("ingest_dispatched_total", "Updates handed to the dispatcher.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Upstream fetch/parse errors absorbed by adapters."
        );
        describe_counter!(
            "notify_channel_errors_total",
            "Per-channel delivery failures (logged, not retried by the cycle)."
        );
        describe_counter!("notify_slack_retries_total", "Slack webhook retries.");
        describe_histogram!("ingest_fetch_ms", "Feed fetch + parse time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when an ingestion cycle last finished."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub lookback_mins: u64,
    /// Widen the window to effectively all history (backfill).
    pub ingest_all_history: bool,
    /// Dispatch without recording fingerprints.
    pub dry_run: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            lookback_mins: DEFAULT_LOOKBACK_MINS,
            ingest_all_history: false,
            dry_run: false,
        }
    }
}

impl IngestOptions {
    fn effective_lookback(&self) -> u64 {
        if self.ingest_all_history {
            FULL_HISTORY_LOOKBACK_MINS
        } else {
            self.lookback_mins
        }
    }
}

/// Per-cycle tallies, logged at the end of each run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub fetched: usize,
    pub invalid: usize,
    pub duplicates: usize,
    pub dispatched: usize,
}

enum Outcome {
    Invalid,
    Duplicate,
    Dispatched,
}

/// Runs ingestion cycles: fetch -> validate -> dedup -> dispatch -> record.
#[derive(Clone)]
pub struct Ingestor {
    registry: Arc<ProviderRegistry>,
    cache: DedupCache,
    notifier: Arc<NotifierMux>,
    clock: Arc<dyn Clock>,
    options: IngestOptions,
}

impl fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ingestor")
            .field("registry", &self.registry)
            .field("cache", &self.cache)
            .field("options", &self.options)
            .finish()
    }
}

impl Ingestor {
    pub fn new(registry: Arc<ProviderRegistry>, cache: DedupCache, notifier: Arc<NotifierMux>) -> Self {
        ensure_metrics_described();
        Self {
            registry,
            cache,
            notifier,
            clock: Arc::new(SystemClock),
            options: IngestOptions::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    /// One cycle for one job. Only an unknown provider, an adapter's unexpected
    /// failure, or an unreachable dedup store fail the cycle; the next scheduled
    /// trigger is the retry.
    pub async fn run_ingestion(
        &self,
        name: &str,
        provider_name: &str,
        data: &serde_json::Value,
    ) -> Result<IngestReport, IngestError> {
        tracing::info!(job = name, "starting ingestion");
        counter!("ingest_runs_total").increment(1);

        let result = self.run_cycle(name, provider_name, data).await;
        match &result {
            Ok(report) => {
                tracing::info!(
                    job = name,
                    fetched = report.fetched,
                    invalid = report.invalid,
                    duplicates = report.duplicates,
                    dispatched = report.dispatched,
                    "finished ingestion"
                );
                gauge!("ingest_pipeline_last_run_ts").set(self.clock.now().timestamp() as f64);
            }
            Err(e) => {
                tracing::error!(job = name, error = %e, "ingestion failed");
                counter!("ingest_run_failures_total").increment(1);
            }
        }
        result
    }

    async fn run_cycle(
        &self,
        name: &str,
        provider_name: &str,
        data: &serde_json::Value,
    ) -> Result<IngestReport, IngestError> {
        let provider = self.registry.get(provider_name)?;
        let now = self.clock.now();
        let window = window_from_lookback(now, self.options.effective_lookback());

        let updates = provider
            .fetch_recent_updates(data, &window)
            .await
            .map_err(|source| IngestError::Adapter {
                provider: provider_name.to_string(),
                source,
            })?;
        counter!("ingest_updates_total").increment(updates.len() as u64);

        let mut report = IngestReport {
            fetched: updates.len(),
            ..Default::default()
        };

        let outcomes = join_all(updates.iter().map(|u| self.process_update(name, u, now))).await;

        let mut first_err = None;
        for outcome in outcomes {
            match outcome {
                Ok(Outcome::Invalid) => report.invalid += 1,
                Ok(Outcome::Duplicate) => report.duplicates += 1,
                Ok(Outcome::Dispatched) => report.dispatched += 1,
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }

        counter!("ingest_invalid_total").increment(report.invalid as u64);
        counter!("ingest_duplicate_total").increment(report.duplicates as u64);
        counter!("ingest_dispatched_total").increment(report.dispatched as u64);

        match first_err {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// validate -> dedup check -> dispatch -> record, strictly in that order.
    async fn process_update(
        &self,
        job: &str,
        update: &Update,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Outcome, IngestError> {
        let validation = check_valid_update_at(update, now);
        if !validation.valid {
            tracing::error!(
                job,
                reason = validation.reason.as_deref().unwrap_or_default(),
                "skipping invalid update"
            );
            return Ok(Outcome::Invalid);
        }

        if self.cache.has(update).await.map_err(IngestError::Cache)? {
            tracing::debug!(
                job,
                title = %update.title,
                reference = update.incident_reference.as_deref().unwrap_or("-"),
                "update already delivered"
            );
            return Ok(Outcome::Duplicate);
        }

        // Channel failures are contained inside the dispatcher.
        self.notifier.notify(update).await;

        // A crash between dispatch and record re-sends this update next cycle.
        if !self.options.dry_run {
            self.cache.register(update).await.map_err(IngestError::Cache)?;
        }
        Ok(Outcome::Dispatched)
    }
}
