// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ingest::types::IngestionDescriptor;
use crate::ingest::Ingestor;

#[derive(Clone, Copy, Debug)]
pub struct IngestSchedulerCfg {
    pub interval_secs: u64,
    /// Cycles allowed to run at once across all jobs.
    pub concurrency: usize,
}

impl Default for IngestSchedulerCfg {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            concurrency: 10,
        }
    }
}

/// One ticker per job. Ticks run sequentially per job (missed ticks are
/// skipped), so a job identity never overlaps itself; the shared semaphore
/// bounds cycles across jobs.
pub fn spawn_ingestions(
    ingestor: Arc<Ingestor>,
    descriptors: Vec<IngestionDescriptor>,
    cfg: IngestSchedulerCfg,
) -> Vec<JoinHandle<()>> {
    let permits = Arc::new(Semaphore::new(cfg.concurrency.max(1)));
    let period = Duration::from_secs(cfg.interval_secs.max(1));

    descriptors
        .into_iter()
        .map(|job| {
            let ingestor = ingestor.clone();
            let permits = permits.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    let Ok(_permit) = permits.acquire().await else {
                        tracing::warn!(job = %job.name, "scheduler closed, stopping job");
                        return;
                    };
                    // Failures are already logged by the ingestor; the next tick retries.
                    let _ = ingestor
                        .run_ingestion(&job.name, &job.provider_name, &job.data)
                        .await;
                }
            })
        })
        .collect()
}
