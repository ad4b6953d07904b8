// tests/ingest_scheduler.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;

use status_feed::ingest::dedup::{DedupCache, MemoryStore};
use status_feed::ingest::scheduler::{spawn_ingestions, IngestSchedulerCfg};
use status_feed::ingest::types::ServiceConfig;
use status_feed::ingest::window::TimeWindow;
use status_feed::{
    IngestionDescriptor, Ingestor, NotifierMux, ProviderRegistry, StatusProvider, Update,
};

#[derive(Default)]
struct CountingProvider {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl StatusProvider for CountingProvider {
    fn build_ingestions(&self, _services: &[ServiceConfig]) -> Vec<IngestionDescriptor> {
        Vec::new()
    }

    async fn fetch_recent_updates(
        &self,
        _data: &serde_json::Value,
        _window: &TimeWindow,
    ) -> Result<Vec<Update>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

fn job(name: &str, provider: &str) -> IngestionDescriptor {
    IngestionDescriptor {
        name: name.into(),
        provider_name: provider.into(),
        data: json!({}),
    }
}

#[tokio::test(start_paused = true)]
async fn each_job_runs_at_once_and_then_every_interval() {
    let provider = Arc::new(CountingProvider::default());
    let mut registry = ProviderRegistry::new();
    registry.register("counting", provider.clone());
    let ingestor = Arc::new(Ingestor::new(
        Arc::new(registry),
        DedupCache::new(Arc::new(MemoryStore::new())),
        Arc::new(NotifierMux::default()),
    ));

    let handles = spawn_ingestions(
        ingestor,
        vec![job("a@counting", "counting"), job("b@counting", "counting")],
        IngestSchedulerCfg {
            interval_secs: 60,
            concurrency: 1,
        },
    );

    // First tick fires immediately for both jobs.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 4);

    for h in handles {
        h.abort();
    }
}

#[tokio::test(start_paused = true)]
async fn failing_job_keeps_its_schedule() {
    let provider = Arc::new(CountingProvider::default());
    let mut registry = ProviderRegistry::new();
    registry.register("counting", provider.clone());
    let ingestor = Arc::new(Ingestor::new(
        Arc::new(registry),
        DedupCache::new(Arc::new(MemoryStore::new())),
        Arc::new(NotifierMux::default()),
    ));

    let handles = spawn_ingestions(
        ingestor,
        vec![job("ghost@nope", "nope"), job("ok@counting", "counting")],
        IngestSchedulerCfg::default(),
    );

    tokio::time::sleep(Duration::from_secs(121)).await;
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    assert!(handles.iter().all(|h| !h.is_finished()));

    for h in handles {
        h.abort();
    }
}
