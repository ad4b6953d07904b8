//! Status feed worker binary.
//! Loads settings and the service catalogue, wires the ingestor, and runs one
//! recurring ingestion per descriptor until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use status_feed::config::Settings;
use status_feed::ingest::config::load_services_default;
use status_feed::ingest::dedup::{DedupCache, DedupStore, MemoryStore, RedisStore};
use status_feed::ingest::scheduler::spawn_ingestions;
use status_feed::metrics::Metrics;
use status_feed::{Ingestor, NotifierMux, ProviderRegistry};

/// Compact logs by default; `LOG_FORMAT=json` for structured output.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("status_feed=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn serve_admin(metrics: &Metrics, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding admin listener on {addr}"))?;
    let router = metrics.router();
    tracing::info!(addr, "serving /health and /metrics");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = ?e, "admin server stopped");
        }
    });
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::from_env();
    let metrics = Metrics::init()?;
    if let Some(addr) = settings.admin_addr.as_deref() {
        serve_admin(&metrics, addr).await?;
    }

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .context("building http client")?;

    let store: Arc<dyn DedupStore> = if settings.uses_memory_store() {
        tracing::warn!("using process-local dedup store; duplicates are not shared across workers");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(RedisStore::connect(&settings.redis_url).await?)
    };
    let cache = DedupCache::new(store).with_ttl(settings.dedup_ttl);

    let registry = Arc::new(ProviderRegistry::with_default_providers(client.clone()));
    let notifier = Arc::new(NotifierMux::from_settings(&settings, client));
    let ingestor = Arc::new(
        Ingestor::new(registry.clone(), cache, notifier).with_options(settings.ingest_options()),
    );

    let catalog = load_services_default()?;
    let ingestions = registry.build_ingestions(&catalog);
    tracing::info!(
        jobs = ingestions.len(),
        interval_secs = settings.poll_interval_secs,
        "scheduling ingestions"
    );
    if settings.dry_run {
        tracing::warn!("DANGER_NO_CACHE set: delivered updates are not recorded");
    }

    let handles = spawn_ingestions(ingestor, ingestions, settings.scheduler());

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down");
    for h in handles {
        h.abort();
    }
    Ok(())
}
