// src/lib.rs
// Public library surface for the worker binary and integration tests.

pub mod config;
pub mod ingest;
pub mod metrics;
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::config::Settings;
pub use crate::ingest::registry::ProviderRegistry;
pub use crate::ingest::types::{IncidentReference, IngestionDescriptor, StatusProvider, Update, UpdateStatus};
pub use crate::ingest::{IngestError, IngestOptions, IngestReport, Ingestor};
pub use crate::notify::{Notifier, NotifierMux};
