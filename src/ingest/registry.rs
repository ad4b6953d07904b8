// src/ingest/registry.rs
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::ingest::config::ServiceCatalog;
use crate::ingest::providers::{
    auth0::Auth0Provider, aws::AwsProvider, google_cloud::GoogleCloudProvider,
    gsuite::GsuiteProvider, paypal::PaypalProvider, slack::SlackStatusProvider,
    statusio::StatusioProvider, statuspage::StatuspageProvider,
};
use crate::ingest::types::{IngestionDescriptor, StatusProvider};
use crate::ingest::IngestError;

/// Provider name -> adapter. Built once at startup and handed to the ingestor.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn StatusProvider>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every adapter this crate ships, sharing one HTTP client.
    pub fn with_default_providers(client: reqwest::Client) -> Self {
        let mut reg = Self::new();
        reg.register(
            StatuspageProvider::NAME,
            Arc::new(StatuspageProvider::new(client.clone())),
        );
        reg.register(
            StatusioProvider::NAME,
            Arc::new(StatusioProvider::new(client.clone())),
        );
        reg.register(AwsProvider::NAME, Arc::new(AwsProvider::new(client.clone())));
        reg.register(
            GsuiteProvider::NAME,
            Arc::new(GsuiteProvider::new(client.clone())),
        );
        reg.register(
            GoogleCloudProvider::NAME,
            Arc::new(GoogleCloudProvider::new(client.clone())),
        );
        reg.register(
            Auth0Provider::NAME,
            Arc::new(Auth0Provider::new(client.clone())),
        );
        reg.register(
            PaypalProvider::NAME,
            Arc::new(PaypalProvider::new(client.clone())),
        );
        reg.register(
            SlackStatusProvider::NAME,
            Arc::new(SlackStatusProvider::new(client)),
        );
        reg
    }

    /// Adds or replaces the adapter for `name`.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn StatusProvider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn StatusProvider>, IngestError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| IngestError::UnknownProvider(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Descriptors for every registered provider; providers without configured
    /// services contribute nothing.
    pub fn build_ingestions(&self, catalog: &ServiceCatalog) -> Vec<IngestionDescriptor> {
        let mut out = Vec::new();
        for (name, provider) in &self.providers {
            let services = catalog.get(name).map(Vec::as_slice).unwrap_or_default();
            if services.is_empty() {
                continue;
            }
            out.extend(provider.build_ingestions(services));
        }
        out
    }
}
