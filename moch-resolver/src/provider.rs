use crate::error::ProviderError;
use crate::request::ResolutionRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// What kind of URL a provider hands back; drives the default cache TTL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedUrlKind {
    /// Answer derived from an instant-availability lookup, goes stale quickly
    InstantAvailability,
    /// Fully resolved direct download URL
    Direct,
}

/// Parameters of a catalog or metadata query against one provider.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatalogRequest {
    pub credential: String,
    pub item_id: Option<String>,
    pub skip: u32,
    pub client_ip: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaVideo {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub videos: Vec<MetaVideo>,
}

/// A MOCH (debrid-style caching) service.
///
/// Implementations own the provider's wire protocol; the engine only calls
/// `resolve_url` from inside its coalescing and timeout pipeline.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider key as used in request paths and user configuration
    fn key(&self) -> &str;

    fn url_kind(&self) -> ResolvedUrlKind {
        ResolvedUrlKind::Direct
    }

    /// Checked once before the first upstream call made with a credential.
    async fn validate_credential(&self, _credential: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn resolve_url(&self, request: &ResolutionRequest) -> Result<String, ProviderError>;

    async fn list_cached_entries(
        &self,
        request: &CatalogRequest,
    ) -> Result<Vec<CatalogEntry>, ProviderError>;

    async fn list_metadata(&self, request: &CatalogRequest) -> Result<ItemMetadata, ProviderError>;
}

pub type SharedProvider = Arc<dyn Provider>;

/// Providers configured at startup, immutable afterwards.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, SharedProvider>,
}

impl ProviderRegistry {
    /// A registry with no providers; every lookup yields `None`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    pub fn get(&self, provider_key: &str) -> Option<SharedProvider> {
        self.providers.get(&provider_key.to_lowercase()).cloned()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("ProviderRegistry")
            .field("providers", &keys)
            .finish()
    }
}

#[derive(Default)]
pub struct ProviderRegistryBuilder {
    providers: HashMap<String, SharedProvider>,
}

impl ProviderRegistryBuilder {
    /// Register a provider under its own key. A later registration with the
    /// same key replaces the earlier one.
    pub fn register(mut self, provider: SharedProvider) -> Self {
        let key = provider.key().to_lowercase();
        if self.providers.insert(key.clone(), provider).is_some() {
            log::warn!("Provider {} registered twice, keeping the last one", key);
        }
        self
    }

    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            providers: self.providers,
        }
    }
}
