pub mod blacklist;
pub mod cache;
pub mod configuration;
pub mod credential;
pub mod deduplication;
mod error;
pub mod provider;
mod request;
pub mod timeout;


use blacklist::{BlacklistStore, SharedBlacklistStore};
use cache::{CacheConfig, ResolvedUrlCache, SharedResolvedUrlCache};
use configuration::UserConfiguration;
use credential::{CredentialValidator, ValidatedCredentials, MIN_CREDENTIAL_LENGTH};
use deduplication::{DeduplicationConfig, DeduplicationError, RequestDeduplicator};
pub use error::{ProviderError, ResolutionError, ResolutionResult};
pub use provider::{
    CatalogEntry, CatalogRequest, ItemMetadata, MetaVideo, Provider, ProviderRegistry,
    ResolvedUrlKind, SharedProvider,
};
pub use request::{CoalescingKey, ResolutionRequest};
use std::sync::Arc;
use std::time::Duration;
use timeout::{with_timeout, RESOLVE_TIMEOUT};
use url::Url;

// Re-export stats types
pub use cache::CacheStats;
pub use deduplication::DeduplicationStats;

/// Engine configuration; `Default` carries the production constants.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    pub resolve_timeout: Duration,
    pub min_credential_length: usize,
    pub cache: CacheConfig,
    pub deduplication: DeduplicationConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            resolve_timeout: RESOLVE_TIMEOUT,
            min_credential_length: MIN_CREDENTIAL_LENGTH,
            cache: CacheConfig::default(),
            deduplication: DeduplicationConfig::default(),
        }
    }
}

/// Turns (provider, credential, info hash, file index) into a playable URL.
///
/// Requests pass the credential check, then the URL cache, then the
/// deduplicator, which runs at most one timed upstream resolution per
/// coalescing key. Catalog and metadata queries go straight to the provider.
#[derive(Clone)]
pub struct MochResolver {
    registry: Arc<ProviderRegistry>,
    validator: CredentialValidator,
    blacklist: SharedBlacklistStore,
    validated: Arc<ValidatedCredentials>,
    cache: SharedResolvedUrlCache,
    deduplicator: Arc<RequestDeduplicator>,
    resolve_timeout: Duration,
}

impl MochResolver {
    /// Create an engine with its own, empty stores
    pub fn new(registry: ProviderRegistry, config: ResolverConfig) -> Self {
        let cache = Arc::new(ResolvedUrlCache::new(config.cache.clone()));
        Self::with_stores(registry, config, Arc::new(BlacklistStore::new()), cache)
    }

    /// Create an engine around stores owned by the caller
    pub fn with_stores(
        registry: ProviderRegistry,
        config: ResolverConfig,
        blacklist: SharedBlacklistStore,
        cache: SharedResolvedUrlCache,
    ) -> Self {
        log::info!(
            "Initialized MochResolver with {} provider(s) (timeout: {:?}, direct TTL: {}s, instant TTL: {}s)",
            registry.len(),
            config.resolve_timeout,
            cache.config.direct_ttl.num_seconds(),
            cache.config.instant_ttl.num_seconds(),
        );

        Self {
            registry: Arc::new(registry),
            validator: CredentialValidator::new(config.min_credential_length),
            blacklist,
            validated: Arc::new(ValidatedCredentials::default()),
            cache,
            deduplicator: Arc::new(RequestDeduplicator::new(config.deduplication)),
            resolve_timeout: config.resolve_timeout,
        }
    }

    /// Resolve a torrent reference into a playable URL
    pub async fn resolve(&self, request: ResolutionRequest) -> ResolutionResult<String> {
        let provider_key = request.provider_key().clone();

        if self.is_invalid_credential(request.credential(), &provider_key) {
            log::debug!("Rejected credential for provider {}", provider_key);
            return Err(ResolutionError::BadCredential {
                provider: provider_key,
            });
        }

        let provider = self.provider(&provider_key)?;
        let key = request.coalescing_key();

        if let Some(url) = self.cache.get(&key) {
            return Ok(url);
        }

        let ttl = self.cache.config.ttl_for(&provider_key, provider.url_kind());
        let cache = Arc::clone(&self.cache);
        let blacklist = Arc::clone(&self.blacklist);
        let validated = Arc::clone(&self.validated);
        let resolve_timeout = self.resolve_timeout;
        let cache_key = key.clone();

        let operation = move || async move {
            let url = with_timeout(
                resolve_upstream(provider.as_ref(), &request, &blacklist, &validated),
                resolve_timeout,
            )
            .await?;
            cache.put(cache_key, url.clone(), ttl);
            Ok(url)
        };

        self.deduplicator
            .execute(key, operation)
            .await
            .map_err(|error| match error {
                DeduplicationError::Resolution(error) => error,
                DeduplicationError::SenderDropped => ResolutionError::Provider {
                    provider: provider_key,
                    message: DeduplicationError::SenderDropped.to_string(),
                },
            })
    }

    /// Entries the user has cached at the provider
    pub async fn list_catalog(
        &self,
        provider_key: &str,
        config: &UserConfiguration,
    ) -> ResolutionResult<Vec<CatalogEntry>> {
        let provider_key = provider_key.to_lowercase();
        let (provider, request) = self.catalog_request(&provider_key, config)?;
        provider
            .list_cached_entries(&request)
            .await
            .map_err(|error| {
                upstream_error(&provider_key, &request.credential, &self.blacklist, error)
            })
    }

    /// Metadata of one cached item at the provider
    pub async fn list_item_metadata(
        &self,
        provider_key: &str,
        config: &UserConfiguration,
    ) -> ResolutionResult<ItemMetadata> {
        let provider_key = provider_key.to_lowercase();
        let (provider, request) = self.catalog_request(&provider_key, config)?;
        provider
            .list_metadata(&request)
            .await
            .map_err(|error| {
                upstream_error(&provider_key, &request.credential, &self.blacklist, error)
            })
    }

    /// True when the user configured a credential for any registered provider
    pub fn has_any_provider_configured(&self, config: &UserConfiguration) -> bool {
        self.registry
            .keys()
            .any(|provider_key| config.credential_for(provider_key).is_some())
    }

    pub fn is_invalid_credential(&self, credential: &str, provider_key: &str) -> bool {
        self.validator
            .is_invalid(credential, provider_key, &self.blacklist)
    }

    pub fn blacklist(&self) -> &BlacklistStore {
        &self.blacklist
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn deduplication_stats(&self) -> DeduplicationStats {
        self.deduplicator.stats()
    }

    /// Drop cached URLs and pending entries. The blacklist is kept.
    pub fn shutdown(&self) {
        self.cache.clear();
        self.deduplicator.clear();
        self.validated.clear();
        log::info!("MochResolver shut down");
    }

    fn provider(&self, provider_key: &str) -> ResolutionResult<SharedProvider> {
        self.registry
            .get(provider_key)
            .ok_or_else(|| ResolutionError::NoHandler(provider_key.to_string()))
    }

    fn catalog_request(
        &self,
        provider_key: &str,
        config: &UserConfiguration,
    ) -> ResolutionResult<(SharedProvider, CatalogRequest)> {
        let provider = self.provider(provider_key)?;
        let credential = config.credential_for(provider_key).unwrap_or_default();

        if self.is_invalid_credential(credential, provider_key) {
            return Err(ResolutionError::BadCredential {
                provider: provider_key.to_string(),
            });
        }

        let request = CatalogRequest {
            credential: credential.to_string(),
            item_id: config.get("id").map(str::to_string),
            skip: config
                .get("skip")
                .and_then(|skip| skip.parse().ok())
                .unwrap_or(0),
            client_ip: config.get("ip").map(str::to_string),
        };

        Ok((provider, request))
    }
}

/// Credential check plus the provider call; runs inside the timeout.
async fn resolve_upstream(
    provider: &dyn Provider,
    request: &ResolutionRequest,
    blacklist: &BlacklistStore,
    validated: &ValidatedCredentials,
) -> ResolutionResult<String> {
    let provider_key = request.provider_key();
    let credential = request.credential();

    if !validated.contains(credential, provider_key) {
        provider
            .validate_credential(credential)
            .await
            .map_err(|error| upstream_error(provider_key, credential, blacklist, error))?;
        validated.insert(credential, provider_key);
    }

    log::debug!(
        "Resolving {} [{:?}] with provider {}",
        request.content_hash(),
        request.file_index(),
        provider_key
    );
    let url = provider
        .resolve_url(request)
        .await
        .map_err(|error| upstream_error(provider_key, credential, blacklist, error))?;

    if let Err(error) = Url::parse(&url) {
        let error = ProviderError::InvalidResponse(format!("{}: {}", error, url));
        return Err(upstream_error(provider_key, credential, blacklist, error));
    }

    Ok(url)
}

fn upstream_error(
    provider_key: &str,
    credential: &str,
    blacklist: &BlacklistStore,
    error: ProviderError,
) -> ResolutionError {
    if error.is_bad_credential() {
        blacklist.blacklist(credential, provider_key);
    } else {
        log::warn!("Provider {} failed: {}", provider_key, error);
    }
    ResolutionError::from_provider(provider_key, error)
}
