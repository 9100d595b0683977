use async_trait::async_trait;
use moch_resolver::{
    CatalogEntry, CatalogRequest, ItemMetadata, MochResolver, Provider, ProviderError,
    ProviderRegistry, ResolutionRequest, ResolverConfig,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pretends to be a slow debrid service
struct SlowProvider;

#[async_trait]
impl Provider for SlowProvider {
    fn key(&self) -> &str {
        "slow"
    }

    async fn resolve_url(&self, request: &ResolutionRequest) -> Result<String, ProviderError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(format!(
            "https://cdn.example/{}/{}",
            request.content_hash(),
            request.file_index().unwrap_or(0)
        ))
    }

    async fn list_cached_entries(
        &self,
        _request: &CatalogRequest,
    ) -> Result<Vec<CatalogEntry>, ProviderError> {
        Ok(vec![])
    }

    async fn list_metadata(
        &self,
        _request: &CatalogRequest,
    ) -> Result<ItemMetadata, ProviderError> {
        Err(ProviderError::Unavailable("not supported".to_string()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let registry = ProviderRegistry::builder()
        .register(Arc::new(SlowProvider))
        .build();
    let resolver = MochResolver::new(registry, ResolverConfig::default());
    let request = ResolutionRequest::new(
        "slow",
        "a-valid-32-char-credential-000",
        "DEADBEEFDEADBEEFDEADBEEFDEADBEEFDEADBEEF",
        Some(0),
    );

    println!("=== Concurrent identical requests ===");
    let start = Instant::now();
    let (first, second) = tokio::join!(
        resolver.resolve(request.clone()),
        resolver.resolve(request.clone())
    );
    println!("Both resolved in {:?}: {} / {}", start.elapsed(), first?, second?);

    println!("\n=== Cached request ===");
    let start = Instant::now();
    let url = resolver.resolve(request).await?;
    println!("Cached lookup took {:?}: {}", start.elapsed(), url);

    println!("\nCache stats: {:?}", resolver.cache_stats());
    resolver.shutdown();

    Ok(())
}
