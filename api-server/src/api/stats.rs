use moch_resolver::{CacheStats, DeduplicationStats, MochResolver};
use rocket::serde::json::Json;
use rocket::State;
use serde::Serialize;

#[derive(Serialize)]
pub struct StatsResponse {
    pub cache_stats: CacheStats,
    pub deduplication_stats: DeduplicationStats,
    pub blacklisted_credentials: usize,
}

/// Current cache, in-flight and blacklist counters
#[get("/stats")]
pub fn stats(resolver: &State<MochResolver>) -> Json<StatsResponse> {
    Json(StatsResponse {
        cache_stats: resolver.cache_stats(),
        deduplication_stats: resolver.deduplication_stats(),
        blacklisted_credentials: resolver.blacklist().len(),
    })
}

#[derive(Serialize)]
pub struct Health {
    pub status: &'static str,
}

#[get("/health")]
pub fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}
