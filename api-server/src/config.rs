use chrono::Duration;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use log::LevelFilter;
use moch_resolver::cache::CacheConfig;
use moch_resolver::credential::MIN_CREDENTIAL_LENGTH;
use moch_resolver::deduplication::DeduplicationConfig;
use moch_resolver::timeout::RESOLVE_TIMEOUT;
use moch_resolver::ResolverConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default location of the optional configuration file
pub const DEFAULT_CONFIG_PATH: &str = "moch.yaml";
/// Environment variable overriding the configuration file path
pub const CONFIG_PATH_ENV: &str = "MOCH_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    pub instant_ttl_secs: i64,
    pub direct_ttl_secs: i64,
    pub provider_ttl_secs: HashMap<String, i64>,
    pub max_entries: usize,
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            instant_ttl_secs: defaults.instant_ttl.num_seconds(),
            direct_ttl_secs: defaults.direct_ttl.num_seconds(),
            provider_ttl_secs: HashMap::new(),
            max_entries: defaults.max_entries,
            enabled: defaults.enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub log_level: String,
    pub resolve_timeout_secs: u64,
    pub min_credential_length: usize,
    pub cache: CacheSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".to_string(),
            port: 10000,
            log_level: "info".to_string(),
            resolve_timeout_secs: RESOLVE_TIMEOUT.as_secs(),
            min_credential_length: MIN_CREDENTIAL_LENGTH,
            cache: CacheSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults, then the YAML file, then `MOCH_*` environment variables
    /// (`MOCH_CACHE__MAX_ENTRIES` for nested keys).
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("MOCH_").split("__"))
    }

    pub fn load() -> Result<Self, figment::Error> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::figment(path).extract()
    }

    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }

    /// Engine settings; rejects negative or out-of-range TTLs.
    pub fn resolver_config(&self) -> Result<ResolverConfig, figment::Error> {
        let provider_ttls = self
            .cache
            .provider_ttl_secs
            .iter()
            .map(|(key, secs)| {
                let ttl = ttl_setting(&format!("cache.provider_ttl_secs.{}", key), *secs)?;
                Ok((key.to_lowercase(), ttl))
            })
            .collect::<Result<_, figment::Error>>()?;

        Ok(ResolverConfig {
            resolve_timeout: std::time::Duration::from_secs(self.resolve_timeout_secs),
            min_credential_length: self.min_credential_length,
            cache: CacheConfig {
                instant_ttl: ttl_setting("cache.instant_ttl_secs", self.cache.instant_ttl_secs)?,
                direct_ttl: ttl_setting("cache.direct_ttl_secs", self.cache.direct_ttl_secs)?,
                provider_ttls,
                max_entries: self.cache.max_entries,
                enabled: self.cache.enabled,
            },
            deduplication: DeduplicationConfig::default(),
        })
    }

    /// Rocket settings; logging stays with simplelog.
    pub fn rocket_figment(&self) -> Figment {
        rocket::Config::figment()
            .merge(("address", self.address.clone()))
            .merge(("port", self.port))
            .merge(("log_level", "off"))
    }
}

fn ttl_setting(name: &str, secs: i64) -> Result<Duration, figment::Error> {
    if secs < 0 {
        return Err(figment::Error::from(format!(
            "{} must not be negative, got {}",
            name, secs
        )));
    }
    Duration::try_seconds(secs)
        .ok_or_else(|| figment::Error::from(format!("{} is out of range: {}", name, secs)))
}
