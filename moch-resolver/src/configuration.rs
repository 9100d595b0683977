//! Per-user configuration carried in the request path as
//! `key=value|key=value`.

use std::collections::HashMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserConfiguration {
    values: HashMap<String, String>,
}

impl UserConfiguration {
    /// Parse a configuration path segment. Keys are case-insensitive; pairs
    /// without a key or a value are skipped. Only the first `=` separates key
    /// from value, so base64-style credentials keep their padding.
    pub fn parse(configuration: &str) -> Self {
        let values = configuration
            .split('|')
            .filter_map(|pair| pair.split_once('='))
            .filter(|(key, value)| !key.is_empty() && !value.is_empty())
            .map(|(key, value)| (key.to_lowercase(), value.to_string()))
            .collect();

        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(&key.to_lowercase()).map(String::as_str)
    }

    /// The credential the user supplied for a provider, if any
    pub fn credential_for(&self, provider_key: &str) -> Option<&str> {
        self.get(provider_key).filter(|credential| !credential.is_empty())
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_lowercase(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
