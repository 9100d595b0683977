use dashmap::DashSet;
use std::sync::Arc;

/// Composite (provider, credential) identity of a rejected credential.
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
struct BlacklistKey {
    provider_key: String,
    credential: String,
}

impl BlacklistKey {
    fn new(credential: &str, provider_key: &str) -> Self {
        Self {
            provider_key: provider_key.to_string(),
            credential: credential.to_string(),
        }
    }
}

/// Credentials a provider has explicitly rejected.
///
/// Entries are only ever added. The store lives as long as the engine that
/// owns it and is not persisted.
#[derive(Debug, Default)]
pub struct BlacklistStore {
    entries: DashSet<BlacklistKey>,
}

impl BlacklistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a rejected credential. Returns `true` when the pair was not yet
    /// known; repeated calls for the same pair are silent no-ops.
    pub fn blacklist(&self, credential: &str, provider_key: &str) -> bool {
        let inserted = self.entries.insert(BlacklistKey::new(credential, provider_key));
        if inserted {
            log::warn!(
                "Blacklisting invalid credential: {}|{}",
                provider_key,
                mask_credential(credential)
            );
        }
        inserted
    }

    pub fn contains(&self, credential: &str, provider_key: &str) -> bool {
        self.entries
            .contains(&BlacklistKey::new(credential, provider_key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Keep only the first four characters of a credential for log output.
pub(crate) fn mask_credential(credential: &str) -> String {
    let visible: String = credential.chars().take(4).collect();
    format!("{}***", visible)
}

pub type SharedBlacklistStore = Arc<BlacklistStore>;
