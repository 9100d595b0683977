use crate::blacklist::BlacklistStore;
use dashmap::DashSet;

/// Shortest credential any supported provider issues.
pub const MIN_CREDENTIAL_LENGTH: usize = 15;

/// Format and blacklist check run before a credential reaches a provider.
#[derive(Clone, Copy, Debug)]
pub struct CredentialValidator {
    min_length: usize,
}

impl Default for CredentialValidator {
    fn default() -> Self {
        Self::new(MIN_CREDENTIAL_LENGTH)
    }
}

impl CredentialValidator {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    /// True when the credential is too short or was already rejected by the
    /// provider. Never modifies the blacklist.
    pub fn is_invalid(
        &self,
        credential: &str,
        provider_key: &str,
        blacklist: &BlacklistStore,
    ) -> bool {
        credential.chars().count() < self.min_length
            || blacklist.contains(credential, provider_key)
    }
}

/// (provider, credential) pairs the provider has already accepted, so
/// `validate_credential` runs only before the first upstream call.
#[derive(Debug, Default)]
pub struct ValidatedCredentials {
    accepted: DashSet<(String, String)>,
}

impl ValidatedCredentials {
    pub fn contains(&self, credential: &str, provider_key: &str) -> bool {
        self.accepted
            .contains(&(provider_key.to_string(), credential.to_string()))
    }

    pub fn insert(&self, credential: &str, provider_key: &str) {
        self.accepted
            .insert((provider_key.to_string(), credential.to_string()));
    }

    pub fn clear(&self) {
        self.accepted.clear();
    }
}
