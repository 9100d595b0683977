use getset::{CopyGetters, Getters};
use sha2::{Digest, Sha256};
use std::fmt;

/// A single request to turn a torrent reference into a playable URL.
#[derive(Clone, Debug, Getters, CopyGetters)]
pub struct ResolutionRequest {
    #[get = "pub"]
    provider_key: String,
    #[get = "pub"]
    credential: String,
    /// Lowercase hex info hash.
    #[get = "pub"]
    content_hash: String,
    #[get_copy = "pub"]
    file_index: Option<u32>,
    /// Opaque provider hint about which cached variant to resolve.
    #[get = "pub"]
    cached_entry_info: String,
    #[get = "pub"]
    client_ip: String,
    #[get = "pub"]
    host: String,
    #[get_copy = "pub"]
    is_browser: bool,
}

impl ResolutionRequest {
    pub fn new(
        provider_key: impl AsRef<str>,
        credential: impl Into<String>,
        content_hash: impl AsRef<str>,
        file_index: Option<u32>,
    ) -> Self {
        Self {
            provider_key: provider_key.as_ref().to_lowercase(),
            credential: credential.into(),
            content_hash: content_hash.as_ref().to_lowercase(),
            file_index,
            cached_entry_info: String::new(),
            client_ip: String::new(),
            host: String::new(),
            is_browser: false,
        }
    }

    pub fn with_cached_entry_info(mut self, cached_entry_info: impl Into<String>) -> Self {
        self.cached_entry_info = cached_entry_info.into();
        self
    }

    pub fn with_client(mut self, client_ip: impl Into<String>, host: impl Into<String>) -> Self {
        self.client_ip = client_ip.into();
        self.host = host.into();
        self
    }

    pub fn with_browser(mut self, is_browser: bool) -> Self {
        self.is_browser = is_browser;
        self
    }

    pub fn coalescing_key(&self) -> CoalescingKey {
        CoalescingKey::new(
            &self.provider_key,
            &self.credential,
            &self.content_hash,
            self.file_index,
        )
    }
}

/// Identity under which concurrent requests share one upstream call and one
/// cache slot. Stored as a SHA-256 digest so the credential never shows up in
/// map keys or log lines.
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub struct CoalescingKey(String);

impl CoalescingKey {
    pub fn new(
        provider_key: &str,
        credential: &str,
        content_hash: &str,
        file_index: Option<u32>,
    ) -> Self {
        let content_hash = content_hash.to_lowercase();
        let mut hasher = Sha256::new();
        for part in [provider_key, credential, content_hash.as_str()] {
            // Length prefix keeps ("ab", "c") and ("a", "bc") apart
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        match file_index {
            Some(index) => {
                hasher.update([1u8]);
                hasher.update(index.to_be_bytes());
            }
            None => hasher.update([0u8]),
        }

        CoalescingKey(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoalescingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic() {
        let key1 = ResolutionRequest::new("acme", "credential-0123456789", "ABCDEF", Some(1))
            .coalescing_key();
        let key2 = ResolutionRequest::new("acme", "credential-0123456789", "abcdef", Some(1))
            .with_client("10.0.0.1", "http://localhost")
            .with_browser(true)
            .coalescing_key();

        assert_eq!(key1, key2);
        assert_eq!(key1.as_str().len(), 64);
    }

    #[test]
    fn test_key_covers_every_identity_field() {
        let base = CoalescingKey::new("acme", "credential-0123456789", "abcdef", Some(0));

        assert_ne!(base, CoalescingKey::new("other", "credential-0123456789", "abcdef", Some(0)));
        assert_ne!(base, CoalescingKey::new("acme", "credential-9876543210", "abcdef", Some(0)));
        assert_ne!(base, CoalescingKey::new("acme", "credential-0123456789", "abcdee", Some(0)));
        assert_ne!(base, CoalescingKey::new("acme", "credential-0123456789", "abcdef", Some(1)));
        assert_ne!(base, CoalescingKey::new("acme", "credential-0123456789", "abcdef", None));
    }

    #[test]
    fn test_key_fields_do_not_bleed_into_each_other() {
        assert_ne!(
            CoalescingKey::new("ab", "c", "ff", None),
            CoalescingKey::new("a", "bc", "ff", None)
        );
    }

    #[test]
    fn test_key_does_not_leak_credential() {
        let key = CoalescingKey::new("acme", "super-secret-credential", "abcdef", None);
        assert!(!key.to_string().contains("super-secret"));
    }

    #[test]
    fn test_hash_and_provider_key_are_lowercased() {
        let request = ResolutionRequest::new("acme", "credential-0123456789", "DEADBEEF", None);
        assert_eq!(request.content_hash(), "deadbeef");
        assert_eq!(
            ResolutionRequest::new("ACME", "credential-0123456789", "ff", None).provider_key(),
            "acme"
        );
        assert_eq!(request.file_index(), None);
    }
}
