use std::time::Duration;

/// Errors returned by [`crate::MochResolver`] to the routing layer.
///
/// The type is `Clone` because a single coalesced resolution hands the same
/// outcome to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("Credential rejected for provider {provider}")]
    BadCredential { provider: String },
    #[error("Resolution timed out after {0:?}")]
    Timeout(Duration),
    #[error("Provider {provider} failed: {message}")]
    Provider { provider: String, message: String },
    #[error("No handler configured for provider {0}")]
    NoHandler(String),
}

impl ResolutionError {
    /// Adapters answer "feature unavailable" differently from "request failed".
    pub fn is_no_handler(&self) -> bool {
        matches!(self, ResolutionError::NoHandler(_))
    }

    pub(crate) fn from_provider(provider: &str, error: ProviderError) -> Self {
        match error {
            ProviderError::BadCredential(_) => ResolutionError::BadCredential {
                provider: provider.to_string(),
            },
            other => ResolutionError::Provider {
                provider: provider.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Errors a [`crate::Provider`] implementation reports back to the engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The upstream service refused the credential. The engine blacklists the
    /// (provider, credential) pair when it sees this.
    #[error("Bad credential: {0}")]
    BadCredential(String),
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn is_bad_credential(&self) -> bool {
        matches!(self, ProviderError::BadCredential(_))
    }
}

pub type ResolutionResult<T> = Result<T, ResolutionError>;
