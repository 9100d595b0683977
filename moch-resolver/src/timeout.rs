use crate::error::{ResolutionError, ResolutionResult};
use futures::Future;
use std::time::Duration;

/// Two minutes, the longest a client waits for a provider to answer.
pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// Race `operation` against a timer of `duration`.
///
/// When the timer wins the operation future is dropped. That cancels it at
/// its next await point; any request already sent upstream may still
/// complete, but its result is discarded.
pub async fn with_timeout<T, Fut>(operation: Fut, duration: Duration) -> ResolutionResult<T>
where
    Fut: Future<Output = ResolutionResult<T>>,
{
    match tokio::time::timeout(duration, operation).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!("Resolution exceeded {:?}, giving up", duration);
            Err(ResolutionError::Timeout(duration))
        }
    }
}
