use crate::error::ResolutionError;
use crate::request::CoalescingKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::{Future, FutureExt};
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Configuration for request deduplication
#[derive(Clone, Debug)]
pub struct DeduplicationConfig {
    /// Whether deduplication is enabled
    pub enabled: bool,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

type SharedResolution = Shared<BoxFuture<'static, Result<String, DeduplicationError>>>;

/// One upstream resolution and the callers sharing it
struct InFlight {
    id: u64,
    result: SharedResolution,
    waiters: usize,
}

/// Request deduplication system ("named queue").
///
/// The first request for a key starts the operation on its own task; every
/// request arriving for the same key before it settles joins and receives the
/// identical outcome. The entry is removed once the operation settles, so the
/// next request starts fresh. Because the operation runs detached, a caller
/// that goes away does not strand the other waiters.
pub struct RequestDeduplicator {
    pending: Arc<DashMap<CoalescingKey, InFlight>>,
    next_id: AtomicU64,
    config: DeduplicationConfig,
}

impl Default for RequestDeduplicator {
    fn default() -> Self {
        Self::new(DeduplicationConfig::default())
    }
}

impl RequestDeduplicator {
    pub fn new(config: DeduplicationConfig) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
            config,
        }
    }

    /// Run `operation` for `key` unless the same key is already in flight, in
    /// which case wait for that run instead. `operation` is only invoked when
    /// this call starts the run.
    pub async fn execute<F, Fut>(
        &self,
        key: CoalescingKey,
        operation: F,
    ) -> Result<String, DeduplicationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ResolutionError>> + Send + 'static,
    {
        if !self.config.enabled {
            return operation().await.map_err(DeduplicationError::from);
        }

        // Check-and-insert happens under the shard lock held by `entry`
        let (result, start) = match self.pending.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                log::debug!("Request already pending for key: {}", key);
                entry.get_mut().waiters += 1;
                (entry.get().result.clone(), None)
            }
            Entry::Vacant(slot) => {
                log::debug!("Executing new request for key: {}", key);
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (sender, receiver) = oneshot::channel();
                let result = async move {
                    receiver
                        .await
                        .unwrap_or(Err(DeduplicationError::SenderDropped))
                }
                .boxed()
                .shared();
                slot.insert(InFlight {
                    id,
                    result: result.clone(),
                    waiters: 0,
                });
                (result, Some((id, sender)))
            }
        };

        if let Some((id, sender)) = start {
            self.spawn_operation(key, id, sender, operation());
        }

        result.await
    }

    fn spawn_operation<Fut>(
        &self,
        key: CoalescingKey,
        id: u64,
        sender: oneshot::Sender<Result<String, DeduplicationError>>,
        operation: Fut,
    ) where
        Fut: Future<Output = Result<String, ResolutionError>> + Send + 'static,
    {
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(operation).catch_unwind().await {
                Ok(result) => result.map_err(DeduplicationError::from),
                Err(_) => {
                    log::error!("Resolution task panicked for key: {}", key);
                    Err(DeduplicationError::SenderDropped)
                }
            };

            // Only remove our own entry; a `clear` may have let a newer run in
            if let Some((_, in_flight)) = pending.remove_if(&key, |_, entry| entry.id == id) {
                log::debug!(
                    "Notifying {} waiters for key: {}",
                    in_flight.waiters,
                    key
                );
            }
            let _ = sender.send(outcome);
        });
    }

    /// Get statistics about pending requests
    pub fn stats(&self) -> DeduplicationStats {
        let pending_requests = self.pending.len();
        let total_waiters = self
            .pending
            .iter()
            .map(|entry| entry.value().waiters)
            .sum();

        DeduplicationStats {
            pending_requests,
            total_waiters,
        }
    }

    /// Forget all pending entries. Runs already started still deliver their
    /// result to the callers that joined them.
    pub fn clear(&self) {
        self.pending.clear();
        log::info!("Request deduplicator cleared");
    }
}

/// Statistics for request deduplication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeduplicationStats {
    pub pending_requests: usize,
    /// Callers that joined a run started by someone else
    pub total_waiters: usize,
}

/// Errors that can occur during request deduplication
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeduplicationError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("Resolution task ended without a result")]
    SenderDropped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn key(name: &str) -> CoalescingKey {
        CoalescingKey::new("acme", "credential-0123456789", name, Some(0))
    }

    #[tokio::test]
    async fn test_request_deduplication() {
        let deduplicator = Arc::new(RequestDeduplicator::default());
        let execution_count = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..5 {
            let deduplicator = deduplicator.clone();
            let execution_count = execution_count.clone();

            handles.push(tokio::spawn(async move {
                deduplicator
                    .execute(key("test"), || async move {
                        execution_count.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok("https://cdn/x.mp4".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok("https://cdn/x.mp4".to_string()));
        }

        assert_eq!(execution_count.load(Ordering::SeqCst), 1);
        assert_eq!(deduplicator.stats().pending_requests, 0);
    }

    #[tokio::test]
    async fn test_different_keys_not_deduplicated() {
        let deduplicator = Arc::new(RequestDeduplicator::default());
        let execution_count = Arc::new(AtomicUsize::new(0));

        let run = |name: &'static str| {
            let deduplicator = deduplicator.clone();
            let execution_count = execution_count.clone();
            tokio::spawn(async move {
                deduplicator
                    .execute(key(name), || async move {
                        execution_count.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(name.to_string())
                    })
                    .await
            })
        };

        let (first, second) = futures::join!(run("test1"), run("test2"));

        assert_eq!(first.unwrap(), Ok("test1".to_string()));
        assert_eq!(second.unwrap(), Ok("test2".to_string()));
        assert_eq!(execution_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_entry_removed() {
        let deduplicator = Arc::new(RequestDeduplicator::default());
        let execution_count = Arc::new(AtomicUsize::new(0));

        let run = || {
            let deduplicator = deduplicator.clone();
            let execution_count = execution_count.clone();
            tokio::spawn(async move {
                deduplicator
                    .execute(key("failing"), || async move {
                        execution_count.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err(ResolutionError::Timeout(Duration::from_millis(50)))
                    })
                    .await
            })
        };

        let (first, second) = futures::join!(run(), run());
        let expected = Err(DeduplicationError::Resolution(ResolutionError::Timeout(
            Duration::from_millis(50),
        )));
        assert_eq!(first.unwrap(), expected);
        assert_eq!(second.unwrap(), expected);
        assert_eq!(execution_count.load(Ordering::SeqCst), 1);
        assert_eq!(deduplicator.stats().pending_requests, 0);

        // Settled entries are gone, so the next call runs again
        let _ = run().await;
        assert_eq!(execution_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_waiter_count_while_pending() {
        let deduplicator = Arc::new(RequestDeduplicator::default());
        let (release, released) = oneshot::channel::<()>();
        let released = released.shared();

        let mut handles = vec![];
        for _ in 0..3 {
            let deduplicator = deduplicator.clone();
            let released = released.clone();
            handles.push(tokio::spawn(async move {
                deduplicator
                    .execute(key("slow"), || async move {
                        let _ = released.await;
                        Ok("done".to_string())
                    })
                    .await
            }));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            deduplicator.stats(),
            DeduplicationStats {
                pending_requests: 1,
                total_waiters: 2,
            }
        );

        release.send(()).unwrap();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok("done".to_string()));
        }
        assert_eq!(deduplicator.stats().pending_requests, 0);
    }

    #[tokio::test]
    async fn test_dropped_starter_does_not_strand_waiters() {
        let deduplicator = Arc::new(RequestDeduplicator::default());

        let starter = {
            let deduplicator = deduplicator.clone();
            tokio::spawn(async move {
                deduplicator
                    .execute(key("orphan"), || async {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok("kept".to_string())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let waiter = {
            let deduplicator = deduplicator.clone();
            tokio::spawn(async move {
                deduplicator
                    .execute(key("orphan"), || async { Ok("second run".to_string()) })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        starter.abort();

        assert_eq!(waiter.await.unwrap(), Ok("kept".to_string()));
    }

    #[tokio::test]
    async fn test_panicking_operation_reports_to_every_waiter() {
        let deduplicator = RequestDeduplicator::default();

        let result = deduplicator
            .execute(key("panic"), || async {
                if true {
                    panic!("provider bug");
                }
                Ok(String::new())
            })
            .await;

        assert_eq!(result, Err(DeduplicationError::SenderDropped));
        assert_eq!(deduplicator.stats().pending_requests, 0);
    }

    #[tokio::test]
    async fn test_disabled_runs_every_request() {
        let deduplicator = Arc::new(RequestDeduplicator::new(DeduplicationConfig {
            enabled: false,
        }));
        let execution_count = Arc::new(AtomicUsize::new(0));

        let run = || {
            let deduplicator = deduplicator.clone();
            let execution_count = execution_count.clone();
            tokio::spawn(async move {
                deduplicator
                    .execute(key("same"), || async move {
                        execution_count.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok("x".to_string())
                    })
                    .await
            })
        };

        let (first, second) = futures::join!(run(), run());
        first.unwrap().unwrap();
        second.unwrap().unwrap();

        assert_eq!(execution_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_lets_next_request_start_fresh() {
        let deduplicator = Arc::new(RequestDeduplicator::default());
        let execution_count = Arc::new(AtomicUsize::new(0));

        let run = || {
            let deduplicator = deduplicator.clone();
            let execution_count = execution_count.clone();
            tokio::spawn(async move {
                deduplicator
                    .execute(key("cleared"), || async move {
                        execution_count.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok("x".to_string())
                    })
                    .await
            })
        };

        let first = run();
        tokio::time::sleep(Duration::from_millis(10)).await;
        deduplicator.clear();
        let second = run();

        assert_eq!(first.await.unwrap(), Ok("x".to_string()));
        assert_eq!(second.await.unwrap(), Ok("x".to_string()));
        assert_eq!(execution_count.load(Ordering::SeqCst), 2);
        assert_eq!(deduplicator.stats().pending_requests, 0);
    }
}
