//! Retry policy for document pushes.

use std::time::Duration;

use tracing::{debug, warn};

use crate::client::IndexClient;
use crate::error::IndexClientError;

/// Decides how often and how fast a failed push is retried.
pub trait RetryPolicy: Send + Sync {
    /// Total attempts, including the first.
    fn max_attempts(&self) -> u32;

    /// Whether another attempt follows attempt number `attempt` (1-based).
    fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }

    /// Pause before attempt `attempt + 1`.
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Fixed attempt count, no pause between attempts.
#[derive(Debug, Clone, Copy)]
pub struct FixedAttempts {
    max_attempts: u32,
}

impl FixedAttempts {
    /// A count of zero is raised to one.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

impl Default for FixedAttempts {
    fn default() -> Self {
        Self::new(3)
    }
}

impl RetryPolicy for FixedAttempts {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Outcome of [`push_with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Accepted after `attempts` calls
    Indexed { attempts: u32 },
    /// Every attempt failed
    Exhausted { attempts: u32 },
}

impl PushOutcome {
    pub fn is_indexed(&self) -> bool {
        matches!(self, PushOutcome::Indexed { .. })
    }
}

/// Push one document, retrying rejected and failed calls per `policy`.
///
/// Never returns an error: a transport failure counts as a failed attempt.
pub async fn push_with_retry(
    client: &dyn IndexClient,
    policy: &dyn RetryPolicy,
    index: &str,
    id: &str,
    json: &str,
) -> PushOutcome {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let result: Result<bool, IndexClientError> = client.index_document(index, id, json).await;
        match result {
            Ok(true) => return PushOutcome::Indexed { attempts: attempt },
            Ok(false) => debug!(index = %index, id = %id, attempt, "Push rejected"),
            Err(e) => debug!(index = %index, id = %id, attempt, error = %e, "Push failed"),
        }

        if !policy.should_retry(attempt) {
            warn!(index = %index, id = %id, attempts = attempt, "Giving up on document");
            return PushOutcome::Exhausted { attempts: attempt };
        }

        let delay = policy.delay(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::IndexStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` pushes, then accepts.
    struct FlakyClient {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl IndexClient for FlakyClient {
        async fn check_index(&self, _index: &str) -> Result<IndexStatus, IndexClientError> {
            Ok(IndexStatus::Missing)
        }

        async fn delete_index(&self, _index: &str) -> Result<bool, IndexClientError> {
            Ok(true)
        }

        async fn index_document(
            &self,
            _index: &str,
            _id: &str,
            _json: &str,
        ) -> Result<bool, IndexClientError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(IndexClientError::Transport("timeout".to_string()))
            } else {
                Ok(true)
            }
        }

        async fn delete_item_documents(
            &self,
            _index: &str,
            _item_id: &str,
        ) -> Result<bool, IndexClientError> {
            Ok(true)
        }
    }

    #[test]
    fn test_fixed_attempts() {
        let policy = FixedAttempts::new(3);
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
        assert_eq!(policy.delay(1), Duration::ZERO);
        assert_eq!(FixedAttempts::new(0).max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let client = FlakyClient {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let outcome = push_with_retry(&client, &FixedAttempts::new(3), "pubs", "e1", "{}").await;
        assert_eq!(outcome, PushOutcome::Indexed { attempts: 3 });
    }

    #[tokio::test]
    async fn test_exhausts_after_max_attempts() {
        let client = FlakyClient {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let outcome = push_with_retry(&client, &FixedAttempts::new(4), "pubs", "e1", "{}").await;
        assert_eq!(outcome, PushOutcome::Exhausted { attempts: 4 });
        assert_eq!(client.calls.load(Ordering::SeqCst), 4);
    }
}
