use std::time::Duration;

use crate::store::{whole_seconds, SharedStore, StoreError, RATE_LIMIT_PREFIX};

/// Fixed-window admission limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Requests admitted per identity per window.
    pub max_requests: u64,
    pub window: Duration,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(10),
        }
    }
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admitted { count: u64, remaining: u64 },
    Rejected { count: u64, retry_after_secs: u64 },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }
}

/// Current window state for an identity, read without mutating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateStatus {
    pub count: u64,
    pub remaining_secs: u64,
}

/// Per-identity fixed-window limiter. Holds no counters itself; every check
/// is one atomic round-trip against the store.
///
/// Store failures are returned to the caller, which rejects the request:
/// the limiter fails closed.
#[derive(Clone)]
pub struct RateLimiter {
    store: SharedStore,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(store: SharedStore, settings: RateLimitSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    pub fn key_for(identity: &str) -> String {
        format!("{}{}", RATE_LIMIT_PREFIX, identity)
    }

    /// Count one request against `identity`'s window and decide admission.
    pub async fn admit(&self, identity: &str) -> Result<Decision, StoreError> {
        let key = Self::key_for(identity);
        let window = self.store.incr_window(&key, self.settings.window).await?;

        if window.count > self.settings.max_requests {
            let window_secs = self.settings.window.as_secs().max(1);
            let retry_after_secs = window
                .ttl
                .map(whole_seconds)
                .unwrap_or(window_secs)
                .clamp(1, window_secs);

            tracing::info!(
                identity = %identity,
                count = window.count,
                retry_after_secs,
                "Rate limit exceeded"
            );
            return Ok(Decision::Rejected {
                count: window.count,
                retry_after_secs,
            });
        }

        Ok(Decision::Admitted {
            count: window.count,
            remaining: self.settings.max_requests - window.count,
        })
    }

    /// Read the window counter and its remaining lifetime.
    pub async fn status(&self, identity: &str) -> Result<RateStatus, StoreError> {
        let key = Self::key_for(identity);
        let count = self.store.get_int(&key).await?;
        let ttl = self.store.ttl(&key).await?;

        Ok(RateStatus {
            count: count.and_then(|n| u64::try_from(n).ok()).unwrap_or(0),
            remaining_secs: ttl.map(whole_seconds).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore, StoreResult, WindowCount};
    use async_trait::async_trait;
    use std::sync::Arc;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryStore::new()), RateLimitSettings::default())
    }

    struct UnreachableStore;

    #[async_trait]
    impl KeyValueStore for UnreachableStore {
        async fn incr_window(&self, _: &str, _: Duration) -> StoreResult<WindowCount> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn incr(&self, _: &str) -> StoreResult<i64> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn get_int(&self, _: &str) -> StoreResult<Option<i64>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn ttl(&self, _: &str) -> StoreResult<Option<Duration>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn push_back(&self, _: &str, _: &str) -> StoreResult<u64> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn pop_front(&self, _: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn list_len(&self, _: &str) -> StoreResult<u64> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn ping(&self) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_eleventh_request_in_window_is_rejected() {
        let limiter = limiter();

        for expected in 1..=10u64 {
            let decision = limiter.admit("10.0.0.1").await.unwrap();
            assert_eq!(
                decision,
                Decision::Admitted {
                    count: expected,
                    remaining: 10 - expected
                }
            );
        }

        tokio::time::advance(Duration::from_millis(2_500)).await;
        match limiter.admit("10.0.0.1").await.unwrap() {
            Decision::Rejected {
                count,
                retry_after_secs,
            } => {
                assert_eq!(count, 11);
                assert_eq!(retry_after_secs, 8);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_expiry() {
        let limiter = limiter();
        for _ in 0..12 {
            limiter.admit("10.0.0.2").await.unwrap();
        }
        assert!(!limiter.admit("10.0.0.2").await.unwrap().is_admitted());

        tokio::time::advance(Duration::from_secs(10)).await;

        let decision = limiter.admit("10.0.0.2").await.unwrap();
        assert_eq!(decision, Decision::Admitted { count: 1, remaining: 9 });
        assert_eq!(limiter.status("10.0.0.2").await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let limiter = limiter();
        for _ in 0..11 {
            limiter.admit("a").await.unwrap();
        }
        assert!(!limiter.admit("a").await.unwrap().is_admitted());
        assert!(limiter.admit("b").await.unwrap().is_admitted());
    }

    #[tokio::test]
    async fn test_status_for_unknown_identity_is_zero() {
        let status = limiter().status("never-seen").await.unwrap();
        assert_eq!(status, RateStatus { count: 0, remaining_secs: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_does_not_mutate_window() {
        let limiter = limiter();
        limiter.admit("c").await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;

        let status = limiter.status("c").await.unwrap();
        let again = limiter.status("c").await.unwrap();
        assert_eq!(status, RateStatus { count: 1, remaining_secs: 7 });
        assert_eq!(status, again);
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let limiter = RateLimiter::new(Arc::new(UnreachableStore), RateLimitSettings::default());
        let result = limiter.admit("d").await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
