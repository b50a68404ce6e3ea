use crate::counter::TotalCounter;
use crate::queue::EventQueue;
use crate::rate_limiter::{Decision, RateLimitSettings, RateLimiter, RateStatus};
use crate::store::{SharedStore, StoreError, CLICK_TOKEN};

/// Main click service used by the HTTP layer.
///
/// Admission, enqueue and reads are independent single-key operations
/// against the store. A click can be admitted and then lost if the process
/// dies before the enqueue; nothing replays it.
#[derive(Clone)]
pub struct ClickService {
    store: SharedStore,
    limiter: RateLimiter,
    queue: EventQueue,
    totals: TotalCounter,
}

/// Outcome of recording an admitted click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickReceipt {
    /// Queue length right after the push.
    pub queued: u64,
    /// Total folded so far; does not yet include this click.
    pub total_clicks: i64,
}

/// Read-side snapshot. The two values are read separately and may reflect
/// slightly different moments of aggregator progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickTotals {
    pub total: i64,
    pub queued: u64,
}

impl ClickService {
    pub fn new(store: SharedStore, settings: RateLimitSettings) -> Self {
        Self {
            limiter: RateLimiter::new(store.clone(), settings),
            queue: EventQueue::new(store.clone()),
            totals: TotalCounter::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn rate_limit_settings(&self) -> &RateLimitSettings {
        self.limiter.settings()
    }

    pub async fn admit(&self, identity: &str) -> Result<Decision, StoreError> {
        self.limiter.admit(identity).await
    }

    /// Enqueue one click. Failing to read the total afterwards does not undo
    /// the enqueue, so it is reported as a zero total instead of an error.
    pub async fn record_click(&self) -> Result<ClickReceipt, StoreError> {
        let queued = self.queue.enqueue(CLICK_TOKEN).await?;

        let total_clicks = match self.totals.current().await {
            Ok(total) => total,
            Err(e) => {
                tracing::warn!(error = %e, "Click queued but total could not be read");
                0
            }
        };

        Ok(ClickReceipt {
            queued,
            total_clicks,
        })
    }

    pub async fn totals(&self) -> Result<ClickTotals, StoreError> {
        let total = self.totals.current().await?;
        let queued = self.queue.len().await?;
        Ok(ClickTotals { total, queued })
    }

    pub async fn rate_status(&self, identity: &str) -> Result<RateStatus, StoreError> {
        self.limiter.status(identity).await
    }
}
