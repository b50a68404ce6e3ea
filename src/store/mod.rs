//! Key-value store capability used by every stateful component.
//!
//! The rate limiter, event queue and aggregator hold no state of their own;
//! they read and mutate store-resident entities on every call. Anything that
//! can increment a counter with an expiry and push/pop a list can back them.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// Counter holding the number of clicks folded by the aggregator.
pub const TOTAL_CLICKS_KEY: &str = "total_clicks";

/// List holding accepted clicks waiting for aggregation.
pub const CLICK_QUEUE_KEY: &str = "click_queue";

/// Prefix for per-client window counters: `rate_limit:<identity>`.
pub const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// Token pushed onto the queue for each accepted click.
pub const CLICK_TOKEN: &str = "click";

pub type StoreResult<T> = Result<T, StoreError>;

/// Store handle shared between request handlers and the aggregator.
pub type SharedStore = Arc<dyn KeyValueStore>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("store command failed: {0}")]
    Command(String),
    #[error("wrong value type at key '{0}'")]
    WrongType(String),
}

impl From<::redis::RedisError> for StoreError {
    fn from(err: ::redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

/// Post-increment state of a window counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    pub count: u64,
    /// Remaining lifetime of the window, `None` if the key carries no expiry.
    pub ttl: Option<Duration>,
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Atomically increment `key` and attach `window` as its expiry when the
    /// counter is new or has lost its expiry.
    async fn incr_window(&self, key: &str, window: Duration) -> StoreResult<WindowCount>;

    /// Atomically increment a persistent counter, returning the new value.
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    async fn get_int(&self, key: &str) -> StoreResult<Option<i64>>;

    /// Remaining lifetime of `key`; `None` when missing or without expiry.
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Append to the tail of a list, returning its new length.
    async fn push_back(&self, key: &str, value: &str) -> StoreResult<u64>;

    /// Remove and return the head of a list.
    async fn pop_front(&self, key: &str) -> StoreResult<Option<String>>;

    async fn list_len(&self, key: &str) -> StoreResult<u64>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Round a remaining lifetime up to whole seconds.
pub fn whole_seconds(duration: Duration) -> u64 {
    let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    millis.div_ceil(1000)
}
