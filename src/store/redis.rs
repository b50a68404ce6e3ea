use super::{KeyValueStore, StoreError, StoreResult, WindowCount};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::future::Future;
use std::time::Duration;

/// Increment a window counter and attach the window expiry in one step.
/// The expiry is also re-attached if the key somehow lost it.
/// Returns `{count, pttl_ms}`.
const INCR_WINDOW_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 or redis.call('PTTL', KEYS[1]) < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return {current, redis.call('PTTL', KEYS[1])}
"#;

/// Redis-backed store. Cloning the connection manager is cheap and every
/// command gets its own clone, so concurrent callers never share a lock.
pub struct RedisStore {
    conn: ConnectionManager,
    incr_window: Script,
    command_timeout: Duration,
}

impl RedisStore {
    /// Connect and verify the server answers `PING` within `connect_timeout`.
    pub async fn connect(
        redis_url: &str,
        connect_timeout: Duration,
        command_timeout: Duration,
    ) -> StoreResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid Redis URL: {}", e)))?;

        let conn = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| StoreError::Timeout(connect_timeout))??;

        let store = Self {
            conn,
            incr_window: Script::new(INCR_WINDOW_SCRIPT),
            command_timeout,
        };
        store.ping().await?;

        tracing::info!("Successfully connected to Redis");
        Ok(store)
    }

    async fn bounded<T, F>(&self, op: F) -> StoreResult<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, op).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.command_timeout)),
        }
    }
}

fn remaining(pttl_ms: i64) -> Option<Duration> {
    // -1: no expiry, -2: missing key
    u64::try_from(pttl_ms).ok().map(Duration::from_millis)
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn incr_window(&self, key: &str, window: Duration) -> StoreResult<WindowCount> {
        let mut conn = self.conn.clone();
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        let mut invocation = self.incr_window.key(key);
        invocation.arg(window_ms);

        let reply: Vec<i64> = self.bounded(invocation.invoke_async(&mut conn)).await?;
        match reply.as_slice() {
            [count, pttl] => Ok(WindowCount {
                count: u64::try_from(*count).unwrap_or(0),
                ttl: remaining(*pttl),
            }),
            other => Err(StoreError::Command(format!(
                "unexpected window script reply: {:?}",
                other
            ))),
        }
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        self.bounded(conn.incr(key, 1)).await
    }

    async fn get_int(&self, key: &str) -> StoreResult<Option<i64>> {
        let mut conn = self.conn.clone();
        self.bounded(conn.get(key)).await
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let mut conn = self.conn.clone();
        let pttl: i64 = self.bounded(conn.pttl(key)).await?;
        Ok(remaining(pttl))
    }

    async fn push_back(&self, key: &str, value: &str) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        self.bounded(conn.rpush(key, value)).await
    }

    async fn pop_front(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        self.bounded(conn.lpop(key, None)).await
    }

    async fn list_len(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        self.bounded(conn.llen(key)).await
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let pong: String = self
            .bounded(redis::cmd("PING").query_async(&mut conn))
            .await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(StoreError::Command(format!("unexpected PING reply: {}", pong)))
        }
    }
}
