//! In-process store with the same semantics as the Redis adapter.
//!
//! Expired keys are dropped lazily on access. Time comes from
//! `tokio::time::Instant`, so paused-clock tests can step through windows.
//! State lives in one process only: use it for tests and local development,
//! never for a multi-process deployment.

use super::{KeyValueStore, StoreError, StoreResult, WindowCount};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
enum Value {
    Counter(i64),
    List(VecDeque<String>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn ttl(&self, now: Instant) -> Option<Duration> {
        self.expires_at.map(|at| at.saturating_duration_since(now))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn live<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
    now: Instant,
) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|e| e.is_expired(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn counter_mut<'a>(entry: &'a mut Entry, key: &str) -> StoreResult<&'a mut i64> {
    match &mut entry.value {
        Value::Counter(n) => Ok(n),
        Value::List(_) => Err(StoreError::WrongType(key.to_string())),
    }
}

fn list_mut<'a>(entry: &'a mut Entry, key: &str) -> StoreResult<&'a mut VecDeque<String>> {
    match &mut entry.value {
        Value::List(items) => Ok(items),
        Value::Counter(_) => Err(StoreError::WrongType(key.to_string())),
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn incr_window(&self, key: &str, window: Duration) -> StoreResult<WindowCount> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match live(&mut entries, key, now) {
            Some(entry) => {
                let count = counter_mut(entry, key)?;
                *count += 1;
                let count = *count;
                if entry.expires_at.is_none() {
                    entry.expires_at = Some(now + window);
                }
                Ok(WindowCount {
                    count: u64::try_from(count).unwrap_or(0),
                    ttl: entry.ttl(now),
                })
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Counter(1),
                        expires_at: Some(now + window),
                    },
                );
                Ok(WindowCount {
                    count: 1,
                    ttl: Some(window),
                })
            }
        }
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match live(&mut entries, key, now) {
            Some(entry) => {
                let count = counter_mut(entry, key)?;
                *count += 1;
                Ok(*count)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Counter(1),
                        expires_at: None,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn get_int(&self, key: &str) -> StoreResult<Option<i64>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match live(&mut entries, key, now) {
            Some(entry) => counter_mut(entry, key).map(|n| Some(*n)),
            None => Ok(None),
        }
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        Ok(live(&mut entries, key, now).and_then(|e| e.ttl(now)))
    }

    async fn push_back(&self, key: &str, value: &str) -> StoreResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        if live(&mut entries, key, now).is_none() {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::List(VecDeque::new()),
                    expires_at: None,
                },
            );
        }
        let entry = entries
            .get_mut(key)
            .ok_or_else(|| StoreError::Command(format!("list '{}' vanished", key)))?;
        let items = list_mut(entry, key)?;
        items.push_back(value.to_string());
        Ok(items.len() as u64)
    }

    async fn pop_front(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let Some(entry) = live(&mut entries, key, now) else {
            return Ok(None);
        };
        let items = list_mut(entry, key)?;
        let head = items.pop_front();
        if items.is_empty() {
            // Redis deletes empty lists
            entries.remove(key);
        }
        Ok(head)
    }

    async fn list_len(&self, key: &str) -> StoreResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match live(&mut entries, key, now) {
            Some(entry) => list_mut(entry, key).map(|items| items.len() as u64),
            None => Ok(0),
        }
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
