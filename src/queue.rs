use crate::store::{SharedStore, StoreError, CLICK_QUEUE_KEY};

/// FIFO of accepted events, backed by a store list. Producers append to the
/// tail, the aggregator pops from the head; the store's atomic list
/// operations are the only ordering and exclusivity guarantee.
#[derive(Clone)]
pub struct EventQueue {
    store: SharedStore,
    key: String,
}

impl EventQueue {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            key: CLICK_QUEUE_KEY.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append `token` and return the queue length after the push.
    pub async fn enqueue(&self, token: &str) -> Result<u64, StoreError> {
        self.store.push_back(&self.key, token).await
    }

    /// Remove the head token, `None` when the queue is empty.
    pub async fn dequeue(&self) -> Result<Option<String>, StoreError> {
        self.store.pop_front(&self.key).await
    }

    pub async fn len(&self) -> Result<u64, StoreError> {
        self.store.list_len(&self.key).await
    }

    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_dequeue_preserves_insertion_order() {
        let queue = EventQueue::new(Arc::new(MemoryStore::new()));
        for i in 1..=5 {
            assert_eq!(queue.enqueue(&format!("t{}", i)).await.unwrap(), i);
        }

        let mut drained = Vec::new();
        while let Some(token) = queue.dequeue().await.unwrap() {
            drained.push(token);
        }
        assert_eq!(drained, vec!["t1", "t2", "t3", "t4", "t5"]);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_producers_lose_nothing() {
        let queue = EventQueue::new(Arc::new(MemoryStore::new()));

        let producers: Vec<_> = (0..8)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    for _ in 0..25 {
                        queue.enqueue("click").await.unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }

        assert_eq!(queue.len().await.unwrap(), 200);
    }
}
