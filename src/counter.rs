use crate::store::{SharedStore, StoreError, TOTAL_CLICKS_KEY};

/// Running total of folded events. Only the aggregator calls [`fold`];
/// everything else reads.
///
/// [`fold`]: TotalCounter::fold
#[derive(Clone)]
pub struct TotalCounter {
    store: SharedStore,
    key: String,
}

impl TotalCounter {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            key: TOTAL_CLICKS_KEY.to_string(),
        }
    }

    /// Add one event to the total, returning the new value.
    pub async fn fold(&self) -> Result<i64, StoreError> {
        self.store.incr(&self.key).await
    }

    /// Current total; zero before the first fold.
    pub async fn current(&self) -> Result<i64, StoreError> {
        Ok(self.store.get_int(&self.key).await?.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_total_starts_at_zero_and_increases() {
        let counter = TotalCounter::new(Arc::new(MemoryStore::new()));
        assert_eq!(counter.current().await.unwrap(), 0);

        assert_eq!(counter.fold().await.unwrap(), 1);
        assert_eq!(counter.fold().await.unwrap(), 2);
        assert_eq!(counter.current().await.unwrap(), 2);
    }
}
