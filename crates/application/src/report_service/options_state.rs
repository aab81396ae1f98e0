use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

/// Latest field options per key, guarded by request generations.
///
/// Every request takes a ticket before suspending; a response only replaces
/// state published by an older ticket.
pub(crate) struct LatestOptions<K, T> {
    issued: AtomicU64,
    published: RwLock<HashMap<K, (u64, T)>>,
}

impl<K, T> Default for LatestOptions<K, T> {
    fn default() -> Self {
        Self {
            issued: AtomicU64::new(0),
            published: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, T: Clone> LatestOptions<K, T> {
    /// Issues the generation ticket of a new request.
    pub(crate) fn ticket(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Publishes a response, returning `false` when a newer one already landed.
    pub(crate) async fn publish(&self, key: K, ticket: u64, value: T) -> bool {
        let mut published = self.published.write().await;
        if published
            .get(&key)
            .is_some_and(|(current, _)| *current > ticket)
        {
            return false;
        }

        published.insert(key, (ticket, value));
        true
    }

    /// Returns the latest published value for a key.
    pub(crate) async fn get(&self, key: &K) -> Option<T> {
        self.published
            .read()
            .await
            .get(key)
            .map(|(_, value)| value.clone())
    }

    pub(crate) async fn clear(&self) {
        self.published.write().await.clear();
    }
}
