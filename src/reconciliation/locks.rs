//! Per-statement serialization of match-and-recount sequences

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of one async mutex per statement.
///
/// Every operation that changes line states of a statement holds its guard
/// until the statement has been recounted, so counters are always derived
/// from a consistent set of lines.
#[derive(Debug, Clone, Default)]
pub struct StatementLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl StatementLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `statement_id`
    pub async fn acquire(&self, statement_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // Prune entries no task holds or waits on
            locks.retain(|id, lock| id == statement_id || Arc::strong_count(lock) > 1);
            locks
                .entry(statement_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of statements with a live lock entry
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_statement_is_exclusive() {
        let locks = StatementLocks::new();
        let guard = locks.acquire("s1").await;

        let contender = locks.clone();
        let blocked = tokio::time::timeout(Duration::from_millis(50), async move {
            contender.acquire("s1").await
        })
        .await;
        assert!(blocked.is_err());

        drop(guard);
        let _again = locks.acquire("s1").await;
    }

    #[tokio::test]
    async fn test_different_statements_do_not_block() {
        let locks = StatementLocks::new();
        let _s1 = locks.acquire("s1").await;
        let s2 = tokio::time::timeout(Duration::from_millis(50), locks.acquire("s2")).await;
        assert!(s2.is_ok());
    }

    #[tokio::test]
    async fn test_idle_entries_are_pruned() {
        let locks = StatementLocks::new();
        drop(locks.acquire("s1").await);
        drop(locks.acquire("s2").await);
        drop(locks.acquire("s3").await);
        assert_eq!(locks.len(), 1);
    }
}
