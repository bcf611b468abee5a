//! Read-through cache of remote source reads.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::Credential;
use crate::sources::SourceError;
use crate::table::{DateRange, RawTable};

/// Identifies one read: the same source, range and credential always
/// yield the same rows within a process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    source: String,
    range: DateRange,
    credential: u64,
}

impl CacheKey {
    pub fn new(source: impl Into<String>, range: DateRange, credential: &Credential) -> Self {
        CacheKey {
            source: source.into(),
            range,
            credential: credential.fingerprint(),
        }
    }
}

/// Immutable tables shared across requests. Entries are never replaced or
/// evicted; failed reads are not stored.
#[derive(Debug, Default)]
pub struct SourceCache {
    entries: RwLock<HashMap<CacheKey, Arc<RawTable>>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached table for `key`, or runs `fetch` and stores its
    /// result if it succeeds.
    ///
    /// The lock is not held while fetching. Two concurrent misses for the
    /// same key both fetch; the first stored entry wins.
    pub async fn get_or_fetch<F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Arc<RawTable>, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RawTable, SourceError>>,
    {
        if let Some(table) = self.entries.read().await.get(&key) {
            debug!(source = %key.source, "cache hit");
            return Ok(Arc::clone(table));
        }

        let table = Arc::new(fetch().await?);
        let mut entries = self.entries.write().await;
        let stored = entries.entry(key).or_insert(table);
        Ok(Arc::clone(stored))
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RawRecord;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn range(end_day: u32) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, end_day).unwrap(),
        )
    }

    fn table() -> RawTable {
        RawTable::new("oura:daily_activity", "day")
            .with_records(vec![RawRecord::new("2024-06-01").with("steps", 8000.0)])
    }

    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let cache = SourceCache::new();
        let credential = Credential::new("token").unwrap();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let result = cache
                .get_or_fetch(CacheKey::new("oura:daily_activity", range(30), &credential), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(table())
                })
                .await
                .unwrap();
            assert_eq!(result.len(), 1);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_key_includes_range_and_credential() {
        let cache = SourceCache::new();
        let first = Credential::new("token-a").unwrap();
        let second = Credential::new("token-b").unwrap();

        for (end, credential) in [(30, &first), (29, &first), (30, &second)] {
            cache
                .get_or_fetch(CacheKey::new("oura:daily_activity", range(end), credential), || async {
                    Ok(table())
                })
                .await
                .unwrap();
        }

        assert_eq!(cache.len().await, 3);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = SourceCache::new();
        let credential = Credential::new("token").unwrap();
        let key = CacheKey::new("oura:sleep", range(30), &credential);

        let result = cache
            .get_or_fetch(key.clone(), || async {
                Err(SourceError::unavailable("oura:sleep", "HTTP 503: Service Unavailable"))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty().await);

        let result = cache.get_or_fetch(key, || async { Ok(table()) }).await;
        assert!(result.is_ok());
        assert_eq!(cache.len().await, 1);
    }
}
