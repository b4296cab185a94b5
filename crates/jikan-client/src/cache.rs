//! In-memory response cache for API payloads.
//!
//! Entries expire after a configurable TTL and are pruned lazily: an
//! expired entry is deleted by the read that finds it stale, never by a
//! background sweeper. Known limitation: between reads of stale keys the
//! map can grow without bound, which is acceptable for the finite,
//! human-driven query variety this client serves.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// A cached API payload with provenance metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Payload as returned by upstream
    pub data: Value,
    /// Upstream `last-modified` header, or a synthesized timestamp
    pub last_modified: String,
    /// Upstream `x-request-fingerprint` header, if present
    pub fingerprint: Option<String>,
    expiry: Instant,
}

/// Response cache keyed by request path + query string.
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache whose entries live for `ttl` after each write.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Return the entry for `key` if it has not expired.
    ///
    /// A read that finds an expired entry deletes it.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if Instant::now() < entry.expiry => {
                debug!(key = key, "Cache hit");
                Some(entry.clone())
            }
            Some(_) => {
                debug!(key = key, "Cache entry expired");
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store or overwrite the entry for `key`.
    ///
    /// A missing `last-modified` header is replaced with the current time
    /// so every entry carries provenance.
    pub async fn put(
        &self,
        key: &str,
        data: Value,
        last_modified: Option<String>,
        fingerprint: Option<String>,
    ) {
        let entry = CacheEntry {
            data,
            last_modified: last_modified.unwrap_or_else(|| Utc::now().to_rfc3339()),
            fingerprint,
            expiry: Instant::now() + self.ttl,
        };
        debug!(key = key, "Cache stored");
        self.entries.lock().await.insert(key.to_string(), entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_roundtrip_before_expiry() {
        let cache = ResponseCache::new(Duration::from_secs(60));

        cache
            .put("/anime/1/full", json!({"title": "Cowboy Bebop"}), None, None)
            .await;

        tokio::time::advance(Duration::from_secs(59)).await;

        let entry = cache.get("/anime/1/full").await.expect("entry still live");
        assert_eq!(entry.data, json!({"title": "Cowboy Bebop"}));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_absent_after_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(60));

        cache.put("/anime/1/full", json!({"id": 1}), None, None).await;

        tokio::time::advance(Duration::from_secs(60)).await;

        assert!(cache.get("/anime/1/full").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_read_deletes_entry() {
        let cache = ResponseCache::new(Duration::from_secs(30));

        cache.put("/top/anime?page=1", json!([]), None, None).await;
        tokio::time::advance(Duration::from_secs(31)).await;

        assert!(cache.get("/top/anime?page=1").await.is_none());
        assert!(!cache
            .entries
            .lock()
            .await
            .contains_key("/top/anime?page=1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_last_modified_is_synthesized() {
        let cache = ResponseCache::new(Duration::from_secs(60));

        cache.put("/anime/5/full", json!({}), None, None).await;

        let entry = cache.get("/anime/5/full").await.unwrap();
        assert!(!entry.last_modified.is_empty());
        assert!(entry.fingerprint.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_replaces_data_and_metadata() {
        let cache = ResponseCache::new(Duration::from_secs(60));

        cache
            .put(
                "/anime/1/full",
                json!({"v": 1}),
                Some("Mon, 01 Jan 2024 00:00:00 GMT".to_string()),
                Some("req-a".to_string()),
            )
            .await;
        cache
            .put(
                "/anime/1/full",
                json!({"v": 2}),
                Some("Tue, 02 Jan 2024 00:00:00 GMT".to_string()),
                Some("req-b".to_string()),
            )
            .await;

        let entry = cache.get("/anime/1/full").await.unwrap();
        assert_eq!(entry.data, json!({"v": 2}));
        assert_eq!(entry.last_modified, "Tue, 02 Jan 2024 00:00:00 GMT");
        assert_eq!(entry.fingerprint.as_deref(), Some("req-b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_extends_expiry() {
        let cache = ResponseCache::new(Duration::from_secs(60));

        cache.put("/anime/1/full", json!({"v": 1}), None, None).await;
        tokio::time::advance(Duration::from_secs(40)).await;
        cache.put("/anime/1/full", json!({"v": 2}), None, None).await;
        tokio::time::advance(Duration::from_secs(40)).await;

        // 80s after the first write, but only 40s after the overwrite
        let entry = cache.get("/anime/1/full").await.expect("rewritten entry live");
        assert_eq!(entry.data, json!({"v": 2}));
    }
}
