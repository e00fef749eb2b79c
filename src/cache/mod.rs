//! Two-tier (memory + shared) read-through cache with TTL, tag/pattern
//! invalidation, and single-flight (§4.7).
//!
//! Grounded on §9's single-flight design note (`{inflight?: future, ...}`),
//! implemented with a `tokio::sync::Mutex`-guarded slot per key whose shape
//! mirrors the teacher's `ws.rs` pending-oneshot map, generalized from
//! "one pending tool approval" to "one in-flight cache producer".

pub mod key;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::core::errors::PipelineError;

pub use key::CacheKeyGenerator;

#[derive(Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
    tags: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct CacheOptions {
    pub tags: Vec<String>,
}

/// One tier (memory or shared) of the two-tier cache: the entry map plus the
/// tag/prefix reverse indices §9 calls for, plus a per-key in-flight slot so
/// concurrent misses for the same key single-flight through one `fallback`.
struct Tier {
    entries: DashMap<String, CacheEntry>,
    inflight: DashMap<String, Arc<Mutex<()>>>,
    tag_index: DashMap<String, HashSet<String>>,
}

impl Tier {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
            inflight: DashMap::new(),
            tag_index: DashMap::new(),
        }
    }

    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration, tags: &[String]) {
        let tag_set: HashSet<String> = tags.iter().cloned().collect();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
                tags: tag_set,
            },
        );
        for tag in tags {
            self.tag_index.entry(tag.clone()).or_default().insert(key.to_string());
        }
    }

    fn delete(&self, key: &str) {
        if let Some((_, entry)) = self.entries.remove(key) {
            for tag in entry.tags {
                if let Some(mut keys) = self.tag_index.get_mut(&tag) {
                    keys.remove(key);
                }
            }
        }
    }

    fn invalidate_by_pattern(&self, prefix: &str) -> usize {
        let matching: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        for key in &matching {
            self.delete(key);
        }
        matching.len()
    }

    fn invalidate_by_tag(&self, tag: &str) -> usize {
        let Some((_, keys)) = self.tag_index.remove(tag) else {
            return 0;
        };
        for key in &keys {
            self.entries.remove(key);
        }
        keys.len()
    }

    fn inflight_slot(&self, key: &str) -> Arc<Mutex<()>> {
        self.inflight.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

pub struct CacheGetOptions {
    pub ttl: Duration,
    pub memory_ttl: Duration,
    pub tags: Vec<String>,
}

impl Default for CacheGetOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            memory_ttl: Duration::from_secs(30),
            tags: Vec::new(),
        }
    }
}

pub struct ActionCache {
    memory: Tier,
    shared: Tier,
}

impl ActionCache {
    pub fn new() -> Self {
        Self {
            memory: Tier::new(),
            shared: Tier::new(),
        }
    }

    /// On hit, returns the cached value. On miss, single-flights `fallback` —
    /// concurrent callers for the same key await the same in-flight producer
    /// and receive its result. A failed `fallback` caches nothing (§4.7): the
    /// next caller retries from scratch.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: &str,
        fallback: F,
        options: CacheGetOptions,
    ) -> Result<T, PipelineError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Clone,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, PipelineError>>,
    {
        if let Some(value) = self.memory.get(key) {
            if let Ok(typed) = serde_json::from_value(value) {
                return Ok(typed);
            }
        }
        if let Some(value) = self.shared.get(key) {
            if let Ok(typed) = serde_json::from_value::<T>(value.clone()) {
                self.memory.set(key, value, options.memory_ttl, &options.tags);
                return Ok(typed);
            }
        }

        let slot = self.shared.inflight_slot(key);
        let _guard = slot.lock().await;

        // Re-check now that we hold the in-flight slot: another caller may have
        // just populated the value while we were waiting for the lock.
        if let Some(value) = self.shared.get(key) {
            if let Ok(typed) = serde_json::from_value::<T>(value.clone()) {
                self.memory.set(key, value, options.memory_ttl, &options.tags);
                return Ok(typed);
            }
        }

        let produced = fallback().await?;
        let encoded = serde_json::to_value(&produced)
            .map_err(|e| PipelineError::ProgrammingError(format!("cache value not serializable: {}", e)))?;
        self.shared.set(key, encoded.clone(), options.ttl, &options.tags);
        self.memory.set(key, encoded, options.memory_ttl, &options.tags);
        Ok(produced)
    }

    pub fn delete(&self, key: &str) {
        self.memory.delete(key);
        self.shared.delete(key);
    }

    /// Removes all keys sharing `prefix` in both tiers; returns the count removed
    /// from the shared tier (the tier of record).
    pub fn invalidate_by_pattern(&self, prefix: &str) -> usize {
        self.memory.invalidate_by_pattern(prefix);
        self.shared.invalidate_by_pattern(prefix)
    }

    pub fn invalidate_by_tag(&self, tag: &str) -> usize {
        self.memory.invalidate_by_tag(tag);
        self.shared.invalidate_by_tag(tag)
    }
}

impl Default for ActionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn opts() -> CacheGetOptions {
        CacheGetOptions {
            ttl: Duration::from_secs(60),
            memory_ttl: Duration::from_secs(60),
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn hit_does_not_call_fallback() {
        let cache = ActionCache::new();
        let calls = AtomicUsize::new(0);
        let value: String = cache
            .get_or_set(
                "k1",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("v1".to_string())
                },
                opts(),
            )
            .await
            .unwrap();
        assert_eq!(value, "v1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let value2: String = cache.get_or_set("k1", || async { unreachable!("should not run") }, opts()).await.unwrap();
        assert_eq!(value2, "v1");
    }

    #[tokio::test]
    async fn invalidate_by_pattern_then_get_or_set_calls_fallback_again() {
        let cache = ActionCache::new();
        cache
            .get_or_set("db:query:get_notes", || async { Ok::<Vec<String>, PipelineError>(vec!["n1".into()]) }, opts())
            .await
            .unwrap();

        let removed = cache.invalidate_by_pattern("db:query:");
        assert_eq!(removed, 1);

        let calls = AtomicUsize::new(0);
        let value: Vec<String> = cache
            .get_or_set(
                "db:query:get_notes",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![])
                },
                opts(),
            )
            .await
            .unwrap();
        assert!(value.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fallback_does_not_cache_a_negative_result() {
        let cache = ActionCache::new();
        let first: Result<String, PipelineError> = cache
            .get_or_set("k2", || async { Err(PipelineError::transient("db down")) }, opts())
            .await;
        assert!(first.is_err());

        let second: String = cache
            .get_or_set("k2", || async { Ok("recovered".to_string()) }, opts())
            .await
            .unwrap();
        assert_eq!(second, "recovered");
    }

    #[tokio::test]
    async fn concurrent_callers_single_flight_the_same_key() {
        let cache = Arc::new(ActionCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_set::<String, _, _>(
                        "shared-key",
                        || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok("produced".to_string())
                        },
                        opts(),
                    )
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), "produced");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delete_removes_key_from_both_tiers() {
        let cache = ActionCache::new();
        cache.get_or_set("k3", || async { Ok::<i32, PipelineError>(7) }, opts()).await.unwrap();
        cache.delete("k3");
        let calls = AtomicUsize::new(0);
        cache
            .get_or_set(
                "k3",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<i32, PipelineError>(8)
                },
                opts(),
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
