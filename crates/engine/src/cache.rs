//! Metadata-pointer and query-result caches (§4.6). Both live behind the
//! one `parking_lot::Mutex` the engine holds per §5: lookups and inserts
//! are O(1) hash/list operations, no I/O runs under the lock, and callers
//! clone the value out before releasing it.

use acidlake_core::QueryResponseData;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// TTL for resolved metadata pointers (§4.6).
pub const METADATA_TTL: Duration = Duration::from_secs(300);
/// TTL for cached query-result envelopes (§4.6).
pub const QUERY_RESULT_TTL: Duration = Duration::from_secs(60);
/// Bound on the number of entries the query-result cache retains (§4.6).
pub const QUERY_RESULT_CAPACITY: usize = 100;

struct MetadataEntry {
    pointer: String,
    inserted_at: Instant,
}

struct ResultEntry {
    response: QueryResponseData,
    inserted_at: Instant,
}

/// The two TTL caches, held together so the engine can guard both with a
/// single lock (§5 Shared resources).
#[derive(Default)]
pub struct Caches {
    metadata: HashMap<String, MetadataEntry>,
    results: HashMap<String, ResultEntry>,
    // Tracks insertion order for LRU eviction; the front is oldest.
    result_order: VecDeque<String>,
}

impl Caches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolved metadata pointer for `table.catalog_name()`, if present and
    /// not yet expired.
    pub fn get_metadata(&self, key: &str) -> Option<String> {
        self.metadata.get(key).and_then(|entry| {
            if entry.inserted_at.elapsed() <= METADATA_TTL {
                Some(entry.pointer.clone())
            } else {
                None
            }
        })
    }

    pub fn put_metadata(&mut self, key: String, pointer: String) {
        self.metadata.insert(
            key,
            MetadataEntry {
                pointer,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Invalidated eagerly on writes, overwrites, hard-deletes,
    /// compactions, and drop-table (§4.6).
    pub fn invalidate_metadata(&mut self, key: &str) {
        self.metadata.remove(key);
    }

    pub fn get_result(&self, key: &str) -> Option<QueryResponseData> {
        self.results.get(key).and_then(|entry| {
            if entry.inserted_at.elapsed() <= QUERY_RESULT_TTL {
                Some(entry.response.clone())
            } else {
                None
            }
        })
    }

    pub fn put_result(&mut self, key: String, response: QueryResponseData) {
        if !self.results.contains_key(&key) {
            self.result_order.push_back(key.clone());
        }
        self.results.insert(
            key,
            ResultEntry {
                response,
                inserted_at: Instant::now(),
            },
        );
        while self.results.len() > QUERY_RESULT_CAPACITY {
            if let Some(oldest) = self.result_order.pop_front() {
                self.results.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acidlake_core::QueryMetadata;
    use std::thread::sleep;

    fn sample_response(query_id: &str) -> QueryResponseData {
        QueryResponseData {
            records: vec![],
            query_metadata: QueryMetadata {
                row_count: 0,
                execution_time_ms: 1,
                scanned_rows: None,
                scanned_bytes: None,
                cache_hit: false,
                query_id: query_id.to_string(),
            },
        }
    }

    #[test]
    fn metadata_round_trips_until_invalidated() {
        let mut caches = Caches::new();
        caches.put_metadata("t1.default.users".to_string(), "s3://meta.json".to_string());
        assert_eq!(
            caches.get_metadata("t1.default.users").as_deref(),
            Some("s3://meta.json")
        );
        caches.invalidate_metadata("t1.default.users");
        assert!(caches.get_metadata("t1.default.users").is_none());
    }

    #[test]
    fn result_cache_evicts_oldest_past_capacity() {
        let mut caches = Caches::new();
        for i in 0..(QUERY_RESULT_CAPACITY + 5) {
            caches.put_result(format!("key-{i}"), sample_response("q"));
        }
        assert_eq!(caches.results.len(), QUERY_RESULT_CAPACITY);
        assert!(caches.get_result("key-0").is_none());
        assert!(caches.get_result(&format!("key-{}", QUERY_RESULT_CAPACITY + 4)).is_some());
    }

    #[test]
    fn zero_ttl_like_behavior_is_not_exercised_but_elapsed_respects_real_time() {
        let mut caches = Caches::new();
        caches.put_result("k".to_string(), sample_response("q1"));
        sleep(Duration::from_millis(5));
        assert!(caches.get_result("k").is_some());
    }
}
