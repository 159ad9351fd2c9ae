#![allow(clippy::expect_used)]

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use mcpp_protocol::CachedEntry;

/// An in-memory, process-local map from `call_id` to `CachedEntry`.
///
/// A single `RwLock<HashMap<..>>` gives concurrent readers and
/// linearizable individual operations without cross-key atomicity,
/// without reaching for a sharded or lock-free structure the workload
/// doesn't need: a cache that only ever needs whole-entry replace/read
/// naturally wants a `RwLock` since reads dominate.
#[derive(Debug, Default)]
pub struct DataCache {
    entries: RwLock<HashMap<String, CachedEntry>>,
}

impl DataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional replace.
    pub fn put(&self, call_id: impl Into<String>, entry: CachedEntry) {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.insert(call_id.into(), entry);
    }

    /// Returns the entry, treating an expired one as absent (and evicting
    /// it) rather than as an error — missing keys are a normal return.
    pub fn get(&self, call_id: &str) -> Option<CachedEntry> {
        {
            let entries = self.entries.read().expect("cache lock poisoned");
            match entries.get(call_id) {
                Some(entry) if !entry.metadata().is_expired(Utc::now()) => return Some(entry.clone()),
                Some(_) => {} // expired; fall through to evict below
                None => return None,
            }
        }
        self.delete(call_id);
        None
    }

    pub fn has(&self, call_id: &str) -> bool {
        self.get(call_id).is_some()
    }

    pub fn delete(&self, call_id: &str) -> bool {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.remove(call_id).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().expect("cache lock poisoned");
        entries.keys().cloned().collect()
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.clear();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use chrono::Duration;
    use mcpp_protocol::cache_entry::EntryMetadata;
    use mcpp_protocol::cache_entry::TableData;

    fn text_entry(sensitive: bool) -> CachedEntry {
        CachedEntry::Text {
            payload: "hello".to_string(),
            metadata: EntryMetadata::new("echo", sensitive),
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = DataCache::new();
        cache.put("t1", text_entry(true));
        assert!(cache.has("t1"));
        assert!(matches!(cache.get("t1"), Some(CachedEntry::Text { .. })));
    }

    #[test]
    fn missing_key_is_a_plain_none_not_a_panic() {
        let cache = DataCache::new();
        assert_eq!(cache.get("nope"), None);
        assert!(!cache.has("nope"));
        assert!(!cache.delete("nope"));
    }

    #[test]
    fn delete_removes_and_reports_presence() {
        let cache = DataCache::new();
        cache.put("t1", text_entry(false));
        assert!(cache.delete("t1"));
        assert!(!cache.has("t1"));
        assert!(!cache.delete("t1"));
    }

    #[test]
    fn expired_entry_is_treated_as_absent_and_evicted() {
        let cache = DataCache::new();
        let metadata = EntryMetadata::new("echo", true).with_ttl(Utc::now() - Duration::seconds(1));
        cache.put("t1", CachedEntry::Text { payload: "x".into(), metadata });
        assert_eq!(cache.get("t1"), None);
        assert_eq!(cache.keys(), Vec::<String>::new());
    }

    #[test]
    fn clear_empties_all_keys() {
        let cache = DataCache::new();
        cache.put("t1", text_entry(false));
        cache.put("t2", text_entry(false));
        cache.clear();
        assert_eq!(cache.keys().len(), 0);
    }

    #[test]
    fn put_replaces_unconditionally() {
        let cache = DataCache::new();
        cache.put("t1", text_entry(false));
        let table = CachedEntry::Table {
            payload: TableData::new(vec!["A".into()], vec![]).unwrap(),
            metadata: EntryMetadata::new("search", true),
        };
        cache.put("t1", table);
        assert!(matches!(cache.get("t1"), Some(CachedEntry::Table { .. })));
    }
}
