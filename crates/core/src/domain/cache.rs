use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// The tables tracked by the incremental cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Revision id -> number of files in that revision's tree
    FilesInTree,
    /// Blob id -> number of lines in the blob
    LinesInBlob,
}

/// Bounds on how large a cache table may grow before it is pruned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// A table is pruned once it holds more than this many entries
    pub ceiling: usize,
    /// Number of most recently inserted entries kept after pruning
    pub retain: usize,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            ceiling: 10_000,
            retain: 5_000,
        }
    }
}

/// On-disk shape of a table. Older caches stored plain objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum CountTableRepr {
    Pairs(Vec<(String, u64)>),
    Map(BTreeMap<String, u64>),
}

/// A key -> count map that remembers insertion order.
///
/// Entries are write-once: inserting an existing key keeps the first value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "CountTableRepr", into = "Vec<(String, u64)>")]
pub struct CountTable {
    order: Vec<String>,
    values: HashMap<String, u64>,
}

impl CountTable {
    pub fn get(&self, key: &str) -> Option<u64> {
        self.values.get(key).copied()
    }

    /// Returns false when the key was already present.
    pub fn insert(&mut self, key: String, value: u64) -> bool {
        if self.values.contains_key(&key) {
            return false;
        }
        self.values.insert(key.clone(), value);
        self.order.push(key);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys from oldest to newest insertion
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Drop the oldest entries once the table exceeds the ceiling.
    /// Returns the number of evicted entries.
    pub fn prune(&mut self, policy: &EvictionPolicy) -> usize {
        if self.order.len() <= policy.ceiling {
            return 0;
        }
        let evicted = self.order.len() - policy.retain.min(self.order.len());
        for key in self.order.drain(..evicted) {
            self.values.remove(&key);
        }
        evicted
    }
}

impl From<CountTableRepr> for CountTable {
    fn from(repr: CountTableRepr) -> Self {
        let mut table = CountTable::default();
        match repr {
            CountTableRepr::Pairs(pairs) => {
                for (key, value) in pairs {
                    table.insert(key, value);
                }
            }
            CountTableRepr::Map(map) => {
                for (key, value) in map {
                    table.insert(key, value);
                }
            }
        }
        table
    }
}

impl From<CountTable> for Vec<(String, u64)> {
    fn from(mut table: CountTable) -> Self {
        table
            .order
            .into_iter()
            .map(|key| {
                let value = table.values.remove(&key).unwrap_or_default();
                (key, value)
            })
            .collect()
    }
}

/// In-memory state of one repository's incremental cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsCache {
    #[serde(default)]
    pub files_in_tree: CountTable,
    #[serde(default)]
    pub lines_in_blob: CountTable,
}

impl StatsCache {
    pub fn get(&self, kind: CacheKind, key: &str) -> Option<u64> {
        self.table(kind).get(key)
    }

    pub fn put(&mut self, kind: CacheKind, key: impl Into<String>, value: u64) -> bool {
        self.table_mut(kind).insert(key.into(), value)
    }

    pub fn table(&self, kind: CacheKind) -> &CountTable {
        match kind {
            CacheKind::FilesInTree => &self.files_in_tree,
            CacheKind::LinesInBlob => &self.lines_in_blob,
        }
    }

    fn table_mut(&mut self, kind: CacheKind) -> &mut CountTable {
        match kind {
            CacheKind::FilesInTree => &mut self.files_in_tree,
            CacheKind::LinesInBlob => &mut self.lines_in_blob,
        }
    }

    pub fn len(&self) -> usize {
        self.files_in_tree.len() + self.lines_in_blob.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply the eviction policy to every table.
    pub fn prune(&mut self, policy: &EvictionPolicy) -> usize {
        self.files_in_tree.prune(policy) + self.lines_in_blob.prune(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_write_once() {
        let mut table = CountTable::default();
        assert!(table.insert("abc".to_string(), 3));
        assert!(!table.insert("abc".to_string(), 7));
        assert_eq!(table.get("abc"), Some(3));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_prune_below_ceiling_is_noop() {
        let mut table = CountTable::default();
        for i in 0..10 {
            table.insert(format!("k{}", i), i);
        }
        let policy = EvictionPolicy { ceiling: 10, retain: 5 };
        assert_eq!(table.prune(&policy), 0);
        assert_eq!(table.len(), 10);
    }

    #[test]
    fn test_prune_keeps_most_recent_entries() {
        let mut table = CountTable::default();
        for i in 0..12 {
            table.insert(format!("k{}", i), i);
        }
        let policy = EvictionPolicy { ceiling: 10, retain: 4 };
        assert_eq!(table.prune(&policy), 8);

        let keys: Vec<_> = table.keys().collect();
        assert_eq!(keys, vec!["k8", "k9", "k10", "k11"]);
        assert_eq!(table.get("k0"), None);
        assert_eq!(table.get("k11"), Some(11));
    }

    #[test]
    fn test_serialized_as_ordered_pairs() {
        let mut cache = StatsCache::default();
        cache.put(CacheKind::LinesInBlob, "zz", 1);
        cache.put(CacheKind::LinesInBlob, "aa", 2);

        let json = serde_json::to_string(&cache).unwrap();
        assert!(json.contains(r#""lines_in_blob":[["zz",1],["aa",2]]"#));

        let parsed: StatsCache = serde_json::from_str(&json).unwrap();
        let keys: Vec<_> = parsed.lines_in_blob.keys().collect();
        assert_eq!(keys, vec!["zz", "aa"]);
    }

    #[test]
    fn test_legacy_object_tables_are_accepted() {
        let json = r#"{"files_in_tree": {"r1": 10, "r2": 12}}"#;
        let cache: StatsCache = serde_json::from_str(json).unwrap();
        assert_eq!(cache.get(CacheKind::FilesInTree, "r2"), Some(12));
        assert!(cache.lines_in_blob.is_empty());
    }
}
