//! Top-N ranking of file collections by cumulative size.
//!
//! Independent of the rate limiter; it shares no state with it.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Collection name used when a file is added without one.
pub const DEFAULT_COLLECTION: &str = "default";

/// A named file and its size in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub name: String,
    pub size: u64,
}

impl File {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

#[derive(Debug, Default)]
struct Collection {
    files: Vec<File>,
    size: u64,
}

/// Groups files into named collections and ranks the collections by size.
#[derive(Debug, Default)]
pub struct CollectionRanking {
    collections: HashMap<String, Collection>,
    total_size: u64,
}

impl CollectionRanking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `file` to `collection`, creating the collection if needed.
    ///
    /// An empty collection name files it under [`DEFAULT_COLLECTION`].
    pub fn add_file(&mut self, collection: &str, file: File) {
        let name = if collection.is_empty() {
            DEFAULT_COLLECTION
        } else {
            collection
        };
        let size = file.size;

        let entry = self.collections.entry(name.to_string()).or_default();
        entry.files.push(file);
        entry.size = entry.size.saturating_add(size);
        self.total_size = self.total_size.saturating_add(size);
    }

    /// Combined size of every file added.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Cumulative size of one collection.
    pub fn collection_size(&self, collection: &str) -> Option<u64> {
        self.collections.get(collection).map(|c| c.size)
    }

    /// Number of files in one collection.
    pub fn file_count(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, |c| c.files.len())
    }

    /// Number of distinct collections.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Names of the `n` largest collections, largest first.
    ///
    /// Keeps a min-heap of at most `n` entries while scanning, so the cost
    /// is O(k log n) for k collections. Equal sizes rank by name.
    pub fn top_n(&self, n: usize) -> Vec<String> {
        if n == 0 {
            return Vec::new();
        }

        let mut heap: BinaryHeap<Reverse<(u64, Reverse<&str>)>> = BinaryHeap::with_capacity(n + 1);
        for (name, collection) in &self.collections {
            heap.push(Reverse((collection.size, Reverse(name.as_str()))));
            if heap.len() > n {
                heap.pop();
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|Reverse((_, Reverse(name)))| name.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CollectionRanking {
        let mut ranking = CollectionRanking::new();
        ranking.add_file("coll1", File::new("file1", 100));
        ranking.add_file("coll1", File::new("file2", 500));
        ranking.add_file("coll1", File::new("file3", 800));
        ranking.add_file("coll2", File::new("file4", 80_000));
        ranking.add_file("coll2", File::new("file5", 80_000));
        ranking.add_file("coll3", File::new("file6", 800_000));
        ranking
    }

    #[test]
    fn test_top_n_returns_largest_collections() {
        let ranking = sample();
        assert_eq!(ranking.top_n(2), vec!["coll3".to_string(), "coll2".to_string()]);
    }

    #[test]
    fn test_top_n_larger_than_collection_count() {
        let ranking = sample();
        assert_eq!(ranking.top_n(10), vec!["coll3", "coll2", "coll1"]);
        assert!(ranking.top_n(0).is_empty());
    }

    #[test]
    fn test_sizes_accumulate() {
        let ranking = sample();
        assert_eq!(ranking.total_size(), 961_400);
        assert_eq!(ranking.collection_size("coll1"), Some(1_400));
        assert_eq!(ranking.file_count("coll2"), 2);
        assert_eq!(ranking.collection_size("missing"), None);
        assert_eq!(ranking.len(), 3);
    }

    #[test]
    fn test_empty_collection_name_uses_default() {
        let mut ranking = CollectionRanking::new();
        ranking.add_file("", File::new("orphan", 42));

        assert_eq!(ranking.collection_size(DEFAULT_COLLECTION), Some(42));
        assert_eq!(ranking.top_n(1), vec![DEFAULT_COLLECTION]);
    }

    #[test]
    fn test_ties_rank_by_name() {
        let mut ranking = CollectionRanking::new();
        ranking.add_file("b", File::new("x", 10));
        ranking.add_file("a", File::new("y", 10));
        ranking.add_file("c", File::new("z", 10));

        assert_eq!(ranking.top_n(2), vec!["a", "b"]);
    }
}
