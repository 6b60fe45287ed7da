//! Fingerprint-keyed hash table that clusters records into duplicate groups.
//!
//! Buckets hold the index of the first node of their chain; nodes live in one
//! arena vector and link to the next node in the same bucket by index. Each
//! node stands for one distinct `(fingerprint, size)` pair and collects the
//! indices of the records carrying it.

use std::collections::TryReserveError;

use crate::error::ConfigError;
use crate::{DuplicateGroup, DuplicateResultSet, FileRecord};

/// Prime bucket count, adequate for up to ~10^5 files
pub const DEFAULT_TABLE_SIZE: usize = 10_007;

const INITIAL_NODE_CAPACITY: usize = 4;

#[derive(Debug)]
struct Node {
    digest: String,
    size: u64,
    indices: Vec<usize>,
    next: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct GroupingEngine {
    table_size: usize,
}

impl GroupingEngine {
    pub fn new() -> Self {
        Self {
            table_size: DEFAULT_TABLE_SIZE,
        }
    }

    /// Use a custom bucket count. Prefer a prime.
    pub fn with_table_size(table_size: usize) -> Result<Self, ConfigError> {
        if table_size == 0 {
            return Err(ConfigError::InvalidTableSize);
        }
        Ok(Self { table_size })
    }

    pub fn table_size(&self) -> usize {
        self.table_size
    }

    /// Times-33 string hash reduced modulo the table size
    pub fn bucket_index(&self, digest: &str) -> usize {
        let hash = digest
            .bytes()
            .fold(5381u32, |hash, byte| {
                (hash << 5).wrapping_add(hash).wrapping_add(u32::from(byte))
            });
        hash as usize % self.table_size
    }

    /// Partition `records` into duplicate groups.
    ///
    /// Deterministic for a given input order. Groups come out in the order
    /// their first member appears in `records`, members in input order.
    pub fn group(&self, records: &[FileRecord]) -> DuplicateResultSet {
        let mut buckets: Vec<Option<usize>> = vec![None; self.table_size];
        let mut nodes: Vec<Node> = Vec::new();
        let mut result = DuplicateResultSet::new();

        for (index, record) in records.iter().enumerate() {
            result.total_files += 1;
            result.total_size += record.size;

            let Some(digest) = record.fingerprint.as_digest() else {
                result.unreadable_files += 1;
                continue;
            };

            let bucket = self.bucket_index(digest);
            if let Err(e) = insert(&mut buckets[bucket], &mut nodes, digest, record.size, index) {
                log::warn!(
                    "Dropping {} from grouping: allocation failed ({})",
                    record.path.display(),
                    e
                );
                result.dropped_insertions += 1;
            }
        }

        result.groups = nodes
            .into_iter()
            .filter_map(|node| {
                let members = node
                    .indices
                    .iter()
                    .map(|&i| records[i].clone())
                    .collect();
                DuplicateGroup::new(members)
            })
            .collect();

        log::info!(
            "Grouped {} files into {} duplicate groups",
            result.total_files,
            result.groups.len()
        );

        result
    }
}

impl Default for GroupingEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk the chain starting at `head` and append `index` to the node matching
/// both digest and size, creating that node at the chain tail if absent.
fn insert(
    head: &mut Option<usize>,
    nodes: &mut Vec<Node>,
    digest: &str,
    size: u64,
    index: usize,
) -> Result<(), TryReserveError> {
    let mut cursor = *head;
    let mut tail = None;

    while let Some(node_index) = cursor {
        let node = &mut nodes[node_index];
        if node.digest == digest && node.size == size {
            return push_doubling(&mut node.indices, index);
        }
        tail = Some(node_index);
        cursor = node.next;
    }

    let mut indices = Vec::new();
    indices.try_reserve_exact(INITIAL_NODE_CAPACITY)?;
    indices.push(index);
    nodes.try_reserve(1)?;

    let new_index = nodes.len();
    nodes.push(Node {
        digest: digest.to_owned(),
        size,
        indices,
        next: None,
    });

    match tail {
        Some(tail_index) => nodes[tail_index].next = Some(new_index),
        None => *head = Some(new_index),
    }

    Ok(())
}

fn push_doubling(indices: &mut Vec<usize>, index: usize) -> Result<(), TryReserveError> {
    if indices.len() == indices.capacity() {
        let additional = indices.capacity().max(INITIAL_NODE_CAPACITY);
        indices.try_reserve_exact(additional)?;
    }
    indices.push(index);
    Ok(())
}

/// Group with the default engine
pub fn group(records: &[FileRecord]) -> DuplicateResultSet {
    GroupingEngine::new().group(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Fingerprint;
    use std::path::PathBuf;

    fn record(path: &str, size: u64, digest: &str) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            size,
            modified: 0,
            fingerprint: Fingerprint::Digest(digest.to_string()),
        }
    }

    fn unreadable(path: &str, size: u64) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            size,
            modified: 0,
            fingerprint: Fingerprint::Unreadable,
        }
    }

    fn paths(group: &DuplicateGroup) -> Vec<&str> {
        group
            .members()
            .iter()
            .map(|r| r.path.to_str().unwrap())
            .collect()
    }

    #[test]
    fn test_bucket_index_times33() {
        let engine = GroupingEngine::new();
        // 5381 * 33 + 'a'
        assert_eq!(engine.bucket_index("a"), 177_670 % DEFAULT_TABLE_SIZE);
        assert_eq!(engine.bucket_index(""), 5381);
    }

    #[test]
    fn test_zero_table_size_rejected() {
        assert!(matches!(
            GroupingEngine::with_table_size(0),
            Err(ConfigError::InvalidTableSize)
        ));
    }

    #[test]
    fn test_groups_keep_discovery_order() {
        let records = vec![
            record("/c", 10, "aa"),
            record("/x", 3, "bb"),
            record("/a", 10, "aa"),
            record("/y", 3, "bb"),
            record("/b", 10, "aa"),
            record("/lonely", 7, "cc"),
        ];

        let result = group(&records);
        assert_eq!(result.groups.len(), 2);
        assert_eq!(paths(&result.groups[0]), vec!["/c", "/a", "/b"]);
        assert_eq!(paths(&result.groups[1]), vec!["/x", "/y"]);
        assert_eq!(result.total_files, 6);
        assert_eq!(result.get_duplicate_count(), 3);
        assert_eq!(result.get_wasted_space(), 20 + 3);
    }

    #[test]
    fn test_same_digest_different_size_not_grouped() {
        let records = vec![
            record("/a", 10, "aa"),
            record("/b", 11, "aa"),
            record("/c", 10, "aa"),
        ];

        let result = group(&records);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(paths(&result.groups[0]), vec!["/a", "/c"]);
    }

    #[test]
    fn test_bucket_collision_keeps_digests_apart() {
        // A single bucket forces every digest onto one chain
        let engine = GroupingEngine::with_table_size(1).unwrap();
        let records = vec![
            record("/A", 500, "1111"),
            record("/B", 500, "1111"),
            record("/D", 500, "2222"),
            record("/C", 500, "1111"),
        ];

        let result = engine.group(&records);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(paths(&result.groups[0]), vec!["/A", "/B", "/C"]);
    }

    #[test]
    fn test_unreadable_never_grouped() {
        let records = vec![
            unreadable("/u1", 5),
            unreadable("/u2", 5),
            record("/a", 5, "aa"),
            record("/b", 5, "aa"),
        ];

        let result = group(&records);
        assert_eq!(result.unreadable_files, 2);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(paths(&result.groups[0]), vec!["/a", "/b"]);
    }

    #[test]
    fn test_large_group_grows_past_initial_capacity() {
        let records: Vec<_> = (0..100)
            .map(|i| record(&format!("/f{i}"), 1, "same"))
            .collect();

        let result = group(&records);
        assert_eq!(result.groups.len(), 1);
        assert_eq!(result.groups[0].len(), 100);
        assert_eq!(result.dropped_insertions, 0);
    }

    #[test]
    fn test_empty_input() {
        let result = group(&[]);
        assert!(result.is_empty());
        assert_eq!(result.total_files, 0);
    }
}
