pub mod actions;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod grouping;
pub mod logging;
pub mod scanner;
pub mod session;
pub mod snapshot;
pub mod utils;

use std::path::PathBuf;
use serde::{Deserialize, Serialize};

pub use actions::{apply, ActionResult, DedupAction, KeepPolicy, Organize};
pub use dedup::{find_duplicates, perform_deduplication, ScanReport};
pub use error::{ActionError, ConfigError, SnapshotError};
pub use filter::Filter;
pub use fingerprint::{Fingerprint, FingerprintMode};
pub use grouping::GroupingEngine;
pub use scanner::{ScanConfig, ScanOutput, Scanner};
pub use session::{spawn_scan, ScanHandle};
pub use snapshot::ScanSnapshot;

/// A regular file discovered during a scan, with its content fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    /// Last modification time in UTC epoch seconds
    pub modified: i64,
    pub fingerprint: Fingerprint,
}

/// Two or more files sharing both fingerprint and size.
///
/// Members keep the order in which the scan discovered them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    members: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Builds a group, refusing anything with fewer than two members.
    pub(crate) fn new(members: Vec<FileRecord>) -> Option<Self> {
        if members.len() < 2 {
            return None;
        }
        Some(Self { members })
    }

    pub fn members(&self) -> &[FileRecord] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Groups are never empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn size(&self) -> u64 {
        self.members[0].size
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.members[0].fingerprint
    }

    /// Bytes that would be reclaimed by keeping a single copy
    pub fn wasted_space(&self) -> u64 {
        self.size() * (self.members.len() - 1) as u64
    }
}

/// Output of one grouping pass.
///
/// Stale as soon as any mutation succeeds against it: the paths it records
/// may no longer exist. Re-scan before acting again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateResultSet {
    pub groups: Vec<DuplicateGroup>,
    /// Records fed to the grouping engine
    pub total_files: usize,
    pub total_size: u64,
    /// Records skipped because their fingerprint was `Unreadable`
    pub unreadable_files: usize,
    /// Insertions abandoned after a failed allocation
    pub dropped_insertions: usize,
}

impl DuplicateResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of files beyond the first in every group
    pub fn get_duplicate_count(&self) -> usize {
        self.groups.iter().map(|group| group.len() - 1).sum()
    }

    pub fn get_wasted_space(&self) -> u64 {
        self.groups.iter().map(DuplicateGroup::wasted_space).sum()
    }
}
