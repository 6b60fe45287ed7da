use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::ConfigError;
use crate::filter::{self, Filter, FilterSubject};
use crate::fingerprint::{self, FingerprintMode};
use crate::utils::{epoch_seconds, is_within, normalize_path};
use crate::FileRecord;

/// Default cap on records collected by one scan
pub const DEFAULT_MAX_RECORDS: usize = 1_000_000;

/// Options recognised by a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    pub roots: Vec<PathBuf>,
    pub recurse: bool,
    /// Directories (or files) skipped along with everything beneath them
    pub exclusions: Vec<PathBuf>,
    pub mode: FingerprintMode,
    pub filters: Vec<Filter>,
    /// Stop collecting once this many records exist; `None` is unbounded
    pub max_records: Option<usize>,
    /// Visit directory entries sorted by file name instead of OS order
    pub sort_entries: bool,
    #[serde(skip)]
    pub show_progress: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            recurse: true,
            exclusions: Vec::new(),
            mode: FingerprintMode::default(),
            filters: Vec::new(),
            max_records: Some(DEFAULT_MAX_RECORDS),
            sort_entries: false,
            show_progress: false,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roots.is_empty() {
            return Err(ConfigError::NoRoots);
        }
        Ok(())
    }
}

/// Kind of a directory entry, as reported without following symlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Symlinks, sockets, devices and anything else that is not a regular file
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub size: u64,
    pub modified: i64,
}

/// Lists the direct children of one directory.
///
/// Implementations must skip the `.` and `..` pseudo-entries, report entries
/// in a stable order for an unchanged directory, and fail as a whole only
/// when the directory itself cannot be read.
pub trait DirectorySource: Send + Sync {
    fn entries(&self, dir: &Path, sorted: bool) -> io::Result<Vec<DirEntry>>;
}

/// Directory listing backed by `walkdir`, one level at a time
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkDirSource;

impl DirectorySource for WalkDirSource {
    fn entries(&self, dir: &Path, sorted: bool) -> io::Result<Vec<DirEntry>> {
        let mut walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false);
        if sorted {
            walker = walker.sort_by_file_name();
        }

        let mut entries = Vec::new();
        for item in walker {
            let entry = match item {
                Ok(entry) => entry,
                // Depth 0 means the directory itself could not be listed
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    log::debug!("Skipping unreadable entry in {}: {}", dir.display(), e);
                    continue;
                }
            };

            let file_type = entry.file_type();
            let kind = if file_type.is_file() {
                EntryKind::File
            } else if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::Other
            };

            let (size, modified) = if kind == EntryKind::File {
                match entry.metadata() {
                    Ok(metadata) => (metadata.len(), metadata_modified(&metadata)),
                    Err(e) => {
                        log::warn!("Failed to get metadata for {}: {}", entry.path().display(), e);
                        continue;
                    }
                }
            } else {
                (0, 0)
            };

            entries.push(DirEntry {
                path: entry.into_path(),
                kind,
                size,
                modified,
            });
        }

        Ok(entries)
    }
}

fn metadata_modified(metadata: &fs::Metadata) -> i64 {
    metadata.modified().map(epoch_seconds).unwrap_or(0)
}

/// Everything a scan produced
#[derive(Debug, Clone, Default)]
pub struct ScanOutput {
    /// Records in discovery order
    pub records: Vec<FileRecord>,
    /// Roots and directories that could not be listed
    pub skipped_directories: usize,
    /// The record cap was reached; `records` is a valid partial result
    pub truncated: bool,
}

struct Candidate {
    path: PathBuf,
    size: u64,
    modified: i64,
}

impl FilterSubject for Candidate {
    fn path(&self) -> &Path {
        &self.path
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn modified(&self) -> i64 {
        self.modified
    }
}

/// Traverses directory roots and fingerprints every regular file found
pub struct Scanner<S = WalkDirSource> {
    config: ScanConfig,
    source: S,
}

impl Scanner<WalkDirSource> {
    pub fn new() -> Self {
        Self::with_config(ScanConfig::default())
    }

    pub fn with_config(config: ScanConfig) -> Self {
        Self {
            config,
            source: WalkDirSource,
        }
    }
}

impl Default for Scanner<WalkDirSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DirectorySource> Scanner<S> {
    pub fn with_source(config: ScanConfig, source: S) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn add_root(&mut self, root: impl Into<PathBuf>) {
        self.config.roots.push(root.into());
    }

    pub fn add_exclusion(&mut self, path: impl Into<PathBuf>) {
        self.config.exclusions.push(path.into());
    }

    pub fn add_filter(&mut self, filter: Filter) {
        self.config.filters.push(filter);
    }

    pub fn set_recurse(&mut self, recurse: bool) {
        self.config.recurse = recurse;
    }

    pub fn set_mode(&mut self, mode: FingerprintMode) {
        self.config.mode = mode;
    }

    pub fn set_max_records(&mut self, max_records: Option<usize>) {
        self.config.max_records = max_records;
    }

    pub fn set_sort_entries(&mut self, sorted: bool) {
        self.config.sort_entries = sorted;
    }

    pub fn set_show_progress(&mut self, show: bool) {
        self.config.show_progress = show;
    }

    /// Walk every root, then fingerprint what was found.
    ///
    /// Only an empty root list is an error. Unlistable directories are
    /// skipped and counted; unreadable files get the unreadable fingerprint.
    pub fn scan(&self) -> Result<ScanOutput, ConfigError> {
        self.scan_with_progress(|_, _| {})
    }

    /// Like [`Scanner::scan`], reporting `(hashed, total)` as fingerprinting
    /// proceeds. The first call is `(0, total)` once traversal is done.
    /// Calls come from worker threads and may arrive out of order.
    pub fn scan_with_progress(
        &self,
        on_progress: impl Fn(usize, usize) + Sync,
    ) -> Result<ScanOutput, ConfigError> {
        self.config.validate()?;

        let (candidates, skipped_directories, truncated) = self.collect_files();
        if truncated {
            log::warn!(
                "Record limit of {} reached; results are partial",
                candidates.len()
            );
        }

        let records = self.fingerprint_files(candidates, &on_progress);

        log::info!(
            "Scanned {} files ({} directories skipped)",
            records.len(),
            skipped_directories
        );

        Ok(ScanOutput {
            records,
            skipped_directories,
            truncated,
        })
    }

    /// Depth-first, pre-order: a directory's files, then its subdirectories
    fn collect_files(&self) -> (Vec<Candidate>, usize, bool) {
        let exclusions: Vec<PathBuf> = self
            .config
            .exclusions
            .iter()
            .map(|path| normalize_path(path))
            .collect();
        let limit = self.config.max_records.unwrap_or(usize::MAX);

        let mut files = Vec::new();
        let mut skipped = 0;

        for root in distinct_roots(&self.config.roots) {
            let mut pending = vec![root];

            while let Some(dir) = pending.pop() {
                if files.len() >= limit {
                    return (files, skipped, true);
                }

                if is_excluded(&dir, &exclusions) {
                    log::debug!("Excluded directory {}", dir.display());
                    continue;
                }

                let entries = match self.source.entries(&dir, self.config.sort_entries) {
                    Ok(entries) => entries,
                    Err(e) => {
                        log::warn!("Skipping directory {}: {}", dir.display(), e);
                        skipped += 1;
                        continue;
                    }
                };

                let mut subdirs = Vec::new();
                for entry in entries {
                    match entry.kind {
                        EntryKind::File => {
                            if files.len() >= limit {
                                return (files, skipped, true);
                            }
                            if is_excluded(&entry.path, &exclusions) {
                                continue;
                            }
                            let candidate = Candidate {
                                path: entry.path,
                                size: entry.size,
                                modified: entry.modified,
                            };
                            if filter::passes_subject(&candidate, &self.config.filters) {
                                files.push(candidate);
                            } else {
                                log::trace!("Filtered out {}", candidate.path.display());
                            }
                        }
                        EntryKind::Directory if self.config.recurse => subdirs.push(entry.path),
                        EntryKind::Directory => {}
                        EntryKind::Other => {
                            log::trace!("Skipping non-regular file {}", entry.path.display());
                        }
                    }
                }

                // Reverse so the first subdirectory is popped first
                pending.extend(subdirs.into_iter().rev());
            }
        }

        (files, skipped, false)
    }

    /// Fingerprint in parallel; output keeps discovery order
    fn fingerprint_files(
        &self,
        files: Vec<Candidate>,
        on_progress: &(impl Fn(usize, usize) + Sync),
    ) -> Vec<FileRecord> {
        let total = files.len();
        on_progress(0, total);

        let progress = if self.config.show_progress {
            let bar = ProgressBar::new(files.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            ) {
                bar.set_style(style.progress_chars("##-"));
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        let mode = self.config.mode;
        let hashed = AtomicUsize::new(0);
        let records: Vec<FileRecord> = files
            .into_par_iter()
            .map(|file| {
                let fingerprint = fingerprint::fingerprint(&file.path, mode);
                progress.inc(1);
                on_progress(hashed.fetch_add(1, Ordering::Relaxed) + 1, total);
                FileRecord {
                    path: file.path,
                    size: file.size,
                    modified: file.modified,
                    fingerprint,
                }
            })
            .collect();

        progress.finish_and_clear();
        records
    }
}

/// Normalized roots with repeats and roots nested inside another root
/// removed, so no file is reached twice.
fn distinct_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    let normalized: Vec<PathBuf> = roots.iter().map(|root| normalize_path(root)).collect();

    normalized
        .iter()
        .enumerate()
        .filter(|&(i, root)| {
            let covered = normalized.iter().enumerate().any(|(j, other)| {
                j != i && is_within(root, other) && (root != other || j < i)
            });
            if covered {
                log::debug!("Root {} is already covered by another root", root.display());
            }
            !covered
        })
        .map(|(_, root)| root.clone())
        .collect()
}

fn is_excluded(path: &Path, exclusions: &[PathBuf]) -> bool {
    exclusions.iter().any(|prefix| is_within(path, prefix))
}

/// Scan with the filesystem-backed source
pub fn scan(config: &ScanConfig) -> Result<Vec<FileRecord>, ConfigError> {
    Ok(Scanner::with_config(config.clone()).scan()?.records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    /// In-memory tree: directory path -> children
    #[derive(Default)]
    struct FakeTree {
        dirs: HashMap<PathBuf, Vec<DirEntry>>,
    }

    impl FakeTree {
        fn dir(mut self, dir: &str, children: &[(&str, EntryKind)]) -> Self {
            let entries = children
                .iter()
                .map(|(name, kind)| DirEntry {
                    path: Path::new(dir).join(name),
                    kind: *kind,
                    size: 1,
                    modified: 0,
                })
                .collect();
            self.dirs.insert(PathBuf::from(dir), entries);
            self
        }
    }

    impl DirectorySource for FakeTree {
        fn entries(&self, dir: &Path, _sorted: bool) -> io::Result<Vec<DirEntry>> {
            self.dirs
                .get(dir)
                .cloned()
                .ok_or_else(|| io::Error::from(io::ErrorKind::PermissionDenied))
        }
    }

    fn config(roots: &[&str]) -> ScanConfig {
        ScanConfig {
            roots: roots.iter().map(PathBuf::from).collect(),
            ..ScanConfig::default()
        }
    }

    fn scanned_paths<S: DirectorySource>(scanner: &Scanner<S>) -> Vec<String> {
        scanner
            .scan()
            .unwrap()
            .records
            .iter()
            .map(|r| r.path.to_string_lossy().into_owned())
            .collect()
    }

    fn sample_tree() -> FakeTree {
        use EntryKind::{Directory as Dir, File as Reg, Other};
        FakeTree::default()
            .dir("/r", &[("sub", Dir), ("a", Reg), ("link", Other), ("b", Reg)])
            .dir("/r/sub", &[("deep", Dir), ("c", Reg)])
            .dir("/r/sub/deep", &[("d", Reg)])
    }

    #[test]
    fn test_files_before_subdirectories() {
        let scanner = Scanner::with_source(config(&["/r"]), sample_tree());
        assert_eq!(
            scanned_paths(&scanner),
            vec!["/r/a", "/r/b", "/r/sub/c", "/r/sub/deep/d"]
        );
    }

    #[test]
    fn test_no_recurse() {
        let mut cfg = config(&["/r"]);
        cfg.recurse = false;
        let scanner = Scanner::with_source(cfg, sample_tree());
        assert_eq!(scanned_paths(&scanner), vec!["/r/a", "/r/b"]);
    }

    #[test]
    fn test_unlistable_directory_skipped() {
        use EntryKind::{Directory as Dir, File as Reg};
        let tree = FakeTree::default()
            .dir("/r", &[("locked", Dir), ("open", Dir), ("x", Reg)])
            .dir("/r/open", &[("y", Reg)]);

        let scanner = Scanner::with_source(config(&["/r", "/missing"]), tree);
        let output = scanner.scan().unwrap();
        assert_eq!(output.records.len(), 2);
        assert_eq!(output.skipped_directories, 2);
    }

    #[test]
    fn test_exclusion_respects_separator_boundary() {
        use EntryKind::{Directory as Dir, File as Reg};
        let tree = FakeTree::default()
            .dir("/data", &[("tmp", Dir), ("tmpdir", Dir), ("tmpfile.txt", Reg)])
            .dir("/data/tmp", &[("inside", Reg)])
            .dir("/data/tmpdir", &[("kept", Reg)]);

        let mut cfg = config(&["/data"]);
        cfg.exclusions.push(PathBuf::from("/data/tmp"));
        let scanner = Scanner::with_source(cfg, tree);

        assert_eq!(
            scanned_paths(&scanner),
            vec!["/data/tmpfile.txt", "/data/tmpdir/kept"]
        );
    }

    #[test]
    fn test_excluded_root() {
        let mut cfg = config(&["/r"]);
        cfg.exclusions.push(PathBuf::from("/r/"));
        let scanner = Scanner::with_source(cfg, sample_tree());
        assert!(scanned_paths(&scanner).is_empty());
    }

    #[test]
    fn test_record_limit_truncates_without_error() {
        let mut cfg = config(&["/r"]);
        cfg.max_records = Some(3);
        let scanner = Scanner::with_source(cfg, sample_tree());

        let output = scanner.scan().unwrap();
        assert!(output.truncated);
        assert_eq!(output.records.len(), 3);
        assert_eq!(output.records[2].path, PathBuf::from("/r/sub/c"));
    }

    #[test]
    fn test_no_roots_is_config_error() {
        let scanner = Scanner::with_source(ScanConfig::default(), FakeTree::default());
        assert!(matches!(scanner.scan(), Err(ConfigError::NoRoots)));
    }

    #[test]
    fn test_scan_is_repeatable() {
        let scanner = Scanner::with_source(config(&["/r"]), sample_tree());
        assert_eq!(scanned_paths(&scanner), scanned_paths(&scanner));
    }

    #[test]
    fn test_repeated_and_nested_roots_visit_each_file_once() {
        let expected = vec!["/r/a", "/r/b", "/r/sub/c", "/r/sub/deep/d"];

        let repeated = Scanner::with_source(config(&["/r", "/r/", "/r"]), sample_tree());
        assert_eq!(scanned_paths(&repeated), expected);

        let nested = Scanner::with_source(config(&["/r/sub", "/r", "/r/sub/deep"]), sample_tree());
        assert_eq!(scanned_paths(&nested), expected);
    }

    #[test]
    fn test_distinct_roots_keeps_siblings() {
        let roots = distinct_roots(&[
            PathBuf::from("/data/a"),
            PathBuf::from("/data/ab"),
            PathBuf::from("/data/a/inner"),
        ]);
        assert_eq!(roots, vec![PathBuf::from("/data/a"), PathBuf::from("/data/ab")]);
    }

    #[test]
    fn test_progress_reports_every_hashed_file() {
        let scanner = Scanner::with_source(config(&["/r"]), sample_tree());
        let calls = std::sync::Mutex::new(Vec::new());

        let output = scanner
            .scan_with_progress(|done, total| calls.lock().unwrap().push((done, total)))
            .unwrap();

        let mut calls = calls.into_inner().unwrap();
        assert_eq!(calls[0], (0, 4));
        calls.sort();
        let done: Vec<usize> = calls.iter().map(|&(done, _)| done).collect();
        assert_eq!(done, vec![0, 1, 2, 3, 4]);
        assert!(calls.iter().all(|&(_, total)| total == output.records.len()));
    }

    #[test]
    fn test_real_directory_scan() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        File::create(dir.path().join("one.txt"))
            .unwrap()
            .write_all(b"12345")
            .unwrap();
        File::create(dir.path().join("nested").join("two.log"))
            .unwrap()
            .write_all(b"abc")
            .unwrap();

        let mut scanner = Scanner::new();
        scanner.add_root(dir.path());
        scanner.set_sort_entries(true);
        scanner.add_filter(Filter::extensions(["txt"]));

        let output = scanner.scan().unwrap();
        assert_eq!(output.records.len(), 1);

        let record = &output.records[0];
        assert!(record.path.ends_with("one.txt"));
        assert!(record.path.is_absolute());
        assert_eq!(record.size, 5);
        assert!(record.modified > 0);
        assert!(!record.fingerprint.is_unreadable());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_regular_files() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target.txt");
        File::create(&target).unwrap().write_all(b"data").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("alias.txt")).unwrap();

        let records = scan(&config(&[dir.path().to_str().unwrap()])).unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].path.ends_with("target.txt"));
    }
}
