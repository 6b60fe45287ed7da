//! Save and reload the records of a scan together with the options that
//! produced them.
//!
//! The document starts with a `version` field. Loading checks it before
//! looking at anything else and refuses any other version outright.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::scanner::ScanConfig;
use crate::utils::epoch_seconds;
use crate::FileRecord;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub version: u32,
    /// When the scan finished, epoch seconds
    pub scan_time: i64,
    pub config: ScanConfig,
    pub file_count: usize,
    pub files: Vec<FileRecord>,
}

#[derive(Deserialize)]
struct VersionTag {
    version: u32,
}

impl ScanSnapshot {
    pub fn new(config: ScanConfig, files: Vec<FileRecord>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            scan_time: epoch_seconds(std::time::SystemTime::now()),
            config,
            file_count: files.len(),
            files,
        }
    }
}

pub fn save(path: &Path, snapshot: &ScanSnapshot) -> Result<(), SnapshotError> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer(&mut writer, snapshot)?;
    writer.flush()?;
    log::info!("Saved {} records to {}", snapshot.file_count, path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<ScanSnapshot, SnapshotError> {
    let bytes = fs::read(path)?;
    let snapshot = from_slice(&bytes)?;
    log::info!("Loaded {} records from {}", snapshot.file_count, path.display());
    Ok(snapshot)
}

fn from_slice(bytes: &[u8]) -> Result<ScanSnapshot, SnapshotError> {
    let tag: VersionTag = serde_json::from_slice(bytes)?;
    if tag.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::VersionMismatch {
            found: tag.version,
            expected: SNAPSHOT_VERSION,
        });
    }

    let snapshot: ScanSnapshot = serde_json::from_slice(bytes)?;
    if snapshot.file_count != snapshot.files.len() {
        return Err(SnapshotError::CountMismatch {
            declared: snapshot.file_count,
            actual: snapshot.files.len(),
        });
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Filter, Fingerprint, FingerprintMode};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn sample() -> ScanSnapshot {
        let config = ScanConfig {
            roots: vec![PathBuf::from("/data")],
            exclusions: vec![PathBuf::from("/data/tmp")],
            mode: FingerprintMode::Exhaustive,
            filters: vec![Filter::size(1, 0), Filter::name("img", true)],
            ..ScanConfig::default()
        };
        let files = vec![
            FileRecord {
                path: PathBuf::from("/data/a.jpg"),
                size: 10,
                modified: 1_700_000_000,
                fingerprint: Fingerprint::Digest("0123456789abcdef".into()),
            },
            FileRecord {
                path: PathBuf::from("/data/locked"),
                size: 3,
                modified: 0,
                fingerprint: Fingerprint::Unreadable,
            },
        ];
        ScanSnapshot::new(config, files)
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scan.json");
        let snapshot = sample();

        save(&path, &snapshot).unwrap();
        assert_eq!(load(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_version_is_leading_field() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.starts_with("{\"version\":1,"));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["version"] = serde_json::json!(2);
        value["files"] = serde_json::json!("not even a list");

        let err = from_slice(value.to_string().as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::VersionMismatch { found: 2, expected: 1 }
        ));
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let mut snapshot = sample();
        snapshot.file_count = 5;
        let json = serde_json::to_vec(&snapshot).unwrap();

        assert!(matches!(
            from_slice(&json),
            Err(SnapshotError::CountMismatch { declared: 5, actual: 2 })
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(from_slice(b"\x00\x01"), Err(SnapshotError::Format(_))));
    }
}
