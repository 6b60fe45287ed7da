use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that make a whole scan or mutation pass meaningless.
///
/// These surface before any traversal or filesystem change happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one directory must be specified")]
    NoRoots,

    #[error("a destination directory is required for the move action")]
    MissingDestination,

    #[error("destination {0} exists but is not a directory")]
    DestinationNotDirectory(PathBuf),

    #[error("failed to create destination directory {path}: {source}")]
    DestinationUncreatable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("hash table size must be greater than zero")]
    InvalidTableSize,
}

/// Failure of a single per-file mutation. Counted, never propagated.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0} exists but is not a directory")]
    NotADirectory(PathBuf),

    #[error("no free destination name for {0}")]
    NameExhausted(PathBuf),

    #[error("{0} has no file name")]
    MissingFileName(PathBuf),

    #[error("{0} is the kept file itself")]
    SameAsKept(PathBuf),
}

impl ActionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed snapshot: {0}")]
    Format(#[from] serde_json::Error),

    #[error("snapshot version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("snapshot declares {declared} files but contains {actual}")]
    CountMismatch { declared: usize, actual: usize },
}
