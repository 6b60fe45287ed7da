use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use serde::{Deserialize, Serialize};

/// Bytes read from the start of a file in fast mode
pub const QUICK_SCAN_LIMIT: u64 = 1024 * 1024;

const READ_BUFFER_SIZE: usize = 8192;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// How much of a file contributes to its fingerprint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintMode {
    /// FNV-1a over the first [`QUICK_SCAN_LIMIT`] bytes
    #[default]
    Fast,
    /// FNV-1a over the whole file
    Exhaustive,
    /// BLAKE3 over the whole file
    Thorough,
}

/// Content digest of one file, or a marker that it could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fingerprint {
    /// Fixed-width lowercase hex digest
    Digest(String),
    Unreadable,
}

impl Fingerprint {
    pub fn is_unreadable(&self) -> bool {
        matches!(self, Fingerprint::Unreadable)
    }

    /// Hex digest, or `None` for unreadable files
    pub fn as_digest(&self) -> Option<&str> {
        match self {
            Fingerprint::Digest(hex) => Some(hex),
            Fingerprint::Unreadable => None,
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fingerprint::Digest(hex) => f.write_str(hex),
            Fingerprint::Unreadable => f.write_str("unreadable"),
        }
    }
}

/// Streaming FNV-1a accumulator.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a64 {
    state: u64,
}

impl Fnv1a64 {
    pub fn new() -> Self {
        Self {
            state: FNV_OFFSET_BASIS,
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state ^= u64::from(byte);
            self.state = self.state.wrapping_mul(FNV_PRIME);
        }
    }

    pub fn finish(&self) -> u64 {
        self.state
    }

    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.state)
    }
}

impl Default for Fnv1a64 {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the fingerprint of the file at `path`.
///
/// Never fails: any open or read error yields [`Fingerprint::Unreadable`].
/// Memory use is bounded by a fixed read buffer whatever the file size.
pub fn fingerprint(path: &Path, mode: FingerprintMode) -> Fingerprint {
    match compute(path, mode) {
        Ok(hex) => Fingerprint::Digest(hex),
        Err(e) => {
            log::warn!("Cannot read {}: {}", path.display(), e);
            Fingerprint::Unreadable
        }
    }
}

fn compute(path: &Path, mode: FingerprintMode) -> io::Result<String> {
    let file = fs::File::open(path)?;

    match mode {
        FingerprintMode::Fast => {
            let mut hasher = Fnv1a64::new();
            read_chunks(file.take(QUICK_SCAN_LIMIT), |chunk| hasher.update(chunk))?;
            Ok(hasher.to_hex())
        }
        FingerprintMode::Exhaustive => {
            let mut hasher = Fnv1a64::new();
            read_chunks(file, |chunk| hasher.update(chunk))?;
            Ok(hasher.to_hex())
        }
        FingerprintMode::Thorough => {
            let mut hasher = blake3::Hasher::new();
            read_chunks(file, |chunk| {
                hasher.update(chunk);
            })?;
            Ok(hasher.finalize().to_hex().to_string())
        }
    }
}

fn read_chunks<R: Read>(mut reader: R, mut sink: impl FnMut(&[u8])) -> io::Result<()> {
    let mut buffer = vec![0; READ_BUFFER_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        sink(&buffer[..bytes_read]);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(path: &Path, content: &[u8]) {
        File::create(path).unwrap().write_all(content).unwrap();
    }

    #[test]
    fn test_fnv_known_vectors() {
        let mut empty = Fnv1a64::new();
        empty.update(b"");
        assert_eq!(empty.to_hex(), "cbf29ce484222325");

        let mut a = Fnv1a64::new();
        a.update(b"a");
        assert_eq!(a.finish(), 0xaf63dc4c8601ec8c);

        let mut foobar = Fnv1a64::new();
        foobar.update(b"foo");
        foobar.update(b"bar");
        assert_eq!(foobar.finish(), 0x85944171f73967e8);
    }

    #[test]
    fn test_equal_content_equal_fingerprint() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        write_file(&a, b"same bytes");
        write_file(&b, b"same bytes");

        for mode in [
            FingerprintMode::Fast,
            FingerprintMode::Exhaustive,
            FingerprintMode::Thorough,
        ] {
            assert_eq!(fingerprint(&a, mode), fingerprint(&b, mode));
        }
    }

    #[test]
    fn test_digest_widths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.txt");
        write_file(&path, b"hello");

        let fast = fingerprint(&path, FingerprintMode::Fast);
        assert_eq!(fast.as_digest().unwrap().len(), 16);

        let thorough = fingerprint(&path, FingerprintMode::Thorough);
        assert_eq!(thorough.as_digest().unwrap().len(), 64);
    }

    #[test]
    fn test_fast_mode_ignores_tail() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");

        let mut content = vec![7u8; QUICK_SCAN_LIMIT as usize + 100];
        write_file(&a, &content);
        *content.last_mut().unwrap() = 8;
        write_file(&b, &content);

        assert_eq!(
            fingerprint(&a, FingerprintMode::Fast),
            fingerprint(&b, FingerprintMode::Fast)
        );
        assert_ne!(
            fingerprint(&a, FingerprintMode::Exhaustive),
            fingerprint(&b, FingerprintMode::Exhaustive)
        );
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let result = fingerprint(&dir.path().join("nope"), FingerprintMode::Exhaustive);
        assert!(result.is_unreadable());
        assert_eq!(result.to_string(), "unreadable");
    }
}
