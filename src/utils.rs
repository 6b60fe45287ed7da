use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use humansize::{format_size, DECIMAL};

use crate::error::ActionError;

/// Upper bound on `name_N.ext` attempts when picking a destination
pub const MAX_NAME_ATTEMPTS: u32 = 10_000;

/// Format file size in human-readable format
pub fn format_file_size(size: u64) -> String {
    format_size(size, DECIMAL)
}

/// Seconds since the Unix epoch, negative for earlier times
pub fn epoch_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => after.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    }
}

/// Absolute, lexically cleaned form of `path`: no `.` components, `..`
/// folded into its parent, no trailing separator.
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// True when `path` equals `prefix` or lies beneath it.
///
/// Matching is per path component, so `/data/tmp` contains `/data/tmp/x`
/// but not `/data/tmpfile.txt`.
pub fn is_within(path: &Path, prefix: &Path) -> bool {
    path.starts_with(prefix)
}

/// Ensure a directory exists, creating it and its parents if necessary
pub fn ensure_dir_exists(path: &Path) -> Result<(), ActionError> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(ActionError::NotADirectory(path.to_path_buf())),
        Err(_) => {
            fs::create_dir_all(path).map_err(|e| ActionError::io(path, e))?;
            log::info!("Created directory {}", path.display());
            Ok(())
        }
    }
}

/// Pick an unused path for `original_name` inside `dir`.
///
/// Tries the name itself, then `stem_1.ext`, `stem_2.ext`, ... and gives up
/// after [`MAX_NAME_ATTEMPTS`] candidates.
pub fn generate_unique_filename(dir: &Path, original_name: &str) -> Option<PathBuf> {
    unique_filename(dir, original_name, |_| false)
}

/// Like [`generate_unique_filename`], also treating `reserved` paths as taken
pub fn generate_unique_filename_excluding(
    dir: &Path,
    original_name: &str,
    reserved: &HashSet<PathBuf>,
) -> Option<PathBuf> {
    unique_filename(dir, original_name, |path| reserved.contains(path))
}

fn unique_filename(
    dir: &Path,
    original_name: &str,
    taken: impl Fn(&Path) -> bool,
) -> Option<PathBuf> {
    let free = |path: &Path| !exists(path) && !taken(path);

    let path = dir.join(original_name);
    if free(path.as_path()) {
        return Some(path);
    }

    let (stem, ext) = split_filename(original_name);
    (1..=MAX_NAME_ATTEMPTS)
        .map(|counter| {
            let new_name = if ext.is_empty() {
                format!("{}_{}", stem, counter)
            } else {
                format!("{}_{}.{}", stem, counter, ext)
            };
            dir.join(new_name)
        })
        .find(|candidate| free(candidate.as_path()))
}

/// Like `Path::exists`, but a dangling symlink still occupies the name
fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Split filename into stem and extension at the last dot.
///
/// A leading dot starts a hidden name rather than an extension.
pub fn split_filename(filename: &str) -> (String, String) {
    match filename.rfind('.') {
        Some(dot_pos) if dot_pos > 0 => {
            let stem = filename[..dot_pos].to_string();
            let ext = filename[dot_pos + 1..].to_string();
            (stem, ext)
        }
        _ => (filename.to_string(), String::new()),
    }
}

/// Format duration in human-readable format
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Calculate the percentage of one number relative to another
pub fn calculate_percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_split_filename() {
        assert_eq!(split_filename("test.txt"), ("test".to_string(), "txt".to_string()));
        assert_eq!(split_filename("test"), ("test".to_string(), String::new()));
        assert_eq!(split_filename("test.tar.gz"), ("test.tar".to_string(), "gz".to_string()));
        assert_eq!(split_filename(".bashrc"), (".bashrc".to_string(), String::new()));
    }

    #[test]
    fn test_generate_unique_filename() {
        let dir = tempdir().unwrap();
        let dir_path = dir.path();

        let free = generate_unique_filename(dir_path, "report.txt").unwrap();
        assert_eq!(free.file_name().unwrap(), "report.txt");
        File::create(&free).unwrap();

        let unique_path = generate_unique_filename(dir_path, "report.txt").unwrap();
        assert_eq!(unique_path.file_name().unwrap(), "report_1.txt");
        File::create(&unique_path).unwrap();

        let unique_path2 = generate_unique_filename(dir_path, "report.txt").unwrap();
        assert_eq!(unique_path2.file_name().unwrap(), "report_2.txt");
    }

    #[test]
    fn test_unique_filename_skips_reserved_names() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("report.txt")).unwrap();

        let mut reserved = HashSet::new();
        reserved.insert(dir.path().join("report_1.txt"));

        let path = generate_unique_filename_excluding(dir.path(), "report.txt", &reserved).unwrap();
        assert_eq!(path.file_name().unwrap(), "report_2.txt");
    }

    #[test]
    fn test_unique_filename_without_extension() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("Makefile")).unwrap();

        let path = generate_unique_filename(dir.path(), "Makefile").unwrap();
        assert_eq!(path.file_name().unwrap(), "Makefile_1");
    }

    #[test]
    fn test_ensure_dir_exists() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        ensure_dir_exists(&nested).unwrap();
        assert!(nested.is_dir());
        ensure_dir_exists(&nested).unwrap();

        let file = dir.path().join("plain");
        File::create(&file).unwrap();
        assert!(matches!(
            ensure_dir_exists(&file),
            Err(ActionError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_is_within_respects_boundaries() {
        let prefix = Path::new("/data/tmp");
        assert!(is_within(Path::new("/data/tmp"), prefix));
        assert!(is_within(Path::new("/data/tmp/x/y.txt"), prefix));
        assert!(!is_within(Path::new("/data/tmpfile.txt"), prefix));
        assert!(!is_within(Path::new("/data"), prefix));
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("/a/./b/../c/")), PathBuf::from("/a/c"));
        assert!(normalize_path(Path::new("rel")).is_absolute());
    }

    #[test]
    fn test_epoch_seconds() {
        assert_eq!(epoch_seconds(UNIX_EPOCH + Duration::from_secs(42)), 42);
        assert_eq!(epoch_seconds(UNIX_EPOCH - Duration::from_secs(5)), -5);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn test_calculate_percentage() {
        assert_eq!(calculate_percentage(50, 100), 50.0);
        assert_eq!(calculate_percentage(0, 100), 0.0);
        assert_eq!(calculate_percentage(100, 0), 0.0);
    }
}
