use std::collections::BTreeSet;
use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::FileRecord;

/// A predicate over file metadata, applied before grouping.
///
/// Bounds are inclusive; `None` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Size { min: Option<u64>, max: Option<u64> },
    /// Substring of the base name
    Name { needle: String, case_insensitive: bool },
    /// Extension must be one of these (stored lowercase)
    Extension(BTreeSet<String>),
    /// Extension must not be any of these (stored lowercase)
    ExcludeExtension(BTreeSet<String>),
    Modified { min: Option<i64>, max: Option<i64> },
}

/// The metadata a filter looks at.
pub(crate) trait FilterSubject {
    fn path(&self) -> &Path;
    fn size(&self) -> u64;
    fn modified(&self) -> i64;
}

impl FilterSubject for FileRecord {
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

impl Filter {
    /// Size range where a zero bound means "no bound"
    pub fn size(min: u64, max: u64) -> Self {
        Filter::Size {
            min: (min > 0).then_some(min),
            max: (max > 0).then_some(max),
        }
    }

    /// Modification range in epoch seconds where a zero bound means "no bound"
    pub fn modified(min: i64, max: i64) -> Self {
        Filter::Modified {
            min: (min != 0).then_some(min),
            max: (max != 0).then_some(max),
        }
    }

    pub fn name(needle: impl Into<String>, case_insensitive: bool) -> Self {
        Filter::Name {
            needle: needle.into(),
            case_insensitive,
        }
    }

    pub fn extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Filter::Extension(normalize_extensions(extensions))
    }

    pub fn exclude_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Filter::ExcludeExtension(normalize_extensions(extensions))
    }

    pub fn matches(&self, record: &FileRecord) -> bool {
        self.matches_subject(record)
    }

    pub(crate) fn matches_subject<T: FilterSubject + ?Sized>(&self, subject: &T) -> bool {
        match self {
            Filter::Size { min, max } => in_range(subject.size(), *min, *max),
            Filter::Modified { min, max } => in_range(subject.modified(), *min, *max),
            Filter::Name {
                needle,
                case_insensitive,
            } => {
                let name = base_name(subject.path());
                if *case_insensitive {
                    name.to_lowercase().contains(&needle.to_lowercase())
                } else {
                    name.contains(needle.as_str())
                }
            }
            Filter::Extension(allowed) => {
                extension_of(subject.path()).is_some_and(|ext| allowed.contains(&ext))
            }
            Filter::ExcludeExtension(denied) => {
                extension_of(subject.path()).map_or(true, |ext| !denied.contains(&ext))
            }
        }
    }
}

/// True when `record` satisfies every filter in the list
pub fn passes(record: &FileRecord, filters: &[Filter]) -> bool {
    passes_subject(record, filters)
}

pub(crate) fn passes_subject<T: FilterSubject + ?Sized>(subject: &T, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| filter.matches_subject(subject))
}

/// Drop every record that fails the filter list, keeping order
pub fn apply_filters(records: Vec<FileRecord>, filters: &[Filter]) -> Vec<FileRecord> {
    if filters.is_empty() {
        return records;
    }

    records
        .into_iter()
        .filter(|record| passes(record, filters))
        .collect()
}

fn in_range<T: PartialOrd>(value: T, min: Option<T>, max: Option<T>) -> bool {
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lowercased text after the last dot of the base name
fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

fn normalize_extensions<I, S>(extensions: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}
