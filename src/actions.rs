use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use console::style;
use humansize::{format_size, DECIMAL};

use crate::error::{ActionError, ConfigError};
use crate::utils::{ensure_dir_exists, generate_unique_filename, generate_unique_filename_excluding};
use crate::{DuplicateGroup, DuplicateResultSet, FileRecord};

/// Which member of a group survives an action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeepPolicy {
    /// Whichever file the scan visited first
    #[default]
    First,
    /// Fixed position in the group; out-of-range positions fall back to 0
    Index(usize),
    /// Earliest modification time, first discovered on ties
    Oldest,
    /// Latest modification time, first discovered on ties
    Newest,
}

impl KeepPolicy {
    pub fn select(&self, group: &DuplicateGroup) -> usize {
        let members = group.members();
        match *self {
            KeepPolicy::First => 0,
            KeepPolicy::Index(index) if index < members.len() => index,
            KeepPolicy::Index(index) => {
                log::warn!(
                    "Keep index {} is out of range for a group of {}; keeping the first file",
                    index,
                    members.len()
                );
                0
            }
            KeepPolicy::Oldest => pick_first_by(members, |candidate, best| candidate < best),
            KeepPolicy::Newest => pick_first_by(members, |candidate, best| candidate > best),
        }
    }
}

fn pick_first_by(members: &[FileRecord], better: impl Fn(i64, i64) -> bool) -> usize {
    members
        .iter()
        .enumerate()
        .skip(1)
        .fold(0, |best, (i, member)| {
            if better(member.modified, members[best].modified) {
                i
            } else {
                best
            }
        })
}

/// How moved duplicates are laid out under the destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Organize {
    #[default]
    Flat,
    /// One subdirectory per extension, `no_extension` for the rest
    ByExtension,
    /// One subdirectory per group fingerprint
    ByFingerprint,
}

/// Actions that can be performed on duplicate files
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupAction {
    /// Delete duplicate files
    Delete,
    /// Move duplicate files into a destination directory
    Move { destination: PathBuf, organize: Organize },
    /// Replace duplicates with hard links to the kept file
    Hardlink,
    /// Replace duplicates with symbolic links to the kept file
    Symlink,
}

impl DedupAction {
    pub fn name(&self) -> &'static str {
        match self {
            DedupAction::Delete => "delete",
            DedupAction::Move { .. } => "move",
            DedupAction::Hardlink => "hardlink",
            DedupAction::Symlink => "symlink",
        }
    }
}

/// Result of performing actions on files
#[derive(Debug, Clone, Default)]
pub struct ActionResult {
    pub operations: Vec<FileOperation>,
    pub total_space_saved: u64,
    pub total_files_processed: usize,
}

/// Represents a single file operation
#[derive(Debug, Clone)]
pub struct FileOperation {
    pub path: PathBuf,
    pub action: &'static str,
    /// Where the file went (move) or what it now points at (links)
    pub destination: Option<PathBuf>,
    pub success: bool,
    pub error: Option<String>,
    pub space_saved: u64,
}

impl ActionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_operation(&mut self, operation: FileOperation) {
        self.total_space_saved += operation.space_saved;
        self.total_files_processed += 1;
        self.operations.push(operation);
    }

    pub fn merge(&mut self, other: ActionResult) {
        for operation in other.operations {
            self.add_operation(operation);
        }
    }

    pub fn success_count(&self) -> usize {
        self.operations.iter().filter(|op| op.success).count()
    }

    pub fn error_count(&self) -> usize {
        self.operations.iter().filter(|op| !op.success).count()
    }

    pub fn print_summary(&self) {
        println!();
        println!("{}", style("📊 Action Summary").green().bold());
        println!("{}", style("-".repeat(20)).green());
        println!("Files processed: {}", self.total_files_processed);
        println!("Successful operations: {}", self.success_count());
        println!("Failed operations: {}", self.error_count());
        println!("Total space saved: {}", format_size(self.total_space_saved, DECIMAL));

        if self.error_count() > 0 {
            println!();
            println!("{}", style("❌ Errors:").red().bold());
            for op in &self.operations {
                if let (false, Some(error)) = (op.success, &op.error) {
                    println!("  {}: {}", op.path.display(), error);
                }
            }
        }
    }
}

/// Apply `action` to every member of every group except its keeper.
///
/// Takes the result set by value: once files have been touched its paths are
/// stale, so the caller must scan again before acting again.
///
/// Only configuration problems (an unusable move destination) are returned
/// as errors, and only before any file is touched. Per-file failures are
/// recorded in the returned [`ActionResult`] and processing continues.
pub fn apply(
    result_set: DuplicateResultSet,
    keep: KeepPolicy,
    action: &DedupAction,
    dry_run: bool,
) -> Result<ActionResult, ConfigError> {
    if let DedupAction::Move { destination, .. } = action {
        prepare_destination(destination, dry_run)?;
    }

    let mut result = ActionResult::new();
    let mut reserved = HashSet::new();
    for group in &result_set.groups {
        result.merge(act_on_group(group, keep, action, dry_run, &mut reserved));
    }

    log::info!(
        "{}: {} succeeded, {} failed",
        action.name(),
        result.success_count(),
        result.error_count()
    );

    Ok(result)
}

fn prepare_destination(destination: &Path, dry_run: bool) -> Result<(), ConfigError> {
    match fs::metadata(destination) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(ConfigError::DestinationNotDirectory(destination.to_path_buf())),
        Err(_) if dry_run => Ok(()),
        Err(_) => fs::create_dir_all(destination).map_err(|source| {
            ConfigError::DestinationUncreatable {
                path: destination.to_path_buf(),
                source,
            }
        }),
    }
}

/// Performs the specified action on one group's duplicates
pub fn perform_action(
    group: &DuplicateGroup,
    keep: KeepPolicy,
    action: &DedupAction,
    dry_run: bool,
) -> ActionResult {
    act_on_group(group, keep, action, dry_run, &mut HashSet::new())
}

/// `reserved` collects dry-run move targets so later previews in the same
/// pass do not claim the same name.
fn act_on_group(
    group: &DuplicateGroup,
    keep: KeepPolicy,
    action: &DedupAction,
    dry_run: bool,
    reserved: &mut HashSet<PathBuf>,
) -> ActionResult {
    let mut result = ActionResult::new();
    let keeper_index = keep.select(group);
    let keeper = &group.members()[keeper_index];

    for (i, duplicate) in group.members().iter().enumerate() {
        if i == keeper_index {
            continue;
        }

        let outcome = if duplicate.path == keeper.path {
            Err(ActionError::SameAsKept(duplicate.path.clone()))
        } else if dry_run {
            preview(group, keeper, duplicate, action, reserved)
        } else {
            execute(group, keeper, duplicate, action)
        };

        let operation = match outcome {
            Ok(destination) => {
                log_success(duplicate, destination.as_deref(), action, dry_run);
                FileOperation {
                    path: duplicate.path.clone(),
                    action: action.name(),
                    destination,
                    success: true,
                    error: None,
                    space_saved: duplicate.size,
                }
            }
            Err(e) => {
                log::warn!("Failed to {} {}: {}", action.name(), duplicate.path.display(), e);
                FileOperation {
                    path: duplicate.path.clone(),
                    action: action.name(),
                    destination: None,
                    success: false,
                    error: Some(e.to_string()),
                    space_saved: 0,
                }
            }
        };

        result.add_operation(operation);
    }

    result
}

fn log_success(
    duplicate: &FileRecord,
    destination: Option<&Path>,
    action: &DedupAction,
    dry_run: bool,
) {
    let verb = if dry_run { "Would" } else { "Did" };
    match destination {
        Some(destination) => log::info!(
            "{} {}: {} -> {}",
            verb,
            action.name(),
            duplicate.path.display(),
            destination.display()
        ),
        None => log::info!("{} {}: {}", verb, action.name(), duplicate.path.display()),
    }
}

fn execute(
    group: &DuplicateGroup,
    keeper: &FileRecord,
    duplicate: &FileRecord,
    action: &DedupAction,
) -> Result<Option<PathBuf>, ActionError> {
    match action {
        DedupAction::Delete => {
            fs::remove_file(&duplicate.path).map_err(|e| ActionError::io(&duplicate.path, e))?;
            Ok(None)
        }
        DedupAction::Move {
            destination,
            organize,
        } => {
            let folder = destination_folder(destination, *organize, group, duplicate);
            ensure_dir_exists(&folder)?;
            let target = destination_path(&folder, duplicate)?;
            fs::rename(&duplicate.path, &target).map_err(|e| ActionError::io(&duplicate.path, e))?;
            Ok(Some(target))
        }
        DedupAction::Hardlink => {
            replace_with_link(&keeper.path, &duplicate.path, |original, link| {
                fs::hard_link(original, link)
            })?;
            Ok(Some(keeper.path.clone()))
        }
        DedupAction::Symlink => {
            replace_with_link(&keeper.path, &duplicate.path, create_symlink)?;
            Ok(Some(keeper.path.clone()))
        }
    }
}

fn preview(
    group: &DuplicateGroup,
    keeper: &FileRecord,
    duplicate: &FileRecord,
    action: &DedupAction,
    reserved: &mut HashSet<PathBuf>,
) -> Result<Option<PathBuf>, ActionError> {
    match action {
        DedupAction::Delete => Ok(None),
        DedupAction::Move {
            destination,
            organize,
        } => {
            let folder = destination_folder(destination, *organize, group, duplicate);
            if fs::metadata(&folder).is_ok_and(|metadata| !metadata.is_dir()) {
                return Err(ActionError::NotADirectory(folder));
            }
            let name = file_name(duplicate)?;
            let target = generate_unique_filename_excluding(&folder, &name, reserved)
                .ok_or_else(|| ActionError::NameExhausted(folder.join(&name)))?;
            reserved.insert(target.clone());
            Ok(Some(target))
        }
        DedupAction::Hardlink | DedupAction::Symlink => Ok(Some(keeper.path.clone())),
    }
}

fn destination_folder(
    destination: &Path,
    organize: Organize,
    group: &DuplicateGroup,
    duplicate: &FileRecord,
) -> PathBuf {
    match organize {
        Organize::Flat => destination.to_path_buf(),
        Organize::ByExtension => {
            let ext = duplicate
                .path
                .extension()
                .map(|ext| ext.to_string_lossy().to_lowercase())
                .unwrap_or_else(|| "no_extension".to_string());
            destination.join(ext)
        }
        Organize::ByFingerprint => destination.join(group.fingerprint().to_string()),
    }
}

fn file_name(duplicate: &FileRecord) -> Result<String, ActionError> {
    duplicate
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| ActionError::MissingFileName(duplicate.path.clone()))
}

fn destination_path(folder: &Path, duplicate: &FileRecord) -> Result<PathBuf, ActionError> {
    let name = file_name(duplicate)?;
    generate_unique_filename(folder, &name)
        .ok_or_else(|| ActionError::NameExhausted(folder.join(&name)))
}

/// Swap `duplicate` for a link to `original`.
///
/// The link is made under a temporary sibling name and renamed over the
/// duplicate, so the duplicate is untouched if linking fails.
fn replace_with_link(
    original: &Path,
    duplicate: &Path,
    link: impl Fn(&Path, &Path) -> io::Result<()>,
) -> Result<(), ActionError> {
    let parent = duplicate.parent().unwrap_or_else(|| Path::new("."));
    let name = duplicate
        .file_name()
        .ok_or_else(|| ActionError::MissingFileName(duplicate.to_path_buf()))?
        .to_string_lossy()
        .into_owned();

    let temp = generate_unique_filename(parent, &format!(".{}.dedup-link", name))
        .ok_or_else(|| ActionError::NameExhausted(duplicate.to_path_buf()))?;

    link(original, &temp).map_err(|e| ActionError::io(duplicate, e))?;

    if let Err(e) = fs::rename(&temp, duplicate) {
        if let Err(cleanup) = fs::remove_file(&temp) {
            log::warn!("Failed to remove temporary link {}: {}", temp.display(), cleanup);
        }
        return Err(ActionError::io(duplicate, e));
    }

    Ok(())
}

fn create_symlink(original: &Path, link: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(original, link)
    }
    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_file(original, link)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (original, link);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "symbolic links are not supported on this platform",
        ))
    }
}
