use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use file_dedup::dedup::{analyze_duplicates, regroup};
use file_dedup::logging::init_logging;
use file_dedup::session::ScanPhase;
use file_dedup::utils::{format_duration, format_file_size};
use file_dedup::{
    perform_deduplication, snapshot, spawn_scan, ConfigError, DedupAction, DuplicateResultSet,
    Filter, FingerprintMode, KeepPolicy, Organize, ScanConfig, ScanReport, ScanSnapshot,
};

#[derive(Debug, Clone, ValueEnum)]
enum ActionType {
    /// List duplicate files without taking any action
    List,
    /// Delete duplicate files
    Delete,
    /// Move duplicate files to a specified directory
    Move,
    /// Create hard links for duplicate files
    Hardlink,
    /// Create symbolic links for duplicate files
    Symlink,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Hash only the first 1 MiB of each file
    Fast,
    /// Hash every byte with FNV-1a
    Exhaustive,
    /// Hash every byte with BLAKE3
    Thorough,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KeepArg {
    /// The first file discovered by the scan
    First,
    /// The file at --keep-index
    Index,
    /// The file with the oldest modification time
    Oldest,
    /// The file with the newest modification time
    Newest,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrganizeArg {
    Flat,
    Extension,
    Fingerprint,
}

#[derive(Parser)]
#[command(
    name = "dedup",
    version,
    about = "Find files with identical content and collapse the duplication",
    long_about = "Scan directories, group files with identical content, and delete, move, or link the duplicates while keeping one copy of each."
)]
struct Cli {
    /// Directories to scan (can be specified multiple times)
    #[arg(short, long, value_name = "PATH")]
    dir: Vec<PathBuf>,

    /// Only scan the top level of each directory
    #[arg(long)]
    no_recurse: bool,

    /// Skip this directory and everything below it (repeatable)
    #[arg(long, value_name = "PATH")]
    exclude: Vec<PathBuf>,

    /// How much of each file to fingerprint
    #[arg(long, value_enum, default_value = "fast")]
    mode: ModeArg,

    /// Minimum file size in bytes to consider (0 = no bound)
    #[arg(long, default_value = "0")]
    min_size: u64,

    /// Maximum file size in bytes to consider (0 = no bound)
    #[arg(long, default_value = "0")]
    max_size: u64,

    /// Only consider files whose name contains this text
    #[arg(long, value_name = "TEXT")]
    name: Option<String>,

    /// Match --name case-insensitively
    #[arg(long)]
    ignore_case: bool,

    /// File extensions to include (comma-separated)
    #[arg(long, value_delimiter = ',')]
    ext: Vec<String>,

    /// File extensions to exclude (comma-separated)
    #[arg(long, value_delimiter = ',')]
    exclude_ext: Vec<String>,

    /// Only files modified at or after this time (epoch seconds)
    #[arg(long, value_name = "SECS")]
    modified_after: Option<i64>,

    /// Only files modified at or before this time (epoch seconds)
    #[arg(long, value_name = "SECS")]
    modified_before: Option<i64>,

    /// Stop collecting after this many files (0 = unlimited)
    #[arg(long, default_value = "1000000")]
    max_files: usize,

    /// Visit directory entries in name order
    #[arg(long)]
    sorted: bool,

    /// Action to perform on duplicate files
    #[arg(short, long, value_enum, default_value = "list")]
    action: ActionType,

    /// Target directory for the move action
    #[arg(long, value_name = "PATH")]
    move_to: Option<PathBuf>,

    /// Subfolder layout for moved files
    #[arg(long, value_enum, default_value = "flat")]
    organize: OrganizeArg,

    /// Which file of each group to keep
    #[arg(long, value_enum, default_value = "first")]
    keep: KeepArg,

    /// Position of the kept file when --keep index is used (1 = first)
    #[arg(long, default_value = "1")]
    keep_index: usize,

    /// Show what would be done without making changes
    #[arg(long)]
    dry_run: bool,

    /// Skip confirmation prompts (use with caution)
    #[arg(short, long)]
    yes: bool,

    /// Print a size breakdown and recommendations
    #[arg(long)]
    analyze: bool,

    /// Save the scanned records to this file
    #[arg(long, value_name = "FILE")]
    save: Option<PathBuf>,

    /// Load records from a saved scan instead of scanning
    #[arg(long, value_name = "FILE", conflicts_with = "dir")]
    load: Option<PathBuf>,

    /// Increase log detail (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,

    /// Number of threads (0 = auto-detect)
    #[arg(long, default_value = "0")]
    threads: usize,
}

impl Cli {
    fn scan_config(&self) -> ScanConfig {
        let mut filters = Vec::new();
        if self.min_size > 0 || self.max_size > 0 {
            filters.push(Filter::size(self.min_size, self.max_size));
        }
        if let Some(name) = &self.name {
            filters.push(Filter::name(name.clone(), self.ignore_case));
        }
        if !self.ext.is_empty() {
            filters.push(Filter::extensions(&self.ext));
        }
        if !self.exclude_ext.is_empty() {
            filters.push(Filter::exclude_extensions(&self.exclude_ext));
        }
        if self.modified_after.is_some() || self.modified_before.is_some() {
            filters.push(Filter::Modified {
                min: self.modified_after,
                max: self.modified_before,
            });
        }

        ScanConfig {
            roots: self.dir.clone(),
            recurse: !self.no_recurse,
            exclusions: self.exclude.clone(),
            mode: match self.mode {
                ModeArg::Fast => FingerprintMode::Fast,
                ModeArg::Exhaustive => FingerprintMode::Exhaustive,
                ModeArg::Thorough => FingerprintMode::Thorough,
            },
            filters,
            max_records: (self.max_files > 0).then_some(self.max_files),
            sort_entries: self.sorted,
            show_progress: !self.quiet,
        }
    }

    fn keep_policy(&self) -> KeepPolicy {
        match self.keep {
            KeepArg::First => KeepPolicy::First,
            KeepArg::Index => KeepPolicy::Index(self.keep_index.saturating_sub(1)),
            KeepArg::Oldest => KeepPolicy::Oldest,
            KeepArg::Newest => KeepPolicy::Newest,
        }
    }

    fn dedup_action(&self) -> Result<Option<DedupAction>> {
        let action = match self.action {
            ActionType::List => return Ok(None),
            ActionType::Delete => DedupAction::Delete,
            ActionType::Move => {
                let Some(destination) = self.move_to.clone() else {
                    return Err(ConfigError::MissingDestination)
                        .context("--move-to is required when using move action");
                };
                DedupAction::Move {
                    destination,
                    organize: match self.organize {
                        OrganizeArg::Flat => Organize::Flat,
                        OrganizeArg::Extension => Organize::ByExtension,
                        OrganizeArg::Fingerprint => Organize::ByFingerprint,
                    },
                }
            }
            ActionType::Hardlink => DedupAction::Hardlink,
            ActionType::Symlink => DedupAction::Symlink,
        };
        Ok(Some(action))
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose, args.quiet);

    if args.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.threads)
            .build_global()
            .context("Failed to configure thread pool")?;
    }

    if args.dir.is_empty() && args.load.is_none() {
        eprintln!("{}", style("Error: At least one directory must be specified").red());
        std::process::exit(1);
    }

    // Validate the action before spending time on a scan
    let action = args.dedup_action()?;

    let (report, config) = match &args.load {
        Some(path) => {
            let snapshot = snapshot::load(path)
                .with_context(|| format!("Failed to load scan from {}", path.display()))?;
            println!(
                "{}",
                style(format!("📂 Loaded {} files from {}", snapshot.file_count, path.display())).cyan()
            );
            let mut config = snapshot.config;
            config.filters.extend(args.scan_config().filters);
            (regroup(snapshot.files, &config), config)
        }
        None => {
            println!("{}", style("🔍 Scanning directories for duplicate files...").cyan().bold());
            let config = args.scan_config();
            (run_scan(config.clone())?, config)
        }
    };

    if let Some(path) = &args.save {
        snapshot::save(path, &ScanSnapshot::new(config, report.records.clone()))
            .with_context(|| format!("Failed to save scan to {}", path.display()))?;
        println!("{}", style(format!("💾 Saved scan to {}", path.display())).cyan());
    }

    let result_set = report.result_set;
    if result_set.is_empty() {
        println!("{}", style("✅ No duplicate files found!").green().bold());
        return Ok(());
    }

    display_results(&result_set, args.verbose > 0);
    if args.analyze {
        analyze_duplicates(&result_set).print_analysis();
    }

    let Some(action) = action else {
        return Ok(());
    };

    if args.dry_run {
        println!("{}", style("🧪 Dry run mode - no changes will be made").yellow().bold());
    } else if !args.yes {
        let proceed = dialoguer::Confirm::new()
            .with_prompt("Do you want to proceed with the selected action?")
            .interact()?;

        if !proceed {
            println!("{}", style("Operation cancelled").yellow());
            return Ok(());
        }
    }

    let result = perform_deduplication(result_set, args.keep_policy(), &action, args.dry_run)?;
    if result.error_count() > 0 {
        std::process::exit(2);
    }

    Ok(())
}

/// Scan on a worker thread. A spinner covers the directory walk; the
/// scanner's own bar takes over while files are hashed.
fn run_scan(config: ScanConfig) -> Result<ScanReport> {
    let show_progress = config.show_progress;
    let handle = spawn_scan(config)?;

    let spinner = if show_progress {
        ProgressBar::new_spinner()
    } else {
        ProgressBar::hidden()
    };
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(spinner_style);
    }

    let report = loop {
        if let Some(result) = handle.try_result() {
            break result?;
        }

        let status = handle.status();
        match status.phase {
            ScanPhase::Starting | ScanPhase::Scanning => {
                spinner.set_message("Walking directories");
                spinner.tick();
            }
            ScanPhase::Hashing | ScanPhase::Grouping | ScanPhase::Finished | ScanPhase::Failed => {
                if !spinner.is_finished() {
                    spinner.finish_and_clear();
                }
            }
        }
        thread::sleep(Duration::from_millis(50));
    };
    spinner.finish_and_clear();

    if report.truncated {
        println!(
            "{}",
            style(format!("Warning: stopped after {} files; results are partial", report.records.len())).yellow()
        );
    }
    if report.skipped_directories > 0 {
        println!(
            "{}",
            style(format!("Warning: {} directories could not be read", report.skipped_directories)).yellow()
        );
    }
    println!("Scanned {} files in {}", report.records.len(), format_duration(report.elapsed));

    Ok(report)
}

fn display_results(result: &DuplicateResultSet, verbose: bool) {
    println!();
    println!("{}", style("📊 Duplicate Files Found").cyan().bold());
    println!("{}", style("=".repeat(40)).cyan());

    for (i, group) in result.groups.iter().enumerate() {
        if verbose {
            println!();
            println!(
                "{} {} ({}, {} wasted)",
                style(format!("Group {}:", i + 1)).bold(),
                group.fingerprint(),
                format_file_size(group.size()),
                format_file_size(group.wasted_space())
            );
            for (j, file) in group.members().iter().enumerate() {
                let marker = if j == 0 { "📄" } else { "🔗" };
                println!("  {} [{}] {} (modified {})", marker, j + 1, file.path.display(), file.modified);
            }
        } else {
            println!(
                "{} duplicate files for {} ({})",
                group.len() - 1,
                group.members()[0].path.file_name().unwrap_or_default().to_string_lossy(),
                format_file_size(group.wasted_space())
            );
        }
    }

    println!();
    println!("{}", style("📈 Summary").green().bold());
    println!("{}", style("-".repeat(20)).green());
    println!("Total files scanned: {}", result.total_files);
    if result.unreadable_files > 0 {
        println!("Unreadable files skipped: {}", result.unreadable_files);
    }
    println!("Duplicate groups: {}", result.groups.len());
    println!("Duplicate files found: {}", result.get_duplicate_count());
    println!("Potential space savings: {}", format_file_size(result.get_wasted_space()));
}
