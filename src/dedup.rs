use std::path::PathBuf;
use std::time::{Duration, Instant};
use anyhow::{Context, Result};
use console::style;
use humansize::{format_size, DECIMAL};

use crate::actions::{apply, ActionResult, DedupAction, KeepPolicy};
use crate::filter::apply_filters;
use crate::grouping::GroupingEngine;
use crate::scanner::{ScanConfig, Scanner};
use crate::{DuplicateResultSet, FileRecord};

/// Outcome of scanning and grouping
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Every record the scan produced, in discovery order
    pub records: Vec<FileRecord>,
    pub result_set: DuplicateResultSet,
    pub skipped_directories: usize,
    pub truncated: bool,
    pub elapsed: Duration,
}

/// Scan the configured roots and group what was found
pub fn find_duplicates(config: &ScanConfig) -> Result<ScanReport> {
    let started = Instant::now();

    let output = Scanner::with_config(config.clone())
        .scan()
        .context("Invalid scan configuration")?;
    let result_set = GroupingEngine::new().group(&output.records);

    Ok(ScanReport {
        records: output.records,
        result_set,
        skipped_directories: output.skipped_directories,
        truncated: output.truncated,
        elapsed: started.elapsed(),
    })
}

/// Regroup previously collected records, e.g. from a loaded snapshot.
///
/// The filter list is re-applied so a narrower filter can be tried without
/// rescanning.
pub fn regroup(records: Vec<FileRecord>, config: &ScanConfig) -> ScanReport {
    let started = Instant::now();
    let records = apply_filters(records, &config.filters);
    let result_set = GroupingEngine::new().group(&records);

    ScanReport {
        records,
        result_set,
        elapsed: started.elapsed(),
        ..ScanReport::default()
    }
}

/// Perform deduplication on the scan results
pub fn perform_deduplication(
    result_set: DuplicateResultSet,
    keep: KeepPolicy,
    action: &DedupAction,
    dry_run: bool,
) -> Result<ActionResult> {
    let action_name = match action {
        DedupAction::Delete => "Deleting",
        DedupAction::Move { .. } => "Moving",
        DedupAction::Hardlink => "Creating hardlinks for",
        DedupAction::Symlink => "Creating symlinks for",
    };

    println!();
    let suffix = if dry_run {
        style(" (DRY RUN)").yellow().to_string()
    } else {
        String::new()
    };
    println!(
        "{}{}",
        style(format!("🔄 {} duplicate files...", action_name)).cyan().bold(),
        suffix
    );

    for (i, group) in result_set.groups.iter().enumerate() {
        let keeper = &group.members()[keep.select(group)];
        println!();
        println!(
            "{} {} ({})",
            style(format!("Processing group {}:", i + 1)).bold(),
            short_fingerprint(&group.fingerprint().to_string()),
            format_size(group.size(), DECIMAL)
        );
        println!("  📄 Keeping: {}", keeper.path.display());
    }

    let result = apply(result_set, keep, action, dry_run)
        .with_context(|| format!("Cannot {} duplicates", action.name()))?;

    result.print_summary();

    if !dry_run {
        println!();
        println!("{}", style("✅ Deduplication complete!").green().bold());
    }

    Ok(result)
}

fn short_fingerprint(hex: &str) -> &str {
    &hex[..hex.len().min(12)]
}

/// Analyze the scan results and provide recommendations
pub fn analyze_duplicates(result_set: &DuplicateResultSet) -> DedupAnalysis {
    let mut analysis = DedupAnalysis::new();

    for group in &result_set.groups {
        let file_size = group.size();
        let duplicate_count = group.len() - 1;
        let group_waste = group.wasted_space();

        analysis.total_groups += 1;
        analysis.total_duplicates += duplicate_count;
        analysis.total_wasted_space += group_waste;

        match file_size {
            0..=1024 => analysis.small_files += duplicate_count,
            1025..=1048576 => analysis.medium_files += duplicate_count,
            _ => analysis.large_files += duplicate_count,
        }

        if group_waste > analysis.largest_waste.1 {
            analysis.largest_waste = (group.members()[0].path.clone(), group_waste);
        }
    }

    analysis
}

/// Analysis results for duplicate files
#[derive(Debug, Default)]
pub struct DedupAnalysis {
    pub total_groups: usize,
    pub total_duplicates: usize,
    pub total_wasted_space: u64,
    pub small_files: usize,    // <= 1KB
    pub medium_files: usize,   // 1KB - 1MB
    pub large_files: usize,    // > 1MB
    pub largest_waste: (PathBuf, u64),
}

impl DedupAnalysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn print_analysis(&self) {
        println!();
        println!("{}", style("🔍 Duplicate Analysis").cyan().bold());
        println!("{}", style("=".repeat(30)).cyan());

        println!("Duplicate groups found: {}", self.total_groups);
        println!("Total duplicate files: {}", self.total_duplicates);
        println!("Total wasted space: {}", format_size(self.total_wasted_space, DECIMAL));

        println!();
        println!("{}", style("📊 File Size Distribution:").bold());
        println!("  Small files (≤1KB): {}", self.small_files);
        println!("  Medium files (1KB-1MB): {}", self.medium_files);
        println!("  Large files (>1MB): {}", self.large_files);

        if self.largest_waste.1 > 0 {
            println!();
            println!("{}", style("🎯 Largest opportunity:").bold());
            println!("  File: {}", self.largest_waste.0.display());
            println!("  Potential savings: {}", format_size(self.largest_waste.1, DECIMAL));
        }

        println!();
        println!("{}", style("💡 Recommendations:").green().bold());

        if self.large_files > 0 {
            println!("  • Focus on large files first for maximum space savings");
        }

        if self.total_duplicates > 100 {
            println!("  • Consider using hardlinks to save space without losing data");
        }

        println!("  • Always use --dry-run first to preview changes");
    }
}
