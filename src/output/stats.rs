//! Statistics generation from the archive ledger
//!
//! This module provides functionality for extracting and displaying
//! archive statistics from an output directory.

use crate::ledger::{self, ResultLog};
use crate::Result;
use std::path::Path;

/// Counts for one (group, kind) result log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupStatistics {
    pub group: String,
    pub kind: String,
    pub snapshots: usize,
    pub failures: usize,
    /// Snapshots missing their screenshot or markup
    pub partial: usize,
}

/// Archive statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveStatistics {
    /// Per (group, kind) counts, sorted by group then kind
    pub groups: Vec<GroupStatistics>,

    /// Size of the Done Set
    pub done_urls: usize,
}

impl ArchiveStatistics {
    pub fn total_snapshots(&self) -> usize {
        self.groups.iter().map(|g| g.snapshots).sum()
    }

    pub fn total_failures(&self) -> usize {
        self.groups.iter().map(|g| g.failures).sum()
    }

    /// Builds statistics from already loaded result logs
    pub fn from_logs(logs: &[ResultLog], done_urls: usize) -> Self {
        let groups = logs
            .iter()
            .map(|log| GroupStatistics {
                group: log.group.clone(),
                kind: log.kind.clone(),
                snapshots: log.snapshot_count(),
                failures: log.failure_count(),
                partial: log
                    .records
                    .iter()
                    .filter_map(|r| r.as_snapshot())
                    .filter(|s| !s.html_saved || !s.png_saved)
                    .count(),
            })
            .collect();

        Self { groups, done_urls }
    }
}

/// Loads statistics for an output directory
///
/// # Arguments
///
/// * `output_dir` - The archive's output directory
///
/// # Returns
///
/// * `Ok(ArchiveStatistics)` - Successfully loaded statistics
/// * `Err(ArchiveError)` - A ledger file could not be read
pub fn load_statistics(output_dir: &Path) -> Result<ArchiveStatistics> {
    let logs = ledger::load_all_logs(output_dir)?;
    let done = ledger::load_done_set(output_dir)?;
    Ok(ArchiveStatistics::from_logs(&logs, done.len()))
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &ArchiveStatistics) {
    println!("=== Archive Statistics ===\n");

    println!("Overview:");
    println!("  Done URLs: {}", stats.done_urls);
    println!("  Snapshots: {}", stats.total_snapshots());
    println!("  Failures: {}", stats.total_failures());
    println!();

    if stats.groups.is_empty() {
        println!("No result logs found.");
        return;
    }

    println!("By Group:");
    for g in &stats.groups {
        print!(
            "  {}/{}: {} snapshots, {} failures",
            g.group, g.kind, g.snapshots, g.failures
        );
        if g.partial > 0 {
            print!(" ({} partial)", g.partial);
        }
        println!();
    }
    println!();

    let attempts = stats.total_snapshots() + stats.total_failures();
    let success_rate = if attempts > 0 {
        (stats.total_snapshots() as f64 / attempts as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} targets archived)",
        success_rate,
        stats.total_snapshots(),
        attempts
    );
}
