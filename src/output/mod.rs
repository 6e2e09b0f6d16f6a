//! Output module for reporting on an archive
//!
//! This module handles:
//! - Recording archive statistics from the ledger
//! - Generating a markdown index of snapshots and failures

mod markdown;
pub mod stats;

pub use markdown::{format_markdown_index, generate_markdown_index, INDEX_FILE};
pub use stats::{load_statistics, print_statistics, ArchiveStatistics, GroupStatistics};
