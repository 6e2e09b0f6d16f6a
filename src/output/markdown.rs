//! Markdown index generation
//!
//! This module renders a browsable markdown index of an archive: every
//! snapshot grouped by (group, kind) with links to its files, followed by the
//! targets that failed.

use super::stats::ArchiveStatistics;
use crate::ledger::{self, ArchiveRecord, ResultLog};
use crate::Result;
use std::path::Path;

/// File name of the index inside the output directory
pub const INDEX_FILE: &str = "index.md";

/// Writes `{output_dir}/index.md` and returns its path
///
/// # Arguments
///
/// * `output_dir` - The archive's output directory
///
/// # Returns
///
/// * `Ok(PathBuf)` - Where the index was written
/// * `Err(ArchiveError)` - Failed to read the ledger or write the file
pub fn generate_markdown_index(output_dir: &Path) -> Result<std::path::PathBuf> {
    let logs = ledger::load_all_logs(output_dir)?;
    let done = ledger::load_done_set(output_dir)?;
    let stats = ArchiveStatistics::from_logs(&logs, done.len());

    let markdown = format_markdown_index(&logs, &stats, output_dir);
    let path = output_dir.join(INDEX_FILE);
    std::fs::write(&path, markdown)?;

    Ok(path)
}

/// Formats result logs as a markdown index
///
/// File links are made relative to `output_dir` where possible.
pub fn format_markdown_index(logs: &[ResultLog], stats: &ArchiveStatistics, output_dir: &Path) -> String {
    let mut md = String::new();

    md.push_str("# Forum Archive Index\n\n");
    md.push_str(&format!(
        "_Generated {}_\n\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    ));

    md.push_str("## Overview\n\n");
    md.push_str(&format!("- **Done URLs**: {}\n", stats.done_urls));
    md.push_str(&format!("- **Snapshots**: {}\n", stats.total_snapshots()));
    md.push_str(&format!("- **Failures**: {}\n\n", stats.total_failures()));

    if !stats.groups.is_empty() {
        md.push_str("| Group | Kind | Snapshots | Failures |\n");
        md.push_str("|-------|------|-----------|----------|\n");
        for g in &stats.groups {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                g.group, g.kind, g.snapshots, g.failures
            ));
        }
        md.push('\n');
    }

    for log in logs {
        let snapshots: Vec<_> = log.records.iter().filter_map(ArchiveRecord::as_snapshot).collect();
        if snapshots.is_empty() {
            continue;
        }

        md.push_str(&format!("## {} / {}\n\n", log.group, log.kind));
        for s in snapshots {
            md.push_str(&format!(
                "{}. [{}]({}): ",
                s.index,
                escape_brackets(&s.title),
                s.url
            ));

            let mut files = Vec::new();
            if s.html_saved {
                files.push(format!("[html]({})", relative(&s.html, output_dir)));
            }
            if s.png_saved {
                files.push(format!("[png]({})", relative(&s.png, output_dir)));
            }
            if files.is_empty() {
                md.push_str("_no files saved_");
            } else {
                md.push_str(&files.join(" · "));
            }
            md.push('\n');
        }
        md.push('\n');
    }

    let failures: Vec<_> = logs
        .iter()
        .flat_map(|log| {
            log.records
                .iter()
                .filter_map(ArchiveRecord::as_failure)
                .map(move |f| (log, f))
        })
        .collect();

    if !failures.is_empty() {
        md.push_str("## Failures\n\n");
        md.push_str("| Group | Kind | URL | Error |\n");
        md.push_str("|-------|------|-----|-------|\n");
        for (log, f) in failures {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                log.group,
                log.kind,
                f.url,
                f.error.replace('|', "\\|")
            ));
        }
        md.push('\n');
    }

    md
}

fn relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn escape_brackets(title: &str) -> String {
    title.replace('[', "\\[").replace(']', "\\]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Ledger, Snapshot, SCHEMA_VERSION};
    use tempfile::TempDir;

    #[test]
    fn test_generate_markdown_index() {
        let dir = TempDir::new().unwrap();
        let mut ledger = Ledger::open(dir.path()).unwrap();
        ledger
            .record_success(
                "topics_live",
                "topics",
                Snapshot {
                    schema: SCHEMA_VERSION,
                    url: "https://www.thetechgame.com/Forums/t=1/x.html".to_string(),
                    final_url: None,
                    title: "[Release] Thing".to_string(),
                    html: dir.path().join("html/topics_live/topics/00001__Release_Thing.html"),
                    png: dir.path().join("screenshots/topics_live/topics/00001__Release_Thing.png"),
                    index: 1,
                    html_saved: true,
                    png_saved: false,
                },
            )
            .unwrap();
        ledger
            .record_failure(
                "topics_live",
                "topics",
                "https://www.thetechgame.com/Forums/t=2/y.html",
                "failed to load | timeout",
            )
            .unwrap();

        let path = generate_markdown_index(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("index.md"));

        let md = std::fs::read_to_string(path).unwrap();
        assert!(md.contains("## topics_live / topics"));
        assert!(md.contains(
            "1. [\\[Release\\] Thing](https://www.thetechgame.com/Forums/t=1/x.html): \
             [html](html/topics_live/topics/00001__Release_Thing.html)\n"
        ));
        assert!(!md.contains("[png]"));
        assert!(md.contains("## Failures"));
        assert!(md.contains("failed to load \\| timeout"));
        assert!(md.contains("| topics_live | topics | 1 | 1 |"));
    }

    #[test]
    fn test_empty_archive_index() {
        let dir = TempDir::new().unwrap();
        let path = generate_markdown_index(dir.path()).unwrap();
        let md = std::fs::read_to_string(path).unwrap();
        assert!(md.contains("- **Snapshots**: 0"));
        assert!(!md.contains("## Failures"));
    }
}
