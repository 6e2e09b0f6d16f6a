//! Snapshot capture: full-page screenshot plus rendered markup

use crate::browser::{Browser, BrowserError};
use crate::context::RunContext;
use crate::ledger::{Snapshot, SCHEMA_VERSION};
use crate::url::{safe_filename, DEFAULT_SLUG_LEN};
use crate::ArchiveError;
use std::path::{Path, PathBuf};

/// Where a capture goes in the archive
#[derive(Debug, Clone, Copy)]
pub struct CaptureTarget<'a> {
    pub group: &'a str,
    pub kind: &'a str,
    /// Sequence index within (group, kind)
    pub index: u32,
    /// The URL that was scheduled
    pub url: &'a str,
    /// The URL the tab ended on
    pub final_url: &'a str,
}

/// Output paths for one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub png: PathBuf,
    pub html: PathBuf,
}

impl SnapshotPaths {
    /// `{out}/screenshots/{group}/{kind}/{index:05}__{slug}.png` and the
    /// matching `html/` path
    pub fn new(output_dir: &Path, group: &str, kind: &str, index: u32, title: &str) -> Self {
        let base = format!("{:05}__{}", index, safe_filename(title, DEFAULT_SLUG_LEN));
        Self {
            png: output_dir
                .join("screenshots")
                .join(group)
                .join(kind)
                .join(format!("{}.png", base)),
            html: output_dir
                .join("html")
                .join(group)
                .join(kind)
                .join(format!("{}.html", base)),
        }
    }
}

/// Captures the page currently showing
///
/// The screenshot and the markup are attempted independently; either failing
/// is logged and reflected in the snapshot's `png_saved`/`html_saved` flags.
/// A closed session aborts the capture.
pub async fn capture_snapshot(
    browser: &mut dyn Browser,
    ctx: &RunContext,
    output_dir: &Path,
    target: CaptureTarget<'_>,
) -> Result<Snapshot, ArchiveError> {
    let title = match browser.title().await {
        Ok(title) if !title.trim().is_empty() => title,
        Ok(_) => "untitled".to_string(),
        Err(e) if e.is_session_closed() => return Err(e.into()),
        Err(_) => "untitled".to_string(),
    };

    let paths = SnapshotPaths::new(output_dir, target.group, target.kind, target.index, &title);
    for path in [&paths.png, &paths.html] {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let png_saved = match browser.capture_full_page_image(&paths.png).await {
        Ok(()) => true,
        Err(e) => {
            fail_unless_open(e, ctx, "Screenshot failed")?;
            false
        }
    };

    let html_saved = match browser.capture_markup().await {
        Ok(markup) => match std::fs::write(&paths.html, markup) {
            Ok(()) => true,
            Err(e) => {
                ctx.warn(format!("HTML save failed: {}", e));
                false
            }
        },
        Err(e) => {
            fail_unless_open(e, ctx, "HTML save failed")?;
            false
        }
    };

    let final_url = (target.final_url != target.url).then(|| target.final_url.to_string());

    Ok(Snapshot {
        schema: SCHEMA_VERSION,
        url: target.url.to_string(),
        final_url,
        title,
        html: paths.html,
        png: paths.png,
        index: target.index,
        html_saved,
        png_saved,
    })
}

fn fail_unless_open(err: BrowserError, ctx: &RunContext, what: &str) -> Result<(), ArchiveError> {
    if err.is_session_closed() {
        return Err(err.into());
    }
    ctx.warn(format!("{}: {}", what, err));
    Ok(())
}
