//! Archive ledger: the Done Set plus one result log per (group, kind)
//!
//! Every mutation is written through to disk before returning, so an
//! interrupted run loses at most the record that was in flight. Files live in
//! `{output}/meta/`:
//!
//! - `done_urls.json`: `{"done": [sorted urls]}`
//! - `{group}__{kind}__results.json`: ordered array of [`ArchiveRecord`]s

mod done_set;
mod records;

pub use done_set::DoneSet;
pub use records::{parse_records, ArchiveRecord, Failure, Snapshot, SCHEMA_VERSION};

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the persisted Done Set
pub const DONE_FILE: &str = "done_urls.json";

const RESULTS_SUFFIX: &str = "__results.json";

/// Errors from reading or writing the ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported record schema version {0}")]
    UnsupportedSchema(u32),
}

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// One (group, kind) result log as found on disk
#[derive(Debug, Clone)]
pub struct ResultLog {
    pub group: String,
    pub kind: String,
    pub records: Vec<ArchiveRecord>,
}

impl ResultLog {
    pub fn snapshot_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_snapshot()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.records.len() - self.snapshot_count()
    }
}

/// Something the ledger did on its own that belongs in the run log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerNotice {
    /// A non-empty Done Set was found on open
    Resumed { done: usize },
    /// An unreadable file was renamed to `moved_to` and treated as empty
    Quarantined {
        path: PathBuf,
        moved_to: PathBuf,
        reason: String,
    },
}

impl LedgerNotice {
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Quarantined { .. })
    }
}

impl fmt::Display for LedgerNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resumed { done } => write!(f, "Resuming - already archived {} URLs", done),
            Self::Quarantined {
                path,
                moved_to,
                reason,
            } => write!(
                f,
                "Unreadable ledger file {} ({}); moved to {}",
                path.display(),
                reason,
                moved_to.display()
            ),
        }
    }
}

/// Resumable archive ledger for one output directory
#[derive(Debug)]
pub struct Ledger {
    meta_dir: PathBuf,
    done: DoneSet,
    logs: HashMap<(String, String), Vec<ArchiveRecord>>,
    notices: Vec<LedgerNotice>,
}

impl Ledger {
    /// Opens (or creates) the ledger under `{output_dir}/meta`
    ///
    /// A Done Set that cannot be parsed is moved aside and replaced by an
    /// empty one rather than aborting the run. Both that and a resume are
    /// reported through [`Ledger::take_notices`].
    pub fn open(output_dir: &Path) -> LedgerResult<Self> {
        let meta_dir = meta_dir(output_dir);
        std::fs::create_dir_all(&meta_dir)?;

        let mut notices = Vec::new();
        let done_path = meta_dir.join(DONE_FILE);
        let done = match DoneSet::load(&done_path) {
            Ok(done) => done,
            Err(LedgerError::Json(e)) => {
                notices.push(quarantine(&done_path, &e)?);
                DoneSet::empty(&done_path)
            }
            Err(e) => return Err(e),
        };

        if !done.is_empty() {
            notices.push(LedgerNotice::Resumed { done: done.len() });
        }

        Ok(Self {
            meta_dir,
            done,
            logs: HashMap::new(),
            notices,
        })
    }

    /// Drains the notices raised since the last call
    pub fn take_notices(&mut self) -> Vec<LedgerNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    pub fn is_done(&self, url: &str) -> bool {
        self.done.contains(url)
    }

    pub fn done_count(&self) -> usize {
        self.done.len()
    }

    /// Adds `url` to the Done Set and persists it
    pub fn mark_done(&mut self, url: &str) -> LedgerResult<bool> {
        self.done.insert(url)
    }

    /// Index the next snapshot in (group, kind) will receive
    pub fn next_index(&mut self, group: &str, kind: &str) -> LedgerResult<u32> {
        let successes = self
            .log_mut(group, kind)?
            .iter()
            .filter(|r| r.is_snapshot())
            .count();
        Ok(successes as u32 + 1)
    }

    /// Appends a snapshot and persists the (group, kind) log
    pub fn record_success(
        &mut self,
        group: &str,
        kind: &str,
        snapshot: Snapshot,
    ) -> LedgerResult<()> {
        self.append(group, kind, ArchiveRecord::Snapshot(snapshot))
    }

    /// Appends a failure and persists the (group, kind) log
    pub fn record_failure(
        &mut self,
        group: &str,
        kind: &str,
        url: &str,
        reason: &str,
    ) -> LedgerResult<()> {
        self.append(group, kind, ArchiveRecord::Failure(Failure::new(url, reason)))
    }

    /// Records logged so far for (group, kind)
    pub fn results(&mut self, group: &str, kind: &str) -> LedgerResult<&[ArchiveRecord]> {
        Ok(self.log_mut(group, kind)?.as_slice())
    }

    fn append(&mut self, group: &str, kind: &str, record: ArchiveRecord) -> LedgerResult<()> {
        let path = self.results_path(group, kind);
        let log = self.log_mut(group, kind)?;
        log.push(record);
        write_atomic(&path, &serde_json::to_string_pretty(&*log)?)
    }

    fn results_path(&self, group: &str, kind: &str) -> PathBuf {
        self.meta_dir
            .join(format!("{}__{}{}", group, kind, RESULTS_SUFFIX))
    }

    /// Loads a (group, kind) log on first use
    fn log_mut(&mut self, group: &str, kind: &str) -> LedgerResult<&mut Vec<ArchiveRecord>> {
        let key = (group.to_string(), kind.to_string());
        if !self.logs.contains_key(&key) {
            let path = self.results_path(group, kind);
            let (records, notice) = read_log(&path)?;
            self.notices.extend(notice);
            self.logs.insert(key.clone(), records);
        }
        Ok(self.logs.entry(key).or_default())
    }
}

/// Directory holding ledger files and run logs
pub fn meta_dir(output_dir: &Path) -> PathBuf {
    output_dir.join("meta")
}

/// Loads every result log under `{output_dir}/meta`, sorted by (group, kind)
pub fn load_all_logs(output_dir: &Path) -> LedgerResult<Vec<ResultLog>> {
    let dir = meta_dir(output_dir);
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut logs = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(stem) = name.strip_suffix(RESULTS_SUFFIX) else {
            continue;
        };
        let Some((group, kind)) = stem.split_once("__") else {
            continue;
        };

        let text = std::fs::read_to_string(&path)?;
        logs.push(ResultLog {
            group: group.to_string(),
            kind: kind.to_string(),
            records: parse_records(&text)?,
        });
    }

    logs.sort_by(|a, b| (&a.group, &a.kind).cmp(&(&b.group, &b.kind)));
    Ok(logs)
}

/// Loads the Done Set of an output directory without opening a full ledger
pub fn load_done_set(output_dir: &Path) -> LedgerResult<DoneSet> {
    DoneSet::load(&meta_dir(output_dir).join(DONE_FILE))
}

fn read_log(path: &Path) -> LedgerResult<(Vec<ArchiveRecord>, Option<LedgerNotice>)> {
    if !path.exists() {
        return Ok((Vec::new(), None));
    }
    let text = std::fs::read_to_string(path)?;
    match parse_records(&text) {
        Ok(records) => Ok((records, None)),
        Err(LedgerError::Json(e)) => Ok((Vec::new(), Some(quarantine(path, &e)?))),
        Err(e) => Err(e),
    }
}

/// Moves an unreadable ledger file to `<name>.corrupt`
fn quarantine(path: &Path, err: &serde_json::Error) -> LedgerResult<LedgerNotice> {
    let mut target = path.as_os_str().to_owned();
    target.push(".corrupt");
    let target = PathBuf::from(target);
    std::fs::rename(path, &target)?;
    Ok(LedgerNotice::Quarantined {
        path: path.to_path_buf(),
        moved_to: target,
        reason: err.to_string(),
    })
}

/// Writes `contents` via a sibling temp file and rename
pub(crate) fn write_atomic(path: &Path, contents: &str) -> LedgerResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
