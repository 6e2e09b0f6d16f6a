//! Archive record types and their on-disk JSON form

use super::{LedgerError, LedgerResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Current record schema version
pub const SCHEMA_VERSION: u32 = 1;

/// A captured page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema: u32,
    /// The target URL as scheduled
    pub url: String,
    /// Where the tab actually ended up, when different from `url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    pub title: String,
    pub html: PathBuf,
    pub png: PathBuf,
    /// Sequence index within the (group, kind) log, starting at 1
    pub index: u32,
    #[serde(default = "saved_by_default")]
    pub html_saved: bool,
    #[serde(default = "saved_by_default")]
    pub png_saved: bool,
}

/// A target that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub schema: u32,
    pub url: String,
    pub error: String,
}

/// One entry of a (group, kind) result log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArchiveRecord {
    Snapshot(Snapshot),
    Failure(Failure),
}

fn saved_by_default() -> bool {
    true
}

impl Failure {
    pub fn new(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            schema: SCHEMA_VERSION,
            url: url.into(),
            error: error.into(),
        }
    }
}

impl ArchiveRecord {
    pub fn url(&self) -> &str {
        match self {
            Self::Snapshot(s) => &s.url,
            Self::Failure(f) => &f.url,
        }
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self, Self::Snapshot(_))
    }

    pub fn as_snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Snapshot(s) => Some(s),
            Self::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Self::Failure(f) => Some(f),
            Self::Snapshot(_) => None,
        }
    }

}

/// Records written before the tagged format existed
#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyRecord {
    Failure {
        url: String,
        error: String,
    },
    Snapshot {
        url: String,
        #[serde(default)]
        title: String,
        png: PathBuf,
        html: PathBuf,
    },
}

/// Schema version of a tagged entry, or `None` for a legacy one
///
/// A tagged entry without a readable version is treated as version 0 and
/// left to fail on its shape.
fn stored_schema(entry: &Value) -> Option<u32> {
    if entry.get("status").is_none() && entry.get("schema").is_none() {
        return None;
    }
    let schema = entry.get("schema").and_then(Value::as_u64).unwrap_or(0);
    Some(u32::try_from(schema).unwrap_or(u32::MAX))
}

/// Parses a result log, accepting both tagged and legacy records
///
/// The version of a tagged entry is checked before its shape, so a newer
/// record is reported as unsupported whatever fields it carries. Legacy
/// snapshots carry no index; they are numbered by their position among the
/// successes that precede them.
pub fn parse_records(text: &str) -> LedgerResult<Vec<ArchiveRecord>> {
    let stored: Vec<Value> = serde_json::from_str(text)?;
    let mut records = Vec::with_capacity(stored.len());
    let mut successes = 0u32;

    for entry in stored {
        let record = match stored_schema(&entry) {
            Some(schema) if schema > SCHEMA_VERSION => {
                return Err(LedgerError::UnsupportedSchema(schema));
            }
            Some(_) => serde_json::from_value::<ArchiveRecord>(entry)?,
            None => match serde_json::from_value::<LegacyRecord>(entry)? {
                LegacyRecord::Failure { url, error } => {
                    ArchiveRecord::Failure(Failure::new(url, error))
                }
                LegacyRecord::Snapshot {
                    url,
                    title,
                    png,
                    html,
                } => ArchiveRecord::Snapshot(Snapshot {
                    schema: SCHEMA_VERSION,
                    url,
                    final_url: None,
                    title,
                    html,
                    png,
                    index: successes + 1,
                    html_saved: true,
                    png_saved: true,
                }),
            },
        };

        if record.is_snapshot() {
            successes += 1;
        }
        records.push(record);
    }

    Ok(records)
}
