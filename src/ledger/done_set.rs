//! The persisted set of URLs that need no further work

use super::{write_atomic, LedgerResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct DoneFile {
    done: BTreeSet<String>,
}

/// URLs already processed, shared by every group of a run
#[derive(Debug)]
pub struct DoneSet {
    path: PathBuf,
    urls: BTreeSet<String>,
}

impl DoneSet {
    /// Loads the set from `path`, starting empty if the file does not exist
    pub fn load(path: &Path) -> LedgerResult<Self> {
        let urls = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str::<DoneFile>(&text)?.done
        } else {
            BTreeSet::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            urls,
        })
    }

    /// Starts an empty set that will persist to `path`
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            urls: BTreeSet::new(),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Adds `url` and persists; returns false if it was already present
    pub fn insert(&mut self, url: &str) -> LedgerResult<bool> {
        if !self.urls.insert(url.to_string()) {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(String::as_str)
    }

    fn persist(&self) -> LedgerResult<()> {
        let file = DoneFile {
            done: self.urls.clone(),
        };
        write_atomic(&self.path, &serde_json::to_string_pretty(&file)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let set = DoneSet::load(&dir.path().join("done_urls.json")).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_insert_persists_sorted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("done_urls.json");

        let mut set = DoneSet::load(&path).unwrap();
        assert!(set.insert("https://x/b").unwrap());
        assert!(set.insert("https://x/a").unwrap());
        assert!(!set.insert("https://x/a").unwrap());

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json, serde_json::json!({"done": ["https://x/a", "https://x/b"]}));

        let reloaded = DoneSet::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("https://x/b"));
    }
}
