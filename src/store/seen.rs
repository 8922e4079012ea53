use crate::error::Result;
use crate::scraper::ItemRecord;
use crate::utils::{load_json, save_json};
use crate::{log_info, log_warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Tag written alongside the keys. A file carrying any other scheme was
/// keyed differently and cannot be compared against, so it is discarded.
pub const KEY_SCHEME: &str = "detail-url-v1";

#[derive(Debug, Serialize, Deserialize)]
struct SeenFile {
    key_scheme: String,
    keys: Vec<String>,
}

/// Identity keys of every item already surfaced. Grows monotonically.
#[derive(Debug)]
pub struct SeenStore {
    path: Option<PathBuf>,
    keys: HashSet<String>,
}

impl SeenStore {
    /// Opens the store at `path`, starting empty if the file is missing or
    /// unusable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let keys = Self::load_from(&path);
        log_info!("[store] Loaded {} seen items from {}", keys.len(), path.display());
        Self {
            path: Some(path),
            keys,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            keys: HashSet::new(),
        }
    }

    /// Re-reads the backing file, replacing the in-memory set.
    pub fn load(&mut self) -> &HashSet<String> {
        if let Some(path) = &self.path {
            self.keys = Self::load_from(path);
        }
        &self.keys
    }

    fn load_from(path: &Path) -> HashSet<String> {
        match load_json::<SeenFile>(path) {
            Some(file) if file.key_scheme == KEY_SCHEME => file.keys.into_iter().collect(),
            Some(file) => {
                log_warn!(
                    "[store] {} uses key scheme {:?}, expected {:?}; starting empty",
                    path.display(),
                    file.key_scheme,
                    KEY_SCHEME
                );
                HashSet::new()
            }
            None => HashSet::new(),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Records not yet surfaced, in input order. Repeats within the batch
    /// are dropped too.
    pub fn filter_new(&self, records: Vec<ItemRecord>) -> Vec<ItemRecord> {
        let mut batch = HashSet::new();
        records
            .into_iter()
            .filter(|record| {
                let key = record.identity_key();
                !self.keys.contains(&key) && batch.insert(key)
            })
            .collect()
    }

    pub fn mark(&mut self, records: &[ItemRecord]) {
        for record in records {
            self.keys.insert(record.identity_key());
        }
    }

    /// Writes the full set back. A store without a path is a no-op.
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut keys: Vec<String> = self.keys.iter().cloned().collect();
        keys.sort();
        save_json(
            &SeenFile {
                key_scheme: KEY_SCHEME.to_string(),
                keys,
            },
            path,
        )
    }
}
