use crate::error::{Result, StoreError};
use crate::log_warn;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

pub fn ensure_parent_directory(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}

/// Writes `data` as pretty JSON next to `path` and renames it into place, so
/// a crash mid-write leaves the previous file intact.
pub fn save_json(data: &impl serde::Serialize, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let write_err = |source| StoreError::Write {
        path: path.display().to_string(),
        source,
    };

    ensure_parent_directory(path).map_err(write_err)?;

    let json_string = serde_json::to_string_pretty(data).map_err(StoreError::Encode)?;
    let tmp_path = path.with_extension("json.tmp");
    let mut file = File::create(&tmp_path).map_err(write_err)?;
    file.write_all(json_string.as_bytes()).map_err(write_err)?;
    file.sync_all().map_err(write_err)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(write_err(e).into());
    }
    Ok(())
}

/// Reads a JSON document, returning `None` when the file is missing,
/// unreadable or does not decode. Callers fall back to an empty state.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Option<T> {
    let path = path.as_ref();
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            log_warn!("[store] Could not read {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            log_warn!("[store] Ignoring corrupt {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/sample.json");
        save_json(&Sample { name: "a".into() }, &path).unwrap();
        assert_eq!(
            load_json::<Sample>(&path),
            Some(Sample { name: "a".into() })
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn load_tolerates_missing_and_corrupt_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        assert_eq!(load_json::<Sample>(&path), None);

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_json::<Sample>(&path), None);
    }

    #[test]
    fn failed_rename_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        fs::create_dir(&path).unwrap();

        assert!(save_json(&Sample { name: "a".into() }, &path).is_err());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
