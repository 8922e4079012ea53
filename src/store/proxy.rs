use crate::error::Result;
use crate::utils::{load_json, save_json};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProxyFile {
    proxy: Option<String>,
}

#[derive(Debug, Default)]
pub struct LastGoodProxyStore {
    path: Option<PathBuf>,
}

impl LastGoodProxyStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Option<String> {
        let path = self.path.as_ref()?;
        load_json::<ProxyFile>(path)?
            .proxy
            .filter(|address| !address.trim().is_empty())
    }

    pub fn save(&self, address: Option<&str>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        save_json(
            &ProxyFile {
                proxy: address.map(str::to_string),
            },
            path,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trips_and_clears() {
        let dir = TempDir::new().unwrap();
        let store = LastGoodProxyStore::open(dir.path().join("proxy.json"));
        assert_eq!(store.load(), None);

        store.save(Some("1.2.3.4:8080")).unwrap();
        assert_eq!(store.load().as_deref(), Some("1.2.3.4:8080"));

        store.save(None).unwrap();
        assert_eq!(store.load(), None);
    }
}
