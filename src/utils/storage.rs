use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use anyhow::{Context, Result};
use serde_json::to_string_pretty;

/// Durable key/value store backing the client preferences, kept as a JSON file.
#[derive(Debug)]
pub struct ClientStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl ClientStorage {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let exists_and_non_empty = path.exists() && fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);

        let entries = if exists_and_non_empty {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read client storage {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Client storage {} is not a string map", path.display()))?
        } else {
            BTreeMap::new()
        };

        Ok(ClientStorage { path, entries })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    // Updates the entry and writes the whole store back to disk.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        fs::write(&self.path, to_string_pretty(&self.entries)?)
            .with_context(|| format!("Failed to write client storage {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_empty_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        assert!(ClientStorage::open(&path).unwrap().get("userLanguage").is_none());

        fs::write(&path, "").unwrap();
        assert!(ClientStorage::open(&path).unwrap().get("userLanguage").is_none());
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let mut storage = ClientStorage::open(&path).unwrap();
        storage.set("userLanguage", "fr").unwrap();
        assert_eq!(storage.get("userLanguage"), Some("fr"));

        let reopened = ClientStorage::open(&path).unwrap();
        assert_eq!(reopened.get("userLanguage"), Some("fr"));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(ClientStorage::open(&path).is_err());
    }

    #[test]
    fn unwritable_location_fails_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = ClientStorage::open(dir.path().join("missing").join("storage.json")).unwrap();
        assert!(storage.set("userLanguage", "fr").is_err());
        // the in-memory value still applies for the session
        assert_eq!(storage.get("userLanguage"), Some("fr"));
    }
}
