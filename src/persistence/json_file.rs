//! JSON file repository: one `<namespace>.json` object per namespace.
//!
//! Writes go through a temp file in the same directory and are renamed into
//! place, so a crash mid-write leaves the previous file intact.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;
use tempfile::NamedTempFile;

use super::{Namespace, StateRepository, StoreError};

pub struct JsonFileRepository {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileRepository {
    /// Open (or create) a repository rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, namespace: Namespace) -> PathBuf {
        self.dir.join(format!("{}.json", namespace.as_str()))
    }

    fn read_namespace(&self, namespace: Namespace) -> Result<BTreeMap<String, Value>, StoreError> {
        let path = self.path_for(namespace);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_namespace(
        &self,
        namespace: Namespace,
        entries: &BTreeMap<String, Value>,
    ) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(entries)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path_for(namespace))
            .map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

impl StateRepository for JsonFileRepository {
    fn load(&self, namespace: Namespace, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.write_lock.lock();
        let entries = self.read_namespace(namespace)?;
        Ok(entries.get(key).map(Value::to_string))
    }

    fn save(&self, namespace: Namespace, key: &str, value: &str) -> Result<(), StoreError> {
        let parsed: Value = serde_json::from_str(value)?;
        let _guard = self.write_lock.lock();
        let mut entries = self.read_namespace(namespace)?;
        entries.insert(key.to_string(), parsed);
        self.write_namespace(namespace, &entries)?;
        log::debug!("JsonFileRepository: saved {}/{}", namespace, key);
        Ok(())
    }

    fn keys(&self, namespace: Namespace) -> Result<Vec<String>, StoreError> {
        let _guard = self.write_lock.lock();
        Ok(self.read_namespace(namespace)?.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let repo = JsonFileRepository::open(dir.path()).unwrap();
            repo.save(Namespace::DealPlans, "acme:2026-W07", r#"{"promotedSignals":[]}"#)
                .unwrap();
        }
        let repo = JsonFileRepository::open(dir.path()).unwrap();
        let raw = repo.load(Namespace::DealPlans, "acme:2026-W07").unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["promotedSignals"], Value::Array(vec![]));
        assert!(dir.path().join("deal_plans.json").exists());
    }

    #[test]
    fn test_missing_key_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = JsonFileRepository::open(dir.path()).unwrap();
        assert_eq!(repo.load(Namespace::Context, "downrankedTopics").unwrap(), None);
        assert!(repo.keys(Namespace::Context).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_non_json_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = JsonFileRepository::open(dir.path()).unwrap();
        let result = repo.save(Namespace::Context, "k", "not json");
        assert!(matches!(result, Err(StoreError::Serde(_))));
        assert!(!dir.path().join("context.json").exists());
    }

    #[test]
    fn test_creates_nested_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("state").join("v1");
        let repo = JsonFileRepository::open(&nested).unwrap();
        repo.save(Namespace::Context, "k", "1").unwrap();
        assert!(nested.join("context.json").exists());
    }
}
