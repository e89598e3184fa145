//! In-memory repository. Nothing survives the process; used by tests and
//! the `memory` storage backend.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use super::{Namespace, StateRepository, StoreError};

#[derive(Default)]
pub struct MemoryRepository {
    entries: Mutex<HashMap<Namespace, BTreeMap<String, String>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateRepository for MemoryRepository {
    fn load(&self, namespace: Namespace, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .get(&namespace)
            .and_then(|ns| ns.get(key))
            .cloned())
    }

    fn save(&self, namespace: Namespace, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .entry(namespace)
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn keys(&self, namespace: Namespace) -> Result<Vec<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .get(&namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces_are_independent() {
        let repo = MemoryRepository::new();
        repo.save(Namespace::DealPlans, "k", "1").unwrap();
        repo.save(Namespace::Context, "k", "2").unwrap();
        assert_eq!(repo.load(Namespace::DealPlans, "k").unwrap().as_deref(), Some("1"));
        assert_eq!(repo.load(Namespace::Context, "k").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_last_write_wins() {
        let repo = MemoryRepository::new();
        repo.save(Namespace::Context, "k", "old").unwrap();
        repo.save(Namespace::Context, "k", "new").unwrap();
        assert_eq!(repo.load(Namespace::Context, "k").unwrap().as_deref(), Some("new"));
        assert_eq!(repo.keys(Namespace::Context).unwrap(), vec!["k".to_string()]);
    }
}
