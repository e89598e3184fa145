//! Signal catalog: the read-only source of signals per account and week.
//!
//! The pipeline never mutates signals. Hosts supply their own catalog behind
//! `SignalCatalog`; `InMemoryCatalog` covers tests and JSON fixture feeds.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use parking_lot::RwLock;
use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::types::{Signal, WeekKey};

pub trait SignalCatalog: Send + Sync {
    /// Signals for an account and week, in catalog order. Unknown keys yield
    /// an empty list.
    fn get_signals(&self, account_id: &str, week_key: &WeekKey) -> Vec<Signal>;

    fn find_signal(&self, account_id: &str, week_key: &WeekKey, signal_id: &str) -> Option<Signal> {
        self.get_signals(account_id, week_key)
            .into_iter()
            .find(|s| s.id == signal_id)
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    signals: RwLock<HashMap<(String, WeekKey), Vec<Signal>>>,
}

/// JSON feed format: `{ "feeds": [{ "accountId", "weekKey", "signals": [...] }] }`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    feeds: Vec<CatalogFeed>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFeed {
    account_id: String,
    week_key: WeekKey,
    signals: Vec<Signal>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON feed file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read catalog {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse catalog: {}", e)))?;
        let catalog = Self::new();
        for feed in file.feeds {
            catalog.insert(&feed.account_id, feed.week_key, feed.signals);
        }
        Ok(catalog)
    }

    /// Replace the signals for an account and week.
    ///
    /// Ids must be unique per key; later duplicates are dropped.
    pub fn insert(&self, account_id: &str, week_key: WeekKey, signals: Vec<Signal>) {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(signals.len());
        for signal in signals {
            if seen.insert(signal.id.clone()) {
                unique.push(signal);
            } else {
                log::warn!(
                    "Catalog: dropping duplicate signal {} for {} ({})",
                    signal.id,
                    account_id,
                    week_key
                );
            }
        }
        self.signals
            .write()
            .insert((account_id.to_string(), week_key), unique);
    }
}

impl SignalCatalog for InMemoryCatalog {
    fn get_signals(&self, account_id: &str, week_key: &WeekKey) -> Vec<Signal> {
        self.signals
            .read()
            .get(&(account_id.to_string(), week_key.clone()))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalCategory;
    use chrono::Utc;

    fn week() -> WeekKey {
        WeekKey::parse("2026-W07").unwrap()
    }

    #[test]
    fn test_unknown_key_is_empty() {
        let catalog = InMemoryCatalog::new();
        assert!(catalog.get_signals("acme", &week()).is_empty());
        assert!(catalog.find_signal("acme", &week(), "sig-1").is_none());
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let catalog = InMemoryCatalog::new();
        let first = Signal::new("sig-1", SignalCategory::Vendor, "first", 50, Utc::now()).unwrap();
        let dup = Signal::new("sig-1", SignalCategory::Vendor, "dup", 90, Utc::now()).unwrap();
        catalog.insert("acme", week(), vec![first, dup]);

        let signals = catalog.get_signals("acme", &week());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].headline, "first");
    }

    #[test]
    fn test_from_json_str() {
        let json = r#"{
            "feeds": [{
                "accountId": "acme",
                "weekKey": "2026-W07",
                "signals": [{
                    "id": "sig-1", "category": "regulatory", "headline": "New privacy rule",
                    "soWhat": "Data residency review needed", "whoCares": ["CISO"],
                    "confidenceScore": 72, "publishedAt": "2026-02-10T09:00:00Z",
                    "sources": [{"label": "Federal Register", "sourceType": "filing"}]
                }]
            }]
        }"#;
        let catalog = InMemoryCatalog::from_json_str(json).unwrap();
        let signal = catalog.find_signal("acme", &week(), "sig-1").unwrap();
        assert_eq!(signal.who_cares, vec!["CISO"]);
        assert_eq!(signal.sources.len(), 1);
    }

    #[test]
    fn test_from_json_str_rejects_bad_score() {
        let json = r#"{"feeds": [{"accountId": "acme", "weekKey": "2026-W07", "signals": [{
            "id": "sig-1", "category": "vendor", "headline": "h", "soWhat": "s",
            "confidenceScore": 250, "publishedAt": "2026-02-10T09:00:00Z"}]}]}"#;
        assert!(matches!(
            InMemoryCatalog::from_json_str(json),
            Err(PipelineError::Config(_))
        ));
    }
}
