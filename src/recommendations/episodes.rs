//! Explainer episode catalog.
//!
//! Episodes are owned by the content side of the portal; the pipeline only
//! reads them to score the rail and to map watch progress onto topics.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::SignalCategory;

const EMBEDDED_EPISODES: &str = include_str!("../../knowledge/episodes.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub topics: Vec<String>,
    /// Signal categories this episode helps with.
    #[serde(default)]
    pub categories: Vec<SignalCategory>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct EpisodeFile {
    episodes: Vec<Episode>,
}

/// Episodes in catalog order, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct EpisodeCatalog {
    episodes: Vec<Episode>,
    by_id: HashMap<String, usize>,
}

impl EpisodeCatalog {
    pub fn embedded() -> Result<Self> {
        Self::from_json_str(EMBEDDED_EPISODES)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: EpisodeFile = serde_json::from_str(json).map_err(|e| {
            PipelineError::Config(format!("Failed to parse episode catalog: {}", e))
        })?;
        Ok(Self::new(file.episodes))
    }

    /// Build from a list. Later duplicates of an id are dropped.
    pub fn new(episodes: Vec<Episode>) -> Self {
        let mut catalog = Self::default();
        for episode in episodes {
            if catalog.by_id.contains_key(&episode.id) {
                log::warn!("Episodes: dropping duplicate episode {}", episode.id);
                continue;
            }
            catalog
                .by_id
                .insert(episode.id.clone(), catalog.episodes.len());
            catalog.episodes.push(episode);
        }
        catalog
    }

    pub fn all(&self) -> &[Episode] {
        &self.episodes
    }

    pub fn get(&self, id: &str) -> Option<&Episode> {
        self.by_id.get(id).map(|&i| &self.episodes[i])
    }

    /// Episodes tagged with a topic, in catalog order.
    pub fn with_topic<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = &'a Episode> + 'a {
        self.episodes
            .iter()
            .filter(move |e| e.topics.iter().any(|t| t == topic))
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_catalog_covers_knowledge_briefings() {
        let catalog = EpisodeCatalog::embedded().unwrap();
        for id in [
            "ep-reg-101",
            "ep-sec-compliance",
            "ep-vendor-displace",
            "ep-local-plays",
            "ep-compete-101",
            "ep-exec-change",
            "ep-arch-review",
        ] {
            assert!(catalog.get(id).is_some(), "missing episode {}", id);
        }
    }

    #[test]
    fn test_with_topic_keeps_catalog_order() {
        let catalog = EpisodeCatalog::embedded().unwrap();
        let ids: Vec<&str> = catalog
            .with_topic("Negotiation")
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["ep-vendor-displace", "ep-compete-101"]);
    }

    #[test]
    fn test_duplicate_episode_dropped() {
        let json = r#"{"episodes":[
            {"id":"a","title":"first","topics":["X"],"publishedAt":"2026-01-01T00:00:00Z"},
            {"id":"a","title":"second","topics":["Y"],"publishedAt":"2026-01-02T00:00:00Z"}
        ]}"#;
        let catalog = EpisodeCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("a").unwrap().title, "first");
    }

    #[test]
    fn test_malformed_catalog_is_config_error() {
        let result = EpisodeCatalog::from_json_str("{\"episodes\": 3}");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
