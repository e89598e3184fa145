//! Per-category knowledge tables: what is usually missing, what proof to ask
//! for, and which briefings to recommend.
//!
//! The default table is JSON embedded at compile time. Hosts can inject any
//! other `KnowledgeTable` (remote tables, test fixtures).

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::types::SignalCategory;

use super::BriefingRef;

const EMBEDDED_KNOWLEDGE: &str = include_str!("../../knowledge/category_knowledge.json");

pub trait KnowledgeTable: Send + Sync {
    fn lookup_missing(&self, category: SignalCategory) -> Vec<String>;

    fn lookup_proof(&self, category: SignalCategory) -> Vec<String>;

    fn lookup_briefings(&self, category: SignalCategory) -> Vec<BriefingRef>;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryKnowledge {
    #[serde(default)]
    whats_missing: Vec<String>,
    #[serde(default)]
    proof_to_request: Vec<String>,
    #[serde(default)]
    briefings: Vec<BriefingRef>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeFile {
    categories: HashMap<SignalCategory, CategoryKnowledge>,
}

/// Knowledge table backed by a parsed JSON document.
#[derive(Debug, Clone)]
pub struct StaticKnowledge {
    categories: HashMap<SignalCategory, CategoryKnowledge>,
}

impl StaticKnowledge {
    /// Parse the table shipped with the crate.
    pub fn embedded() -> Result<Self> {
        Self::from_json_str(EMBEDDED_KNOWLEDGE)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: KnowledgeFile = serde_json::from_str(json).map_err(|e| {
            PipelineError::Config(format!("Failed to parse knowledge table: {}", e))
        })?;
        for category in SignalCategory::ALL {
            if !file.categories.contains_key(&category) {
                log::debug!("Knowledge table has no entry for {}", category.as_str());
            }
        }
        Ok(Self {
            categories: file.categories,
        })
    }

    fn entry(&self, category: SignalCategory) -> Option<&CategoryKnowledge> {
        self.categories.get(&category)
    }
}

impl KnowledgeTable for StaticKnowledge {
    fn lookup_missing(&self, category: SignalCategory) -> Vec<String> {
        self.entry(category)
            .map(|k| k.whats_missing.clone())
            .unwrap_or_default()
    }

    fn lookup_proof(&self, category: SignalCategory) -> Vec<String> {
        self.entry(category)
            .map(|k| k.proof_to_request.clone())
            .unwrap_or_default()
    }

    fn lookup_briefings(&self, category: SignalCategory) -> Vec<BriefingRef> {
        self.entry(category)
            .map(|k| k.briefings.clone())
            .unwrap_or_default()
    }
}
