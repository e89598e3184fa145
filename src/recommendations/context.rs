//! Lightweight context cache: the last brief the user generated and the
//! topics they asked to see less of. Both persist in the `context` namespace
//! as flat JSON values.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::persistence::{self, Namespace, StateRepository};
use crate::signals::normalize_tag;
use crate::types::{Signal, SignalCategory};

const LAST_BRIEF_CONTEXT_KEY: &str = "lastBriefContext";
const DOWNRANKED_TOPICS_KEY: &str = "downrankedTopics";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefSignalRef {
    pub signal_id: String,
    pub category: SignalCategory,
}

/// What the user was last briefing on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefContext {
    pub account_id: String,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub signals: Vec<BriefSignalRef>,
}

impl BriefContext {
    /// Context for a brief over the given signals. Signal tags become topics.
    pub fn from_signals(account_id: &str, signals: &[Signal]) -> Self {
        let mut topics: Vec<String> = Vec::new();
        for tag in signals.iter().flat_map(|s| s.tags.iter()) {
            if !topics.contains(tag) {
                topics.push(tag.clone());
            }
        }
        Self {
            account_id: account_id.to_string(),
            projects: Vec::new(),
            topics,
            signals: signals
                .iter()
                .map(|s| BriefSignalRef {
                    signal_id: s.id.clone(),
                    category: s.category,
                })
                .collect(),
        }
    }

    pub fn with_projects<I, S>(mut self, projects: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projects = projects.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Default)]
struct ContextState {
    last_brief_context: Option<BriefContext>,
    /// Normalized topic names.
    downranked: BTreeSet<String>,
}

pub struct ContextCache {
    repo: Arc<dyn StateRepository>,
    state: Mutex<ContextState>,
}

impl ContextCache {
    /// Load persisted context, starting empty for keys never written.
    pub fn open(repo: Arc<dyn StateRepository>) -> Result<Self> {
        let last_brief_context: Option<BriefContext> =
            persistence::load_json(repo.as_ref(), Namespace::Context, LAST_BRIEF_CONTEXT_KEY)?;
        let downranked: Option<BTreeSet<String>> =
            persistence::load_json(repo.as_ref(), Namespace::Context, DOWNRANKED_TOPICS_KEY)?;

        Ok(Self {
            repo,
            state: Mutex::new(ContextState {
                last_brief_context,
                downranked: downranked.unwrap_or_default(),
            }),
        })
    }

    pub fn last_brief_context(&self) -> Option<BriefContext> {
        self.state.lock().last_brief_context.clone()
    }

    pub fn set_last_brief_context(&self, ctx: BriefContext) -> Result<()> {
        let mut state = self.state.lock();
        persistence::save_json(
            self.repo.as_ref(),
            Namespace::Context,
            LAST_BRIEF_CONTEXT_KEY,
            &ctx,
        )?;
        state.last_brief_context = Some(ctx);
        Ok(())
    }

    /// Push a topic to the bottom of the rail. Returns false if it was
    /// already downranked.
    pub fn downrank(&self, topic: &str) -> Result<bool> {
        let key = normalize_tag(topic);
        if key.is_empty() {
            return Ok(false);
        }
        let mut state = self.state.lock();
        if state.downranked.contains(&key) {
            return Ok(false);
        }
        let mut next = state.downranked.clone();
        next.insert(key);
        self.persist_downranked(&next)?;
        state.downranked = next;
        log::info!("Context: downranked topic '{}'", topic);
        Ok(true)
    }

    /// Undo a downrank. Returns false if the topic was not downranked.
    pub fn restore_topic(&self, topic: &str) -> Result<bool> {
        let key = normalize_tag(topic);
        let mut state = self.state.lock();
        if !state.downranked.contains(&key) {
            return Ok(false);
        }
        let mut next = state.downranked.clone();
        next.remove(&key);
        self.persist_downranked(&next)?;
        state.downranked = next;
        log::info!("Context: restored topic '{}'", topic);
        Ok(true)
    }

    /// Normalized downranked topics.
    pub fn downranked_topics(&self) -> BTreeSet<String> {
        self.state.lock().downranked.clone()
    }

    pub fn is_downranked(&self, topic: &str) -> bool {
        self.state.lock().downranked.contains(&normalize_tag(topic))
    }

    fn persist_downranked(&self, topics: &BTreeSet<String>) -> Result<()> {
        persistence::save_json(
            self.repo.as_ref(),
            Namespace::Context,
            DOWNRANKED_TOPICS_KEY,
            topics,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::briefing::test_support::vendor_signal;
    use crate::persistence::MemoryRepository;

    fn cache() -> (ContextCache, Arc<MemoryRepository>) {
        let repo = Arc::new(MemoryRepository::new());
        (ContextCache::open(repo.clone()).unwrap(), repo)
    }

    #[test]
    fn test_fresh_cache_is_empty() {
        let (cache, _) = cache();
        assert!(cache.last_brief_context().is_none());
        assert!(cache.downranked_topics().is_empty());
    }

    #[test]
    fn test_downrank_is_case_insensitive_and_idempotent() {
        let (cache, _) = cache();
        assert!(cache.downrank("Security").unwrap());
        assert!(!cache.downrank("security ").unwrap());
        assert!(cache.is_downranked("SECURITY"));
        assert_eq!(cache.downranked_topics().len(), 1);
    }

    #[test]
    fn test_restore_topic() {
        let (cache, _) = cache();
        cache.downrank("Security").unwrap();
        assert!(cache.restore_topic("Security").unwrap());
        assert!(!cache.restore_topic("Security").unwrap());
        assert!(!cache.is_downranked("Security"));
    }

    #[test]
    fn test_state_persists_as_flat_json() {
        let (cache, repo) = cache();
        cache.downrank("Security").unwrap();
        cache.downrank("Territory").unwrap();
        let ctx = BriefContext::from_signals("acme", &[vendor_signal("s1", 70)])
            .with_projects(["CRM replacement"]);
        cache.set_last_brief_context(ctx.clone()).unwrap();

        let raw = repo
            .load(Namespace::Context, "downrankedTopics")
            .unwrap()
            .unwrap();
        assert_eq!(raw, r#"["security","territory"]"#);

        let reopened = ContextCache::open(repo).unwrap();
        assert_eq!(reopened.last_brief_context(), Some(ctx));
        assert!(reopened.is_downranked("territory"));
    }

    #[test]
    fn test_context_from_signals_collects_tags() {
        let ctx = BriefContext::from_signals(
            "acme",
            &[vendor_signal("s1", 70), vendor_signal("s2", 40)],
        );
        assert_eq!(ctx.topics, vec!["crm", "pricing"]);
        assert_eq!(ctx.signals.len(), 2);
        assert_eq!(ctx.signals[1].category, SignalCategory::Vendor);
    }
}
