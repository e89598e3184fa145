//! Explainer recommendation rail.
//!
//! Every episode gets a priority (lower is more relevant) built from named,
//! configurable weights, plus a human-readable `reason`. Candidates are
//! recomputed per request and never persisted. Downranked topics are pushed
//! to the bottom, not removed, so "show all" browsing still reaches them.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::expertise::ExpertiseLevel;
use crate::signals::normalize_tag;

pub mod context;
pub mod episodes;

pub use context::{BriefContext, BriefSignalRef, ContextCache};
pub use episodes::{Episode, EpisodeCatalog};

/// Minimum Jaro-Winkler similarity for a fuzzy search word match.
const SEARCH_SIMILARITY: f64 = 0.88;

const REASON_PROJECT: &str = "Matches your project";
const REASON_BRIEF: &str = "Matches your brief";
const REASON_CONTINUE: &str = "Continue watching";
const REASON_NEW: &str = "New to you";
const REASON_FALLBACK: &str = "From the explainer library";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Priority contributions. Boosts are subtracted, penalties added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecommendationWeights {
    pub base: i32,
    pub context_match_boost: i32,
    pub signal_match_boost: i32,
    pub continue_watching_boost: i32,
    pub low_expertise_boost: i32,
    pub completed_penalty: i32,
    pub recognized_penalty: i32,
    /// Large enough to sink a downranked episode below every other one.
    pub downrank_penalty: i32,
}

impl Default for RecommendationWeights {
    fn default() -> Self {
        Self {
            base: 100,
            context_match_boost: 30,
            signal_match_boost: 20,
            continue_watching_boost: 25,
            low_expertise_boost: 10,
            completed_penalty: 40,
            recognized_penalty: 30,
            downrank_penalty: 1000,
        }
    }
}

impl RecommendationWeights {
    /// Smallest gap between the best possible regular priority and the worst
    /// one. A downrank penalty above this sinks every downranked episode
    /// below every other one.
    pub fn priority_spread(&self) -> i32 {
        self.context_match_boost
            + self.signal_match_boost
            + self.continue_watching_boost
            + self.low_expertise_boost
            + self.completed_penalty
            + self.recognized_penalty
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Everything a recommendation pass reads. Borrowed so the caller keeps
/// ownership of its state.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationInputs<'a> {
    pub episodes: &'a [Episode],
    pub brief_context: Option<&'a BriefContext>,
    /// Max watched percent per episode id.
    pub progress: &'a HashMap<String, u8>,
    pub expertise: &'a HashMap<String, ExpertiseLevel>,
    /// Normalized topic names.
    pub downranked: &'a BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationCandidate {
    pub episode: Episode,
    pub priority: i32,
    pub reason: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matched_signals: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matched_context: Vec<String>,
    pub downranked: bool,
}

/// Display filter applied after scoring, matched against `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "text")]
pub enum RailFilter {
    #[default]
    All,
    MyProjects,
    ContinueWatching,
    NewToYou,
    Search(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortMode {
    #[default]
    Relevance,
    Newest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowseQuery {
    pub filter: RailFilter,
    pub sort: SortMode,
    pub limit: Option<usize>,
}

impl RailFilter {
    pub fn matches(&self, candidate: &RecommendationCandidate) -> bool {
        match self {
            RailFilter::All => true,
            RailFilter::MyProjects => candidate.reason.contains(REASON_PROJECT),
            RailFilter::ContinueWatching => candidate.reason.contains(REASON_CONTINUE),
            RailFilter::NewToYou => candidate.reason.contains(REASON_NEW),
            RailFilter::Search(text) => search_matches(text, candidate),
        }
    }
}

/// Substring match on reason or title, falling back to per-word fuzzy match.
fn search_matches(text: &str, candidate: &RecommendationCandidate) -> bool {
    let query = text.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    let haystack = format!("{} {}", candidate.episode.title, candidate.reason).to_lowercase();
    if haystack.contains(&query) {
        return true;
    }
    let words: Vec<&str> = haystack
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    query.split_whitespace().all(|q| {
        words
            .iter()
            .any(|w| strsim::jaro_winkler(q, w) >= SEARCH_SIMILARITY)
    })
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine {
    weights: RecommendationWeights,
}

impl RecommendationEngine {
    pub fn new(weights: RecommendationWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &RecommendationWeights {
        &self.weights
    }

    /// Score every episode and order by priority (stable, so ties keep
    /// catalog order). `limit: None` returns the full list.
    pub fn recommend(
        &self,
        inputs: &RecommendationInputs<'_>,
        limit: Option<usize>,
    ) -> Vec<RecommendationCandidate> {
        let mut candidates: Vec<RecommendationCandidate> = inputs
            .episodes
            .iter()
            .map(|episode| self.score(inputs, episode))
            .collect();
        candidates.sort_by_key(|c| c.priority);
        if let Some(limit) = limit {
            candidates.truncate(limit);
        }
        candidates
    }

    /// Full list, filtered for display and optionally re-sorted by date.
    pub fn browse(
        &self,
        inputs: &RecommendationInputs<'_>,
        query: &BrowseQuery,
    ) -> Vec<RecommendationCandidate> {
        let mut candidates: Vec<RecommendationCandidate> = self
            .recommend(inputs, None)
            .into_iter()
            .filter(|c| query.filter.matches(c))
            .collect();
        if query.sort == SortMode::Newest {
            candidates.sort_by(|a, b| b.episode.published_at.cmp(&a.episode.published_at));
        }
        if let Some(limit) = query.limit {
            candidates.truncate(limit);
        }
        candidates
    }

    pub fn score(&self, inputs: &RecommendationInputs<'_>, episode: &Episode) -> RecommendationCandidate {
        let w = &self.weights;
        let mut priority = w.base;
        let mut reasons: Vec<String> = Vec::new();
        let mut matched_context = Vec::new();
        let mut matched_signals = Vec::new();

        let episode_terms: BTreeSet<String> = episode
            .topics
            .iter()
            .chain(episode.keywords.iter())
            .map(|t| normalize_tag(t))
            .collect();

        if let Some(ctx) = inputs.brief_context {
            let projects: Vec<&String> = ctx
                .projects
                .iter()
                .filter(|p| {
                    normalize_tag(p)
                        .split_whitespace()
                        .any(|word| episode_terms.contains(word))
                })
                .collect();
            let topics: Vec<&String> = ctx
                .topics
                .iter()
                .filter(|t| episode_terms.contains(&normalize_tag(t)))
                .collect();

            if !projects.is_empty() {
                reasons.push(format!("{}: {}", REASON_PROJECT, join(&projects)));
            }
            if !topics.is_empty() {
                reasons.push(format!("{}: {}", REASON_BRIEF, join(&topics)));
            }
            matched_context.extend(projects.into_iter().cloned());
            matched_context.extend(topics.into_iter().cloned());
            if !matched_context.is_empty() {
                priority -= w.context_match_boost;
            }

            matched_signals = ctx
                .signals
                .iter()
                .filter(|s| episode.categories.contains(&s.category))
                .map(|s| s.signal_id.clone())
                .collect();
            if !matched_signals.is_empty() {
                priority -= w.signal_match_boost;
                reasons.push(format!(
                    "Related to {} signal{} in your brief",
                    matched_signals.len(),
                    if matched_signals.len() == 1 { "" } else { "s" }
                ));
            }
        }

        let watched = inputs.progress.get(&episode.id).copied().unwrap_or(0);
        if watched >= 100 {
            priority += w.completed_penalty;
            reasons.push("Watched".to_string());
        } else if watched > 0 {
            priority -= w.continue_watching_boost;
            reasons.push(format!("{} ({}%)", REASON_CONTINUE, watched));
        }

        let downranked_topic = episode
            .topics
            .iter()
            .find(|t| inputs.downranked.contains(&normalize_tag(t)));

        if let Some(topic) = downranked_topic {
            priority += w.downrank_penalty;
            reasons.push(format!("Downranked: {}", topic));
        } else if let Some((topic, level)) = self.lowest_expertise(inputs, episode) {
            match level {
                ExpertiseLevel::None if watched == 0 => {
                    priority -= w.low_expertise_boost;
                    reasons.push(format!("{}: {}", REASON_NEW, topic));
                }
                ExpertiseLevel::None | ExpertiseLevel::Exploring => {
                    priority -= w.low_expertise_boost;
                    reasons.push(format!("Keep building {}", topic));
                }
                ExpertiseLevel::Practitioner => {}
                ExpertiseLevel::Recognized => {
                    priority += w.recognized_penalty;
                    reasons.push(format!("Already recognized in {}", topic));
                }
            }
        }

        let reason = if reasons.is_empty() {
            REASON_FALLBACK.to_string()
        } else {
            reasons.join(" · ")
        };

        RecommendationCandidate {
            episode: episode.clone(),
            priority,
            reason,
            matched_signals,
            matched_context,
            downranked: downranked_topic.is_some(),
        }
    }

    /// The episode topic the user knows least, first in topic order on ties.
    fn lowest_expertise<'e>(
        &self,
        inputs: &RecommendationInputs<'_>,
        episode: &'e Episode,
    ) -> Option<(&'e str, ExpertiseLevel)> {
        let mut lowest: Option<(&str, ExpertiseLevel)> = None;
        for topic in &episode.topics {
            let level = inputs
                .expertise
                .get(topic)
                .copied()
                .unwrap_or(ExpertiseLevel::None);
            if lowest.map_or(true, |(_, l)| level < l) {
                lowest = Some((topic.as_str(), level));
            }
        }
        lowest
    }
}

fn join(items: &[&String]) -> String {
    items
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn episode(id: &str, topics: &[&str], day: u32) -> Episode {
        Episode {
            id: id.to_string(),
            title: format!("Episode {}", id),
            topics: topics.iter().map(|t| t.to_string()).collect(),
            categories: Vec::new(),
            keywords: Vec::new(),
            published_at: Utc.with_ymd_and_hms(2026, 1, day, 9, 0, 0).unwrap(),
        }
    }

    struct Fixture {
        episodes: Vec<Episode>,
        context: Option<BriefContext>,
        progress: HashMap<String, u8>,
        expertise: HashMap<String, ExpertiseLevel>,
        downranked: BTreeSet<String>,
    }

    impl Fixture {
        fn new(episodes: Vec<Episode>) -> Self {
            Self {
                episodes,
                context: None,
                progress: HashMap::new(),
                expertise: HashMap::new(),
                downranked: BTreeSet::new(),
            }
        }

        fn inputs(&self) -> RecommendationInputs<'_> {
            RecommendationInputs {
                episodes: &self.episodes,
                brief_context: self.context.as_ref(),
                progress: &self.progress,
                expertise: &self.expertise,
                downranked: &self.downranked,
            }
        }
    }

    fn ids(candidates: &[RecommendationCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.episode.id.as_str()).collect()
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        let fx = Fixture::new(vec![
            episode("a", &["Cloud"], 1),
            episode("b", &["Data"], 2),
            episode("c", &["Ops"], 3),
        ]);
        let out = RecommendationEngine::default().recommend(&fx.inputs(), None);
        assert_eq!(ids(&out), vec!["a", "b", "c"]);
        assert!(out.iter().all(|c| c.priority == 90));
        assert!(out[0].reason.starts_with("New to you"));
    }

    #[test]
    fn test_downranked_sinks_but_stays_in_full_list() {
        let mut fx = Fixture::new(vec![
            episode("sec", &["Security"], 1),
            episode("b", &["Data"], 2),
            episode("c", &["Ops"], 3),
        ]);
        fx.downranked.insert("security".to_string());
        let engine = RecommendationEngine::default();

        let top = engine.recommend(&fx.inputs(), Some(2));
        assert_eq!(ids(&top), vec!["b", "c"]);

        let all = engine.recommend(&fx.inputs(), None);
        assert_eq!(ids(&all), vec!["b", "c", "sec"]);
        assert!(all[2].downranked);
        assert!(all[2].reason.contains("Downranked: Security"));
    }

    #[test]
    fn test_smallest_valid_downrank_still_sinks() {
        let mut fx = Fixture::new(vec![
            episode("sec", &["Security"], 1),
            episode("done", &["Cloud"], 2),
        ]);
        fx.downranked.insert("security".to_string());
        fx.progress.insert("sec".to_string(), 50);
        fx.progress.insert("done".to_string(), 100);
        fx.expertise.insert("Cloud".to_string(), ExpertiseLevel::Recognized);

        let mut weights = RecommendationWeights::default();
        weights.downrank_penalty = weights.priority_spread() + 1;
        let out = RecommendationEngine::new(weights).recommend(&fx.inputs(), None);
        assert_eq!(ids(&out), vec!["done", "sec"]);
        assert!(out[0].priority < out[1].priority);
    }

    #[test]
    fn test_continue_watching_beats_unwatched() {
        let mut fx = Fixture::new(vec![episode("a", &["Cloud"], 1), episode("b", &["Cloud"], 2)]);
        fx.progress.insert("b".to_string(), 40);
        fx.expertise.insert("Cloud".to_string(), ExpertiseLevel::Exploring);
        let out = RecommendationEngine::default().recommend(&fx.inputs(), None);
        assert_eq!(ids(&out), vec!["b", "a"]);
        assert!(out[0].reason.contains("Continue watching (40%)"));
    }

    #[test]
    fn test_recognized_topic_sinks_below_new_topic() {
        let mut fx = Fixture::new(vec![episode("known", &["Cloud"], 1), episode("fresh", &["Data"], 2)]);
        fx.expertise.insert("Cloud".to_string(), ExpertiseLevel::Recognized);
        let out = RecommendationEngine::default().recommend(&fx.inputs(), None);
        assert_eq!(ids(&out), vec!["fresh", "known"]);
        assert!(out[1].reason.contains("Already recognized in Cloud"));
    }

    #[test]
    fn test_context_match_and_project_filter() {
        let mut crm = episode("crm", &["Negotiation"], 1);
        crm.keywords = vec!["crm".to_string()];
        crm.categories = vec![crate::types::SignalCategory::Vendor];
        let mut fx = Fixture::new(vec![episode("other", &["Ops"], 2), crm]);
        fx.context = Some(
            BriefContext::from_signals(
                "acme",
                &[crate::briefing::test_support::vendor_signal("s1", 70)],
            )
            .with_projects(["CRM replacement"]),
        );
        let engine = RecommendationEngine::default();

        let out = engine.recommend(&fx.inputs(), None);
        assert_eq!(out[0].episode.id, "crm");
        assert_eq!(out[0].matched_signals, vec!["s1"]);
        assert_eq!(out[0].matched_context, vec!["CRM replacement", "crm"]);

        let mine = engine.browse(
            &fx.inputs(),
            &BrowseQuery {
                filter: RailFilter::MyProjects,
                ..Default::default()
            },
        );
        assert_eq!(ids(&mine), vec!["crm"]);
    }

    #[test]
    fn test_newest_sort_overrides_priority() {
        let mut fx = Fixture::new(vec![
            episode("old", &["Cloud"], 1),
            episode("new", &["Data"], 20),
            episode("mid", &["Ops"], 10),
        ]);
        fx.progress.insert("old".to_string(), 50);
        let out = RecommendationEngine::default().browse(
            &fx.inputs(),
            &BrowseQuery {
                sort: SortMode::Newest,
                ..Default::default()
            },
        );
        assert_eq!(ids(&out), vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_filters_compose_with_newest() {
        let mut fx = Fixture::new(vec![
            episode("a", &["Cloud"], 1),
            episode("b", &["Data"], 5),
            episode("c", &["Ops"], 3),
        ]);
        fx.progress.insert("a".to_string(), 30);
        fx.progress.insert("b".to_string(), 60);
        let out = RecommendationEngine::default().browse(
            &fx.inputs(),
            &BrowseQuery {
                filter: RailFilter::ContinueWatching,
                sort: SortMode::Newest,
                limit: None,
            },
        );
        assert_eq!(ids(&out), vec!["b", "a"]);
    }

    #[test]
    fn test_search_substring_and_fuzzy() {
        let fx = Fixture::new(EpisodeCatalog::embedded().unwrap().all().to_vec());
        let engine = RecommendationEngine::default();
        let search = |text: &str| {
            engine.browse(
                &fx.inputs(),
                &BrowseQuery {
                    filter: RailFilter::Search(text.to_string()),
                    ..Default::default()
                },
            )
        };

        assert_eq!(ids(&search("bake-off")), vec!["ep-compete-101"]);
        // Misspelled word still finds the architecture episode.
        let fuzzy = search("architecure");
        assert!(ids(&fuzzy).contains(&"ep-arch-review"));
        assert!(search("zzzz qqqq").is_empty());
    }

    #[test]
    fn test_limit_truncates() {
        let fx = Fixture::new(vec![
            episode("a", &["Cloud"], 1),
            episode("b", &["Data"], 2),
            episode("c", &["Ops"], 3),
        ]);
        assert_eq!(RecommendationEngine::default().recommend(&fx.inputs(), Some(1)).len(), 1);
        assert!(RecommendationEngine::default().recommend(&fx.inputs(), Some(0)).is_empty());
    }
}
