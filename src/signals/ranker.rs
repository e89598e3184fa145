//! Related-signal ranking.
//!
//! Pure scoring over a candidate set, safe to call on every request:
//! - Same category as the anchor: +3
//! - Each stakeholder role shared with the anchor: +2
//! - Each tag shared with the anchor (case-insensitive): +1
//! - Candidate confidence / 100 as a fractional tie-breaker

use std::collections::HashSet;

use crate::types::Signal;

use super::normalize_tag;

/// Maximum number of related signals returned.
pub const MAX_RELATED: usize = 5;

const CATEGORY_MATCH_WEIGHT: f64 = 3.0;
const SHARED_ROLE_WEIGHT: f64 = 2.0;
const SHARED_TAG_WEIGHT: f64 = 1.0;

/// Relatedness of `candidate` to `anchor`.
pub fn score_candidate(anchor: &Signal, candidate: &Signal) -> f64 {
    let mut score = 0.0;

    if candidate.category == anchor.category {
        score += CATEGORY_MATCH_WEIGHT;
    }

    let anchor_roles: HashSet<&str> = anchor.who_cares.iter().map(String::as_str).collect();
    let shared_roles = candidate
        .who_cares
        .iter()
        .map(String::as_str)
        .collect::<HashSet<_>>()
        .intersection(&anchor_roles)
        .count();
    score += SHARED_ROLE_WEIGHT * shared_roles as f64;

    let anchor_tags: HashSet<String> = anchor.tags.iter().map(|t| normalize_tag(t)).collect();
    let shared_tags = candidate
        .tags
        .iter()
        .map(|t| normalize_tag(t))
        .collect::<HashSet<_>>()
        .intersection(&anchor_tags)
        .count();
    score += SHARED_TAG_WEIGHT * shared_tags as f64;

    score + candidate.confidence_score.fraction()
}

/// Rank candidates against the anchor, returning scores alongside signals.
///
/// Excludes the anchor (by id), sorts descending by score with ties kept in
/// catalog order, and truncates to `MAX_RELATED`.
pub fn rank_scored(anchor: &Signal, candidates: &[Signal]) -> Vec<(Signal, f64)> {
    let mut scored: Vec<(Signal, f64)> = candidates
        .iter()
        .filter(|c| c.id != anchor.id)
        .map(|c| (c.clone(), score_candidate(anchor, c)))
        .collect();

    // Vec::sort_by is stable, so equal scores keep catalog order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(MAX_RELATED);
    scored
}

/// Rank candidates against the anchor.
pub fn rank(anchor: &Signal, candidates: &[Signal]) -> Vec<Signal> {
    rank_scored(anchor, candidates)
        .into_iter()
        .map(|(signal, _)| signal)
        .collect()
}
