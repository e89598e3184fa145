//! Deal plan rollups: combined gaps, combined proof requests, and average
//! confidence across every promoted signal.

use std::collections::HashSet;

use serde::Serialize;

use crate::signals::confidence::ConfidenceSummary;

use super::DealPlan;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanAggregate {
    pub missing: Vec<String>,
    pub proof: Vec<String>,
    /// `None` means "no signals yet", never "0% confidence".
    pub avg_confidence: Option<ConfidenceSummary>,
}

/// Roll up a plan.
///
/// `missing` and `proof` are exact-match deduplicated unions in order of first
/// appearance. The average is the rounded mean of snapshot confidence scores.
pub fn aggregate(plan: &DealPlan) -> PlanAggregate {
    let mut missing = Vec::new();
    let mut proof = Vec::new();
    let mut seen_missing = HashSet::new();
    let mut seen_proof = HashSet::new();

    for promoted in &plan.promoted_signals {
        for item in &promoted.briefing.whats_missing {
            if seen_missing.insert(item.as_str()) {
                missing.push(item.clone());
            }
        }
        for item in &promoted.briefing.proof_to_request {
            if seen_proof.insert(item.as_str()) {
                proof.push(item.clone());
            }
        }
    }

    let avg_confidence = if plan.promoted_signals.is_empty() {
        None
    } else {
        let total: u32 = plan
            .promoted_signals
            .iter()
            .map(|p| u32::from(p.briefing.confidence.score))
            .sum();
        let mean = f64::from(total) / plan.promoted_signals.len() as f64;
        Some(ConfidenceSummary::from_score(mean.round() as u8))
    };

    PlanAggregate {
        missing,
        proof,
        avg_confidence,
    }
}
