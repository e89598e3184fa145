//! Confidence banding. Every view that renders a confidence label (quick
//! brief cards, related signals, deal plan rollups) goes through `band`.

use serde::{Deserialize, Serialize};

use crate::types::Tone;

/// Scores at or above this are "High".
pub const HIGH_THRESHOLD: u8 = 60;
/// Scores at or above this (and below `HIGH_THRESHOLD`) are "Medium".
pub const MEDIUM_THRESHOLD: u8 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfidenceLabel {
    High,
    Medium,
    Low,
}

impl ConfidenceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLabel::High => "High",
            ConfidenceLabel::Medium => "Medium",
            ConfidenceLabel::Low => "Low",
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            ConfidenceLabel::High => Tone::Positive,
            ConfidenceLabel::Medium => Tone::Caution,
            ConfidenceLabel::Low => Tone::Critical,
        }
    }
}

impl std::fmt::Display for ConfidenceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Band a 0–100 score into a label.
pub fn band(score: u8) -> ConfidenceLabel {
    if score >= HIGH_THRESHOLD {
        ConfidenceLabel::High
    } else if score >= MEDIUM_THRESHOLD {
        ConfidenceLabel::Medium
    } else {
        ConfidenceLabel::Low
    }
}

/// A score together with its band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceSummary {
    pub score: u8,
    pub label: ConfidenceLabel,
}

impl ConfidenceSummary {
    pub fn from_score(score: u8) -> Self {
        Self {
            score,
            label: band(score),
        }
    }
}
