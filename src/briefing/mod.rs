//! Quick brief assembly.
//!
//! Expands signals into persona-aware briefing cards. Cards are transient:
//! they are regenerated per request and only become durable when promoted
//! into a deal plan as a snapshot.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::signals::confidence::{band, ConfidenceLabel};
use crate::types::Signal;

pub mod generation;
pub mod knowledge;
pub mod writer;

pub use generation::{spawn_generation, BriefRequest, GenerationHandle};
pub use knowledge::{KnowledgeTable, StaticKnowledge};
pub use writer::{BriefingWriter, TemplateWriter};

/// Maximum distinct needs per quick brief request.
pub const MAX_NEEDS: usize = 2;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What the requester wants out of a brief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NeedTag {
    TalkTrack,
    ProofPoints,
    TechnicalContext,
    RiskReview,
}

impl NeedTag {
    pub fn persona(&self) -> Persona {
        match self {
            NeedTag::TalkTrack | NeedTag::ProofPoints => Persona::Seller,
            NeedTag::TechnicalContext | NeedTag::RiskReview => Persona::Engineer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Persona {
    Seller,
    Engineer,
}

/// Reference to a briefing episode owned by the content catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefingRef {
    pub episode_id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardConfidence {
    pub score: u8,
    pub label: ConfidenceLabel,
    pub reason: String,
}

/// A persona-aware expansion of one signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefingCard {
    pub id: String,
    pub signal_id: String,
    pub account_id: String,
    /// Persona shown first. Both tracks are always populated so the UI can
    /// switch without regenerating.
    pub primary_persona: Persona,
    pub seller_talk_track: Vec<String>,
    pub engineer_context: Vec<String>,
    pub whats_missing: Vec<String>,
    pub proof_to_request: Vec<String>,
    pub confidence: CardConfidence,
    pub recommended_briefings: Vec<BriefingRef>,
    pub generated_at: DateTime<Utc>,
}

impl BriefingCard {
    pub fn track_for(&self, persona: Persona) -> &[String] {
        match persona {
            Persona::Seller => &self.seller_talk_track,
            Persona::Engineer => &self.engineer_context,
        }
    }
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

pub struct QuickBriefAssembler {
    knowledge: Arc<dyn KnowledgeTable>,
    writer: Arc<dyn BriefingWriter>,
}

impl QuickBriefAssembler {
    pub fn new(knowledge: Arc<dyn KnowledgeTable>, writer: Arc<dyn BriefingWriter>) -> Self {
        Self { knowledge, writer }
    }

    /// Collapse duplicate needs and enforce `MAX_NEEDS`.
    pub fn validate_needs(needs: &[NeedTag]) -> Result<Vec<NeedTag>> {
        let mut seen = HashSet::new();
        let distinct: Vec<NeedTag> = needs.iter().copied().filter(|n| seen.insert(*n)).collect();
        if distinct.len() > MAX_NEEDS {
            return Err(PipelineError::TooManyNeeds(distinct.len()));
        }
        Ok(distinct)
    }

    /// Build one card per signal, in input order.
    pub fn assemble(
        &self,
        account_id: &str,
        needs: &[NeedTag],
        signals: &[Signal],
    ) -> Result<Vec<BriefingCard>> {
        let needs = Self::validate_needs(needs)?;
        let primary = needs
            .first()
            .map(NeedTag::persona)
            .unwrap_or(Persona::Seller);

        let cards: Vec<BriefingCard> = signals
            .iter()
            .map(|signal| self.brief_signal(account_id, primary, signal))
            .collect();

        log::debug!(
            "QuickBrief: assembled {} card(s) for {} (needs={:?})",
            cards.len(),
            account_id,
            needs
        );
        Ok(cards)
    }

    /// Build a single card for a signal.
    pub fn brief_signal(&self, account_id: &str, primary: Persona, signal: &Signal) -> BriefingCard {
        let score = signal.confidence_score.value();
        let label = band(score);

        BriefingCard {
            id: format!("bc-{}", Uuid::new_v4()),
            signal_id: signal.id.clone(),
            account_id: account_id.to_string(),
            primary_persona: primary,
            seller_talk_track: self.writer.seller_talk_track(signal),
            engineer_context: self.writer.engineer_context(signal),
            whats_missing: self.knowledge.lookup_missing(signal.category),
            proof_to_request: self.knowledge.lookup_proof(signal.category),
            confidence: CardConfidence {
                score,
                label,
                reason: confidence_reason(signal, label),
            },
            recommended_briefings: self.knowledge.lookup_briefings(signal.category),
            generated_at: Utc::now(),
        }
    }
}

fn confidence_reason(signal: &Signal, label: ConfidenceLabel) -> String {
    match signal.sources.len() {
        0 => format!("{} confidence, no corroborating sources yet", label),
        1 => format!("{} confidence from {}", label, signal.sources[0].label),
        n => {
            let names: Vec<&str> = signal
                .sources
                .iter()
                .take(2)
                .map(|s| s.label.as_str())
                .collect();
            let more = if n > 2 {
                format!(" and {} more", n - 2)
            } else {
                String::new()
            };
            format!(
                "{} confidence from {} sources ({}{})",
                label,
                n,
                names.join(", "),
                more
            )
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::types::{SignalCategory, SignalSource, SourceType};
    use chrono::TimeZone;

    pub fn assembler() -> QuickBriefAssembler {
        QuickBriefAssembler::new(
            Arc::new(StaticKnowledge::embedded().expect("embedded knowledge")),
            Arc::new(TemplateWriter),
        )
    }

    pub fn vendor_signal(id: &str, confidence: i64) -> Signal {
        Signal::new(
            id,
            SignalCategory::Vendor,
            "Incumbent CRM vendor announced price increase",
            confidence,
            Utc.with_ymd_and_hms(2026, 2, 10, 9, 0, 0).unwrap(),
        )
        .unwrap()
        .with_so_what("Renewal budget is now in play")
        .with_what_changed(["List price up 18%", "Multi-year discounts withdrawn"])
        .with_who_cares(["CFO", "CIO"])
        .with_tags(["crm", "pricing"])
        .with_sources(vec![
            SignalSource {
                label: "Vendor press release".to_string(),
                source_type: SourceType::News,
            },
            SignalSource {
                label: "Analyst note".to_string(),
                source_type: SourceType::Analyst,
            },
        ])
    }
}
