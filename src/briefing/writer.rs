//! Persona text for briefing cards.
//!
//! Text comes from fixed templates filled with signal fields. Swap in another
//! `BriefingWriter` to change the voice without touching the assembler.

use crate::types::Signal;

pub trait BriefingWriter: Send + Sync {
    /// Talking points for a seller. Must not be empty.
    fn seller_talk_track(&self, signal: &Signal) -> Vec<String>;

    /// Technical context for an engineer. Must not be empty.
    fn engineer_context(&self, signal: &Signal) -> Vec<String>;
}

/// Fixed-template writer.
pub struct TemplateWriter;

/// Stakeholder prompts beyond this count are dropped from the talk track.
const MAX_ROLE_PROMPTS: usize = 3;

impl BriefingWriter for TemplateWriter {
    fn seller_talk_track(&self, signal: &Signal) -> Vec<String> {
        let mut track = vec![format!("Lead with the news: {}.", signal.headline)];

        if !signal.so_what.is_empty() {
            track.push(format!("Why it matters to them: {}", signal.so_what));
        }
        if let Some(fact) = signal.what_changed.first() {
            track.push(format!("Anchor on what changed: {}", fact));
        }
        for role in signal.who_cares.iter().take(MAX_ROLE_PROMPTS) {
            track.push(format!(
                "Ask the {} how this shifts their priorities this quarter.",
                role
            ));
        }
        track
    }

    fn engineer_context(&self, signal: &Signal) -> Vec<String> {
        let mut context = vec![format!(
            "{} signal: {}",
            signal.category.label(),
            signal.headline
        )];

        context.extend(
            signal
                .what_changed
                .iter()
                .map(|fact| format!("Change to validate: {}", fact)),
        );
        context.extend(signal.sources.iter().map(|source| {
            format!(
                "Verify against {} ({:?})",
                source.label,
                source.source_type
            )
        }));
        if signal.sources.is_empty() {
            context.push("No primary source yet; confirm with the account team.".to_string());
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalCategory;
    use chrono::Utc;

    #[test]
    fn test_bare_signal_still_produces_both_tracks() {
        let signal = Signal::new("s", SignalCategory::LocalMarket, "New store opening", 30, Utc::now())
            .unwrap();
        let writer = TemplateWriter;
        assert_eq!(
            writer.seller_talk_track(&signal),
            vec!["Lead with the news: New store opening."]
        );
        let context = writer.engineer_context(&signal);
        assert_eq!(context[0], "Local Market signal: New store opening");
        assert!(context[1].starts_with("No primary source"));
    }

    #[test]
    fn test_role_prompts_capped() {
        let signal = Signal::new("s", SignalCategory::Vendor, "h", 30, Utc::now())
            .unwrap()
            .with_who_cares(["CISO", "CFO", "CIO", "COO", "CEO"]);
        let track = TemplateWriter.seller_talk_track(&signal);
        assert_eq!(track.iter().filter(|t| t.starts_with("Ask the")).count(), 3);
    }
}
