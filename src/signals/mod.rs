//! Account signals: the read-only catalog, confidence banding, and the
//! related-signal ranker.

use unicode_normalization::UnicodeNormalization;

pub mod catalog;
pub mod confidence;
pub mod ranker;

pub use catalog::{InMemoryCatalog, SignalCatalog};
pub use confidence::{band, ConfidenceLabel, ConfidenceSummary};
pub use ranker::{rank, rank_scored};

/// Canonical form for tag comparison: trimmed, NFKC-normalized, lowercase.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().nfkc().collect::<String>().to_lowercase()
}
