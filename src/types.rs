//! Shared domain types: signals, their sources, and the keys they are filed under.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Presentation tones
// ---------------------------------------------------------------------------

/// Visual tone for a badge. The rendering layer maps tones to colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tone {
    Critical,
    Caution,
    Info,
    Positive,
    Neutral,
}

/// A label plus tone pair the UI renders as a pill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub label: &'static str,
    pub tone: Tone,
}

// ---------------------------------------------------------------------------
// Signal category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SignalCategory {
    Regulatory,
    Vendor,
    LocalMarket,
    Competitive,
    Leadership,
    Technology,
}

impl SignalCategory {
    pub const ALL: [SignalCategory; 6] = [
        SignalCategory::Regulatory,
        SignalCategory::Vendor,
        SignalCategory::LocalMarket,
        SignalCategory::Competitive,
        SignalCategory::Leadership,
        SignalCategory::Technology,
    ];

    /// Stable key used in knowledge tables and persisted context.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalCategory::Regulatory => "regulatory",
            SignalCategory::Vendor => "vendor",
            SignalCategory::LocalMarket => "localMarket",
            SignalCategory::Competitive => "competitive",
            SignalCategory::Leadership => "leadership",
            SignalCategory::Technology => "technology",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SignalCategory::Regulatory => "Regulatory",
            SignalCategory::Vendor => "Vendor",
            SignalCategory::LocalMarket => "Local Market",
            SignalCategory::Competitive => "Competitive",
            SignalCategory::Leadership => "Leadership",
            SignalCategory::Technology => "Technology",
        }
    }

    pub fn badge(&self) -> Badge {
        let tone = match self {
            SignalCategory::Regulatory => Tone::Critical,
            SignalCategory::Vendor => Tone::Caution,
            SignalCategory::LocalMarket => Tone::Info,
            SignalCategory::Competitive => Tone::Caution,
            SignalCategory::Leadership => Tone::Positive,
            SignalCategory::Technology => Tone::Info,
        };
        Badge {
            label: self.label(),
            tone,
        }
    }
}

impl fmt::Display for SignalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceType {
    News,
    Filing,
    Analyst,
    Social,
    Internal,
}

/// Where a signal's evidence came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalSource {
    pub label: String,
    pub source_type: SourceType,
}

// ---------------------------------------------------------------------------
// Confidence score
// ---------------------------------------------------------------------------

/// Integer confidence in `0..=100`. Construction outside the range fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct ConfidenceScore(u8);

impl ConfidenceScore {
    pub const MAX: u8 = 100;

    pub fn new(score: i64) -> Result<Self, PipelineError> {
        Self::try_from(score)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Score as a `0.0..=1.0` fraction.
    pub fn fraction(self) -> f64 {
        f64::from(self.0) / f64::from(Self::MAX)
    }
}

impl TryFrom<i64> for ConfidenceScore {
    type Error = PipelineError;

    fn try_from(score: i64) -> Result<Self, Self::Error> {
        u8::try_from(score)
            .ok()
            .filter(|s| *s <= Self::MAX)
            .map(ConfidenceScore)
            .ok_or(PipelineError::ConfidenceOutOfRange(score))
    }
}

impl From<ConfidenceScore> for u8 {
    fn from(score: ConfidenceScore) -> Self {
        score.0
    }
}

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

/// An immutable, timestamped account insight supplied by the signal catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: String,
    pub category: SignalCategory,
    pub headline: String,
    pub so_what: String,
    #[serde(default)]
    pub what_changed: Vec<String>,
    #[serde(default)]
    pub who_cares: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub confidence_score: ConfidenceScore,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub sources: Vec<SignalSource>,
}

impl Signal {
    /// Build a signal with the required fields; list fields start empty.
    pub fn new(
        id: impl Into<String>,
        category: SignalCategory,
        headline: impl Into<String>,
        confidence_score: i64,
        published_at: DateTime<Utc>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            id: id.into(),
            category,
            headline: headline.into(),
            so_what: String::new(),
            what_changed: Vec::new(),
            who_cares: Vec::new(),
            tags: Vec::new(),
            confidence_score: ConfidenceScore::new(confidence_score)?,
            published_at,
            sources: Vec::new(),
        })
    }

    pub fn with_so_what(mut self, so_what: impl Into<String>) -> Self {
        self.so_what = so_what.into();
        self
    }

    pub fn with_what_changed<I, S>(mut self, facts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.what_changed = facts.into_iter().map(Into::into).collect();
        self
    }

    /// Set stakeholder roles. Duplicates are dropped, first occurrence wins.
    pub fn with_who_cares<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.who_cares = dedup_preserving_order(roles.into_iter().map(Into::into));
        self
    }

    /// Set tags. Duplicates (case-insensitive) are dropped, first occurrence wins.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        self.tags = tags
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| seen.insert(crate::signals::normalize_tag(t)))
            .collect();
        self
    }

    pub fn with_sources(mut self, sources: Vec<SignalSource>) -> Self {
        self.sources = sources;
        self
    }
}

fn dedup_preserving_order(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.filter(|item| seen.insert(item.clone())).collect()
}

// ---------------------------------------------------------------------------
// Week key
// ---------------------------------------------------------------------------

/// ISO week identifier, formatted `YYYY-Www` (e.g. `2026-W07`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WeekKey(String);

impl WeekKey {
    pub fn for_date(date: NaiveDate) -> Self {
        WeekKey(date.format("%G-W%V").to_string())
    }

    pub fn current() -> Self {
        Self::for_date(Utc::now().date_naive())
    }

    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        let invalid = || PipelineError::InvalidWeekKey(raw.to_string());
        let (year, week) = raw.split_once("-W").ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let week: u32 = week.parse().map_err(|_| invalid())?;
        let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid)?;
        Ok(Self::for_date(monday))
    }

    /// Monday of this ISO week.
    pub fn monday(&self) -> Option<NaiveDate> {
        let (year, week) = self.0.split_once("-W")?;
        NaiveDate::from_isoywd_opt(year.parse().ok()?, week.parse().ok()?, Weekday::Mon)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WeekKey {
    type Error = PipelineError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<WeekKey> for String {
    fn from(key: WeekKey) -> Self {
        key.0
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The week key a timestamp falls in (UTC).
pub fn week_of(ts: DateTime<Utc>) -> WeekKey {
    WeekKey::for_date(ts.date_naive())
}
