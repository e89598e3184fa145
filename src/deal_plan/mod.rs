//! Deal plan promotion store.
//!
//! A deal plan is the durable, per-account-per-week record of promoted
//! signals. Each promotion freezes a snapshot of the signal and its briefing
//! so later catalog changes never rewrite history. Re-promoting a signal
//! replaces its snapshot in place; removal never reorders the remainder.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::briefing::{BriefingCard, CardConfidence, Persona, QuickBriefAssembler};
use crate::error::{PipelineError, Result};
use crate::persistence::{self, Namespace, StateRepository};
use crate::signals::SignalCatalog;
use crate::types::{Signal, SignalSource, WeekKey};

pub mod aggregate;

pub use aggregate::{aggregate, PlanAggregate};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Briefing sections that can be carried into a deal plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SectionKey {
    TalkTrack,
    Confidence,
    WhatsMissing,
    ProofToRequest,
    WhoCares,
    Sources,
}

impl SectionKey {
    pub const ALL: [SectionKey; 6] = [
        SectionKey::TalkTrack,
        SectionKey::Confidence,
        SectionKey::WhatsMissing,
        SectionKey::ProofToRequest,
        SectionKey::WhoCares,
        SectionKey::Sources,
    ];
}

/// A user's choice to promote one signal with a subset of sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub signal_id: String,
    pub included_sections: BTreeSet<SectionKey>,
}

impl Selection {
    pub fn new(signal_id: impl Into<String>, sections: impl IntoIterator<Item = SectionKey>) -> Self {
        Self {
            signal_id: signal_id.into(),
            included_sections: sections.into_iter().collect(),
        }
    }

    pub fn all_sections(signal_id: impl Into<String>) -> Self {
        Self::new(signal_id, SectionKey::ALL)
    }
}

/// Briefing content frozen at promotion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BriefingSnapshot {
    pub primary_persona: Persona,
    pub seller_talk_track: Vec<String>,
    pub engineer_context: Vec<String>,
    pub whats_missing: Vec<String>,
    pub proof_to_request: Vec<String>,
    pub confidence: CardConfidence,
}

impl From<&BriefingCard> for BriefingSnapshot {
    fn from(card: &BriefingCard) -> Self {
        Self {
            primary_persona: card.primary_persona,
            seller_talk_track: card.seller_talk_track.clone(),
            engineer_context: card.engineer_context.clone(),
            whats_missing: card.whats_missing.clone(),
            proof_to_request: card.proof_to_request.clone(),
            confidence: card.confidence.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotedSignal {
    pub signal: Signal,
    pub briefing: BriefingSnapshot,
    pub included_sections: BTreeSet<SectionKey>,
    pub promoted_at: DateTime<Utc>,
}

/// One included section, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "section", rename_all = "camelCase")]
pub enum SectionView<'a> {
    TalkTrack {
        seller: &'a [String],
        engineer: &'a [String],
    },
    Confidence {
        confidence: &'a CardConfidence,
    },
    WhatsMissing {
        items: &'a [String],
    },
    ProofToRequest {
        items: &'a [String],
    },
    WhoCares {
        roles: &'a [String],
    },
    Sources {
        sources: &'a [SignalSource],
    },
}

impl PromotedSignal {
    /// Freeze a signal and its card into a snapshot.
    pub fn snapshot(
        signal: &Signal,
        card: &BriefingCard,
        included_sections: BTreeSet<SectionKey>,
    ) -> Self {
        Self {
            signal: signal.clone(),
            briefing: BriefingSnapshot::from(card),
            included_sections,
            promoted_at: Utc::now(),
        }
    }

    pub fn signal_id(&self) -> &str {
        &self.signal.id
    }

    /// Included sections in canonical order.
    pub fn visible_sections(&self) -> Vec<SectionView<'_>> {
        self.included_sections
            .iter()
            .map(|key| match key {
                SectionKey::TalkTrack => SectionView::TalkTrack {
                    seller: &self.briefing.seller_talk_track,
                    engineer: &self.briefing.engineer_context,
                },
                SectionKey::Confidence => SectionView::Confidence {
                    confidence: &self.briefing.confidence,
                },
                SectionKey::WhatsMissing => SectionView::WhatsMissing {
                    items: &self.briefing.whats_missing,
                },
                SectionKey::ProofToRequest => SectionView::ProofToRequest {
                    items: &self.briefing.proof_to_request,
                },
                SectionKey::WhoCares => SectionView::WhoCares {
                    roles: &self.signal.who_cares,
                },
                SectionKey::Sources => SectionView::Sources {
                    sources: &self.signal.sources,
                },
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealPlan {
    pub account_id: String,
    pub week_key: WeekKey,
    /// Promotion order; stable under removal.
    pub promoted_signals: Vec<PromotedSignal>,
}

impl DealPlan {
    fn empty(account_id: &str, week_key: &WeekKey) -> Self {
        Self {
            account_id: account_id.to_string(),
            week_key: week_key.clone(),
            promoted_signals: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.promoted_signals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.promoted_signals.len()
    }

    pub fn find(&self, signal_id: &str) -> Option<&PromotedSignal> {
        self.promoted_signals
            .iter()
            .find(|p| p.signal_id() == signal_id)
    }

    pub fn aggregate(&self) -> PlanAggregate {
        aggregate(self)
    }

    /// Replace in place if present, otherwise append.
    fn upsert(&mut self, promoted: PromotedSignal) {
        match self
            .promoted_signals
            .iter_mut()
            .find(|p| p.signal_id() == promoted.signal_id())
        {
            Some(existing) => *existing = promoted,
            None => self.promoted_signals.push(promoted),
        }
    }
}

/// Persisted form: `{ "promotedSignals": [...] }` under `accountId:weekKey`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPlan {
    promoted_signals: Vec<PromotedSignal>,
}

fn plan_key(account_id: &str, week_key: &WeekKey) -> String {
    format!("{}:{}", account_id, week_key)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct DealPlanStore {
    repo: Arc<dyn StateRepository>,
    catalog: Arc<dyn SignalCatalog>,
    assembler: Arc<QuickBriefAssembler>,
    plans: Mutex<HashMap<String, DealPlan>>,
}

impl DealPlanStore {
    pub fn new(
        repo: Arc<dyn StateRepository>,
        catalog: Arc<dyn SignalCatalog>,
        assembler: Arc<QuickBriefAssembler>,
    ) -> Self {
        Self {
            repo,
            catalog,
            assembler,
            plans: Mutex::new(HashMap::new()),
        }
    }

    /// Promote selections, regenerating a briefing card for each signal.
    pub fn promote(&self, account_id: &str, week_key: &WeekKey, selections: &[Selection]) -> Result<()> {
        self.promote_with_cards(account_id, week_key, selections, &[])
    }

    /// Promote selections using the cards the viewer currently has open.
    ///
    /// Every selection is validated against the live catalog before anything
    /// is written; one unknown id rejects the whole call.
    pub fn promote_with_cards(
        &self,
        account_id: &str,
        week_key: &WeekKey,
        selections: &[Selection],
        active_cards: &[BriefingCard],
    ) -> Result<()> {
        if selections.is_empty() {
            return Ok(());
        }

        let live = self.catalog.get_signals(account_id, week_key);
        let mut snapshots = Vec::with_capacity(selections.len());
        for selection in selections {
            let signal = live
                .iter()
                .find(|s| s.id == selection.signal_id)
                .ok_or_else(|| PipelineError::InvalidSelection {
                    account_id: account_id.to_string(),
                    week_key: week_key.to_string(),
                    signal_id: selection.signal_id.clone(),
                })?;

            let snapshot = match active_cards.iter().find(|c| c.signal_id == signal.id) {
                Some(card) => PromotedSignal::snapshot(signal, card, selection.included_sections.clone()),
                None => {
                    let card = self.assembler.brief_signal(account_id, Persona::Seller, signal);
                    PromotedSignal::snapshot(signal, &card, selection.included_sections.clone())
                }
            };
            snapshots.push(snapshot);
        }

        let key = plan_key(account_id, week_key);
        let mut plans = self.plans.lock();
        let mut next = match self.cached_or_load(&mut plans, &key, account_id, week_key)? {
            Some(plan) => plan,
            None => DealPlan::empty(account_id, week_key),
        };
        for snapshot in snapshots {
            next.upsert(snapshot);
        }

        self.persist(&key, &next)?;
        log::info!(
            "DealPlan: promoted {} signal(s) into {} ({} total)",
            selections.len(),
            key,
            next.len()
        );
        plans.insert(key, next);
        Ok(())
    }

    /// Remove a promoted signal. Absent plans or ids are a no-op.
    pub fn remove(&self, account_id: &str, week_key: &WeekKey, signal_id: &str) -> Result<()> {
        let key = plan_key(account_id, week_key);
        let mut plans = self.plans.lock();
        let Some(mut next) = self.cached_or_load(&mut plans, &key, account_id, week_key)? else {
            return Ok(());
        };
        if next.find(signal_id).is_none() {
            return Ok(());
        }

        next.promoted_signals.retain(|p| p.signal_id() != signal_id);
        self.persist(&key, &next)?;
        log::info!("DealPlan: removed {} from {} ({} left)", signal_id, key, next.len());
        plans.insert(key, next);
        Ok(())
    }

    /// Change which sections a promoted snapshot includes, keeping its content.
    ///
    /// Returns false if the signal is not in the plan.
    pub fn update_sections(
        &self,
        account_id: &str,
        week_key: &WeekKey,
        signal_id: &str,
        sections: BTreeSet<SectionKey>,
    ) -> Result<bool> {
        let key = plan_key(account_id, week_key);
        let mut plans = self.plans.lock();
        let Some(mut next) = self.cached_or_load(&mut plans, &key, account_id, week_key)? else {
            return Ok(false);
        };
        let Some(promoted) = next
            .promoted_signals
            .iter_mut()
            .find(|p| p.signal.id == signal_id)
        else {
            return Ok(false);
        };
        promoted.included_sections = sections;

        self.persist(&key, &next)?;
        plans.insert(key, next);
        Ok(true)
    }

    /// The plan for an account and week. `None` only if nothing was ever
    /// promoted there; an emptied plan is returned as present-but-empty.
    pub fn get(&self, account_id: &str, week_key: &WeekKey) -> Result<Option<DealPlan>> {
        let key = plan_key(account_id, week_key);
        let mut plans = self.plans.lock();
        self.cached_or_load(&mut plans, &key, account_id, week_key)
    }

    pub fn aggregate(&self, plan: &DealPlan) -> PlanAggregate {
        aggregate(plan)
    }

    /// Weeks with a plan (possibly empty) for an account, oldest first.
    pub fn plans_for_account(&self, account_id: &str) -> Result<Vec<WeekKey>> {
        let prefix = format!("{}:", account_id);
        let mut weeks = Vec::new();
        for key in self.repo.keys(Namespace::DealPlans)? {
            let Some(raw_week) = key.strip_prefix(&prefix) else {
                continue;
            };
            match WeekKey::parse(raw_week) {
                Ok(week) => weeks.push(week),
                Err(_) => log::warn!("DealPlan: skipping malformed key {}", key),
            }
        }
        weeks.sort();
        Ok(weeks)
    }

    fn cached_or_load(
        &self,
        plans: &mut HashMap<String, DealPlan>,
        key: &str,
        account_id: &str,
        week_key: &WeekKey,
    ) -> Result<Option<DealPlan>> {
        if let Some(plan) = plans.get(key) {
            return Ok(Some(plan.clone()));
        }
        let stored: Option<StoredPlan> =
            persistence::load_json(self.repo.as_ref(), Namespace::DealPlans, key)?;
        Ok(stored.map(|stored| {
            let plan = DealPlan {
                account_id: account_id.to_string(),
                week_key: week_key.clone(),
                promoted_signals: stored.promoted_signals,
            };
            plans.insert(key.to_string(), plan.clone());
            plan
        }))
    }

    fn persist(&self, key: &str, plan: &DealPlan) -> Result<()> {
        let stored = StoredPlan {
            promoted_signals: plan.promoted_signals.clone(),
        };
        persistence::save_json(self.repo.as_ref(), Namespace::DealPlans, key, &stored)?;
        Ok(())
    }
}
