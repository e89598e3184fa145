//! Composition root.
//!
//! `SignalPipeline` owns every component and is the only thing a host needs
//! to hold. Screens share it by reference; the trigger bus lives here rather
//! than in a global.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::briefing::{
    spawn_generation, BriefRequest, BriefingCard, GenerationHandle, KnowledgeTable, NeedTag,
    QuickBriefAssembler, StaticKnowledge, TemplateWriter,
};
use crate::config::{load_config, PipelineConfig, StorageBackend};
use crate::deal_plan::{DealPlan, DealPlanStore, PlanAggregate, SectionKey, Selection};
use crate::error::{PipelineError, Result};
use crate::expertise::{CompletionNotice, ExpertiseTracker, LevelChange};
use crate::persistence::{JsonFileRepository, MemoryRepository, SqliteRepository, StateRepository};
use crate::recommendations::{
    BriefContext, BrowseQuery, ContextCache, EpisodeCatalog, RecommendationCandidate,
    RecommendationEngine, RecommendationInputs,
};
use crate::signals::{rank, InMemoryCatalog, SignalCatalog};
use crate::trigger_bus::{DealPlanTrigger, TriggerBus};
use crate::types::{Signal, WeekKey};

/// A brief still generating. Dropping it cancels the generation.
pub struct PendingBrief {
    handle: GenerationHandle,
    context: BriefContext,
}

impl PendingBrief {
    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }
}

pub struct SignalPipeline {
    config: PipelineConfig,
    catalog: Arc<dyn SignalCatalog>,
    assembler: Arc<QuickBriefAssembler>,
    deal_plans: DealPlanStore,
    trigger_bus: Arc<TriggerBus<DealPlanTrigger>>,
    episodes: Arc<EpisodeCatalog>,
    recommender: RecommendationEngine,
    context: ContextCache,
    expertise: ExpertiseTracker,
}

impl SignalPipeline {
    /// Build from `~/.dealsignal/config.json`.
    pub fn open() -> Result<Self> {
        Self::from_config(load_config()?)
    }

    /// Build with the configured storage backend, the embedded knowledge and
    /// episode tables, and the configured signal feed (if any).
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let repo: Arc<dyn StateRepository> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryRepository::new()),
            StorageBackend::JsonFile => Arc::new(JsonFileRepository::open(config.data_dir()?)?),
            StorageBackend::Sqlite => Arc::new(SqliteRepository::open(
                SqliteRepository::default_path(&config.data_dir()?),
            )?),
        };
        let catalog: Arc<dyn SignalCatalog> = match &config.catalog_path {
            Some(path) => Arc::new(InMemoryCatalog::from_json_file(path)?),
            None => Arc::new(InMemoryCatalog::new()),
        };
        log::info!(
            "SignalPipeline: opening with {:?} storage",
            config.storage.backend
        );

        Self::with_parts(
            config,
            repo,
            catalog,
            Arc::new(StaticKnowledge::embedded()?),
            Arc::new(EpisodeCatalog::embedded()?),
        )
    }

    /// In-memory pipeline over an existing catalog, with default settings.
    pub fn in_memory(catalog: Arc<dyn SignalCatalog>) -> Result<Self> {
        Self::with_parts(
            PipelineConfig::default(),
            Arc::new(MemoryRepository::new()),
            catalog,
            Arc::new(StaticKnowledge::embedded()?),
            Arc::new(EpisodeCatalog::embedded()?),
        )
    }

    pub fn with_parts(
        config: PipelineConfig,
        repo: Arc<dyn StateRepository>,
        catalog: Arc<dyn SignalCatalog>,
        knowledge: Arc<dyn KnowledgeTable>,
        episodes: Arc<EpisodeCatalog>,
    ) -> Result<Self> {
        config.validate()?;
        let assembler = Arc::new(QuickBriefAssembler::new(knowledge, Arc::new(TemplateWriter)));
        let deal_plans = DealPlanStore::new(repo.clone(), catalog.clone(), assembler.clone());
        let context = ContextCache::open(repo)?;
        let expertise = ExpertiseTracker::new(
            episodes.clone(),
            config.expertise.clone(),
            config.completion_display(),
        );
        let recommender = RecommendationEngine::new(config.recommendations.clone());

        Ok(Self {
            config,
            catalog,
            assembler,
            deal_plans,
            trigger_bus: Arc::new(TriggerBus::new()),
            episodes,
            recommender,
            context,
            expertise,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<dyn SignalCatalog> {
        &self.catalog
    }

    pub fn deal_plans(&self) -> &DealPlanStore {
        &self.deal_plans
    }

    pub fn trigger_bus(&self) -> &Arc<TriggerBus<DealPlanTrigger>> {
        &self.trigger_bus
    }

    pub fn episodes(&self) -> &EpisodeCatalog {
        &self.episodes
    }

    pub fn expertise(&self) -> &ExpertiseTracker {
        &self.expertise
    }

    pub fn context(&self) -> &ContextCache {
        &self.context
    }

    // -- Signals ------------------------------------------------------------

    pub fn signals(&self, account_id: &str, week_key: &WeekKey) -> Vec<Signal> {
        self.catalog.get_signals(account_id, week_key)
    }

    /// Related signals for the detail panel. Unknown anchors have none.
    pub fn related_signals(&self, account_id: &str, week_key: &WeekKey, signal_id: &str) -> Vec<Signal> {
        let signals = self.catalog.get_signals(account_id, week_key);
        match signals.iter().find(|s| s.id == signal_id) {
            Some(anchor) => rank(anchor, &signals),
            None => Vec::new(),
        }
    }

    // -- Quick brief --------------------------------------------------------

    /// Assemble cards now and remember the brief as recommendation context.
    pub fn quick_brief(
        &self,
        account_id: &str,
        week_key: &WeekKey,
        needs: &[NeedTag],
        signal_ids: &[String],
    ) -> Result<Vec<BriefingCard>> {
        let signals = self.resolve_signals(account_id, week_key, signal_ids)?;
        let cards = self.assembler.assemble(account_id, needs, &signals)?;
        self.context
            .set_last_brief_context(BriefContext::from_signals(account_id, &signals))?;
        Ok(cards)
    }

    /// Start a delayed, cancelable generation on the current tokio runtime.
    ///
    /// The brief becomes recommendation context only when its cards are
    /// applied through `finish_brief`; a dismissed brief leaves no trace.
    pub fn generate_brief(
        &self,
        account_id: &str,
        week_key: &WeekKey,
        needs: &[NeedTag],
        signal_ids: &[String],
    ) -> Result<PendingBrief> {
        let signals = self.resolve_signals(account_id, week_key, signal_ids)?;
        let context = BriefContext::from_signals(account_id, &signals);
        let handle = spawn_generation(
            self.assembler.clone(),
            BriefRequest {
                account_id: account_id.to_string(),
                needs: needs.to_vec(),
                signals,
            },
            self.config.generation_delay(),
        )?;
        Ok(PendingBrief { handle, context })
    }

    /// Wait for a pending brief. `None` means it was cancelled and nothing
    /// was recorded.
    pub async fn finish_brief(&self, pending: PendingBrief) -> Result<Option<Vec<BriefingCard>>> {
        let PendingBrief { handle, context } = pending;
        let Some(cards) = handle.outcome().await else {
            return Ok(None);
        };
        self.context.set_last_brief_context(context)?;
        Ok(Some(cards))
    }

    fn resolve_signals(
        &self,
        account_id: &str,
        week_key: &WeekKey,
        signal_ids: &[String],
    ) -> Result<Vec<Signal>> {
        let live = self.catalog.get_signals(account_id, week_key);
        signal_ids
            .iter()
            .map(|id| {
                live.iter()
                    .find(|s| &s.id == id)
                    .cloned()
                    .ok_or_else(|| PipelineError::InvalidSelection {
                        account_id: account_id.to_string(),
                        week_key: week_key.to_string(),
                        signal_id: id.clone(),
                    })
            })
            .collect()
    }

    // -- Deal plans ---------------------------------------------------------

    pub fn promote(&self, account_id: &str, week_key: &WeekKey, selections: &[Selection]) -> Result<()> {
        self.deal_plans.promote(account_id, week_key, selections)
    }

    pub fn promote_with_cards(
        &self,
        account_id: &str,
        week_key: &WeekKey,
        selections: &[Selection],
        active_cards: &[BriefingCard],
    ) -> Result<()> {
        self.deal_plans
            .promote_with_cards(account_id, week_key, selections, active_cards)
    }

    pub fn remove(&self, account_id: &str, week_key: &WeekKey, signal_id: &str) -> Result<()> {
        self.deal_plans.remove(account_id, week_key, signal_id)
    }

    pub fn update_sections(
        &self,
        account_id: &str,
        week_key: &WeekKey,
        signal_id: &str,
        sections: BTreeSet<SectionKey>,
    ) -> Result<bool> {
        self.deal_plans
            .update_sections(account_id, week_key, signal_id, sections)
    }

    pub fn deal_plan(&self, account_id: &str, week_key: &WeekKey) -> Result<Option<DealPlan>> {
        self.deal_plans.get(account_id, week_key)
    }

    pub fn aggregate(&self, plan: &DealPlan) -> PlanAggregate {
        self.deal_plans.aggregate(plan)
    }

    /// Ask the deal planning screen to open on this account and week.
    pub fn open_deal_plan(&self, account_id: &str, week_key: &WeekKey, focus_signal_ids: Vec<String>) {
        self.trigger_bus.set_trigger(DealPlanTrigger {
            account_id: account_id.to_string(),
            week_key: week_key.clone(),
            focus_signal_ids,
        });
    }

    // -- Recommendation rail ------------------------------------------------

    pub fn recommend(&self, limit: Option<usize>) -> Vec<RecommendationCandidate> {
        let context = self.context.last_brief_context();
        let progress = self.expertise.progress();
        let levels = self.expertise.levels();
        let downranked = self.context.downranked_topics();
        let inputs = RecommendationInputs {
            episodes: self.episodes.all(),
            brief_context: context.as_ref(),
            progress: &progress,
            expertise: &levels,
            downranked: &downranked,
        };
        self.recommender.recommend(&inputs, limit)
    }

    pub fn browse(&self, query: &BrowseQuery) -> Vec<RecommendationCandidate> {
        let context = self.context.last_brief_context();
        let progress = self.expertise.progress();
        let levels = self.expertise.levels();
        let downranked = self.context.downranked_topics();
        let inputs = RecommendationInputs {
            episodes: self.episodes.all(),
            brief_context: context.as_ref(),
            progress: &progress,
            expertise: &levels,
            downranked: &downranked,
        };
        self.recommender.browse(&inputs, query)
    }

    pub fn downrank(&self, topic: &str) -> Result<bool> {
        self.context.downrank(topic)
    }

    pub fn restore_topic(&self, topic: &str) -> Result<bool> {
        self.context.restore_topic(topic)
    }

    pub fn update_progress(&self, episode_id: &str, percent: i32) -> Result<Vec<LevelChange>> {
        self.expertise.update_progress(episode_id, percent)
    }

    pub fn recently_completed(&self) -> Option<CompletionNotice> {
        self.expertise.recently_completed()
    }

    pub fn dismiss_completion(&self) {
        self.expertise.dismiss();
    }

    /// Cancel pending timers before the host tears down.
    pub fn shutdown(&self) {
        self.expertise.shutdown();
        log::info!("SignalPipeline: shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::briefing::test_support::vendor_signal;
    use crate::config::StorageConfig;

    fn week() -> WeekKey {
        WeekKey::parse("2026-W07").unwrap()
    }

    fn pipeline() -> SignalPipeline {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.insert(
            "acme",
            week(),
            vec![vendor_signal("s1", 80), vendor_signal("s2", 40)],
        );
        SignalPipeline::in_memory(catalog).unwrap()
    }

    #[test]
    fn test_related_signals_unknown_anchor_is_empty() {
        let pipeline = pipeline();
        assert!(pipeline.related_signals("acme", &week(), "nope").is_empty());
        let related = pipeline.related_signals("acme", &week(), "s1");
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].id, "s2");
    }

    #[test]
    fn test_quick_brief_records_context() {
        let pipeline = pipeline();
        let cards = pipeline
            .quick_brief("acme", &week(), &[NeedTag::TalkTrack], &["s2".to_string()])
            .unwrap();
        assert_eq!(cards.len(), 1);
        let ctx = pipeline.context().last_brief_context().unwrap();
        assert_eq!(ctx.signals[0].signal_id, "s2");

        // Vendor context boosts the vendor episode to the top.
        let top = pipeline.recommend(Some(1));
        assert_eq!(top[0].episode.id, "ep-vendor-displace");
    }

    #[test]
    fn test_quick_brief_unknown_signal() {
        let result = pipeline().quick_brief("acme", &week(), &[], &["ghost".to_string()]);
        assert!(matches!(result, Err(PipelineError::InvalidSelection { .. })));
    }

    #[test]
    fn test_generate_brief_outside_runtime_errors() {
        let result =
            pipeline().generate_brief("acme", &week(), &[NeedTag::TalkTrack], &["s1".to_string()]);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismissed_brief_leaves_context_untouched() {
        let pipeline = pipeline();
        let pending = pipeline
            .generate_brief("acme", &week(), &[NeedTag::TalkTrack], &["s1".to_string()])
            .unwrap();
        assert!(pipeline.context().last_brief_context().is_none());

        pending.cancel();
        assert!(pipeline.finish_brief(pending).await.unwrap().is_none());
        assert!(pipeline.context().last_brief_context().is_none());

        let pending = pipeline
            .generate_brief("acme", &week(), &[NeedTag::TalkTrack], &["s2".to_string()])
            .unwrap();
        let cards = pipeline.finish_brief(pending).await.unwrap().unwrap();
        assert_eq!(cards[0].signal_id, "s2");
        let ctx = pipeline.context().last_brief_context().unwrap();
        assert_eq!(ctx.signals[0].signal_id, "s2");
    }

    #[test]
    fn test_with_parts_rejects_invalid_config() {
        let mut config = PipelineConfig::default();
        config.recommendations.downrank_penalty = 100;
        let result = SignalPipeline::with_parts(
            config,
            Arc::new(MemoryRepository::new()),
            Arc::new(InMemoryCatalog::new()),
            Arc::new(StaticKnowledge::embedded().unwrap()),
            Arc::new(EpisodeCatalog::embedded().unwrap()),
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_open_deal_plan_sets_trigger() {
        let pipeline = pipeline();
        pipeline.open_deal_plan("acme", &week(), vec!["s1".to_string()]);
        let trigger = pipeline.trigger_bus().consume_trigger().unwrap();
        assert_eq!(trigger.account_id, "acme");
        assert!(pipeline.trigger_bus().consume_trigger().is_none());
    }

    #[test]
    fn test_json_file_backend_persists_across_pipelines() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.insert("acme", week(), vec![vendor_signal("s1", 80)]);
        let config = PipelineConfig {
            storage: StorageConfig {
                backend: StorageBackend::JsonFile,
                data_dir: Some(dir.path().to_path_buf()),
            },
            ..Default::default()
        };

        let open = || {
            SignalPipeline::with_parts(
                config.clone(),
                Arc::new(JsonFileRepository::open(dir.path()).unwrap()),
                catalog.clone(),
                Arc::new(StaticKnowledge::embedded().unwrap()),
                Arc::new(EpisodeCatalog::embedded().unwrap()),
            )
            .unwrap()
        };

        let first = open();
        first
            .promote("acme", &week(), &[Selection::all_sections("s1")])
            .unwrap();
        first.downrank("Security").unwrap();
        drop(first);

        let second = open();
        assert_eq!(second.deal_plan("acme", &week()).unwrap().unwrap().len(), 1);
        assert!(second.context().is_downranked("security"));
    }

    #[test]
    fn test_from_config_sqlite_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            storage: StorageConfig {
                backend: StorageBackend::Sqlite,
                data_dir: Some(dir.path().to_path_buf()),
            },
            ..Default::default()
        };
        let pipeline = SignalPipeline::from_config(config).unwrap();
        assert!(pipeline.deal_plan("acme", &week()).unwrap().is_none());
        assert!(dir.path().join("dealsignal.db").exists());
    }
}
