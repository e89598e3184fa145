//! Signal intelligence and deal plan promotion.
//!
//! Ranks account signals, expands them into persona-aware briefing cards,
//! promotes section-level snapshots into durable per-account weekly deal
//! plans, and personalizes an explainer rail from brief context, watch
//! progress, topic expertise and downranking feedback.
//!
//! Hosts normally hold one [`SignalPipeline`] and call into it from their
//! views.

pub mod briefing;
pub mod config;
pub mod deal_plan;
pub mod error;
pub mod expertise;
pub mod logging;
pub mod persistence;
pub mod recommendations;
pub mod signals;
pub mod state;
pub mod trigger_bus;
pub mod types;

pub use briefing::{BriefingCard, NeedTag, Persona};
pub use config::{load_config, load_config_from, PipelineConfig, StorageBackend};
pub use deal_plan::{DealPlan, PlanAggregate, PromotedSignal, SectionKey, Selection};
pub use error::{PipelineError, PipelineErrorView, Result};
pub use expertise::{CompletionNotice, ExpertiseLevel};
pub use recommendations::{BrowseQuery, RailFilter, RecommendationCandidate, SortMode};
pub use signals::{band, ConfidenceLabel};
pub use state::{PendingBrief, SignalPipeline};
pub use trigger_bus::{DealPlanTrigger, TriggerBus};
pub use types::{ConfidenceScore, Signal, SignalCategory, SignalSource, SourceType, WeekKey};
