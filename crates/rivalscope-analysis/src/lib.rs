//! Analysis pipeline: run orchestration, presence aggregation, and insight
//! synthesis.
//!
//! The orchestrator drives the run state machine
//! (`pending -> in_progress -> completed|failed`) across all competitors
//! linked to a run. Per-competitor steps are failure-contained and reported
//! as explicit outcomes; only a fault in the driving loop itself fails a run.

mod context;
mod error;
mod extract;
mod llm;
mod orchestrator;
mod presence;
mod report;
mod synthesize;

pub use context::{
    build_context, render_context, CompetitorContext, FeatureContext, MentionContext, PageContext,
    PresenceContext, PricingContext, SynthesisContext, CONTEXT_CHAR_BUDGET, MENTION_CONTENT_WIDTH,
};
pub use error::AnalysisError;
pub use extract::{extract_offerings, OfferingCounts, EXTRACTION_TEXT_BUDGET};
pub use llm::{AnthropicModel, InsightModel, OpenAiModel};
pub use orchestrator::Orchestrator;
pub use presence::{summarize_presence, PresenceStats, TrendDirection};
pub use report::{CompetitorReport, RunReport, StepOutcome};
pub use synthesize::{synthesize_insights, SynthesisCounts};
