use rivalscope_db::DbError;
use thiserror::Error;

/// Errors surfaced by the analysis pipeline.
///
/// Per-competitor step failures never appear here; they are contained into
/// [`StepOutcome::Failed`](crate::StepOutcome::Failed). These variants cover
/// faults of the driving loop itself.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis run {0} not found")]
    RunNotFound(i64),

    /// The run was not in a startable state, typically because another
    /// orchestrator already claimed it.
    #[error("analysis run {0} is not pending")]
    InvalidTransition(i64),

    #[error("synthesis model call failed: {0}")]
    Model(String),

    #[error(transparent)]
    Db(#[from] DbError),
}
