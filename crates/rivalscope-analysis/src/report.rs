//! Explicit per-step outcomes.
//!
//! Every collection and aggregation step reports what happened instead of
//! raising: a failed step is data, not control flow. The run as a whole only
//! fails when the driving loop itself faults.

use serde::Serialize;

/// What one pipeline step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// The step ran to the end. `records` counts the rows it persisted;
    /// zero is a valid completion (quiet competitor, empty model output).
    Completed { records: usize },
    /// The step had nothing to do, e.g. no website on file.
    Skipped { reason: String },
    /// The step hit an error. The error is contained here and the run
    /// carries on with the remaining steps and competitors.
    Failed { reason: String },
}

impl StepOutcome {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub(crate) fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub(crate) fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

/// Outcomes of the four per-competitor steps, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct CompetitorReport {
    pub competitor_id: i64,
    pub competitor_name: String,
    pub collect_news: StepOutcome,
    pub extract_web_content: StepOutcome,
    pub extract_offerings: StepOutcome,
    pub compute_presence: StepOutcome,
}

impl CompetitorReport {
    #[must_use]
    pub fn has_failure(&self) -> bool {
        self.collect_news.is_failed()
            || self.extract_web_content.is_failed()
            || self.extract_offerings.is_failed()
            || self.compute_presence.is_failed()
    }
}

/// Full account of one run execution.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: i64,
    pub competitors: Vec<CompetitorReport>,
    pub synthesize_insights: StepOutcome,
}

impl RunReport {
    /// True when the run completed but at least one step failed along the
    /// way, i.e. the stored results are partial.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.synthesize_insights.is_failed()
            || self.competitors.iter().any(CompetitorReport::has_failure)
    }

    /// Number of steps that failed across the whole run.
    #[must_use]
    pub fn failed_step_count(&self) -> usize {
        let per_competitor: usize = self
            .competitors
            .iter()
            .map(|c| {
                usize::from(c.collect_news.is_failed())
                    + usize::from(c.extract_web_content.is_failed())
                    + usize::from(c.extract_offerings.is_failed())
                    + usize::from(c.compute_presence.is_failed())
            })
            .sum();
        per_competitor + usize::from(self.synthesize_insights.is_failed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(id: i64) -> CompetitorReport {
        CompetitorReport {
            competitor_id: id,
            competitor_name: format!("competitor-{id}"),
            collect_news: StepOutcome::Completed { records: 3 },
            extract_web_content: StepOutcome::Completed { records: 4 },
            extract_offerings: StepOutcome::Completed { records: 2 },
            compute_presence: StepOutcome::Completed { records: 1 },
        }
    }

    #[test]
    fn clean_run_is_not_degraded() {
        let report = RunReport {
            run_id: 1,
            competitors: vec![clean(1), clean(2)],
            synthesize_insights: StepOutcome::Completed { records: 0 },
        };
        assert!(!report.is_degraded());
        assert_eq!(report.failed_step_count(), 0);
    }

    #[test]
    fn one_contained_failure_marks_run_degraded() {
        let mut partial = clean(1);
        partial.collect_news = StepOutcome::failed("provider timeout");
        let report = RunReport {
            run_id: 1,
            competitors: vec![partial, clean(2)],
            synthesize_insights: StepOutcome::Completed { records: 2 },
        };
        assert!(report.is_degraded());
        assert_eq!(report.failed_step_count(), 1);
    }

    #[test]
    fn offerings_failure_marks_run_degraded() {
        let mut partial = clean(1);
        partial.extract_offerings = StepOutcome::failed("model call failed");
        let report = RunReport {
            run_id: 1,
            competitors: vec![partial],
            synthesize_insights: StepOutcome::Completed { records: 0 },
        };
        assert!(report.is_degraded());
        assert_eq!(report.failed_step_count(), 1);
    }

    #[test]
    fn skipped_steps_do_not_count_as_failures() {
        let mut report = clean(1);
        report.extract_web_content = StepOutcome::skipped("no website on file");
        assert!(!report.has_failure());
    }
}
