//! Market-presence aggregation.
//!
//! Pure derivations from the sentiment scores of mentions inside the run's
//! analysis window. Persistence lives in `rivalscope-db`; this module only
//! computes.

use serde::Serialize;

/// Visibility is clamped to this ceiling.
const VISIBILITY_CAP: f64 = 100.0;

/// Mentions per window at or above which the trend reads `rising`.
const RISING_THRESHOLD: usize = 5;

/// Mentions per window at or above which the trend reads `stable`.
const STABLE_THRESHOLD: usize = 2;

/// Coarse trend classification derived from mention volume alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Stable,
    Declining,
}

impl TrendDirection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Stable => "stable",
            Self::Declining => "declining",
        }
    }
}

/// Derived presence metrics for one competitor over one analysis window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceStats {
    pub mention_count: i64,
    /// Mean of the scored mentions only; `None` when nothing was scored.
    pub sentiment_average: Option<f64>,
    pub visibility_score: f64,
    pub trend_direction: TrendDirection,
}

/// Derives presence metrics from the in-window mentions' sentiment scores.
///
/// One slice element per mention; `None` means the mention carried no score.
/// Returns `None` when there are no mentions at all, in which case no summary
/// should be recorded.
#[must_use]
pub fn summarize_presence(sentiment_scores: &[Option<f64>]) -> Option<PresenceStats> {
    if sentiment_scores.is_empty() {
        return None;
    }

    let count = sentiment_scores.len();
    let scored: Vec<f64> = sentiment_scores.iter().copied().flatten().collect();
    #[allow(clippy::cast_precision_loss)]
    let sentiment_average = if scored.is_empty() {
        None
    } else {
        Some(scored.iter().sum::<f64>() / scored.len() as f64)
    };

    #[allow(clippy::cast_precision_loss)]
    let visibility_score = (count as f64 * 2.0).min(VISIBILITY_CAP);

    let trend_direction = if count >= RISING_THRESHOLD {
        TrendDirection::Rising
    } else if count >= STABLE_THRESHOLD {
        TrendDirection::Stable
    } else {
        TrendDirection::Declining
    };

    #[allow(clippy::cast_possible_wrap)]
    Some(PresenceStats {
        mention_count: count as i64,
        sentiment_average,
        visibility_score,
        trend_direction,
    })
}
