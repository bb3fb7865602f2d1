//! Plain-text run report.
//!
//! Mirrors the export sections: executive summary, market presence,
//! competitor comparison, news and sentiment, insights, opportunities.
//! Sections with nothing to show carry an explicit placeholder line.

use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::Utc;

use rivalscope_db::{
    AnalysisRunRow, CompetitorRow, InsightRow, MentionRow, OpportunityRow, PresenceSummaryRow,
};

const NEWS_ROW_LIMIT: usize = 30;

/// Renders the full report for a run from rows already loaded by the caller.
#[must_use]
pub fn render_run_report(
    run: &AnalysisRunRow,
    competitors: &[CompetitorRow],
    presence: &[PresenceSummaryRow],
    mentions: &[MentionRow],
    insights: &[InsightRow],
    opportunities: &[OpportunityRow],
) -> String {
    let mut out = String::new();
    let names: HashMap<i64, &str> = competitors
        .iter()
        .map(|c| (c.id, c.name.as_str()))
        .collect();

    section(&mut out, "Competitor Analysis Report");
    let _ = writeln!(
        out,
        "Run: {} | Status: {} | Generated: {}",
        run.name,
        run.status,
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    );
    out.push('\n');

    section(&mut out, "Executive Summary");
    let _ = writeln!(
        out,
        "This report covers {} competitor(s), {} news mention(s), and {} insight(s).",
        competitors.len(),
        mentions.len(),
        insights.len()
    );
    out.push('\n');

    section(&mut out, "Market Presence");
    if presence.is_empty() {
        out.push_str("No market presence data for this run.\n");
    } else {
        for summary in presence {
            let name = names
                .get(&summary.competitor_id)
                .copied()
                .map_or_else(|| summary.competitor_id.to_string(), ToOwned::to_owned);
            let _ = writeln!(
                out,
                "- {name}: {} mention(s), sentiment {}, visibility {:.0}, trend {}",
                summary.mention_count,
                summary
                    .sentiment_average
                    .map_or_else(|| "n/a".to_string(), |avg| format!("{avg:.2}")),
                summary.visibility_score,
                summary.trend_direction
            );
        }
    }
    out.push('\n');

    section(&mut out, "Competitor Comparison");
    if competitors.is_empty() {
        out.push_str("No competitors linked to this run.\n");
    } else {
        for c in competitors {
            let _ = writeln!(
                out,
                "- {} | {} | {}",
                c.name,
                c.industry.as_deref().unwrap_or("n/a"),
                c.website_url.as_deref().unwrap_or("n/a")
            );
        }
    }
    out.push('\n');

    section(&mut out, "News & Sentiment");
    if mentions.is_empty() {
        out.push_str("No news mentions for this run.\n");
    } else {
        for m in mentions.iter().take(NEWS_ROW_LIMIT) {
            let _ = writeln!(
                out,
                "- [{}] {} ({}) sentiment {}",
                names
                    .get(&m.competitor_id)
                    .copied()
                    .map_or_else(|| m.competitor_id.to_string(), ToOwned::to_owned),
                clip(&m.title, 80),
                m.source.as_deref().unwrap_or("unknown source"),
                m.sentiment_score
                    .map_or_else(|| "n/a".to_string(), |s| format!("{s:.2}")),
            );
        }
        if mentions.len() > NEWS_ROW_LIMIT {
            let _ = writeln!(out, "... and {} more", mentions.len() - NEWS_ROW_LIMIT);
        }
    }
    out.push('\n');

    section(&mut out, "Insights");
    if insights.is_empty() {
        out.push_str("No insights generated yet.\n");
    } else {
        for i in insights {
            let _ = writeln!(out, "* {} [{}]", i.title, i.insight_type);
            if let Some(description) = &i.description {
                let _ = writeln!(out, "  {}", clip(description, 500));
            }
            if let Some(recommendation) = &i.recommendation {
                let _ = writeln!(out, "  Recommendation: {}", clip(recommendation, 300));
            }
        }
    }
    out.push('\n');

    section(&mut out, "Differentiation Opportunities");
    if opportunities.is_empty() {
        out.push_str("No opportunities generated yet.\n");
    } else {
        for o in opportunities {
            let _ = writeln!(out, "* {}", o.title);
            if let Some(description) = &o.description {
                let _ = writeln!(out, "  {}", clip(description, 400));
            }
        }
    }

    out
}

fn section(out: &mut String, title: &str) {
    out.push_str(title);
    out.push('\n');
    out.push_str(&"=".repeat(title.len()));
    out.push('\n');
}

fn clip(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
