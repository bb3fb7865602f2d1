//! CSV renderers, one per export file.
//!
//! Fields are escaped per RFC 4180; free-text columns are clipped to fixed
//! widths so a runaway description cannot bloat an export. Missing optional
//! values render as empty cells.

use chrono::{DateTime, Utc};

use rivalscope_db::{CompetitorRow, InsightRow, MentionRow, OpportunityRow, PresenceSummaryRow};

const DESCRIPTION_WIDTH: usize = 500;
const TITLE_WIDTH: usize = 200;
const RECOMMENDATION_WIDTH: usize = 300;

/// `competitors_overview.csv`
#[must_use]
pub fn competitors_overview_csv(competitors: &[CompetitorRow]) -> String {
    let mut out = String::new();
    write_row(
        &mut out,
        &["id", "name", "website_url", "industry", "description", "status"],
    );
    for c in competitors {
        write_row(
            &mut out,
            &[
                &c.id.to_string(),
                &c.name,
                c.website_url.as_deref().unwrap_or(""),
                c.industry.as_deref().unwrap_or(""),
                &clip(c.description.as_deref().unwrap_or(""), DESCRIPTION_WIDTH),
                &c.status,
            ],
        );
    }
    out
}

/// `news_mentions.csv`
#[must_use]
pub fn news_mentions_csv(mentions: &[MentionRow]) -> String {
    let mut out = String::new();
    write_row(
        &mut out,
        &[
            "id",
            "competitor_id",
            "title",
            "url",
            "source",
            "published_at",
            "sentiment_score",
            "extracted_at",
        ],
    );
    for m in mentions {
        write_row(
            &mut out,
            &[
                &m.id.to_string(),
                &m.competitor_id.to_string(),
                &clip(&m.title, TITLE_WIDTH),
                m.url.as_deref().unwrap_or(""),
                m.source.as_deref().unwrap_or(""),
                &opt_timestamp(m.published_at),
                &opt_float(m.sentiment_score),
                &timestamp(m.extracted_at),
            ],
        );
    }
    out
}

/// `sentiment_analysis.csv` (presence summaries)
#[must_use]
pub fn sentiment_analysis_csv(summaries: &[PresenceSummaryRow]) -> String {
    let mut out = String::new();
    write_row(
        &mut out,
        &[
            "competitor_id",
            "mention_count",
            "sentiment_average",
            "visibility_score",
            "trend_direction",
            "period_start",
            "period_end",
        ],
    );
    for s in summaries {
        write_row(
            &mut out,
            &[
                &s.competitor_id.to_string(),
                &s.mention_count.to_string(),
                &opt_float(s.sentiment_average),
                &s.visibility_score.to_string(),
                &s.trend_direction,
                &timestamp(s.period_start),
                &timestamp(s.period_end),
            ],
        );
    }
    out
}

/// `insights.csv`
#[must_use]
pub fn insights_csv(insights: &[InsightRow]) -> String {
    let mut out = String::new();
    write_row(
        &mut out,
        &[
            "id",
            "insight_type",
            "category",
            "title",
            "description",
            "priority",
            "recommendation",
            "created_at",
        ],
    );
    for i in insights {
        write_row(
            &mut out,
            &[
                &i.id.to_string(),
                &i.insight_type,
                i.category.as_deref().unwrap_or(""),
                &clip(&i.title, TITLE_WIDTH),
                &clip(i.description.as_deref().unwrap_or(""), DESCRIPTION_WIDTH),
                i.priority.as_deref().unwrap_or(""),
                &clip(
                    i.recommendation.as_deref().unwrap_or(""),
                    RECOMMENDATION_WIDTH,
                ),
                &timestamp(i.created_at),
            ],
        );
    }
    out
}

/// `differentiation_opportunities.csv`
#[must_use]
pub fn opportunities_csv(opportunities: &[OpportunityRow]) -> String {
    let mut out = String::new();
    write_row(
        &mut out,
        &[
            "id",
            "opportunity_type",
            "title",
            "description",
            "competitors_affected",
            "impact_score",
            "created_at",
        ],
    );
    for o in opportunities {
        let affected = o
            .competitors_affected
            .as_ref()
            .map(|v| serde_json::to_string(v).unwrap_or_default())
            .unwrap_or_default();
        write_row(
            &mut out,
            &[
                &o.id.to_string(),
                o.opportunity_type.as_deref().unwrap_or(""),
                &clip(&o.title, TITLE_WIDTH),
                &clip(o.description.as_deref().unwrap_or(""), DESCRIPTION_WIDTH),
                &affected,
                &opt_float(o.impact_score),
                &timestamp(o.created_at),
            ],
        );
    }
    out
}

fn write_row(out: &mut String, fields: &[&str]) {
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(&escape(field));
    }
    out.push_str("\r\n");
}

fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn clip(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339()
}

fn opt_timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(timestamp).unwrap_or_default()
}

fn opt_float(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn competitor(description: &str) -> CompetitorRow {
        CompetitorRow {
            id: 1,
            name: "Acme, Inc".to_string(),
            website_url: Some("https://acme.test".to_string()),
            twitter_url: None,
            instagram_url: None,
            facebook_url: None,
            industry: None,
            description: Some(description.to_string()),
            status: "active".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn fields_with_commas_and_quotes_are_escaped() {
        let csv = competitors_overview_csv(&[competitor("says \"hi\", loudly")]);
        let body = csv.lines().nth(1).expect("data row");
        assert!(body.contains("\"Acme, Inc\""));
        assert!(body.contains("\"says \"\"hi\"\", loudly\""));
    }

    #[test]
    fn long_descriptions_are_clipped() {
        let csv = competitors_overview_csv(&[competitor(&"x".repeat(600))]);
        let body = csv.lines().nth(1).expect("data row");
        assert!(body.contains(&"x".repeat(500)));
        assert!(!body.contains(&"x".repeat(501)));
    }

    #[test]
    fn empty_collections_render_header_only() {
        assert_eq!(news_mentions_csv(&[]).lines().count(), 1);
        assert_eq!(sentiment_analysis_csv(&[]).lines().count(), 1);
        assert_eq!(insights_csv(&[]).lines().count(), 1);
        assert_eq!(opportunities_csv(&[]).lines().count(), 1);
    }

    #[test]
    fn missing_optionals_render_as_empty_cells() {
        let mention = MentionRow {
            id: 9,
            competitor_id: 1,
            run_id: 2,
            title: "plain title".to_string(),
            url: None,
            source: None,
            published_at: None,
            content: None,
            sentiment_score: None,
            extracted_at: Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap(),
        };
        let csv = news_mentions_csv(&[mention]);
        let body = csv.lines().nth(1).expect("data row");
        assert!(body.starts_with("9,1,plain title,,,,,"));
    }

    #[test]
    fn affected_competitors_serialize_as_json() {
        let opportunity = OpportunityRow {
            id: 1,
            run_id: 2,
            opportunity_type: None,
            title: "t".to_string(),
            description: None,
            competitors_affected: Some(serde_json::json!([1, 2])),
            impact_score: Some(7.5),
            created_at: Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap(),
        };
        let csv = opportunities_csv(&[opportunity]);
        let body = csv.lines().nth(1).expect("data row");
        assert!(body.contains("\"[1,2]\""));
        assert!(body.contains("7.5"));
    }
}
