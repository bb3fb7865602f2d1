//! Renderers for run results: CSV files and a plain-text report.
//!
//! Everything here is pure string building over rows already loaded from the
//! database, so the server and CLI can stream the output directly and tests
//! need no pool.

mod csv;
mod report;

pub use csv::{
    competitors_overview_csv, insights_csv, news_mentions_csv, opportunities_csv,
    sentiment_analysis_csv,
};
pub use report::render_run_report;
