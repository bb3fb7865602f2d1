//! External signal source: news search and web-page extraction.
//!
//! The public surface never errors. Provider failures are logged and mapped
//! to empty results (news) or an error-marker record (pages), so an adapter
//! outage for one competitor can never abort a sibling step or a run.

mod adapter;
mod error;
mod normalize;
mod types;

pub use adapter::{HttpSourceAdapter, SourceAdapter, SourceConfig, PAGE_TYPES};
pub use error::SourceError;
pub use normalize::{normalize_article, normalize_search_response, parse_published_at};
pub use types::{Article, PageContent};
