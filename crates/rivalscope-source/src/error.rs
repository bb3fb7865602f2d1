use thiserror::Error;

/// Internal adapter error. The public [`SourceAdapter`](crate::SourceAdapter)
/// surface contains these; they only appear in logs and page error markers.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}
