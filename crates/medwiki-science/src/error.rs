use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScienceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {0}: {1}")]
    ApiError(String, String),

    #[error("rate limit from {0}, retry after {1}s")]
    RateLimit(String, u64),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("malformed record {0}: {1}")]
    MalformedRecord(String, String),

    #[error("no API key provided for {0}")]
    MissingCredential(String),

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScienceError>;
