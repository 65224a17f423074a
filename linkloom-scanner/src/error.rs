use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Malformed link {link:?} on {page}: {reason}")]
    MalformedLink {
        page: String,
        link: String,
        reason: String,
    },

    #[error("Deduplication store is closed")]
    StoreClosed,
}

pub type Result<T> = std::result::Result<T, ScanError>;
