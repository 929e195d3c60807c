use thiserror::Error;

/// Failure on the persistence layer. The scan driver logs it and moves on to
/// the next file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// The summarizer call failed or answered with an error-shaped payload.
/// The point stays unsummarized and is picked up again on the next pass.
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("summarizer is not configured: {0}")]
    Config(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("summarizer returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("summarizer reported an error: {0}")]
    ErrorPayload(String),

    #[error("summarizer returned an empty response")]
    Empty,
}

/// A report bucket could not be rendered; the remaining buckets still are.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("template not found: {0}")]
    TemplateMissing(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a file could not be turned into text. Never leaves the decoder: it
/// is folded into an error-marker text and a `*_error` format tag.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("xml: {0}")]
    Xml(String),
}
