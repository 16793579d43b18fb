use thiserror::Error;

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for the engine. Row-level validation problems during
/// batch ingestion are logged and skipped rather than surfaced here.
#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("statement '{0}' has already been processed")]
    DuplicateStatement(String),

    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("upstream data source unavailable: {0}")]
    Upstream(String),
}
