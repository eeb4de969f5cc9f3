use thiserror::Error;

/// Result type alias for redirect-core operations
pub type Result<T, E = RedirectError> = std::result::Result<T, E>;

/// Errors that can occur while serving a redirect.
///
/// Most variants never reach the client: store errors are masked as
/// not-found, logging errors are swallowed after a diagnostic emit, and
/// strategy errors are downgraded to a direct redirect to the known target.
#[derive(Error, Debug)]
pub enum RedirectError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] crate::config::ValidationError),

    #[error("Store lookup failed: {0}")]
    StoreLookup(#[from] linkstore::StoreError),

    #[error("Failed to build response: {0}")]
    ResponseBuild(String),

    #[error("Strategy evaluation failed: {0}")]
    StrategyFailed(String),

    #[error("Access log failure: {0}")]
    AccessLog(String),

    #[error("View limit reached for slug: {0}")]
    ViewLimitReached(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
