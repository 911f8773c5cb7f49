//! Failure taxonomy for experiment resolution.
//!
//! None of these escape the public resolution API: every variant degrades to
//! "no experiment" and is only logged.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResolveError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// No experiment metadata on the page, or the client is excluded.
    #[error("no experiment: {0}")]
    NotFound(String),

    /// The manifest parsed but lacks required rows or fields.
    #[error("malformed experiment config: {0}")]
    MalformedConfig(String),

    /// Transport error, non-OK status, or a body that is not JSON.
    #[error("failed to fetch {location}: {reason}")]
    FetchFailure { location: String, reason: String },
}

impl ResolveError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ResolveError::MalformedConfig(message.into())
    }
}
