use thiserror::Error;

use crate::config::LoadError;
use crate::domain::validation::ValidationErrors;
use crate::infra::error::InfraError;

/// A remote read of the album list failed. Stored in the cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode album list: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

/// A remote write failed. Surfaced only through the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("no user is signed in")]
    Unauthenticated,
}

impl MutationError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no user is signed in")]
    Unauthenticated,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("failed to get data: {0}")]
    Fetch(#[from] FetchError),
    #[error("failed to create album: {0}")]
    Mutation(#[from] MutationError),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_carry_code_and_body() {
        let err = FetchError::Status {
            status: 502,
            body: "bad gateway".into(),
        };
        assert_eq!(
            err.to_string(),
            "server responded with status 502: bad gateway"
        );
    }

    #[test]
    fn app_error_prefixes_fetch_failures() {
        let err = AppError::from(FetchError::Decode("expected array".into()));
        assert_eq!(
            err.to_string(),
            "failed to get data: failed to decode album list: expected array"
        );
    }
}
