use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repository::RepoError;

/// Failure of a session operation, scoped to one request or one connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("store error: {0}")]
    Store(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    Store,
}

impl ErrorKind {
    /// HTTP status category for REST callers.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::InvalidRequest => 400,
            ErrorKind::Unauthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Store => 500,
        }
    }
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            SessionError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            SessionError::Forbidden(_) => ErrorKind::Forbidden,
            SessionError::NotFound(_) => ErrorKind::NotFound,
            SessionError::Conflict(_) => ErrorKind::Conflict,
            SessionError::Store(_) => ErrorKind::Store,
        }
    }

    /// The reason without the kind prefix, as sent to push-channel clients.
    pub fn reason(&self) -> &str {
        match self {
            SessionError::InvalidRequest(m)
            | SessionError::Unauthenticated(m)
            | SessionError::Forbidden(m)
            | SessionError::NotFound(m)
            | SessionError::Conflict(m)
            | SessionError::Store(m) => m,
        }
    }
}

impl From<RepoError> for SessionError {
    fn from(err: RepoError) -> Self {
        SessionError::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_status_categories() {
        let cases = [
            (SessionError::InvalidRequest("x".into()), 400),
            (SessionError::Unauthenticated("x".into()), 401),
            (SessionError::Forbidden("x".into()), 403),
            (SessionError::NotFound("x".into()), 404),
            (SessionError::Conflict("x".into()), 409),
            (SessionError::Store("x".into()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(err.kind().status_code(), status);
        }
    }

    #[test]
    fn repo_errors_become_store_errors() {
        let err: SessionError = RepoError::Database("connection reset".into()).into();
        assert_eq!(err.kind(), ErrorKind::Store);
        assert!(err.reason().contains("connection reset"));
    }
}
