//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur while authenticating a request.
///
/// All variants except `Repository` are client errors and map to 401.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No `Authorization` header.
    #[error("missing bearer token")]
    MissingToken,

    /// Header present but not `Bearer <token>`.
    #[error("malformed authorization header")]
    MalformedHeader,

    #[error("token expired")]
    Expired,

    /// Bad signature, bad claims or unparsable token.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token's subject no longer exists.
    #[error("user not found")]
    UnknownUser,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
