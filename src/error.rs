//! Unified error types for resetgate.
//! Used by: reset, directory, mailer, handlers.

use std::sync::PoisonError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Body returned for every rejection a client could use to probe internal state.
pub const GENERIC_REJECTION: &str = "request could not be processed";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("reset token not found")]
    NotFound,

    #[error("reset token collision")]
    TokenCollision,

    #[error("secure random source unavailable: {0}")]
    TokenGeneration(#[from] rand::Error),

    #[error("invalid reset token")]
    InvalidToken,

    #[error("reset token store at capacity")]
    StoreFull,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("directory error: {0}")]
    Directory(String),

    #[error("mail delivery error: {0}")]
    Mail(String),

    #[error("{0} lock poisoned")]
    Lock(String),
}

impl Error {
    /// Collisions are the only condition a caller should retry with a fresh token.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TokenCollision)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Error::NotFound | Error::InvalidToken | Error::RateLimited => {
                (StatusCode::BAD_REQUEST, GENERIC_REJECTION.to_owned())
            }
            Error::InvalidCredentials => (StatusCode::UNAUTHORIZED, self.to_string()),
            Error::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            Error::StoreFull => {
                (StatusCode::SERVICE_UNAVAILABLE, "service temporarily unavailable".to_owned())
            }
            Error::TokenCollision
            | Error::TokenGeneration(_)
            | Error::Directory(_)
            | Error::Mail(_)
            | Error::Lock(_) => {
                tracing::error!(error = %self, "internal failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_owned())
            }
        };
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn lock_err<T>(what: &'static str) -> impl FnOnce(PoisonError<T>) -> Error {
    move |_| Error::Lock(what.to_owned())
}
