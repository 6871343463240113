use std::path::PathBuf;

use thiserror::Error;

use crate::content::Category;

/// Errors raised while handling a single inbound message or reply.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("no content available for {0:?}")]
    EmptyCollection(Category),
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("malformed source {path}: {reason}")]
    MalformedSource { path: PathBuf, reason: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("LINE API returned {status}: {body}")]
    LineApi {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid webhook signature")]
    InvalidSignature,
}

/// Quiz lifecycle violations. None of these are fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("no quiz in progress")]
    NoSession,
    #[error("a quiz is already in progress")]
    AlreadyInProgress,
    #[error("quiz {requested} does not exist ({available} available)")]
    OutOfRange { requested: usize, available: usize },
}

impl From<QuizError> for BotError {
    fn from(err: QuizError) -> Self {
        BotError::InvalidSelection(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}
