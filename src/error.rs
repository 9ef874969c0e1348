//! Typed errors for the external seams: knowledge sources, token endpoints,
//! and the chat-completion API.
//!
//! Application and startup paths use `anyhow`; these enums exist so the
//! query processor can decide fallback policy per failure kind.

use thiserror::Error;

/// Failure to obtain an OAuth2 client-credentials token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("token response missing access_token")]
    MissingToken,
}

/// Failure of a single source search call.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{source_name} is not configured")]
    Disabled { source_name: String },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("search returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed search response: {0}")]
    Malformed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("search task failed: {0}")]
    Task(String),
}

/// Failure of a chat-completion call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("chat completion timed out")]
    Timeout,
    #[error("chat completion request failed: {0}")]
    Http(reqwest::Error),
    #[error("chat completion returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed chat completion response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Http(err)
        }
    }
}
