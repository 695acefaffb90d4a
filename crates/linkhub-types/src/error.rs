use std::path::PathBuf;

use thiserror::Error;

/// A user-supplied link that is not a Telegram handle or profile URL.
///
/// The display text is shown to the user verbatim before re-prompting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("Only Telegram links are accepted: @username or https://t.me/username")]
    Invalid { input: String },
}

/// Errors from the project registry and its storage backends.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("project key '{0}' not found")]
    KeyNotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("corrupt record '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

/// Errors from publishing a site to the hosting platform.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("hosting platform rejected deployment (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("deployment transport error: {0}")]
    Transport(String),

    #[error("unexpected deployment response: {0}")]
    InvalidResponse(String),
}

/// Errors loading page templates from a configured directory.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read template {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal errors that abort a conversation turn.
///
/// Validation failures and metadata misses never surface here; they are
/// handled inside the flow as re-prompts or fallbacks.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Deploy(#[from] DeployError),
}
