use std::path::PathBuf;

/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so callers can
/// handle failures by kind: transport errors are retried with back-off,
/// capture errors are reported to the requesting chat, credential and
/// startup persistence errors terminate the process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("capture error: {0}")]
    Capture(String),

    #[error("persistence error: {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
