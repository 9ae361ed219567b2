use std::path::PathBuf;

use thiserror::Error;

/// Failure kinds surfaced by the watcher stages.
#[derive(Debug, Error)]
pub enum WatcherError {
    /// The OAuth client secret file needed for the first login is missing.
    #[error("client secret file not found: {}", .0.display())]
    CredentialsUnavailable(PathBuf),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("mailbox error: {0}")]
    Mail(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("token file {path}: {detail}")]
    TokenFile { path: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WatcherError>;
