use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuditError {
    /// The history file's directory could not be created.
    #[error("cannot prepare history location {}: {source}", path.display())]
    Location {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The in-memory history lock was poisoned by a panicking writer.
    #[error("history storage unavailable: {0}")]
    Unavailable(String),

    #[error("cannot encode history entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("history I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
