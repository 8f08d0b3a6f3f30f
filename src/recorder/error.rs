use thiserror::Error;

use crate::recorder::state::RecordingStatus;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store I/O failed ({path}): {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("could not serialize session {session}: {source}")]
    Json {
        session: String,
        source: serde_json::Error,
    },

    #[error("session store is unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum RecorderError {
    /// Lifecycle call not allowed from the current status.
    #[error("cannot {action} while {from}")]
    InvalidTransition {
        from: RecordingStatus,
        action: &'static str,
    },

    #[error("could not read config {path}: {source}")]
    ConfigRead {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("auto-save failed: {0}")]
    Store(#[from] StoreError),

    /// Raised by the embedding application through `Recorder::fail`.
    #[error("recording failed: {0}")]
    Fatal(String),
}
