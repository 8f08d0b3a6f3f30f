use std::{fs::OpenOptions, io::Write, path::Path, sync::Mutex};

use tracing::warn;

use crate::recorder::error::StoreError;
use crate::recorder::state::RecordingSession;

pub const TOPIC_STARTED: &str = "recording.started";
pub const TOPIC_PAUSED: &str = "recording.paused";
pub const TOPIC_RESUMED: &str = "recording.resumed";
pub const TOPIC_STOPPED: &str = "recording.stopped";
pub const TOPIC_STEP: &str = "recording.step";

/// Fire-and-forget announcement channel for lifecycle transitions.
pub trait Broadcaster {
    fn broadcast(&self, topic: &str, payload: serde_json::Value);
}

/// Persists session snapshots during and at the end of a recording.
pub trait SessionStore {
    fn save(&self, session: &RecordingSession) -> Result<(), StoreError>;
}

/// Appends one JSON line per save.
pub struct JsonlSessionStore {
    path: String,
    file: Mutex<std::fs::File>,
}

impl JsonlSessionStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().display().to_string();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl SessionStore for JsonlSessionStore {
    fn save(&self, session: &RecordingSession) -> Result<(), StoreError> {
        let json = serde_json::to_string(session).map_err(|source| StoreError::Json {
            session: session.id.clone(),
            source,
        })?;

        let mut file = self.file.lock().map_err(|e| {
            warn!(path = %self.path, "session store lock poisoned");
            StoreError::Unavailable(e.to_string())
        })?;

        writeln!(file, "{}", json).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl std::fmt::Debug for JsonlSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlSessionStore")
            .field("path", &self.path)
            .finish()
    }
}

/// Read back every snapshot a [`JsonlSessionStore`] wrote, oldest first.
pub fn read_sessions(path: impl AsRef<Path>) -> Result<Vec<RecordingSession>, StoreError> {
    let path = path.as_ref().display().to_string();
    let content = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
        path: path.clone(),
        source,
    })?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|source| StoreError::Json {
                session: path.clone(),
                source,
            })
        })
        .collect()
}
