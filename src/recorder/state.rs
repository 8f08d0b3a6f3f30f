use std::fmt;

use serde::{Deserialize, Serialize};

use crate::step::step_model::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    #[default]
    Idle,
    Recording,
    Paused,
    Stopping,
    Stopped,
    Error,
}

impl RecordingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingStatus::Idle => "idle",
            RecordingStatus::Recording => "recording",
            RecordingStatus::Paused => "paused",
            RecordingStatus::Stopping => "stopping",
            RecordingStatus::Stopped => "stopped",
            RecordingStatus::Error => "error",
        }
    }

    /// A session exists and has not been stopped.
    pub fn is_active(&self) -> bool {
        matches!(self, RecordingStatus::Recording | RecordingStatus::Paused)
    }

    pub fn can_start(&self) -> bool {
        matches!(
            self,
            RecordingStatus::Idle | RecordingStatus::Stopped | RecordingStatus::Error
        )
    }
}

impl fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recording: the ordered steps plus bookkeeping. This is what the
/// session store persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSession {
    pub id: String,
    pub url: String,
    pub status: RecordingStatus,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at_ms: Option<u64>,
    pub steps: Vec<Step>,
}

impl RecordingSession {
    pub fn new(url: &str, started_at_ms: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            status: RecordingStatus::Recording,
            started_at_ms,
            stopped_at_ms: None,
            steps: vec![],
        }
    }
}

/// Read-only snapshot handed to callers.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingState {
    pub status: RecordingStatus,
    pub session_id: Option<String>,
    pub url: Option<String>,
    pub step_count: usize,
    pub started_at_ms: Option<u64>,
    pub stopped_at_ms: Option<u64>,
    pub last_error: Option<String>,
}
