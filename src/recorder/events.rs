use serde::Serialize;

use crate::dom::node::NodeId;
use crate::step::step_model::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    Frame,
    Shadow,
}

/// Everything observable about a recording, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecorderEvent {
    Started { session_id: String, url: String },
    Paused { session_id: String },
    Resumed { session_id: String },
    Stopped { session_id: String, step_count: usize },
    StepRecorded { step: Box<Step> },
    /// `step` replaced the previous step after a merge.
    StepMerged { step: Box<Step>, merged_from: String },
    StepDropped { reason: String, timestamp_ms: u64 },
    BoundaryAttached { kind: BoundaryKind, root: NodeId },
    BoundaryInaccessible { element: NodeId, reason: String },
    Error { message: String },
}

impl RecorderEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RecorderEvent::Started { .. } => "started",
            RecorderEvent::Paused { .. } => "paused",
            RecorderEvent::Resumed { .. } => "resumed",
            RecorderEvent::Stopped { .. } => "stopped",
            RecorderEvent::StepRecorded { .. } => "step_recorded",
            RecorderEvent::StepMerged { .. } => "step_merged",
            RecorderEvent::StepDropped { .. } => "step_dropped",
            RecorderEvent::BoundaryAttached { .. } => "boundary_attached",
            RecorderEvent::BoundaryInaccessible { .. } => "boundary_inaccessible",
            RecorderEvent::Error { .. } => "error",
        }
    }
}
