use serde::{Deserialize, Serialize};

use crate::capture::captured_event::{CapturedPayload, ClickAction};
use crate::dom::event::{EventType, Modifiers};
use crate::dom::node::NodeId;
use crate::element::element_model::ElementInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Check,
    Uncheck,
    Select,
    Navigate,
    Input,
    KeyPress,
    Focus,
    Blur,
    Submit,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Check => "check",
            ActionKind::Uncheck => "uncheck",
            ActionKind::Select => "select",
            ActionKind::Navigate => "navigate",
            ActionKind::Input => "input",
            ActionKind::KeyPress => "key_press",
            ActionKind::Focus => "focus",
            ActionKind::Blur => "blur",
            ActionKind::Submit => "submit",
        }
    }

    pub fn from_click(action: ClickAction) -> ActionKind {
        match action {
            ClickAction::Click => ActionKind::Click,
            ClickAction::Check => ActionKind::Check,
            ClickAction::Uncheck => ActionKind::Uncheck,
            ClickAction::Select => ActionKind::Select,
            ClickAction::Navigate => ActionKind::Navigate,
        }
    }

    pub fn from_payload(payload: &CapturedPayload) -> ActionKind {
        match payload {
            CapturedPayload::Click { action, .. } => ActionKind::from_click(*action),
            CapturedPayload::Value { .. } => ActionKind::Input,
            CapturedPayload::Key { .. } => ActionKind::KeyPress,
            CapturedPayload::Focus => ActionKind::Focus,
            CapturedPayload::Blur => ActionKind::Blur,
            CapturedPayload::Submit => ActionKind::Submit,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            ActionKind::Click
                | ActionKind::Check
                | ActionKind::Uncheck
                | ActionKind::Select
                | ActionKind::Navigate
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedCoordinates {
    pub viewport: Point,
    pub document: Point,
    /// Relative to the element's bounding rect at normalization time.
    pub element: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    React,
    Angular,
    Vue,
    Svelte,
    JQuery,
    Vanilla,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentSnapshot {
    pub browser: String,
    pub browser_version: String,
    pub platform: String,
    pub user_agent: String,
    pub frame_depth: usize,
    pub page_url: String,
    pub viewport_width: f64,
    pub viewport_height: f64,
}

/// Canonical mid-pipeline record between capture and step building.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub id: String,
    pub event_type: EventType,
    pub action: ActionKind,
    pub value: Option<String>,
    pub key: Option<String>,
    pub modifiers: Modifiers,
    pub raw_target: NodeId,
    pub effective_target: NodeId,
    pub coordinates: Option<NormalizedCoordinates>,
    pub environment: EnvironmentSnapshot,
    pub framework: Framework,
    /// Classification of the effective target, boundary chains included.
    pub element: ElementInfo,
    /// Ids of coalesced events at the time this one was normalized.
    pub related_events: Vec<String>,
    pub is_trusted: bool,
    pub timestamp_ms: u64,
}
