use serde::{Deserialize, Serialize};

use crate::dom::event::{EventType, Modifiers};
use crate::dom::node::NodeId;

/// What a pointer event means for the element it landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickAction {
    Click,
    Check,
    Uncheck,
    Select,
    Navigate,
}

impl ClickAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClickAction::Click => "click",
            ClickAction::Check => "check",
            ClickAction::Uncheck => "uncheck",
            ClickAction::Select => "select",
            ClickAction::Navigate => "navigate",
        }
    }
}

/// The only keys recorded as actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Enter,
    Tab,
    Escape,
}

impl KeyAction {
    pub fn from_key(key: &str) -> Option<KeyAction> {
        match key {
            "Enter" | "NumpadEnter" => Some(KeyAction::Enter),
            "Tab" => Some(KeyAction::Tab),
            "Escape" | "Esc" => Some(KeyAction::Escape),
            _ => None,
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            KeyAction::Enter => "Enter",
            KeyAction::Tab => "Tab",
            KeyAction::Escape => "Escape",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerCoordinates {
    pub client_x: f64,
    pub client_y: f64,
    pub page_x: f64,
    pub page_y: f64,
    /// Relative to the target's bounding rect at capture time.
    pub offset_x: f64,
    pub offset_y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CapturedPayload {
    Click {
        action: ClickAction,
        coordinates: PointerCoordinates,
        button: u8,
        modifiers: Modifiers,
    },
    Value {
        value: String,
    },
    Key {
        action: KeyAction,
        key: String,
        modifiers: Modifiers,
    },
    Focus,
    Blur,
    Submit,
}

/// One qualifying DOM event after filtering and extraction. Consumed
/// immediately by the normalizer.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedEvent {
    pub event_type: EventType,
    /// Target as seen by the recorder's innermost listener.
    pub target: NodeId,
    /// Composed path as seen by that listener, innermost first.
    pub composed_path: Vec<NodeId>,
    pub is_trusted: bool,
    pub timestamp_ms: u64,
    pub payload: CapturedPayload,
}

impl CapturedEvent {
    /// A final value change coming out of the input tracker.
    pub fn value_change(
        event_type: EventType,
        target: NodeId,
        value: String,
        timestamp_ms: u64,
    ) -> Self {
        CapturedEvent {
            event_type,
            target,
            composed_path: vec![target],
            is_trusted: true,
            timestamp_ms,
            payload: CapturedPayload::Value { value },
        }
    }

    pub fn value(&self) -> Option<&str> {
        match &self.payload {
            CapturedPayload::Value { value } => Some(value),
            _ => None,
        }
    }

    pub fn is_value_event(&self) -> bool {
        matches!(self.payload, CapturedPayload::Value { .. })
    }
}
