use serde::{Deserialize, Serialize};

use crate::dom::node::ElementData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrackedInputType {
    Text,
    Email,
    Password,
    Search,
    Tel,
    Url,
    Number,
    Textarea,
    Contenteditable,
    Date,
    Time,
    DatetimeLocal,
    Month,
    Week,
    Range,
    Checkbox,
    Radio,
    Select,
    File,
    Color,
}

impl TrackedInputType {
    pub const ALL: [TrackedInputType; 20] = [
        TrackedInputType::Text,
        TrackedInputType::Email,
        TrackedInputType::Password,
        TrackedInputType::Search,
        TrackedInputType::Tel,
        TrackedInputType::Url,
        TrackedInputType::Number,
        TrackedInputType::Textarea,
        TrackedInputType::Contenteditable,
        TrackedInputType::Date,
        TrackedInputType::Time,
        TrackedInputType::DatetimeLocal,
        TrackedInputType::Month,
        TrackedInputType::Week,
        TrackedInputType::Range,
        TrackedInputType::Checkbox,
        TrackedInputType::Radio,
        TrackedInputType::Select,
        TrackedInputType::File,
        TrackedInputType::Color,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedInputType::Text => "text",
            TrackedInputType::Email => "email",
            TrackedInputType::Password => "password",
            TrackedInputType::Search => "search",
            TrackedInputType::Tel => "tel",
            TrackedInputType::Url => "url",
            TrackedInputType::Number => "number",
            TrackedInputType::Textarea => "textarea",
            TrackedInputType::Contenteditable => "contenteditable",
            TrackedInputType::Date => "date",
            TrackedInputType::Time => "time",
            TrackedInputType::DatetimeLocal => "datetime-local",
            TrackedInputType::Month => "month",
            TrackedInputType::Week => "week",
            TrackedInputType::Range => "range",
            TrackedInputType::Checkbox => "checkbox",
            TrackedInputType::Radio => "radio",
            TrackedInputType::Select => "select",
            TrackedInputType::File => "file",
            TrackedInputType::Color => "color",
        }
    }

    pub fn parse(s: &str) -> Option<TrackedInputType> {
        let s = s.trim().to_ascii_lowercase();
        TrackedInputType::ALL.iter().find(|t| t.as_str() == s).copied()
    }

    /// Discrete controls whose changes are recorded synchronously.
    pub fn is_immediate(&self) -> bool {
        matches!(
            self,
            TrackedInputType::Checkbox
                | TrackedInputType::Radio
                | TrackedInputType::Select
                | TrackedInputType::File
                | TrackedInputType::Color
        )
    }

    pub fn is_debounced(&self) -> bool {
        !self.is_immediate()
    }

    /// Tracked type of `el`, or `None` for untracked elements (buttons,
    /// hidden inputs, plain containers).
    pub fn from_element(el: &ElementData) -> Option<TrackedInputType> {
        match el.tag.as_str() {
            "textarea" => Some(TrackedInputType::Textarea),
            "select" => Some(TrackedInputType::Select),
            "input" => el.input_type().as_deref().and_then(TrackedInputType::parse),
            _ if el.is_content_editable() => Some(TrackedInputType::Contenteditable),
            _ => None,
        }
    }
}

pub fn tracked_input_types() -> &'static [TrackedInputType] {
    &TrackedInputType::ALL
}

pub fn is_immediate_input_type(input_type: &str) -> bool {
    TrackedInputType::parse(input_type).is_some_and(|t| t.is_immediate())
}

pub fn is_debounced_input_type(input_type: &str) -> bool {
    TrackedInputType::parse(input_type).is_some_and(|t| t.is_debounced())
}
