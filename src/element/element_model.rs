use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::boundary::boundary_model::{FrameInfo, ShadowHostInfo};
use crate::dom::node::Rect;

/// Closed classification of an element, computed once from tag and
/// attributes and then matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Button,
    TextInput,
    Checkbox,
    Radio,
    Select,
    TextArea,
    ContentEditable,
    Link,
    Other,
}

impl ElementKind {
    pub fn is_form_control(&self) -> bool {
        matches!(
            self,
            ElementKind::TextInput
                | ElementKind::Checkbox
                | ElementKind::Radio
                | ElementKind::Select
                | ElementKind::TextArea
                | ElementKind::ContentEditable
        )
    }
}

/// Snapshot of everything needed to describe and re-find one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    pub tag_name: String,
    pub kind: ElementKind,
    /// Role-level type label (`button`, `checkbox`, `email`, `container`, ...).
    pub element_type: String,
    pub id: Option<String>,
    pub name: Option<String>,
    pub class_list: Vec<String>,
    pub role: Option<String>,
    pub input_type: Option<String>,
    pub aria_attributes: BTreeMap<String, String>,
    pub data_attributes: BTreeMap<String, String>,
    pub placeholder: Option<String>,
    pub href: Option<String>,
    pub text: Option<String>,
    pub value: Option<String>,
    pub is_sensitive: bool,
    pub xpath: String,
    pub css_selector: String,
    pub bounding_rect: Rect,
    pub is_visible: bool,
    pub in_viewport: bool,
    #[serde(default)]
    pub iframe_chain: Vec<FrameInfo>,
    #[serde(default)]
    pub shadow_host_chain: Vec<ShadowHostInfo>,
    pub fingerprint: String,
}

/// The element description attached to recorded steps.
pub type LocatorBundle = ElementInfo;

impl ElementInfo {
    /// Placeholder for a node that is not an element (or no longer exists).
    pub fn unknown() -> Self {
        ElementInfo {
            tag_name: "unknown".to_string(),
            kind: ElementKind::Other,
            element_type: "unknown".to_string(),
            id: None,
            name: None,
            class_list: vec![],
            role: None,
            input_type: None,
            aria_attributes: BTreeMap::new(),
            data_attributes: BTreeMap::new(),
            placeholder: None,
            href: None,
            text: None,
            value: None,
            is_sensitive: false,
            xpath: String::new(),
            css_selector: String::new(),
            bounding_rect: Rect::default(),
            is_visible: false,
            in_viewport: false,
            iframe_chain: vec![],
            shadow_host_chain: vec![],
            fingerprint: String::new(),
        }
    }

    pub fn is_in_frame(&self) -> bool {
        !self.iframe_chain.is_empty()
    }

    pub fn is_in_shadow_dom(&self) -> bool {
        !self.shadow_host_chain.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
