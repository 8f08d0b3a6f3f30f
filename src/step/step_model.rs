use serde::{Deserialize, Serialize};

use crate::boundary::boundary_model::{FrameInfo, ShadowHostInfo};
use crate::dom::event::EventType;
use crate::element::element_model::{ElementInfo, LocatorBundle};
use crate::normalizer::normalized_event::{
    ActionKind, EnvironmentSnapshot, Framework, NormalizedCoordinates,
};

/// Minimal description of a step's element, enough to compare identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTarget {
    pub tag_name: String,
    pub id: Option<String>,
    pub selector: String,
    pub xpath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub iframe_chain: Vec<FrameInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shadow_host_chain: Vec<ShadowHostInfo>,
}

impl StepTarget {
    pub fn from_element(info: &ElementInfo) -> Self {
        StepTarget {
            tag_name: info.tag_name.clone(),
            id: info.id.clone(),
            selector: info.css_selector.clone(),
            xpath: info.xpath.clone(),
            text: info.text.clone(),
            iframe_chain: info.iframe_chain.clone(),
            shadow_host_chain: info.shadow_host_chain.clone(),
        }
    }

    /// Same element by selector, or by id when both have one. Selectors are
    /// scoped to their document or shadow root, so the boundary chains must
    /// match first.
    pub fn same_element(&self, other: &StepTarget) -> bool {
        if self.iframe_chain != other.iframe_chain
            || self.shadow_host_chain != other.shadow_host_chain
        {
            return false;
        }
        if !self.selector.is_empty() && self.selector == other.selector {
            return true;
        }
        matches!((&self.id, &other.id), (Some(a), Some(b)) if a == b)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMetadata {
    /// Id of the step this one absorbed in a merge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_event: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_events: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<Framework>,
    #[serde(default)]
    pub label_confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentSnapshot>,
}

/// One recorded user action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub sequence: u64,
    pub name: String,
    pub label: String,
    pub description: String,
    pub event: Option<EventType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionKind>,
    pub target: Option<StepTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<LocatorBundle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<NormalizedCoordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub timestamp_ms: u64,
    #[serde(default)]
    pub metadata: StepMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}
