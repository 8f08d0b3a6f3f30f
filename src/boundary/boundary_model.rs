use serde::{Deserialize, Serialize};

/// One iframe crossing: the frame's index among `<iframe>` siblings plus
/// whatever identifying attributes it had.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameInfo {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

/// One shadow-root crossing: XPath of the host within its own tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShadowHostInfo {
    pub xpath: String,
    pub is_closed: bool,
}

pub fn serialize_iframe_chain(chain: &[FrameInfo]) -> String {
    serde_json::to_string(chain).unwrap_or_else(|_| "[]".to_string())
}

/// Malformed input yields an empty chain.
pub fn deserialize_iframe_chain(json: &str) -> Vec<FrameInfo> {
    serde_json::from_str(json).unwrap_or_default()
}

pub fn serialize_shadow_chain(chain: &[ShadowHostInfo]) -> String {
    serde_json::to_string(chain).unwrap_or_else(|_| "[]".to_string())
}

/// Malformed input yields an empty chain.
pub fn deserialize_shadow_chain(json: &str) -> Vec<ShadowHostInfo> {
    serde_json::from_str(json).unwrap_or_default()
}
