use serde::{Deserialize, Serialize};

/// Handle to a node in a [`Dom`](crate::dom::document::Dom) arena.
///
/// Handles stay valid for the lifetime of the arena; a removed node keeps
/// its slot and simply stops being connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        ComputedStyle {
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowMode {
    Open,
    Closed,
}

/// What sits behind an `<iframe>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameContent {
    Loaded(NodeId),
    NotLoaded,
    CrossOrigin,
}

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub value: String,
    pub checked: bool,
    pub selected_index: Option<usize>,
    pub files: Vec<String>,
    pub style: ComputedStyle,
    pub rect: Rect,
    pub shadow_root: Option<NodeId>,
    pub frame: Option<FrameContent>,
    /// Expando properties set by page scripts (`__reactFiber$..`, `__vue__`).
    pub properties: Vec<String>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        let tag = tag.to_ascii_lowercase();
        let frame = if tag == "iframe" || tag == "frame" {
            Some(FrameContent::NotLoaded)
        } else {
            None
        };

        ElementData {
            tag,
            attributes: vec![],
            value: String::new(),
            checked: false,
            selected_index: None,
            files: vec![],
            style: ComputedStyle::default(),
            rect: Rect::default(),
            shadow_root: None,
            frame,
            properties: vec![],
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.attributes.push((name, value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attributes.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|id| !id.is_empty())
    }

    pub fn class_list(&self) -> Vec<&str> {
        self.attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class_list().contains(&class)
    }

    /// Lowercased `type` attribute, defaulting to `text` for inputs.
    pub fn input_type(&self) -> Option<String> {
        match self.tag.as_str() {
            "input" => Some(
                self.attr("type")
                    .map(|t| t.trim().to_ascii_lowercase())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "text".to_string()),
            ),
            "button" => Some(
                self.attr("type")
                    .map(|t| t.trim().to_ascii_lowercase())
                    .unwrap_or_else(|| "submit".to_string()),
            ),
            _ => None,
        }
    }

    pub fn is_content_editable(&self) -> bool {
        matches!(
            self.attr("contenteditable").map(|v| v.to_ascii_lowercase()),
            Some(ref v) if v.is_empty() || v == "true" || v == "plaintext-only"
        )
    }

    pub fn has_property(&self, prefix: &str) -> bool {
        self.properties.iter().any(|p| p.starts_with(prefix))
    }
}

#[derive(Debug, Clone)]
pub struct DocumentData {
    pub url: String,
    pub title: String,
    pub viewport: Rect,
    pub scroll_x: f64,
    pub scroll_y: f64,
    /// The `<iframe>` hosting this document; `None` for the top document.
    pub frame_element: Option<NodeId>,
    /// Page-level globals visible to scripts (`jQuery`, `React`, ...).
    pub globals: Vec<String>,
}

impl DocumentData {
    pub fn new(url: &str) -> Self {
        DocumentData {
            url: url.to_string(),
            title: String::new(),
            viewport: Rect::new(0.0, 0.0, 1280.0, 720.0),
            scroll_x: 0.0,
            scroll_y: 0.0,
            frame_element: None,
            globals: vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShadowRootData {
    pub host: NodeId,
    pub mode: ShadowMode,
    /// A closed root made reachable through a well-known host property.
    pub exposed: bool,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Document(DocumentData),
    Element(ElementData),
    ShadowRoot(ShadowRootData),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            parent: None,
            children: vec![],
        }
    }

    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&DocumentData> {
        match &self.kind {
            NodeKind::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_shadow_root(&self) -> Option<&ShadowRootData> {
        match &self.kind {
            NodeKind::ShadowRoot(root) => Some(root),
            _ => None,
        }
    }
}

/// Pending change reported to the recorder, drained via `Dom::take_mutations`.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationRecord {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    ShadowRootAttached { host: NodeId, root: NodeId },
    FrameLoaded { iframe: NodeId, document: NodeId },
}
