use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dom::document::Dom;
use crate::dom::node::{NodeId, NodeKind, ShadowMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Click,
    #[serde(rename = "dblclick")]
    DblClick,
    MouseDown,
    MouseUp,
    Input,
    Change,
    KeyDown,
    KeyUp,
    Focus,
    Blur,
    Submit,
}

impl EventType {
    pub const ALL: [EventType; 11] = [
        EventType::Click,
        EventType::DblClick,
        EventType::MouseDown,
        EventType::MouseUp,
        EventType::Input,
        EventType::Change,
        EventType::KeyDown,
        EventType::KeyUp,
        EventType::Focus,
        EventType::Blur,
        EventType::Submit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Click => "click",
            EventType::DblClick => "dblclick",
            EventType::MouseDown => "mousedown",
            EventType::MouseUp => "mouseup",
            EventType::Input => "input",
            EventType::Change => "change",
            EventType::KeyDown => "keydown",
            EventType::KeyUp => "keyup",
            EventType::Focus => "focus",
            EventType::Blur => "blur",
            EventType::Submit => "submit",
        }
    }

    pub fn is_mouse(&self) -> bool {
        matches!(
            self,
            EventType::Click | EventType::DblClick | EventType::MouseDown | EventType::MouseUp
        )
    }

    pub fn is_keyboard(&self) -> bool {
        matches!(self, EventType::KeyDown | EventType::KeyUp)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown event type '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub meta: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.ctrl || self.shift || self.alt || self.meta
    }
}

/// A browser event as delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    pub event_type: EventType,
    pub target: NodeId,
    pub is_trusted: bool,
    pub timestamp_ms: u64,
    pub client_x: f64,
    pub client_y: f64,
    pub button: u8,
    pub modifiers: Modifiers,
    pub key: Option<String>,
    pub code: Option<String>,
}

impl DomEvent {
    pub fn new(event_type: EventType, target: NodeId, timestamp_ms: u64) -> Self {
        DomEvent {
            event_type,
            target,
            is_trusted: true,
            timestamp_ms,
            client_x: 0.0,
            client_y: 0.0,
            button: 0,
            modifiers: Modifiers::default(),
            key: None,
            code: None,
        }
    }

    pub fn click(target: NodeId, timestamp_ms: u64) -> Self {
        Self::new(EventType::Click, target, timestamp_ms)
    }

    pub fn mouse_down(target: NodeId, timestamp_ms: u64) -> Self {
        Self::new(EventType::MouseDown, target, timestamp_ms)
    }

    pub fn input(target: NodeId, timestamp_ms: u64) -> Self {
        Self::new(EventType::Input, target, timestamp_ms)
    }

    pub fn change(target: NodeId, timestamp_ms: u64) -> Self {
        Self::new(EventType::Change, target, timestamp_ms)
    }

    pub fn blur(target: NodeId, timestamp_ms: u64) -> Self {
        Self::new(EventType::Blur, target, timestamp_ms)
    }

    pub fn key_down(target: NodeId, key: &str, timestamp_ms: u64) -> Self {
        let mut event = Self::new(EventType::KeyDown, target, timestamp_ms);
        event.key = Some(key.to_string());
        event.code = Some(key.to_string());
        event
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.client_x = x;
        self.client_y = y;
        self
    }

    pub fn untrusted(mut self) -> Self {
        self.is_trusted = false;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone)]
struct Registration {
    id: ListenerId,
    root: NodeId,
    event_type: EventType,
    capture: bool,
}

#[derive(Debug, Default)]
pub struct ListenerRegistry {
    next_id: u64,
    registrations: Vec<Registration>,
}

/// One listener call produced by [`Dom::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub listener: ListenerId,
    /// Node the listener is registered on (`currentTarget`).
    pub current_target: NodeId,
    /// Event target as seen from `current_target` (shadow-retargeted).
    pub target: NodeId,
    /// `composedPath()` as seen from `current_target`, innermost first.
    pub composed_path: Vec<NodeId>,
}

impl Dom {
    pub fn add_event_listener(
        &mut self,
        root: NodeId,
        event_type: EventType,
        capture: bool,
    ) -> ListenerId {
        let registry = &mut self.listeners;
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry.registrations.push(Registration {
            id,
            root,
            event_type,
            capture,
        });
        id
    }

    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.registrations.len();
        self.listeners.registrations.retain(|r| r.id != id);
        before != self.listeners.registrations.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.registrations.len()
    }

    pub fn listener_count_on(&self, root: NodeId) -> usize {
        self.listeners
            .registrations
            .iter()
            .filter(|r| r.root == root)
            .count()
    }

    /// Full composed path from `target` up to its document, innermost first,
    /// stepping from each shadow root to its host.
    pub fn composed_path(&self, target: NodeId) -> Vec<NodeId> {
        let mut path = vec![];
        let mut current = Some(target);
        while let Some(node) = current {
            path.push(node);
            current = match self.node(node).map(|n| &n.kind) {
                Some(NodeKind::ShadowRoot(data)) => Some(data.host),
                _ => self.parent(node),
            };
        }
        path
    }

    /// DOM retargeting: the ancestor-or-self of `node` visible from `observer`.
    pub fn retarget(&self, node: NodeId, observer: NodeId) -> NodeId {
        let mut current = node;
        loop {
            let root = self.root_node(current);
            match self.shadow_root_data(root) {
                Some(data) if !self.is_shadow_including_ancestor(root, observer) => {
                    current = data.host;
                }
                _ => return current,
            }
        }
    }

    fn is_shadow_including_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.composed_path(node).contains(&ancestor)
    }

    fn visible_from(&self, node: NodeId, observer: NodeId) -> bool {
        let mut current = node;
        loop {
            let root = self.root_node(current);
            match self.shadow_root_data(root) {
                Some(data) if !self.is_shadow_including_ancestor(root, observer) => {
                    if data.mode == ShadowMode::Closed {
                        return false;
                    }
                    current = data.host;
                }
                _ => return true,
            }
        }
    }

    /// Capture-phase listener calls for `event`, outermost first. Only
    /// listeners registered on the composed path fire, so a listener on an
    /// outer document never observes events inside a child frame.
    pub fn dispatch(&self, event: &DomEvent) -> Vec<Invocation> {
        let path = self.composed_path(event.target);
        let mut invocations = vec![];

        for node in path.iter().rev() {
            for reg in &self.listeners.registrations {
                if reg.root != *node || reg.event_type != event.event_type || !reg.capture {
                    continue;
                }
                let visible_path = path
                    .iter()
                    .copied()
                    .filter(|n| self.visible_from(*n, *node))
                    .collect();
                invocations.push(Invocation {
                    listener: reg.id,
                    current_target: *node,
                    target: self.retarget(event.target, *node),
                    composed_path: visible_path,
                });
            }
        }

        invocations
    }
}
