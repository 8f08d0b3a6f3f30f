use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::debug;

use crate::capture::captured_event::{CapturedEvent, CapturedPayload};
use crate::capture::extract::extract_payload;
use crate::dom::document::Dom;
use crate::dom::event::{DomEvent, EventType, ListenerId};
use crate::dom::node::NodeId;
use crate::timer::TimerQueue;

/// Attribute marking the recorder's own UI; events inside it are ignored.
pub const EXTENSION_MARKER_ATTR: &str = "data-recorder-ui";

pub const DEFAULT_IGNORED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "meta", "link", "head", "title",
];

/// Returns `false` to veto an event.
pub type CustomFilter = Box<dyn Fn(&Dom, &CapturedEvent) -> bool>;

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    pub filter_synthetic_events: bool,
    pub ignored_tags: Vec<String>,
    pub extension_marker: String,
    pub dedup_window_ms: u64,
    /// Buffer `input` events per element and emit only the last value.
    pub debounce_input: bool,
    pub input_debounce_ms: u64,
    /// Classes left out of the dedup key.
    pub ignored_classes: Vec<String>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            filter_synthetic_events: true,
            ignored_tags: DEFAULT_IGNORED_TAGS.iter().map(|t| t.to_string()).collect(),
            extension_marker: EXTENSION_MARKER_ATTR.to_string(),
            dedup_window_ms: 50,
            debounce_input: false,
            input_debounce_ms: 300,
            ignored_classes: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Inactive,
    Active,
}

/// Why an event produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Untrusted,
    ExtensionUi,
    IgnoredTag,
    CustomFilter,
    NotRecordable,
    Duplicate,
}

/// Capture-phase listeners on one or more roots, plus the filter,
/// dedup and input-buffer stages in front of the rest of the pipeline.
pub struct EventCapture {
    options: CaptureOptions,
    state: CaptureState,
    roots: BTreeMap<NodeId, Vec<ListenerId>>,
    filters: Vec<CustomFilter>,
    /// Last emission per dedup key: time and value (for value events).
    recent: HashMap<String, (u64, Option<String>)>,
    pending_input: BTreeMap<NodeId, CapturedEvent>,
    input_timers: TimerQueue<NodeId>,
}

impl EventCapture {
    pub fn new(options: CaptureOptions) -> Self {
        Self {
            options,
            state: CaptureState::Inactive,
            roots: BTreeMap::new(),
            filters: vec![],
            recent: HashMap::new(),
            pending_input: BTreeMap::new(),
            input_timers: TimerQueue::new(),
        }
    }

    pub fn options(&self) -> &CaptureOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: CaptureOptions) {
        self.options = options;
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_attached(&self, root: NodeId) -> bool {
        self.roots.contains_key(&root)
    }

    pub fn attached_roots(&self) -> Vec<NodeId> {
        self.roots.keys().copied().collect()
    }

    pub fn listener_count(&self) -> usize {
        self.roots.values().map(Vec::len).sum()
    }

    /// Register capture listeners for `event_types` on `root`. Returns
    /// `false` (and registers nothing) if `root` is already attached.
    pub fn attach(&mut self, dom: &mut Dom, root: NodeId, event_types: &[EventType]) -> bool {
        if self.roots.contains_key(&root) {
            return false;
        }
        let mut types: Vec<EventType> = vec![];
        for t in event_types {
            if !types.contains(t) {
                types.push(*t);
            }
        }
        let ids = types
            .iter()
            .map(|t| dom.add_event_listener(root, *t, true))
            .collect::<Vec<_>>();
        debug!(?root, listeners = ids.len(), "capture attached");
        self.roots.insert(root, ids);
        self.state = CaptureState::Active;
        true
    }

    pub fn detach_root(&mut self, dom: &mut Dom, root: NodeId) -> bool {
        let Some(ids) = self.roots.remove(&root) else {
            return false;
        };
        for id in ids {
            dom.remove_event_listener(id);
        }
        if self.roots.is_empty() {
            self.state = CaptureState::Inactive;
        }
        true
    }

    /// Remove every listener. Safe to call repeatedly; returns how many
    /// listeners were removed.
    pub fn detach(&mut self, dom: &mut Dom) -> usize {
        let mut removed = 0;
        for (_, ids) in std::mem::take(&mut self.roots) {
            for id in ids {
                if dom.remove_event_listener(id) {
                    removed += 1;
                }
            }
        }
        self.state = CaptureState::Inactive;
        self.recent.clear();
        removed
    }

    pub fn add_filter<F>(&mut self, filter: F)
    where
        F: Fn(&Dom, &CapturedEvent) -> bool + 'static,
    {
        self.filters.push(Box::new(filter));
    }

    fn owns(&self, listener: ListenerId) -> bool {
        self.roots.values().any(|ids| ids.contains(&listener))
    }

    /// Run `event` through dispatch, filtering and extraction. Usually
    /// yields zero or one event; a blur also flushes buffered input for
    /// its target first.
    pub fn handle(&mut self, dom: &Dom, event: &DomEvent) -> Vec<CapturedEvent> {
        if self.state != CaptureState::Active {
            return vec![];
        }

        // Innermost of our invocations sees the least retargeted view.
        let Some(invocation) = dom
            .dispatch(event)
            .into_iter()
            .rev()
            .find(|inv| self.owns(inv.listener))
        else {
            return vec![];
        };

        match self.capture(dom, event, invocation.target, invocation.composed_path) {
            Ok(captured) => self.route(captured),
            Err(reason) => {
                debug!(event = %event.event_type, ?reason, "event dropped");
                if event.event_type == EventType::Blur {
                    self.flush_pending_input(invocation.target).into_iter().collect()
                } else {
                    vec![]
                }
            }
        }
    }

    fn capture(
        &mut self,
        dom: &Dom,
        event: &DomEvent,
        target: NodeId,
        composed_path: Vec<NodeId>,
    ) -> Result<CapturedEvent, DropReason> {
        if self.options.filter_synthetic_events && !event.is_trusted {
            return Err(DropReason::Untrusted);
        }
        let marker = self.options.extension_marker.as_str();
        if dom.closest(target, |el| el.has_attr(marker)).is_some() {
            return Err(DropReason::ExtensionUi);
        }
        if let Some(tag) = dom.tag(target) {
            if self.options.ignored_tags.iter().any(|t| t == tag) {
                return Err(DropReason::IgnoredTag);
            }
        }

        let payload = extract_payload(dom, event, target).ok_or(DropReason::NotRecordable)?;
        let captured = CapturedEvent {
            event_type: event.event_type,
            target,
            composed_path,
            is_trusted: event.is_trusted,
            timestamp_ms: event.timestamp_ms,
            payload,
        };

        for filter in &self.filters {
            match catch_unwind(AssertUnwindSafe(|| filter(dom, &captured))) {
                Ok(true) => {}
                Ok(false) => return Err(DropReason::CustomFilter),
                Err(_) => tracing::warn!("custom capture filter panicked; ignoring it"),
            }
        }

        if self.is_duplicate(dom, &captured) {
            return Err(DropReason::Duplicate);
        }
        Ok(captured)
    }

    fn dedup_key(&self, dom: &Dom, captured: &CapturedEvent) -> String {
        let el = dom.element(captured.target);
        let classes: Vec<&str> = el
            .map(|e| e.class_list())
            .unwrap_or_default()
            .into_iter()
            .filter(|c| !self.options.ignored_classes.iter().any(|i| i.as_str() == *c))
            .collect();
        format!(
            "{}:{}:{}:{}",
            captured.event_type,
            el.map(|e| e.tag.as_str()).unwrap_or(""),
            el.and_then(|e| e.id()).unwrap_or(""),
            classes.join(" "),
        )
    }

    /// Same key inside the window. Value events only count as duplicates
    /// when the value is unchanged too, so keystrokes are never swallowed.
    fn is_duplicate(&mut self, dom: &Dom, captured: &CapturedEvent) -> bool {
        let now = captured.timestamp_ms;
        let window = self.options.dedup_window_ms;
        self.recent
            .retain(|_, (at, _)| now.saturating_sub(*at) <= window);

        let key = self.dedup_key(dom, captured);
        let value = captured.value().map(str::to_string);
        if let Some((at, last_value)) = self.recent.get(&key) {
            if now.saturating_sub(*at) < window && *last_value == value {
                return true;
            }
        }
        self.recent.insert(key, (now, value));
        false
    }

    fn route(&mut self, captured: CapturedEvent) -> Vec<CapturedEvent> {
        if self.options.debounce_input && captured.event_type == EventType::Input {
            let target = captured.target;
            self.input_timers
                .schedule(target, captured.timestamp_ms + self.options.input_debounce_ms);
            self.pending_input.insert(target, captured);
            return vec![];
        }

        let mut out = vec![];
        if matches!(captured.payload, CapturedPayload::Blur) {
            out.extend(self.flush_pending_input(captured.target));
        }
        out.push(captured);
        out
    }

    pub fn has_pending_input(&self, element: NodeId) -> bool {
        self.pending_input.contains_key(&element)
    }

    /// Emit buffered input for `element` now.
    pub fn flush_pending_input(&mut self, element: NodeId) -> Option<CapturedEvent> {
        self.input_timers.cancel(&element);
        self.pending_input.remove(&element)
    }

    pub fn flush_all_pending(&mut self) -> Vec<CapturedEvent> {
        self.input_timers.drain();
        let mut out: Vec<CapturedEvent> = std::mem::take(&mut self.pending_input)
            .into_values()
            .collect();
        out.sort_by_key(|e| e.timestamp_ms);
        out
    }

    /// Buffered inputs whose quiet period has elapsed.
    pub fn tick(&mut self, now_ms: u64) -> Vec<CapturedEvent> {
        self.input_timers
            .take_due(now_ms)
            .into_iter()
            .filter_map(|el| self.pending_input.remove(&el))
            .collect()
    }
}

impl std::fmt::Debug for EventCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventCapture")
            .field("state", &self.state)
            .field("roots", &self.roots)
            .field("filters", &self.filters.len())
            .field("pending_input", &self.pending_input.len())
            .finish()
    }
}
