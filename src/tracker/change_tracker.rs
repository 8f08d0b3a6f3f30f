use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::capture::extract::extract_value;
use crate::dom::document::Dom;
use crate::dom::node::{ElementData, NodeId};
use crate::subscribers::{Subscribers, Subscription};
use crate::timer::TimerQueue;
use crate::tracker::input_types::TrackedInputType;

/// Per-element record, keyed by the element's arena handle and dropped
/// when the element leaves the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedState {
    pub element: NodeId,
    pub input_type: TrackedInputType,
    pub initial_value: String,
    pub last_value: String,
    pub last_emitted: Option<String>,
    pub has_changed: bool,
    pub change_count: u32,
    pub started_at_ms: u64,
    pub last_change_ms: Option<u64>,
}

impl TrackedState {
    /// What a new final value is compared against before it is emitted.
    fn baseline(&self) -> &str {
        self.last_emitted.as_deref().unwrap_or(&self.initial_value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTrigger {
    Input,
    Change,
    Blur,
    Debounce,
    Flush,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueChange {
    pub element: NodeId,
    pub input_type: TrackedInputType,
    pub value: String,
    pub previous_value: String,
    pub initial_value: String,
    pub has_changed: bool,
    pub is_final: bool,
    pub trigger: ChangeTrigger,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerOptions {
    pub debounce_delay_ms: u64,
    pub emit_intermediate_changes: bool,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            debounce_delay_ms: 300,
            emit_intermediate_changes: false,
        }
    }
}

/// Value before any user edit, used when tracking starts lazily on the
/// first event for an element added after tracking began (the live value
/// has already changed by then).
fn default_value(dom: &Dom, element: NodeId, el: &ElementData, kind: TrackedInputType) -> String {
    match kind {
        TrackedInputType::Checkbox | TrackedInputType::Radio => el.has_attr("checked").to_string(),
        TrackedInputType::Textarea => dom.text_content(element),
        TrackedInputType::Select | TrackedInputType::File | TrackedInputType::Contenteditable => {
            String::new()
        }
        _ => el.attr("value").unwrap_or_default().to_string(),
    }
}

/// Debounces text-like edits and passes discrete changes straight through,
/// emitting at most one final [`ValueChange`] per logical edit.
#[derive(Debug)]
pub struct InputChangeTracker {
    options: TrackerOptions,
    states: HashMap<NodeId, TrackedState>,
    timers: TimerQueue<NodeId>,
    subscribers: Subscribers<ValueChange>,
}

impl InputChangeTracker {
    pub fn new(options: TrackerOptions) -> Self {
        Self {
            options,
            states: HashMap::new(),
            timers: TimerQueue::new(),
            subscribers: Subscribers::new("value-change"),
        }
    }

    pub fn options(&self) -> TrackerOptions {
        self.options
    }

    pub fn set_options(&mut self, options: TrackerOptions) {
        self.options = options;
    }

    pub fn on_value_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ValueChange) + 'static,
    {
        self.subscribers.subscribe(callback)
    }

    /// Start tracking with the current value as the initial value. `false`
    /// when already tracked or the element is not a tracked input type.
    pub fn start_tracking(&mut self, dom: &Dom, element: NodeId, now_ms: u64) -> bool {
        if self.states.contains_key(&element) {
            return false;
        }
        let Some(kind) = dom.element(element).and_then(TrackedInputType::from_element) else {
            return false;
        };
        let value = extract_value(dom, element);
        self.states
            .insert(element, Self::new_state(element, kind, value, now_ms));
        true
    }

    /// Start tracking every tracked input under `root` (not crossing into
    /// shadow trees or frames). Returns how many were newly tracked.
    pub fn track_existing(&mut self, dom: &Dom, root: NodeId, now_ms: u64) -> usize {
        dom.descendants(root)
            .into_iter()
            .filter(|el| self.start_tracking(dom, *el, now_ms))
            .count()
    }

    fn new_state(element: NodeId, kind: TrackedInputType, initial: String, now_ms: u64) -> TrackedState {
        TrackedState {
            element,
            input_type: kind,
            last_value: initial.clone(),
            initial_value: initial,
            last_emitted: None,
            has_changed: false,
            change_count: 0,
            started_at_ms: now_ms,
            last_change_ms: None,
        }
    }

    fn ensure_tracked(&mut self, dom: &Dom, element: NodeId, now_ms: u64) -> Option<TrackedInputType> {
        if let Some(state) = self.states.get(&element) {
            return Some(state.input_type);
        }
        let el = dom.element(element)?;
        let kind = TrackedInputType::from_element(el)?;
        let initial = default_value(dom, element, el, kind);
        self.states
            .insert(element, Self::new_state(element, kind, initial, now_ms));
        Some(kind)
    }

    fn observe(&mut self, dom: &Dom, element: NodeId, now_ms: u64) -> Option<TrackedInputType> {
        let kind = self.ensure_tracked(dom, element, now_ms)?;
        let value = extract_value(dom, element);
        let state = self.states.get_mut(&element)?;
        if state.last_value != value {
            state.change_count += 1;
            state.last_change_ms = Some(now_ms);
        }
        state.has_changed = value != state.initial_value;
        state.last_value = value;
        Some(kind)
    }

    fn change_for(&self, element: NodeId, is_final: bool, trigger: ChangeTrigger, now_ms: u64) -> Option<ValueChange> {
        let state = self.states.get(&element)?;
        Some(ValueChange {
            element,
            input_type: state.input_type,
            value: state.last_value.clone(),
            previous_value: state.baseline().to_string(),
            initial_value: state.initial_value.clone(),
            has_changed: state.has_changed,
            is_final,
            trigger,
            timestamp_ms: now_ms,
        })
    }

    /// Final emission unless the value is what was last committed.
    fn emit_final(&mut self, element: NodeId, trigger: ChangeTrigger, now_ms: u64) -> Option<ValueChange> {
        let state = self.states.get(&element)?;
        if state.last_value == state.baseline() {
            debug!(?element, ?trigger, "value unchanged since last commit");
            return None;
        }
        let change = self.change_for(element, true, trigger, now_ms)?;
        if let Some(state) = self.states.get_mut(&element) {
            state.last_emitted = Some(state.last_value.clone());
        }
        self.subscribers.emit(&change);
        Some(change)
    }

    pub fn handle_input(&mut self, dom: &Dom, element: NodeId, now_ms: u64) -> Vec<ValueChange> {
        let Some(kind) = self.observe(dom, element, now_ms) else {
            return vec![];
        };
        // Discrete controls commit on `change`.
        if kind.is_immediate() {
            return vec![];
        }

        self.timers
            .schedule(element, now_ms + self.options.debounce_delay_ms);
        if !self.options.emit_intermediate_changes {
            return vec![];
        }
        match self.change_for(element, false, ChangeTrigger::Input, now_ms) {
            Some(change) => {
                self.subscribers.emit(&change);
                vec![change]
            }
            None => vec![],
        }
    }

    /// `change` commits immediately for both kinds and cancels any
    /// pending debounce.
    pub fn handle_change(&mut self, dom: &Dom, element: NodeId, now_ms: u64) -> Vec<ValueChange> {
        if self.observe(dom, element, now_ms).is_none() {
            return vec![];
        }
        self.timers.cancel(&element);
        self.emit_final(element, ChangeTrigger::Change, now_ms)
            .into_iter()
            .collect()
    }

    pub fn handle_blur(&mut self, element: NodeId, now_ms: u64) -> Vec<ValueChange> {
        if !self.timers.cancel(&element) {
            return vec![];
        }
        self.emit_final(element, ChangeTrigger::Blur, now_ms)
            .into_iter()
            .collect()
    }

    /// Emit `element`'s pending debounce now.
    pub fn flush(&mut self, element: NodeId, now_ms: u64) -> Option<ValueChange> {
        if !self.timers.cancel(&element) {
            return None;
        }
        self.emit_final(element, ChangeTrigger::Flush, now_ms)
    }

    /// Emit every pending debounce, oldest deadline first.
    pub fn flush_all(&mut self, now_ms: u64) -> Vec<ValueChange> {
        self.tick_inner(u64::MAX, now_ms, ChangeTrigger::Flush)
    }

    /// Emit debounces whose quiet period has elapsed by `now_ms`.
    pub fn tick(&mut self, now_ms: u64) -> Vec<ValueChange> {
        self.tick_inner(now_ms, now_ms, ChangeTrigger::Debounce)
    }

    fn tick_inner(&mut self, due_by: u64, now_ms: u64, trigger: ChangeTrigger) -> Vec<ValueChange> {
        let due: Vec<(NodeId, u64)> = self
            .timers
            .take_due(due_by)
            .into_iter()
            .map(|el| {
                let at = self
                    .states
                    .get(&el)
                    .and_then(|s| s.last_change_ms)
                    .map(|t| t + self.options.debounce_delay_ms)
                    .unwrap_or(now_ms);
                (el, at.min(now_ms))
            })
            .collect();
        due.into_iter()
            .filter_map(|(el, at)| self.emit_final(el, trigger, at))
            .collect()
    }

    pub fn has_pending(&self, element: NodeId) -> bool {
        self.timers.is_scheduled(&element)
    }

    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }

    pub fn is_tracking(&self, element: NodeId) -> bool {
        self.states.contains_key(&element)
    }

    pub fn tracked_count(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, element: NodeId) -> Option<&TrackedState> {
        self.states.get(&element)
    }

    /// Current value differs from the value tracking started with.
    pub fn has_changed(&self, element: NodeId) -> bool {
        self.states.get(&element).is_some_and(|s| s.has_changed)
    }

    pub fn stop_tracking(&mut self, element: NodeId) -> bool {
        self.timers.cancel(&element);
        self.states.remove(&element).is_some()
    }

    /// Drop state for elements no longer in the document, flushing any
    /// edit still waiting on its debounce.
    pub fn prune_disconnected(&mut self, dom: &Dom, now_ms: u64) -> Vec<ValueChange> {
        let gone: Vec<NodeId> = self
            .states
            .keys()
            .copied()
            .filter(|el| !dom.is_connected(*el))
            .collect();

        let mut flushed = vec![];
        for el in gone {
            flushed.extend(self.flush(el, now_ms));
            self.states.remove(&el);
            debug!(element = ?el, "stopped tracking removed element");
        }
        flushed
    }

    /// Forget every element and cancel every timer.
    pub fn reset(&mut self) {
        self.states.clear();
        self.timers.drain();
    }
}
