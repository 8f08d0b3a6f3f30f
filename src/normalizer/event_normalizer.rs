use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::boundary::resolver::{get_iframe_chain, get_shadow_host_chain};
use crate::capture::captured_event::{CapturedEvent, CapturedPayload};
use crate::capture::extract::click_action;
use crate::dom::document::Dom;
use crate::dom::event::Modifiers;
use crate::dom::node::NodeId;
use crate::element::classifier::classify_excluding;
use crate::element::element_model::ElementInfo;
use crate::normalizer::environment::{detect_framework, environment_snapshot};
use crate::normalizer::normalized_event::{
    ActionKind, EnvironmentSnapshot, NormalizedCoordinates, NormalizedEvent, Point,
};
use crate::normalizer::target::resolve_effective_target;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizerOptions {
    pub coalesce_window_ms: u64,
    /// Attribute events to the deepest element of the composed path.
    pub resolve_through_shadow: bool,
    pub include_iframe_chain: bool,
    pub include_shadow_chain: bool,
    /// Classes left out of element snapshots and coalescing keys.
    pub ignored_classes: Vec<String>,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            coalesce_window_ms: 100,
            resolve_through_shadow: true,
            include_iframe_chain: true,
            include_shadow_chain: true,
            ignored_classes: vec![],
        }
    }
}

#[derive(Debug, Clone)]
struct RecentEvent {
    id: String,
    key: String,
    timestamp_ms: u64,
    related: Vec<String>,
}

/// Turns captured events into [`NormalizedEvent`]s. Keeps only a cached
/// environment snapshot per document and a short window of recent events.
#[derive(Debug, Default)]
pub struct EventNormalizer {
    options: NormalizerOptions,
    sequence: u64,
    environments: HashMap<NodeId, EnvironmentSnapshot>,
    recent: VecDeque<RecentEvent>,
}

impl EventNormalizer {
    pub fn new(options: NormalizerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &NormalizerOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: NormalizerOptions) {
        self.options = options;
    }

    /// Environment for the document containing `element`, computed once.
    pub fn environment(&mut self, dom: &Dom, element: NodeId) -> EnvironmentSnapshot {
        let doc = dom.owner_document(element).unwrap_or(dom.main_document());
        self.environments
            .entry(doc)
            .or_insert_with(|| environment_snapshot(dom, doc))
            .clone()
    }

    /// Drop cached environment snapshots so the next event recomputes them.
    pub fn clear_cache(&mut self) {
        self.environments.clear();
    }

    pub fn reset(&mut self) {
        self.sequence = 0;
        self.environments.clear();
        self.recent.clear();
    }

    pub fn normalize(&mut self, dom: &Dom, captured: &CapturedEvent) -> NormalizedEvent {
        self.sequence += 1;
        let id = format!("evt_{}_{}", self.sequence, captured.timestamp_ms);

        let effective_target = resolve_effective_target(
            dom,
            captured.target,
            &captured.composed_path,
            self.options.resolve_through_shadow,
        );
        // A label or shadow host was hit; the subtype belongs to the control.
        let action = match &captured.payload {
            CapturedPayload::Click { .. } if effective_target != captured.target => {
                ActionKind::from_click(click_action(dom, effective_target, captured.event_type))
            }
            payload => ActionKind::from_payload(payload),
        };
        let element = self.describe(dom, effective_target);

        let (value, key, modifiers) = match &captured.payload {
            CapturedPayload::Value { value } => (Some(value.clone()), None, Modifiers::default()),
            CapturedPayload::Key { key, modifiers, .. } => (None, Some(key.clone()), *modifiers),
            CapturedPayload::Click { modifiers, .. } => (None, None, *modifiers),
            _ => (None, None, Modifiers::default()),
        };

        let related_events = self.coalesce(&id, &element, action, captured.timestamp_ms);
        if !related_events.is_empty() {
            debug!(%id, related = ?related_events, "coalesced with recent events");
        }

        NormalizedEvent {
            id,
            event_type: captured.event_type,
            action,
            value,
            key,
            modifiers,
            raw_target: captured.target,
            effective_target,
            coordinates: normalize_coordinates(dom, captured),
            environment: self.environment(dom, effective_target),
            framework: detect_framework(dom, effective_target),
            element,
            related_events,
            is_trusted: captured.is_trusted,
            timestamp_ms: captured.timestamp_ms,
        }
    }

    fn describe(&self, dom: &Dom, element: NodeId) -> ElementInfo {
        let mut info = classify_excluding(dom, element, &self.options.ignored_classes);
        if self.options.include_iframe_chain {
            info.iframe_chain = get_iframe_chain(dom, element);
        }
        if self.options.include_shadow_chain {
            info.shadow_host_chain = get_shadow_host_chain(dom, element);
        }
        info
    }

    // ------------------------------------------------------------------
    // Coalescing
    // ------------------------------------------------------------------

    /// `action:tag:id:class`. Two distinct elements with identical tag,
    /// id and class attributes share a key, so links are approximate.
    fn coalesce_key(action: ActionKind, element: &ElementInfo) -> String {
        format!(
            "{}:{}:{}:{}",
            action.as_str(),
            element.tag_name,
            element.id.as_deref().unwrap_or(""),
            element.class_list.join(" "),
        )
    }

    fn coalesce(&mut self, id: &str, element: &ElementInfo, action: ActionKind, now: u64) -> Vec<String> {
        let window = self.options.coalesce_window_ms;
        let horizon = window.saturating_mul(2);
        while self
            .recent
            .front()
            .is_some_and(|e| now.saturating_sub(e.timestamp_ms) > horizon)
        {
            self.recent.pop_front();
        }

        let key = Self::coalesce_key(action, element);
        let mut related = vec![];
        for entry in self.recent.iter_mut() {
            if entry.key == key && now.abs_diff(entry.timestamp_ms) <= window {
                entry.related.push(id.to_string());
                related.push(entry.id.clone());
            }
        }

        self.recent.push_back(RecentEvent {
            id: id.to_string(),
            key,
            timestamp_ms: now,
            related: related.clone(),
        });
        related
    }

    /// Current links for a recent event, including ones added after it was
    /// normalized. Empty once the event has aged out of the cache.
    pub fn related_events(&self, id: &str) -> Vec<String> {
        self.recent
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.related.clone())
            .unwrap_or_default()
    }

    pub fn cached_event_count(&self) -> usize {
        self.recent.len()
    }
}

/// Viewport point from the event, document point from the current scroll
/// offset, element point from the target's current bounding rect.
pub fn normalize_coordinates(dom: &Dom, captured: &CapturedEvent) -> Option<NormalizedCoordinates> {
    let CapturedPayload::Click { coordinates, .. } = &captured.payload else {
        return None;
    };
    let (scroll_x, scroll_y) = dom
        .owner_document(captured.target)
        .and_then(|d| dom.document_data(d))
        .map(|d| (d.scroll_x, d.scroll_y))
        .unwrap_or((0.0, 0.0));
    let rect = dom
        .element(captured.target)
        .map(|el| el.rect)
        .unwrap_or_default();

    Some(NormalizedCoordinates {
        viewport: Point {
            x: coordinates.client_x,
            y: coordinates.client_y,
        },
        document: Point {
            x: coordinates.client_x + scroll_x,
            y: coordinates.client_y + scroll_y,
        },
        element: Point {
            x: coordinates.client_x - rect.x,
            y: coordinates.client_y - rect.y,
        },
    })
}
