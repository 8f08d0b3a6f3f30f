use uuid::Uuid;

use crate::dom::document::Dom;
use crate::dom::event::EventType;
use crate::element::classifier::MASKED_VALUE;
use crate::element::element_model::{ElementInfo, ElementKind, LocatorBundle};
use crate::normalizer::normalized_event::{ActionKind, NormalizedCoordinates, NormalizedEvent};
use crate::step::label::{BasicLabelResolver, LabelResolver};
use crate::step::step_model::{Step, StepMetadata, StepTarget, ValidationReport};

/// Two same-target edits closer than this collapse into one step.
pub const MERGE_WINDOW_MS: u64 = 1000;

pub const DEFAULT_LABEL: &str = "Unlabeled element";

#[derive(Debug, Clone, PartialEq)]
pub struct StepBuilderOptions {
    pub default_label: String,
    pub mask_sensitive_values: bool,
    pub merge_window_ms: u64,
}

impl Default for StepBuilderOptions {
    fn default() -> Self {
        Self {
            default_label: DEFAULT_LABEL.to_string(),
            mask_sensitive_values: true,
            merge_window_ms: MERGE_WINDOW_MS,
        }
    }
}

/// Everything `build` needs besides the DOM.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub event: &'a NormalizedEvent,
    pub screenshot: Option<&'a str>,
}

impl<'a> StepContext<'a> {
    pub fn new(event: &'a NormalizedEvent) -> Self {
        Self {
            event,
            screenshot: None,
        }
    }
}

/// Field-by-field step construction; ids are assigned by
/// [`StepBuilder::finish`].
#[derive(Debug, Clone, Default)]
pub struct StepDraft {
    event: Option<EventType>,
    action: Option<ActionKind>,
    target: Option<StepTarget>,
    locator: Option<LocatorBundle>,
    label: Option<String>,
    label_confidence: f64,
    value: Option<String>,
    key: Option<String>,
    coordinates: Option<NormalizedCoordinates>,
    screenshot: Option<String>,
    url: Option<String>,
    timestamp_ms: u64,
    metadata: StepMetadata,
}

impl StepDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(mut self, event: EventType) -> Self {
        self.event = Some(event);
        self
    }

    pub fn action(mut self, action: ActionKind) -> Self {
        self.action = Some(action);
        self
    }

    pub fn target(mut self, target: StepTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// Sets the locator and, unless already set, the target derived from it.
    pub fn locator(mut self, locator: LocatorBundle) -> Self {
        if self.target.is_none() {
            self.target = Some(StepTarget::from_element(&locator));
        }
        self.locator = Some(locator);
        self
    }

    pub fn label(mut self, label: &str, confidence: f64) -> Self {
        self.label = Some(label.to_string());
        self.label_confidence = confidence;
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn coordinates(mut self, coordinates: NormalizedCoordinates) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn screenshot(mut self, screenshot: &str) -> Self {
        self.screenshot = Some(screenshot.to_string());
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn at(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn metadata(mut self, metadata: StepMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Assembles [`Step`]s from normalized events and owns the session's step
/// sequence.
pub struct StepBuilder {
    options: StepBuilderOptions,
    sequence: u64,
    labels: Box<dyn LabelResolver>,
}

impl StepBuilder {
    pub fn new(options: StepBuilderOptions) -> Self {
        Self::with_label_resolver(options, Box::new(BasicLabelResolver))
    }

    pub fn with_label_resolver(options: StepBuilderOptions, labels: Box<dyn LabelResolver>) -> Self {
        Self {
            options,
            sequence: 0,
            labels,
        }
    }

    pub fn options(&self) -> &StepBuilderOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: StepBuilderOptions) {
        self.options = options;
    }

    pub fn set_label_resolver(&mut self, labels: Box<dyn LabelResolver>) {
        self.labels = labels;
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Restart numbering for a new session.
    pub fn reset(&mut self) {
        self.sequence = 0;
    }

    /// `step_{sequence}_{timestamp}_{random}`. The sequence alone orders
    /// steps; the suffix only guards against cross-session collisions.
    fn next_id(&mut self, timestamp_ms: u64) -> (u64, String) {
        self.sequence += 1;
        let suffix = Uuid::new_v4().simple().to_string();
        let id = format!("step_{}_{}_{}", self.sequence, timestamp_ms, &suffix[..8]);
        (self.sequence, id)
    }

    pub fn build(&mut self, dom: &Dom, context: &StepContext<'_>) -> Step {
        let event = context.event;
        let label = self.labels.resolve(dom, event.effective_target);
        let label_text = if label.success && !label.label.is_empty() {
            label.label
        } else {
            self.options.default_label.clone()
        };

        let event_type = match event.event_type {
            // A press is a click as far as replay is concerned.
            EventType::MouseDown | EventType::MouseUp => EventType::Click,
            EventType::Change if event.action == ActionKind::Input => EventType::Input,
            other => other,
        };

        let mut draft = StepDraft::new()
            .event(event_type)
            .action(event.action)
            .locator(event.element.clone())
            .label(&label_text, label.confidence)
            .url(&event.environment.page_url)
            .at(event.timestamp_ms)
            .metadata(StepMetadata {
                merged_from: None,
                source_event: Some(event.id.clone()),
                related_events: event.related_events.clone(),
                framework: Some(event.framework),
                label_confidence: label.confidence,
                environment: Some(event.environment.clone()),
            });
        if let Some(value) = &event.value {
            draft = draft.value(value);
        }
        if let Some(key) = &event.key {
            draft = draft.key(key);
        }
        if let Some(coords) = event.coordinates {
            draft = draft.coordinates(coords);
        }
        if let Some(shot) = context.screenshot {
            draft = draft.screenshot(shot);
        }
        self.finish(draft)
    }

    /// Turn a draft into a step: assigns id and sequence, falls back to the
    /// default label, masks sensitive values and writes the description.
    pub fn finish(&mut self, draft: StepDraft) -> Step {
        let (sequence, id) = self.next_id(draft.timestamp_ms);
        let label = draft
            .label
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| self.options.default_label.clone());

        let sensitive = draft.locator.as_ref().is_some_and(|l| l.is_sensitive);
        let value = match draft.value {
            Some(_) if sensitive && self.options.mask_sensitive_values => {
                Some(MASKED_VALUE.to_string())
            }
            other => other,
        };

        // Without an explicit type or a locator there is nothing to infer
        // from, and validation reports the missing type.
        let event = match (draft.event, draft.locator.as_ref()) {
            (None, Some(locator)) => Some(infer_event_type(None, Some(locator))),
            (event, _) => event,
        };

        let mut step = Step {
            id,
            sequence,
            name: format!("Step {}", sequence),
            label,
            description: String::new(),
            event,
            action: draft.action,
            target: draft.target,
            locator: draft.locator,
            value,
            key: draft.key,
            coordinates: draft.coordinates,
            screenshot: draft.screenshot,
            url: draft.url,
            timestamp_ms: draft.timestamp_ms,
            metadata: StepMetadata {
                label_confidence: draft.label_confidence,
                ..draft.metadata
            },
        };
        step.description = describe_step(&step);
        step
    }
}

impl std::fmt::Debug for StepBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepBuilder")
            .field("options", &self.options)
            .field("sequence", &self.sequence)
            .finish()
    }
}

// ============================================================================
// Inference, validation, merge
// ============================================================================

/// Explicit type first; otherwise from tag and input type.
pub fn infer_event_type(explicit: Option<EventType>, element: Option<&ElementInfo>) -> EventType {
    if let Some(event) = explicit {
        return event;
    }
    let Some(info) = element else {
        return EventType::Click;
    };
    match (info.tag_name.as_str(), info.role.as_deref()) {
        ("textarea" | "select", _) => EventType::Input,
        ("input" | "button" | "a", _) => EventType::Click,
        (_, Some("textbox" | "combobox" | "listbox")) => EventType::Input,
        _ => EventType::Click,
    }
}

pub fn validate(step: &Step) -> ValidationReport {
    let mut errors = vec![];
    let mut warnings = vec![];

    if step.event.is_none() {
        errors.push("missing type".to_string());
    }
    if step.target.is_none() {
        errors.push("missing target".to_string());
    }
    if step.timestamp_ms == 0 {
        errors.push("invalid timestamp".to_string());
    }
    if step.locator.is_none() {
        warnings.push("missing locator bundle".to_string());
    }
    if step.target.as_ref().is_some_and(|t| t.selector.is_empty() && t.xpath.is_empty()) {
        warnings.push("target has neither selector nor xpath".to_string());
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Same type, same target, within `window_ms` of each other.
pub fn should_merge(a: &Step, b: &Step, window_ms: u64) -> bool {
    let same_type = a.event.is_some() && a.event == b.event;
    let same_target = match (&a.target, &b.target) {
        (Some(x), Some(y)) => x.same_element(y),
        _ => false,
    };
    same_type && same_target && a.timestamp_ms.abs_diff(b.timestamp_ms) <= window_ms
}

/// Collapse two steps: the earlier step's id and position, the later step's
/// timestamp, value and payload, and `merged_from` naming the earlier id.
pub fn merge_steps(a: &Step, b: &Step) -> Step {
    let (earlier, later) = if (a.timestamp_ms, a.sequence) <= (b.timestamp_ms, b.sequence) {
        (a, b)
    } else {
        (b, a)
    };

    let mut merged = later.clone();
    merged.id = earlier.id.clone();
    merged.sequence = earlier.sequence;
    merged.name = earlier.name.clone();
    merged.metadata.merged_from = Some(earlier.id.clone());
    for id in &earlier.metadata.related_events {
        if !merged.metadata.related_events.contains(id) {
            merged.metadata.related_events.push(id.clone());
        }
    }
    merged
}

// ============================================================================
// Descriptions
// ============================================================================

fn element_noun(step: &Step) -> &str {
    let Some(locator) = &step.locator else {
        return "element";
    };
    match locator.element_type.as_str() {
        "container" | "unknown" | "" => "element",
        other => other,
    }
}

/// "Click on 'Submit' button", "Type 'Alice' into 'Name'", ...
pub fn describe_step(step: &Step) -> String {
    let label = &step.label;
    let noun = element_noun(step);
    let value = step.value.as_deref().unwrap_or("");
    let kind = step.locator.as_ref().map(|l| l.kind);

    match (step.action, step.event) {
        (Some(ActionKind::Check), _) => format!("Check '{}' {}", label, noun),
        (Some(ActionKind::Uncheck), _) => format!("Uncheck '{}' {}", label, noun),
        (Some(ActionKind::Select), _) => format!("Select '{}' {}", label, noun),
        (Some(ActionKind::Navigate), _) => format!("Navigate via '{}' {}", label, noun),
        (Some(ActionKind::KeyPress), _) => format!(
            "Press {} in '{}'",
            step.key.as_deref().unwrap_or("key"),
            label
        ),
        (Some(ActionKind::Submit), _) | (_, Some(EventType::Submit)) => {
            format!("Submit '{}' {}", label, noun)
        }
        (Some(ActionKind::Input), _) | (None, Some(EventType::Input | EventType::Change)) => {
            match kind {
                Some(ElementKind::Select) => format!("Select '{}' in '{}'", value, label),
                Some(ElementKind::Checkbox | ElementKind::Radio) => {
                    format!("Set '{}' to {}", label, value)
                }
                _ => format!("Type '{}' into '{}'", value, label),
            }
        }
        (Some(ActionKind::Focus), _) | (_, Some(EventType::Focus)) => format!("Focus '{}'", label),
        (Some(ActionKind::Blur), _) | (_, Some(EventType::Blur)) => format!("Leave '{}'", label),
        (_, Some(EventType::KeyDown | EventType::KeyUp)) => format!("Press key in '{}'", label),
        (_, Some(EventType::DblClick)) => format!("Double-click on '{}' {}", label, noun),
        _ => format!("Click on '{}' {}", label, noun),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(selector: &str) -> StepTarget {
        StepTarget {
            tag_name: "input".into(),
            id: None,
            selector: selector.into(),
            xpath: String::new(),
            text: None,
            iframe_chain: vec![],
            shadow_host_chain: vec![],
        }
    }

    #[test]
    fn ids_are_sequenced() {
        let mut builder = StepBuilder::new(StepBuilderOptions::default());
        let a = builder.finish(StepDraft::new().event(EventType::Click).at(10));
        let b = builder.finish(StepDraft::new().event(EventType::Click).at(10));
        assert!(a.id.starts_with("step_1_10_"));
        assert!(b.id.starts_with("step_2_10_"));
        assert_eq!(a.id.len(), "step_1_10_".len() + 8);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn missing_label_falls_back_to_default() {
        let mut builder = StepBuilder::new(StepBuilderOptions::default());
        let step = builder.finish(StepDraft::new().event(EventType::Click).label("", 0.0).at(5));
        assert_eq!(step.label, DEFAULT_LABEL);
        assert_eq!(step.description, "Click on 'Unlabeled element' element");
    }

    #[test]
    fn validation_separates_errors_from_warnings() {
        let mut builder = StepBuilder::new(StepBuilderOptions::default());
        let bare = builder.finish(StepDraft::new());
        let report = validate(&bare);
        assert!(!report.valid);
        assert_eq!(report.errors, vec!["missing type", "missing target", "invalid timestamp"]);
        assert_eq!(report.warnings, vec!["missing locator bundle"]);

        let ok = builder.finish(StepDraft::new().event(EventType::Click).target(target("#go")).at(1));
        let report = validate(&ok);
        assert!(report.valid);
        assert_eq!(report.warnings, vec!["missing locator bundle"]);
    }

    #[test]
    fn inference_prefers_explicit_type() {
        assert_eq!(infer_event_type(Some(EventType::Submit), None), EventType::Submit);
        assert_eq!(infer_event_type(None, None), EventType::Click);
        let mut info = ElementInfo::unknown();
        info.tag_name = "textarea".into();
        assert_eq!(infer_event_type(None, Some(&info)), EventType::Input);
        info.tag_name = "a".into();
        assert_eq!(infer_event_type(None, Some(&info)), EventType::Click);
    }

    #[test]
    fn type_is_inferred_from_the_locator() {
        let mut builder = StepBuilder::new(StepBuilderOptions::default());
        let mut info = ElementInfo::unknown();
        info.tag_name = "textarea".into();
        let step = builder.finish(StepDraft::new().locator(info).at(3));
        assert_eq!(step.event, Some(EventType::Input));
        assert!(!validate(&step).errors.contains(&"missing type".to_string()));

        let bare = builder.finish(StepDraft::new().at(3));
        assert_eq!(bare.event, None);
    }

    #[test]
    fn merge_is_order_independent() {
        let mut builder = StepBuilder::new(StepBuilderOptions::default());
        let a = builder.finish(
            StepDraft::new().event(EventType::Input).target(target("#q")).value("he").at(100),
        );
        let b = builder.finish(
            StepDraft::new().event(EventType::Input).target(target("#q")).value("hello").at(400),
        );
        assert_eq!(merge_steps(&a, &b), merge_steps(&b, &a));
        assert!(!should_merge(&a, &b, 200));
        assert!(should_merge(&a, &b, 300));
    }
}
