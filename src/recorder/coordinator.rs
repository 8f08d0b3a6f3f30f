use tracing::{debug, info, warn};

use crate::boundary::watcher::{BoundaryEvent, BoundaryWatcher};
use crate::capture::captured_event::{CapturedEvent, CapturedPayload};
use crate::capture::event_capture::EventCapture;
use crate::dom::document::Dom;
use crate::dom::event::{DomEvent, EventType};
use crate::dom::node::NodeId;
use crate::normalizer::event_normalizer::EventNormalizer;
use crate::normalizer::normalized_event::ActionKind;
use crate::normalizer::target::select2_backing_select;
use crate::recorder::collaborators::{
    Broadcaster, SessionStore, TOPIC_PAUSED, TOPIC_RESUMED, TOPIC_STARTED, TOPIC_STEP,
    TOPIC_STOPPED,
};
use crate::recorder::config::RecorderConfig;
use crate::recorder::error::RecorderError;
use crate::recorder::events::{BoundaryKind, RecorderEvent};
use crate::recorder::state::{RecordingSession, RecordingState, RecordingStatus};
use crate::step::builder::{StepBuilder, StepContext, merge_steps, should_merge};
use crate::step::label::LabelResolver;
use crate::step::step_model::Step;
use crate::subscribers::{Subscribers, Subscription};
use crate::timer::TimerQueue;
use crate::tracker::change_tracker::{InputChangeTracker, ValueChange};
use crate::tracker::input_types::TrackedInputType;

fn is_value_step(step: &Step) -> bool {
    matches!(step.event, Some(EventType::Input | EventType::Change))
}

/// Owns one recording at a time and drives the capture, tracking,
/// normalization and step-building stages for it.
///
/// Time is supplied by the caller: every [`DomEvent`] carries a timestamp,
/// and [`Recorder::tick`] fires timers (debounce, highlight removal, frame
/// retries, auto-save) when no events arrive.
pub struct Recorder {
    config: RecorderConfig,
    status: RecordingStatus,
    session: Option<RecordingSession>,
    last_error: Option<String>,

    capture: EventCapture,
    tracker: InputChangeTracker,
    normalizer: EventNormalizer,
    builder: StepBuilder,
    watcher: BoundaryWatcher,

    highlights: TimerQueue<NodeId>,
    next_auto_save: Option<u64>,
    /// Element and time of the last check/uncheck/select step, so the
    /// `change` that follows the same click is not recorded twice.
    last_toggle: Option<(NodeId, u64)>,

    broadcaster: Option<Box<dyn Broadcaster>>,
    store: Option<Box<dyn SessionStore>>,
    step_subscribers: Subscribers<Step>,
    event_subscribers: Subscribers<RecorderEvent>,
    error_subscribers: Subscribers<RecorderError>,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            capture: EventCapture::new(config.capture_options()),
            tracker: InputChangeTracker::new(config.tracker_options()),
            normalizer: EventNormalizer::new(config.normalizer_options()),
            builder: StepBuilder::new(config.builder_options()),
            watcher: BoundaryWatcher::new(
                config.retry_policy(),
                config.include_iframes,
                config.include_shadow_dom,
            ),
            config,
            status: RecordingStatus::Idle,
            session: None,
            last_error: None,
            highlights: TimerQueue::new(),
            next_auto_save: None,
            last_toggle: None,
            broadcaster: None,
            store: None,
            step_subscribers: Subscribers::new("step"),
            event_subscribers: Subscribers::new("recorder-event"),
            error_subscribers: Subscribers::new("recorder-error"),
        }
    }

    pub fn with_label_resolver(mut self, labels: Box<dyn LabelResolver>) -> Self {
        self.builder.set_label_resolver(labels);
        self
    }

    pub fn with_broadcaster(mut self, broadcaster: impl Broadcaster + 'static) -> Self {
        self.broadcaster = Some(Box::new(broadcaster));
        self
    }

    pub fn with_store(mut self, store: impl SessionStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn status(&self) -> RecordingStatus {
        self.status
    }

    pub fn is_recording(&self) -> bool {
        self.status == RecordingStatus::Recording
    }

    /// Listeners currently registered by this recorder across all roots.
    pub fn listener_count(&self) -> usize {
        self.capture.listener_count()
    }

    pub fn attached_roots(&self) -> Vec<NodeId> {
        self.capture.attached_roots()
    }

    /// Extra capture veto; returning `false` drops the event.
    pub fn add_capture_filter<F>(&mut self, filter: F)
    where
        F: Fn(&Dom, &CapturedEvent) -> bool + 'static,
    {
        self.capture.add_filter(filter);
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    pub fn on_step<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Step) + 'static,
    {
        self.step_subscribers.subscribe(callback)
    }

    pub fn add_event_listener<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RecorderEvent) + 'static,
    {
        self.event_subscribers.subscribe(callback)
    }

    pub fn on_error<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RecorderError) + 'static,
    {
        self.error_subscribers.subscribe(callback)
    }

    /// Raw tracker output, intermediate changes included.
    pub fn on_value_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ValueChange) + 'static,
    {
        self.tracker.on_value_change(callback)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    pub fn start(&mut self, dom: &mut Dom, now_ms: u64) -> Result<(), RecorderError> {
        if !self.status.can_start() {
            return Err(RecorderError::InvalidTransition {
                from: self.status,
                action: "start",
            });
        }

        self.reset_components(dom);
        // Boundaries already on the page are found by discovery below.
        dom.take_mutations();

        let document = dom.main_document();
        let url = dom
            .document_data(document)
            .map(|d| d.url.clone())
            .unwrap_or_default();
        self.capture
            .attach(dom, document, &self.config.capture_events);
        // Values already on the page (autofill, scripts) are the baseline.
        let tracked = self.tracker.track_existing(dom, document, now_ms);
        debug!(tracked, "tracking existing inputs");

        self.session = Some(RecordingSession::new(&url, now_ms));
        self.status = RecordingStatus::Recording;
        self.last_error = None;
        self.next_auto_save = match self.config.auto_save_interval_ms {
            0 => None,
            interval => Some(now_ms + interval),
        };

        let boundaries = self.watcher.discover(dom, document, now_ms);
        self.handle_boundaries(dom, boundaries, now_ms);

        let session_id = self.session_id();
        info!(session = %session_id, %url, listeners = self.capture.listener_count(), "recording started");
        self.announce(
            TOPIC_STARTED,
            serde_json::json!({ "sessionId": session_id, "url": url }),
        );
        self.event_subscribers
            .emit(&RecorderEvent::Started { session_id, url });
        Ok(())
    }

    /// Replace the configuration, then start.
    pub fn start_with_config(
        &mut self,
        dom: &mut Dom,
        config: RecorderConfig,
        now_ms: u64,
    ) -> Result<(), RecorderError> {
        if !self.status.can_start() {
            return Err(RecorderError::InvalidTransition {
                from: self.status,
                action: "start",
            });
        }
        self.capture.set_options(config.capture_options());
        self.tracker.set_options(config.tracker_options());
        self.normalizer.set_options(config.normalizer_options());
        self.builder.set_options(config.builder_options());
        self.watcher = BoundaryWatcher::new(
            config.retry_policy(),
            config.include_iframes,
            config.include_shadow_dom,
        );
        self.config = config;
        self.start(dom, now_ms)
    }

    pub fn pause(&mut self) -> Result<(), RecorderError> {
        if self.status != RecordingStatus::Recording {
            return Err(RecorderError::InvalidTransition {
                from: self.status,
                action: "pause",
            });
        }
        self.set_status(RecordingStatus::Paused);
        let session_id = self.session_id();
        info!(session = %session_id, "recording paused");
        self.announce(TOPIC_PAUSED, serde_json::json!({ "sessionId": session_id }));
        self.event_subscribers
            .emit(&RecorderEvent::Paused { session_id });
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), RecorderError> {
        if self.status != RecordingStatus::Paused {
            return Err(RecorderError::InvalidTransition {
                from: self.status,
                action: "resume",
            });
        }
        self.set_status(RecordingStatus::Recording);
        let session_id = self.session_id();
        info!(session = %session_id, "recording resumed");
        self.announce(TOPIC_RESUMED, serde_json::json!({ "sessionId": session_id }));
        self.event_subscribers
            .emit(&RecorderEvent::Resumed { session_id });
        Ok(())
    }

    /// Flush pending input, detach every listener, cancel every timer and
    /// return the final step list.
    pub fn stop(&mut self, dom: &mut Dom, now_ms: u64) -> Result<Vec<Step>, RecorderError> {
        if !self.status.is_active() {
            return Err(RecorderError::InvalidTransition {
                from: self.status,
                action: "stop",
            });
        }
        self.set_status(RecordingStatus::Stopping);

        for captured in self.capture.flush_all_pending() {
            self.handle_captured(dom, captured);
        }
        let pending = self.tracker.flush_all(now_ms);
        self.record_changes(dom, pending);

        let removed = self.capture.detach(dom);
        self.watcher.cancel_all();
        self.tracker.reset();
        self.clear_highlights(dom);
        self.next_auto_save = None;
        self.last_toggle = None;

        if let Some(session) = self.session.as_mut() {
            session.stopped_at_ms = Some(now_ms);
        }
        self.set_status(RecordingStatus::Stopped);
        self.save_session();

        let steps = self.steps().to_vec();
        let session_id = self.session_id();
        info!(session = %session_id, steps = steps.len(), listeners_removed = removed, "recording stopped");
        self.announce(
            TOPIC_STOPPED,
            serde_json::json!({ "sessionId": session_id, "stepCount": steps.len() }),
        );
        self.event_subscribers.emit(&RecorderEvent::Stopped {
            session_id,
            step_count: steps.len(),
        });
        Ok(steps)
    }

    /// Put the recorder into the error state after an unrecoverable failure
    /// in the embedding application. Listeners are removed; recorded steps
    /// are kept.
    pub fn fail(&mut self, dom: &mut Dom, message: &str) {
        self.capture.detach(dom);
        self.watcher.cancel_all();
        self.tracker.reset();
        self.clear_highlights(dom);
        self.next_auto_save = None;
        self.set_status(RecordingStatus::Error);
        self.report_error(RecorderError::Fatal(message.to_string()));
    }

    fn reset_components(&mut self, dom: &mut Dom) {
        self.capture.detach(dom);
        self.clear_highlights(dom);
        self.tracker.reset();
        self.normalizer.reset();
        self.builder.reset();
        self.watcher.reset();
        self.last_toggle = None;
    }

    fn set_status(&mut self, status: RecordingStatus) {
        self.status = status;
        if let Some(session) = self.session.as_mut() {
            session.status = status;
        }
    }

    fn session_id(&self) -> String {
        self.session
            .as_ref()
            .map(|s| s.id.clone())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Event flow
    // ------------------------------------------------------------------------

    /// Deliver one browser event. Mutations queued since the last call and
    /// timers due by the event's timestamp are processed first, so the
    /// returned steps are in the order the user acted.
    pub fn dispatch(&mut self, dom: &mut Dom, event: &DomEvent) -> Vec<Step> {
        let now = event.timestamp_ms;
        let mut recorded = self.process_mutations(dom, now);
        recorded.extend(self.tick(dom, now));
        if self.status != RecordingStatus::Recording {
            return recorded;
        }

        for captured in self.capture.handle(dom, event) {
            recorded.extend(self.handle_captured(dom, captured));
        }
        recorded
    }

    /// Advance virtual time to `now_ms`.
    pub fn tick(&mut self, dom: &mut Dom, now_ms: u64) -> Vec<Step> {
        self.expire_highlights(dom, now_ms);
        if !self.status.is_active() {
            return vec![];
        }
        let boundaries = self.watcher.tick(dom, now_ms);
        self.handle_boundaries(dom, boundaries, now_ms);

        // Paused sessions keep their debounces until resumed or stopped.
        if self.status != RecordingStatus::Recording {
            return vec![];
        }
        let due = self.tracker.tick(now_ms);
        let mut recorded = self.record_changes(dom, due);
        for captured in self.capture.tick(now_ms) {
            recorded.extend(self.handle_captured(dom, captured));
        }
        self.auto_save(now_ms);
        recorded
    }

    /// Drain the DOM's mutation queue: attach to new frames and shadow
    /// roots, detach from roots that left the page and flush edits on
    /// removed inputs.
    pub fn process_mutations(&mut self, dom: &mut Dom, now_ms: u64) -> Vec<Step> {
        let mutations = dom.take_mutations();
        if mutations.is_empty() || !self.status.is_active() {
            return vec![];
        }

        let boundaries = self.watcher.process(dom, &mutations, now_ms);
        self.handle_boundaries(dom, boundaries, now_ms);

        let main = dom.main_document();
        for root in self.capture.attached_roots() {
            if root != main && !dom.is_connected(root) {
                self.capture.detach_root(dom, root);
                debug!(?root, "detached from removed root");
            }
        }

        let flushed = self.tracker.prune_disconnected(dom, now_ms);
        self.record_changes(dom, flushed)
    }

    fn handle_boundaries(&mut self, dom: &mut Dom, events: Vec<BoundaryEvent>, now_ms: u64) {
        for event in events {
            let (kind, root) = match event {
                BoundaryEvent::FrameDocument { document, .. } => (BoundaryKind::Frame, document),
                BoundaryEvent::ShadowRoot { root, .. } => (BoundaryKind::Shadow, root),
                BoundaryEvent::Inaccessible { element, reason } => {
                    debug!(?element, %reason, "boundary not attachable");
                    self.event_subscribers
                        .emit(&RecorderEvent::BoundaryInaccessible {
                            element,
                            reason: reason.to_string(),
                        });
                    continue;
                }
            };
            if self
                .capture
                .attach(dom, root, &self.config.capture_events)
            {
                let tracked = self.tracker.track_existing(dom, root, now_ms);
                debug!(?root, ?kind, tracked, "capture attached to boundary");
                self.event_subscribers
                    .emit(&RecorderEvent::BoundaryAttached { kind, root });
            }
        }
    }

    fn handle_captured(&mut self, dom: &mut Dom, captured: CapturedEvent) -> Vec<Step> {
        let now = captured.timestamp_ms;
        match captured.payload {
            CapturedPayload::Value { .. } => {
                let element = select2_backing_select(dom, captured.target).unwrap_or(captured.target);
                let tracked = dom
                    .element(element)
                    .and_then(TrackedInputType::from_element)
                    .is_some();
                if !tracked {
                    return self.record_captured(dom, &captured).into_iter().collect();
                }
                let changes = match captured.event_type {
                    EventType::Change => self.tracker.handle_change(dom, element, now),
                    _ => self.tracker.handle_input(dom, element, now),
                };
                self.record_changes(dom, changes)
            }
            CapturedPayload::Blur => {
                let changes = self.tracker.handle_blur(captured.target, now);
                self.record_changes(dom, changes)
            }
            CapturedPayload::Focus => vec![],
            CapturedPayload::Click { .. } | CapturedPayload::Key { .. } | CapturedPayload::Submit => {
                // Pending edits come first so steps stay in the order the user acted.
                let pending = self.tracker.flush_all(now);
                let mut recorded = self.record_changes(dom, pending);

                // Opening a native select is not an action; the change is.
                if matches!(captured.payload, CapturedPayload::Click { .. })
                    && dom
                        .closest(captured.target, |el| matches!(el.tag.as_str(), "select" | "option"))
                        .is_some()
                {
                    debug!(target = ?captured.target, "pointer on select ignored");
                    return recorded;
                }
                recorded.extend(self.record_captured(dom, &captured));
                recorded
            }
        }
    }

    fn record_changes(&mut self, dom: &mut Dom, changes: Vec<ValueChange>) -> Vec<Step> {
        let mut recorded = vec![];
        for change in changes.into_iter().filter(|c| c.is_final) {
            if change.input_type.is_immediate() {
                let echoes_click = self.last_toggle.is_some_and(|(el, at)| {
                    el == change.element
                        && change.timestamp_ms.saturating_sub(at) <= self.config.merge_window_ms
                });
                if echoes_click {
                    debug!(element = ?change.element, "change already recorded as click");
                    continue;
                }
            }
            let event_type = if change.input_type.is_immediate() {
                EventType::Change
            } else {
                EventType::Input
            };
            let captured =
                CapturedEvent::value_change(event_type, change.element, change.value, change.timestamp_ms);
            recorded.extend(self.record_captured(dom, &captured));
        }
        recorded
    }

    fn record_captured(&mut self, dom: &mut Dom, captured: &CapturedEvent) -> Option<Step> {
        let normalized = self.normalizer.normalize(dom, captured);
        let step = self.builder.build(dom, &StepContext::new(&normalized));
        let recorded = self.record_step(step)?;

        if matches!(
            recorded.action,
            Some(ActionKind::Check | ActionKind::Uncheck | ActionKind::Select)
        ) {
            self.last_toggle = Some((normalized.effective_target, recorded.timestamp_ms));
        }
        self.highlight(dom, normalized.effective_target, recorded.timestamp_ms);
        Some(recorded)
    }

    /// Append `step` (or merge it into the previous one). Returns what was
    /// stored, or `None` when the step ceiling dropped it. Once the ceiling
    /// is reached nothing changes, merges included.
    fn record_step(&mut self, step: Step) -> Option<Step> {
        let merge_window = self.config.merge_window_ms;
        let merge_inputs = self.config.merge_consecutive_inputs;
        let max_steps = self.config.max_steps;
        let session = self.session.as_mut()?;

        // A full session is frozen, merges included.
        if max_steps > 0 && session.steps.len() >= max_steps {
            debug!(max_steps, "step ceiling reached, dropping");
            self.event_subscribers.emit(&RecorderEvent::StepDropped {
                reason: "max_steps".to_string(),
                timestamp_ms: step.timestamp_ms,
            });
            return None;
        }

        let merge_last = merge_inputs
            && session.steps.last().is_some_and(|last| {
                is_value_step(last) && is_value_step(&step) && should_merge(last, &step, merge_window)
            });

        if merge_last {
            let last = session.steps.last_mut()?;
            let merged = merge_steps(last, &step);
            *last = merged.clone();
            debug!(step = %merged.id, value = ?merged.value, "merged into previous step");
            self.publish_step(&merged);
            self.event_subscribers.emit(&RecorderEvent::StepMerged {
                merged_from: merged.id.clone(),
                step: Box::new(merged.clone()),
            });
            return Some(merged);
        }

        session.steps.push(step.clone());
        debug!(step = %step.id, description = %step.description, "step recorded");
        self.publish_step(&step);
        self.event_subscribers.emit(&RecorderEvent::StepRecorded {
            step: Box::new(step.clone()),
        });
        Some(step)
    }

    fn publish_step(&self, step: &Step) {
        match serde_json::to_value(step) {
            Ok(payload) => self.announce(TOPIC_STEP, payload),
            Err(e) => warn!(step = %step.id, error = %e, "could not serialize step for broadcast"),
        }
        self.step_subscribers.emit(step);
    }

    fn announce(&self, topic: &str, payload: serde_json::Value) {
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.broadcast(topic, payload);
        }
    }

    // ------------------------------------------------------------------------
    // Side effects
    // ------------------------------------------------------------------------

    fn highlight(&mut self, dom: &mut Dom, element: NodeId, now_ms: u64) {
        if !self.config.highlight_elements {
            return;
        }
        match dom.add_class(element, &self.config.highlight_class) {
            Ok(()) => self
                .highlights
                .schedule(element, now_ms + self.config.highlight_duration_ms),
            Err(e) => debug!(?element, error = %e, "highlight skipped"),
        }
    }

    fn expire_highlights(&mut self, dom: &mut Dom, now_ms: u64) {
        for element in self.highlights.take_due(now_ms) {
            if let Err(e) = dom.remove_class(element, &self.config.highlight_class) {
                debug!(?element, error = %e, "highlight removal skipped");
            }
        }
    }

    fn clear_highlights(&mut self, dom: &mut Dom) {
        for element in self.highlights.drain() {
            if let Err(e) = dom.remove_class(element, &self.config.highlight_class) {
                debug!(?element, error = %e, "highlight removal skipped");
            }
        }
    }

    fn auto_save(&mut self, now_ms: u64) {
        let Some(due) = self.next_auto_save else {
            return;
        };
        if now_ms < due {
            return;
        }
        self.save_session();
        self.next_auto_save = Some(now_ms + self.config.auto_save_interval_ms);
    }

    fn save_session(&mut self) {
        let (Some(store), Some(session)) = (&self.store, &self.session) else {
            return;
        };
        match store.save(session) {
            Ok(()) => debug!(session = %session.id, steps = session.steps.len(), "session saved"),
            Err(e) => self.report_error(RecorderError::Store(e)),
        }
    }

    fn report_error(&mut self, error: RecorderError) {
        warn!(error = %error, "recorder error");
        let message = error.to_string();
        self.last_error = Some(message.clone());
        self.event_subscribers
            .emit(&RecorderEvent::Error { message });
        self.error_subscribers.emit(&error);
    }

    // ------------------------------------------------------------------------
    // Queries and undo
    // ------------------------------------------------------------------------

    pub fn steps(&self) -> &[Step] {
        self.session.as_ref().map(|s| s.steps.as_slice()).unwrap_or(&[])
    }

    pub fn get_step_count(&self) -> usize {
        self.steps().len()
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    pub fn state(&self) -> RecordingState {
        RecordingState {
            status: self.status,
            session_id: self.session.as_ref().map(|s| s.id.clone()),
            url: self.session.as_ref().map(|s| s.url.clone()),
            step_count: self.get_step_count(),
            started_at_ms: self.session.as_ref().map(|s| s.started_at_ms),
            stopped_at_ms: self.session.as_ref().and_then(|s| s.stopped_at_ms),
            last_error: self.last_error.clone(),
        }
    }

    /// Undo the most recent step.
    pub fn remove_last_step(&mut self) -> Option<Step> {
        let removed = self.session.as_mut()?.steps.pop()?;
        self.last_toggle = None;
        debug!(step = %removed.id, "step removed");
        Some(removed)
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("status", &self.status)
            .field("steps", &self.get_step_count())
            .field("capture", &self.capture)
            .field("tracker", &self.tracker)
            .finish()
    }
}
