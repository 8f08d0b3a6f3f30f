use std::cell::RefCell;
use std::rc::Rc;

use dom_recorder::dom::{DomEvent, EventType, ShadowMode};
use dom_recorder::recorder::collaborators::{JsonlSessionStore, read_sessions};
use dom_recorder::recorder::events::{BoundaryKind, RecorderEvent};
use dom_recorder::{Recorder, RecorderConfig, RecorderError, RecordingStatus};

use crate::common::fakes::{BrokenStore, MemoryStore, RecordingBroadcaster};
use crate::common::pages::{blank_page, body, form_page, type_value};

mod common;

fn type_into(recorder: &mut Recorder, page: &mut common::pages::FormPage, text: &str, start: u64) -> u64 {
    let mut at = start;
    for end in 1..=text.len() {
        type_value(&mut page.dom, page.name, &text[..end]);
        recorder.dispatch(&mut page.dom, &DomEvent::input(page.name, at));
        at += 100;
    }
    at
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn typing_then_clicking_records_two_steps_in_order() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut page.dom, 0).unwrap();

    let done = type_into(&mut recorder, &mut page, "Alice", 100);
    let flushed = recorder.tick(&mut page.dom, done + 400);
    assert_eq!(flushed.len(), 1);

    recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, done + 500));
    let steps = recorder.stop(&mut page.dom, done + 600).unwrap();

    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].event, Some(EventType::Input));
    assert_eq!(steps[0].value.as_deref(), Some("Alice"));
    assert_eq!(steps[0].target.as_ref().and_then(|t| t.id.as_deref()), Some("name"));
    assert_eq!(steps[0].description, "Type 'Alice' into 'Name'");
    assert_eq!(steps[1].event, Some(EventType::Click));
    assert_eq!(steps[1].label, "Submit");
    assert!(steps[0].sequence < steps[1].sequence);
    assert_eq!(recorder.status(), RecordingStatus::Stopped);
    assert_eq!(recorder.listener_count(), 0);
}

#[test]
fn click_flushes_pending_input_first() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut page.dom, 0).unwrap();

    type_value(&mut page.dom, page.name, "Bob");
    recorder.dispatch(&mut page.dom, &DomEvent::input(page.name, 100));
    let steps = recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, 150));

    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].value.as_deref(), Some("Bob"));
    assert_eq!(steps[1].event, Some(EventType::Click));
}

#[test]
fn stop_flushes_pending_input() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut page.dom, 0).unwrap();

    type_value(&mut page.dom, page.name, "Carol");
    recorder.dispatch(&mut page.dom, &DomEvent::input(page.name, 100));
    let steps = recorder.stop(&mut page.dom, 150).unwrap();

    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].value.as_deref(), Some("Carol"));
}

#[test]
fn checkbox_click_and_change_record_one_step() {
    let mut dom = blank_page();
    let body = body(&dom);
    let terms = dom
        .append(body, "input", &[("type", "checkbox"), ("id", "terms")])
        .unwrap();
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut dom, 0).unwrap();

    recorder.dispatch(&mut dom, &DomEvent::mouse_down(terms, 100));
    dom.set_checked(terms, true).unwrap();
    recorder.dispatch(&mut dom, &DomEvent::change(terms, 110));

    assert_eq!(recorder.get_step_count(), 1);
    assert!(recorder.steps()[0].description.starts_with("Check"));
}

#[test]
fn label_click_on_checkbox_records_one_check_step() {
    let mut dom = blank_page();
    let body = body(&dom);
    let label = dom.append(body, "label", &[("for", "terms")]).unwrap();
    dom.append_text(label, "Accept").unwrap();
    let terms = dom
        .append(body, "input", &[("type", "checkbox"), ("id", "terms")])
        .unwrap();
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut dom, 0).unwrap();

    recorder.dispatch(&mut dom, &DomEvent::mouse_down(label, 100));
    dom.set_checked(terms, true).unwrap();
    recorder.dispatch(&mut dom, &DomEvent::change(terms, 110));

    assert_eq!(recorder.get_step_count(), 1);
    let step = &recorder.steps()[0];
    assert_eq!(step.description, "Check 'Accept' checkbox");
    assert_eq!(step.target.as_ref().and_then(|t| t.id.as_deref()), Some("terms"));
}

#[test]
fn prefilled_value_is_the_baseline_for_later_edits() {
    let mut page = form_page();
    type_value(&mut page.dom, page.name, "Prefilled");
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut page.dom, 0).unwrap();

    type_value(&mut page.dom, page.name, "");
    recorder.dispatch(&mut page.dom, &DomEvent::input(page.name, 100));
    let steps = recorder.stop(&mut page.dom, 1000).unwrap();

    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].value.as_deref(), Some(""));
}

#[test]
fn untouched_prefilled_value_records_nothing() {
    let mut page = form_page();
    type_value(&mut page.dom, page.name, "Prefilled");
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut page.dom, 0).unwrap();

    recorder.dispatch(&mut page.dom, &DomEvent::input(page.name, 100));
    assert!(recorder.stop(&mut page.dom, 1000).unwrap().is_empty());
}

#[test]
fn removed_input_is_flushed_when_mutations_are_processed() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut page.dom, 0).unwrap();

    type_value(&mut page.dom, page.name, "gone");
    recorder.dispatch(&mut page.dom, &DomEvent::input(page.name, 100));
    page.dom.remove(page.name);

    let steps = recorder.process_mutations(&mut page.dom, 150);
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].value.as_deref(), Some("gone"));
}

#[test]
fn consecutive_edits_merge_into_one_step() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut page.dom, 0).unwrap();
    let events = Rc::new(RefCell::new(vec![]));
    let sink = events.clone();
    let _sub = recorder.add_event_listener(move |e| sink.borrow_mut().push(e.name()));

    type_value(&mut page.dom, page.name, "hel");
    recorder.dispatch(&mut page.dom, &DomEvent::input(page.name, 100));
    recorder.dispatch(&mut page.dom, &DomEvent::blur(page.name, 200));
    type_value(&mut page.dom, page.name, "hello");
    recorder.dispatch(&mut page.dom, &DomEvent::input(page.name, 400));
    recorder.dispatch(&mut page.dom, &DomEvent::blur(page.name, 500));

    assert_eq!(recorder.get_step_count(), 1);
    let step = &recorder.steps()[0];
    assert_eq!(step.value.as_deref(), Some("hello"));
    assert_eq!(step.metadata.merged_from.as_deref(), Some(step.id.as_str()));
    assert!(events.borrow().contains(&"step_merged"));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn starting_twice_is_rejected_without_duplicate_listeners() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut page.dom, 0).unwrap();
    let listeners = page.dom.listener_count();

    let err = recorder.start(&mut page.dom, 10).unwrap_err();
    assert!(matches!(
        err,
        RecorderError::InvalidTransition {
            from: RecordingStatus::Recording,
            action: "start"
        }
    ));
    assert_eq!(err.to_string(), "cannot start while recording");
    assert_eq!(page.dom.listener_count(), listeners);
    assert_eq!(recorder.listener_count(), listeners);
}

#[test]
fn stop_without_a_session_is_an_error() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig::default());
    assert!(recorder.stop(&mut page.dom, 0).is_err());
    assert!(recorder.pause().is_err());
    assert!(recorder.resume().is_err());
    assert_eq!(recorder.status(), RecordingStatus::Idle);
}

#[test]
fn paused_recorder_ignores_events_until_resumed() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut page.dom, 0).unwrap();

    recorder.pause().unwrap();
    assert!(recorder.pause().is_err());
    assert!(recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, 100)).is_empty());
    assert_eq!(recorder.get_step_count(), 0);

    recorder.resume().unwrap();
    recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, 300));
    assert_eq!(recorder.get_step_count(), 1);
}

#[test]
fn a_stopped_recorder_can_start_a_fresh_session() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut page.dom, 0).unwrap();
    recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, 100));
    let first = recorder.session().unwrap().id.clone();
    recorder.stop(&mut page.dom, 200).unwrap();

    recorder.start(&mut page.dom, 1000).unwrap();
    assert_ne!(recorder.session().unwrap().id, first);
    assert_eq!(recorder.get_step_count(), 0);

    let state = recorder.state();
    assert_eq!(state.status, RecordingStatus::Recording);
    assert_eq!(state.started_at_ms, Some(1000));
}

#[test]
fn fail_moves_to_error_and_allows_restart() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut page.dom, 0).unwrap();

    recorder.fail(&mut page.dom, "page crashed");
    assert_eq!(recorder.status(), RecordingStatus::Error);
    assert_eq!(page.dom.listener_count(), 0);
    assert!(recorder.state().last_error.unwrap().contains("page crashed"));
    recorder.start(&mut page.dom, 10).unwrap();
}

#[test]
fn step_ceiling_drops_extra_steps() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig {
        max_steps: 2,
        ..RecorderConfig::default()
    });
    recorder.start(&mut page.dom, 0).unwrap();

    for at in [100, 300, 500] {
        recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, at));
    }
    assert_eq!(recorder.get_step_count(), 2);
}

#[test]
fn full_session_does_not_merge_into_last_step() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig {
        max_steps: 1,
        ..RecorderConfig::default()
    });
    recorder.start(&mut page.dom, 0).unwrap();

    type_value(&mut page.dom, page.name, "A");
    recorder.dispatch(&mut page.dom, &DomEvent::input(page.name, 100));
    recorder.dispatch(&mut page.dom, &DomEvent::blur(page.name, 200));
    type_value(&mut page.dom, page.name, "AB");
    recorder.dispatch(&mut page.dom, &DomEvent::input(page.name, 400));
    recorder.dispatch(&mut page.dom, &DomEvent::blur(page.name, 500));

    assert_eq!(recorder.get_step_count(), 1);
    assert_eq!(recorder.steps()[0].value.as_deref(), Some("A"));
}

#[test]
fn remove_last_step_undoes_one_step() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut page.dom, 0).unwrap();
    recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, 100));
    recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.name, 300));

    let removed = recorder.remove_last_step().unwrap();
    assert_eq!(removed.target.and_then(|t| t.id), Some("name".to_string()));
    assert_eq!(recorder.get_step_count(), 1);
}

// ============================================================================
// Boundaries
// ============================================================================

#[test]
fn shadow_root_attached_during_recording_is_captured() {
    let mut dom = blank_page();
    let body = body(&dom);
    let mut recorder = Recorder::new(RecorderConfig::default());
    let events = Rc::new(RefCell::new(vec![]));
    let sink = events.clone();
    let _sub = recorder.add_event_listener(move |e| sink.borrow_mut().push(e.clone()));
    recorder.start(&mut dom, 0).unwrap();

    let host = dom.append(body, "cart-widget", &[]).unwrap();
    let root = dom.attach_shadow(host, ShadowMode::Open).unwrap();
    let remove = dom.append(root, "button", &[("id", "remove")]).unwrap();

    let steps = recorder.dispatch(&mut dom, &DomEvent::mouse_down(remove, 100));
    assert!(recorder.attached_roots().contains(&root));
    assert!(events.borrow().contains(&RecorderEvent::BoundaryAttached {
        kind: BoundaryKind::Shadow,
        root
    }));

    assert_eq!(steps.len(), 1);
    let locator = steps[0].locator.as_ref().unwrap();
    assert_eq!(locator.id.as_deref(), Some("remove"));
    assert_eq!(locator.shadow_host_chain.len(), 1);
}

#[test]
fn frame_loaded_during_recording_is_captured() {
    let mut dom = blank_page();
    let body = body(&dom);
    let iframe = dom.append(body, "iframe", &[("id", "checkout")]).unwrap();
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut dom, 0).unwrap();

    let doc = dom.load_frame(iframe, "https://pay.example.test/").unwrap();
    let frame_body = dom.body(doc).unwrap();
    let pay = dom.append(frame_body, "button", &[("id", "pay")]).unwrap();
    let steps = recorder.dispatch(&mut dom, &DomEvent::mouse_down(pay, 100));

    assert_eq!(steps.len(), 1);
    let locator = steps[0].locator.as_ref().unwrap();
    assert_eq!(locator.iframe_chain.len(), 1);
    assert_eq!(locator.iframe_chain[0].id.as_deref(), Some("checkout"));
}

// ============================================================================
// Subscribers and collaborators
// ============================================================================

#[test]
fn panicking_step_subscriber_does_not_break_recording() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig::default());
    let seen = Rc::new(RefCell::new(0));
    let _bad = recorder.on_step(|_| panic!("listener bug"));
    let counter = seen.clone();
    let _good = recorder.on_step(move |_| *counter.borrow_mut() += 1);

    recorder.start(&mut page.dom, 0).unwrap();
    recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, 100));
    recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.name, 300));

    assert_eq!(*seen.borrow(), 2);
    assert_eq!(recorder.get_step_count(), 2);
}

#[test]
fn lifecycle_is_broadcast_on_named_topics() {
    let mut page = form_page();
    let broadcaster = RecordingBroadcaster::default();
    let mut recorder = Recorder::new(RecorderConfig::default()).with_broadcaster(broadcaster.clone());

    recorder.start(&mut page.dom, 0).unwrap();
    recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, 100));
    recorder.pause().unwrap();
    recorder.resume().unwrap();
    recorder.stop(&mut page.dom, 200).unwrap();

    assert_eq!(
        broadcaster.topics(),
        vec![
            "recording.started",
            "recording.step",
            "recording.paused",
            "recording.resumed",
            "recording.stopped",
        ]
    );
    let messages = broadcaster.messages.borrow();
    assert_eq!(messages[4].1["stepCount"].as_u64(), Some(1));
}

#[test]
fn session_is_saved_on_stop() {
    let mut page = form_page();
    let store = MemoryStore::default();
    let mut recorder = Recorder::new(RecorderConfig::default()).with_store(store.clone());

    recorder.start(&mut page.dom, 0).unwrap();
    recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, 100));
    recorder.stop(&mut page.dom, 200).unwrap();

    let saved = store.saved.borrow();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].status, RecordingStatus::Stopped);
    assert_eq!(saved[0].stopped_at_ms, Some(200));
    assert_eq!(saved[0].steps.len(), 1);
}

#[test]
fn jsonl_store_round_trips_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.jsonl");
    let mut page = form_page();
    let store = JsonlSessionStore::open(&path).unwrap();
    let mut recorder = Recorder::new(RecorderConfig {
        auto_save_interval_ms: 1000,
        ..RecorderConfig::default()
    })
    .with_store(store);

    recorder.start(&mut page.dom, 0).unwrap();
    recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, 100));
    recorder.tick(&mut page.dom, 1000);
    recorder.stop(&mut page.dom, 1200).unwrap();

    let sessions = read_sessions(&path).unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].status, RecordingStatus::Recording);
    assert_eq!(sessions[1].status, RecordingStatus::Stopped);
    assert_eq!(sessions[1].steps.len(), 1);
    assert_eq!(sessions[1].steps[0].id, recorder.steps()[0].id);
    assert_eq!(sessions[0].id, sessions[1].id);
}

#[test]
fn failing_store_is_reported_without_stopping() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig {
        auto_save_interval_ms: 500,
        ..RecorderConfig::default()
    })
    .with_store(BrokenStore);
    let errors = Rc::new(RefCell::new(vec![]));
    let sink = errors.clone();
    let _sub = recorder.on_error(move |e| sink.borrow_mut().push(e.to_string()));

    recorder.start(&mut page.dom, 0).unwrap();
    recorder.tick(&mut page.dom, 600);

    assert_eq!(errors.borrow().len(), 1);
    assert!(errors.borrow()[0].contains("disk full"));
    assert!(recorder.is_recording());
    assert!(recorder.state().last_error.is_some());
}

#[test]
fn highlight_class_is_removed_after_its_duration() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut page.dom, 0).unwrap();

    recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, 100));
    let highlighted = |page: &common::pages::FormPage| {
        page.dom
            .element(page.submit)
            .is_some_and(|el| el.has_class("recorder-highlight"))
    };
    assert!(highlighted(&page));
    recorder.tick(&mut page.dom, 700);
    assert!(!highlighted(&page));
}

#[test]
fn highlighted_element_still_suppresses_double_fire() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig::default());
    recorder.start(&mut page.dom, 0).unwrap();

    recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, 100));
    recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, 120));
    assert_eq!(recorder.get_step_count(), 1);
}

#[test]
fn custom_highlight_class_stays_out_of_locators() {
    let mut page = form_page();
    let mut recorder = Recorder::new(RecorderConfig {
        highlight_class: "flash".into(),
        ..RecorderConfig::default()
    });
    recorder.start(&mut page.dom, 0).unwrap();

    recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, 100));
    recorder.dispatch(&mut page.dom, &DomEvent::mouse_down(page.submit, 300));
    assert!(page.dom.element(page.submit).is_some_and(|el| el.has_class("flash")));

    let steps = recorder.steps();
    assert_eq!(steps.len(), 2);
    let locator = steps[1].locator.as_ref().unwrap();
    assert!(!locator.css_selector.contains("flash"));
    assert!(!locator.class_list.iter().any(|c| c == "flash"));
    assert_eq!(steps[0].target, steps[1].target);
}
