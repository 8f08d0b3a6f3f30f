use dom_recorder::capture::captured_event::{CapturedPayload, ClickAction, KeyAction};
use dom_recorder::capture::event_capture::{CaptureOptions, CaptureState, EventCapture};
use dom_recorder::dom::{DomEvent, EventType};

use crate::common::pages::{blank_page, body, form_page, type_value};

mod common;

const ALL_TYPES: &[EventType] = &[
    EventType::MouseDown,
    EventType::Click,
    EventType::Input,
    EventType::Change,
    EventType::KeyDown,
    EventType::KeyUp,
    EventType::Blur,
];

// ============================================================================
// Attach / detach
// ============================================================================

#[test]
fn attach_twice_does_not_double_register_listeners() {
    let mut page = form_page();
    let doc = page.dom.main_document();
    let mut capture = EventCapture::new(CaptureOptions::default());

    assert!(capture.attach(&mut page.dom, doc, ALL_TYPES));
    let after_first = page.dom.listener_count();
    assert_eq!(after_first, ALL_TYPES.len());
    assert_eq!(capture.listener_count(), ALL_TYPES.len());

    assert!(!capture.attach(&mut page.dom, doc, ALL_TYPES));
    assert_eq!(page.dom.listener_count(), after_first);
    assert_eq!(capture.listener_count(), after_first);
    assert_eq!(capture.state(), CaptureState::Active);
}

#[test]
fn duplicate_event_types_register_once() {
    let mut page = form_page();
    let doc = page.dom.main_document();
    let mut capture = EventCapture::new(CaptureOptions::default());
    capture.attach(&mut page.dom, doc, &[EventType::Click, EventType::Click]);
    assert_eq!(page.dom.listener_count_on(doc), 1);
}

#[test]
fn detach_is_idempotent() {
    let mut page = form_page();
    let doc = page.dom.main_document();
    let mut capture = EventCapture::new(CaptureOptions::default());
    capture.attach(&mut page.dom, doc, ALL_TYPES);

    assert_eq!(capture.detach(&mut page.dom), ALL_TYPES.len());
    assert_eq!(capture.detach(&mut page.dom), 0);
    assert_eq!(page.dom.listener_count(), 0);
    assert_eq!(capture.state(), CaptureState::Inactive);

    let click = DomEvent::click(page.submit, 10);
    assert!(capture.handle(&page.dom, &click).is_empty());
}

// ============================================================================
// Filtering
// ============================================================================

#[test]
fn synthetic_click_is_dropped_by_default() {
    let mut page = form_page();
    let doc = page.dom.main_document();
    let mut capture = EventCapture::new(CaptureOptions::default());
    capture.attach(&mut page.dom, doc, &[EventType::Click]);

    let synthetic = DomEvent::click(page.submit, 100).untrusted();
    assert!(capture.handle(&page.dom, &synthetic).is_empty());
}

#[test]
fn synthetic_click_is_kept_when_filter_disabled() {
    let mut page = form_page();
    let doc = page.dom.main_document();
    let mut capture = EventCapture::new(CaptureOptions {
        filter_synthetic_events: false,
        ..CaptureOptions::default()
    });
    capture.attach(&mut page.dom, doc, &[EventType::Click]);

    let synthetic = DomEvent::click(page.submit, 100).untrusted();
    let captured = capture.handle(&page.dom, &synthetic);
    assert_eq!(captured.len(), 1);
    assert!(!captured[0].is_trusted);
    assert_eq!(captured[0].target, page.submit);
}

#[test]
fn events_inside_recorder_ui_are_ignored() {
    let mut dom = blank_page();
    let body = body(&dom);
    let toolbar = dom.append(body, "div", &[("data-recorder-ui", "")]).unwrap();
    let stop = dom.append(toolbar, "button", &[]).unwrap();
    let doc = dom.main_document();

    let mut capture = EventCapture::new(CaptureOptions::default());
    capture.attach(&mut dom, doc, &[EventType::MouseDown]);
    assert!(capture.handle(&dom, &DomEvent::mouse_down(stop, 5)).is_empty());
}

#[test]
fn ignored_tags_produce_nothing() {
    let mut dom = blank_page();
    let body = body(&dom);
    let script = dom.append(body, "script", &[]).unwrap();
    let doc = dom.main_document();

    let mut capture = EventCapture::new(CaptureOptions::default());
    capture.attach(&mut dom, doc, &[EventType::Click]);
    assert!(capture.handle(&dom, &DomEvent::click(script, 5)).is_empty());
}

#[test]
fn custom_filter_can_veto_and_a_panicking_filter_is_ignored() {
    let mut page = form_page();
    let doc = page.dom.main_document();
    let submit = page.submit;
    let mut capture = EventCapture::new(CaptureOptions::default());
    capture.attach(&mut page.dom, doc, &[EventType::MouseDown]);
    capture.add_filter(|_, _| panic!("broken filter"));
    capture.add_filter(move |_, captured| captured.target != submit);

    assert!(capture.handle(&page.dom, &DomEvent::mouse_down(page.submit, 5)).is_empty());
    assert_eq!(capture.handle(&page.dom, &DomEvent::mouse_down(page.name, 100)).len(), 1);
}

// ============================================================================
// Deduplication and extraction
// ============================================================================

#[test]
fn double_fired_click_within_window_is_suppressed() {
    let mut page = form_page();
    let doc = page.dom.main_document();
    let mut capture = EventCapture::new(CaptureOptions::default());
    capture.attach(&mut page.dom, doc, &[EventType::Click]);

    assert_eq!(capture.handle(&page.dom, &DomEvent::click(page.submit, 100)).len(), 1);
    assert!(capture.handle(&page.dom, &DomEvent::click(page.submit, 120)).is_empty());
    assert_eq!(capture.handle(&page.dom, &DomEvent::click(page.submit, 200)).len(), 1);
}

#[test]
fn fast_keystrokes_are_not_deduplicated() {
    let mut page = form_page();
    let doc = page.dom.main_document();
    let mut capture = EventCapture::new(CaptureOptions::default());
    capture.attach(&mut page.dom, doc, &[EventType::Input]);

    type_value(&mut page.dom, page.name, "a");
    assert_eq!(capture.handle(&page.dom, &DomEvent::input(page.name, 100)).len(), 1);
    type_value(&mut page.dom, page.name, "ab");
    assert_eq!(capture.handle(&page.dom, &DomEvent::input(page.name, 110)).len(), 1);
}

#[test]
fn checkbox_mousedown_reports_the_resulting_state() {
    let mut dom = blank_page();
    let body = body(&dom);
    let terms = dom.append(body, "input", &[("type", "checkbox")]).unwrap();
    let doc = dom.main_document();
    let mut capture = EventCapture::new(CaptureOptions::default());
    capture.attach(&mut dom, doc, &[EventType::MouseDown]);

    let captured = capture.handle(&dom, &DomEvent::mouse_down(terms, 10));
    match &captured[0].payload {
        CapturedPayload::Click { action, .. } => assert_eq!(*action, ClickAction::Check),
        other => panic!("expected click payload, got {:?}", other),
    }
}

#[test]
fn only_enter_tab_and_escape_are_recorded_on_keydown() {
    let mut page = form_page();
    let doc = page.dom.main_document();
    let mut capture = EventCapture::new(CaptureOptions::default());
    capture.attach(&mut page.dom, doc, &[EventType::KeyDown, EventType::KeyUp]);

    assert!(capture.handle(&page.dom, &DomEvent::key_down(page.name, "a", 10)).is_empty());
    let enter = capture.handle(&page.dom, &DomEvent::key_down(page.name, "Enter", 100));
    match &enter[0].payload {
        CapturedPayload::Key { action, .. } => assert_eq!(*action, KeyAction::Enter),
        other => panic!("expected key payload, got {:?}", other),
    }

    let mut keyup = DomEvent::new(EventType::KeyUp, page.name, 200);
    keyup.key = Some("Enter".to_string());
    assert!(capture.handle(&page.dom, &keyup).is_empty());
}

// ============================================================================
// Debounced input path
// ============================================================================

#[test]
fn buffered_input_emits_last_value_after_quiet_period() {
    let mut page = form_page();
    let doc = page.dom.main_document();
    let mut capture = EventCapture::new(CaptureOptions {
        debounce_input: true,
        input_debounce_ms: 300,
        ..CaptureOptions::default()
    });
    capture.attach(&mut page.dom, doc, &[EventType::Input, EventType::Blur]);

    for (i, value) in ["t", "te", "tes", "test"].iter().enumerate() {
        type_value(&mut page.dom, page.name, value);
        let at = 100 + i as u64 * 10;
        assert!(capture.handle(&page.dom, &DomEvent::input(page.name, at)).is_empty());
    }
    assert!(capture.has_pending_input(page.name));
    assert!(capture.tick(300).is_empty());

    let flushed = capture.tick(430);
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed[0].value(), Some("test"));
    assert!(!capture.has_pending_input(page.name));
}

#[test]
fn blur_flushes_buffered_input_before_itself() {
    let mut page = form_page();
    let doc = page.dom.main_document();
    let mut capture = EventCapture::new(CaptureOptions {
        debounce_input: true,
        ..CaptureOptions::default()
    });
    capture.attach(&mut page.dom, doc, &[EventType::Input, EventType::Blur]);

    type_value(&mut page.dom, page.name, "Ada");
    capture.handle(&page.dom, &DomEvent::input(page.name, 100));
    let out = capture.handle(&page.dom, &DomEvent::blur(page.name, 150));

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].value(), Some("Ada"));
    assert!(matches!(out[1].payload, CapturedPayload::Blur));
}
