use dom_recorder::boundary::boundary_model::{
    FrameInfo, deserialize_iframe_chain, deserialize_shadow_chain, serialize_iframe_chain,
    serialize_shadow_chain,
};
use dom_recorder::boundary::resolver::{
    AccessDenied, DocumentAccess, RetryPolicy, find_frame, get_iframe_chain, get_shadow_host_chain,
    resolve, try_access_document, try_access_shadow_root,
};
use dom_recorder::boundary::watcher::{BoundaryEvent, BoundaryWatcher};
use dom_recorder::dom::ShadowMode;
use dom_recorder::element::classifier::classify;

use crate::common::pages::{blank_page, body, nested_frames};

mod common;

// ============================================================================
// Iframe chains
// ============================================================================

#[test]
fn iframe_chain_round_trips_and_resolves_at_every_depth() {
    for depth in 0..=3 {
        let mut dom = blank_page();
        let button = nested_frames(&mut dom, depth);

        let chain = get_iframe_chain(&dom, button);
        assert_eq!(chain.len(), depth, "depth {}", depth);

        let json = serialize_iframe_chain(&chain);
        assert_eq!(deserialize_iframe_chain(&json), chain);

        let info = classify(&dom, button);
        let main = dom.main_document();
        assert_eq!(resolve(&dom, &chain, &[], &info.css_selector, main), Some(button));
        assert_eq!(resolve(&dom, &chain, &[], &info.xpath, main), Some(button));
    }
}

#[test]
fn chain_links_record_index_and_id() {
    let mut dom = blank_page();
    let button = nested_frames(&mut dom, 2);
    let chain = get_iframe_chain(&dom, button);

    assert_eq!(chain[0].index, 1);
    assert_eq!(chain[0].id.as_deref(), Some("frame-0"));
    assert_eq!(chain[1].id.as_deref(), Some("frame-1"));
    assert!(chain[0].src.is_none());
}

#[test]
fn find_frame_falls_back_to_id_when_index_moved() {
    let mut dom = blank_page();
    let button = nested_frames(&mut dom, 1);
    let chain = get_iframe_chain(&dom, button);
    let main = dom.main_document();

    // A new frame in front shifts every index.
    let body = body(&dom);
    let promo = dom.create_element("iframe");
    let first = dom.element_children(body)[0];
    dom.insert_before(body, promo, first).unwrap();

    let found = find_frame(&dom, main, &chain[0]).unwrap();
    assert_eq!(dom.attr(found, "id"), Some("frame-0"));
}

#[test]
fn malformed_chain_json_gives_empty_chain() {
    assert!(deserialize_iframe_chain("{not json").is_empty());
    assert!(deserialize_iframe_chain("").is_empty());
    assert!(deserialize_shadow_chain("[{\"oops\": 1}]").is_empty());
}

#[test]
fn cross_origin_frame_is_denied_and_blocks_resolution() {
    let mut dom = blank_page();
    let body = body(&dom);
    let iframe = dom.append(body, "iframe", &[("id", "pay")]).unwrap();
    dom.set_cross_origin(iframe).unwrap();

    assert_eq!(
        try_access_document(&dom, iframe),
        DocumentAccess::Denied(AccessDenied::CrossOrigin)
    );
    let chain = vec![FrameInfo {
        index: 0,
        id: Some("pay".into()),
        name: None,
        src: None,
    }];
    assert_eq!(resolve(&dom, &chain, &[], "button", dom.main_document()), None);
}

// ============================================================================
// Shadow chains
// ============================================================================

#[test]
fn shadow_chain_round_trips_and_resolves() {
    let mut dom = blank_page();
    let body = body(&dom);
    let outer = dom.append(body, "app-shell", &[]).unwrap();
    let outer_root = dom.attach_shadow(outer, ShadowMode::Open).unwrap();
    let inner = dom.append(outer_root, "user-card", &[]).unwrap();
    let inner_root = dom.attach_shadow(inner, ShadowMode::Open).unwrap();
    let save = dom.append(inner_root, "button", &[("id", "save")]).unwrap();

    let chain = get_shadow_host_chain(&dom, save);
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].xpath, "/html/body/app-shell");
    assert!(!chain[1].is_closed);

    let json = serialize_shadow_chain(&chain);
    assert_eq!(deserialize_shadow_chain(&json), chain);
    assert_eq!(resolve(&dom, &[], &chain, "#save", dom.main_document()), Some(save));
}

#[test]
fn closed_shadow_root_needs_exposure() {
    let mut dom = blank_page();
    let body = body(&dom);
    let host = dom.append(body, "secure-input", &[]).unwrap();
    let root = dom.attach_shadow(host, ShadowMode::Closed).unwrap();
    let field = dom.append(root, "input", &[("id", "pin")]).unwrap();
    let chain = get_shadow_host_chain(&dom, field);
    assert!(chain[0].is_closed);

    assert_eq!(try_access_shadow_root(&dom, host), Err(AccessDenied::ClosedShadowRoot));
    assert_eq!(resolve(&dom, &[], &chain, "#pin", dom.main_document()), None);

    dom.expose_shadow_root(host).unwrap();
    assert_eq!(try_access_shadow_root(&dom, host), Ok(root));
    assert_eq!(resolve(&dom, &[], &chain, "#pin", dom.main_document()), Some(field));
}

// ============================================================================
// Watcher
// ============================================================================

#[test]
fn watcher_reports_frames_and_shadow_roots_added_later() {
    let mut dom = blank_page();
    let body = body(&dom);
    let mut watcher = BoundaryWatcher::new(RetryPolicy::default(), true, true);
    assert!(watcher.discover(&dom, dom.main_document(), 0).is_empty());
    dom.take_mutations();

    let host = dom.append(body, "chat-widget", &[]).unwrap();
    let root = dom.attach_shadow(host, ShadowMode::Open).unwrap();
    let iframe = dom.append(body, "iframe", &[]).unwrap();
    let doc = dom.load_frame(iframe, "https://shop.example.test/embed").unwrap();

    let mutations = dom.take_mutations();
    let events = watcher.process(&dom, &mutations, 10);
    assert!(events.contains(&BoundaryEvent::ShadowRoot { host, root }));
    assert!(events.contains(&BoundaryEvent::FrameDocument { iframe, document: doc }));

    // Reported once only.
    assert!(watcher.process(&dom, &mutations, 20).is_empty());
}

#[test]
fn unloaded_frame_is_retried_then_given_up() {
    let mut dom = blank_page();
    let body = body(&dom);
    let iframe = dom.append(body, "iframe", &[]).unwrap();
    let policy = RetryPolicy {
        max_retries: 2,
        delay_ms: 100,
    };
    let mut watcher = BoundaryWatcher::new(policy, true, true);

    assert!(watcher.discover(&dom, dom.main_document(), 0).is_empty());
    assert_eq!(watcher.pending_retries(), 1);
    assert!(watcher.tick(&dom, 50).is_empty());
    assert!(watcher.tick(&dom, 100).is_empty());
    let events = watcher.tick(&dom, 200);
    assert_eq!(
        events,
        vec![BoundaryEvent::Inaccessible {
            element: iframe,
            reason: AccessDenied::NotLoaded
        }]
    );
    assert_eq!(watcher.pending_retries(), 0);
}

#[test]
fn frame_loading_during_retry_is_attached() {
    let mut dom = blank_page();
    let body = body(&dom);
    let iframe = dom.append(body, "iframe", &[]).unwrap();
    let mut watcher = BoundaryWatcher::new(RetryPolicy::default(), true, false);
    watcher.discover(&dom, dom.main_document(), 0);
    dom.take_mutations();

    let doc = dom.load_frame(iframe, "https://shop.example.test/late").unwrap();
    let events = watcher.tick(&dom, 500);
    assert_eq!(events, vec![BoundaryEvent::FrameDocument { iframe, document: doc }]);
    assert_eq!(watcher.pending_retries(), 0);
}
