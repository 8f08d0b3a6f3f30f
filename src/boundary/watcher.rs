use std::collections::{BTreeMap, HashSet};

use crate::boundary::resolver::{
    AccessDenied, DocumentAccess, RetryPolicy, try_access_document, try_access_shadow_root,
};
use crate::dom::document::Dom;
use crate::dom::node::{MutationRecord, NodeId};
use crate::timer::TimerQueue;

/// A boundary the recorder can (or cannot) attach to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryEvent {
    FrameDocument { iframe: NodeId, document: NodeId },
    ShadowRoot { host: NodeId, root: NodeId },
    Inaccessible { element: NodeId, reason: AccessDenied },
}

/// Turns DOM mutations into boundary discoveries and owns the retry
/// schedule for frames that have not loaded yet.
#[derive(Debug, Default)]
pub struct BoundaryWatcher {
    policy: RetryPolicy,
    include_frames: bool,
    include_shadow: bool,
    /// Documents and shadow roots already reported.
    known: HashSet<NodeId>,
    /// Iframes reported inaccessible for good.
    given_up: HashSet<NodeId>,
    attempts: BTreeMap<NodeId, u32>,
    retries: TimerQueue<NodeId>,
}

impl BoundaryWatcher {
    pub fn new(policy: RetryPolicy, include_frames: bool, include_shadow: bool) -> Self {
        Self {
            policy,
            include_frames,
            include_shadow,
            ..Self::default()
        }
    }

    /// Forget everything so a new session rediscovers the page.
    pub fn reset(&mut self) {
        self.known.clear();
        self.given_up.clear();
        self.attempts.clear();
        self.retries.drain();
    }

    pub fn pending_retries(&self) -> usize {
        self.retries.len()
    }

    /// Every boundary currently reachable below `root`.
    pub fn discover(&mut self, dom: &Dom, root: NodeId, now_ms: u64) -> Vec<BoundaryEvent> {
        let mut events = vec![];
        self.scan(dom, root, now_ms, &mut events);
        events
    }

    fn scan(&mut self, dom: &Dom, root: NodeId, now_ms: u64, events: &mut Vec<BoundaryEvent>) {
        let mut nodes = vec![];
        if dom.is_element(root) {
            nodes.push(root);
        }
        nodes.extend(dom.descendants(root));

        for node in nodes {
            if self.include_shadow && dom.element(node).is_some_and(|el| el.shadow_root.is_some()) {
                self.visit_shadow_host(dom, node, now_ms, events);
            }
            if self.include_frames && dom.frame_content(node).is_some() {
                self.visit_frame(dom, node, now_ms, events);
            }
        }
    }

    fn visit_shadow_host(
        &mut self,
        dom: &Dom,
        host: NodeId,
        now_ms: u64,
        events: &mut Vec<BoundaryEvent>,
    ) {
        match try_access_shadow_root(dom, host) {
            Ok(root) => {
                if self.known.insert(root) {
                    events.push(BoundaryEvent::ShadowRoot { host, root });
                }
                self.scan(dom, root, now_ms, events);
            }
            Err(reason) => {
                if self.given_up.insert(host) {
                    events.push(BoundaryEvent::Inaccessible {
                        element: host,
                        reason,
                    });
                }
            }
        }
    }

    fn visit_frame(
        &mut self,
        dom: &Dom,
        iframe: NodeId,
        now_ms: u64,
        events: &mut Vec<BoundaryEvent>,
    ) {
        match try_access_document(dom, iframe) {
            DocumentAccess::Accessible(document) => {
                self.retries.cancel(&iframe);
                self.attempts.remove(&iframe);
                self.given_up.remove(&iframe);
                if self.known.insert(document) {
                    events.push(BoundaryEvent::FrameDocument { iframe, document });
                }
                self.scan(dom, document, now_ms, events);
            }
            DocumentAccess::Denied(reason) => {
                if self.given_up.contains(&iframe) || self.retries.is_scheduled(&iframe) {
                    return;
                }
                let failures = self.attempts.entry(iframe).or_insert(0);
                *failures += 1;
                let retries_done = *failures - 1;
                match self.policy.next_attempt(reason, retries_done, now_ms) {
                    Some(at) => {
                        tracing::debug!(?iframe, %reason, retries_done, "frame not ready, retry scheduled");
                        self.retries.schedule(iframe, at);
                    }
                    None => {
                        self.attempts.remove(&iframe);
                        self.given_up.insert(iframe);
                        events.push(BoundaryEvent::Inaccessible {
                            element: iframe,
                            reason,
                        });
                    }
                }
            }
        }
    }

    /// Inspect drained mutations for new frames and shadow roots.
    pub fn process(
        &mut self,
        dom: &Dom,
        mutations: &[MutationRecord],
        now_ms: u64,
    ) -> Vec<BoundaryEvent> {
        let mut events = vec![];
        for mutation in mutations {
            match mutation {
                MutationRecord::NodeAdded(node) => {
                    if dom.is_connected(*node) {
                        self.scan(dom, *node, now_ms, &mut events);
                    }
                }
                MutationRecord::ShadowRootAttached { host, .. } => {
                    if self.include_shadow && dom.is_connected(*host) {
                        self.visit_shadow_host(dom, *host, now_ms, &mut events);
                    }
                }
                MutationRecord::FrameLoaded { iframe, .. } => {
                    if self.include_frames && dom.is_connected(*iframe) {
                        self.given_up.remove(iframe);
                        self.visit_frame(dom, *iframe, now_ms, &mut events);
                    }
                }
                MutationRecord::NodeRemoved(node) => {
                    self.retries.cancel(node);
                    self.attempts.remove(node);
                }
            }
        }
        events
    }

    /// Re-probe frames whose retry delay has elapsed.
    pub fn tick(&mut self, dom: &Dom, now_ms: u64) -> Vec<BoundaryEvent> {
        let mut events = vec![];
        for iframe in self.retries.take_due(now_ms) {
            if dom.is_connected(iframe) {
                self.visit_frame(dom, iframe, now_ms, &mut events);
            } else {
                self.attempts.remove(&iframe);
            }
        }
        events
    }

    /// Cancel every outstanding retry.
    pub fn cancel_all(&mut self) {
        self.retries.drain();
        self.attempts.clear();
    }
}
