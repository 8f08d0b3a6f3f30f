use std::fmt;

use crate::boundary::boundary_model::{FrameInfo, ShadowHostInfo};
use crate::dom::document::Dom;
use crate::dom::node::{FrameContent, NodeId, ShadowMode};
use crate::dom::query::{evaluate_xpath, query_selector};
use crate::element::locator::generate_xpath;

/// Why a frame document or shadow root could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    /// The iframe has no document yet. Worth retrying.
    NotLoaded,
    /// The iframe belongs to another origin. Never retried.
    CrossOrigin,
    /// Closed shadow root nobody exposed.
    ClosedShadowRoot,
    /// The element is not an iframe or no longer exists.
    NotAFrame,
}

impl AccessDenied {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AccessDenied::NotLoaded)
    }
}

impl fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessDenied::NotLoaded => "frame not loaded",
            AccessDenied::CrossOrigin => "cross-origin frame",
            AccessDenied::ClosedShadowRoot => "closed shadow root",
            AccessDenied::NotAFrame => "not a frame",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentAccess {
    Accessible(NodeId),
    Denied(AccessDenied),
}

impl DocumentAccess {
    pub fn document(&self) -> Option<NodeId> {
        match self {
            DocumentAccess::Accessible(doc) => Some(*doc),
            DocumentAccess::Denied(_) => None,
        }
    }
}

/// The single place frame access is probed. Every caller treats `Denied`
/// the same way, whatever the reason.
pub fn try_access_document(dom: &Dom, iframe: NodeId) -> DocumentAccess {
    match dom.frame_content(iframe) {
        Some(FrameContent::Loaded(doc)) => DocumentAccess::Accessible(doc),
        Some(FrameContent::NotLoaded) => DocumentAccess::Denied(AccessDenied::NotLoaded),
        Some(FrameContent::CrossOrigin) => DocumentAccess::Denied(AccessDenied::CrossOrigin),
        None => DocumentAccess::Denied(AccessDenied::NotAFrame),
    }
}

/// Shadow root of `host`, or why it cannot be entered.
pub fn try_access_shadow_root(dom: &Dom, host: NodeId) -> Result<NodeId, AccessDenied> {
    match dom.accessible_shadow_root(host) {
        Some(root) => Ok(root),
        None => Err(AccessDenied::ClosedShadowRoot),
    }
}

/// Bounded retry for frames that are not loaded yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// When to probe again after `retries_done` retries, or `None` once the
    /// budget is spent or the denial is permanent.
    pub fn next_attempt(&self, denied: AccessDenied, retries_done: u32, now_ms: u64) -> Option<u64> {
        if !denied.is_retryable() || retries_done >= self.max_retries {
            return None;
        }
        Some(now_ms + self.delay_ms)
    }
}

// ============================================================================
// Chain computation
// ============================================================================

fn frame_sibling_index(dom: &Dom, iframe: NodeId) -> usize {
    let Some(parent) = dom.parent(iframe) else {
        return 0;
    };
    dom.element_children(parent)
        .into_iter()
        .filter(|c| dom.frame_content(*c).is_some())
        .position(|c| c == iframe)
        .unwrap_or(0)
}

fn frame_info(dom: &Dom, iframe: NodeId) -> FrameInfo {
    let el = dom.element(iframe);
    let attr = |name: &str| {
        el.and_then(|e| e.attr(name))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    FrameInfo {
        index: frame_sibling_index(dom, iframe),
        id: attr("id"),
        name: attr("name"),
        src: attr("src"),
    }
}

/// Iframes crossed from the top document down to `element`'s document,
/// outermost first. Empty for the main document.
pub fn get_iframe_chain(dom: &Dom, element: NodeId) -> Vec<FrameInfo> {
    let mut chain = vec![];
    let mut doc = dom.owner_document(element);

    while let Some(iframe) = doc
        .and_then(|d| dom.document_data(d))
        .and_then(|d| d.frame_element)
    {
        chain.push(frame_info(dom, iframe));
        doc = dom.owner_document(iframe);
    }

    chain.reverse();
    chain
}

/// Shadow hosts crossed from `element`'s document down to its tree,
/// outermost first. Never leaves the element's own document.
pub fn get_shadow_host_chain(dom: &Dom, element: NodeId) -> Vec<ShadowHostInfo> {
    let mut chain = vec![];
    let mut current = element;

    loop {
        let root = dom.root_node(current);
        let Some(data) = dom.shadow_root_data(root) else {
            break;
        };
        chain.push(ShadowHostInfo {
            xpath: generate_xpath(dom, data.host),
            is_closed: data.mode == ShadowMode::Closed,
        });
        current = data.host;
    }

    chain.reverse();
    chain
}

// ============================================================================
// Resolution
// ============================================================================

/// Every iframe element in `doc`, entering accessible shadow roots.
fn frames_in(dom: &Dom, root: NodeId) -> Vec<NodeId> {
    let mut out = vec![];
    for node in dom.descendants(root) {
        if dom.frame_content(node).is_some() {
            out.push(node);
        }
        if let Some(shadow) = dom.accessible_shadow_root(node) {
            out.extend(frames_in(dom, shadow));
        }
    }
    out
}

fn attr_matches(recorded: &Option<String>, actual: Option<&str>) -> bool {
    match recorded {
        Some(want) => actual == Some(want.as_str()),
        None => true,
    }
}

/// Locate the iframe for one chain link: by sibling index (rejecting a
/// candidate whose recorded id or name disagrees), then by id, then by name.
pub fn find_frame(dom: &Dom, doc: NodeId, info: &FrameInfo) -> Option<NodeId> {
    let frames = frames_in(dom, doc);

    let by_index = frames.iter().copied().find(|f| {
        frame_sibling_index(dom, *f) == info.index
            && attr_matches(&info.id, dom.attr(*f, "id"))
            && attr_matches(&info.name, dom.attr(*f, "name"))
    });
    if by_index.is_some() {
        return by_index;
    }

    if let Some(id) = &info.id {
        if let Some(found) = frames.iter().copied().find(|f| dom.attr(*f, "id") == Some(id)) {
            return Some(found);
        }
    }

    info.name.as_ref().and_then(|name| {
        frames
            .iter()
            .copied()
            .find(|f| dom.attr(*f, "name") == Some(name.as_str()))
    })
}

/// Walk an iframe chain from `root_document`. `None` when any hop is
/// missing or inaccessible.
pub fn resolve_iframe_chain(dom: &Dom, chain: &[FrameInfo], root_document: NodeId) -> Option<NodeId> {
    let mut doc = root_document;
    for info in chain {
        let iframe = find_frame(dom, doc, info)?;
        match try_access_document(dom, iframe) {
            DocumentAccess::Accessible(next) => doc = next,
            DocumentAccess::Denied(reason) => {
                tracing::debug!(?info, %reason, "iframe chain hop inaccessible");
                return None;
            }
        }
    }
    Some(doc)
}

/// Walk a shadow-host chain from `root` (a document or shadow root).
pub fn resolve_shadow_chain(dom: &Dom, chain: &[ShadowHostInfo], root: NodeId) -> Option<NodeId> {
    let mut scope = root;
    for info in chain {
        let host = evaluate_xpath(dom, scope, &info.xpath)?;
        match try_access_shadow_root(dom, host) {
            Ok(shadow) => scope = shadow,
            Err(reason) => {
                tracing::debug!(xpath = %info.xpath, %reason, "shadow chain hop inaccessible");
                return None;
            }
        }
    }
    Some(scope)
}

/// Re-find an element from its boundary chains plus an XPath (leading `/`)
/// or CSS selector scoped to the innermost tree.
pub fn resolve(
    dom: &Dom,
    iframe_chain: &[FrameInfo],
    shadow_chain: &[ShadowHostInfo],
    selector: &str,
    root_document: NodeId,
) -> Option<NodeId> {
    let doc = resolve_iframe_chain(dom, iframe_chain, root_document)?;
    let scope = resolve_shadow_chain(dom, shadow_chain, doc)?;

    if selector.starts_with('/') {
        evaluate_xpath(dom, scope, selector)
    } else {
        query_selector(dom, scope, selector).ok().flatten()
    }
}
