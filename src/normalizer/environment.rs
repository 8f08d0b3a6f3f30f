use std::sync::LazyLock;

use regex::Regex;

use crate::dom::document::Dom;
use crate::dom::node::{ElementData, NodeId};
use crate::normalizer::normalized_event::{EnvironmentSnapshot, Framework};

/// Ordered: Edge and Opera also carry a `Chrome/` token, and Chrome also
/// carries `Safari/`.
static BROWSER_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("Edge", r"Edg(?:e|A|iOS)?/([\d.]+)"),
        ("Opera", r"OPR/([\d.]+)"),
        ("Firefox", r"Firefox/([\d.]+)"),
        ("Chrome", r"(?:Chrome|CriOS)/([\d.]+)"),
        ("Safari", r"Version/([\d.]+).*Safari/"),
    ]
    .into_iter()
    .filter_map(|(name, pattern)| Regex::new(pattern).ok().map(|re| (name, re)))
    .collect()
});

pub fn parse_user_agent(user_agent: &str) -> (String, String) {
    for (name, re) in BROWSER_PATTERNS.iter() {
        if let Some(version) = re.captures(user_agent).and_then(|c| c.get(1)) {
            return (name.to_string(), version.as_str().to_string());
        }
    }
    ("unknown".to_string(), String::new())
}

pub fn environment_snapshot(dom: &Dom, document: NodeId) -> EnvironmentSnapshot {
    let (browser, browser_version) = parse_user_agent(&dom.user_agent);
    let data = dom.document_data(document);
    EnvironmentSnapshot {
        browser,
        browser_version,
        platform: dom.platform.clone(),
        user_agent: dom.user_agent.clone(),
        frame_depth: dom.frame_depth(document),
        page_url: data.map(|d| d.url.clone()).unwrap_or_default(),
        viewport_width: data.map(|d| d.viewport.width).unwrap_or_default(),
        viewport_height: data.map(|d| d.viewport.height).unwrap_or_default(),
    }
}

// ============================================================================
// Framework detection
// ============================================================================

const REACT_PROPERTIES: &[&str] = &[
    "__reactFiber$",
    "__reactProps$",
    "__reactInternalInstance$",
    "__reactContainer$",
    "_reactRootContainer",
];
const VUE_PROPERTIES: &[&str] = &["__vue__", "__vue_app__", "__vueParentComponent"];

fn has_any_property(el: &ElementData, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| el.has_property(p))
}

fn has_attr_prefix(el: &ElementData, prefixes: &[&str]) -> bool {
    el.attributes
        .iter()
        .any(|(k, _)| prefixes.iter().any(|p| k.starts_with(p)))
}

fn is_react(el: &ElementData) -> bool {
    has_any_property(el, REACT_PROPERTIES)
}

fn is_angular(el: &ElementData) -> bool {
    el.has_attr("ng-version") || has_attr_prefix(el, &["_ngcontent-", "_nghost-", "ng-reflect-"])
}

fn is_vue(el: &ElementData) -> bool {
    has_any_property(el, VUE_PROPERTIES) || has_attr_prefix(el, &["data-v-"])
}

fn is_svelte(el: &ElementData) -> bool {
    el.has_property("__svelte") || el.class_list().iter().any(|c| c.starts_with("svelte-"))
}

/// Best-effort, in order: React, Angular, Vue, Svelte, jQuery, vanilla.
/// Markers are looked for on the element and its ancestors, then on page
/// globals. A missing element yields `Unknown`.
pub fn detect_framework(dom: &Dom, element: NodeId) -> Framework {
    if !dom.is_element(element) {
        return Framework::Unknown;
    }
    let globals: &[String] = dom
        .owner_document(element)
        .and_then(|d| dom.document_data(d))
        .map(|d| d.globals.as_slice())
        .unwrap_or(&[]);
    let has_global = |names: &[&str]| globals.iter().any(|g| names.contains(&g.as_str()));

    if dom.closest(element, is_react).is_some() || has_global(&["React", "__REACT_DEVTOOLS_GLOBAL_HOOK__"]) {
        return Framework::React;
    }
    if dom.closest(element, is_angular).is_some() || has_global(&["ng", "getAllAngularRootElements"]) {
        return Framework::Angular;
    }
    if dom.closest(element, is_vue).is_some() || has_global(&["Vue", "__VUE__"]) {
        return Framework::Vue;
    }
    if dom.closest(element, is_svelte).is_some() || has_global(&["__svelte"]) {
        return Framework::Svelte;
    }
    if has_global(&["jQuery", "$"]) {
        return Framework::JQuery;
    }
    Framework::Vanilla
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_is_not_reported_as_chrome() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.2478.51";
        assert_eq!(parse_user_agent(ua), ("Edge".into(), "124.0.2478.51".into()));
    }

    #[test]
    fn safari_version_comes_from_version_token() {
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";
        assert_eq!(parse_user_agent(ua), ("Safari".into(), "17.4".into()));
        assert_eq!(parse_user_agent("curl/8.0").0, "unknown");
    }

    #[test]
    fn framework_order_prefers_react_over_jquery() {
        let mut dom = Dom::new("https://example.test/");
        let doc = dom.main_document();
        dom.document_data_mut(doc).unwrap().globals = vec!["jQuery".into()];
        let body = dom.body(doc).unwrap();
        let root = dom.append(body, "div", &[("id", "root")]).unwrap();
        let button = dom.append(root, "button", &[]).unwrap();

        assert_eq!(detect_framework(&dom, button), Framework::JQuery);
        dom.element_mut(root).unwrap().properties = vec!["__reactContainer$abc".into()];
        assert_eq!(detect_framework(&dom, button), Framework::React);
        assert_eq!(detect_framework(&dom, doc), Framework::Unknown);
    }
}
