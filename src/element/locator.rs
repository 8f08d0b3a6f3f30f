use std::sync::LazyLock;

use regex::Regex;

use crate::dom::document::Dom;
use crate::dom::node::NodeId;
use crate::dom::query::{nth_of_type, query_selector_all};

/// Ancestor levels the class-path selector walks before falling back to a
/// full path.
pub const MAX_SELECTOR_DEPTH: usize = 5;

/// Classes the recorder itself adds (e.g. the highlight class).
pub const RECORDER_CLASS_PREFIX: &str = "recorder-";

static DYNAMIC_CLASS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // CSS modules: Button_primary__3xK9a, _3xK9aB2
        r"^[A-Za-z][A-Za-z0-9-]*_[A-Za-z0-9-]+__[A-Za-z0-9_-]{4,}$",
        r"^_[A-Za-z0-9_-]{5,}$",
        // styled-components
        r"^sc-[A-Za-z0-9]+$",
        // Emotion
        r"^css-[A-Za-z0-9]+(-[A-Za-z0-9_]+)?$",
        // BEM block with a hash suffix
        r"^[a-z][a-z0-9]*(?:[-_][a-z0-9]+)*-{1,2}[0-9a-f]{6,}$",
        // Angular runtime classes
        r"^ng-",
        // styled-jsx
        r"^jsx-\d+$",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

pub fn is_dynamic_class(class: &str) -> bool {
    class.starts_with(RECORDER_CLASS_PREFIX)
        || DYNAMIC_CLASS_PATTERNS.iter().any(|re| re.is_match(class))
}

/// Classes safe to put in a selector: not generated, and a plain identifier.
pub fn stable_classes<'a>(classes: &[&'a str]) -> Vec<&'a str> {
    stable_classes_excluding(classes, &[])
}

/// [`stable_classes`] without `excluded` (e.g. a configured highlight class).
pub fn stable_classes_excluding<'a>(classes: &[&'a str], excluded: &[String]) -> Vec<&'a str> {
    classes
        .iter()
        .copied()
        .filter(|c| is_css_identifier(c) && !is_dynamic_class(c))
        .filter(|c| !excluded.iter().any(|e| e.as_str() == *c))
        .collect()
}

fn is_css_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ============================================================================
// XPath
// ============================================================================

/// Absolute XPath from the nearest document or shadow root down to `element`.
///
/// A step carries `[n]` whenever the parent has another child with the same
/// tag, so the path survives later insertion of same-tag siblings.
pub fn generate_xpath(dom: &Dom, element: NodeId) -> String {
    let mut segments = vec![];
    let mut current = Some(element);

    while let Some(node) = current {
        let Some(tag) = dom.tag(node) else {
            break;
        };
        let parent = dom.parent(node);
        let same_tag = parent
            .map(|p| {
                dom.element_children(p)
                    .into_iter()
                    .filter(|c| dom.tag(*c) == Some(tag))
                    .count()
            })
            .unwrap_or(1);

        if same_tag > 1 {
            segments.push(format!("{}[{}]", tag, nth_of_type(dom, node)));
        } else {
            segments.push(tag.to_string());
        }
        current = parent.filter(|p| dom.is_element(*p));
    }

    segments.reverse();
    format!("/{}", segments.join("/"))
}

// ============================================================================
// CSS selector
// ============================================================================

fn quote_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn id_selector(id: &str) -> Option<String> {
    if id.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if is_css_identifier(id) {
        Some(format!("#{}", id))
    } else {
        Some(format!("[id=\"{}\"]", quote_attr(id)))
    }
}

fn resolves_uniquely(dom: &Dom, scope: NodeId, selector: &str, element: NodeId) -> bool {
    matches!(query_selector_all(dom, scope, selector).as_deref(), Ok([only]) if *only == element)
}

/// Selector for one ancestor level: `tag.stable:nth-of-type(n)`.
fn level_selector(dom: &Dom, node: NodeId, excluded: &[String]) -> String {
    let Some(el) = dom.element(node) else {
        return String::new();
    };
    let mut part = el.tag.clone();
    for class in stable_classes_excluding(&el.class_list(), excluded)
        .into_iter()
        .take(2)
    {
        part.push('.');
        part.push_str(class);
    }

    let has_same_tag_sibling = dom
        .parent(node)
        .map(|p| {
            dom.element_children(p)
                .into_iter()
                .filter(|c| dom.tag(*c) == Some(el.tag.as_str()))
                .count()
                > 1
        })
        .unwrap_or(false);
    if has_same_tag_sibling {
        part.push_str(&format!(":nth-of-type({})", nth_of_type(dom, node)));
    }
    part
}

/// CSS selector for `element`, scoped to its document or shadow root.
///
/// Preference: `#id`, then `[data-testid]`, then a `>`-joined class path
/// anchored at the first ancestor with a usable id.
pub fn generate_css_selector(dom: &Dom, element: NodeId) -> String {
    generate_css_selector_excluding(dom, element, &[])
}

/// [`generate_css_selector`] that never uses a class in `excluded`.
pub fn generate_css_selector_excluding(dom: &Dom, element: NodeId, excluded: &[String]) -> String {
    let Some(el) = dom.element(element) else {
        return String::new();
    };
    let scope = dom.root_node(element);

    if let Some(sel) = el.id().and_then(id_selector) {
        if resolves_uniquely(dom, scope, &sel, element) {
            return sel;
        }
    }

    if let Some(test_id) = el.attr("data-testid").filter(|v| !v.is_empty()) {
        let sel = format!("[data-testid=\"{}\"]", quote_attr(test_id));
        if resolves_uniquely(dom, scope, &sel, element) {
            return sel;
        }
    }

    let mut parts: Vec<String> = vec![];
    let mut current = Some(element);
    while let Some(node) = current {
        if node != element {
            if let Some(sel) = dom.element(node).and_then(|e| e.id()).and_then(id_selector) {
                if resolves_uniquely(dom, scope, &sel, node) {
                    parts.push(sel);
                    break;
                }
            }
        }
        parts.push(level_selector(dom, node, excluded));

        if parts.len() >= MAX_SELECTOR_DEPTH {
            let candidate = joined(&parts);
            if resolves_uniquely(dom, scope, &candidate, element) {
                return candidate;
            }
        }
        current = dom.parent_element(node);
    }

    joined(&parts)
}

fn joined(parts: &[String]) -> String {
    parts
        .iter()
        .rev()
        .cloned()
        .collect::<Vec<_>>()
        .join(" > ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_generated_class_names() {
        assert!(is_dynamic_class("css-1x2y3z"));
        assert!(is_dynamic_class("sc-bdVaJa"));
        assert!(is_dynamic_class("Button_primary__3xK9a"));
        assert!(is_dynamic_class("ng-star-inserted"));
        assert!(is_dynamic_class("card--a1b2c3d4"));
        assert!(is_dynamic_class("recorder-highlight"));
    }

    #[test]
    fn keeps_hand_written_class_names() {
        assert!(!is_dynamic_class("btn"));
        assert!(!is_dynamic_class("btn-primary"));
        assert!(!is_dynamic_class("nav__item"));
        assert!(!is_dynamic_class("form-control"));
    }

    #[test]
    fn excluded_classes_are_not_stable() {
        let classes = ["btn", "flash"];
        assert_eq!(
            stable_classes_excluding(&classes, &["flash".to_string()]),
            vec!["btn"]
        );
    }

    #[test]
    fn stable_classes_drop_non_identifiers() {
        let classes = ["btn", "2col", "a:b", "css-abc123", "primary"];
        assert_eq!(stable_classes(&classes), vec!["btn", "primary"]);
    }
}
