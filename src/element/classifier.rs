use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::dom::document::Dom;
use crate::dom::node::{ElementData, NodeId};
use crate::element::element_model::{ElementInfo, ElementKind};
use crate::element::locator::{generate_css_selector_excluding, generate_xpath};

/// Replaces the value of password, card and token fields everywhere it
/// would otherwise be recorded or logged.
pub const MASKED_VALUE: &str = "********";

const MAX_TEXT_LEN: usize = 100;

static SENSITIVE_NAME: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(pass(word|wd|code)|pwd|secret|token|api[_-]?key|cvv|cvc|card[_-]?(number|num|no)|cc[_-]?(num|number|exp|csc)|(^|[_-])(otp|ssn)([_-]|$))",
    )
    .ok()
});

const SENSITIVE_AUTOCOMPLETE: &[&str] = &[
    "current-password",
    "new-password",
    "one-time-code",
    "cc-number",
    "cc-csc",
    "cc-exp",
    "cc-exp-month",
    "cc-exp-year",
];

/// Snapshot `element` into an [`ElementInfo`]. Pure: reads the DOM only.
pub fn classify(dom: &Dom, element: NodeId) -> ElementInfo {
    classify_excluding(dom, element, &[])
}

/// [`classify`] with `ignored_classes` left out of the class list and the
/// selector, for classes the recorder adds and removes itself.
pub fn classify_excluding(dom: &Dom, element: NodeId, ignored_classes: &[String]) -> ElementInfo {
    let Some(el) = dom.element(element) else {
        return ElementInfo::unknown();
    };

    let is_sensitive = is_sensitive_field(el);
    let xpath = generate_xpath(dom, element);
    let css_selector = generate_css_selector_excluding(dom, element, ignored_classes);
    let fingerprint = element_fingerprint(&el.tag, &xpath, &css_selector);

    ElementInfo {
        tag_name: el.tag.clone(),
        kind: element_kind(el),
        element_type: element_type(el),
        id: el.id().map(str::to_string),
        name: el.attr("name").map(str::to_string),
        class_list: el
            .class_list()
            .iter()
            .filter(|c| !ignored_classes.iter().any(|i| i.as_str() == **c))
            .map(|c| c.to_string())
            .collect(),
        role: el.attr("role").map(str::to_string),
        input_type: el.input_type(),
        aria_attributes: prefixed_attributes(el, "aria-"),
        data_attributes: prefixed_attributes(el, "data-"),
        placeholder: el.attr("placeholder").map(str::to_string),
        href: el.attr("href").map(str::to_string),
        text: visible_text(dom, element),
        value: element_value(el).map(|v| {
            if is_sensitive {
                MASKED_VALUE.to_string()
            } else {
                v
            }
        }),
        is_sensitive,
        xpath,
        css_selector,
        bounding_rect: el.rect,
        is_visible: is_visible(dom, element),
        in_viewport: is_in_viewport(dom, element),
        iframe_chain: vec![],
        shadow_host_chain: vec![],
        fingerprint,
    }
}

// ============================================================================
// Kind and type
// ============================================================================

fn role_of(el: &ElementData) -> Option<String> {
    el.attr("role")
        .map(|r| r.trim().to_ascii_lowercase())
        .filter(|r| !r.is_empty())
}

const TEXT_LIKE_INPUTS: &[&str] = &[
    "text",
    "email",
    "password",
    "search",
    "tel",
    "url",
    "number",
    "date",
    "time",
    "datetime-local",
    "month",
    "week",
];

pub fn element_kind(el: &ElementData) -> ElementKind {
    if let Some(role) = role_of(el) {
        match role.as_str() {
            "button" | "menuitem" | "tab" => return ElementKind::Button,
            "link" => return ElementKind::Link,
            "checkbox" | "switch" => return ElementKind::Checkbox,
            "radio" => return ElementKind::Radio,
            "textbox" | "searchbox" => return ElementKind::TextInput,
            "combobox" | "listbox" => return ElementKind::Select,
            _ => {}
        }
    }

    match el.tag.as_str() {
        "button" => ElementKind::Button,
        "a" if el.has_attr("href") => ElementKind::Link,
        "select" => ElementKind::Select,
        "textarea" => ElementKind::TextArea,
        "input" => match el.input_type().as_deref() {
            Some("checkbox") => ElementKind::Checkbox,
            Some("radio") => ElementKind::Radio,
            Some("submit" | "button" | "reset" | "image") => ElementKind::Button,
            Some(t) if TEXT_LIKE_INPUTS.contains(&t) => ElementKind::TextInput,
            _ => ElementKind::Other,
        },
        _ if el.is_content_editable() => ElementKind::ContentEditable,
        _ => ElementKind::Other,
    }
}

/// Type label with priority: ARIA role, tag rules, `contenteditable`,
/// then `container`.
pub fn element_type(el: &ElementData) -> String {
    if let Some(role) = role_of(el) {
        return match role.as_str() {
            "textbox" | "searchbox" => "text".to_string(),
            "combobox" | "listbox" => "select".to_string(),
            _ => role,
        };
    }

    let by_tag = match el.tag.as_str() {
        "input" => Some(match el.input_type().as_deref() {
            Some("submit" | "button" | "reset" | "image") => "button".to_string(),
            Some(t) => t.to_string(),
            None => "text".to_string(),
        }),
        "button" => Some("button".to_string()),
        "a" => Some("link".to_string()),
        "select" => Some("select".to_string()),
        "textarea" => Some("textarea".to_string()),
        "img" => Some("image".to_string()),
        "label" => Some("label".to_string()),
        "form" => Some("form".to_string()),
        "option" => Some("option".to_string()),
        "iframe" => Some("iframe".to_string()),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some("heading".to_string()),
        _ => None,
    };

    match by_tag {
        Some(t) => t,
        None if el.is_content_editable() => "contenteditable".to_string(),
        None => "container".to_string(),
    }
}

// ============================================================================
// Attributes, text, value
// ============================================================================

fn prefixed_attributes(el: &ElementData, prefix: &str) -> BTreeMap<String, String> {
    el.attributes
        .iter()
        .filter(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Whitespace-collapsed text content, truncated; `None` when empty.
pub fn visible_text(dom: &Dom, element: NodeId) -> Option<String> {
    let raw = dom.text_content(element);
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(collapsed.chars().take(MAX_TEXT_LEN).collect())
}

fn element_value(el: &ElementData) -> Option<String> {
    match el.tag.as_str() {
        "input" | "textarea" | "select" | "option" | "button" => Some(el.value.clone()),
        _ => None,
    }
}

pub fn is_sensitive_field(el: &ElementData) -> bool {
    if el.input_type().as_deref() == Some("password") {
        return true;
    }
    if let Some(ac) = el.attr("autocomplete") {
        let ac = ac.to_ascii_lowercase();
        if ac
            .split_whitespace()
            .any(|token| SENSITIVE_AUTOCOMPLETE.contains(&token))
        {
            return true;
        }
    }
    ["name", "id"]
        .iter()
        .filter_map(|attr| el.attr(attr))
        .any(|v| SENSITIVE_NAME.as_ref().is_some_and(|re| re.is_match(v)))
}

/// `value` unless `el` is a sensitive field.
pub fn mask_value(el: &ElementData, value: &str) -> String {
    if is_sensitive_field(el) {
        MASKED_VALUE.to_string()
    } else {
        value.to_string()
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Rendered: not `display:none` (here or on an ancestor), not
/// `visibility:hidden`, not fully transparent, and with a non-zero box.
pub fn is_visible(dom: &Dom, element: NodeId) -> bool {
    let Some(el) = dom.element(element) else {
        return false;
    };
    if el.style.visibility == "hidden" || el.style.opacity <= 0.0 {
        return false;
    }
    if el.rect.width <= 0.0 && el.rect.height <= 0.0 {
        return false;
    }
    dom.closest(element, |e| e.style.display == "none").is_none()
}

/// Bounding rect intersects the owning document's viewport.
pub fn is_in_viewport(dom: &Dom, element: NodeId) -> bool {
    let Some(el) = dom.element(element) else {
        return false;
    };
    let Some(viewport) = dom
        .owner_document(element)
        .and_then(|doc| dom.document_data(doc))
        .map(|d| d.viewport)
    else {
        return false;
    };
    el.rect.intersects(&viewport)
}

pub fn element_fingerprint(tag: &str, xpath: &str, css: &str) -> String {
    use sha1::{Digest, Sha1};

    let mut hasher = Sha1::new();
    hasher.update(tag.as_bytes());
    hasher.update(b"|");
    hasher.update(xpath.as_bytes());
    hasher.update(b"|");
    hasher.update(css.as_bytes());
    format!("{:x}", hasher.finalize())
}
