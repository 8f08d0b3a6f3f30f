use crate::dom::document::Dom;
use crate::dom::node::NodeId;

const MAX_LABEL_LEN: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub struct LabelResult {
    pub label: String,
    pub confidence: f64,
    pub success: bool,
}

impl LabelResult {
    pub fn found(label: String, confidence: f64) -> Self {
        LabelResult {
            label,
            confidence,
            success: true,
        }
    }

    pub fn not_found() -> Self {
        LabelResult {
            label: String::new(),
            confidence: 0.0,
            success: false,
        }
    }
}

/// Human-facing name for an element.
pub trait LabelResolver {
    fn resolve(&self, dom: &Dom, element: NodeId) -> LabelResult;
}

/// Accessible-name style lookup: `aria-label`, `aria-labelledby`,
/// `<label for>`, wrapping `<label>`, placeholder, title, button value,
/// then the element's own text.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicLabelResolver;

fn clean(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.chars().take(MAX_LABEL_LEN).collect())
    }
}

impl LabelResolver for BasicLabelResolver {
    fn resolve(&self, dom: &Dom, element: NodeId) -> LabelResult {
        let Some(el) = dom.element(element) else {
            return LabelResult::not_found();
        };
        let scope = dom.root_node(element);

        if let Some(label) = el.attr("aria-label").and_then(clean) {
            return LabelResult::found(label, 0.95);
        }

        if let Some(ids) = el.attr("aria-labelledby") {
            let text = ids
                .split_whitespace()
                .filter_map(|id| dom.get_element_by_id(scope, id))
                .map(|n| dom.text_content(n))
                .collect::<Vec<_>>()
                .join(" ");
            if let Some(label) = clean(&text) {
                return LabelResult::found(label, 0.9);
            }
        }

        if let Some(id) = el.id() {
            let for_label = dom
                .descendants(scope)
                .into_iter()
                .find(|n| dom.tag(*n) == Some("label") && dom.attr(*n, "for") == Some(id));
            if let Some(label) = for_label.and_then(|n| clean(&dom.text_content(n))) {
                return LabelResult::found(label, 0.9);
            }
        }

        if let Some(wrapping) = dom.parent_element(element).and_then(|p| dom.closest(p, |e| e.tag == "label")) {
            if let Some(label) = clean(&dom.text_content(wrapping)) {
                return LabelResult::found(label, 0.85);
            }
        }

        if let Some(label) = el.attr("placeholder").and_then(clean) {
            return LabelResult::found(label, 0.7);
        }
        if let Some(label) = el.attr("title").and_then(clean) {
            return LabelResult::found(label, 0.6);
        }
        if el.tag == "input"
            && matches!(el.input_type().as_deref(), Some("submit" | "button" | "reset"))
        {
            if let Some(label) = clean(&el.value) {
                return LabelResult::found(label, 0.6);
            }
        }
        if let Some(label) = clean(&dom.text_content(element)) {
            return LabelResult::found(label, 0.5);
        }
        if let Some(label) = el.attr("name").and_then(clean) {
            return LabelResult::found(label, 0.3);
        }

        LabelResult::not_found()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_for_beats_placeholder() {
        let mut dom = Dom::new("https://example.test/");
        let body = dom.body(dom.main_document()).unwrap();
        let label = dom.append(body, "label", &[("for", "email")]).unwrap();
        dom.append_text(label, "  Work   email ").unwrap();
        let input = dom
            .append(body, "input", &[("id", "email"), ("placeholder", "you@example.com")])
            .unwrap();

        let result = BasicLabelResolver.resolve(&dom, input);
        assert!(result.success);
        assert_eq!(result.label, "Work email");
    }

    #[test]
    fn aria_labelledby_joins_referenced_text() {
        let mut dom = Dom::new("https://example.test/");
        let body = dom.body(dom.main_document()).unwrap();
        let a = dom.append(body, "span", &[("id", "a")]).unwrap();
        dom.append_text(a, "Billing").unwrap();
        let b = dom.append(body, "span", &[("id", "b")]).unwrap();
        dom.append_text(b, "address").unwrap();
        let field = dom.append(body, "input", &[("aria-labelledby", "a b")]).unwrap();

        assert_eq!(BasicLabelResolver.resolve(&dom, field).label, "Billing address");
    }

    #[test]
    fn unlabeled_element_reports_failure() {
        let mut dom = Dom::new("https://example.test/");
        let body = dom.body(dom.main_document()).unwrap();
        let div = dom.append(body, "div", &[]).unwrap();
        assert!(!BasicLabelResolver.resolve(&dom, div).success);
    }
}
