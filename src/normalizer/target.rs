//! Effective-target resolution: the element an event is attributed to,
//! as opposed to the node the browser reported.

use crate::dom::document::Dom;
use crate::dom::node::NodeId;

const LABELABLE_TAGS: &[&str] = &["input", "select", "textarea", "button", "meter", "output", "progress"];

fn is_labelable(dom: &Dom, node: NodeId) -> bool {
    dom.element(node).is_some_and(|el| {
        LABELABLE_TAGS.contains(&el.tag.as_str()) && el.input_type().as_deref() != Some("hidden")
    })
}

fn previous_element_sibling(dom: &Dom, node: NodeId) -> Option<NodeId> {
    let parent = dom.parent(node)?;
    let siblings = dom.element_children(parent);
    let pos = siblings.iter().position(|s| *s == node)?;
    pos.checked_sub(1).and_then(|i| siblings.get(i).copied())
}

/// The `<select>` a Select2 widget is standing in for.
///
/// The results list (`select2-{id}-results`) and the rendered selection
/// (`select2-{id}-container`) name the select by id; the container itself
/// is inserted right after the select.
pub fn select2_backing_select(dom: &Dom, element: NodeId) -> Option<NodeId> {
    let scope = dom.root_node(element);

    let named = dom.closest(element, |el| {
        el.id().is_some_and(|id| {
            id.starts_with("select2-") && (id.ends_with("-results") || id.ends_with("-container"))
        })
    });
    if let Some(id) = named
        .and_then(|n| dom.element(n))
        .and_then(|el| el.id())
        .and_then(|id| id.strip_prefix("select2-"))
        .and_then(|id| id.strip_suffix("-results").or_else(|| id.strip_suffix("-container")))
    {
        if let Some(select) = dom
            .get_element_by_id(scope, id)
            .filter(|s| dom.tag(*s) == Some("select"))
        {
            return Some(select);
        }
    }

    let container = dom.closest(element, |el| el.has_class("select2-container"))?;
    previous_element_sibling(dom, container).filter(|s| dom.tag(*s) == Some("select"))
}

/// The control that opened an ARIA listbox/menu containing `element`.
pub fn dropdown_trigger(dom: &Dom, element: NodeId) -> Option<NodeId> {
    let option = dom.closest(element, |el| {
        matches!(el.attr("role"), Some("option" | "menuitem"))
    })?;
    let list = dom.closest(option, |el| matches!(el.attr("role"), Some("listbox" | "menu")))?;
    let list_id = dom.element(list)?.id()?.to_string();

    let scope = dom.root_node(list);
    dom.descendants(scope).into_iter().find(|n| {
        *n != list
            && (dom.attr(*n, "aria-controls") == Some(list_id.as_str())
                || dom.attr(*n, "aria-owns") == Some(list_id.as_str()))
    })
}

/// The control a clicked `<label>` stands for: its `for` target, else the
/// first labelable descendant.
pub fn label_control(dom: &Dom, element: NodeId) -> Option<NodeId> {
    if is_labelable(dom, element) {
        return None;
    }
    let label = dom.closest(element, |el| el.tag == "label")?;

    if let Some(for_id) = dom.attr(label, "for").filter(|v| !v.is_empty()) {
        let scope = dom.root_node(label);
        if let Some(control) = dom
            .get_element_by_id(scope, for_id)
            .filter(|c| is_labelable(dom, *c))
        {
            return Some(control);
        }
    }

    dom.descendants(label)
        .into_iter()
        .find(|n| is_labelable(dom, *n))
}

/// Resolution order: deepest element of the composed path (when resolving
/// through shadow DOM), Select2 or dropdown item, label, then the raw target.
pub fn resolve_effective_target(
    dom: &Dom,
    target: NodeId,
    composed_path: &[NodeId],
    through_shadow: bool,
) -> NodeId {
    let mut current = target;
    if through_shadow {
        if let Some(deepest) = composed_path.iter().copied().find(|n| dom.is_element(*n)) {
            current = deepest;
        }
    }

    if let Some(select) = select2_backing_select(dom, current) {
        return select;
    }
    if let Some(trigger) = dropdown_trigger(dom, current) {
        return trigger;
    }
    if let Some(control) = label_control(dom, current) {
        return control;
    }
    current
}
