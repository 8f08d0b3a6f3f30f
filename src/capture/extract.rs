use crate::capture::captured_event::{CapturedPayload, ClickAction, KeyAction, PointerCoordinates};
use crate::dom::document::Dom;
use crate::dom::event::{DomEvent, EventType};
use crate::dom::node::NodeId;
use crate::element::classifier::element_kind;
use crate::element::element_model::ElementKind;
use crate::normalizer::target::select2_backing_select;

/// Per-type payload for `event` on `target`; `None` for events that are
/// not recordable (e.g. non-action keys, keyup).
pub fn extract_payload(dom: &Dom, event: &DomEvent, target: NodeId) -> Option<CapturedPayload> {
    match event.event_type {
        EventType::Click | EventType::DblClick | EventType::MouseDown | EventType::MouseUp => {
            Some(CapturedPayload::Click {
                action: click_action(dom, target, event.event_type),
                coordinates: pointer_coordinates(dom, event, target),
                button: event.button,
                modifiers: event.modifiers,
            })
        }
        EventType::Input | EventType::Change => {
            let source = select2_backing_select(dom, target).unwrap_or(target);
            Some(CapturedPayload::Value {
                value: extract_value(dom, source),
            })
        }
        EventType::KeyDown => {
            let key = event.key.as_deref()?;
            let action = KeyAction::from_key(key)?;
            Some(CapturedPayload::Key {
                action,
                key: key.to_string(),
                modifiers: event.modifiers,
            })
        }
        // Recordable keys are taken from keydown only.
        EventType::KeyUp => None,
        EventType::Focus => Some(CapturedPayload::Focus),
        EventType::Blur => Some(CapturedPayload::Blur),
        EventType::Submit => Some(CapturedPayload::Submit),
    }
}

/// Click subtype from the element's role. A checkbox reports the state the
/// click produces: on `mousedown` the toggle has not happened yet.
pub fn click_action(dom: &Dom, target: NodeId, event_type: EventType) -> ClickAction {
    let Some(el) = dom.element(target) else {
        return ClickAction::Click;
    };
    match element_kind(el) {
        ElementKind::Checkbox => {
            let checked_after = match event_type {
                EventType::MouseDown => !el.checked,
                _ => el.checked,
            };
            if checked_after {
                ClickAction::Check
            } else {
                ClickAction::Uncheck
            }
        }
        ElementKind::Radio => ClickAction::Select,
        ElementKind::Link => ClickAction::Navigate,
        _ if dom
            .closest(target, |e| e.tag == "a" && e.has_attr("href"))
            .is_some() =>
        {
            ClickAction::Navigate
        }
        _ => ClickAction::Click,
    }
}

pub fn pointer_coordinates(dom: &Dom, event: &DomEvent, target: NodeId) -> PointerCoordinates {
    let (scroll_x, scroll_y) = dom
        .owner_document(target)
        .and_then(|d| dom.document_data(d))
        .map(|d| (d.scroll_x, d.scroll_y))
        .unwrap_or((0.0, 0.0));
    let rect = dom.element(target).map(|el| el.rect).unwrap_or_default();

    PointerCoordinates {
        client_x: event.client_x,
        client_y: event.client_y,
        page_x: event.client_x + scroll_x,
        page_y: event.client_y + scroll_y,
        offset_x: event.client_x - rect.x,
        offset_y: event.client_y - rect.y,
    }
}

/// Type-aware current value: checkbox/radio as `"true"`/`"false"`, file
/// inputs as the chosen file names, contenteditable as its text.
pub fn extract_value(dom: &Dom, element: NodeId) -> String {
    let Some(el) = dom.element(element) else {
        return String::new();
    };
    match element_kind(el) {
        ElementKind::Checkbox | ElementKind::Radio => el.checked.to_string(),
        ElementKind::ContentEditable => dom.text_content(element).trim().to_string(),
        _ if el.input_type().as_deref() == Some("file") => el
            .files
            .iter()
            .map(|f| f.rsplit(['/', '\\']).next().unwrap_or(f).to_string())
            .collect::<Vec<_>>()
            .join(", "),
        _ => el.value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_action_keys_are_not_recorded() {
        let mut dom = Dom::new("https://example.test/");
        let body = dom.body(dom.main_document()).unwrap();
        let input = dom.append(body, "input", &[("id", "q")]).unwrap();

        let enter = DomEvent::key_down(input, "Enter", 10);
        let letter = DomEvent::key_down(input, "a", 10);
        assert!(matches!(
            extract_payload(&dom, &enter, input),
            Some(CapturedPayload::Key { action: KeyAction::Enter, .. })
        ));
        assert_eq!(extract_payload(&dom, &letter, input), None);
    }

    #[test]
    fn checkbox_mousedown_reports_the_upcoming_state() {
        let mut dom = Dom::new("https://example.test/");
        let body = dom.body(dom.main_document()).unwrap();
        let cb = dom.append(body, "input", &[("type", "checkbox")]).unwrap();

        assert_eq!(click_action(&dom, cb, EventType::MouseDown), ClickAction::Check);
        dom.set_checked(cb, true).unwrap();
        assert_eq!(click_action(&dom, cb, EventType::Click), ClickAction::Check);
        assert_eq!(click_action(&dom, cb, EventType::MouseDown), ClickAction::Uncheck);
    }

    #[test]
    fn file_inputs_report_file_names() {
        let mut dom = Dom::new("https://example.test/");
        let body = dom.body(dom.main_document()).unwrap();
        let file = dom.append(body, "input", &[("type", "file")]).unwrap();
        dom.element_mut(file).unwrap().files = vec!["C:\\fakepath\\cv.pdf".into(), "photo.png".into()];
        assert_eq!(extract_value(&dom, file), "cv.pdf, photo.png");
    }
}
