use dom_recorder::dom::{Dom, NodeId};

pub const PAGE_URL: &str = "https://shop.example.test/checkout";

pub fn blank_page() -> Dom {
    Dom::new(PAGE_URL)
}

pub fn body(dom: &Dom) -> NodeId {
    dom.body(dom.main_document()).unwrap()
}

/// `<input id="name">` plus a submit button.
pub struct FormPage {
    pub dom: Dom,
    pub form: NodeId,
    pub name: NodeId,
    pub submit: NodeId,
}

pub fn form_page() -> FormPage {
    let mut dom = blank_page();
    let body = body(&dom);
    let form = dom.append(body, "form", &[("id", "signup")]).unwrap();
    let label = dom.append(form, "label", &[("for", "name")]).unwrap();
    dom.append_text(label, "Name").unwrap();
    let name = dom
        .append(form, "input", &[("id", "name"), ("type", "text")])
        .unwrap();
    let submit = dom.append(form, "button", &[("type", "submit")]).unwrap();
    dom.append_text(submit, "Submit").unwrap();
    dom.take_mutations();
    FormPage {
        dom,
        form,
        name,
        submit,
    }
}

/// Type `value` into `input` the way a browser would before firing `input`.
pub fn type_value(dom: &mut Dom, input: NodeId, value: &str) {
    dom.set_value(input, value).unwrap();
}

/// A button nested `depth` same-origin iframes deep. Returns the button.
pub fn nested_frames(dom: &mut Dom, depth: usize) -> NodeId {
    let mut parent = body(dom);
    for level in 0..depth {
        // A sibling frame first, so the index lookup has something to skip.
        dom.append(parent, "iframe", &[("name", "ads")]).unwrap();
        let id = format!("frame-{}", level);
        let iframe = dom.append(parent, "iframe", &[("id", id.as_str())]).unwrap();
        let doc = dom
            .load_frame(iframe, &format!("https://shop.example.test/frame/{}", level))
            .unwrap();
        parent = dom.body(doc).unwrap();
    }
    let wrapper = dom.append(parent, "div", &[("class", "actions")]).unwrap();
    dom.append(wrapper, "button", &[]).unwrap();
    let button = dom.append(wrapper, "button", &[("class", "confirm")]).unwrap();
    dom.append_text(button, "Confirm").unwrap();
    button
}
