use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::dom::DomError;
use crate::dom::document::Dom;
use crate::dom::event::{DomEvent, Modifiers};
use crate::dom::node::{ComputedStyle, NodeId, Rect, ShadowMode};

/// A page plus a timed interaction script, deserialized from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub globals: Vec<String>,
    #[serde(default)]
    pub body: Vec<NodeSpec>,
    #[serde(default)]
    pub script: Vec<ScriptStep>,
}

fn default_url() -> String {
    "about:blank".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSpec {
    pub tag: String,
    /// Name other script steps use to target this element.
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub rect: Option<Rect>,
    #[serde(default)]
    pub style: Option<ComputedStyle>,
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
    #[serde(default)]
    pub shadow: Option<ShadowSpec>,
    #[serde(default)]
    pub frame: Option<FrameSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShadowSpec {
    pub mode: ShadowMode,
    #[serde(default)]
    pub exposed: bool,
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrameSpec {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub cross_origin: bool,
    #[serde(default)]
    pub body: Vec<NodeSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptStep {
    /// Virtual time of the step, in milliseconds.
    pub at: u64,
    #[serde(flatten)]
    pub action: ScriptAction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptAction {
    Click {
        target: String,
        #[serde(default)]
        x: f64,
        #[serde(default)]
        y: f64,
        #[serde(default)]
        modifiers: Modifiers,
    },
    MouseDown {
        target: String,
    },
    Type {
        target: String,
        value: String,
    },
    Change {
        target: String,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        checked: Option<bool>,
    },
    Key {
        target: String,
        key: String,
    },
    Blur {
        target: String,
    },
    /// Let time pass without an event.
    Wait,
}

/// A built scenario page with its named elements.
#[derive(Debug)]
pub struct ScenarioPage {
    pub dom: Dom,
    pub refs: HashMap<String, NodeId>,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Scenario, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn build(&self) -> Result<ScenarioPage, DomError> {
        let mut dom = Dom::new(&self.url);
        let doc = dom.main_document();
        {
            let data = dom.document_data_mut(doc)?;
            data.title = self.title.clone();
            data.globals = self.globals.clone();
        }
        let body = dom.body(doc).ok_or(DomError::NotADocument(doc))?;
        let mut refs = HashMap::new();
        for spec in &self.body {
            build_node(&mut dom, body, spec, &mut refs)?;
        }
        dom.take_mutations();
        Ok(ScenarioPage { dom, refs })
    }
}

fn build_node(
    dom: &mut Dom,
    parent: NodeId,
    spec: &NodeSpec,
    refs: &mut HashMap<String, NodeId>,
) -> Result<NodeId, DomError> {
    let attrs: Vec<(&str, &str)> = spec
        .attrs
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    let id = dom.append(parent, &spec.tag, &attrs)?;
    {
        let el = dom.element_mut(id)?;
        if let Some(rect) = spec.rect {
            el.rect = rect;
        }
        if let Some(style) = &spec.style {
            el.style = style.clone();
        }
        el.properties = spec.properties.clone();
    }
    if let Some(name) = &spec.reference {
        refs.insert(name.clone(), id);
    }
    if let Some(text) = &spec.text {
        dom.append_text(id, text)?;
    }
    for child in &spec.children {
        build_node(dom, id, child, refs)?;
    }

    if let Some(shadow) = &spec.shadow {
        let root = dom.attach_shadow(id, shadow.mode)?;
        if shadow.exposed {
            dom.expose_shadow_root(id)?;
        }
        for child in &shadow.children {
            build_node(dom, root, child, refs)?;
        }
    }

    if let Some(frame) = &spec.frame {
        if frame.cross_origin {
            dom.set_cross_origin(id)?;
        } else {
            let doc = dom.load_frame(id, &frame.url)?;
            let body = dom.body(doc).ok_or(DomError::NotADocument(doc))?;
            for child in &frame.body {
                build_node(dom, body, child, refs)?;
            }
        }
    }

    Ok(id)
}

impl ScenarioPage {
    fn target(&self, name: &str) -> Result<NodeId, DomError> {
        self.refs
            .get(name)
            .copied()
            .ok_or_else(|| DomError::UnknownRef(name.to_string()))
    }

    /// Apply the DOM side effects of a script step and return the events
    /// the browser would fire for it, in order.
    pub fn apply(&mut self, step: &ScriptStep) -> Result<Vec<DomEvent>, DomError> {
        let events = match &step.action {
            ScriptAction::Click {
                target,
                x,
                y,
                modifiers,
            } => {
                let id = self.target(target)?;
                vec![
                    DomEvent::mouse_down(id, step.at)
                        .at(*x, *y)
                        .with_modifiers(*modifiers),
                    DomEvent::click(id, step.at)
                        .at(*x, *y)
                        .with_modifiers(*modifiers),
                ]
            }
            ScriptAction::MouseDown { target } => {
                vec![DomEvent::mouse_down(self.target(target)?, step.at)]
            }
            ScriptAction::Type { target, value } => {
                let id = self.target(target)?;
                self.dom.set_value(id, value)?;
                vec![DomEvent::input(id, step.at)]
            }
            ScriptAction::Change {
                target,
                value,
                checked,
            } => {
                let id = self.target(target)?;
                if let Some(value) = value {
                    self.dom.set_value(id, value)?;
                }
                if let Some(checked) = checked {
                    self.dom.set_checked(id, *checked)?;
                }
                vec![DomEvent::change(id, step.at)]
            }
            ScriptAction::Key { target, key } => {
                vec![DomEvent::key_down(self.target(target)?, key, step.at)]
            }
            ScriptAction::Blur { target } => vec![DomEvent::blur(self.target(target)?, step.at)],
            ScriptAction::Wait => vec![],
        };
        Ok(events)
    }
}
