use crate::dom::DomError;
use crate::dom::event::ListenerRegistry;
use crate::dom::node::{
    DocumentData, ElementData, FrameContent, MutationRecord, Node, NodeId, NodeKind, Rect,
    ShadowMode, ShadowRootData,
};

/// Arena-backed page model: the top document plus every iframe document
/// and shadow tree reachable from it.
#[derive(Debug)]
pub struct Dom {
    nodes: Vec<Node>,
    main_document: NodeId,
    mutations: Vec<MutationRecord>,
    pub(crate) listeners: ListenerRegistry,
    pub user_agent: String,
    pub platform: String,
}

impl Dom {
    /// Create a page with `<html><head></head><body></body></html>`.
    pub fn new(url: &str) -> Dom {
        let mut dom = Dom {
            nodes: vec![],
            main_document: NodeId(0),
            mutations: vec![],
            listeners: ListenerRegistry::default(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
            platform: "Linux x86_64".to_string(),
        };
        dom.main_document = dom.new_document(url);
        dom.mutations.clear();
        dom
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn new_document(&mut self, url: &str) -> NodeId {
        let doc = self.push(Node::new(NodeKind::Document(DocumentData::new(url))));
        let html = self.push(Node::new(NodeKind::Element(ElementData::new("html"))));
        let head = self.push(Node::new(NodeKind::Element(ElementData::new("head"))));
        let body = self.push(Node::new(NodeKind::Element(ElementData::new("body"))));
        self.link(doc, html, None);
        self.link(html, head, None);
        self.link(html, body, None);
        doc
    }

    fn link(&mut self, parent: NodeId, child: NodeId, before: Option<usize>) {
        self.nodes[child.0].parent = Some(parent);
        let children = &mut self.nodes[parent.0].children;
        match before {
            Some(idx) if idx < children.len() => children.insert(idx, child),
            _ => children.push(child),
        }
    }

    // ------------------------------------------------------------------
    // Node access
    // ------------------------------------------------------------------

    pub fn main_document(&self) -> NodeId {
        self.main_document
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.node(id).and_then(Node::as_element)
    }

    pub fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        self.nodes
            .get_mut(id.0)
            .and_then(Node::as_element_mut)
            .ok_or(DomError::NotAnElement(id))
    }

    pub fn document_data(&self, doc: NodeId) -> Option<&DocumentData> {
        self.node(doc).and_then(Node::as_document)
    }

    pub fn document_data_mut(&mut self, doc: NodeId) -> Result<&mut DocumentData, DomError> {
        match self.nodes.get_mut(doc.0).map(|n| &mut n.kind) {
            Some(NodeKind::Document(data)) => Ok(data),
            _ => Err(DomError::NotADocument(doc)),
        }
    }

    pub fn shadow_root_data(&self, root: NodeId) -> Option<&ShadowRootData> {
        self.node(root).and_then(Node::as_shadow_root)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(name))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.is_element(*p))
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    /// Element descendants of `root` in document order, without entering
    /// shadow trees or iframe documents.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.is_element(id) {
                out.push(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Equivalent of `getRootNode()`: the document or shadow root at the top
    /// of the tree containing `id`, or a detached subtree root.
    pub fn root_node(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// The document containing `id`, crossing shadow boundaries through hosts.
    pub fn owner_document(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let root = self.root_node(current);
            match self.node(root).map(|n| &n.kind) {
                Some(NodeKind::Document(_)) => return Some(root),
                Some(NodeKind::ShadowRoot(data)) => current = data.host,
                _ => return None,
            }
        }
    }

    /// Whether `id` is part of a live document (directly or via shadow hosts).
    pub fn is_connected(&self, id: NodeId) -> bool {
        let Some(doc) = self.owner_document(id) else {
            return false;
        };
        match self.document_data(doc).and_then(|d| d.frame_element) {
            None => doc == self.main_document,
            Some(iframe) => {
                self.frame_content(iframe) == Some(FrameContent::Loaded(doc))
                    && self.is_connected(iframe)
            }
        }
    }

    pub fn body(&self, doc: NodeId) -> Option<NodeId> {
        let html = self
            .element_children(doc)
            .into_iter()
            .find(|c| self.tag(*c) == Some("html"))?;
        self.element_children(html)
            .into_iter()
            .find(|c| self.tag(*c) == Some("body"))
    }

    pub fn document_element(&self, root: NodeId) -> Option<NodeId> {
        self.element_children(root).into_iter().next()
    }

    pub fn get_element_by_id(&self, root: NodeId, id: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|n| self.element(*n).and_then(|el| el.id()) == Some(id))
    }

    /// Nearest inclusive ancestor (crossing shadow hosts) satisfying `pred`.
    pub fn closest<F>(&self, id: NodeId, pred: F) -> Option<NodeId>
    where
        F: Fn(&ElementData) -> bool,
    {
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(el) = self.element(node) {
                if pred(el) {
                    return Some(node);
                }
            }
            current = match self.node(node).map(|n| &n.kind) {
                Some(NodeKind::ShadowRoot(data)) => Some(data.host),
                _ => self.parent(node),
            };
        }
        None
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(Node {
            kind: NodeKind::Text(text),
            ..
        }) = self.node(id)
        {
            out.push_str(text);
        }
        for child in self.children(id) {
            self.collect_text(*child, out);
        }
    }

    // ------------------------------------------------------------------
    // Tree mutation
    // ------------------------------------------------------------------

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(Node::new(NodeKind::Element(ElementData::new(tag))))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_at(parent, child, None)
    }

    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: NodeId,
    ) -> Result<(), DomError> {
        let idx = self
            .children(parent)
            .iter()
            .position(|c| *c == reference)
            .ok_or(DomError::NotAChild { parent, child: reference })?;
        self.insert_at(parent, child, Some(idx))
    }

    fn insert_at(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: Option<usize>,
    ) -> Result<(), DomError> {
        if self.node(parent).is_none() || self.node(child).is_none() {
            return Err(DomError::UnknownNode(child));
        }
        if matches!(self.node(parent).map(|n| &n.kind), Some(NodeKind::Text(_))) {
            return Err(DomError::NotAContainer(parent));
        }
        self.detach(child);
        self.link(parent, child, before);
        self.mutations.push(MutationRecord::NodeAdded(child));
        Ok(())
    }

    /// Create `<tag>` with the given attributes and append it to `parent`.
    pub fn append(
        &mut self,
        parent: NodeId,
        tag: &str,
        attrs: &[(&str, &str)],
    ) -> Result<NodeId, DomError> {
        let id = self.create_element(tag);
        {
            let el = self.element_mut(id)?;
            for (k, v) in attrs {
                el.set_attr(k, v);
            }
            if let Some(v) = el.attr("value").map(str::to_string) {
                el.value = v;
            }
            el.checked = el.has_attr("checked");
            el.rect = Rect::new(0.0, 0.0, 100.0, 20.0);
        }
        self.append_child(parent, id)?;
        Ok(id)
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Result<NodeId, DomError> {
        let id = self.push(Node::new(NodeKind::Text(text.to_string())));
        self.append_child(parent, id)?;
        Ok(id)
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(old) = self.nodes[child.0].parent.take() {
            self.nodes[old.0].children.retain(|c| *c != child);
        }
    }

    pub fn remove(&mut self, id: NodeId) {
        if self.parent(id).is_some() {
            self.detach(id);
            self.mutations.push(MutationRecord::NodeRemoved(id));
        }
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.element_mut(id)?.set_attr(name, value);
        Ok(())
    }

    pub fn set_value(&mut self, id: NodeId, value: &str) -> Result<(), DomError> {
        self.element_mut(id)?.value = value.to_string();
        Ok(())
    }

    pub fn set_checked(&mut self, id: NodeId, checked: bool) -> Result<(), DomError> {
        self.element_mut(id)?.checked = checked;
        Ok(())
    }

    pub fn set_rect(&mut self, id: NodeId, rect: Rect) -> Result<(), DomError> {
        self.element_mut(id)?.rect = rect;
        Ok(())
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<(), DomError> {
        if !self.is_connected(id) {
            return Err(DomError::Detached(id));
        }
        let el = self.element_mut(id)?;
        if !el.has_class(class) {
            let mut classes: Vec<String> = el.class_list().iter().map(|c| c.to_string()).collect();
            classes.push(class.to_string());
            el.set_attr("class", &classes.join(" "));
        }
        Ok(())
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<(), DomError> {
        if !self.is_connected(id) {
            return Err(DomError::Detached(id));
        }
        let el = self.element_mut(id)?;
        let classes: Vec<String> = el
            .class_list()
            .iter()
            .filter(|c| **c != class)
            .map(|c| c.to_string())
            .collect();
        if classes.is_empty() {
            el.remove_attr("class");
        } else {
            el.set_attr("class", &classes.join(" "));
        }
        Ok(())
    }

    pub fn attach_shadow(&mut self, host: NodeId, mode: ShadowMode) -> Result<NodeId, DomError> {
        if self.element(host).ok_or(DomError::NotAnElement(host))?.shadow_root.is_some() {
            return Err(DomError::ShadowAlreadyAttached(host));
        }
        let root = self.push(Node::new(NodeKind::ShadowRoot(ShadowRootData {
            host,
            mode,
            exposed: false,
        })));
        self.element_mut(host)?.shadow_root = Some(root);
        self.mutations
            .push(MutationRecord::ShadowRootAttached { host, root });
        Ok(root)
    }

    /// Make a closed shadow root reachable the way an injected helper
    /// exposes it on its host.
    pub fn expose_shadow_root(&mut self, host: NodeId) -> Result<(), DomError> {
        let root = self
            .element(host)
            .and_then(|el| el.shadow_root)
            .ok_or(DomError::NoShadowRoot(host))?;
        if let Some(NodeKind::ShadowRoot(data)) = self.nodes.get_mut(root.0).map(|n| &mut n.kind) {
            data.exposed = true;
        }
        Ok(())
    }

    /// Shadow root of `host` if script-accessible (open, or closed but exposed).
    pub fn accessible_shadow_root(&self, host: NodeId) -> Option<NodeId> {
        let root = self.element(host)?.shadow_root?;
        let data = self.shadow_root_data(root)?;
        match data.mode {
            ShadowMode::Open => Some(root),
            ShadowMode::Closed if data.exposed => Some(root),
            ShadowMode::Closed => None,
        }
    }

    pub fn frame_content(&self, iframe: NodeId) -> Option<FrameContent> {
        self.element(iframe).and_then(|el| el.frame)
    }

    /// Load a same-origin document into `iframe` and return it.
    pub fn load_frame(&mut self, iframe: NodeId, url: &str) -> Result<NodeId, DomError> {
        if self.frame_content(iframe).is_none() {
            return Err(DomError::NotAFrame(iframe));
        }
        let doc = self.new_document(url);
        let rect = self.element(iframe).map(|el| el.rect).unwrap_or_default();
        {
            let data = self.document_data_mut(doc)?;
            data.frame_element = Some(iframe);
            data.viewport = Rect::new(0.0, 0.0, rect.width, rect.height);
        }
        self.element_mut(iframe)?.frame = Some(FrameContent::Loaded(doc));
        self.mutations
            .push(MutationRecord::FrameLoaded { iframe, document: doc });
        Ok(doc)
    }

    pub fn set_cross_origin(&mut self, iframe: NodeId) -> Result<(), DomError> {
        let el = self.element_mut(iframe)?;
        if el.frame.is_none() {
            return Err(DomError::NotAFrame(iframe));
        }
        el.frame = Some(FrameContent::CrossOrigin);
        Ok(())
    }

    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    /// Number of iframe hops between `doc` and the top document.
    pub fn frame_depth(&self, doc: NodeId) -> usize {
        let mut depth = 0;
        let mut current = doc;
        while let Some(iframe) = self.document_data(current).and_then(|d| d.frame_element) {
            depth += 1;
            match self.owner_document(iframe) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        depth
    }
}
