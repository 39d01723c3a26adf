//! [`HostDocument`] over the browser DOM.
//!
//! Live nodes are kept in an id table. Each tracked node also carries its id in
//! the `__antNodeId` JS property so nodes reached through `childNodes` or
//! `querySelector` map back to the same handle.

use ant_dom::{is_valid_attribute_name, DomError, DomResult, HostDocument, ListenerId, NodeId, NodeKind};
use ant_vdom::{Event, EventHandler};
use js_sys::Reflect;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use tracing::{debug, trace};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, EventTarget, HtmlElement, HtmlInputElement, HtmlSelectElement, HtmlTextAreaElement, Node};

const NODE_ID_PROPERTY: &str = "__antNodeId";

struct Listener {
    node: NodeId,
    event: String,
    closure: Closure<dyn FnMut(web_sys::Event)>,
}

pub struct WebDocument {
    document: Document,
    root: NodeId,
    nodes: RefCell<HashMap<NodeId, Node>>,
    listeners: RefCell<HashMap<ListenerId, Listener>>,
    next_node: Cell<u64>,
    next_listener: Cell<u64>,
}

impl WebDocument {
    /// Document of the current window, rooted at `<body>`
    pub fn new() -> DomResult<Self> {
        let document = web_sys::window()
            .and_then(|window| window.document())
            .ok_or_else(|| DomError::host("no window document"))?;
        Self::from_document(document)
    }

    pub fn from_document(document: Document) -> DomResult<Self> {
        let body = document.body().ok_or_else(|| DomError::host("document has no body"))?;
        let web = Self {
            document,
            root: NodeId(0),
            nodes: RefCell::new(HashMap::new()),
            listeners: RefCell::new(HashMap::new()),
            next_node: Cell::new(1),
            next_listener: Cell::new(1),
        };
        let root = web.track(body.as_ref());
        Ok(Self { root, ..web })
    }

    /// Browser node behind `id`
    pub fn node(&self, id: NodeId) -> DomResult<Node> {
        self.nodes.borrow().get(&id).cloned().ok_or(DomError::UnknownNode(id))
    }

    pub fn element(&self, id: NodeId) -> DomResult<Element> {
        self.node(id)?.dyn_into::<Element>().map_err(|_| DomError::NotAnElement(id))
    }

    /// Number of nodes with a live handle
    pub fn tracked(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn inner_html(&self, id: NodeId) -> DomResult<String> {
        Ok(self.element(id)?.inner_html())
    }

    /// Handle for `node`, assigning one on first sight
    fn track(&self, node: &Node) -> NodeId {
        let known = Reflect::get(node, &JsValue::from_str(NODE_ID_PROPERTY))
            .ok()
            .and_then(|value| value.as_f64())
            .map(|raw| NodeId(raw as u64));
        if let Some(id) = known {
            // another document on the page may have tagged the node
            if self.nodes.borrow().get(&id) == Some(node) {
                return id;
            }
        }

        let id = NodeId(self.next_node.get());
        self.next_node.set(id.0 + 1);
        if let Err(err) = Reflect::set(node, &JsValue::from_str(NODE_ID_PROPERTY), &JsValue::from_f64(id.0 as f64)) {
            debug!(error = ?err, "Could not tag node with its id");
        }
        self.nodes.borrow_mut().insert(id, node.clone());
        id
    }

    fn style(&self, id: NodeId) -> DomResult<web_sys::CssStyleDeclaration> {
        self.node(id)?
            .dyn_into::<HtmlElement>()
            .map(|element| element.style())
            .map_err(|_| DomError::NotAnElement(id))
    }
}

fn host_error(err: JsValue) -> DomError {
    DomError::host(err.as_string().unwrap_or_else(|| format!("{:?}", err)))
}

/// Current value of a form control
fn control_value(target: &EventTarget) -> Option<String> {
    if let Some(input) = target.dyn_ref::<HtmlInputElement>() {
        return Some(input.value());
    }
    if let Some(area) = target.dyn_ref::<HtmlTextAreaElement>() {
        return Some(area.value());
    }
    target.dyn_ref::<HtmlSelectElement>().map(HtmlSelectElement::value)
}

fn set_control_value(node: &Node, value: &str) -> bool {
    if let Some(input) = node.dyn_ref::<HtmlInputElement>() {
        input.set_value(value);
    } else if let Some(area) = node.dyn_ref::<HtmlTextAreaElement>() {
        area.set_value(value);
    } else if let Some(select) = node.dyn_ref::<HtmlSelectElement>() {
        select.set_value(value);
    } else {
        return false;
    }
    true
}

impl HostDocument for WebDocument {
    fn root(&self) -> NodeId {
        self.root
    }

    fn create_element(&self, tag: &str) -> DomResult<NodeId> {
        if !is_valid_attribute_name(tag) {
            return Err(DomError::InvalidName(tag.to_string()));
        }
        let element = self.document.create_element(tag).map_err(host_error)?;
        Ok(self.track(element.as_ref()))
    }

    fn create_text(&self, content: &str) -> DomResult<NodeId> {
        let text = self.document.create_text_node(content);
        Ok(self.track(text.as_ref()))
    }

    fn kind(&self, node: NodeId) -> DomResult<NodeKind> {
        match self.node(node)?.node_type() {
            Node::TEXT_NODE => Ok(NodeKind::Text),
            _ => Ok(NodeKind::Element),
        }
    }

    fn tag_name(&self, node: NodeId) -> DomResult<Option<String>> {
        let node = self.node(node)?;
        Ok(node.dyn_ref::<Element>().map(|element| element.tag_name().to_lowercase()))
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.node(node).ok()?.parent_node()?;
        Some(self.track(&parent))
    }

    fn children(&self, node: NodeId) -> DomResult<Vec<NodeId>> {
        let list = self.node(node)?.child_nodes();
        let mut children = Vec::with_capacity(list.length() as usize);
        for index in 0..list.length() {
            let Some(child) = list.item(index) else {
                continue;
            };
            // comments and other markup the app never created are skipped
            if matches!(child.node_type(), Node::ELEMENT_NODE | Node::TEXT_NODE) {
                children.push(self.track(&child));
            }
        }
        Ok(children)
    }

    fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> DomResult<()> {
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;
        let reference = reference.map(|id| self.node(id)).transpose()?;
        if child_node.contains(Some(&parent_node)) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if let Some(reference) = &reference {
            if reference.parent_node().as_ref() != Some(&parent_node) {
                return Err(DomError::NotAChild {
                    parent,
                    child: self.track(reference),
                });
            }
        }
        parent_node
            .insert_before(&child_node, reference.as_ref())
            .map(|_| ())
            .map_err(host_error)
    }

    fn remove_child(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;
        if child_node.parent_node().as_ref() != Some(&parent_node) {
            return Err(DomError::NotAChild { parent, child });
        }
        parent_node.remove_child(&child_node).map(|_| ()).map_err(host_error)
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> DomResult<()> {
        if !is_valid_attribute_name(name) {
            return Err(DomError::InvalidName(name.to_string()));
        }
        self.element(node)?.set_attribute(name, value).map_err(host_error)
    }

    fn remove_attribute(&self, node: NodeId, name: &str) -> DomResult<()> {
        self.element(node)?.remove_attribute(name).map_err(host_error)
    }

    fn set_value(&self, node: NodeId, value: &str) -> DomResult<()> {
        let element = self.element(node)?;
        if set_control_value(&element, value) {
            Ok(())
        } else {
            element.set_attribute("value", value).map_err(host_error)
        }
    }

    fn set_class_name(&self, node: NodeId, class_name: &str) -> DomResult<()> {
        self.element(node)?.set_class_name(class_name);
        Ok(())
    }

    fn set_style(&self, node: NodeId, property: &str, value: &str) -> DomResult<()> {
        self.style(node)?.set_property(property, value).map_err(host_error)
    }

    fn add_event_listener(&self, node: NodeId, event: &str, handler: EventHandler) -> DomResult<ListenerId> {
        let target = self.node(node)?;
        let closure = Closure::<dyn FnMut(web_sys::Event)>::new(move |raw: web_sys::Event| {
            let mut event = Event::new(raw.type_());
            if let Some(value) = raw.target().as_ref().and_then(control_value) {
                event = event.with_value(value);
            }
            handler.call(&event);
        });
        target
            .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
            .map_err(host_error)?;

        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().insert(
            id,
            Listener {
                node,
                event: event.to_string(),
                closure,
            },
        );
        trace!(node = node.0, event, listener = id.0, "Added listener");
        Ok(id)
    }

    fn remove_event_listener(&self, node: NodeId, event: &str, listener: ListenerId) -> DomResult<()> {
        let entry = {
            let mut listeners = self.listeners.borrow_mut();
            match listeners.get(&listener) {
                Some(entry) if entry.node == node && entry.event == event => listeners.remove(&listener),
                _ => None,
            }
        };
        let entry = entry.ok_or(DomError::UnknownListener(listener))?;
        self.node(node)?
            .remove_event_listener_with_callback(event, entry.closure.as_ref().unchecked_ref())
            .map_err(host_error)
    }

    fn reset_element(&self, node: NodeId) -> DomResult<()> {
        let element = self.element(node)?;
        for name in element.get_attribute_names().iter() {
            if let Some(name) = name.as_string() {
                element.remove_attribute(&name).map_err(host_error)?;
            }
        }
        set_control_value(&element, "");

        let attached: Vec<(ListenerId, String)> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(_, entry)| entry.node == node)
            .map(|(id, entry)| (*id, entry.event.clone()))
            .collect();
        for (id, event) in attached {
            self.remove_event_listener(node, &event, id)?;
        }
        self.clear_children(node)
    }

    fn query(&self, selector: &str) -> Option<NodeId> {
        let element = self.document.query_selector(selector).ok().flatten()?;
        Some(self.track(element.as_ref()))
    }

    fn forget(&self, node: NodeId) {
        if node == self.root {
            return;
        }
        let detached = self.node(node).map(|n| n.parent_node().is_none()).unwrap_or(false);
        if detached {
            self.nodes.borrow_mut().remove(&node);
        }
    }
}
