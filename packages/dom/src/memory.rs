//! In-process document used for headless rendering and tests.
//!
//! Behaves like the browser DOM for everything the patcher relies on:
//! re-inserting an attached node moves it, attribute names are validated, and
//! listeners bubble from the target to its ancestors on dispatch.

use crate::host::{is_valid_attribute_name, DomError, DomResult, HostDocument, ListenerId, NodeId, NodeKind};
use ant_vdom::{Event, EventHandler};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

enum NodeData {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
        style: BTreeMap<String, String>,
        value: Option<String>,
        listeners: Vec<(ListenerId, String, EventHandler)>,
    },
    Text {
        content: String,
    },
}

struct MemoryNode {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct Arena {
    nodes: HashMap<NodeId, MemoryNode>,
    next_node: u64,
    next_listener: u64,
    root: NodeId,
}

impl Arena {
    fn node(&self, id: NodeId) -> DomResult<&MemoryNode> {
        self.nodes.get(&id).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> DomResult<&mut MemoryNode> {
        self.nodes.get_mut(&id).ok_or(DomError::UnknownNode(id))
    }

    fn insert(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(
            id,
            MemoryNode {
                data,
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    fn is_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes.get(&node).and_then(|n| n.parent) {
                Some(parent) => node = parent,
                None => return false,
            }
        }
    }

    fn detach(&mut self, child: NodeId) -> DomResult<()> {
        let parent = self.node(child)?.parent;
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|c| *c != child);
            self.node_mut(child)?.parent = None;
        }
        Ok(())
    }

    fn element_mut(&mut self, id: NodeId) -> DomResult<&mut NodeData> {
        let node = self.node_mut(id)?;
        match node.data {
            NodeData::Element { .. } => Ok(&mut node.data),
            NodeData::Text { .. } => Err(DomError::NotAnElement(id)),
        }
    }
}

pub struct MemoryDocument {
    arena: RefCell<Arena>,
}

impl MemoryDocument {
    /// New document with an empty `body` root
    pub fn new() -> Self {
        let mut arena = Arena {
            nodes: HashMap::new(),
            next_node: 1,
            next_listener: 1,
            root: NodeId(0),
        };
        let root = arena.insert(NodeData::Element {
            tag: "body".to_string(),
            attributes: BTreeMap::new(),
            style: BTreeMap::new(),
            value: None,
            listeners: Vec::new(),
        });
        arena.root = root;
        Self {
            arena: RefCell::new(arena),
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.arena.borrow().nodes.get(&node)?.data {
            NodeData::Element { attributes, .. } => attributes.get(name).cloned(),
            NodeData::Text { .. } => None,
        }
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        match &self.arena.borrow().nodes.get(&node)?.data {
            NodeData::Element { style, .. } => style.get(property).cloned(),
            NodeData::Text { .. } => None,
        }
    }

    pub fn value(&self, node: NodeId) -> Option<String> {
        match &self.arena.borrow().nodes.get(&node)?.data {
            NodeData::Element { value, .. } => value.clone(),
            NodeData::Text { .. } => None,
        }
    }

    pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
        match self.arena.borrow().nodes.get(&node).map(|n| &n.data) {
            Some(NodeData::Element { listeners, .. }) => {
                listeners.iter().filter(|(_, name, _)| name == event).count()
            }
            _ => 0,
        }
    }

    /// Concatenated text of the subtree
    pub fn text_content(&self, node: NodeId) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        collect_text(&arena, node, &mut out);
        out
    }

    /// Dispatch an event at `target`, bubbling through ancestors.
    /// Returns the number of handlers invoked.
    pub fn dispatch(&self, target: NodeId, event: &Event) -> usize {
        let handlers: Vec<EventHandler> = {
            let arena = self.arena.borrow();
            let mut handlers = Vec::new();
            let mut current = Some(target);
            while let Some(id) = current {
                let Some(node) = arena.nodes.get(&id) else {
                    break;
                };
                if let NodeData::Element { listeners, .. } = &node.data {
                    handlers.extend(
                        listeners
                            .iter()
                            .filter(|(_, name, _)| *name == event.name)
                            .map(|(_, _, handler)| handler.clone()),
                    );
                }
                current = node.parent;
            }
            handlers
        };

        for handler in &handlers {
            handler.call(event);
        }
        handlers.len()
    }

    /// Serialize the subtree rooted at `node` as HTML
    pub fn to_html(&self, node: NodeId) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        write_html(&arena, node, &mut out);
        out
    }

    /// Serialize only the children of `node`
    pub fn inner_html(&self, node: NodeId) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        if let Some(n) = arena.nodes.get(&node) {
            for child in &n.children {
                write_html(&arena, *child, &mut out);
            }
        }
        out
    }

    /// Number of nodes the document holds, attached or not
    pub fn node_count(&self) -> usize {
        self.arena.borrow().nodes.len()
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_text(arena: &Arena, node: NodeId, out: &mut String) {
    let Some(n) = arena.nodes.get(&node) else {
        return;
    };
    match &n.data {
        NodeData::Text { content } => out.push_str(content),
        NodeData::Element { .. } => {
            for child in &n.children {
                collect_text(arena, *child, out);
            }
        }
    }
}

fn write_html(arena: &Arena, node: NodeId, out: &mut String) {
    let Some(n) = arena.nodes.get(&node) else {
        return;
    };
    match &n.data {
        NodeData::Text { content } => out.push_str(&escape(content)),
        NodeData::Element {
            tag,
            attributes,
            style,
            ..
        } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attributes {
                out.push_str(&format!(" {}=\"{}\"", name, escape(value)));
            }
            if !style.is_empty() {
                let inline = style
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect::<Vec<_>>()
                    .join("; ");
                out.push_str(&format!(" style=\"{}\"", escape(&inline)));
            }
            out.push('>');
            for child in &n.children {
                write_html(arena, *child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn matches_selector(data: &NodeData, selector: &str) -> bool {
    let NodeData::Element { tag, attributes, .. } = data else {
        return false;
    };
    if let Some(id) = selector.strip_prefix('#') {
        attributes.get("id").map(String::as_str) == Some(id)
    } else if let Some(class) = selector.strip_prefix('.') {
        attributes
            .get("class")
            .map(|c| c.split_whitespace().any(|part| part == class))
            .unwrap_or(false)
    } else {
        tag.eq_ignore_ascii_case(selector)
    }
}

impl HostDocument for MemoryDocument {
    fn root(&self) -> NodeId {
        self.arena.borrow().root
    }

    fn create_element(&self, tag: &str) -> DomResult<NodeId> {
        if !is_valid_attribute_name(tag) {
            return Err(DomError::InvalidName(tag.to_string()));
        }
        Ok(self.arena.borrow_mut().insert(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            style: BTreeMap::new(),
            value: None,
            listeners: Vec::new(),
        }))
    }

    fn create_text(&self, content: &str) -> DomResult<NodeId> {
        Ok(self.arena.borrow_mut().insert(NodeData::Text {
            content: content.to_string(),
        }))
    }

    fn kind(&self, node: NodeId) -> DomResult<NodeKind> {
        Ok(match self.arena.borrow().node(node)?.data {
            NodeData::Element { .. } => NodeKind::Element,
            NodeData::Text { .. } => NodeKind::Text,
        })
    }

    fn tag_name(&self, node: NodeId) -> DomResult<Option<String>> {
        Ok(match &self.arena.borrow().node(node)?.data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            NodeData::Text { .. } => None,
        })
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.borrow().nodes.get(&node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> DomResult<Vec<NodeId>> {
        Ok(self.arena.borrow().node(node)?.children.clone())
    }

    fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> DomResult<()> {
        let mut arena = self.arena.borrow_mut();
        if let NodeData::Text { .. } = arena.node(parent)?.data {
            return Err(DomError::NotAnElement(parent));
        }
        arena.node(child)?;
        if arena.is_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if let Some(reference) = reference {
            if arena.node(reference)?.parent != Some(parent) {
                return Err(DomError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }
        if reference == Some(child) {
            return Ok(());
        }

        arena.detach(child)?;
        let siblings = &mut arena.node_mut(parent)?.children;
        let position = reference
            .and_then(|r| siblings.iter().position(|c| *c == r))
            .unwrap_or(siblings.len());
        siblings.insert(position, child);
        arena.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    fn remove_child(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        let mut arena = self.arena.borrow_mut();
        if arena.node(child)?.parent != Some(parent) {
            return Err(DomError::NotAChild { parent, child });
        }
        arena.detach(child)
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> DomResult<()> {
        if !is_valid_attribute_name(name) {
            return Err(DomError::InvalidName(name.to_string()));
        }
        let mut arena = self.arena.borrow_mut();
        if let NodeData::Element {
            attributes, style, ..
        } = arena.element_mut(node)?
        {
            if name == "style" {
                style.clear();
                for declaration in value.split(';') {
                    if let Some((property, v)) = declaration.split_once(':') {
                        style.insert(property.trim().to_string(), v.trim().to_string());
                    }
                }
            } else {
                attributes.insert(name.to_string(), value.to_string());
            }
        }
        Ok(())
    }

    fn remove_attribute(&self, node: NodeId, name: &str) -> DomResult<()> {
        let mut arena = self.arena.borrow_mut();
        if let NodeData::Element {
            attributes, style, ..
        } = arena.element_mut(node)?
        {
            if name == "style" {
                style.clear();
            } else {
                attributes.remove(name);
            }
        }
        Ok(())
    }

    fn set_value(&self, node: NodeId, new_value: &str) -> DomResult<()> {
        let mut arena = self.arena.borrow_mut();
        if let NodeData::Element { value, .. } = arena.element_mut(node)? {
            *value = Some(new_value.to_string());
        }
        Ok(())
    }

    fn set_class_name(&self, node: NodeId, class_name: &str) -> DomResult<()> {
        self.set_attribute(node, "class", class_name)
    }

    fn set_style(&self, node: NodeId, property: &str, value: &str) -> DomResult<()> {
        let mut arena = self.arena.borrow_mut();
        if let NodeData::Element { style, .. } = arena.element_mut(node)? {
            style.insert(property.to_string(), value.to_string());
        }
        Ok(())
    }

    fn add_event_listener(&self, node: NodeId, event: &str, handler: EventHandler) -> DomResult<ListenerId> {
        let mut arena = self.arena.borrow_mut();
        let id = ListenerId(arena.next_listener);
        arena.next_listener += 1;
        if let NodeData::Element { listeners, .. } = arena.element_mut(node)? {
            listeners.push((id, event.to_string(), handler));
        }
        Ok(id)
    }

    fn remove_event_listener(&self, node: NodeId, event: &str, listener: ListenerId) -> DomResult<()> {
        let mut arena = self.arena.borrow_mut();
        if let NodeData::Element { listeners, .. } = arena.element_mut(node)? {
            let before = listeners.len();
            listeners.retain(|(id, name, _)| !(*id == listener && name == event));
            if listeners.len() == before {
                return Err(DomError::UnknownListener(listener));
            }
        }
        Ok(())
    }

    fn reset_element(&self, node: NodeId) -> DomResult<()> {
        {
            let mut arena = self.arena.borrow_mut();
            if let NodeData::Element {
                attributes,
                style,
                value,
                listeners,
                ..
            } = arena.element_mut(node)?
            {
                attributes.clear();
                style.clear();
                *value = None;
                listeners.clear();
            }
        }
        self.clear_children(node)
    }

    fn forget(&self, node: NodeId) {
        let mut arena = self.arena.borrow_mut();
        let detached = arena
            .nodes
            .get(&node)
            .is_some_and(|n| n.parent.is_none() && n.children.is_empty());
        if detached && node != arena.root {
            arena.nodes.remove(&node);
        }
    }

    fn query(&self, selector: &str) -> Option<NodeId> {
        let arena = self.arena.borrow();
        let mut stack = vec![arena.root];
        while let Some(id) = stack.pop() {
            let node = arena.nodes.get(&id)?;
            if matches_selector(&node.data, selector) {
                return Some(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_insert_moves_attached_node() {
        let doc = MemoryDocument::new();
        let root = doc.root();
        let a = doc.create_text("a").unwrap();
        let b = doc.create_text("b").unwrap();
        doc.append_child(root, a).unwrap();
        doc.append_child(root, b).unwrap();

        doc.insert_before(root, b, Some(a)).unwrap();
        assert_eq!(doc.children(root).unwrap(), vec![b, a]);
        assert_eq!(doc.text_content(root), "ba");
    }

    #[test]
    fn test_rejects_cycles_and_bad_names() {
        let doc = MemoryDocument::new();
        let outer = doc.create_element("div").unwrap();
        let inner = doc.create_element("span").unwrap();
        doc.append_child(outer, inner).unwrap();

        assert!(matches!(
            doc.append_child(inner, outer),
            Err(DomError::HierarchyRequest { .. })
        ));
        assert!(matches!(
            doc.set_attribute(inner, "bad name", "x"),
            Err(DomError::InvalidName(_))
        ));
    }

    #[test]
    fn test_dispatch_bubbles() {
        let doc = MemoryDocument::new();
        let outer = doc.create_element("div").unwrap();
        let button = doc.create_element("button").unwrap();
        doc.append_child(outer, button).unwrap();

        let hits = Rc::new(Cell::new(0));
        for node in [outer, button] {
            let hits = hits.clone();
            doc.add_event_listener(node, "click", EventHandler::new(move |_| hits.set(hits.get() + 1)))
                .unwrap();
        }

        assert_eq!(doc.dispatch(button, &Event::new("click")), 2);
        assert_eq!(hits.get(), 2);
        assert_eq!(doc.dispatch(button, &Event::new("input")), 0);
    }

    #[test]
    fn test_query_and_html() {
        let doc = MemoryDocument::new();
        let app = doc.create_element("div").unwrap();
        doc.set_attribute(app, "id", "app").unwrap();
        doc.set_style(app, "color", "red").unwrap();
        doc.append_child(doc.root(), app).unwrap();
        let text = doc.create_text("a < b").unwrap();
        doc.append_child(app, text).unwrap();

        assert_eq!(doc.query("#app"), Some(app));
        assert_eq!(doc.query("div"), Some(app));
        assert_eq!(doc.query("#missing"), None);
        assert_eq!(
            doc.to_html(app),
            "<div id=\"app\" style=\"color: red\">a &lt; b</div>"
        );
    }

    #[test]
    fn test_reset_element_strips_everything() {
        let doc = MemoryDocument::new();
        let input = doc.create_element("input").unwrap();
        doc.set_attribute(input, "type", "text").unwrap();
        doc.set_value(input, "typed").unwrap();
        doc.add_event_listener(input, "input", EventHandler::new(|_| {}))
            .unwrap();

        doc.reset_element(input).unwrap();
        assert_eq!(doc.attribute(input, "type"), None);
        assert_eq!(doc.value(input), None);
        assert_eq!(doc.listener_count(input, "input"), 0);
    }

    #[test]
    fn test_forget_only_drops_detached_leaves() {
        let doc = MemoryDocument::new();
        let parent = doc.create_element("div").unwrap();
        let child = doc.create_text("x").unwrap();
        doc.append_child(parent, child).unwrap();

        doc.forget(child);
        doc.forget(parent);
        assert_eq!(doc.node_count(), 3);

        doc.remove_child(parent, child).unwrap();
        doc.forget(child);
        doc.forget(parent);
        doc.forget(doc.root());
        assert_eq!(doc.node_count(), 1);
    }
}
