use ant_vdom::EventHandler;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type DomResult<T> = Result<T, DomError>;

/// Opaque handle to a live node owned by a [`HostDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Handle to a registered event listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomError {
    #[error("Node {0:?} does not exist")]
    UnknownNode(NodeId),

    #[error("Node {0:?} is not an element")]
    NotAnElement(NodeId),

    #[error("Node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("No child at index {index} of {parent:?}")]
    MissingChild { parent: NodeId, index: usize },

    #[error("Cannot insert {child:?} under {parent:?}: it would create a cycle")]
    HierarchyRequest { parent: NodeId, child: NodeId },

    #[error("Invalid name '{0}'")]
    InvalidName(String),

    #[error("Listener {0:?} is not registered")]
    UnknownListener(ListenerId),

    #[error("Component error: {0}")]
    Component(String),

    #[error("Host error: {0}")]
    Host(String),
}

impl DomError {
    pub fn component(message: impl Into<String>) -> Self {
        Self::Component(message.into())
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }
}

/// The live document the patcher mutates.
///
/// Every operation is fallible the way DOM calls can throw. Implementations
/// use interior mutability; the whole core runs on one thread.
pub trait HostDocument {
    /// Container used when no mount root can be resolved
    fn root(&self) -> NodeId;

    fn create_element(&self, tag: &str) -> DomResult<NodeId>;

    fn create_text(&self, content: &str) -> DomResult<NodeId>;

    fn kind(&self, node: NodeId) -> DomResult<NodeKind>;

    /// Lowercase tag name for elements, `None` for text nodes
    fn tag_name(&self, node: NodeId) -> DomResult<Option<String>>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> DomResult<Vec<NodeId>>;

    /// Insert `child` before `reference`, or append when `reference` is `None`.
    /// A child that is already attached somewhere is moved, not copied.
    fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> DomResult<()>;

    fn append_child(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    fn remove_child(&self, parent: NodeId, child: NodeId) -> DomResult<()>;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> DomResult<()>;

    fn remove_attribute(&self, node: NodeId, name: &str) -> DomResult<()>;

    /// Set the `value` property of a form control
    fn set_value(&self, node: NodeId, value: &str) -> DomResult<()>;

    fn set_class_name(&self, node: NodeId, class_name: &str) -> DomResult<()>;

    fn set_style(&self, node: NodeId, property: &str, value: &str) -> DomResult<()>;

    fn add_event_listener(&self, node: NodeId, event: &str, handler: EventHandler) -> DomResult<ListenerId>;

    fn remove_event_listener(&self, node: NodeId, event: &str, listener: ListenerId) -> DomResult<()>;

    /// Strip attributes, inline style, value and children so the element can be reissued
    fn reset_element(&self, node: NodeId) -> DomResult<()>;

    /// Resolve a selector (`#id`, `.class` or a tag name) to the first match
    fn query(&self, selector: &str) -> Option<NodeId>;

    fn clear_children(&self, node: NodeId) -> DomResult<()> {
        for child in self.children(node)? {
            self.remove_child(node, child)?;
        }
        Ok(())
    }

    /// Drop the handle to a detached node that will not be used again
    fn forget(&self, _node: NodeId) {}
}

/// Attribute names the way `setAttribute` accepts them
pub fn is_valid_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '>' | '/' | '=' | '<'))
}
