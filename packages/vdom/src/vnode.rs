use crate::value::{EventHandler, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Element and component props, ordered by key
pub type Props = BTreeMap<String, Value>;

/// Named slot content passed to a component
pub type Slots = BTreeMap<String, Vec<VNode>>;

/// Reserved prop used for list identity
pub const KEY_PROP: &str = "key";

/// Reserved prop holding the inline style sub-mapping
pub const STYLE_PROP: &str = "style";

/// Slot that receives children without an explicit slot name
pub const DEFAULT_SLOT: &str = "default";

/// Identity of a live component instance in the application registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u64);

/// Reference to a live component instance.
///
/// Reconciling a reference never looks inside the instance; the instance
/// re-renders itself with the new props and slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRef {
    pub id: ComponentId,
    pub name: String,
    #[serde(default)]
    pub props: Props,
    #[serde(default)]
    pub slots: Slots,
}

impl ComponentRef {
    pub fn new(id: ComponentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            props: Props::new(),
            slots: Slots::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn with_slot(mut self, name: impl Into<String>, content: Vec<VNode>) -> Self {
        self.slots.entry(name.into()).or_default().extend(content);
        self
    }

    pub fn with_children(self, content: Vec<VNode>) -> Self {
        self.with_slot(DEFAULT_SLOT, content)
    }
}

/// Virtual DOM node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VNode {
    /// Text node
    Text { content: String },

    /// HTML element
    Element {
        tag: String,
        #[serde(default)]
        props: Props,
        #[serde(default)]
        children: Vec<VNode>,
    },

    /// Live component instance
    Component(ComponentRef),
}

impl VNode {
    pub fn element(tag: impl Into<String>) -> Self {
        VNode::Element {
            tag: tag.into(),
            props: Props::new(),
            children: Vec::new(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        VNode::Text {
            content: content.into(),
        }
    }

    pub fn component(reference: ComponentRef) -> Self {
        VNode::Component(reference)
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        match self {
            VNode::Element { ref mut props, .. } => {
                props.insert(key.into(), value.into());
            }
            VNode::Component(ref mut reference) => {
                reference.props.insert(key.into(), value.into());
            }
            VNode::Text { .. } => {}
        }
        self
    }

    pub fn with_key(self, key: impl Into<Value>) -> Self {
        self.with_prop(KEY_PROP, key)
    }

    /// Attach an event handler under `on<event>`
    pub fn on(self, event: &str, handler: EventHandler) -> Self {
        self.with_prop(format!("on{}", event), Value::Handler(handler))
    }

    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        if let VNode::Element { ref mut props, .. } = self {
            let style = props
                .entry(STYLE_PROP.to_string())
                .or_insert_with(|| Value::Map(BTreeMap::new()));
            if !matches!(style, Value::Map(_)) {
                *style = Value::Map(BTreeMap::new());
            }
            if let Value::Map(entries) = style {
                entries.insert(property.into(), value.into());
            }
        }
        self
    }

    pub fn with_child(mut self, child: VNode) -> Self {
        if let VNode::Element {
            ref mut children, ..
        } = self
        {
            children.push(child);
        }
        self
    }

    pub fn with_children(mut self, new_children: Vec<VNode>) -> Self {
        if let VNode::Element {
            ref mut children, ..
        } = self
        {
            children.extend(new_children);
        }
        self
    }

    /// Explicit list key, if the node carries one
    pub fn key(&self) -> Option<String> {
        self.props()
            .and_then(|props| props.get(KEY_PROP))
            .map(Value::to_attribute_string)
    }

    pub fn props(&self) -> Option<&Props> {
        match self {
            VNode::Element { props, .. } => Some(props),
            VNode::Component(reference) => Some(&reference.props),
            VNode::Text { .. } => None,
        }
    }

    pub fn children(&self) -> &[VNode] {
        match self {
            VNode::Element { children, .. } => children,
            _ => &[],
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            VNode::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            VNode::Text { .. } => "text",
            VNode::Element { .. } => "element",
            VNode::Component(_) => "component",
        }
    }

    /// Number of nodes in this subtree, component references count as one
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(VNode::node_count).sum::<usize>()
    }
}

impl From<&str> for VNode {
    fn from(s: &str) -> Self {
        VNode::text(s)
    }
}

impl From<String> for VNode {
    fn from(s: String) -> Self {
        VNode::text(s)
    }
}
