use crate::host::{ListenerId, NodeId};
use std::collections::HashMap;

/// Event name for a handler prop: `onClick` listens for `click`
pub fn event_name(prop_key: &str) -> Option<String> {
    let rest = prop_key.strip_prefix("on")?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_ascii_lowercase())
}

/// Side table of the listener currently attached per node and event.
///
/// The host never has to be asked which handler is installed; replacing a
/// handler prop looks the old registration up here and removes it first.
#[derive(Debug, Default)]
pub struct ListenerTable {
    by_node: HashMap<NodeId, HashMap<String, ListenerId>>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `listener` and return the registration it replaces, if any
    pub fn insert(&mut self, node: NodeId, event: &str, listener: ListenerId) -> Option<ListenerId> {
        self.by_node
            .entry(node)
            .or_default()
            .insert(event.to_string(), listener)
    }

    pub fn get(&self, node: NodeId, event: &str) -> Option<ListenerId> {
        self.by_node.get(&node)?.get(event).copied()
    }

    pub fn remove(&mut self, node: NodeId, event: &str) -> Option<ListenerId> {
        let events = self.by_node.get_mut(&node)?;
        let removed = events.remove(event);
        if events.is_empty() {
            self.by_node.remove(&node);
        }
        removed
    }

    /// Forget every registration on `node`, returning them for host cleanup
    pub fn remove_node(&mut self, node: NodeId) -> Vec<(String, ListenerId)> {
        self.by_node
            .remove(&node)
            .map(|events| events.into_iter().collect())
            .unwrap_or_default()
    }

    pub fn count(&self, node: NodeId) -> usize {
        self.by_node.get(&node).map(HashMap::len).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.by_node.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name_from_prop() {
        assert_eq!(event_name("onClick").as_deref(), Some("click"));
        assert_eq!(event_name("oninput").as_deref(), Some("input"));
        assert_eq!(event_name("on"), None);
        assert_eq!(event_name("class"), None);
    }

    #[test]
    fn test_insert_returns_replaced_listener() {
        let mut table = ListenerTable::new();
        let node = NodeId(7);
        assert_eq!(table.insert(node, "click", ListenerId(1)), None);
        assert_eq!(table.insert(node, "click", ListenerId(2)), Some(ListenerId(1)));
        table.insert(node, "input", ListenerId(3));

        assert_eq!(table.get(node, "click"), Some(ListenerId(2)));
        assert_eq!(table.count(node), 2);

        let mut removed = table.remove_node(node);
        removed.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            removed,
            vec![("click".to_string(), ListenerId(2)), ("input".to_string(), ListenerId(3))]
        );
        assert!(table.is_empty());
    }
}
