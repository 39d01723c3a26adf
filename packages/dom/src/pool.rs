use crate::host::NodeId;
use std::collections::HashMap;
use tracing::trace;

pub const DEFAULT_CAPACITY_PER_TAG: usize = 64;

/// Detached, reset elements waiting to be reissued, bucketed by tag
#[derive(Debug)]
pub struct ElementPool {
    free: HashMap<String, Vec<NodeId>>,
    capacity_per_tag: usize,
}

impl ElementPool {
    pub fn new(capacity_per_tag: usize) -> Self {
        Self {
            free: HashMap::new(),
            capacity_per_tag,
        }
    }

    /// Keep `node` for reuse. Returns false when the bucket for `tag` is full
    /// and the node should simply be dropped.
    pub fn recycle(&mut self, tag: &str, node: NodeId) -> bool {
        let bucket = self.free.entry(tag.to_string()).or_default();
        if bucket.len() >= self.capacity_per_tag {
            return false;
        }
        bucket.push(node);
        trace!(tag, pooled = bucket.len(), "Recycled element");
        true
    }

    /// Reissue a pooled element for `tag`, most recently recycled first
    pub fn take(&mut self, tag: &str) -> Option<NodeId> {
        self.free.get_mut(tag).and_then(Vec::pop)
    }

    pub fn has_room(&self, tag: &str) -> bool {
        self.len_for(tag) < self.capacity_per_tag
    }

    pub fn len_for(&self, tag: &str) -> usize {
        self.free.get(tag).map(Vec::len).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity_per_tag(&self) -> usize {
        self.capacity_per_tag
    }

    pub fn clear(&mut self) {
        self.free.clear();
    }
}

impl Default for ElementPool {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY_PER_TAG)
    }
}
