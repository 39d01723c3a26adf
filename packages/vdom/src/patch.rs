use crate::value::Value;
use crate::vnode::{ComponentRef, VNode};
use serde::{Deserialize, Serialize};

/// A single prop-level change on an element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PropPatch {
    /// Set or overwrite a prop (`SET_PROP`)
    Set { key: String, value: Value },

    /// Remove a prop that disappeared (`REMOVE_PROP`)
    Remove { key: String },
}

impl PropPatch {
    pub fn key(&self) -> &str {
        match self {
            PropPatch::Set { key, .. } | PropPatch::Remove { key } => key,
        }
    }
}

/// Described mutation of the live document.
///
/// Indices are positions among the children of the node the patch list is
/// applied to. For everything except `Move` and `Remove` the index is the
/// position in the *new* child list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Patch {
    /// Build and insert a new node
    Create { node: VNode, index: usize },

    /// Remove the node that was at `index` in the old child list
    Remove { index: usize },

    /// Swap a node for a structurally different one
    Replace { old: VNode, new: VNode, index: usize },

    /// Apply prop changes to an element
    UpdateProps { diffs: Vec<PropPatch>, index: usize },

    /// Apply a child patch list to an element
    UpdateChildren { patches: Vec<Patch>, index: usize },

    /// Relocate an existing node from its old position to its new one
    Move { from: usize, to: usize },

    /// Hand new props and slots to a live component instance
    UpdateComponent {
        old: ComponentRef,
        new: ComponentRef,
        index: usize,
    },

    /// Prop and child changes for the same element, applied in order
    Update { patches: Vec<Patch>, index: usize },
}

impl Patch {
    /// Target position of the patch in the new child list.
    /// `Remove` reports its old position.
    pub fn index(&self) -> usize {
        match self {
            Patch::Create { index, .. }
            | Patch::Remove { index }
            | Patch::Replace { index, .. }
            | Patch::UpdateProps { index, .. }
            | Patch::UpdateChildren { index, .. }
            | Patch::UpdateComponent { index, .. }
            | Patch::Update { index, .. } => *index,
            Patch::Move { to, .. } => *to,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Patch::Create { .. } => "create",
            Patch::Remove { .. } => "remove",
            Patch::Replace { .. } => "replace",
            Patch::UpdateProps { .. } => "update_props",
            Patch::UpdateChildren { .. } => "update_children",
            Patch::Move { .. } => "move",
            Patch::UpdateComponent { .. } => "update_component",
            Patch::Update { .. } => "update",
        }
    }

    /// Total number of patches including nested ones
    pub fn count(&self) -> usize {
        match self {
            Patch::UpdateChildren { patches, .. } | Patch::Update { patches, .. } => {
                1 + patches.iter().map(Patch::count).sum::<usize>()
            }
            _ => 1,
        }
    }
}
