//! # Ant VDOM
//!
//! Virtual node model and the keyed differ used by the Ant reconciliation core.
//!
//! A render function produces a [`VNode`] tree. [`diff`] compares the previous
//! tree with the next one and returns a [`Patch`] describing the mutations the
//! live document needs. Patches are plain data and hold no live node references.

pub mod differ;
pub mod patch;
pub mod value;
pub mod vnode;

pub use differ::{diff, diff_children, diff_props};
pub use patch::{Patch, PropPatch};
pub use value::{Event, EventHandler, Value};
pub use vnode::{
    ComponentId, ComponentRef, Props, Slots, VNode, DEFAULT_SLOT, KEY_PROP, STYLE_PROP,
};
