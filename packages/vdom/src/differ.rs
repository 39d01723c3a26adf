//! # Keyed VNode differ
//!
//! Compares an old tree against a new one and describes the difference as
//! [`Patch`] values. Neither operand is mutated.
//!
//! ## Child reconciliation
//!
//! Children are matched by identity key: the explicit `key` prop when present,
//! otherwise the child's position. The new list is walked once:
//!
//! - a matched child is diffed recursively and the result tagged with its new index;
//! - a matched child whose old position lies before the highest old position
//!   consumed so far gets a `Move` from its old position to its new one;
//! - an unmatched new child gets a `Create`;
//! - old children left unmatched get a `Remove`, in old order, after the walk.
//!
//! This is a single linear pass. It does not compute a minimal set of moves: a
//! full reversal of `n` keyed children emits `n - 1` moves.
//!
//! Unkeyed children match by position, so reordering them is reported as
//! content changes at each index rather than as moves.

use crate::patch::{Patch, PropPatch};
use crate::vnode::{Props, VNode};
use std::collections::HashMap;
use tracing::{instrument, trace, warn};

/// Diff two optional trees.
///
/// Returns `None` when the trees are equivalent. The root patch is tagged with
/// index 0, the position of the root under its container.
#[instrument(level = "trace", skip_all)]
pub fn diff(old: Option<&VNode>, new: Option<&VNode>) -> Option<Patch> {
    let patch = diff_at(old, new, 0);
    trace!(
        changed = patch.is_some(),
        patch_count = patch.as_ref().map(Patch::count).unwrap_or(0),
        "Diffed trees"
    );
    patch
}

fn diff_at(old: Option<&VNode>, new: Option<&VNode>, index: usize) -> Option<Patch> {
    match (old, new) {
        (None, None) => None,
        (None, Some(node)) => Some(Patch::Create {
            node: node.clone(),
            index,
        }),
        (Some(_), None) => Some(Patch::Remove { index }),
        (Some(old_node), Some(new_node)) => diff_nodes(old_node, new_node, index),
    }
}

fn diff_nodes(old: &VNode, new: &VNode, index: usize) -> Option<Patch> {
    match (old, new) {
        (VNode::Text { content: old_text }, VNode::Text { content: new_text }) => {
            if old_text == new_text {
                None
            } else {
                Some(replace(old, new, index))
            }
        }
        (
            VNode::Element {
                tag: old_tag,
                props: old_props,
                children: old_children,
            },
            VNode::Element {
                tag: new_tag,
                props: new_props,
                children: new_children,
            },
        ) => {
            if old_tag != new_tag {
                return Some(replace(old, new, index));
            }

            let prop_patches = diff_props(old_props, new_props);
            let child_patches = diff_children(old_children, new_children);

            match (prop_patches.is_empty(), child_patches.is_empty()) {
                (true, true) => None,
                (false, true) => Some(Patch::UpdateProps {
                    diffs: prop_patches,
                    index,
                }),
                (true, false) => Some(Patch::UpdateChildren {
                    patches: child_patches,
                    index,
                }),
                (false, false) => Some(Patch::Update {
                    patches: vec![
                        Patch::UpdateProps {
                            diffs: prop_patches,
                            index,
                        },
                        Patch::UpdateChildren {
                            patches: child_patches,
                            index,
                        },
                    ],
                    index,
                }),
            }
        }
        (VNode::Component(old_ref), VNode::Component(new_ref)) => {
            if old_ref.id != new_ref.id {
                Some(replace(old, new, index))
            } else if old_ref == new_ref {
                None
            } else {
                Some(Patch::UpdateComponent {
                    old: old_ref.clone(),
                    new: new_ref.clone(),
                    index,
                })
            }
        }
        _ => Some(replace(old, new, index)),
    }
}

fn replace(old: &VNode, new: &VNode, index: usize) -> Patch {
    Patch::Replace {
        old: old.clone(),
        new: new.clone(),
        index,
    }
}

/// Prop-level diff.
///
/// Keys whose value is not identical in `new` produce `Set`, keys missing from
/// `new` produce `Remove`. Output is ordered by key.
pub fn diff_props(old: &Props, new: &Props) -> Vec<PropPatch> {
    let mut patches = Vec::new();

    for (key, value) in new {
        if old.get(key) != Some(value) {
            patches.push(PropPatch::Set {
                key: key.clone(),
                value: value.clone(),
            });
        }
    }

    for key in old.keys() {
        if !new.contains_key(key) {
            patches.push(PropPatch::Remove { key: key.clone() });
        }
    }

    patches
}

/// Identity of a child among its siblings. Explicit keys and positions never
/// match each other, so `key=1` and the unkeyed child at index 1 stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Identity {
    Key(String),
    Index(usize),
}

fn identity(child: &VNode, index: usize) -> Identity {
    match child.key() {
        Some(key) => Identity::Key(key),
        None => Identity::Index(index),
    }
}

/// Child-level diff using the keyed single-pass walk described in the module docs.
pub fn diff_children(old: &[VNode], new: &[VNode]) -> Vec<Patch> {
    let mut patches = Vec::new();

    // Later siblings win a duplicated key; the shadowed ones are never
    // matched and fall through to removal.
    let mut old_by_key: HashMap<Identity, usize> = HashMap::with_capacity(old.len());
    for (i, child) in old.iter().enumerate() {
        let key = identity(child, i);
        if let Some(shadowed) = old_by_key.insert(key, i) {
            warn!(
                shadowed_index = shadowed,
                index = i,
                key = ?child.key(),
                "Duplicate key among siblings"
            );
        }
    }

    let mut consumed = vec![false; old.len()];
    let mut last_index = 0;

    for (new_index, new_child) in new.iter().enumerate() {
        let key = identity(new_child, new_index);

        match old_by_key.remove(&key) {
            Some(old_index) => {
                consumed[old_index] = true;

                if let Some(patch) = diff_at(Some(&old[old_index]), Some(new_child), new_index) {
                    patches.push(patch);
                }

                if old_index < last_index {
                    patches.push(Patch::Move {
                        from: old_index,
                        to: new_index,
                    });
                } else {
                    last_index = old_index;
                }
            }
            None => patches.push(Patch::Create {
                node: new_child.clone(),
                index: new_index,
            }),
        }
    }

    for (old_index, _) in consumed.iter().enumerate().filter(|(_, done)| !**done) {
        patches.push(Patch::Remove { index: old_index });
    }

    patches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{EventHandler, Value};
    use crate::vnode::{ComponentId, ComponentRef};

    fn item(key: i32, label: &str) -> VNode {
        VNode::element("li").with_key(key).with_child(VNode::text(label))
    }

    fn list(children: Vec<VNode>) -> VNode {
        VNode::element("ul").with_children(children)
    }

    fn child_patches(patch: Option<Patch>) -> Vec<Patch> {
        match patch {
            Some(Patch::UpdateChildren { patches, .. }) => patches,
            other => panic!("Expected UpdateChildren, got {:?}", other),
        }
    }

    #[test]
    fn test_diff_create_and_remove_at_root() {
        let node = VNode::element("div");
        assert_eq!(
            diff(None, Some(&node)),
            Some(Patch::Create {
                node: node.clone(),
                index: 0
            })
        );
        assert_eq!(diff(Some(&node), None), Some(Patch::Remove { index: 0 }));
        assert_eq!(diff(None, None), None);
    }

    #[test]
    fn test_diff_identical_tree_is_none() {
        let handler = EventHandler::new(|_| {});
        let tree = VNode::element("section")
            .with_prop("id", "main")
            .with_style("color", "red")
            .on("click", handler)
            .with_child(list(vec![item(1, "a"), item(2, "b")]))
            .with_child(VNode::component(
                ComponentRef::new(ComponentId(1), "Card").with_prop("title", "x"),
            ))
            .with_child(VNode::text("tail"));

        assert_eq!(diff(Some(&tree), Some(&tree)), None);
        let copy = tree.clone();
        assert_eq!(diff(Some(&tree), Some(&copy)), None);
    }

    #[test]
    fn test_type_mismatch_replaces() {
        let text = VNode::text("a");
        let element = VNode::element("span");
        assert!(matches!(
            diff(Some(&text), Some(&element)),
            Some(Patch::Replace { index: 0, .. })
        ));
        assert!(matches!(
            diff(Some(&VNode::element("div")), Some(&element)),
            Some(Patch::Replace { .. })
        ));
        assert!(matches!(
            diff(Some(&text), Some(&VNode::text("b"))),
            Some(Patch::Replace { .. })
        ));
    }

    #[test]
    fn test_prop_diff_set_and_remove() {
        let old: Props = [
            ("a".to_string(), Value::from(1)),
            ("b".to_string(), Value::from(2)),
        ]
        .into();
        let new: Props = [
            ("a".to_string(), Value::from(1)),
            ("c".to_string(), Value::from(3)),
        ]
        .into();

        let patches = diff_props(&old, &new);
        assert_eq!(
            patches,
            vec![
                PropPatch::Set {
                    key: "c".into(),
                    value: Value::from(3)
                },
                PropPatch::Remove { key: "b".into() },
            ]
        );
    }

    #[test]
    fn test_props_and_children_grouped() {
        let old = VNode::element("p").with_prop("class", "a").with_child(VNode::text("x"));
        let new = VNode::element("p").with_prop("class", "b").with_child(VNode::text("y"));

        match diff(Some(&old), Some(&new)) {
            Some(Patch::Update { patches, index: 0 }) => {
                assert!(matches!(patches[0], Patch::UpdateProps { .. }));
                assert!(matches!(patches[1], Patch::UpdateChildren { .. }));
            }
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn test_keyed_swap_is_single_move() {
        let old = list(vec![item(1, "A"), item(2, "B")]);
        let new = list(vec![item(2, "B"), item(1, "A")]);

        let patches = child_patches(diff(Some(&old), Some(&new)));
        assert_eq!(patches, vec![Patch::Move { from: 0, to: 1 }]);
    }

    #[test]
    fn test_unkeyed_swap_is_replacement() {
        let old = list(vec![VNode::text("X"), VNode::text("Y")]);
        let new = list(vec![VNode::text("Y"), VNode::text("X")]);

        let patches = child_patches(diff(Some(&old), Some(&new)));
        assert_eq!(patches.len(), 2);
        assert!(matches!(patches[0], Patch::Replace { index: 0, .. }));
        assert!(matches!(patches[1], Patch::Replace { index: 1, .. }));
        assert!(!patches.iter().any(|p| matches!(p, Patch::Move { .. })));
    }

    #[test]
    fn test_insert_and_remove_keyed() {
        let old = list(vec![item(1, "A"), item(2, "B"), item(3, "C")]);
        let new = list(vec![item(2, "B"), item(4, "D"), item(3, "C")]);

        let patches = child_patches(diff(Some(&old), Some(&new)));
        assert_eq!(patches.len(), 2);
        assert!(matches!(patches[0], Patch::Create { index: 1, .. }));
        assert_eq!(patches[1], Patch::Remove { index: 0 });
    }

    #[test]
    fn test_reversal_emits_redundant_moves() {
        let old = list((1..=4).map(|k| item(k, "v")).collect());
        let new = list((1..=4).rev().map(|k| item(k, "v")).collect());

        let patches = child_patches(diff(Some(&old), Some(&new)));
        assert_eq!(
            patches,
            vec![
                Patch::Move { from: 2, to: 1 },
                Patch::Move { from: 1, to: 2 },
                Patch::Move { from: 0, to: 3 },
            ]
        );
    }

    #[test]
    fn test_moved_child_diff_precedes_move() {
        let old = list(vec![item(1, "A"), item(2, "B")]);
        let new = list(vec![item(2, "B"), item(1, "A2")]);

        let patches = child_patches(diff(Some(&old), Some(&new)));
        assert_eq!(patches.len(), 2);
        assert!(matches!(patches[0], Patch::UpdateChildren { index: 1, .. }));
        assert_eq!(patches[1], Patch::Move { from: 0, to: 1 });
    }

    #[test]
    fn test_duplicate_old_keys_remove_shadowed() {
        let old = list(vec![item(1, "first"), item(1, "second")]);
        let new = list(vec![item(1, "second")]);

        let patches = child_patches(diff(Some(&old), Some(&new)));
        assert_eq!(patches, vec![Patch::Remove { index: 0 }]);
    }

    #[test]
    fn test_explicit_key_does_not_match_position() {
        let tree = list(vec![item(1, "A"), VNode::text("tail")]);
        assert_eq!(diff(Some(&tree), Some(&tree.clone())), None);

        let changed = list(vec![item(1, "A"), VNode::text("other")]);
        let patches = child_patches(diff(Some(&tree), Some(&changed)));
        assert_eq!(patches.len(), 1);
        assert!(matches!(patches[0], Patch::Replace { index: 1, .. }));
    }

    #[test]
    fn test_component_ref_delegates() {
        let old = VNode::component(ComponentRef::new(ComponentId(7), "Card").with_prop("n", 1));
        let new = VNode::component(ComponentRef::new(ComponentId(7), "Card").with_prop("n", 2));
        let other = VNode::component(ComponentRef::new(ComponentId(8), "Card").with_prop("n", 2));

        assert!(matches!(
            diff(Some(&old), Some(&new)),
            Some(Patch::UpdateComponent { index: 0, .. })
        ));
        assert!(matches!(diff(Some(&new), Some(&other)), Some(Patch::Replace { .. })));
    }

    #[test]
    fn test_unrelated_subtree_untouched() {
        let old = VNode::element("div")
            .with_child(VNode::element("header").with_child(VNode::text("title")))
            .with_child(VNode::element("main").with_child(VNode::text("0")));
        let new = VNode::element("div")
            .with_child(VNode::element("header").with_child(VNode::text("title")))
            .with_child(VNode::element("main").with_child(VNode::text("1")));

        let patches = child_patches(diff(Some(&old), Some(&new)));
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].index(), 1);
    }
}
