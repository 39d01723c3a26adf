use ant_dom::{
    DetachedContext, DomError, DomResult, HostDocument, MemoryDocument, NodeId, PatchContext, Patcher,
    PatcherOptions,
};
use ant_vdom::{diff, ComponentId, ComponentRef, Event, EventHandler, VNode};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

struct Fixture {
    document: Rc<MemoryDocument>,
    patcher: Patcher,
    root: NodeId,
}

impl Fixture {
    fn new() -> Self {
        let document = Rc::new(MemoryDocument::new());
        let patcher = Patcher::new(document.clone(), PatcherOptions::default());
        let root = document.root();
        Self {
            document,
            patcher,
            root,
        }
    }

    fn mount(&self, tree: &VNode, ctx: &dyn PatchContext) -> NodeId {
        let node = self.patcher.create_node(tree, ctx).unwrap();
        self.document.append_child(self.root, node).unwrap();
        node
    }

    fn update(&self, old: &VNode, new: &VNode, ctx: &dyn PatchContext) {
        if let Some(patch) = diff(Some(old), Some(new)) {
            self.patcher.apply(self.root, &[patch], ctx);
        }
    }

    fn html(&self) -> String {
        self.document.inner_html(self.root)
    }

    /// Fresh render of `tree` in a separate document
    fn expected_html(tree: &VNode) -> String {
        let fresh = Fixture::new();
        fresh.mount(tree, &DetachedContext);
        fresh.html()
    }

    fn nodes_by_key(&self, parent: NodeId) -> HashMap<String, NodeId> {
        self.document
            .children(parent)
            .unwrap()
            .into_iter()
            .filter_map(|child| self.document.attribute(child, "key").map(|key| (key, child)))
            .collect()
    }
}

#[derive(Default)]
struct RecordingContext {
    errors: RefCell<Vec<(DomError, NodeId)>>,
    mounted: RefCell<Vec<(ComponentId, NodeId)>>,
    updated: RefCell<Vec<ComponentRef>>,
    unmounted: RefCell<Vec<ComponentId>>,
}

impl PatchContext for RecordingContext {
    fn mount_component(&self, component: &ComponentRef, container: NodeId) -> DomResult<()> {
        self.mounted.borrow_mut().push((component.id, container));
        Ok(())
    }

    fn update_component(&self, component: &ComponentRef) -> DomResult<()> {
        self.updated.borrow_mut().push(component.clone());
        Ok(())
    }

    fn unmount_component(&self, component: ComponentId) {
        self.unmounted.borrow_mut().push(component);
    }

    fn report_error(&self, error: DomError, node: NodeId) {
        self.errors.borrow_mut().push((error, node));
    }
}

fn list(keys: &[&str]) -> VNode {
    VNode::element("ul").with_children(
        keys.iter()
            .map(|key| VNode::element("li").with_key(*key).with_child(VNode::text(*key)))
            .collect(),
    )
}

fn check_transition(from: &[&str], to: &[&str]) {
    let fixture = Fixture::new();
    let ctx = RecordingContext::default();
    let old = list(from);
    let new = list(to);
    let ul = fixture.mount(&old, &ctx);
    let before = fixture.nodes_by_key(ul);

    fixture.update(&old, &new, &ctx);

    assert_eq!(fixture.html(), Fixture::expected_html(&new), "{:?} -> {:?}", from, to);
    assert!(ctx.errors.borrow().is_empty(), "{:?} -> {:?}", from, to);

    let after = fixture.nodes_by_key(ul);
    for key in to.iter().filter(|key| from.contains(key)) {
        assert_eq!(before[*key], after[*key], "node for key {} was recreated", key);
    }
}

#[test]
fn test_keyed_reversal_produces_correct_document() {
    check_transition(&["a", "b", "c", "d"], &["d", "c", "b", "a"]);
}

#[test]
fn test_keyed_reorder_with_insert_and_remove() {
    check_transition(&["a", "b", "c", "d", "e"], &["e", "b", "x", "a", "d"]);
    check_transition(&["a", "b", "c"], &["c", "y", "z"]);
    check_transition(&["a", "b"], &["x", "a", "y", "b", "z"]);
}

#[test]
fn test_list_grows_from_and_shrinks_to_empty() {
    check_transition(&[], &["a", "b"]);
    check_transition(&["a", "b"], &[]);
}

#[test]
fn test_unkeyed_swap_updates_in_place() {
    let fixture = Fixture::new();
    let old = VNode::element("div").with_children(vec![
        VNode::element("p").with_child(VNode::text("a")),
        VNode::element("p").with_child(VNode::text("b")),
    ]);
    let new = VNode::element("div").with_children(vec![
        VNode::element("p").with_child(VNode::text("b")),
        VNode::element("p").with_child(VNode::text("a")),
    ]);
    let div = fixture.mount(&old, &DetachedContext);
    let before = fixture.document.children(div).unwrap();

    fixture.update(&old, &new, &DetachedContext);

    assert_eq!(fixture.html(), "<div><p>b</p><p>a</p></div>");
    assert_eq!(fixture.document.children(div).unwrap(), before);
}

#[test]
fn test_failed_patch_does_not_stop_siblings() {
    let fixture = Fixture::new();
    let ctx = RecordingContext::default();
    let old = list(&["a"]);
    let new = VNode::element("ul").with_children(vec![
        VNode::element("li")
            .with_key("a")
            .with_prop("bad name", "x")
            .with_child(VNode::text("a")),
        VNode::element("li").with_key("b").with_child(VNode::text("b")),
    ]);
    let ul = fixture.mount(&old, &ctx);
    let li = fixture.document.children(ul).unwrap()[0];

    fixture.update(&old, &new, &ctx);

    assert_eq!(fixture.document.text_content(ul), "ab");
    let errors = ctx.errors.borrow();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].0, DomError::InvalidName(_)));
    assert_eq!(errors[0].1, li);
}

#[test]
fn test_bad_move_index_is_reported() {
    let fixture = Fixture::new();
    let ctx = RecordingContext::default();
    let ul = fixture.mount(&list(&["a"]), &ctx);

    fixture
        .patcher
        .apply(ul, &[ant_vdom::Patch::Move { from: 5, to: 0 }], &ctx);

    assert_eq!(fixture.document.text_content(ul), "a");
    assert!(matches!(
        ctx.errors.borrow()[0].0,
        DomError::MissingChild { index: 5, .. }
    ));
}

#[test]
fn test_handler_replacement_keeps_single_listener() {
    let fixture = Fixture::new();
    let first = Rc::new(Cell::new(0));
    let second = Rc::new(Cell::new(0));

    let counter = first.clone();
    let old = VNode::element("button").on("click", EventHandler::new(move |_| counter.set(counter.get() + 1)));
    let counter = second.clone();
    let new = VNode::element("button").on("click", EventHandler::new(move |_| counter.set(counter.get() + 1)));

    let button = fixture.mount(&old, &DetachedContext);
    fixture.update(&old, &new, &DetachedContext);

    assert_eq!(fixture.document.listener_count(button, "click"), 1);
    assert_eq!(fixture.patcher.listener_count(button), 1);
    fixture.document.dispatch(button, &Event::new("click"));
    assert_eq!((first.get(), second.get()), (0, 1));

    let bare = VNode::element("button");
    fixture.update(&new, &bare, &DetachedContext);
    assert_eq!(fixture.document.listener_count(button, "click"), 0);
    assert_eq!(fixture.patcher.listener_count(button), 0);
}

#[test]
fn test_special_props() {
    let fixture = Fixture::new();
    let old = VNode::element("input")
        .with_prop("value", "one")
        .with_prop("className", "field")
        .with_style("color", "red");
    let new = VNode::element("input")
        .with_prop("value", "two")
        .with_style("margin", "0");

    let input = fixture.mount(&old, &DetachedContext);
    assert_eq!(fixture.document.value(input).as_deref(), Some("one"));
    assert_eq!(fixture.document.attribute(input, "class").as_deref(), Some("field"));

    fixture.update(&old, &new, &DetachedContext);
    assert_eq!(fixture.document.value(input).as_deref(), Some("two"));
    assert_eq!(fixture.document.attribute(input, "class"), None);
    assert_eq!(fixture.document.style(input, "color"), None);
    assert_eq!(fixture.document.style(input, "margin").as_deref(), Some("0"));
}

#[test]
fn test_component_refs_delegate_to_context() {
    let fixture = Fixture::new();
    let ctx = RecordingContext::default();
    let id = ComponentId(3);
    let old = VNode::element("div").with_child(VNode::component(ComponentRef::new(id, "Counter").with_prop("start", 1)));
    let new = VNode::element("div").with_child(VNode::component(ComponentRef::new(id, "Counter").with_prop("start", 2)));

    let div = fixture.mount(&old, &ctx);
    let container = fixture.document.children(div).unwrap()[0];
    assert_eq!(*ctx.mounted.borrow(), vec![(id, container)]);
    assert_eq!(fixture.patcher.component_at(container), Some(id));

    fixture.update(&old, &new, &ctx);
    assert_eq!(ctx.updated.borrow().len(), 1);
    assert_eq!(ctx.updated.borrow()[0].props["start"], 2.into());

    fixture.update(&new, &VNode::element("div"), &ctx);
    assert_eq!(*ctx.unmounted.borrow(), vec![id]);
    assert_eq!(fixture.patcher.component_at(container), None);
}

#[test]
fn test_nested_enqueue_drains_in_same_flush() {
    struct Reentrant<'a> {
        patcher: &'a Patcher,
        root: NodeId,
        fired: Cell<bool>,
    }

    impl PatchContext for Reentrant<'_> {
        fn mount_component(&self, _: &ComponentRef, _: NodeId) -> DomResult<()> {
            Ok(())
        }

        fn update_component(&self, _: &ComponentRef) -> DomResult<()> {
            if !self.fired.replace(true) {
                let request = self.patcher.enqueue(
                    self.root,
                    vec![ant_vdom::Patch::Create {
                        node: VNode::text("late"),
                        index: 1,
                    }],
                );
                assert!(!request);
            }
            Ok(())
        }

        fn unmount_component(&self, _: ComponentId) {}

        fn report_error(&self, error: DomError, _: NodeId) {
            panic!("unexpected patch error: {}", error);
        }
    }

    let fixture = Fixture::new();
    let ctx = Reentrant {
        patcher: &fixture.patcher,
        root: fixture.root,
        fired: Cell::new(false),
    };
    let reference = ComponentRef::new(ComponentId(1), "Child");
    fixture.mount(&VNode::component(reference.clone()), &ctx);

    fixture.patcher.enqueue(
        fixture.root,
        vec![ant_vdom::Patch::UpdateComponent {
            old: reference.clone(),
            new: reference.with_prop("n", 1),
            index: 0,
        }],
    );
    assert_eq!(fixture.patcher.flush(&ctx), 2);
    assert_eq!(fixture.document.text_content(fixture.root), "late");
    assert_eq!(fixture.patcher.pending_jobs(), 0);
}

#[test]
fn test_released_nodes_are_forgotten_unless_pooled() {
    let fixture = Fixture::new();
    let item = |key: &str| VNode::element("li").with_key(key).with_child(VNode::text(key));
    let old = VNode::element("ul").with_children(vec![item("a"), item("b")]);
    let new = VNode::element("ul");
    fixture.mount(&old, &DetachedContext);
    assert_eq!(fixture.document.node_count(), 6);

    fixture.update(&old, &new, &DetachedContext);

    // both `li` elements wait in the pool, their text nodes are gone
    assert_eq!(fixture.patcher.pooled_for("li"), 2);
    assert_eq!(fixture.document.node_count(), 4);
}

#[test]
fn test_failed_create_keeps_later_indices_aligned() {
    let fixture = Fixture::new();
    let ctx = RecordingContext::default();
    let old = list(&["b"]);
    let new = VNode::element("ul").with_children(vec![
        VNode::element("li").with_key("x").with_prop("bad name", "x"),
        VNode::element("li")
            .with_key("b")
            .with_prop("class", "on")
            .with_child(VNode::text("b")),
    ]);
    let ul = fixture.mount(&old, &ctx);
    let b = fixture.document.children(ul).unwrap()[0];

    fixture.update(&old, &new, &ctx);

    assert_eq!(fixture.document.children(ul).unwrap(), vec![b]);
    assert_eq!(fixture.document.attribute(b, "class").as_deref(), Some("on"));
    let errors = ctx.errors.borrow();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].0, DomError::InvalidName(_)));
}

#[test]
fn test_replace_releases_old_node_before_building_new_one() {
    let fixture = Fixture::new();
    let old = VNode::element("div").with_child(VNode::element("p").with_child(VNode::text("a")));
    let new = VNode::element("article").with_child(VNode::element("p").with_child(VNode::text("b")));
    let div = fixture.mount(&old, &DetachedContext);
    let p = fixture.document.children(div).unwrap()[0];

    fixture.update(&old, &new, &DetachedContext);

    assert_eq!(fixture.html(), "<article><p>b</p></article>");
    let article = fixture.document.children(fixture.root).unwrap()[0];
    // the old paragraph came back out of the pool
    assert_eq!(fixture.document.children(article).unwrap(), vec![p]);
    assert_eq!(fixture.patcher.pooled_for("p"), 0);
    assert_eq!(fixture.patcher.pooled_for("div"), 1);
}

#[test]
fn test_replace_keeps_position_among_siblings() {
    let fixture = Fixture::new();
    let ctx = RecordingContext::default();
    let old = VNode::element("div").with_children(vec![
        VNode::text("a"),
        VNode::element("b"),
        VNode::text("c"),
    ]);
    let new = VNode::element("div").with_children(vec![
        VNode::text("a"),
        VNode::element("i"),
        VNode::text("c"),
    ]);
    fixture.mount(&old, &ctx);

    fixture.update(&old, &new, &ctx);

    assert_eq!(fixture.html(), "<div>a<i></i>c</div>");
    assert!(ctx.errors.borrow().is_empty());
}

#[test]
fn test_cancel_drops_jobs_for_subtree() {
    let fixture = Fixture::new();
    let ul = fixture.mount(&list(&["a"]), &DetachedContext);
    let li = fixture.document.children(ul).unwrap()[0];
    fixture.patcher.enqueue(
        li,
        vec![ant_vdom::Patch::Create {
            node: VNode::text("stale"),
            index: 1,
        }],
    );
    fixture.patcher.enqueue(
        fixture.root,
        vec![ant_vdom::Patch::Create {
            node: VNode::text("kept"),
            index: 1,
        }],
    );

    assert_eq!(fixture.patcher.cancel(ul), 1);
    assert_eq!(fixture.patcher.flush(&DetachedContext), 1);
    assert_eq!(fixture.document.text_content(fixture.root), "akept");
}
