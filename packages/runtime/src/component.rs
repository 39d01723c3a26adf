//! # Components
//!
//! A [`Component`] is a live instance: a render function plus reactive
//! state, props and refs, the snapshot of its last render and the container
//! node it is mounted into.
//!
//! Writes to state or props of a mounted component schedule a re-render on
//! the application scheduler. The re-render diffs the new tree against the
//! snapshot, queues the resulting patch for the next frame and replaces the
//! snapshot.

use crate::app::Runtime;
use crate::boundary::{self, BoundaryState, CaughtError};
use crate::error::{RenderError, RuntimeError, RuntimeResult};
use crate::lifecycle::LifecycleHooks;
use crate::reactive::{ReactiveMap, TriggerPolicy};
use ant_dom::{HostDocument, NodeId};
use ant_scheduler::Effect;
use ant_vdom::{diff, ComponentId, ComponentRef, Props, Slots, VNode, Value, DEFAULT_SLOT};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use tracing::{debug, instrument, trace};

pub type RenderFn = Rc<dyn Fn(&RenderScope) -> Result<VNode, RenderError>>;

/// Where a component is mounted
#[derive(Debug, Clone, PartialEq)]
pub enum MountTarget {
    Selector(String),
    Node(NodeId),
}

impl From<&str> for MountTarget {
    fn from(selector: &str) -> Self {
        MountTarget::Selector(selector.to_string())
    }
}

impl From<String> for MountTarget {
    fn from(selector: String) -> Self {
        MountTarget::Selector(selector)
    }
}

impl From<NodeId> for MountTarget {
    fn from(node: NodeId) -> Self {
        MountTarget::Node(node)
    }
}

/// Definition a component instance is created from
pub struct ComponentDef {
    name: String,
    render: RenderFn,
    state: BTreeMap<String, Value>,
    props: Props,
    refs: BTreeMap<String, Value>,
    slots: Slots,
}

impl ComponentDef {
    pub fn new(
        name: impl Into<String>,
        render: impl Fn(&RenderScope) -> Result<VNode, RenderError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            render: Rc::new(render),
            state: BTreeMap::new(),
            props: Props::new(),
            refs: BTreeMap::new(),
            slots: Slots::new(),
        }
    }

    pub fn with_state(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.state.insert(key.into(), value.into());
        self
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn with_ref(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.refs.insert(key.into(), value.into());
        self
    }

    pub fn with_slot(mut self, name: impl Into<String>, content: Vec<VNode>) -> Self {
        self.slots.insert(name.into(), content);
        self
    }
}

/// Read-only view handed to a render function
pub struct RenderScope {
    component: WeakComponent,
    state: BTreeMap<String, Value>,
    props: Props,
    refs: BTreeMap<String, Value>,
    slots: Slots,
}

impl RenderScope {
    pub fn state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    pub fn reference(&self, key: &str) -> Option<&Value> {
        self.refs.get(key)
    }

    pub fn slot(&self, name: &str) -> &[VNode] {
        self.slots.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Content passed to the default slot
    pub fn children(&self) -> &[VNode] {
        self.slot(DEFAULT_SLOT)
    }

    /// Handle for event handlers created during render
    pub fn handle(&self) -> WeakComponent {
        self.component.clone()
    }
}

pub(crate) struct ComponentInner {
    id: ComponentId,
    name: String,
    render: RenderFn,
    state: ReactiveMap,
    props: ReactiveMap,
    refs: ReactiveMap,
    slots: RefCell<Slots>,
    last_rendered: RefCell<Option<VNode>>,
    mounted: Cell<bool>,
    root: Cell<Option<NodeId>>,
    hooks: LifecycleHooks,
    runtime: Weak<Runtime>,
    pub(crate) boundary: Option<Rc<BoundaryState>>,
}

#[derive(Clone)]
pub struct Component {
    pub(crate) inner: Rc<ComponentInner>,
}

/// Non-owning handle to a component, safe to capture in event handlers
#[derive(Clone)]
pub struct WeakComponent {
    inner: Weak<ComponentInner>,
}

impl WeakComponent {
    pub fn upgrade(&self) -> Option<Component> {
        self.inner.upgrade().map(|inner| Component { inner })
    }

    /// Write state if the component is still alive
    pub fn set_state(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        self.upgrade().map(|c| c.set_state(key, value)).unwrap_or(false)
    }

    pub fn update_state(&self, key: impl Into<String>, f: impl FnOnce(Option<&Value>) -> Value) -> bool {
        self.upgrade().map(|c| c.update_state(key, f)).unwrap_or(false)
    }
}

impl Component {
    pub(crate) fn new(
        id: ComponentId,
        def: ComponentDef,
        runtime: Weak<Runtime>,
        boundary: Option<Rc<BoundaryState>>,
    ) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<ComponentInner>| {
            let observer = |weak: Weak<ComponentInner>| -> Rc<dyn Fn()> {
                Rc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        Component { inner }.changed();
                    }
                })
            };
            ComponentInner {
                id,
                name: def.name,
                render: def.render,
                state: ReactiveMap::observed(def.state, TriggerPolicy::AnyKey, observer(weak.clone())),
                props: ReactiveMap::observed(def.props, TriggerPolicy::AnyKey, observer(weak.clone())),
                refs: ReactiveMap::observed(def.refs, TriggerPolicy::ExistingValueKey, observer(weak.clone())),
                slots: RefCell::new(def.slots),
                last_rendered: RefCell::new(None),
                mounted: Cell::new(false),
                root: Cell::new(None),
                hooks: LifecycleHooks::new(),
                runtime,
                boundary,
            }
        });
        Self { inner }
    }

    pub fn id(&self) -> ComponentId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    /// Container node while mounted
    pub fn root(&self) -> Option<NodeId> {
        self.inner.root.get()
    }

    pub fn last_rendered(&self) -> Option<VNode> {
        self.inner.last_rendered.borrow().clone()
    }

    pub fn downgrade(&self) -> WeakComponent {
        WeakComponent {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Reference for embedding this instance in a parent's tree
    pub fn reference(&self) -> ComponentRef {
        ComponentRef::new(self.inner.id, self.inner.name.clone())
    }

    pub fn state(&self, key: &str) -> Option<Value> {
        self.inner.state.get(key)
    }

    pub fn set_state(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        self.inner.state.set(key, value)
    }

    pub fn update_state(&self, key: impl Into<String>, f: impl FnOnce(Option<&Value>) -> Value) -> bool {
        self.inner.state.update(key, f)
    }

    pub fn prop(&self, key: &str) -> Option<Value> {
        self.inner.props.get(key)
    }

    pub fn set_prop(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        self.inner.props.set(key, value)
    }

    pub fn ref_value(&self, key: &str) -> Option<Value> {
        self.inner.refs.get(key)
    }

    pub fn set_ref(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        self.inner.refs.set(key, value)
    }

    pub fn slot(&self, name: &str) -> Vec<VNode> {
        self.inner.slots.borrow().get(name).cloned().unwrap_or_default()
    }

    /// Replace slot content. Takes effect on the next render.
    pub fn set_slot(&self, name: impl Into<String>, content: Vec<VNode>) {
        self.inner.slots.borrow_mut().insert(name.into(), content);
    }

    pub fn on_mounted(&self, hook: impl Fn() + 'static) {
        self.inner.hooks.on_mounted(Rc::new(hook));
    }

    pub fn on_updated(&self, hook: impl Fn() + 'static) {
        self.inner.hooks.on_updated(Rc::new(hook));
    }

    pub fn on_unmounted(&self, hook: impl Fn() + 'static) {
        self.inner.hooks.on_unmounted(Rc::new(hook));
    }

    /// Run a method against the instance, then schedule a re-render if mounted
    pub fn invoke<R>(&self, method: impl FnOnce(&Component) -> R) -> R {
        let result = method(self);
        self.changed();
        result
    }

    /// Resolve `target` and render into it synchronously
    pub fn mount(&self, target: impl Into<MountTarget>) -> RuntimeResult<()> {
        let runtime = self.runtime()?;
        let container = match target.into() {
            MountTarget::Node(node) => node,
            MountTarget::Selector(selector) => runtime
                .document()
                .query(&selector)
                .ok_or(RuntimeError::MountTargetNotFound(selector))?,
        };
        runtime.note_mount_root(container);
        self.mount_into(container)
    }

    /// Render, diff against the snapshot and queue the patch. The document
    /// changes on the next frame flush.
    #[instrument(level = "debug", skip(self), fields(component = %self.inner.name))]
    pub fn update_view(&self) -> RuntimeResult<()> {
        let runtime = self.runtime()?;
        let container = match (self.is_mounted(), self.root()) {
            (true, Some(container)) => container,
            _ => return Err(RuntimeError::NotMounted(self.inner.id)),
        };

        let next = match self.render() {
            Ok(next) => next,
            Err(err) => {
                boundary::route_error(&runtime, CaughtError::render(&self.inner.name, &err), container);
                return Err(err.into());
            }
        };

        let patch = diff(self.inner.last_rendered.borrow().as_ref(), Some(&next));
        match patch {
            Some(patch) => {
                trace!(patches = patch.count(), "Queued re-render patch");
                runtime.enqueue_patch(container, vec![patch]);
            }
            None => trace!("Re-render produced no changes"),
        }
        *self.inner.last_rendered.borrow_mut() = Some(next);
        self.inner.hooks.run_updated();
        Ok(())
    }

    /// Run unmount hooks, release the rendered nodes and clear the snapshot
    pub fn unmount(&self) -> RuntimeResult<()> {
        let runtime = self.runtime()?;
        let container = match (self.is_mounted(), self.root()) {
            (true, Some(container)) => container,
            _ => return Err(RuntimeError::NotMounted(self.inner.id)),
        };
        self.detach(&runtime);
        runtime.patcher().release_children(container, runtime.as_ref(), true)?;
        Ok(())
    }

    pub(crate) fn runtime(&self) -> RuntimeResult<Rc<Runtime>> {
        self.inner.runtime.upgrade().ok_or(RuntimeError::Detached)
    }

    pub(crate) fn render(&self) -> Result<VNode, RenderError> {
        let scope = RenderScope {
            component: self.downgrade(),
            state: self.inner.state.snapshot(),
            props: self.inner.props.snapshot(),
            refs: self.inner.refs.snapshot(),
            slots: self.inner.slots.borrow().clone(),
        };
        (self.inner.render)(&scope)
    }

    pub(crate) fn set_snapshot(&self, tree: Option<VNode>) {
        *self.inner.last_rendered.borrow_mut() = tree;
    }

    /// Props and slots handed down by a parent render. Does not notify.
    pub(crate) fn receive(&self, reference: &ComponentRef) {
        self.inner.props.replace_silently(reference.props.clone());
        *self.inner.slots.borrow_mut() = reference.slots.clone();
    }

    /// Render into `container`, append the result and run mount hooks
    pub(crate) fn mount_into(&self, container: NodeId) -> RuntimeResult<()> {
        if self.is_mounted() {
            return Err(RuntimeError::AlreadyMounted(self.inner.id));
        }
        let runtime = self.runtime()?;
        if self.inner.boundary.is_some() {
            runtime.register_boundary(container, self.inner.id);
        }

        let built = self
            .render()
            .map_err(RuntimeError::from)
            .and_then(|tree| {
                let node = runtime.patcher().create_node(&tree, runtime.as_ref())?;
                Ok((tree, node))
            });
        let (tree, node) = match built {
            Ok(built) => built,
            Err(err) => match boundary::fallback_for(self, &err) {
                Some(tree) => {
                    let node = runtime.patcher().create_node(&tree, runtime.as_ref())?;
                    (tree, node)
                }
                None => {
                    runtime.unregister_boundary(container);
                    return Err(err);
                }
            },
        };

        runtime.document().append_child(container, node)?;
        self.inner.root.set(Some(container));
        self.set_snapshot(Some(tree));
        self.inner.mounted.set(true);
        debug!(component = %self.inner.name, container = ?container, "Mounted component");
        self.inner.hooks.run_mounted();
        Ok(())
    }

    /// Run unmount hooks and forget the mount. The caller owns the nodes.
    pub(crate) fn detach(&self, runtime: &Runtime) {
        if !self.is_mounted() {
            return;
        }
        self.inner.hooks.run_unmounted();
        self.inner.mounted.set(false);
        if let Some(container) = self.inner.root.take() {
            runtime.patcher().cancel(container);
            runtime.unregister_boundary(container);
        }
        self.set_snapshot(None);
        debug!(component = %self.inner.name, "Unmounted component");
    }

    fn changed(&self) {
        if !self.is_mounted() {
            return;
        }
        let Some(runtime) = self.inner.runtime.upgrade() else {
            return;
        };

        let weak = Rc::downgrade(&self.inner);
        let effect: Effect = Rc::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let component = Component { inner };
            if !component.is_mounted() {
                return;
            }
            if let Err(err) = component.update_view() {
                debug!(component = %component.name(), error = %err, "Scheduled re-render failed");
            }
        });
        runtime
            .scheduler()
            .schedule_update(effect, runtime.config().render_priority);
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("mounted", &self.inner.mounted.get())
            .finish()
    }
}
