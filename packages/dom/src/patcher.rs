//! # Patcher
//!
//! Applies [`Patch`] lists produced by the differ to a [`HostDocument`].
//!
//! A patch list describes the children of one parent node. Structural patches
//! (`Create`, `Remove`, `Move`) carry indices from two coordinate systems: old
//! positions for `Remove` and `Move::from`, new positions for everything else.
//! The patcher resolves them against a snapshot of the live children:
//!
//! 1. Removes are applied, releasing their elements to the pool.
//! 2. Created and moved nodes are placed at their new indices.
//! 3. Remaining slots are filled with the surviving old nodes in order.
//! 4. The document is reordered to match with `insert_before`.
//! 5. In-place patches are applied to the node now sitting at their index.
//!
//! Every patch is applied on its own. A failure is logged and handed to
//! [`PatchContext::report_error`]; sibling patches still run. A create that
//! fails keeps its slot empty so later indices still line up, and patches
//! whose node was detached by an earlier failure (an error boundary swapping
//! its subtree, for one) are skipped.
//!
//! The patcher owns the element pool, the listener side table and the
//! frame-aligned job queue. All methods take `&self` and only hold interior
//! borrows for short critical sections, so component callbacks may re-enter.

use crate::frame::{FrameJob, FrameQueue};
use crate::host::{DomError, DomResult, HostDocument, NodeId, NodeKind};
use crate::listeners::{event_name, ListenerTable};
use crate::metrics::{Clock, PerformanceMetrics, CREATE_ELEMENT, FLUSH, PATCH};
use crate::pool::{ElementPool, DEFAULT_CAPACITY_PER_TAG};
use ant_vdom::{ComponentId, ComponentRef, EventHandler, Patch, PropPatch, Props, VNode, Value, STYLE_PROP};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use tracing::{debug, error, instrument, trace, warn};

/// Callbacks the patcher needs from the component layer
pub trait PatchContext {
    /// Render `component` into the freshly created `container`
    fn mount_component(&self, component: &ComponentRef, container: NodeId) -> DomResult<()>;

    /// Hand new props and slots to a mounted component and re-render it
    fn update_component(&self, component: &ComponentRef) -> DomResult<()>;

    /// Run unmount hooks for a component whose container is being released
    fn unmount_component(&self, component: ComponentId);

    /// A patch against `node` failed
    fn report_error(&self, error: DomError, node: NodeId);
}

/// Context for trees without component references
pub struct DetachedContext;

impl PatchContext for DetachedContext {
    fn mount_component(&self, component: &ComponentRef, _container: NodeId) -> DomResult<()> {
        Err(DomError::component(format!(
            "component '{}' cannot be mounted without a runtime",
            component.name
        )))
    }

    fn update_component(&self, component: &ComponentRef) -> DomResult<()> {
        Err(DomError::component(format!(
            "component '{}' cannot be updated without a runtime",
            component.name
        )))
    }

    fn unmount_component(&self, _component: ComponentId) {}

    fn report_error(&self, error: DomError, node: NodeId) {
        error!(node = ?node, error = %error, "Unhandled patch error");
    }
}

#[derive(Clone)]
pub struct PatcherOptions {
    pub pool_capacity_per_tag: usize,
    pub metrics_enabled: bool,
    /// Millisecond clock for metrics; a monotonic clock when `None`
    pub clock: Option<Clock>,
}

impl Default for PatcherOptions {
    fn default() -> Self {
        Self {
            pool_capacity_per_tag: DEFAULT_CAPACITY_PER_TAG,
            metrics_enabled: true,
            clock: None,
        }
    }
}

pub struct Patcher {
    document: Rc<dyn HostDocument>,
    pool: RefCell<ElementPool>,
    listeners: RefCell<ListenerTable>,
    queue: RefCell<FrameQueue>,
    containers: RefCell<HashMap<NodeId, ComponentId>>,
    metrics: PerformanceMetrics,
}

impl Patcher {
    pub fn new(document: Rc<dyn HostDocument>, options: PatcherOptions) -> Self {
        let metrics = match options.clock {
            Some(clock) => PerformanceMetrics::with_clock(options.metrics_enabled, clock),
            None => PerformanceMetrics::new(options.metrics_enabled),
        };
        Self {
            document,
            pool: RefCell::new(ElementPool::new(options.pool_capacity_per_tag)),
            listeners: RefCell::new(ListenerTable::new()),
            queue: RefCell::new(FrameQueue::new()),
            containers: RefCell::new(HashMap::new()),
            metrics,
        }
    }

    pub fn document(&self) -> &Rc<dyn HostDocument> {
        &self.document
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn pooled(&self) -> usize {
        self.pool.borrow().len()
    }

    pub fn pooled_for(&self, tag: &str) -> usize {
        self.pool.borrow().len_for(tag)
    }

    /// Listeners currently tracked for `node`
    pub fn listener_count(&self, node: NodeId) -> usize {
        self.listeners.borrow().count(node)
    }

    /// Component mounted into `node`, if `node` is a component container
    pub fn component_at(&self, node: NodeId) -> Option<ComponentId> {
        self.containers.borrow().get(&node).copied()
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_flushing(&self) -> bool {
        self.queue.borrow().is_flushing()
    }

    /// Drop queued jobs that target `root` or a node under it. Called when a
    /// component leaves its container so stale patches never reach whatever
    /// is mounted there next.
    pub fn cancel(&self, root: NodeId) -> usize {
        let document = &self.document;
        let dropped = self.queue.borrow_mut().cancel(|parent| {
            let mut current = Some(parent);
            while let Some(node) = current {
                if node == root {
                    return true;
                }
                current = document.parent(node);
            }
            false
        });
        if dropped > 0 {
            debug!(root = ?root, dropped, "Cancelled queued patch jobs");
        }
        dropped
    }

    /// Queue `patches` for the children of `parent` until the next flush.
    /// Returns true when the caller has to request an animation frame.
    pub fn enqueue(&self, parent: NodeId, patches: Vec<Patch>) -> bool {
        if patches.is_empty() {
            return false;
        }
        let mut queue = self.queue.borrow_mut();
        let request = queue.push(FrameJob { parent, patches });
        trace!(parent = ?parent, queued = queue.len(), request, "Enqueued patch job");
        request
    }

    /// Apply every queued job in enqueue order, including jobs enqueued by
    /// component updates during the flush. Returns the number of jobs applied.
    #[instrument(level = "debug", skip_all)]
    pub fn flush(&self, ctx: &dyn PatchContext) -> usize {
        if self.queue.borrow().is_flushing() {
            return 0;
        }
        let _timer = self.metrics.start(FLUSH);
        self.queue.borrow_mut().begin_flush();

        let mut applied = 0;
        loop {
            let job = self.queue.borrow_mut().pop();
            let Some(job) = job else {
                break;
            };
            self.apply(job.parent, &job.patches, ctx);
            applied += 1;
        }

        self.queue.borrow_mut().end_flush();
        debug!(applied, "Flushed patch queue");
        applied
    }

    /// Apply a child patch list against the children of `parent` immediately
    pub fn apply(&self, parent: NodeId, patches: &[Patch], ctx: &dyn PatchContext) {
        if patches.is_empty() {
            return;
        }
        let _timer = self.metrics.start(PATCH);

        let live = match self.document.children(parent) {
            Ok(live) => live,
            Err(err) => {
                self.fail(err, parent, ctx);
                return;
            }
        };

        let mut removed = vec![false; live.len()];
        let mut lifted = vec![false; live.len()];
        // `None` marks a slot whose create failed
        let mut placed: BTreeMap<usize, Option<NodeId>> = BTreeMap::new();
        let mut in_place: Vec<&Patch> = Vec::new();

        // Removes first, so their elements are pooled before anything is created
        for patch in patches {
            if let Patch::Remove { index } = patch {
                match live.get(*index) {
                    Some(&node) if !removed[*index] => {
                        removed[*index] = true;
                        if let Err(err) = self.remove_node(parent, node, ctx) {
                            self.fail(err, node, ctx);
                        }
                    }
                    _ => self.fail(DomError::MissingChild { parent, index: *index }, parent, ctx),
                }
            }
        }

        for patch in patches {
            match patch {
                Patch::Remove { .. } => {}
                Patch::Create { node, index } => match self.create_node(node, ctx) {
                    Ok(created) => self.place(&mut placed, *index, Some(created), parent, ctx),
                    Err(err) => {
                        self.fail(err, parent, ctx);
                        self.place(&mut placed, *index, None, parent, ctx);
                    }
                },
                Patch::Move { from, to } => match live.get(*from) {
                    Some(&node) if !removed[*from] && !lifted[*from] => {
                        lifted[*from] = true;
                        self.place(&mut placed, *to, Some(node), parent, ctx);
                    }
                    _ => self.fail(DomError::MissingChild { parent, index: *from }, parent, ctx),
                },
                _ => in_place.push(patch),
            }
        }

        let mut survivors = live
            .iter()
            .enumerate()
            .filter(|(i, _)| !removed[*i] && !lifted[*i])
            .map(|(_, node)| Some(*node));
        let total = placed.len() + survivors.clone().count();
        let mut order: Vec<Option<NodeId>> = Vec::with_capacity(total);
        for slot in 0..total {
            if let Some(node) = placed.remove(&slot) {
                order.push(node);
            } else if let Some(node) = survivors.next() {
                order.push(node);
            }
        }
        // Out-of-range indices from a malformed list land at the end
        order.extend(placed.into_values());
        order.extend(survivors);
        let live_order: Vec<NodeId> = order.iter().flatten().copied().collect();

        let attached: Vec<NodeId> = live
            .iter()
            .enumerate()
            .filter(|(i, _)| !removed[*i])
            .map(|(_, node)| *node)
            .collect();
        if let Err(err) = self.reorder(parent, attached, &live_order) {
            self.fail(err, parent, ctx);
        }

        for patch in in_place {
            let index = patch.index();
            let node = match order.get(index) {
                Some(Some(node)) => *node,
                Some(None) => {
                    debug!(parent = ?parent, index, "Skipping patch for a slot whose create failed");
                    continue;
                }
                None => {
                    self.fail(DomError::MissingChild { parent, index }, parent, ctx);
                    continue;
                }
            };
            if !self.is_child(parent, node) {
                debug!(parent = ?parent, node = ?node, "Skipping patch for a detached node");
                continue;
            }
            if let Err(err) = self.apply_in_place(parent, node, patch, ctx) {
                self.fail(err, node, ctx);
            }
        }
    }

    fn is_child(&self, parent: NodeId, node: NodeId) -> bool {
        self.document.parent(node) == Some(parent)
    }

    /// Build a live node for `vnode`. Elements come from the pool when one
    /// with the same tag is available.
    pub fn create_node(&self, vnode: &VNode, ctx: &dyn PatchContext) -> DomResult<NodeId> {
        match vnode {
            VNode::Text { content } => self.document.create_text(content),
            VNode::Element {
                tag,
                props,
                children,
            } => {
                let element = {
                    let _timer = self.metrics.start(CREATE_ELEMENT);
                    let element = self.allocate(tag)?;
                    self.set_props(element, props)?;
                    element
                };
                for child in children {
                    let child = self.create_node(child, ctx)?;
                    self.document.append_child(element, child)?;
                }
                Ok(element)
            }
            VNode::Component(reference) => {
                let container = self.allocate("div")?;
                self.containers.borrow_mut().insert(container, reference.id);
                if let Err(err) = ctx.mount_component(reference, container) {
                    self.containers.borrow_mut().remove(&container);
                    return Err(err);
                }
                Ok(container)
            }
        }
    }

    /// Release a detached subtree: unmount component containers, drop
    /// listeners and, when `recycle` is set, hand elements back to the pool.
    pub fn release(&self, node: NodeId, ctx: &dyn PatchContext, recycle: bool) -> DomResult<()> {
        let component = self.containers.borrow_mut().remove(&node);
        if let Some(component) = component {
            ctx.unmount_component(component);
        }

        if self.document.kind(node)? == NodeKind::Text {
            self.document.forget(node);
            return Ok(());
        }

        self.release_children(node, ctx, recycle)?;

        let registered = self.listeners.borrow_mut().remove_node(node);
        for (event, listener) in registered {
            self.document.remove_event_listener(node, &event, listener)?;
        }

        if recycle {
            if let Some(tag) = self.document.tag_name(node)? {
                let has_room = self.pool.borrow().has_room(&tag);
                if has_room && self.document.parent(node).is_none() {
                    self.document.reset_element(node)?;
                    self.pool.borrow_mut().recycle(&tag, node);
                    return Ok(());
                }
            }
        }
        if self.document.parent(node).is_none() {
            self.document.forget(node);
        }
        Ok(())
    }

    /// Release every child of `node` and detach them
    pub fn release_children(&self, node: NodeId, ctx: &dyn PatchContext, recycle: bool) -> DomResult<()> {
        for child in self.document.children(node)? {
            self.document.remove_child(node, child)?;
            self.release(child, ctx, recycle)?;
        }
        Ok(())
    }

    pub fn set_props(&self, node: NodeId, props: &Props) -> DomResult<()> {
        for (key, value) in props {
            self.set_prop(node, key, value)?;
        }
        Ok(())
    }

    pub fn apply_prop_patches(&self, node: NodeId, diffs: &[PropPatch]) -> DomResult<()> {
        for diff in diffs {
            match diff {
                PropPatch::Set { key, value } => self.set_prop(node, key, value)?,
                PropPatch::Remove { key } => self.remove_prop(node, key)?,
            }
        }
        Ok(())
    }

    fn set_prop(&self, node: NodeId, key: &str, value: &Value) -> DomResult<()> {
        let event = event_name(key);
        if let (Some(event), Some(handler)) = (&event, value.as_handler()) {
            return self.set_listener(node, event, handler.clone());
        }
        if let Some(event) = &event {
            self.remove_listener(node, event)?;
        }

        let document = &self.document;
        match key {
            "value" => document.set_value(node, &value.to_attribute_string()),
            "class" | "className" => document.set_class_name(node, &value.to_attribute_string()),
            STYLE_PROP => match value {
                Value::Map(declarations) => {
                    document.remove_attribute(node, STYLE_PROP)?;
                    for (property, v) in declarations {
                        document.set_style(node, property, &v.to_attribute_string())?;
                    }
                    Ok(())
                }
                Value::Null | Value::Bool(false) => document.remove_attribute(node, STYLE_PROP),
                other => document.set_attribute(node, STYLE_PROP, &other.to_attribute_string()),
            },
            _ => match value {
                Value::Bool(true) => document.set_attribute(node, key, ""),
                Value::Bool(false) | Value::Null => document.remove_attribute(node, key),
                other => document.set_attribute(node, key, &other.to_attribute_string()),
            },
        }
    }

    fn remove_prop(&self, node: NodeId, key: &str) -> DomResult<()> {
        if let Some(event) = event_name(key) {
            if self.remove_listener(node, &event)? {
                return Ok(());
            }
        }
        match key {
            "value" => self.document.set_value(node, ""),
            "class" | "className" => self.document.remove_attribute(node, "class"),
            _ => self.document.remove_attribute(node, key),
        }
    }

    fn set_listener(&self, node: NodeId, event: &str, handler: EventHandler) -> DomResult<()> {
        self.remove_listener(node, event)?;
        let listener = self.document.add_event_listener(node, event, handler)?;
        self.listeners.borrow_mut().insert(node, event, listener);
        Ok(())
    }

    fn remove_listener(&self, node: NodeId, event: &str) -> DomResult<bool> {
        let previous = self.listeners.borrow_mut().remove(node, event);
        match previous {
            Some(listener) => {
                self.document.remove_event_listener(node, event, listener)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn allocate(&self, tag: &str) -> DomResult<NodeId> {
        let pooled = self.pool.borrow_mut().take(tag);
        match pooled {
            Some(node) => {
                trace!(tag, "Reusing pooled element");
                Ok(node)
            }
            None => self.document.create_element(tag),
        }
    }

    fn remove_node(&self, parent: NodeId, node: NodeId, ctx: &dyn PatchContext) -> DomResult<()> {
        self.document.remove_child(parent, node)?;
        self.release(node, ctx, true)
    }

    fn place(
        &self,
        placed: &mut BTreeMap<usize, Option<NodeId>>,
        index: usize,
        node: Option<NodeId>,
        parent: NodeId,
        ctx: &dyn PatchContext,
    ) {
        if placed.contains_key(&index) {
            warn!(parent = ?parent, index, "Two nodes target the same position; keeping the first");
            self.fail(DomError::MissingChild { parent, index }, parent, ctx);
            return;
        }
        placed.insert(index, node);
    }

    /// Move nodes so the children of `parent` read `order`. `attached` is the
    /// current child list.
    fn reorder(&self, parent: NodeId, mut attached: Vec<NodeId>, order: &[NodeId]) -> DomResult<()> {
        for (slot, &node) in order.iter().enumerate() {
            if attached.get(slot) == Some(&node) {
                continue;
            }
            let reference = attached.get(slot).copied();
            self.document.insert_before(parent, node, reference)?;
            if let Some(position) = attached.iter().position(|n| *n == node) {
                attached.remove(position);
            }
            attached.insert(slot.min(attached.len()), node);
        }
        Ok(())
    }

    fn apply_in_place(&self, parent: NodeId, node: NodeId, patch: &Patch, ctx: &dyn PatchContext) -> DomResult<()> {
        match patch {
            Patch::Replace { new, .. } => {
                // the old node goes back to the pool first so the replacement can reuse it
                let siblings = self.document.children(parent)?;
                let next = siblings
                    .iter()
                    .position(|sibling| *sibling == node)
                    .and_then(|position| siblings.get(position + 1).copied());
                self.remove_node(parent, node, ctx)?;

                // the old node is gone, so failures from here on are reported against `parent`
                let replacement = match self.create_node(new, ctx) {
                    Ok(replacement) => replacement,
                    Err(err) => {
                        self.fail(err, parent, ctx);
                        return Ok(());
                    }
                };
                if let Err(err) = self.document.insert_before(parent, replacement, next) {
                    if let Err(release_err) = self.release(replacement, ctx, true) {
                        debug!(node = ?replacement, error = %release_err, "Could not release failed replacement");
                    }
                    self.fail(err, parent, ctx);
                }
                Ok(())
            }
            Patch::UpdateProps { diffs, .. } => self.apply_prop_patches(node, diffs),
            Patch::UpdateChildren { patches, .. } => {
                self.apply(node, patches, ctx);
                Ok(())
            }
            Patch::Update { patches, .. } => {
                for inner in patches {
                    if !self.is_child(parent, node) {
                        debug!(node = ?node, "Node detached mid-update; skipping the rest");
                        break;
                    }
                    if let Err(err) = self.apply_in_place(parent, node, inner, ctx) {
                        self.fail(err, node, ctx);
                    }
                }
                Ok(())
            }
            Patch::UpdateComponent { new, .. } => ctx.update_component(new),
            Patch::Create { .. } | Patch::Remove { .. } | Patch::Move { .. } => {
                warn!(kind = patch.kind_name(), "Structural patch nested in an update; ignored");
                Ok(())
            }
        }
    }

    fn fail(&self, err: DomError, node: NodeId, ctx: &dyn PatchContext) {
        error!(node = ?node, error = %err, "Patch failed");
        ctx.report_error(err, node);
    }
}
