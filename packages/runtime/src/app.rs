//! # Application
//!
//! [`App`] owns everything one mounted application needs: the host document,
//! the [`Patcher`] with its element pool and listener table, the
//! [`Scheduler`], and the registry of live components. Nothing is global; two
//! apps on the same page share no state.
//!
//! [`Headless`] wires an app to a [`MemoryDocument`] and manually driven idle
//! and frame hosts.

use crate::boundary::{self, BoundaryState, CaughtError, Fallback};
use crate::component::{Component, ComponentDef, MountTarget};
use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use ant_dom::{
    DomError, DomResult, FrameHost, HostDocument, ManualFrameHost, MemoryDocument, MetricSummary, NodeId,
    PatchContext, Patcher, PatcherOptions,
};
use ant_scheduler::{IdleHost, ManualIdleHost, Scheduler};
use ant_vdom::{ComponentId, ComponentRef, Patch, VNode};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};

pub struct Runtime {
    config: RuntimeConfig,
    document: Rc<dyn HostDocument>,
    patcher: Patcher,
    scheduler: Scheduler,
    frames: Rc<dyn FrameHost>,
    components: RefCell<HashMap<ComponentId, Component>>,
    boundaries: RefCell<HashMap<NodeId, ComponentId>>,
    mount_root: Cell<Option<NodeId>>,
    global_error: RefCell<Option<CaughtError>>,
    next_id: Cell<u64>,
    this: Weak<Runtime>,
}

impl Runtime {
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn document(&self) -> &Rc<dyn HostDocument> {
        &self.document
    }

    pub fn patcher(&self) -> &Patcher {
        &self.patcher
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn component(&self, id: ComponentId) -> Option<Component> {
        self.components.borrow().get(&id).cloned()
    }

    pub fn mount_root(&self) -> Option<NodeId> {
        self.mount_root.get()
    }

    pub fn global_error(&self) -> Option<CaughtError> {
        self.global_error.borrow().clone()
    }

    /// Queue a patch list for the next frame, requesting one if needed
    pub fn enqueue_patch(&self, parent: NodeId, patches: Vec<Patch>) {
        if self.patcher.enqueue(parent, patches) {
            let weak = self.this.clone();
            self.frames.request_frame(Box::new(move || {
                if let Some(runtime) = weak.upgrade() {
                    runtime.flush();
                }
            }));
        }
    }

    /// Apply all queued patches now
    pub fn flush(&self) -> usize {
        self.patcher.flush(self)
    }

    pub(crate) fn boundary_at(&self, node: NodeId) -> Option<Component> {
        let id = self.boundaries.borrow().get(&node).copied()?;
        self.component(id)
    }

    pub(crate) fn register_boundary(&self, container: NodeId, id: ComponentId) {
        self.boundaries.borrow_mut().insert(container, id);
    }

    pub(crate) fn unregister_boundary(&self, container: NodeId) {
        self.boundaries.borrow_mut().remove(&container);
    }

    /// Remember the first top-level container as the application root
    pub(crate) fn note_mount_root(&self, container: NodeId) {
        if self.mount_root.get().is_none() {
            self.mount_root.set(Some(container));
        }
        self.global_error.borrow_mut().take();
    }

    pub(crate) fn set_global_error(&self, error: CaughtError) {
        *self.global_error.borrow_mut() = Some(error);
    }

    /// Forget components mounted directly into `root`; their nodes are about
    /// to be discarded
    pub(crate) fn detach_components_at(&self, root: NodeId) {
        let mounted: Vec<Component> = self
            .components
            .borrow()
            .values()
            .filter(|c| c.root() == Some(root))
            .cloned()
            .collect();
        for component in mounted {
            component.detach(self);
        }
    }

    fn register(&self, def: ComponentDef, boundary: Option<Rc<BoundaryState>>) -> Component {
        let id = ComponentId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        let component = Component::new(id, def, self.this.clone(), boundary);
        self.components.borrow_mut().insert(id, component.clone());
        debug!(id = id.0, name = %component.name(), "Registered component");
        component
    }

    fn lookup(&self, id: ComponentId) -> DomResult<Component> {
        self.component(id)
            .ok_or_else(|| RuntimeError::UnknownComponent(id).into_dom_error())
    }
}

impl PatchContext for Runtime {
    fn mount_component(&self, component: &ComponentRef, container: NodeId) -> DomResult<()> {
        let instance = self.lookup(component.id)?;
        instance.receive(component);
        instance.mount_into(container).map_err(RuntimeError::into_dom_error)
    }

    fn update_component(&self, component: &ComponentRef) -> DomResult<()> {
        let instance = self.lookup(component.id)?;
        instance.receive(component);
        match instance.update_view() {
            Ok(()) => Ok(()),
            // Render failures were already routed to a boundary
            Err(RuntimeError::Render(err)) => {
                debug!(component = %instance.name(), error = %err, "Child re-render failed");
                Ok(())
            }
            Err(err) => Err(err.into_dom_error()),
        }
    }

    fn unmount_component(&self, component: ComponentId) {
        if let Some(instance) = self.component(component) {
            instance.detach(self);
        }
    }

    fn report_error(&self, error: DomError, node: NodeId) {
        boundary::route_error(self, CaughtError::patch(&error, node), node);
    }
}

pub struct App {
    runtime: Rc<Runtime>,
}

impl App {
    pub fn new(
        document: Rc<dyn HostDocument>,
        idle: Rc<dyn IdleHost>,
        frames: Rc<dyn FrameHost>,
        config: RuntimeConfig,
    ) -> Self {
        Self::with_options(document, idle, frames, config, None)
    }

    /// Like [`App::new`], timing metrics with `clock`
    pub fn with_options(
        document: Rc<dyn HostDocument>,
        idle: Rc<dyn IdleHost>,
        frames: Rc<dyn FrameHost>,
        config: RuntimeConfig,
        clock: Option<ant_dom::Clock>,
    ) -> Self {
        let options = PatcherOptions {
            pool_capacity_per_tag: config.pool_capacity_per_tag,
            metrics_enabled: config.metrics_enabled,
            clock,
        };
        let runtime = Rc::new_cyclic(|this| Runtime {
            patcher: Patcher::new(document.clone(), options),
            scheduler: Scheduler::new(idle),
            document,
            frames,
            config,
            components: RefCell::new(HashMap::new()),
            boundaries: RefCell::new(HashMap::new()),
            mount_root: Cell::new(None),
            global_error: RefCell::new(None),
            next_id: Cell::new(1),
            this: this.clone(),
        });
        info!(
            render_priority = runtime.config.render_priority,
            pool_capacity = runtime.config.pool_capacity_per_tag,
            "Created application"
        );
        Self { runtime }
    }

    pub fn runtime(&self) -> &Rc<Runtime> {
        &self.runtime
    }

    pub fn config(&self) -> &RuntimeConfig {
        self.runtime.config()
    }

    pub fn document(&self) -> &Rc<dyn HostDocument> {
        self.runtime.document()
    }

    pub fn patcher(&self) -> &Patcher {
        self.runtime.patcher()
    }

    pub fn scheduler(&self) -> &Scheduler {
        self.runtime.scheduler()
    }

    pub fn create_component(&self, def: ComponentDef) -> Component {
        self.runtime.register(def, None)
    }

    /// Built-in boundary component. Renders its default slot wrapped in a
    /// `div`, or `fallback(error)` once an error inside it was caught.
    pub fn error_boundary(&self, fallback: impl Fn(&CaughtError) -> VNode + 'static) -> Component {
        let fallback: Fallback = Rc::new(fallback);
        let state = Rc::new(BoundaryState::new(fallback));
        let view = state.clone();
        let def = ComponentDef::new("ErrorBoundary", move |scope| Ok(view.view(scope.children())));
        self.runtime.register(def, Some(state))
    }

    pub fn component(&self, id: ComponentId) -> Option<Component> {
        self.runtime.component(id)
    }

    /// Drop a component from the registry, unmounting it first if needed
    pub fn release(&self, id: ComponentId) -> Option<Component> {
        let component = self.runtime.component(id)?;
        if component.is_mounted() {
            if let Err(err) = component.unmount() {
                warn!(id = id.0, error = %err, "Failed to unmount released component");
            }
        }
        self.runtime.components.borrow_mut().remove(&id)
    }

    pub fn mount(&self, component: &Component, target: impl Into<MountTarget>) -> RuntimeResult<()> {
        component.mount(target)
    }

    /// Mount at the configured mount selector
    pub fn mount_default(&self, component: &Component) -> RuntimeResult<()> {
        let selector = self.runtime.config().mount_selector.clone();
        component.mount(selector)
    }

    pub fn batch<R>(&self, updates: impl FnOnce() -> R) -> R {
        self.runtime.scheduler().batch(updates)
    }

    /// Apply every queued patch synchronously
    pub fn flush(&self) -> usize {
        self.runtime.flush()
    }

    /// Error shown by the global error view, if any
    pub fn global_error(&self) -> Option<CaughtError> {
        self.runtime.global_error()
    }

    pub fn performance_report(&self) -> BTreeMap<String, MetricSummary> {
        self.runtime.patcher().metrics().report()
    }
}

/// App driven by hand against an in-memory document
pub struct Headless {
    pub app: App,
    pub document: Rc<MemoryDocument>,
    pub idle: Rc<ManualIdleHost>,
    pub frames: Rc<ManualFrameHost>,
}

impl Headless {
    pub fn new(config: RuntimeConfig) -> Self {
        let document = Rc::new(MemoryDocument::new());
        let idle = Rc::new(ManualIdleHost::new());
        let frames = Rc::new(ManualFrameHost::new());
        let app = App::new(document.clone(), idle.clone(), frames.clone(), config);
        Self {
            app,
            document,
            idle,
            frames,
        }
    }

    /// Body with an empty `<div id="app">` mount point
    pub fn with_mount_point(config: RuntimeConfig) -> DomResult<(Self, NodeId)> {
        let headless = Self::new(config);
        let mount = headless.document.create_element("div")?;
        headless.document.set_attribute(mount, "id", "app")?;
        headless.document.append_child(headless.document.root(), mount)?;
        Ok((headless, mount))
    }

    /// Grant idle slices and frames until no work is left. Returns the number
    /// of rounds taken.
    pub fn run_until_settled(&self) -> usize {
        let mut rounds = 0;
        loop {
            let slices = self.idle.run_until_idle(usize::MAX);
            let frames = self.frames.tick();
            if slices == 0 && frames == 0 {
                return rounds;
            }
            rounds += 1;
        }
    }

    pub fn html(&self, node: NodeId) -> String {
        self.document.inner_html(node)
    }
}

impl Default for Headless {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}
