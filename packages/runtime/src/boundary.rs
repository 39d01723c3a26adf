//! Error propagation.
//!
//! Errors raised while rendering or patching are routed from the node where
//! they surfaced up through its live ancestors. The first ancestor that is the
//! container of an error boundary catches the error and swaps its subtree for
//! the fallback view. Without a boundary the application mount root is
//! replaced by the global error view.

use crate::app::Runtime;
use crate::component::Component;
use crate::error::{RenderError, RuntimeError};
use ant_dom::{DomError, HostDocument, NodeId};
use ant_vdom::{Value, VNode};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Render,
    Patch,
    Mount,
}

/// Error as seen by a boundary fallback
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaughtError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: String,
}

impl CaughtError {
    pub fn render(component: &str, error: &RenderError) -> Self {
        Self {
            kind: ErrorKind::Render,
            message: error.message.clone(),
            detail: format!("while rendering component '{}'", component),
        }
    }

    pub fn patch(error: &DomError, node: NodeId) -> Self {
        Self {
            kind: ErrorKind::Patch,
            message: error.to_string(),
            detail: format!("{:?} while patching node {:?}", error, node),
        }
    }

    pub fn mount(component: &str, error: &RuntimeError) -> Self {
        Self {
            kind: ErrorKind::Mount,
            message: error.to_string(),
            detail: format!("while mounting component '{}'", component),
        }
    }
}

impl fmt::Display for CaughtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub type Fallback = Rc<dyn Fn(&CaughtError) -> VNode>;

pub(crate) struct BoundaryState {
    fallback: Fallback,
    caught: RefCell<Option<CaughtError>>,
}

impl BoundaryState {
    pub(crate) fn new(fallback: Fallback) -> Self {
        Self {
            fallback,
            caught: RefCell::new(None),
        }
    }

    /// Fallback view while an error is held, `content` otherwise
    pub(crate) fn view(&self, content: &[VNode]) -> VNode {
        match &*self.caught.borrow() {
            Some(error) => (self.fallback)(error),
            None => VNode::element("div").with_children(content.to_vec()),
        }
    }
}

impl Component {
    pub fn is_error_boundary(&self) -> bool {
        self.inner.boundary.is_some()
    }

    /// Error currently held by this boundary
    pub fn caught_error(&self) -> Option<CaughtError> {
        self.inner.boundary.as_ref()?.caught.borrow().clone()
    }

    /// Drop the held error and re-render the boundary's children
    pub fn reset_boundary(&self) -> crate::error::RuntimeResult<()> {
        if let Some(state) = &self.inner.boundary {
            state.caught.borrow_mut().take();
        }
        if self.is_mounted() {
            self.update_view()?;
        }
        Ok(())
    }
}

/// Walk from `origin` to the nearest boundary and let it handle `error`
pub fn route_error(runtime: &Runtime, error: CaughtError, origin: NodeId) {
    let document = runtime.document().clone();
    // a boundary that already swapped its subtree has released the origin
    if document.kind(origin).is_err() {
        debug!(origin = ?origin, error = %error, "Dropping error from a released node");
        return;
    }
    let mut current = Some(origin);
    while let Some(node) = current {
        if let Some(boundary) = runtime.boundary_at(node) {
            catch(&boundary, runtime, error);
            return;
        }
        current = document.parent(node);
    }
    show_global_error(runtime, error);
}

/// Record `error` on a boundary that failed to build its children and return
/// the fallback tree to mount instead
pub(crate) fn fallback_for(component: &Component, error: &RuntimeError) -> Option<VNode> {
    let state = component.inner.boundary.as_ref()?;
    let caught = CaughtError::mount(component.name(), error);
    warn!(boundary = %component.name(), error = %caught, "Error boundary caught mount failure");
    let tree = (state.fallback)(&caught);
    *state.caught.borrow_mut() = Some(caught);
    Some(tree)
}

/// Swap the boundary's subtree for its fallback view. Old nodes are dropped,
/// not recycled.
fn catch(boundary: &Component, runtime: &Runtime, error: CaughtError) {
    let Some(state) = boundary.inner.boundary.clone() else {
        return;
    };
    if state.caught.borrow().is_some() {
        warn!(boundary = %boundary.name(), error = %error, "Error boundary already showing fallback");
        return;
    }
    warn!(boundary = %boundary.name(), error = %error, "Error boundary caught error");
    *state.caught.borrow_mut() = Some(error);

    let Some(container) = boundary.root() else {
        return;
    };
    let patcher = runtime.patcher();
    patcher.cancel(container);
    let replaced = patcher
        .release_children(container, runtime, false)
        .map_err(RuntimeError::from)
        .and_then(|_| boundary.render().map_err(RuntimeError::from))
        .and_then(|tree| {
            let node = patcher.create_node(&tree, runtime)?;
            runtime.document().append_child(container, node)?;
            Ok(tree)
        });
    match replaced {
        Ok(tree) => boundary.set_snapshot(Some(tree)),
        Err(err) => error!(boundary = %boundary.name(), error = %err, "Failed to render error fallback"),
    }
}

/// Default view for errors no boundary caught
pub fn error_view(error: &CaughtError) -> VNode {
    let mut container_style = BTreeMap::new();
    for (property, value) in [
        ("background-color", "#ffebee"),
        ("color", "#b71c1c"),
        ("padding", "20px"),
        ("margin", "20px"),
        ("border", "1px solid #ef9a9a"),
        ("border-radius", "4px"),
        ("font-family", "Arial, sans-serif"),
    ] {
        container_style.insert(property.to_string(), Value::from(value));
    }
    let mut detail_style = BTreeMap::new();
    for (property, value) in [
        ("white-space", "pre-wrap"),
        ("font-size", "12px"),
        ("margin-top", "10px"),
        ("background-color", "#f8f8f8"),
        ("padding", "10px"),
        ("border-radius", "4px"),
    ] {
        detail_style.insert(property.to_string(), Value::from(value));
    }

    VNode::element("div")
        .with_prop("class", "ant-error")
        .with_prop("style", container_style)
        .with_child(VNode::element("h2").with_child(VNode::text("An error occurred")))
        .with_child(VNode::element("p").with_child(VNode::text(error.message.clone())))
        .with_child(
            VNode::element("pre")
                .with_prop("style", detail_style)
                .with_child(VNode::text(error.detail.clone())),
        )
}

/// Replace the application root with [`error_view`]
fn show_global_error(runtime: &Runtime, error: CaughtError) {
    if let Some(shown) = runtime.global_error() {
        warn!(error = %error, shown = %shown, "Global error view already shown");
        return;
    }
    error!(kind = ?error.kind, error = %error, detail = %error.detail, "Unhandled error");

    let document = runtime.document().clone();
    let root = runtime
        .mount_root()
        .or_else(|| document.query(&runtime.config().mount_selector))
        .unwrap_or_else(|| document.root());
    runtime.detach_components_at(root);

    let patcher = runtime.patcher();
    patcher.cancel(root);
    let shown = patcher
        .release_children(root, runtime, false)
        .and_then(|_| patcher.create_node(&error_view(&error), runtime))
        .and_then(|view| document.append_child(root, view));
    match shown {
        Ok(()) => info!(root = ?root, "Displayed global error view"),
        Err(err) => error!(error = %err, "Failed to display global error view"),
    }
    runtime.set_global_error(error);
}
