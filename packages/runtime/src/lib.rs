//! # Ant Runtime
//!
//! Component instances and the pipeline from reactive state to the document:
//!
//! ```text
//! state write -> Scheduler (idle slice) -> render -> diff -> frame queue -> Patcher
//! ```
//!
//! Errors raised along the way are routed to the nearest [`App::error_boundary`]
//! or, failing that, to a global error view over the mount root.

pub mod app;
pub mod boundary;
pub mod component;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod reactive;

pub use app::{App, Headless, Runtime};
pub use boundary::{error_view, CaughtError, ErrorKind};
pub use component::{Component, ComponentDef, MountTarget, RenderFn, RenderScope, WeakComponent};
pub use config::{ConfigError, LoggingConfig, RuntimeConfig, DEFAULT_CONFIG_NAME};
pub use error::{RenderError, RuntimeError, RuntimeResult};
pub use lifecycle::{Hook, LifecycleHooks};
pub use logging::init_logging;
pub use reactive::{ReactiveMap, TriggerPolicy};
