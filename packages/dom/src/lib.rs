//! # Ant DOM
//!
//! The live side of reconciliation. [`HostDocument`] abstracts the document
//! being mutated; [`Patcher`] applies differ output to it through a
//! frame-aligned queue, recycling elements and tracking event listeners.
//! [`MemoryDocument`] is an in-process document for headless use and tests.

pub mod frame;
pub mod host;
pub mod listeners;
pub mod memory;
pub mod metrics;
pub mod patcher;
pub mod pool;

pub use frame::{FrameCallback, FrameHost, FrameJob, FrameQueue, ManualFrameHost};
pub use host::{is_valid_attribute_name, DomError, DomResult, HostDocument, ListenerId, NodeId, NodeKind};
pub use listeners::{event_name, ListenerTable};
pub use memory::MemoryDocument;
pub use metrics::{Clock, MetricGuard, MetricSummary, PerformanceMetrics};
pub use patcher::{DetachedContext, PatchContext, Patcher, PatcherOptions};
pub use pool::ElementPool;
