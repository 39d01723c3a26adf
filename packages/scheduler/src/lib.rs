//! # Ant Scheduler
//!
//! Single-threaded, cooperative scheduling of render effects over idle-time
//! slices. See [`scheduler`] for the drain loop and batching rules.

pub mod idle;
pub mod queue;
pub mod scheduler;

pub use idle::{IdleCallback, IdleDeadline, IdleHost, ManualIdleHost, TaskBudget};
pub use queue::PriorityQueue;
pub use scheduler::{Effect, Scheduler, SchedulerStats};
