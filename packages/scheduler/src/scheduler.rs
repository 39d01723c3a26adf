//! # Render scheduler
//!
//! Pending effects live in a [`PriorityQueue`] and are drained during idle
//! slices granted by an [`IdleHost`]. Lower priority values run first; equal
//! priorities run in the order they were scheduled.
//!
//! The drain loop never runs work synchronously from `schedule_update`: it
//! requests a slice, runs effects while the slice has time left, and requests
//! another slice when work remains.
//!
//! Between [`Scheduler::start_batch`] and [`Scheduler::end_batch`] every
//! scheduled effect is buffered. Batches do not nest.

use crate::idle::{IdleDeadline, IdleHost};
use crate::queue::PriorityQueue;
use serde::Serialize;
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use tracing::{debug, error, trace, warn};

/// A re-runnable unit of work, usually a component re-render
pub type Effect = Rc<dyn Fn()>;

/// Counters describing scheduler activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub scheduled: u64,
    pub executed: u64,
    pub panicked: u64,
    pub slices: u64,
    pub yields: u64,
    pub batches: u64,
    pub interrupted: u64,
}

struct Current {
    token: u64,
    effect: Effect,
}

struct State {
    queue: PriorityQueue<Effect>,
    current: Option<Current>,
    next_token: u64,
    is_rendering: bool,
    is_batching: bool,
    batched: Vec<(Effect, i32)>,
    stats: SchedulerStats,
}

impl State {
    fn set_current(&mut self, effect: Effect) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        self.current = Some(Current { token, effect });
        token
    }

    fn has_work(&self) -> bool {
        self.current.is_some() || !self.queue.is_empty()
    }
}

struct Inner {
    host: Rc<dyn IdleHost>,
    state: RefCell<State>,
}

/// Cooperative idle-time scheduler. Cloning shares the same queue.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

impl Scheduler {
    pub fn new(host: Rc<dyn IdleHost>) -> Self {
        Self {
            inner: Rc::new(Inner {
                host,
                state: RefCell::new(State {
                    queue: PriorityQueue::new(),
                    current: None,
                    next_token: 0,
                    is_rendering: false,
                    is_batching: false,
                    batched: Vec::new(),
                    stats: SchedulerStats::default(),
                }),
            }),
        }
    }

    /// Queue `effect` at `priority`, or buffer it while a batch is open
    pub fn schedule_update(&self, effect: Effect, priority: i32) {
        let start = {
            let mut state = self.inner.state.borrow_mut();
            state.stats.scheduled += 1;
            if state.is_batching {
                state.batched.push((effect, priority));
                trace!(priority, buffered = state.batched.len(), "Buffered effect in batch");
                return;
            }
            state.queue.push(effect, priority);
            trace!(priority, queued = state.queue.len(), "Queued effect");
            !state.is_rendering
        };

        if start {
            self.process_queue();
        }
    }

    /// Open a batch. All effects scheduled until [`Scheduler::end_batch`] are buffered.
    pub fn start_batch(&self) {
        let mut state = self.inner.state.borrow_mut();
        if state.is_batching {
            warn!(
                buffered = state.batched.len(),
                "start_batch called inside an open batch; buffered effects are discarded"
            );
        }
        state.is_batching = true;
        state.batched.clear();
    }

    /// Close the batch, move every buffered effect into the queue and start draining
    pub fn end_batch(&self) {
        let start = {
            let mut state = self.inner.state.borrow_mut();
            if !state.is_batching {
                warn!("end_batch called without an open batch");
            }
            state.is_batching = false;
            let batched = std::mem::take(&mut state.batched);
            let flushed = batched.len();
            for (effect, priority) in batched {
                state.queue.push(effect, priority);
            }
            state.stats.batches += 1;
            debug!(flushed, queued = state.queue.len(), "Flushed batch");
            !state.is_rendering
        };

        if start {
            self.process_queue();
        }
    }

    /// Run `updates` inside a batch
    pub fn batch<R>(&self, updates: impl FnOnce() -> R) -> R {
        self.start_batch();
        let result = updates();
        self.end_batch();
        result
    }

    /// Put the in-flight task back in the queue at `priority + 1` and make
    /// `new_task` the current task.
    ///
    /// The preempted task reruns from the start when it is dequeued again.
    pub fn interrupt_current_task(&self, new_task: Effect, priority: i32) {
        let start = {
            let mut state = self.inner.state.borrow_mut();
            if let Some(preempted) = state.current.take() {
                state.queue.push(preempted.effect, priority.saturating_add(1));
                state.stats.interrupted += 1;
                debug!(requeued_priority = priority.saturating_add(1), "Interrupted current task");
            }
            state.set_current(new_task);
            !state.is_rendering
        };

        if start {
            self.process_queue();
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.inner.state.borrow().is_rendering
    }

    pub fn is_batching(&self) -> bool {
        self.inner.state.borrow().is_batching
    }

    /// Effects waiting in the queue, excluding the current task
    pub fn pending(&self) -> usize {
        self.inner.state.borrow().queue.len()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.inner.state.borrow().stats
    }

    fn process_queue(&self) {
        {
            let mut state = self.inner.state.borrow_mut();
            if !state.has_work() {
                state.is_rendering = false;
                return;
            }
            state.is_rendering = true;
        }

        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        self.inner.host.request_idle(Box::new(move |deadline| {
            if let Some(inner) = weak.upgrade() {
                Scheduler { inner }.run_slice(deadline);
            }
        }));
    }

    fn run_slice(&self, deadline: &dyn IdleDeadline) {
        self.inner.state.borrow_mut().stats.slices += 1;
        let mut ran = 0usize;

        loop {
            if deadline.time_remaining().is_zero() {
                break;
            }

            let next = {
                let mut state = self.inner.state.borrow_mut();
                if state.current.is_none() {
                    if let Some(effect) = state.queue.pop() {
                        state.set_current(effect);
                    }
                }
                state
                    .current
                    .as_ref()
                    .map(|current| (current.token, current.effect.clone()))
            };

            let Some((token, effect)) = next else {
                break;
            };

            self.run_effect(&effect);
            ran += 1;

            let mut state = self.inner.state.borrow_mut();
            // An interruption during the effect substitutes a new current task
            if state.current.as_ref().map(|c| c.token) == Some(token) {
                state.current = None;
            }
        }

        let more = self.inner.state.borrow().has_work();
        trace!(ran, more, "Idle slice finished");
        if more {
            self.inner.state.borrow_mut().stats.yields += 1;
            self.process_queue();
        } else {
            self.inner.state.borrow_mut().is_rendering = false;
        }
    }

    fn run_effect(&self, effect: &Effect) {
        let outcome = catch_unwind(AssertUnwindSafe(|| effect()));
        let mut state = self.inner.state.borrow_mut();
        state.stats.executed += 1;
        if outcome.is_err() {
            state.stats.panicked += 1;
            error!("Scheduled effect panicked; continuing with remaining work");
        }
    }
}
