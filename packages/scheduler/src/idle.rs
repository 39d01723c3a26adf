//! Idle-time facility abstraction.
//!
//! Browsers offer `requestIdleCallback`; [`IdleHost`] is the seam the
//! scheduler drains through. [`ManualIdleHost`] grants slices on demand and is
//! what tests and headless hosts use.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

/// Remaining budget of one idle slice
pub trait IdleDeadline {
    fn time_remaining(&self) -> Duration;

    fn did_timeout(&self) -> bool {
        false
    }
}

pub type IdleCallback = Box<dyn FnOnce(&dyn IdleDeadline)>;

/// Environment that grants idle slices
pub trait IdleHost {
    /// Queue `callback` to run during the next idle period. Must not run it
    /// synchronously.
    fn request_idle(&self, callback: IdleCallback);
}

/// Deadline that reports remaining time for a fixed number of checks.
///
/// The drain loop checks the deadline once before each effect, so a budget of
/// `n` lets exactly `n` effects run in the slice.
pub struct TaskBudget {
    remaining: Cell<usize>,
}

impl TaskBudget {
    pub fn new(tasks: usize) -> Self {
        Self {
            remaining: Cell::new(tasks),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(usize::MAX)
    }
}

impl IdleDeadline for TaskBudget {
    fn time_remaining(&self) -> Duration {
        let left = self.remaining.get();
        if left == 0 {
            Duration::ZERO
        } else {
            self.remaining.set(left - 1);
            Duration::from_millis(1)
        }
    }
}

/// Idle host driven explicitly by its owner
#[derive(Default)]
pub struct ManualIdleHost {
    pending: RefCell<VecDeque<IdleCallback>>,
    granted: Cell<usize>,
}

impl ManualIdleHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding idle requests
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Total number of slices granted so far
    pub fn granted(&self) -> usize {
        self.granted.get()
    }

    /// Grant one slice to the oldest request. Returns false if nothing was waiting.
    pub fn run_slice(&self, deadline: &dyn IdleDeadline) -> bool {
        let next = self.pending.borrow_mut().pop_front();
        match next {
            Some(callback) => {
                self.granted.set(self.granted.get() + 1);
                callback(deadline);
                true
            }
            None => false,
        }
    }

    /// Grant slices of `tasks_per_slice` effects until no request is outstanding
    pub fn run_until_idle(&self, tasks_per_slice: usize) -> usize {
        let mut slices = 0;
        while self.run_slice(&TaskBudget::new(tasks_per_slice)) {
            slices += 1;
        }
        slices
    }
}

impl IdleHost for ManualIdleHost {
    fn request_idle(&self, callback: IdleCallback) {
        self.pending.borrow_mut().push_back(callback);
    }
}
