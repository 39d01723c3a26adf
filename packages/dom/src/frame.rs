//! Frame-aligned patch queue.
//!
//! Patches produced by re-renders are not applied immediately. They wait in a
//! [`FrameQueue`] until the host grants the next animation frame, at which
//! point every queued job is applied in enqueue order.

use crate::host::NodeId;
use ant_vdom::Patch;
use std::cell::RefCell;
use std::collections::VecDeque;

pub type FrameCallback = Box<dyn FnOnce()>;

/// Environment that grants animation frames
pub trait FrameHost {
    /// Run `callback` before the next repaint. Must not run it synchronously.
    fn request_frame(&self, callback: FrameCallback);
}

/// Frame host advanced by hand
#[derive(Default)]
pub struct ManualFrameHost {
    pending: RefCell<VecDeque<FrameCallback>>,
}

impl ManualFrameHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Run every frame callback requested so far. Callbacks requested while
    /// ticking wait for the next tick. Returns how many ran.
    pub fn tick(&self) -> usize {
        let callbacks: Vec<FrameCallback> = self.pending.borrow_mut().drain(..).collect();
        let ran = callbacks.len();
        for callback in callbacks {
            callback();
        }
        ran
    }
}

impl FrameHost for ManualFrameHost {
    fn request_frame(&self, callback: FrameCallback) {
        self.pending.borrow_mut().push_back(callback);
    }
}

/// Patch list to apply to the children of `parent`
#[derive(Debug, Clone)]
pub struct FrameJob {
    pub parent: NodeId,
    pub patches: Vec<Patch>,
}

#[derive(Debug, Default)]
pub struct FrameQueue {
    jobs: VecDeque<FrameJob>,
    scheduled: bool,
    flushing: bool,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a job. Returns true when the caller must request a frame.
    pub fn push(&mut self, job: FrameJob) -> bool {
        self.jobs.push_back(job);
        if self.scheduled || self.flushing {
            return false;
        }
        self.scheduled = true;
        true
    }

    pub fn pop(&mut self) -> Option<FrameJob> {
        self.jobs.pop_front()
    }

    /// Drop every job whose parent matches `cancelled`. Returns how many were dropped.
    pub fn cancel(&mut self, mut cancelled: impl FnMut(NodeId) -> bool) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|job| !cancelled(job.parent));
        before - self.jobs.len()
    }

    pub fn begin_flush(&mut self) {
        self.scheduled = false;
        self.flushing = true;
    }

    pub fn end_flush(&mut self) {
        self.flushing = false;
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn job(parent: u64) -> FrameJob {
        FrameJob {
            parent: NodeId(parent),
            patches: vec![Patch::Remove { index: 0 }],
        }
    }

    #[test]
    fn test_only_first_push_requests_frame() {
        let mut queue = FrameQueue::new();
        assert!(queue.push(job(1)));
        assert!(!queue.push(job(2)));
        assert_eq!(queue.len(), 2);

        queue.begin_flush();
        assert!(!queue.push(job(3)));
        assert_eq!(queue.pop().map(|j| j.parent), Some(NodeId(1)));
        while queue.pop().is_some() {}
        queue.end_flush();

        assert!(queue.push(job(4)));
    }

    #[test]
    fn test_cancel_drops_matching_jobs_in_order() {
        let mut queue = FrameQueue::new();
        queue.push(job(1));
        queue.push(job(2));
        queue.push(job(1));
        queue.push(job(3));

        assert_eq!(queue.cancel(|parent| parent == NodeId(1)), 2);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().map(|j| j.parent), Some(NodeId(2)));
        assert_eq!(queue.pop().map(|j| j.parent), Some(NodeId(3)));
        assert_eq!(queue.cancel(|_| true), 0);
    }

    #[test]
    fn test_manual_frame_host_defers_callbacks() {
        let host = Rc::new(ManualFrameHost::new());
        let count = Rc::new(Cell::new(0));

        let inner_host = host.clone();
        let c = count.clone();
        host.request_frame(Box::new(move || {
            c.set(c.get() + 1);
            let c = c.clone();
            inner_host.request_frame(Box::new(move || c.set(c.get() + 10)));
        }));

        assert_eq!(count.get(), 0);
        assert_eq!(host.tick(), 1);
        assert_eq!(count.get(), 1);
        assert_eq!(host.pending(), 1);
        host.tick();
        assert_eq!(count.get(), 11);
    }
}
