use std::cell::RefCell;
use std::rc::Rc;

pub type Hook = Rc<dyn Fn()>;

/// Append-only lifecycle hook lists of a component
#[derive(Default)]
pub struct LifecycleHooks {
    mounted: RefCell<Vec<Hook>>,
    updated: RefCell<Vec<Hook>>,
    unmounted: RefCell<Vec<Hook>>,
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_mounted(&self, hook: Hook) {
        self.mounted.borrow_mut().push(hook);
    }

    pub fn on_updated(&self, hook: Hook) {
        self.updated.borrow_mut().push(hook);
    }

    pub fn on_unmounted(&self, hook: Hook) {
        self.unmounted.borrow_mut().push(hook);
    }

    pub fn run_mounted(&self) {
        run(&self.mounted);
    }

    pub fn run_updated(&self) {
        run(&self.updated);
    }

    pub fn run_unmounted(&self) {
        run(&self.unmounted);
    }
}

// Hooks may register further hooks, so run from a copy of the list
fn run(hooks: &RefCell<Vec<Hook>>) {
    let hooks = hooks.borrow().clone();
    for hook in hooks {
        hook();
    }
}
