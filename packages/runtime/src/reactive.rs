//! Observed key/value stores backing component state, props and refs.
//!
//! A [`ReactiveMap`] stores values behind interior mutability and calls its
//! notifier after a write that actually changed something. Equality follows
//! [`Value`]'s comparison, so writing an identical value is silent.

use ant_vdom::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::trace;

pub type Notify = Rc<dyn Fn()>;

/// Which writes notify the owner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPolicy {
    /// Any changed key
    AnyKey,
    /// Only a change to a `value` key that already existed, the way refs behave
    ExistingValueKey,
}

pub const REF_VALUE_KEY: &str = "value";

pub struct ReactiveMap {
    values: RefCell<BTreeMap<String, Value>>,
    policy: TriggerPolicy,
    notify: Option<Notify>,
}

impl ReactiveMap {
    pub fn new(values: BTreeMap<String, Value>, policy: TriggerPolicy) -> Self {
        Self {
            values: RefCell::new(values),
            policy,
            notify: None,
        }
    }

    pub fn observed(values: BTreeMap<String, Value>, policy: TriggerPolicy, notify: Notify) -> Self {
        Self {
            values: RefCell::new(values),
            policy,
            notify: Some(notify),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.borrow().contains_key(key)
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.values.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    /// Write `value` under `key`. Returns whether the stored value changed.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        let (changed, existed) = {
            let mut values = self.values.borrow_mut();
            let existed = values.contains_key(&key);
            if values.get(&key) == Some(&value) {
                (false, existed)
            } else {
                values.insert(key.clone(), value);
                (true, existed)
            }
        };
        if changed {
            self.changed(&key, existed);
        }
        changed
    }

    /// Derive the next value of `key` from the current one
    pub fn update(&self, key: impl Into<String>, f: impl FnOnce(Option<&Value>) -> Value) -> bool {
        let key = key.into();
        let next = f(self.values.borrow().get(&key));
        self.set(key, next)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.values.borrow_mut().remove(key);
        if removed.is_some() {
            self.changed(key, true);
        }
        removed
    }

    /// Swap in a whole new set of values without notifying
    pub fn replace_silently(&self, values: BTreeMap<String, Value>) {
        *self.values.borrow_mut() = values;
    }

    fn changed(&self, key: &str, existed: bool) {
        let triggers = match self.policy {
            TriggerPolicy::AnyKey => true,
            TriggerPolicy::ExistingValueKey => existed && key == REF_VALUE_KEY,
        };
        trace!(key, triggers, "Reactive write");
        if triggers {
            if let Some(notify) = &self.notify {
                notify();
            }
        }
    }
}
