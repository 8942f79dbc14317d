//! Deep Observer
//!
//! `observe` turns a plain data tree into a reactive one. Every object key
//! that exists at that moment becomes a reactive slot, every array gets an
//! observer whose dependency set fires on mutation, and the walk recurses
//! into nested values.
//!
//! Each observed container is tagged with its `Observer`, so observing
//! twice returns the same handle and installs nothing new. The tag is set
//! before the walk descends, which also makes self-referencing trees safe.
//!
//! Keys added to an object after it was observed stay plain. Use
//! [`define_reactive`](super::define_reactive) to make one reactive
//! explicitly.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use super::array::Array;
use super::dep::Dep;
use super::object::{define_reactive, Object};
use super::value::{CycleGuard, Value};

fn next_observer_id() -> u64 {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

struct ObserverInner {
    id: u64,
    /// Container-level set, notified on whole-array mutations.
    dep: Dep,
}

/// Tag attached to an observed object or array.
#[derive(Clone)]
pub struct Observer(Rc<ObserverInner>);

impl Observer {
    fn new() -> Self {
        Self(Rc::new(ObserverInner {
            id: next_observer_id(),
            dep: Dep::new(),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// The container-level dependency set.
    pub fn dep(&self) -> &Dep {
        &self.0.dep
    }

    pub fn ptr_eq(&self, other: &Observer) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn walk(&self, object: &Object) {
        for (key, value) in object.plain_entries() {
            define_reactive(object, key, value);
        }
    }
}

impl fmt::Debug for Observer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer")
            .field("id", &self.0.id)
            .field("dep", &self.0.dep)
            .finish()
    }
}

/// Make `value` reactive.
///
/// Returns the value's observer, creating it on first call. Scalars,
/// `undefined`, `null` and opaque host objects are not observable and
/// yield `None`.
pub fn observe(value: &Value) -> Option<Observer> {
    match value {
        Value::Object(object) => Some(observe_object(object)),
        Value::Array(array) => Some(observe_array(array)),
        _ => None,
    }
}

fn observe_object(object: &Object) -> Observer {
    if let Some(existing) = object.observer() {
        return existing;
    }

    let observer = Observer::new();
    object.tag(observer.clone());
    debug!(observer = observer.id(), keys = object.len(), "observing object");
    observer.walk(object);
    observer
}

fn observe_array(array: &Array) -> Observer {
    if let Some(existing) = array.observer() {
        return existing;
    }

    let observer = Observer::new();
    array.tag(observer.clone());
    debug!(observer = observer.id(), len = array.len(), "observing array");
    observe_items(&array.to_vec());
    observer
}

/// Observe every element of a slice; used for array contents and for
/// elements inserted by a mutation.
pub(crate) fn observe_items(items: &[Value]) {
    for item in items {
        observe(item);
    }
}

/// Subscribe the active evaluation to the observer of every element in
/// `array`, descending into nested arrays.
pub fn depend_array(array: &Array) {
    let Some(_guard) = CycleGuard::enter(array.as_ptr()) else {
        return;
    };
    for item in array.to_vec() {
        if let Some(observer) = item.observer() {
            observer.dep().depend();
        }
        if let Value::Array(nested) = &item {
            depend_array(nested);
        }
    }
}
