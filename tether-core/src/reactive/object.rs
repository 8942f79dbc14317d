//! Reactive objects.
//!
//! An [`Object`] is an ordered string-keyed map. Before observation every
//! property is plain. [`define_reactive`] replaces a property with a
//! [`ReactiveSlot`]: the current value plus a private dependency set. Reads
//! of a slot register the active evaluation; writes that change the value
//! notify whoever registered.

use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::observer::{depend_array, observe, Observer};
use super::value::{CycleGuard, Value};
use crate::error::Result;

/// One reactive property: its value and the watchers that read it.
pub(crate) struct ReactiveSlot {
    dep: Dep,
    value: Value,
}

impl ReactiveSlot {
    fn new(value: Value) -> Self {
        Self {
            dep: Dep::new(),
            value,
        }
    }

    /// Tracked read.
    ///
    /// Besides the slot itself, the active evaluation also subscribes to the
    /// current value's container-level set (and those of nested array
    /// elements), so it hears about in-place mutations.
    fn get(&self) -> Value {
        if ReactiveContext::is_active() {
            self.dep.depend();
            if let Some(child) = self.value.observer() {
                child.dep().depend();
                if let Value::Array(array) = &self.value {
                    depend_array(array);
                }
            }
        }
        self.value.clone()
    }

    /// Store `value`, returning the set to notify if it actually changed.
    fn set(&mut self, value: Value) -> Option<Dep> {
        if self.value.is_identical(&value) {
            return None;
        }
        self.value = value;
        Some(self.dep.clone())
    }
}

enum Property {
    Plain(Value),
    Reactive(ReactiveSlot),
}

impl Property {
    fn peek(&self) -> &Value {
        match self {
            Property::Plain(value) => value,
            Property::Reactive(slot) => &slot.value,
        }
    }
}

struct ObjectInner {
    props: RefCell<IndexMap<String, Property>>,
    observer: OnceCell<Observer>,
}

/// A string-keyed object in a data tree. Cloning shares the object.
#[derive(Clone)]
pub struct Object(Rc<ObjectInner>);

impl Object {
    pub fn new() -> Self {
        Self(Rc::new(ObjectInner {
            props: RefCell::new(IndexMap::new()),
            observer: OnceCell::new(),
        }))
    }

    /// Build a plain object from key/value pairs, keeping their order.
    pub fn from_entries<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let props = entries
            .into_iter()
            .map(|(key, value)| (key.into(), Property::Plain(value)))
            .collect();
        Self(Rc::new(ObjectInner {
            props: RefCell::new(props),
            observer: OnceCell::new(),
        }))
    }

    /// Read a property. Missing keys read as `Undefined`.
    ///
    /// Reading a reactive property while a watcher evaluates subscribes that
    /// watcher.
    pub fn get(&self, key: &str) -> Value {
        let props = self.0.props.borrow();
        match props.get(key) {
            Some(Property::Reactive(slot)) => slot.get(),
            Some(Property::Plain(value)) => value.clone(),
            None => Value::Undefined,
        }
    }

    /// Read a property without registering any dependency.
    pub fn get_untracked(&self, key: &str) -> Value {
        self.0
            .props
            .borrow()
            .get(key)
            .map(|prop| prop.peek().clone())
            .unwrap_or_default()
    }

    /// Write a property.
    ///
    /// On a reactive property an identical value is ignored; anything else
    /// is stored, observed, and then every subscriber is notified in order.
    /// Plain and missing keys are written without any notification; a
    /// missing key becomes a plain property.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let dep = {
            let mut props = self.0.props.borrow_mut();
            match props.get_mut(key) {
                Some(Property::Reactive(slot)) => match slot.set(value.clone()) {
                    Some(dep) => dep,
                    None => return Ok(()),
                },
                Some(Property::Plain(existing)) => {
                    *existing = value;
                    return Ok(());
                }
                None => {
                    props.insert(key.to_owned(), Property::Plain(value));
                    return Ok(());
                }
            }
        };

        trace!(key, dep = dep.id().raw(), "reactive write");
        observe(&value);
        dep.notify()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.props.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.props.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.props.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.props.borrow().is_empty()
    }

    pub fn is_reactive(&self, key: &str) -> bool {
        matches!(self.0.props.borrow().get(key), Some(Property::Reactive(_)))
    }

    /// The private dependency set of a reactive property.
    pub fn dep_of(&self, key: &str) -> Option<Dep> {
        match self.0.props.borrow().get(key) {
            Some(Property::Reactive(slot)) => Some(slot.dep.clone()),
            _ => None,
        }
    }

    pub fn observer(&self) -> Option<Observer> {
        self.0.observer.get().cloned()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0).cast()
    }

    /// Snapshot of all properties, untracked.
    pub fn entries_untracked(&self) -> Vec<(String, Value)> {
        self.0
            .props
            .borrow()
            .iter()
            .map(|(key, prop)| (key.clone(), prop.peek().clone()))
            .collect()
    }

    pub(crate) fn tag(&self, observer: Observer) {
        // Only ever called once, right after the `observer()` check.
        let _ = self.0.observer.set(observer);
    }

    pub(crate) fn plain_entries(&self) -> Vec<(String, Value)> {
        self.0
            .props
            .borrow()
            .iter()
            .filter_map(|(key, prop)| match prop {
                Property::Plain(value) => Some((key.clone(), value.clone())),
                Property::Reactive(_) => None,
            })
            .collect()
    }

    fn install(&self, key: String, slot: ReactiveSlot) {
        self.0
            .props
            .borrow_mut()
            .insert(key, Property::Reactive(slot));
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match CycleGuard::enter(self.as_ptr()) {
            Some(_guard) => f.debug_map().entries(self.entries_untracked()).finish(),
            None => f.write_str("[Circular]"),
        }
    }
}

/// Install a reactive slot for `key` on `object`, seeded with `value`.
///
/// The value is observed before the slot closes over it. An existing
/// property under the same key is replaced, along with its subscribers.
pub fn define_reactive(object: &Object, key: impl Into<String>, value: Value) {
    observe(&value);
    object.install(key.into(), ReactiveSlot::new(value));
}
