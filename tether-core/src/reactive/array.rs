//! Observed arrays.
//!
//! Element reads and raw index writes are not reactive. Instead the array
//! only exposes a fixed mutation surface; on an observed array every one of
//! these operations mutates, observes whatever it inserted, and then
//! notifies the array's container-level dependency set. On an array that
//! has not been observed yet they just mutate.

use std::cell::{OnceCell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::observer::{observe_items, Observer};
use super::value::{CycleGuard, Value};
use crate::error::{Result, TetherError};

/// Largest index an array accepts (one below the maximum script array
/// length). Storage is dense, so growing toward it can still fail to
/// allocate; that failure is reported as the same error.
pub const MAX_INDEX: usize = u32::MAX as usize - 1;

/// Extend `items` with `Undefined` so that `index` is in bounds.
fn grow_to(items: &mut Vec<Value>, index: usize) -> Result<()> {
    if index > MAX_INDEX {
        return Err(TetherError::IndexOutOfRange { index });
    }
    if index >= items.len() {
        items
            .try_reserve(index + 1 - items.len())
            .map_err(|_| TetherError::IndexOutOfRange { index })?;
        items.resize(index + 1, Value::Undefined);
    }
    Ok(())
}

struct ArrayInner {
    items: RefCell<Vec<Value>>,
    observer: OnceCell<Observer>,
}

/// A sequence in a data tree. Cloning shares the array.
#[derive(Clone)]
pub struct Array(Rc<ArrayInner>);

impl Array {
    pub fn new() -> Self {
        Self::from_values(Vec::new())
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        Self(Rc::new(ArrayInner {
            items: RefCell::new(values.into_iter().collect()),
            observer: OnceCell::new(),
        }))
    }

    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.items.borrow().is_empty()
    }

    /// Element at `index`, or `Undefined` past the end.
    pub fn get(&self, index: usize) -> Value {
        self.0.items.borrow().get(index).cloned().unwrap_or_default()
    }

    /// Snapshot of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    /// Position of the first element identical to `item`.
    pub fn index_of(&self, item: &Value) -> Option<usize> {
        self.0.items.borrow().iter().position(|v| v.is_identical(item))
    }

    pub fn observer(&self) -> Option<Observer> {
        self.0.observer.get().cloned()
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0).cast()
    }

    /// Append one element. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        self.push_many([value.into()])
    }

    pub fn push_many(&self, values: impl IntoIterator<Item = Value>) -> Result<usize> {
        let inserted: Vec<Value> = values.into_iter().collect();
        let len = {
            let mut items = self.0.items.borrow_mut();
            items.extend(inserted.iter().cloned());
            items.len()
        };
        self.after_mutation("push", &inserted)?;
        Ok(len)
    }

    pub fn pop(&self) -> Result<Option<Value>> {
        let popped = self.0.items.borrow_mut().pop();
        self.after_mutation("pop", &[])?;
        Ok(popped)
    }

    pub fn shift(&self) -> Result<Option<Value>> {
        let shifted = {
            let mut items = self.0.items.borrow_mut();
            (!items.is_empty()).then(|| items.remove(0))
        };
        self.after_mutation("shift", &[])?;
        Ok(shifted)
    }

    /// Prepend one element. Returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> Result<usize> {
        self.unshift_many([value.into()])
    }

    pub fn unshift_many(&self, values: impl IntoIterator<Item = Value>) -> Result<usize> {
        let inserted: Vec<Value> = values.into_iter().collect();
        let len = {
            let mut items = self.0.items.borrow_mut();
            items.splice(0..0, inserted.iter().cloned());
            items.len()
        };
        self.after_mutation("unshift", &inserted)?;
        Ok(len)
    }

    /// Remove `delete_count` elements starting at `start` and insert `items`
    /// in their place. Both bounds are clamped to the array. Returns the
    /// removed elements.
    pub fn splice(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Result<Vec<Value>> {
        let removed: Vec<Value> = {
            let mut current = self.0.items.borrow_mut();
            let start = start.min(current.len());
            let end = start + delete_count.min(current.len() - start);
            current.splice(start..end, items.iter().cloned()).collect()
        };
        self.after_mutation("splice", &items)?;
        Ok(removed)
    }

    /// Sort by string form, `Undefined` last. Stable.
    pub fn sort(&self) -> Result<()> {
        self.sort_by(Value::default_sort_cmp)
    }

    /// Stable sort with a custom comparator.
    ///
    /// The comparator runs with the elements moved out, so it may read this
    /// array (it will look empty).
    pub fn sort_by<F>(&self, compare: F) -> Result<()>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let mut items = std::mem::take(&mut *self.0.items.borrow_mut());
        items.sort_by(compare);
        *self.0.items.borrow_mut() = items;
        self.after_mutation("sort", &[])
    }

    pub fn reverse(&self) -> Result<()> {
        self.0.items.borrow_mut().reverse();
        self.after_mutation("reverse", &[])
    }

    /// Replace the element at `index`, growing the array with `Undefined`
    /// when `index` is at or past the end. Returns the replaced element.
    ///
    /// Indices above [`MAX_INDEX`] fail with `IndexOutOfRange` and leave the
    /// array untouched.
    pub fn set_at(&self, index: usize, value: impl Into<Value>) -> Result<Value> {
        let value = value.into();
        let replaced = {
            let mut items = self.0.items.borrow_mut();
            grow_to(&mut items, index)?;
            std::mem::replace(&mut items[index], value.clone())
        };
        self.after_mutation("set_at", &[value])?;
        Ok(replaced)
    }

    /// Remove the first element identical to `item`.
    ///
    /// Nothing happens, and nobody is notified, when no element matches.
    pub fn remove_value(&self, item: &Value) -> Result<Option<Value>> {
        match self.index_of(item) {
            Some(index) => Ok(self.splice(index, 1, Vec::new())?.into_iter().next()),
            None => Ok(None),
        }
    }

    /// Raw index write: grows like `set_at` but observes and notifies
    /// nothing, matching a plain indexed assignment.
    pub(crate) fn write_index(&self, index: usize, value: Value) -> Result<()> {
        let mut items = self.0.items.borrow_mut();
        grow_to(&mut items, index)?;
        items[index] = value;
        Ok(())
    }

    pub(crate) fn tag(&self, observer: Observer) {
        let _ = self.0.observer.set(observer);
    }

    fn after_mutation(&self, op: &'static str, inserted: &[Value]) -> Result<()> {
        let Some(observer) = self.observer() else {
            return Ok(());
        };
        trace!(op, observer = observer.id(), inserted = inserted.len(), "array mutation");
        observe_items(inserted);
        observer.dep().notify()
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match CycleGuard::enter(self.as_ptr()) {
            Some(_guard) => f.debug_list().entries(self.to_vec()).finish(),
            None => f.write_str("[Circular]"),
        }
    }
}
