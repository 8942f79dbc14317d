//! Dependency Sets
//!
//! A `Dep` is the registry of subscribers interested in one observable slot.
//! There is one per reactive property and one per observed container (for
//! whole-container notifications such as an array `push`).
//!
//! # Ordering
//!
//! Subscribers are kept in insertion order and notified in that order. The
//! list is snapshotted before a notification pass, so callbacks that
//! subscribe or unsubscribe while the pass is running only affect later
//! passes.
//!
//! # Ownership
//!
//! A `Dep` holds weak references. Subscribers are owned by whoever created
//! them (for watchers, the binding context); a dropped subscriber is skipped
//! silently.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use super::context::ReactiveContext;
use super::subscriber::{Subscriber, SubscriberId};
use crate::error::Result;

/// Unique identifier for a dependency set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepId(u64);

impl DepId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

#[derive(Clone)]
struct Entry {
    id: SubscriberId,
    subscriber: Weak<dyn Subscriber>,
}

struct DepInner {
    id: DepId,
    subs: RefCell<Vec<Entry>>,
}

/// Ordered set of subscribers for one slot. Cloning shares the set.
#[derive(Clone)]
pub struct Dep(Rc<DepInner>);

impl Dep {
    /// Create an empty dependency set with a fresh ID.
    pub fn new() -> Self {
        Self(Rc::new(DepInner {
            id: DepId::next(),
            subs: RefCell::new(Vec::new()),
        }))
    }

    pub fn id(&self) -> DepId {
        self.0.id
    }

    /// Append a subscriber.
    ///
    /// No de-duplication happens here; subscribers call this at most once
    /// per set from their own `add_dep`.
    pub fn add_subscriber(&self, id: SubscriberId, subscriber: Weak<dyn Subscriber>) {
        trace!(dep = self.0.id.0, subscriber = id.raw(), "subscribe");
        self.0.subs.borrow_mut().push(Entry { id, subscriber });
    }

    /// Remove the first subscriber with this ID. No-op when absent.
    pub fn remove_subscriber(&self, id: SubscriberId) {
        let mut subs = self.0.subs.borrow_mut();
        if let Some(index) = subs.iter().position(|entry| entry.id == id) {
            subs.remove(index);
        }
    }

    /// Ask the active evaluation, if any, to subscribe to this set.
    pub fn depend(&self) {
        if let Some(current) = ReactiveContext::current() {
            current.add_dep(self);
        }
    }

    /// Call `update` on every subscriber, in subscription order.
    ///
    /// The first error aborts the pass and is returned.
    pub fn notify(&self) -> Result<()> {
        let snapshot = self.0.subs.borrow().clone();
        trace!(dep = self.0.id.0, subscribers = snapshot.len(), "notify");

        for entry in snapshot {
            if let Some(subscriber) = entry.subscriber.upgrade() {
                subscriber.update()?;
            }
        }
        Ok(())
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.subs.borrow().len()
    }

    /// Subscriber IDs in notification order.
    pub fn subscriber_ids(&self) -> Vec<SubscriberId> {
        self.0.subs.borrow().iter().map(|entry| entry.id).collect()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.0.subs.borrow().iter().any(|entry| entry.id == id)
    }

    pub fn ptr_eq(&self, other: &Dep) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.0.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
