//! Subscriber types for the reactive system.
//!
//! A Subscriber is anything that can sit in a dependency set: in practice a
//! [`Watcher`](super::Watcher), but tests and embedders can plug in their own.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::Dep;
use crate::error::Result;

/// Unique identifier for a subscriber.
///
/// Dependency sets compare subscribers by this ID, so it doubles as the
/// subscriber's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that depends on reactive slots.
///
/// The methods take `Rc<Self>` so an implementation can hand a weak
/// reference to itself to the dependency set it joins.
pub trait Subscriber {
    /// Identity used for de-duplication and removal.
    fn subscriber_id(&self) -> SubscriberId;

    /// Ask to be subscribed to `dep`.
    ///
    /// Called from [`Dep::depend`] while this subscriber is the active
    /// evaluation. The subscriber decides whether it is already subscribed.
    fn add_dep(self: Rc<Self>, dep: &Dep);

    /// React to a change in one of the subscribed slots.
    fn update(self: Rc<Self>) -> Result<()>;
}
