//! Test-only subscriber used by the unit tests of the reactive modules.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::dep::{Dep, DepId};
use super::subscriber::{Subscriber, SubscriberId};
use crate::error::Result;

/// Records how often it was updated and in which order relative to peers.
pub(crate) struct Recorder {
    id: SubscriberId,
    updates: Cell<usize>,
    deps: RefCell<Vec<DepId>>,
    log: Option<Rc<RefCell<Vec<SubscriberId>>>>,
}

impl Recorder {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            id: SubscriberId::new(),
            updates: Cell::new(0),
            deps: RefCell::new(Vec::new()),
            log: None,
        })
    }

    pub(crate) fn with_log(log: Rc<RefCell<Vec<SubscriberId>>>) -> Rc<Self> {
        Rc::new(Self {
            id: SubscriberId::new(),
            updates: Cell::new(0),
            deps: RefCell::new(Vec::new()),
            log: Some(log),
        })
    }

    pub(crate) fn updates(&self) -> usize {
        self.updates.get()
    }
}

impl Subscriber for Recorder {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn add_dep(self: Rc<Self>, dep: &Dep) {
        if self.deps.borrow().contains(&dep.id()) {
            return;
        }
        self.deps.borrow_mut().push(dep.id());
        let weak = Rc::downgrade(&self);
        dep.add_subscriber(self.id, weak);
    }

    fn update(self: Rc<Self>) -> Result<()> {
        self.updates.set(self.updates.get() + 1);
        if let Some(log) = &self.log {
            log.borrow_mut().push(self.id);
        }
        Ok(())
    }
}
