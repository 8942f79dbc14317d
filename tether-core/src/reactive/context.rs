//! Reactive Context
//!
//! The reactive context is the evaluation cursor: a single slot naming the
//! subscriber that is currently resolving its dependencies. Reactive slots
//! consult it on every read to decide whom to register.
//!
//! # Implementation
//!
//! The slot is thread-local. Entering a context stores the subscriber and
//! remembers whatever was there before; dropping the guard puts the old
//! occupant back, including when an evaluation bails out early with `?`.

use std::cell::RefCell;
use std::rc::Rc;

use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    static CURSOR: RefCell<Option<Rc<dyn Subscriber>>> = const { RefCell::new(None) };
}

/// Guard that clears the cursor when dropped.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
    previous: Option<Rc<dyn Subscriber>>,
}

impl ReactiveContext {
    /// Point the cursor at `subscriber` until the returned guard drops.
    pub fn enter(subscriber: Rc<dyn Subscriber>) -> Self {
        let subscriber_id = subscriber.subscriber_id();
        let previous = CURSOR.with(|cursor| cursor.borrow_mut().replace(subscriber));

        Self {
            subscriber_id,
            previous,
        }
    }

    /// Check if an evaluation is in flight.
    pub fn is_active() -> bool {
        CURSOR.with(|cursor| cursor.borrow().is_some())
    }

    /// The subscriber currently evaluating, if any.
    pub fn current() -> Option<Rc<dyn Subscriber>> {
        CURSOR.with(|cursor| cursor.borrow().clone())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CURSOR.with(|cursor| cursor.borrow().as_ref().map(|s| s.subscriber_id()))
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURSOR.with(|cursor| {
            let popped = std::mem::replace(&mut *cursor.borrow_mut(), previous);

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id(),
                    self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id,
                    entry.subscriber_id()
                );
            }
        });
    }
}
