//! Reactive Primitives
//!
//! This module implements the dependency-tracking core: observed objects
//! and arrays, dependency sets, and watchers over dot-path expressions.
//!
//! # Concepts
//!
//! ## Reactive Slots
//!
//! Observing an object replaces each of its properties with a reactive
//! slot. A slot owns a private [`Dep`]. Reading the slot while a watcher is
//! evaluating subscribes that watcher; writing a different value notifies
//! every subscriber.
//!
//! ## Observers
//!
//! Every observed object or array carries one [`Observer`], whose own
//! [`Dep`] stands for "the container itself". Array mutations notify it,
//! and slots holding a container subscribe readers to it as well.
//!
//! ## Watchers
//!
//! A [`Watcher`] evaluates a [`DotPath`] with itself as the active
//! evaluation, memoizes the result, and calls back with `(new, old)` when a
//! notification produces a different value.
//!
//! # Implementation Notes
//!
//! The active evaluation lives in a thread-local cursor managed by
//! [`ReactiveContext`]. Everything here is single-threaded: handles are
//! `Rc` clones and identity is pointer identity.

mod array;
mod context;
mod dep;
mod object;
mod observer;
mod path;
mod subscriber;
mod value;
mod watcher;

#[cfg(test)]
mod testing;

pub use array::Array;
pub use context::ReactiveContext;
pub use dep::{Dep, DepId};
pub use object::{define_reactive, Object};
pub use observer::{depend_array, observe, Observer};
pub use path::DotPath;
pub use subscriber::{Subscriber, SubscriberId};
pub use value::{Opaque, Value};
pub use watcher::{WatchCallback, Watcher};
