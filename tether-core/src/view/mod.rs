//! View Layer
//!
//! An in-memory document tree and the template compiler that binds it to a
//! [`ViewModel`](crate::vm::ViewModel). Everything here is built on the
//! public reactive interface: watchers for model-to-view, dot-path
//! assignment for view-to-model.

mod compile;
mod dom;
pub mod updater;

pub use compile::Compiler;
pub use dom::{Event, Listener, Node};
