//! Tether Core
//!
//! This crate provides a minimal reactive-binding engine. It implements:
//!
//! - Observation of a plain data tree (objects, arrays, scalars)
//! - Dependency tracking and synchronous change propagation
//! - Watchers over dot-path expressions
//! - A template compiler that binds an in-memory view tree to the data
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: values, observed containers, dependency sets and watchers
//! - `vm`: the binding context that owns a data tree and its watchers
//! - `view`: document tree, template compiler and view updaters
//! - `error`: the crate error type
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tether_core::{ViewModel, ViewModelOptions};
//!
//! let vm = ViewModel::new(ViewModelOptions::new(json!({"user": {"name": "a"}})))?;
//!
//! vm.watch("user.name", |_, new, old| {
//!     println!("name: {old} -> {new}");
//!     Ok(())
//! })?;
//!
//! // Prints "name: a -> b"
//! vm.set_path("user.name", "b")?;
//! # Ok::<(), tether_core::TetherError>(())
//! ```

pub mod error;
pub mod reactive;
pub mod view;
pub mod vm;

pub use error::{Result, TetherError};
pub use reactive::{Array, DotPath, Object, Value, Watcher};
pub use view::{Compiler, Event, Node};
pub use vm::{Method, ViewModel, ViewModelOptions, WeakViewModel};
