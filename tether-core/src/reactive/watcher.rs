//! Watcher Implementation
//!
//! A Watcher is one live computation over a dot-path expression. It is what
//! a view binding or a manual `watch` subscription turns into.
//!
//! # How Watchers Work
//!
//! 1. On construction the watcher evaluates its path once. While it does,
//!    it is the active evaluation, so every reactive slot it reads adds it
//!    as a subscriber.
//!
//! 2. When one of those slots changes, the slot's dependency set calls
//!    `update`, which re-evaluates (collecting any new dependencies).
//!
//! 3. If the result is not identical to the memoized value, or it is an
//!    object, array or opaque host object, the memo is replaced and the
//!    callback fires with `(new, old)`. Object-like values always count as
//!    changed because an in-place mutation keeps the same identity.
//!
//! # Subscriptions
//!
//! Subscriptions only ever accumulate. A watcher that stops reading a slot
//! stays subscribed to it until [`Watcher::dispose`] is called.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use super::context::ReactiveContext;
use super::dep::{Dep, DepId};
use super::object::Object;
use super::path::DotPath;
use super::subscriber::{Subscriber, SubscriberId};
use super::value::Value;
use crate::error::Result;
use crate::vm::{ViewModel, WeakViewModel};

/// Callback invoked with the binding context, the new value and the old one.
pub type WatchCallback = Rc<dyn Fn(&ViewModel, &Value, &Value) -> Result<()>>;

struct WatcherInner {
    id: SubscriberId,
    vm: WeakViewModel,
    path: DotPath,
    callback: WatchCallback,

    /// Value seen by the most recent evaluation.
    value: RefCell<Value>,

    /// Every dependency set this watcher has joined, keyed by set ID.
    deps: RefCell<IndexMap<DepId, Dep>>,

    disposed: Cell<bool>,
}

impl WatcherInner {
    /// Resolve the path with this watcher as the active evaluation.
    fn evaluate(self: &Rc<Self>, root: &Object) -> Result<Value> {
        let _ctx = ReactiveContext::enter(self.clone());
        self.path.resolve(root)
    }

    fn run(self: &Rc<Self>) -> Result<()> {
        if self.disposed.get() {
            return Ok(());
        }
        let Some(vm) = self.vm.upgrade() else {
            return Ok(());
        };

        let new_value = self.evaluate(vm.data())?;
        let changed = !new_value.is_identical(&self.value.borrow()) || new_value.is_object_like();
        if !changed {
            return Ok(());
        }

        let old_value = self.value.replace(new_value.clone());
        trace!(watcher = self.id.raw(), path = %self.path, "watcher fired");
        (self.callback)(&vm, &new_value, &old_value)
    }
}

impl Subscriber for WatcherInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn add_dep(self: Rc<Self>, dep: &Dep) {
        let mut deps = self.deps.borrow_mut();
        if deps.contains_key(&dep.id()) {
            return;
        }
        let weak = Rc::downgrade(&self);
        dep.add_subscriber(self.id, weak);
        deps.insert(dep.id(), dep.clone());
    }

    fn update(self: Rc<Self>) -> Result<()> {
        self.run()
    }
}

/// A live subscription to a dot-path on a binding context.
///
/// Cloning yields another handle to the same watcher. The binding context
/// keeps every watcher created against it alive for its own lifetime.
#[derive(Clone)]
pub struct Watcher(Rc<WatcherInner>);

impl Watcher {
    /// Create a watcher on `expr` and evaluate it once.
    ///
    /// Fails if the expression is empty or the first evaluation steps
    /// through a missing intermediate value.
    pub fn new<F>(vm: &ViewModel, expr: &str, callback: F) -> Result<Self>
    where
        F: Fn(&ViewModel, &Value, &Value) -> Result<()> + 'static,
    {
        let inner = Rc::new(WatcherInner {
            id: SubscriberId::new(),
            vm: vm.downgrade(),
            path: DotPath::parse(expr)?,
            callback: Rc::new(callback),
            value: RefCell::new(Value::Undefined),
            deps: RefCell::new(IndexMap::new()),
            disposed: Cell::new(false),
        });

        let initial = inner.evaluate(vm.data())?;
        *inner.value.borrow_mut() = initial;

        let watcher = Self(inner);
        debug!(
            watcher = watcher.0.id.raw(),
            path = expr,
            deps = watcher.0.deps.borrow().len(),
            "watcher created"
        );
        vm.register_watcher(watcher.clone());
        Ok(watcher)
    }

    pub fn id(&self) -> SubscriberId {
        self.0.id
    }

    pub fn expression(&self) -> &str {
        self.0.path.as_str()
    }

    /// The memoized value from the latest evaluation that fired.
    pub fn value(&self) -> Value {
        self.0.value.borrow().clone()
    }

    /// Entry point for dependency notifications.
    pub fn update(&self) -> Result<()> {
        self.0.run()
    }

    /// Re-evaluate and fire the callback if the value changed.
    pub fn run(&self) -> Result<()> {
        self.0.run()
    }

    /// IDs of every dependency set this watcher has joined, in join order.
    pub fn dep_ids(&self) -> Vec<DepId> {
        self.0.deps.borrow().keys().copied().collect()
    }

    pub fn is_subscribed_to(&self, dep: &Dep) -> bool {
        self.0.deps.borrow().contains_key(&dep.id())
    }

    /// Leave every dependency set, stop reacting, and let the binding
    /// context release its handle.
    pub fn dispose(&self) {
        if self.0.disposed.replace(true) {
            return;
        }
        let deps = std::mem::take(&mut *self.0.deps.borrow_mut());
        for dep in deps.values() {
            dep.remove_subscriber(self.0.id);
        }
        if let Some(vm) = self.0.vm.upgrade() {
            vm.release_watcher(self.0.id);
        }
        debug!(watcher = self.0.id.raw(), released = deps.len(), "watcher disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.0.disposed.get()
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.0.id)
            .field("expression", &self.expression())
            .field("dep_count", &self.0.deps.borrow().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TetherError;
    use crate::vm::ViewModelOptions;
    use serde_json::json;

    type Calls = Rc<RefCell<Vec<(Value, Value)>>>;

    fn vm(data: serde_json::Value) -> ViewModel {
        ViewModel::new(ViewModelOptions::new(data)).unwrap()
    }

    fn recording(vm: &ViewModel, expr: &str) -> (Watcher, Calls) {
        let calls: Calls = Rc::default();
        let sink = calls.clone();
        let watcher = Watcher::new(vm, expr, move |_, new, old| {
            sink.borrow_mut().push((new.clone(), old.clone()));
            Ok(())
        })
        .unwrap();
        (watcher, calls)
    }

    #[test]
    fn construction_seeds_value_and_dependencies() {
        let vm = vm(json!({"user": {"name": "a"}}));
        let (watcher, calls) = recording(&vm, "user.name");

        assert_eq!(watcher.value(), Value::from("a"));
        assert!(calls.borrow().is_empty());

        let user_dep = vm.data().dep_of("user").unwrap();
        let user = vm.data().get_untracked("user");
        let name_dep = user.as_object().unwrap().dep_of("name").unwrap();
        let user_observer = user.observer().unwrap();

        assert!(watcher.is_subscribed_to(&user_dep));
        assert!(watcher.is_subscribed_to(&name_dep));
        assert!(watcher.is_subscribed_to(user_observer.dep()));
        assert_eq!(watcher.dep_ids().len(), 3);
    }

    #[test]
    fn run_fires_only_on_change() {
        let vm = vm(json!({"a": 1}));
        let (watcher, calls) = recording(&vm, "a");

        watcher.run().unwrap();
        assert!(calls.borrow().is_empty());

        vm.data().set("a", 2).unwrap();
        assert_eq!(*calls.borrow(), vec![(Value::from(2), Value::from(1))]);
        assert_eq!(watcher.value(), Value::from(2));
    }

    #[test]
    fn containers_always_count_as_changed() {
        let vm = vm(json!({"list": [1]}));
        let (watcher, calls) = recording(&vm, "list");

        watcher.run().unwrap();
        watcher.update().unwrap();

        let calls = calls.borrow();
        assert_eq!(calls.len(), 2);
        let (new, old) = &calls[0];
        assert_eq!(new, old);
        assert!(new.is_container());
    }

    #[test]
    fn repeated_reads_subscribe_once() {
        let vm = vm(json!({"a": 1}));
        let (watcher, _calls) = recording(&vm, "a");

        for _ in 0..3 {
            vm.data().set("a", Value::from(json!({"x": 1}))).unwrap();
            vm.data().set("a", 1).unwrap();
        }

        let dep = vm.data().dep_of("a").unwrap();
        assert_eq!(dep.subscriber_ids(), vec![watcher.id()]);
    }

    #[test]
    fn stale_dependencies_are_kept() {
        let vm = vm(json!({"user": {"name": "a"}}));
        let (watcher, calls) = recording(&vm, "user.name");

        let old_user = vm.data().get_untracked("user");
        vm.data().set("user", Value::from(json!({"name": "b"}))).unwrap();
        assert_eq!(calls.borrow().len(), 1);

        // Still subscribed to the replaced object's slot.
        let old_name_dep = old_user.as_object().unwrap().dep_of("name").unwrap();
        assert!(old_name_dep.contains(watcher.id()));

        // A write there re-runs the watcher, which reads the new object and
        // sees no change.
        old_user.as_object().unwrap().set("name", "zzz").unwrap();
        assert_eq!(calls.borrow().len(), 1);
    }

    #[test]
    fn construction_fails_through_missing_intermediate() {
        let vm = vm(json!({}));
        let err = Watcher::new(&vm, "user.name", |_, _, _| Ok(())).unwrap_err();
        assert!(matches!(err, TetherError::PropertyOfUndefined { .. }));
        assert_eq!(vm.watcher_count(), 0);
    }

    #[test]
    fn run_propagates_evaluation_errors() {
        let vm = vm(json!({"user": {"name": "a"}}));
        let (_watcher, calls) = recording(&vm, "user.name");

        let err = vm.data().set("user", Value::Null).unwrap_err();
        assert!(matches!(err, TetherError::PropertyOfUndefined { base: "null", .. }));
        assert!(calls.borrow().is_empty());
        assert!(!ReactiveContext::is_active());
    }

    #[test]
    fn callback_errors_propagate_to_writer() {
        let vm = vm(json!({"a": 1}));
        Watcher::new(&vm, "a", |_, _, _| Err(TetherError::callback("rejected"))).unwrap();

        let err = vm.data().set("a", 2).unwrap_err();
        assert_eq!(err, TetherError::Callback("rejected".into()));
        // The write itself still happened.
        assert_eq!(vm.data().get_untracked("a"), Value::from(2));
    }

    #[test]
    fn callback_receives_binding_context() {
        let vm = vm(json!({"a": 1, "mirror": 0}));
        Watcher::new(&vm, "a", |vm, new, _| vm.set("mirror", new.clone())).unwrap();

        vm.set("a", 5).unwrap();
        assert_eq!(vm.get("mirror"), Value::from(5));
    }

    #[test]
    fn dispose_leaves_all_sets() {
        let vm = vm(json!({"a": 1}));
        let (watcher, calls) = recording(&vm, "a");
        let dep = vm.data().dep_of("a").unwrap();

        watcher.dispose();
        assert!(watcher.is_disposed());
        assert!(!dep.contains(watcher.id()));
        assert!(watcher.dep_ids().is_empty());

        vm.data().set("a", 2).unwrap();
        watcher.run().unwrap();
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn dispose_releases_context_handle() {
        let vm = vm(json!({"a": 1, "b": 2}));
        let (first, _) = recording(&vm, "a");
        let (second, _) = recording(&vm, "b");
        assert_eq!(vm.watcher_count(), 2);

        first.dispose();
        assert_eq!(vm.watcher_count(), 1);
        first.dispose();
        assert_eq!(vm.watcher_count(), 1);

        // The caller's handle is all that keeps the disposed watcher alive.
        assert_eq!(Rc::strong_count(&first.0), 1);
        assert!(!second.is_disposed());
    }

    #[test]
    fn dispose_from_inside_callback() {
        let vm = vm(json!({"a": 1}));
        let slot: Rc<RefCell<Option<Watcher>>> = Rc::default();
        let hits = Rc::new(Cell::new(0));

        let own = slot.clone();
        let counter = hits.clone();
        let watcher = Watcher::new(&vm, "a", move |_, _, _| {
            counter.set(counter.get() + 1);
            if let Some(me) = own.borrow_mut().take() {
                me.dispose();
            }
            Ok(())
        })
        .unwrap();
        *slot.borrow_mut() = Some(watcher);

        vm.data().set("a", 2).unwrap();
        vm.data().set("a", 3).unwrap();
        assert_eq!(hits.get(), 1);
        assert_eq!(vm.watcher_count(), 0);
    }

    #[test]
    fn opaque_values_always_count_as_changed() {
        let vm = vm(json!({"node": null}));
        let node = Value::from(crate::reactive::Opaque::new(String::from("<input>")));
        vm.data().set("node", node.clone()).unwrap();
        let (watcher, calls) = recording(&vm, "node");

        watcher.run().unwrap();
        let calls = calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.is_identical(&node));
        assert!(calls[0].1.is_identical(&node));
    }
}
