//! Binding Context
//!
//! A [`ViewModel`] owns a root data object, makes it reactive, and exposes
//! its top-level keys as aliases. When given a view root it hands itself to
//! the template [`Compiler`], which turns every binding it finds into a
//! [`Watcher`].
//!
//! # Ownership
//!
//! The view model owns every watcher created against it. Watchers and DOM
//! listeners refer back to it weakly, so dropping the last `ViewModel`
//! handle tears the whole binding graph down.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::error::{Result, TetherError};
use crate::reactive::{observe, DotPath, Object, SubscriberId, Value, Watcher};
use crate::view::{Compiler, Event, Node};

/// Event handler registered under a name and referenced by `v-on:`.
pub type Method = Rc<dyn Fn(&ViewModel, &Event) -> Result<()>>;

/// Construction options for a [`ViewModel`].
pub struct ViewModelOptions {
    data: Value,
    el: Option<Node>,
    methods: IndexMap<String, Method>,
}

impl ViewModelOptions {
    /// Options around `data`, which must be an object by the time
    /// [`ViewModel::new`] sees it.
    pub fn new(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            el: None,
            methods: IndexMap::new(),
        }
    }

    /// Mount point to compile against.
    pub fn el(mut self, el: Node) -> Self {
        self.el = Some(el);
        self
    }

    pub fn method<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ViewModel, &Event) -> Result<()> + 'static,
    {
        self.methods.insert(name.into(), Rc::new(handler));
        self
    }
}

impl Default for ViewModelOptions {
    fn default() -> Self {
        Self::new(Object::new())
    }
}

struct VmInner {
    data: Object,
    aliases: IndexSet<String>,
    methods: IndexMap<String, Method>,
    watchers: RefCell<Vec<Watcher>>,
    compiler: RefCell<Option<Compiler>>,
}

/// A binding context over one reactive data object.
#[derive(Clone)]
pub struct ViewModel(Rc<VmInner>);

/// Non-owning handle to a [`ViewModel`].
#[derive(Clone)]
pub struct WeakViewModel(Weak<VmInner>);

impl WeakViewModel {
    pub fn upgrade(&self) -> Option<ViewModel> {
        self.0.upgrade().map(ViewModel)
    }
}

impl ViewModel {
    /// Install aliases, observe the data, then compile `el` if given.
    pub fn new(options: ViewModelOptions) -> Result<Self> {
        let ViewModelOptions { data, el, methods } = options;
        let data = match data {
            Value::Object(object) => object,
            other => {
                return Err(TetherError::InvalidData {
                    kind: other.type_name(),
                })
            }
        };

        let aliases: IndexSet<String> = data.keys().into_iter().collect();
        observe(&Value::Object(data.clone()));

        let vm = Self(Rc::new(VmInner {
            data,
            aliases,
            methods,
            watchers: RefCell::new(Vec::new()),
            compiler: RefCell::new(None),
        }));
        debug!(aliases = vm.0.aliases.len(), methods = vm.0.methods.len(), "view model created");

        if let Some(el) = el {
            let compiler = Compiler::new(el, &vm)?;
            *vm.0.compiler.borrow_mut() = Some(compiler);
        }
        Ok(vm)
    }

    /// The root data object.
    pub fn data(&self) -> &Object {
        &self.0.data
    }

    /// Read a top-level key through its alias. Keys that were not present
    /// at construction read as `Undefined`.
    pub fn get(&self, key: &str) -> Value {
        if self.0.aliases.contains(key) {
            self.0.data.get(key)
        } else {
            Value::Undefined
        }
    }

    /// Write a top-level key through its alias.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        if !self.0.aliases.contains(key) {
            return Err(TetherError::UnknownProperty { key: key.to_owned() });
        }
        self.0.data.set(key, value)
    }

    pub fn has_alias(&self, key: &str) -> bool {
        self.0.aliases.contains(key)
    }

    pub fn aliases(&self) -> Vec<String> {
        self.0.aliases.iter().cloned().collect()
    }

    /// Subscribe `callback` to `expr`.
    pub fn watch<F>(&self, expr: &str, callback: F) -> Result<Watcher>
    where
        F: Fn(&ViewModel, &Value, &Value) -> Result<()> + 'static,
    {
        Watcher::new(self, expr, callback)
    }

    /// Resolve a dot-path against the data.
    pub fn get_path(&self, expr: &str) -> Result<Value> {
        DotPath::parse(expr)?.resolve(&self.0.data)
    }

    /// Assign through a dot-path.
    pub fn set_path(&self, expr: &str, value: impl Into<Value>) -> Result<()> {
        DotPath::parse(expr)?.assign(&self.0.data, value.into())
    }

    pub fn method(&self, name: &str) -> Option<Method> {
        self.0.methods.get(name).cloned()
    }

    pub fn watcher_count(&self) -> usize {
        self.0.watchers.borrow().len()
    }

    /// The compiled view root, if the context was mounted.
    pub fn root(&self) -> Option<Node> {
        self.0.compiler.borrow().as_ref().map(|c| c.root().clone())
    }

    pub fn downgrade(&self) -> WeakViewModel {
        WeakViewModel(Rc::downgrade(&self.0))
    }

    pub fn ptr_eq(&self, other: &ViewModel) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn register_watcher(&self, watcher: Watcher) {
        self.0.watchers.borrow_mut().push(watcher);
    }

    /// Forget a disposed watcher. The handle is dropped after the list is
    /// released, since dropping it may run arbitrary callback state.
    pub(crate) fn release_watcher(&self, id: SubscriberId) {
        let released = {
            let mut watchers = self.0.watchers.borrow_mut();
            watchers
                .iter()
                .position(|watcher| watcher.id() == id)
                .map(|index| watchers.remove(index))
        };
        drop(released);
    }
}

impl fmt::Debug for ViewModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModel")
            .field("aliases", &self.0.aliases)
            .field("watchers", &self.watcher_count())
            .field("mounted", &self.0.compiler.borrow().is_some())
            .finish()
    }
}
