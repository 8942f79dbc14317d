//! Template Compiler
//!
//! Walks a view tree once, finds bindings, and connects each of them to the
//! data through a [`Watcher`](crate::reactive::Watcher).
//!
//! # What Counts as a Binding
//!
//! - A text node whose content matches `{{ expr }}` becomes a text binding
//!   on that node. The whole node text is replaced by the value.
//! - An element attribute starting with `v-` is a directive. `v-on:<event>`
//!   attaches a named method as a listener; `v-text`, `v-html`, `v-class` and
//!   `v-model` bind the matching updater. Unknown directives are ignored.
//!   Directive attributes are removed once processed.
//!
//! Each binding applies its updater immediately with the current value,
//! then keeps it in sync through a watcher owned by the view model.

use std::cell::RefCell;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use super::dom::Node;
use super::updater::{self, Updater};
use crate::error::Result;
use crate::reactive::Value;
use crate::vm::ViewModel;

static INTERPOLATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{(.*)\}\}").expect("interpolation pattern compiles"));

const DIRECTIVE_PREFIX: &str = "v-";

/// Directive found on an element attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Directive {
    On(Option<String>),
    Text,
    Html,
    Class,
    Model,
    Unknown,
}

impl Directive {
    /// Parse the part of the attribute name after `v-`.
    fn parse(name: &str) -> Self {
        if name.starts_with("on") {
            return Self::On(name.split(':').nth(1).map(str::to_owned));
        }
        match name {
            "text" => Self::Text,
            "html" => Self::Html,
            "class" => Self::Class,
            "model" => Self::Model,
            _ => Self::Unknown,
        }
    }

    fn updater(&self) -> Option<Updater> {
        match self {
            Self::Text => Some(updater::text),
            Self::Html => Some(updater::html),
            Self::Class => Some(updater::class),
            Self::Model => Some(updater::model),
            Self::On(_) | Self::Unknown => None,
        }
    }
}

/// Result of compiling one view tree.
#[derive(Debug)]
pub struct Compiler {
    root: Node,
    bindings: usize,
    listeners: usize,
}

impl Compiler {
    /// Compile every binding under `el` against `vm`.
    pub fn new(el: Node, vm: &ViewModel) -> Result<Self> {
        let mut compiler = Self {
            root: el,
            bindings: 0,
            listeners: 0,
        };
        let root = compiler.root.clone();
        compiler.compile_children(&root, vm)?;
        debug!(
            bindings = compiler.bindings,
            listeners = compiler.listeners,
            "view compiled"
        );
        Ok(compiler)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Number of data bindings (each backed by one watcher).
    pub fn binding_count(&self) -> usize {
        self.bindings
    }

    /// Number of listeners attached for `v-on:` and `v-model`.
    pub fn listener_count(&self) -> usize {
        self.listeners
    }

    fn compile_children(&mut self, parent: &Node, vm: &ViewModel) -> Result<()> {
        for node in parent.children() {
            if node.is_element() {
                self.compile_element(&node, vm)?;
            } else if node.is_text() {
                let text = node.text_content();
                if let Some(caps) = INTERPOLATION.captures(&text) {
                    self.bind(&node, vm, caps[1].trim(), updater::text)?;
                }
            }

            if node.has_children() {
                self.compile_children(&node, vm)?;
            }
        }
        Ok(())
    }

    fn compile_element(&mut self, node: &Node, vm: &ViewModel) -> Result<()> {
        for name in node.attribute_names() {
            let Some(directive) = name.strip_prefix(DIRECTIVE_PREFIX) else {
                continue;
            };
            let expr = node.attribute(&name).unwrap_or_default();

            match Directive::parse(directive) {
                Directive::On(event) => self.bind_event(node, vm, &expr, event),
                Directive::Model => {
                    self.bind(node, vm, &expr, updater::model)?;
                    self.bind_input(node, vm, &expr)?;
                }
                other => {
                    if let Some(update) = other.updater() {
                        self.bind(node, vm, &expr, update)?;
                    }
                }
            }
            node.remove_attribute(&name);
        }
        Ok(())
    }

    /// Model to view: apply the current value, then follow it.
    fn bind(&mut self, node: &Node, vm: &ViewModel, expr: &str, update: Updater) -> Result<()> {
        update(node, &vm.get_path(expr)?, &Value::Undefined);

        let target = node.clone();
        vm.watch(expr, move |_, new, old| {
            update(&target, new, old);
            Ok(())
        })?;

        self.bindings += 1;
        trace!(expr, "binding installed");
        Ok(())
    }

    /// View to model for `v-model`: write input back unless it matches the
    /// last value seen.
    fn bind_input(&mut self, node: &Node, vm: &ViewModel, expr: &str) -> Result<()> {
        let last_seen = RefCell::new(vm.get_path(expr)?);
        let weak = vm.downgrade();
        let expr = expr.to_owned();

        node.add_event_listener("input", move |event| {
            let Some(vm) = weak.upgrade() else {
                return Ok(());
            };
            let input = Value::from(event.target().value());
            if input.is_identical(&last_seen.borrow()) {
                return Ok(());
            }
            vm.set_path(&expr, input.clone())?;
            *last_seen.borrow_mut() = input;
            Ok(())
        });

        self.listeners += 1;
        Ok(())
    }

    /// `v-on:<event>="method"`. Missing event names or methods are skipped.
    fn bind_event(&mut self, node: &Node, vm: &ViewModel, expr: &str, kind: Option<String>) {
        let (Some(kind), Some(method)) = (kind, vm.method(expr)) else {
            return;
        };
        let weak = vm.downgrade();
        node.add_event_listener(kind, move |event| match weak.upgrade() {
            Some(vm) => method(&vm, event),
            None => Ok(()),
        });
        self.listeners += 1;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
