//! In-memory document tree.
//!
//! Just enough of a DOM for bindings to act on: elements with ordered
//! attributes, a form `value`, raw `inner_html`, event listeners, and text
//! nodes. `inner_html` is stored verbatim, never parsed.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::Result;

/// Event listener attached to a node.
pub type Listener = Rc<dyn Fn(&Event) -> Result<()>>;

/// A dispatched event.
#[derive(Clone, Debug)]
pub struct Event {
    kind: String,
    target: Node,
}

impl Event {
    pub fn new(kind: impl Into<String>, target: Node) -> Self {
        Self {
            kind: kind.into(),
            target,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn target(&self) -> &Node {
        &self.target
    }
}

struct ElementData {
    tag: String,
    attributes: RefCell<IndexMap<String, String>>,
    value: RefCell<String>,
    inner_html: RefCell<Option<String>>,
    listeners: RefCell<Vec<(String, Listener)>>,
}

enum NodeData {
    Element(ElementData),
    Text(RefCell<String>),
}

struct NodeInner {
    data: NodeData,
    children: RefCell<Vec<Node>>,
}

/// A node in the document tree. Cloning shares the node.
#[derive(Clone)]
pub struct Node(Rc<NodeInner>);

impl Node {
    pub fn element(tag: impl Into<String>) -> Self {
        Self(Rc::new(NodeInner {
            data: NodeData::Element(ElementData {
                tag: tag.into(),
                attributes: RefCell::new(IndexMap::new()),
                value: RefCell::new(String::new()),
                inner_html: RefCell::new(None),
                listeners: RefCell::new(Vec::new()),
            }),
            children: RefCell::new(Vec::new()),
        }))
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self(Rc::new(NodeInner {
            data: NodeData::Text(RefCell::new(content.into())),
            children: RefCell::new(Vec::new()),
        }))
    }

    /// Builder form of [`set_attribute`](Self::set_attribute).
    pub fn with_attribute(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder form of [`append_child`](Self::append_child).
    pub fn with_child(self, child: Node) -> Self {
        self.append_child(child);
        self
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.data, NodeData::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.0.data, NodeData::Text(_))
    }

    pub fn tag(&self) -> Option<&str> {
        self.element_data().map(|el| el.tag.as_str())
    }

    pub fn append_child(&self, child: Node) {
        self.0.children.borrow_mut().push(child);
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    pub fn has_children(&self) -> bool {
        !self.0.children.borrow().is_empty()
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.element_data()?.attributes.borrow().get(name).cloned()
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.element_data()
            .map(|el| el.attributes.borrow().keys().cloned().collect())
            .unwrap_or_default()
    }

    /// No-op on text nodes.
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        if let Some(el) = self.element_data() {
            el.attributes.borrow_mut().insert(name.into(), value.into());
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        if let Some(el) = self.element_data() {
            el.attributes.borrow_mut().shift_remove(name);
        }
    }

    /// Text of this node, or the concatenated text of its descendants.
    pub fn text_content(&self) -> String {
        match &self.0.data {
            NodeData::Text(text) => text.borrow().clone(),
            NodeData::Element(_) => self
                .0
                .children
                .borrow()
                .iter()
                .map(Node::text_content)
                .collect(),
        }
    }

    /// Replace the text of a text node, or all children of an element with
    /// a single text node.
    pub fn set_text_content(&self, content: impl Into<String>) {
        match &self.0.data {
            NodeData::Text(text) => *text.borrow_mut() = content.into(),
            NodeData::Element(el) => {
                *el.inner_html.borrow_mut() = None;
                *self.0.children.borrow_mut() = vec![Node::text(content)];
            }
        }
    }

    /// Raw markup last assigned through [`set_inner_html`](Self::set_inner_html),
    /// falling back to the text content.
    pub fn inner_html(&self) -> String {
        match self.element_data() {
            Some(el) => el
                .inner_html
                .borrow()
                .clone()
                .unwrap_or_else(|| self.text_content()),
            None => self.text_content(),
        }
    }

    pub fn set_inner_html(&self, html: impl Into<String>) {
        if let Some(el) = self.element_data() {
            self.0.children.borrow_mut().clear();
            *el.inner_html.borrow_mut() = Some(html.into());
        }
    }

    pub fn value(&self) -> String {
        self.element_data()
            .map(|el| el.value.borrow().clone())
            .unwrap_or_default()
    }

    pub fn set_value(&self, value: impl Into<String>) {
        if let Some(el) = self.element_data() {
            *el.value.borrow_mut() = value.into();
        }
    }

    pub fn class_name(&self) -> String {
        self.attribute("class").unwrap_or_default()
    }

    pub fn set_class_name(&self, class_name: impl Into<String>) {
        self.set_attribute("class", class_name);
    }

    pub fn add_event_listener<F>(&self, kind: impl Into<String>, listener: F)
    where
        F: Fn(&Event) -> Result<()> + 'static,
    {
        if let Some(el) = self.element_data() {
            el.listeners.borrow_mut().push((kind.into(), Rc::new(listener)));
        }
    }

    pub fn listener_count(&self, kind: &str) -> usize {
        self.element_data()
            .map(|el| el.listeners.borrow().iter().filter(|(k, _)| k == kind).count())
            .unwrap_or(0)
    }

    /// Run every listener for `event.kind()` in registration order,
    /// stopping at the first error.
    pub fn dispatch(&self, event: &Event) -> Result<()> {
        let Some(el) = self.element_data() else {
            return Ok(());
        };
        let listeners: Vec<Listener> = el
            .listeners
            .borrow()
            .iter()
            .filter(|(kind, _)| kind == event.kind())
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(event)?;
        }
        Ok(())
    }

    /// Simulate user input: set the value, then dispatch `input`.
    pub fn input(&self, value: impl Into<String>) -> Result<()> {
        self.set_value(value);
        self.dispatch(&Event::new("input", self.clone()))
    }

    /// Dispatch an event of `kind` targeting this node.
    pub fn trigger(&self, kind: &str) -> Result<()> {
        self.dispatch(&Event::new(kind, self.clone()))
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn element_data(&self) -> Option<&ElementData> {
        match &self.0.data {
            NodeData::Element(el) => Some(el),
            NodeData::Text(_) => None,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.data {
            NodeData::Text(text) => write!(f, "Text({:?})", text.borrow()),
            NodeData::Element(el) => f
                .debug_struct("Element")
                .field("tag", &el.tag)
                .field("attributes", &*el.attributes.borrow())
                .field("children", &*self.0.children.borrow())
                .finish(),
        }
    }
}
