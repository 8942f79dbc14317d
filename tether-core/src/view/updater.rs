//! View updaters: how a new binding value lands on a node.

use super::dom::Node;
use crate::reactive::Value;

/// Signature shared by all updaters: `(node, new, old)`.
pub type Updater = fn(&Node, &Value, &Value);

fn render(value: &Value) -> String {
    if value.is_undefined() {
        String::new()
    } else {
        value.to_string()
    }
}

pub fn text(node: &Node, new: &Value, _old: &Value) {
    node.set_text_content(render(new));
}

pub fn html(node: &Node, new: &Value, _old: &Value) {
    node.set_inner_html(render(new));
}

/// Swap the old class for the new one, leaving other classes alone.
pub fn class(node: &Node, new: &Value, old: &Value) {
    let mut class_name = node.class_name();

    let old = render(old);
    if !old.is_empty() {
        class_name = class_name.replacen(&old, "", 1);
    }
    if class_name.ends_with(char::is_whitespace) {
        class_name.pop();
    }

    let new = render(new);
    let space = if !class_name.is_empty() && !new.is_empty() { " " } else { "" };
    node.set_class_name(format!("{class_name}{space}{new}"));
}

pub fn model(node: &Node, new: &Value, _old: &Value) {
    node.set_value(render(new));
}
