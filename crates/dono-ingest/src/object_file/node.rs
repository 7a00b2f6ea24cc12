//! Composite nodes built by the structural parser

use serde::Serialize;
use std::collections::BTreeMap;

/// A named, attributed unit of an object file
///
/// A node is created when its name line is read, collects attributes and
/// children while its indentation block is open, and is moved out to the
/// [`NodeHandler`](super::NodeHandler) exactly once when the block closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositeNode {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub children: Vec<CompositeNode>,
    /// 1-based line of the object name
    #[serde(skip)]
    pub line: usize,
}

impl CompositeNode {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
            line,
        }
    }

    /// Raw value of an attribute, if present
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Set an attribute; a repeated key overwrites the earlier value
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Children with the given name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a CompositeNode> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_overwrite() {
        let mut node = CompositeNode::new("Rate", 3);
        node.set_attribute("sign", "AUD");
        node.set_attribute("sign", "EUR");
        assert_eq!(node.attribute("sign"), Some("EUR"));
        assert_eq!(node.attributes.len(), 1);
        assert_eq!(node.attribute("value"), None);
    }

    #[test]
    fn test_children_named_keeps_order() {
        let mut employee = CompositeNode::new("Employee", 1);
        employee.children.push(CompositeNode::new("Donation", 5));
        employee.children.push(CompositeNode::new("Department", 9));
        employee.children.push(CompositeNode::new("Donation", 12));

        let lines: Vec<usize> = employee.children_named("Donation").map(|n| n.line).collect();
        assert_eq!(lines, vec![5, 12]);
    }

    #[test]
    fn test_serialize_skips_line() {
        let mut node = CompositeNode::new("Department", 4);
        node.set_attribute("id", "10");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["name"], "Department");
        assert_eq!(json["attributes"]["id"], "10");
        assert!(json.get("line").is_none());
    }
}
