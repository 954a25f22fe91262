//! Path-addressable field trees with "was this ever set" semantics.
//!
//! Every header occurrence owns one [`FieldTree`]. Field closures assign leaves with
//! [`FieldTree::set_value`] and read them back with [`FieldTree::get_value`] or
//! [`FieldTree::get_value_or`]. A node is *defined* once a value has been assigned to it
//! or to any of its descendants; reading never defines anything. Compiling a tree back to
//! a [`Value`] keeps only defined keys, so a header variant that never touches a field
//! leaves no placeholder for it in the result.
//!
//! Paths are dotted field names from the tree root (`"tclass.dscp"`); the empty path is
//! the root. The same strings identify fields in error records.
//!
//! ```
//! use layercodec::field_tree::FieldTree;
//! use layercodec::Value;
//!
//! let mut tree = FieldTree::new();
//! assert!(tree.is_undefined("tclass"));
//! tree.set_value("tclass.dscp", 46u8);
//! assert!(!tree.is_undefined("tclass"));
//! assert!(tree.get_value("tclass.ecn").is_none());
//! assert_eq!(tree.get_value("tclass.dscp"), Some(Value::U8(46)));
//! ```

use crate::value::Value;

/// One node of a field tree.
///
/// Objects keep their children in first-assignment order. Lists and byte strings are
/// leaves: they are assigned and read as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldNode {
    #[default]
    Undefined,
    Scalar(Value),
    Object(Vec<(String, FieldNode)>),
}

impl FieldNode {
    pub fn is_undefined(&self) -> bool {
        matches!(self, FieldNode::Undefined)
    }

    pub fn child(&self, key: &str) -> Option<&FieldNode> {
        match self {
            FieldNode::Object(children) => children.iter().find(|(k, _)| k == key).map(|(_, n)| n),
            _ => None,
        }
    }

    /// Child entry for assignment. Turns this node into an object if it is not one.
    fn child_entry(&mut self, key: &str) -> &mut FieldNode {
        if !matches!(self, FieldNode::Object(_)) {
            *self = FieldNode::Object(Vec::new());
        }
        let FieldNode::Object(children) = self else {
            unreachable!("node was just turned into an object")
        };
        let idx = match children.iter().position(|(k, _)| k == key) {
            Some(i) => i,
            None => {
                children.push((key.to_string(), FieldNode::Undefined));
                children.len() - 1
            }
        };
        &mut children[idx].1
    }

    /// Assign a value. Struct values merge key by key; anything else replaces the node.
    pub fn set_value(&mut self, value: Value) {
        match value {
            Value::Struct(map) => {
                if !matches!(self, FieldNode::Object(_)) {
                    *self = FieldNode::Object(Vec::new());
                }
                let mut entries: Vec<_> = map.into_iter().collect();
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                for (k, v) in entries {
                    self.child_entry(&k).set_value(v);
                }
            }
            other => *self = FieldNode::Scalar(other),
        }
    }

    /// Compile this node. `None` when nothing at or below it was ever assigned.
    pub fn get_value(&self) -> Option<Value> {
        match self {
            FieldNode::Undefined => None,
            FieldNode::Scalar(v) => Some(v.clone()),
            FieldNode::Object(children) => Some(Value::Struct(
                children
                    .iter()
                    .filter_map(|(k, n)| n.get_value().map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }
}

/// Root of one header's field values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTree {
    root: FieldNode,
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

impl FieldTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tree whose content is `value` (struct values become nested objects).
    pub fn from_value(value: Value) -> Self {
        let mut tree = Self::new();
        tree.root.set_value(value);
        tree
    }

    pub fn root(&self) -> &FieldNode {
        &self.root
    }

    /// Node at `path`, if any assignment ever reached it.
    pub fn node(&self, path: &str) -> Option<&FieldNode> {
        segments(path).try_fold(&self.root, |node, key| node.child(key))
    }

    /// Assign `value` at `path`, defining the node and every ancestor.
    pub fn set_value(&mut self, path: &str, value: impl Into<Value>) {
        let mut node = &mut self.root;
        for key in segments(path) {
            node = node.child_entry(key);
        }
        node.set_value(value.into());
    }

    pub fn get_value(&self, path: &str) -> Option<Value> {
        self.node(path).and_then(FieldNode::get_value)
    }

    /// Value at `path`, or `fallback` after reporting the path to `on_missing`.
    pub fn get_value_or<F>(&self, path: &str, fallback: Value, on_missing: F) -> Value
    where
        F: FnOnce(&str),
    {
        match self.get_value(path) {
            Some(v) => v,
            None => {
                on_missing(path);
                fallback
            }
        }
    }

    pub fn is_undefined(&self, path: &str) -> bool {
        self.node(path).map_or(true, FieldNode::is_undefined)
    }

    /// Compiled tree; an empty struct when nothing was assigned.
    pub fn to_value(&self) -> Value {
        self.root
            .get_value()
            .unwrap_or_else(|| Value::Struct(Default::default()))
    }

    /// Path of the `index`-th element of the list at `path` (`"objects[3]"`).
    pub fn indexed_path(path: &str, index: usize) -> String {
        format!("{}[{}]", path, index)
    }
}
