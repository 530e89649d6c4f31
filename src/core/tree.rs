//! Creator trees – the input side of binding.
//!
//! A [`CreatorTree`] maps keys to [`Node`]s.  A node is either a creator
//! (`Leaf`) or a nested tree (`Branch`), so whether an entry is a creator or
//! a namespace is decided when the tree is built, never guessed while walking.

use std::collections::btree_map::{BTreeMap, Entry};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::TreeError;

// ───────────────────────────────────────── creator ───────────

/// A creator function: positional JSON arguments in, payload out.
///
/// Cloning is cheap (the function lives behind an [`Arc`]).
#[derive(Clone)]
pub struct Creator(Arc<dyn Fn(&[Value]) -> Value + Send + Sync>);

impl Creator {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn invoke(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }
}

impl fmt::Debug for Creator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Creator(..)")
    }
}

// ───────────────────────────────────────── node ──────────────

#[derive(Debug, Clone)]
pub enum Node {
    Leaf(Creator),
    Branch(CreatorTree),
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }
}

// ───────────────────────────────────────── tree ──────────────

/// A mapping of keys to creators and nested mappings.
///
/// Builder methods (`creator`, `namespace`, …) chain by value and never fail
/// on the spot.  The first invalid insert is remembered and reported by
/// [`CreatorTree::build`].
#[derive(Debug, Clone, Default)]
pub struct CreatorTree {
    entries: BTreeMap<String, Node>,
    error: Option<TreeError>,
}

impl CreatorTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a creator under `key`.
    pub fn creator<F>(self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.insert(key, Node::Leaf(Creator::new(f)))
    }

    /// Add an already-built subtree under `key`.
    pub fn namespace(self, key: impl Into<String>, sub: CreatorTree) -> Self {
        self.insert(key, Node::Branch(sub))
    }

    /// Build a subtree in place.
    ///
    /// ```
    /// use obj_actions::CreatorTree;
    /// use serde_json::json;
    ///
    /// let tree = CreatorTree::new()
    ///     .namespace_with("foo", |ns| ns.creator("bar", |args| json!({ "c": args[0] })))
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(tree.leaf_count(), 1);
    /// ```
    pub fn namespace_with(
        self,
        key: impl Into<String>,
        build: impl FnOnce(CreatorTree) -> CreatorTree,
    ) -> Self {
        self.namespace(key, build(CreatorTree::new()))
    }

    /// Chainable insert; see [`CreatorTree::try_insert`] for the checks.
    pub fn insert(mut self, key: impl Into<String>, node: Node) -> Self {
        if self.error.is_none() {
            if let Err(err) = self.try_insert(key, node) {
                self.error = Some(err);
            }
        }
        self
    }

    /// Insert `node` under `key`, rejecting empty and duplicate keys.
    pub fn try_insert(&mut self, key: impl Into<String>, node: Node) -> Result<(), TreeError> {
        let key = key.into();
        if key.is_empty() {
            return Err(TreeError::EmptyKey {
                parent: String::new(),
            });
        }
        match self.entries.entry(key) {
            Entry::Occupied(slot) => Err(TreeError::DuplicateKey {
                key: slot.key().clone(),
                parent: String::new(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(node);
                Ok(())
            }
        }
    }

    /// Finish building: return the tree, or the first construction error
    /// found anywhere inside it.
    ///
    /// Errors from nested namespaces carry the dotted path of the mapping
    /// they occurred in.
    pub fn build(self) -> Result<Self, TreeError> {
        self.validate()?;
        Ok(self)
    }

    /// Report the first construction error recorded anywhere in the tree.
    pub fn validate(&self) -> Result<(), TreeError> {
        self.first_error()
    }

    fn first_error(&self) -> Result<(), TreeError> {
        // (key, parent frame); paths are only spelled out when an error shows up.
        let mut frames: Vec<(&str, Option<usize>)> = Vec::new();
        let mut stack: Vec<(&CreatorTree, Option<usize>)> = vec![(self, None)];
        while let Some((tree, frame)) = stack.pop() {
            if let Some(err) = &tree.error {
                let mut keys = Vec::new();
                let mut cur = frame;
                while let Some(idx) = cur {
                    keys.push(frames[idx].0);
                    cur = frames[idx].1;
                }
                keys.reverse();
                return Err(with_parent(err.clone(), &keys.join(".")));
            }
            for (key, node) in tree.entries.iter().rev() {
                if let Node::Branch(sub) = node {
                    frames.push((key.as_str(), frame));
                    stack.push((sub, Some(frames.len() - 1)));
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.get(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of creators anywhere in the tree.
    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            for node in tree.entries.values() {
                match node {
                    Node::Leaf(_) => count += 1,
                    Node::Branch(sub) => stack.push(sub),
                }
            }
        }
        count
    }

    /// Nesting depth: 0 for an empty tree, 1 for a flat one.
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1)];
        while let Some((tree, level)) = stack.pop() {
            if tree.is_empty() {
                continue;
            }
            max = max.max(level);
            for node in tree.entries.values() {
                if let Node::Branch(sub) = node {
                    stack.push((sub, level + 1));
                }
            }
        }
        max
    }

    pub(crate) fn entry_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries.get_mut(key)
    }
}

// Nested trees are released from an explicit stack; the derived drop would
// recurse once per level and overflow on very deep input.
impl Drop for CreatorTree {
    fn drop(&mut self) {
        let mut pending: Vec<CreatorTree> = Vec::new();
        let mut entries = std::mem::take(&mut self.entries);
        loop {
            for node in std::mem::take(&mut entries).into_values() {
                if let Node::Branch(sub) = node {
                    pending.push(sub);
                }
            }
            match pending.pop() {
                Some(mut tree) => entries = std::mem::take(&mut tree.entries),
                None => break,
            }
        }
    }
}

fn with_parent(err: TreeError, path: &str) -> TreeError {
    let path = path.to_owned();
    match err {
        TreeError::EmptyKey { .. } => TreeError::EmptyKey { parent: path },
        TreeError::DuplicateKey { key, .. } => TreeError::DuplicateKey { key, parent: path },
        other => other,
    }
}
