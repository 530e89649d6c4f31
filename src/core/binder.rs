//! Binding – turn a [`CreatorTree`] into dispatch-bound actions.
//!
//! The output mirrors the input key for key.  It is stored as an arena
//! (see [`BoundActions::node`]) so the walk can be iterative: every branch gets a
//! node id, children refer to it by index, and no recursion is needed either
//! to build or to tear down the result.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::action::Action;
use super::tree::{Creator, CreatorTree, Node};
use crate::config::BindConfig;
use crate::error::{ActionError, BindError};

// ───────────────────────────────────────── bound action ──────

type Dispatch<R> = Arc<dyn Fn(Action) -> R + Send + Sync>;

/// A creator wired to a dispatch function and a fixed type string.
pub struct BoundAction<R> {
    dispatch: Dispatch<R>,
    creator: Creator,
    action_type: String,
}

impl<R> BoundAction<R> {
    /// Invoke the creator, tag its payload, dispatch it and hand back
    /// whatever dispatch returned.
    ///
    /// Panics from the creator or dispatch are not caught.
    pub fn call(&self, args: &[Value]) -> Result<R, ActionError> {
        let output = self.creator.invoke(args);
        let action = Action::from_creator_output(output, &self.action_type)?;
        tracing::debug!(action_type = %self.action_type, "dispatching");
        Ok((self.dispatch)(action))
    }

    /// The computed type string.  A creator may still override it per call.
    pub fn action_type(&self) -> &str {
        &self.action_type
    }
}

impl<R> Clone for BoundAction<R> {
    fn clone(&self) -> Self {
        Self {
            dispatch: Arc::clone(&self.dispatch),
            creator: self.creator.clone(),
            action_type: self.action_type.clone(),
        }
    }
}

impl<R> fmt::Debug for BoundAction<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAction")
            .field("action_type", &self.action_type)
            .finish_non_exhaustive()
    }
}

// ───────────────────────────────────────── arena ─────────────

/// Index of a node in a [`BoundActions`] arena.
pub type NodeId = usize;

/// What a bound key holds.
pub enum BoundKind<R> {
    Action(BoundAction<R>),
    Namespace { children: BTreeMap<String, NodeId> },
}

/// One entry of the arena.
pub struct BoundNode<R> {
    /// Key in the parent mapping; empty for the root.
    pub key: String,
    pub parent: Option<NodeId>,
    /// Depth from the root (0 = root).
    pub depth: usize,
    pub kind: BoundKind<R>,
}

/// The bound mirror of a [`CreatorTree`].
///
/// Read-only once built: node 0 is always the root namespace and every
/// `NodeId` stored inside the arena points back into it.
pub struct BoundActions<R> {
    nodes: Vec<BoundNode<R>>,
    root: NodeId,
}

impl<R> BoundActions<R> {
    fn with_root() -> Self {
        Self {
            nodes: vec![BoundNode {
                key: String::new(),
                parent: None,
                depth: 0,
                kind: BoundKind::Namespace {
                    children: BTreeMap::new(),
                },
            }],
            root: 0,
        }
    }

    fn add_child(&mut self, parent: NodeId, key: &str, kind: BoundKind<R>) -> NodeId {
        let id = self.nodes.len();
        let depth = self.nodes[parent].depth + 1;
        self.nodes.push(BoundNode {
            key: key.to_owned(),
            parent: Some(parent),
            depth,
            kind,
        });
        if let BoundKind::Namespace { children } = &mut self.nodes[parent].kind {
            children.insert(key.to_owned(), id);
        }
        id
    }

    /// Id of the root namespace.
    pub fn root_id(&self) -> NodeId {
        self.root
    }

    /// The arena node behind `id`, if there is one.
    pub fn node(&self, id: NodeId) -> Option<&BoundNode<R>> {
        self.nodes.get(id)
    }

    /// Number of arena nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// View of the top-level mapping.
    pub fn root(&self) -> Namespace<'_, R> {
        Namespace {
            actions: self,
            id: self.root,
        }
    }

    /// Top-level bound action under `key`; `None` for namespaces.
    pub fn action(&self, key: &str) -> Option<&BoundAction<R>> {
        self.root().action(key)
    }

    /// Top-level namespace under `key`; `None` for actions.
    pub fn namespace(&self, key: &str) -> Option<Namespace<'_, R>> {
        self.root().namespace(key)
    }

    /// Look up a bound action by its key path, e.g. `["foo", "bar"]`.
    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&BoundAction<R>> {
        let (last, namespaces) = path.split_last()?;
        let mut ns = self.root();
        for key in namespaces {
            ns = ns.namespace(key.as_ref())?;
        }
        ns.action(last.as_ref())
    }

    /// Look up and invoke in one step.
    pub fn call<S: AsRef<str>>(&self, path: &[S], args: &[Value]) -> Result<R, ActionError> {
        match self.get(path) {
            Some(action) => action.call(args),
            None => Err(ActionError::UnknownAction {
                path: path
                    .iter()
                    .map(|key| key.as_ref())
                    .collect::<Vec<&str>>()
                    .join("."),
            }),
        }
    }

    /// Top-level keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.root().keys()
    }

    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.root().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every bound action, depth-first with keys in sorted order.
    pub fn iter_actions(&self) -> Vec<&BoundAction<R>> {
        let mut out = Vec::new();
        self.collect_actions(self.root, &mut out);
        out
    }

    fn collect_actions<'a>(&'a self, id: NodeId, out: &mut Vec<&'a BoundAction<R>>) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            match &self.nodes[id].kind {
                BoundKind::Action(action) => out.push(action),
                // Reversed so the smallest key is popped first.
                BoundKind::Namespace { children } => stack.extend(children.values().rev()),
            }
        }
    }

    /// Every computed type string, in [`BoundActions::iter_actions`] order.
    pub fn action_types(&self) -> Vec<&str> {
        self.iter_actions()
            .into_iter()
            .map(BoundAction::action_type)
            .collect()
    }

    /// Key path from the root to `id`; `None` for an unknown id.
    pub fn path_of(&self, id: NodeId) -> Option<Vec<&str>> {
        let mut path = Vec::new();
        let mut cur = Some(id);
        while let Some(node_id) = cur {
            let node = self.nodes.get(node_id)?;
            if node.parent.is_some() {
                path.push(node.key.as_str());
            }
            cur = node.parent;
        }
        path.reverse();
        Some(path)
    }

    fn dotted_path(&self, id: NodeId) -> String {
        self.path_of(id).unwrap_or_default().join(".")
    }
}

impl<R> fmt::Debug for BoundActions<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundActions")
            .field("types", &self.action_types())
            .finish()
    }
}

// ───────────────────────────────────────── namespace view ────

/// A borrowed view of one bound mapping.
pub struct Namespace<'a, R> {
    actions: &'a BoundActions<R>,
    id: NodeId,
}

impl<'a, R> Clone for Namespace<'a, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, R> Copy for Namespace<'a, R> {}

impl<'a, R> Namespace<'a, R> {
    fn children(&self) -> &'a BTreeMap<String, NodeId> {
        let actions = self.actions;
        match &actions.nodes[self.id].kind {
            BoundKind::Namespace { children } => children,
            BoundKind::Action(_) => unreachable!("namespace view over an action node"),
        }
    }

    /// Bound action under `key`; `None` for namespaces.
    pub fn action(&self, key: &str) -> Option<&'a BoundAction<R>> {
        let child = *self.children().get(key)?;
        let actions = self.actions;
        match &actions.nodes[child].kind {
            BoundKind::Action(action) => Some(action),
            BoundKind::Namespace { .. } => None,
        }
    }

    /// Nested namespace under `key`; `None` for actions.
    pub fn namespace(&self, key: &str) -> Option<Namespace<'a, R>> {
        let child = *self.children().get(key)?;
        match &self.actions.nodes[child].kind {
            BoundKind::Namespace { .. } => Some(Namespace {
                actions: self.actions,
                id: child,
            }),
            BoundKind::Action(_) => None,
        }
    }

    /// Keys of this namespace in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &'a str> {
        self.children().keys().map(String::as_str)
    }

    /// Number of keys in this namespace.
    pub fn len(&self) -> usize {
        self.children().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children().is_empty()
    }

    /// Actions in this namespace and everything below it.
    pub fn iter_actions(&self) -> Vec<&'a BoundAction<R>> {
        let mut out = Vec::new();
        self.actions.collect_actions(self.id, &mut out);
        out
    }
}

// ───────────────────────────────────────── bind ──────────────

/// Bind with [`BindConfig::default`]: no prefix, `_` separator.
pub fn bind<R, D>(dispatch: D, tree: &CreatorTree) -> Result<BoundActions<R>, BindError>
where
    D: Fn(Action) -> R + Send + Sync + 'static,
{
    bind_with(dispatch, tree, &BindConfig::default())
}

/// Walk `tree` depth-first and build its bound mirror.
///
/// A leaf at key path `[k1, .., kn]` gets the type string
/// `prefix + k1 + sep + .. + sep + kn`.  More than `config.max_depth`
/// namespaces nested inside one another fail the whole bind.
pub fn bind_with<R, D>(
    dispatch: D,
    tree: &CreatorTree,
    config: &BindConfig,
) -> Result<BoundActions<R>, BindError>
where
    D: Fn(Action) -> R + Send + Sync + 'static,
{
    tree.validate()?;
    let dispatch: Dispatch<R> = Arc::new(dispatch);
    let mut out = BoundActions::with_root();
    // Computed type string -> first node that claimed it.
    let mut seen: HashMap<String, NodeId> = HashMap::new();

    // (subtree, bound namespace it fills, type prefix for its keys)
    let mut stack: Vec<(&CreatorTree, NodeId, String)> =
        vec![(tree, out.root, config.prefix.clone())];

    while let Some((subtree, parent, prefix)) = stack.pop() {
        for (key, node) in subtree.iter() {
            let action_type = format!("{prefix}{key}");
            match node {
                Node::Leaf(creator) => {
                    let id = out.add_child(
                        parent,
                        key,
                        BoundKind::Action(BoundAction {
                            dispatch: Arc::clone(&dispatch),
                            creator: creator.clone(),
                            action_type: action_type.clone(),
                        }),
                    );
                    if let Some(&first) = seen.get(&action_type) {
                        tracing::warn!(
                            action_type = %action_type,
                            first = %out.dotted_path(first),
                            second = %out.dotted_path(id),
                            "two creators share one action type"
                        );
                    } else {
                        seen.insert(action_type, id);
                    }
                }
                Node::Branch(sub) => {
                    let id = out.add_child(
                        parent,
                        key,
                        BoundKind::Namespace {
                            children: BTreeMap::new(),
                        },
                    );
                    if out.nodes[id].depth > config.max_depth {
                        return Err(BindError::TooDeep {
                            path: out.dotted_path(id),
                            max_depth: config.max_depth,
                        });
                    }
                    stack.push((sub, id, format!("{action_type}{}", config.separator)));
                }
            }
        }
    }

    tracing::debug!(actions = seen.len(), nodes = out.nodes.len(), "bound creator tree");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TreeError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn echo(action: Action) -> Action {
        action
    }

    fn nested(depth: usize) -> CreatorTree {
        let mut tree = CreatorTree::new().creator("leaf", |_| Value::Null);
        for level in (0..depth).rev() {
            tree = CreatorTree::new().namespace(format!("n{level}"), tree);
        }
        tree
    }

    #[test]
    fn empty_tree_binds_to_empty_mapping() {
        let actions = bind(echo, &CreatorTree::new()).unwrap();
        assert!(actions.is_empty());
        assert!(actions.action_types().is_empty());
    }

    #[test]
    fn mirrors_structure() {
        let tree = CreatorTree::new()
            .creator("one", |_| Value::Null)
            .namespace_with("foo", |ns| {
                ns.creator("bar", |_| Value::Null)
                    .namespace("empty", CreatorTree::new())
            });
        let actions = bind(echo, &tree).unwrap();

        assert_eq!(actions.keys().collect::<Vec<_>>(), ["foo", "one"]);
        assert!(actions.action("one").is_some());
        assert!(actions.namespace("one").is_none());

        let foo = actions.namespace("foo").unwrap();
        assert_eq!(foo.keys().collect::<Vec<_>>(), ["bar", "empty"]);
        assert!(foo.action("bar").is_some());
        assert!(foo.namespace("empty").unwrap().is_empty());
    }

    #[test]
    fn joins_paths_with_separator() {
        let tree = nested(2);
        let actions = bind(echo, &tree).unwrap();
        assert_eq!(actions.action_types(), ["n0_n1_leaf"]);
        assert_eq!(
            actions.get(&["n0", "n1", "leaf"]).unwrap().action_type(),
            "n0_n1_leaf"
        );
    }

    #[test]
    fn honours_prefix_and_separator() {
        let config = BindConfig {
            prefix: "todos/".into(),
            separator: "/".into(),
            ..BindConfig::default()
        };
        let actions = bind_with(echo, &nested(1), &config).unwrap();
        assert_eq!(actions.action_types(), ["todos/n0/leaf"]);
    }

    #[test]
    fn depth_guard_fails_cleanly() {
        let config = BindConfig {
            max_depth: 3,
            ..BindConfig::default()
        };
        assert!(bind_with(echo, &nested(3), &config).is_ok());

        let err = bind_with(echo, &nested(4), &config).unwrap_err();
        assert_eq!(
            err,
            BindError::TooDeep {
                path: "n0.n1.n2.n3".into(),
                max_depth: 3,
            }
        );
    }

    #[test]
    fn very_deep_tree_is_rejected_and_dropped() {
        let tree = nested(200_000);
        let err = bind(echo, &tree).unwrap_err();
        assert!(matches!(err, BindError::TooDeep { max_depth: 64, .. }));
        drop(tree);
    }

    #[test]
    fn call_returns_dispatch_result() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let tree = CreatorTree::new().creator("one", |args| json!({ "a": args[0] }));
        let actions = bind(
            move |action: Action| {
                counter.fetch_add(1, Ordering::SeqCst);
                action.action_type().map(str::len)
            },
            &tree,
        )
        .unwrap();

        assert_eq!(actions.call(&["one"], &[json!("x")]).unwrap(), Some(3));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_object_payload_skips_dispatch() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let tree = CreatorTree::new().creator("bad", |_| json!("oops"));
        let actions = bind(
            move |_: Action| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            &tree,
        )
        .unwrap();

        let err = actions.call(&["bad"], &[]).unwrap_err();
        assert!(matches!(err, ActionError::NonObjectPayload { .. }));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_path_is_an_error() {
        let actions = bind(echo, &nested(1)).unwrap();
        let err = actions.call(&["n0", "missing"], &[]).unwrap_err();
        assert_eq!(
            err,
            ActionError::UnknownAction {
                path: "n0.missing".into()
            }
        );
        // A namespace is not callable.
        assert!(actions.call(&["n0"], &[]).is_err());
        assert!(actions.call::<&str>(&[], &[]).is_err());
    }

    #[test]
    fn colliding_types_still_bind() {
        let tree = CreatorTree::new()
            .creator("a_b", |_| json!({ "from": "flat" }))
            .namespace_with("a", |ns| ns.creator("b", |_| json!({ "from": "nested" })));
        let actions = bind(echo, &tree).unwrap();

        assert_eq!(actions.action_types(), ["a_b", "a_b"]);
        let nested = actions.call(&["a", "b"], &[]).unwrap();
        assert_eq!(nested, json!({ "type": "a_b", "from": "nested" }));
    }

    #[test]
    fn unbuilt_invalid_tree_is_rejected() {
        let tree = CreatorTree::new()
            .creator("one", |_| Value::Null)
            .creator("one", |_| Value::Null);
        let err = bind(echo, &tree).unwrap_err();
        assert!(matches!(err, BindError::InvalidTree(TreeError::DuplicateKey { .. })));
    }

    #[test]
    fn path_of_walks_to_root() {
        let actions = bind(echo, &nested(2)).unwrap();
        let leaf = (0..actions.node_count())
            .find(|&id| actions.node(id).unwrap().key == "leaf")
            .unwrap();
        assert_eq!(actions.path_of(leaf).unwrap(), ["n0", "n1", "leaf"]);
        assert!(actions.path_of(actions.root_id()).unwrap().is_empty());
    }

    #[test]
    fn arena_lookups_reject_unknown_ids() {
        let actions = bind(echo, &nested(1)).unwrap();
        let past_end = actions.node_count();
        assert!(actions.node(past_end).is_none());
        assert!(actions.path_of(past_end).is_none());

        let root = actions.node(actions.root_id()).unwrap();
        assert!(root.parent.is_none());
        assert!(matches!(root.kind, BoundKind::Namespace { .. }));
    }
}
