//! Turn a nested map of action creators into self-tagging, dispatch-bound
//! actions.
//!
//! ```
//! use obj_actions::{bind, Action, CreatorTree};
//! use serde_json::json;
//!
//! let tree = CreatorTree::new()
//!     .creator("one", |args| json!({ "a": args[0] }))
//!     .namespace_with("foo", |ns| ns.creator("bar", |args| json!({ "c": args[0] })))
//!     .build()
//!     .unwrap();
//!
//! let actions = bind(|action: Action| action, &tree).unwrap();
//! let sent = actions.call(&["foo", "bar"], &[json!("baz")]).unwrap();
//! assert_eq!(sent, json!({ "type": "foo_bar", "c": "baz" }));
//! ```

pub mod config;
pub mod core;
pub mod error;

pub use crate::config::{BindConfig, Layout};
pub use crate::core::action::{Action, Payload, TYPE_KEY};
pub use crate::core::binder::{bind, bind_with, BoundAction, BoundActions, Namespace};
pub use crate::core::tree::{Creator, CreatorTree, Node};
pub use crate::error::{ActionError, BindError, TreeError};
