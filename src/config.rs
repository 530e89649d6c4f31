//! Binding configuration and layout files.
//!
//! A layout file declares a creator tree as plain text, one creator per line,
//! in the same `key = value` shape as the rest of our config files:
//!
//! ```text
//! # comments and blank lines are skipped
//! nil =
//! one = a
//! foo.bar = c
//!
//! [todos]           # following keys live under `todos`
//! add = text, done  # todos_add
//! ```
//!
//! The value lists parameter names; the generated creator maps each name to
//! the positional argument at the same index.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use crate::core::action::{Payload, TYPE_KEY};
use crate::core::tree::{Creator, CreatorTree, Node};
use crate::error::TreeError;

// ───────────────────────────────────────── bind config ───────

/// Knobs for [`bind_with`](crate::core::binder::bind_with).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindConfig {
    /// Prepended to every type string.
    pub prefix: String,
    /// Placed between path segments.
    pub separator: String,
    /// Maximum number of namespaces nested inside one another.
    pub max_depth: usize,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            separator: "_".into(),
            max_depth: 64,
        }
    }
}

// ───────────────────────────────────────── layout ────────────

/// Longest dotted path (section plus key) a layout line may declare.
pub const MAX_LAYOUT_DEPTH: usize = 1024;

/// One creator declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    /// 1-based line number in the source text.
    pub line: usize,
    pub path: Vec<String>,
    pub params: Vec<String>,
}

/// A parsed layout file.
#[derive(Debug, Clone)]
pub struct Layout {
    entries: Vec<LayoutEntry>,
    tree: CreatorTree,
}

impl Layout {
    /// Read and parse a layout file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading layout {}", path.display()))?;
        let layout = Self::parse(&contents)
            .with_context(|| format!("parsing layout {}", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            creators = layout.entries.len(),
            "loaded layout"
        );
        Ok(layout)
    }

    pub fn parse(s: &str) -> Result<Self, TreeError> {
        let mut entries = Vec::new();
        let mut tree = CreatorTree::new();
        let mut section: Vec<String> = Vec::new();

        for (idx, raw) in s.lines().enumerate() {
            let line = idx + 1;
            let text = strip_comment(raw).trim();
            if text.is_empty() {
                continue;
            }

            if let Some(header) = text.strip_prefix('[') {
                let Some(header) = header.strip_suffix(']') else {
                    return Err(layout_error(line, "unterminated section header"));
                };
                let header = header.trim();
                section = if header.is_empty() {
                    Vec::new()
                } else {
                    parse_path(header, line)?
                };
                continue;
            }

            let Some((key, value)) = text.split_once('=') else {
                return Err(layout_error(line, "expected `path = params`"));
            };

            let mut path = section.clone();
            path.extend(parse_path(key.trim(), line)?);
            if path.len() > MAX_LAYOUT_DEPTH {
                return Err(layout_error(
                    line,
                    format!(
                        "path has {} segments, more than {MAX_LAYOUT_DEPTH}",
                        path.len()
                    ),
                ));
            }
            let params = parse_params(value.trim(), line)?;

            insert_path(&mut tree, &path, params_creator(params.clone()), line)?;
            entries.push(LayoutEntry { line, path, params });
        }

        Ok(Self { entries, tree })
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    pub fn tree(&self) -> &CreatorTree {
        &self.tree
    }

    pub fn into_tree(self) -> CreatorTree {
        self.tree
    }
}

fn layout_error(line: usize, reason: impl Into<String>) -> TreeError {
    TreeError::Layout {
        line,
        reason: reason.into(),
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// Split `foo.bar` into segments, rejecting empty ones.
fn parse_path(s: &str, line: usize) -> Result<Vec<String>, TreeError> {
    let mut out = Vec::new();
    for segment in s.split('.') {
        let segment = segment.trim();
        if segment.is_empty() {
            return Err(layout_error(line, format!("empty path segment in `{s}`")));
        }
        out.push(segment.to_string());
    }
    Ok(out)
}

fn parse_params(s: &str, line: usize) -> Result<Vec<String>, TreeError> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for part in s.split(',') {
        let name = part.trim().trim_matches('"');
        if name.is_empty() {
            return Err(layout_error(line, "empty parameter name"));
        }
        if !seen.insert(name) {
            return Err(layout_error(line, format!("parameter `{name}` listed twice")));
        }
        out.push(name.to_string());
    }
    Ok(out)
}

/// A creator that maps parameter names onto positional arguments.
/// Missing arguments become `null`, except a missing `type` which is left
/// out so the computed type applies.  Extra arguments are ignored.
fn params_creator(params: Vec<String>) -> Creator {
    Creator::new(move |args| {
        let mut payload = Payload::new();
        for (i, name) in params.iter().enumerate() {
            match args.get(i) {
                Some(arg) => {
                    payload.insert(name.clone(), arg.clone());
                }
                None if name == TYPE_KEY => {}
                None => {
                    payload.insert(name.clone(), Value::Null);
                }
            }
        }
        Value::Object(payload)
    })
}

/// Insert `creator` at `path`, creating namespaces along the way.
fn insert_path(
    tree: &mut CreatorTree,
    path: &[String],
    creator: Creator,
    line: usize,
) -> Result<(), TreeError> {
    let Some((last, namespaces)) = path.split_last() else {
        return Err(layout_error(line, "empty path"));
    };

    let mut cur = tree;
    for (depth, segment) in namespaces.iter().enumerate() {
        if cur.get(segment).is_none() {
            cur.try_insert(segment.clone(), Node::Branch(CreatorTree::new()))?;
        }
        cur = match cur.entry_mut(segment) {
            Some(Node::Branch(sub)) => sub,
            _ => {
                return Err(layout_error(
                    line,
                    format!("`{}` is already a creator", namespaces[..=depth].join(".")),
                ))
            }
        };
    }

    match cur.get(last).map(Node::is_leaf) {
        None => cur.try_insert(last.clone(), Node::Leaf(creator)),
        Some(true) => Err(layout_error(
            line,
            format!("`{}` declared twice", path.join(".")),
        )),
        Some(false) => Err(layout_error(
            line,
            format!("`{}` is already a namespace", path.join(".")),
        )),
    }
}
