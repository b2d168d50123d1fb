//! Traversal utilities for content snapshots.
//!
//! A snapshot is an arbitrary JSON document (`serde_json::Value`), i.e. a sum
//! of scalars, lists and maps. Everything that needs to look inside one --
//! schema validation, temp-image finalization, placement discovery -- goes
//! through the walkers here instead of hand-rolling recursion.

use std::fmt;

use serde_json::Value;

use crate::error::CoreError;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a node inside a snapshot, rendered as `home.hero.title` or
/// `news.items[2].photo`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Return a new path with `key` appended.
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.0.push(PathSegment::Key(key.into()));
        next
    }

    /// Return a new path with `index` appended.
    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.0.push(PathSegment::Index(index));
        next
    }

    /// The path without its last segment. The root is its own parent.
    pub fn parent(&self) -> Self {
        let mut parent = self.clone();
        parent.0.pop();
        parent
    }

    /// `true` when the last segment is a list index.
    pub fn is_list_element(&self) -> bool {
        matches!(self.0.last(), Some(PathSegment::Index(_)))
    }

    /// Parse the textual form produced by `Display`.
    ///
    /// Keys may contain any character except `.`, `[` and `]`.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let invalid = || CoreError::Validation(format!("Invalid field path '{raw}'"));

        let raw = raw.trim();
        if raw.is_empty() {
            return Err(invalid());
        }

        let mut segments = Vec::new();
        for part in raw.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if key.is_empty() || key.contains(']') {
                return Err(invalid());
            }
            segments.push(PathSegment::Key(key.to_string()));

            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(invalid)?;
                let index = rest[1..close].parse::<usize>().map_err(|_| invalid())?;
                segments.push(PathSegment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(invalid());
                }
            }
        }

        Ok(Self(segments))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            match segment {
                PathSegment::Key(key) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
            first = false;
        }
        Ok(())
    }
}

/// Look up the node at `path`.
pub fn get<'a>(value: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(value, |node, segment| match segment {
            PathSegment::Key(key) => node.as_object()?.get(key),
            PathSegment::Index(index) => node.as_array()?.get(*index),
        })
}

/// Visit every node of `value` in pre-order.
pub fn walk<F>(value: &Value, mut visit: F)
where
    F: FnMut(&FieldPath, &Value),
{
    fn recurse<F: FnMut(&FieldPath, &Value)>(path: &FieldPath, node: &Value, visit: &mut F) {
        visit(path, node);
        match node {
            Value::Object(map) => {
                for (key, child) in map {
                    recurse(&path.key(key.as_str()), child, visit);
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    recurse(&path.index(index), child, visit);
                }
            }
            _ => {}
        }
    }

    recurse(&FieldPath::root(), value, &mut visit);
}

/// Collect every string leaf for which `matches` returns `true`.
pub fn find_strings<F>(value: &Value, mut matches: F) -> Vec<(FieldPath, String)>
where
    F: FnMut(&str) -> bool,
{
    let mut found = Vec::new();
    walk(value, |path, node| {
        if let Value::String(s) = node {
            if matches(s) {
                found.push((path.clone(), s.clone()));
            }
        }
    });
    found
}

/// Replace string leaves in place. `rewrite` returns `Some(new)` to replace a
/// leaf and `None` to keep it. Returns the number of leaves replaced.
pub fn rewrite_strings<F>(value: &mut Value, mut rewrite: F) -> usize
where
    F: FnMut(&FieldPath, &str) -> Option<String>,
{
    fn recurse<F: FnMut(&FieldPath, &str) -> Option<String>>(
        path: &FieldPath,
        node: &mut Value,
        rewrite: &mut F,
    ) -> usize {
        match node {
            Value::String(s) => match rewrite(path, s) {
                Some(replacement) => {
                    *s = replacement;
                    1
                }
                None => 0,
            },
            Value::Object(map) => map
                .iter_mut()
                .map(|(key, child)| recurse(&path.key(key.as_str()), child, rewrite))
                .sum(),
            Value::Array(items) => items
                .iter_mut()
                .enumerate()
                .map(|(index, child)| recurse(&path.index(index), child, rewrite))
                .sum(),
            _ => 0,
        }
    }

    recurse(&FieldPath::root(), value, &mut rewrite)
}

/// A value counts as "missing" when it is null, an empty/whitespace string, or
/// an empty list.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}
