/*
 * scope.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Runtime scopes and path resolution.
//!
//! A [`Scope`] is one evaluation frame: the context value currently in view,
//! a reference to the enclosing frame, the shared root context, optional
//! name overrides pinned by a partial, and the per-iteration metadata set by
//! `each`/`foreach`. Scopes are created at block-helper invocation
//! boundaries (one per loop iteration, one per `with`, one per partial) and
//! form a call-stack-shaped chain; nothing outlives the render call that
//! created it.

use std::collections::BTreeMap;

use crate::ast::{Path, Segment};
use crate::value::TemplateValue;

/// One evaluation frame.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    context: TemplateValue,
    parent: Option<&'a Scope<'a>>,
    root: &'a TemplateValue,
    overrides: Option<BTreeMap<String, TemplateValue>>,
    index: Option<usize>,
    key: Option<String>,
    first: Option<bool>,
    last: Option<bool>,
    columns: Option<usize>,
}

impl<'a> Scope<'a> {
    /// The outermost frame of a render call.
    pub fn root_scope(context: TemplateValue, root: &'a TemplateValue) -> Self {
        Scope {
            context,
            parent: None,
            root,
            overrides: None,
            index: None,
            key: None,
            first: None,
            last: None,
            columns: None,
        }
    }

    /// A child frame with a substituted context (`with`, block contexts).
    pub fn child(&self, context: TemplateValue) -> Scope<'_> {
        Scope {
            context,
            parent: Some(self),
            root: self.root,
            overrides: None,
            index: None,
            key: None,
            first: None,
            last: None,
            columns: None,
        }
    }

    /// A child frame for one `each`/`foreach` iteration.
    pub fn iteration_child(
        &self,
        context: TemplateValue,
        index: usize,
        first: bool,
        last: bool,
        key: Option<String>,
        columns: Option<usize>,
    ) -> Scope<'_> {
        Scope {
            context,
            parent: Some(self),
            root: self.root,
            overrides: None,
            index: Some(index),
            key,
            first: Some(first),
            last: Some(last),
            columns,
        }
    }

    /// A child frame for a partial invocation, with keyword arguments pinned
    /// as overrides for the duration of the partial.
    pub fn partial_child(
        &self,
        context: TemplateValue,
        overrides: BTreeMap<String, TemplateValue>,
    ) -> Scope<'_> {
        Scope {
            context,
            parent: Some(self),
            root: self.root,
            overrides: Some(overrides),
            index: None,
            key: None,
            first: None,
            last: None,
            columns: None,
        }
    }

    /// The context value currently in view.
    pub fn context(&self) -> &TemplateValue {
        &self.context
    }

    /// The top-level context of the render call.
    pub fn root(&self) -> &TemplateValue {
        self.root
    }

    /// Scope variable lookup.
    ///
    /// Special names come first (`this`, the root aliases, the iteration
    /// variables), then partial overrides, then generic lookup on the
    /// wrapped context value. Missing names resolve to `Null`.
    pub fn get(&self, name: &str) -> TemplateValue {
        match name {
            "this" => self.context.clone(),
            "@root" | "@blog" => self.root.clone(),
            "@index" => self
                .index
                .map(|i| TemplateValue::Int(i as i64))
                .unwrap_or(TemplateValue::Null),
            "@key" => self
                .key
                .clone()
                .map(TemplateValue::String)
                .unwrap_or(TemplateValue::Null),
            "@first" => self
                .first
                .map(TemplateValue::Bool)
                .unwrap_or(TemplateValue::Null),
            "@last" => self
                .last
                .map(TemplateValue::Bool)
                .unwrap_or(TemplateValue::Null),
            // The parity mapping is inverted from the intuitive meaning of
            // "odd": index 0 reports @odd. Kept for output compatibility.
            "@odd" => self
                .index
                .map(|i| TemplateValue::Bool(i % 2 == 0))
                .unwrap_or(TemplateValue::Null),
            "@even" => self
                .index
                .map(|i| TemplateValue::Bool(i % 2 == 1))
                .unwrap_or(TemplateValue::Null),
            "@rowStart" => match (self.index, self.columns) {
                (Some(i), Some(c)) if c > 0 => TemplateValue::Bool(i % c == 0),
                _ => TemplateValue::Null,
            },
            "@rowEnd" => match (self.index, self.columns) {
                (Some(i), Some(c)) if c > 0 => TemplateValue::Bool(i % c == c - 1),
                _ => TemplateValue::Null,
            },
            _ => {
                if let Some(overrides) = &self.overrides {
                    if let Some(v) = overrides.get(name) {
                        return v.clone();
                    }
                }
                self.context.member(name)
            }
        }
    }

    /// Resolve a path segment by segment against this scope chain.
    ///
    /// A `Null` intermediate short-circuits to `Null`; so does ascending
    /// past the top of the chain. Lookup failures are not errors.
    pub fn resolve(&self, path: &Path) -> TemplateValue {
        let mut cursor = Cursor::Scope(self);
        let mut at_prefix = false;

        for segment in &path.segments {
            match segment {
                Segment::This => {}
                Segment::Parent | Segment::ParentAttr => {
                    cursor = match cursor {
                        Cursor::Scope(scope) => match scope.parent {
                            Some(parent) => Cursor::Scope(parent),
                            None => return TemplateValue::Null,
                        },
                        Cursor::Value(_) => return TemplateValue::Null,
                    };
                    at_prefix = matches!(segment, Segment::ParentAttr);
                }
                Segment::Name(name) => {
                    let looked_up = if at_prefix {
                        at_prefix = false;
                        let special = format!("@{name}");
                        match &cursor {
                            Cursor::Scope(scope) => scope.get(&special),
                            Cursor::Value(value) => value.member(&special),
                        }
                    } else {
                        match &cursor {
                            Cursor::Scope(scope) => scope.get(name),
                            Cursor::Value(value) => value.member(name),
                        }
                    };
                    if looked_up.is_null() {
                        return TemplateValue::Null;
                    }
                    cursor = Cursor::Value(looked_up);
                }
            }
        }

        match cursor {
            Cursor::Scope(scope) => scope.context.clone(),
            Cursor::Value(value) => value,
        }
    }
}

/// Resolution cursor: still walking the scope chain, or already down in a
/// plain value.
enum Cursor<'s> {
    Scope(&'s Scope<'s>),
    Value(TemplateValue),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Path, Segment};

    fn map(pairs: &[(&str, TemplateValue)]) -> TemplateValue {
        TemplateValue::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn path(segments: Vec<Segment>) -> Path {
        Path { segments }
    }

    #[test]
    fn test_simple_lookup() {
        let root = map(&[("name", TemplateValue::from("Ada"))]);
        let scope = Scope::root_scope(root.clone(), &root);

        assert_eq!(scope.get("name"), TemplateValue::from("Ada"));
        assert_eq!(scope.get("missing"), TemplateValue::Null);
    }

    #[test]
    fn test_this_returns_context() {
        let root = TemplateValue::from("hello");
        let scope = Scope::root_scope(root.clone(), &root);
        assert_eq!(scope.get("this"), TemplateValue::from("hello"));
    }

    #[test]
    fn test_root_aliases() {
        let root = map(&[("site", TemplateValue::from("blog"))]);
        let scope = Scope::root_scope(TemplateValue::from("inner"), &root);
        let child = scope.child(TemplateValue::from("deeper"));

        assert_eq!(child.get("@root"), root);
        assert_eq!(child.get("@blog"), root);
    }

    #[test]
    fn test_parent_traversal() {
        let b = map(&[("b", TemplateValue::from("X"))]);
        let root = map(&[("a", b.clone())]);
        let scope = Scope::root_scope(root.clone(), &root);
        let inner = scope.child(b);

        // ../a.b from the inner scope resolves back through the parent
        let p = path(vec![
            Segment::Parent,
            Segment::Name("a".to_string()),
            Segment::Name("b".to_string()),
        ]);
        assert_eq!(inner.resolve(&p), TemplateValue::from("X"));
    }

    #[test]
    fn test_parent_past_top_is_null() {
        let root = map(&[]);
        let scope = Scope::root_scope(root.clone(), &root);
        let p = path(vec![Segment::Parent, Segment::Name("a".to_string())]);
        assert_eq!(scope.resolve(&p), TemplateValue::Null);
    }

    #[test]
    fn test_parent_attr_reads_special_variable() {
        let root = TemplateValue::List(vec![]);
        let scope = Scope::root_scope(root.clone(), &root);
        let iteration = scope.iteration_child(TemplateValue::from("item"), 2, false, false, None, None);
        let inner = iteration.child(TemplateValue::from("deeper"));

        // @../index ascends one level and reads @index there
        let p = path(vec![Segment::ParentAttr, Segment::Name("index".to_string())]);
        assert_eq!(inner.resolve(&p), TemplateValue::Int(2));
    }

    #[test]
    fn test_iteration_variables() {
        let root = TemplateValue::Null;
        let scope = Scope::root_scope(TemplateValue::Null, &root);
        let it = scope.iteration_child(TemplateValue::from("x"), 0, true, false, None, Some(3));

        assert_eq!(it.get("@index"), TemplateValue::Int(0));
        assert_eq!(it.get("@first"), TemplateValue::Bool(true));
        assert_eq!(it.get("@last"), TemplateValue::Bool(false));
        assert_eq!(it.get("@rowStart"), TemplateValue::Bool(true));
        assert_eq!(it.get("@rowEnd"), TemplateValue::Bool(false));
    }

    #[test]
    fn test_parity_mapping_is_inverted() {
        let root = TemplateValue::Null;
        let scope = Scope::root_scope(TemplateValue::Null, &root);

        // index 0 reports @odd, index 1 reports @even
        let it0 = scope.iteration_child(TemplateValue::Null, 0, true, false, None, None);
        assert_eq!(it0.get("@odd"), TemplateValue::Bool(true));
        assert_eq!(it0.get("@even"), TemplateValue::Bool(false));

        let it1 = scope.iteration_child(TemplateValue::Null, 1, false, false, None, None);
        assert_eq!(it1.get("@odd"), TemplateValue::Bool(false));
        assert_eq!(it1.get("@even"), TemplateValue::Bool(true));
    }

    #[test]
    fn test_overrides_checked_before_context() {
        let context = map(&[("title", TemplateValue::from("from context"))]);
        let root = TemplateValue::Null;
        let scope = Scope::root_scope(TemplateValue::Null, &root);

        let mut overrides = BTreeMap::new();
        overrides.insert("title".to_string(), TemplateValue::from("pinned"));
        let partial = scope.partial_child(context, overrides);

        assert_eq!(partial.get("title"), TemplateValue::from("pinned"));
        // Names without an override fall through to the context
        assert_eq!(partial.get("missing"), TemplateValue::Null);
    }

    #[test]
    fn test_list_index_resolution() {
        let root = map(&[(
            "items",
            TemplateValue::List(vec![TemplateValue::from("a"), TemplateValue::from("b")]),
        )]);
        let scope = Scope::root_scope(root.clone(), &root);

        let p = path(vec![
            Segment::Name("items".to_string()),
            Segment::Name("1".to_string()),
        ]);
        assert_eq!(scope.resolve(&p), TemplateValue::from("b"));
    }

    #[test]
    fn test_null_short_circuits() {
        let root = map(&[]);
        let scope = Scope::root_scope(root.clone(), &root);
        let p = path(vec![
            Segment::Name("missing".to_string()),
            Segment::Name("deeper".to_string()),
        ]);
        assert_eq!(scope.resolve(&p), TemplateValue::Null);
    }

    #[test]
    fn test_bare_this_path_resolves_to_context() {
        let root = TemplateValue::from("ctx");
        let scope = Scope::root_scope(root.clone(), &root);
        let p = path(vec![Segment::This]);
        assert_eq!(scope.resolve(&p), TemplateValue::from("ctx"));
    }
}
