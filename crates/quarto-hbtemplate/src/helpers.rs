/*
 * helpers.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Helper registry and the built-in helpers.
//!
//! Helpers are a runtime string-keyed map of callables — deliberately open,
//! since caller extensibility is the point. A helper receives the current
//! scope, an options record wrapping the block's fn/inverse units, the
//! resolved positional arguments, and the resolved keyword arguments.
//!
//! Call-time helpers shadow the defaults for that render only; the default
//! registry is never mutated by a render.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::error::{TemplateError, TemplateResult};
use crate::evaluator::{execute_block, RenderEnv};
use crate::scope::Scope;
use crate::value::TemplateValue;

/// The helper interface: `(scope, options, args, kwargs) -> value`.
pub type HelperFn = Arc<
    dyn Fn(
            &Scope<'_>,
            &HelperOptions<'_>,
            &[TemplateValue],
            &BTreeMap<String, TemplateValue>,
        ) -> TemplateResult<TemplateValue>
        + Send
        + Sync,
>;

/// The options record handed to a helper invocation.
///
/// For block helpers it wraps the compiled primary and alternate bodies;
/// for inline helpers and subexpressions both are absent and render empty.
pub struct HelperOptions<'a> {
    env: &'a RenderEnv<'a>,
    fn_block: Option<usize>,
    inverse: Option<usize>,
    depth: usize,
}

impl<'a> HelperOptions<'a> {
    pub(crate) fn new(
        env: &'a RenderEnv<'a>,
        fn_block: Option<usize>,
        inverse: Option<usize>,
        depth: usize,
    ) -> Self {
        HelperOptions {
            env,
            fn_block,
            inverse,
            depth,
        }
    }

    /// Render the block's primary body with the given scope.
    pub fn render_fn(&self, scope: &Scope<'_>) -> TemplateResult<String> {
        match self.fn_block {
            Some(id) => execute_block(self.env, id, scope, self.depth),
            None => Ok(String::new()),
        }
    }

    /// Render the block's `{{else}}` body with the given scope.
    pub fn render_inverse(&self, scope: &Scope<'_>) -> TemplateResult<String> {
        match self.inverse {
            Some(id) => execute_block(self.env, id, scope, self.depth),
            None => Ok(String::new()),
        }
    }

    /// The helper registry in effect for this render.
    pub fn helpers(&self) -> &HelperRegistry {
        self.env.helpers
    }
}

/// A string-keyed map of helpers.
#[derive(Clone, Default)]
pub struct HelperRegistry {
    helpers: BTreeMap<String, HelperFn>,
}

impl fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperRegistry")
            .field("names", &self.helpers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl HelperRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the built-in registry.
    pub fn with_defaults() -> Self {
        DEFAULTS.clone()
    }

    /// Register a helper, shadowing any existing one with the same name.
    pub fn register(&mut self, name: impl Into<String>, helper: HelperFn) -> &mut Self {
        self.helpers.insert(name.into(), helper);
        self
    }

    /// Register a plain function or closure as a helper.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, helper: F) -> &mut Self
    where
        F: Fn(
                &Scope<'_>,
                &HelperOptions<'_>,
                &[TemplateValue],
                &BTreeMap<String, TemplateValue>,
            ) -> TemplateResult<TemplateValue>
            + Send
            + Sync
            + 'static,
    {
        self.register(name, Arc::new(helper))
    }

    /// Look up a helper by name.
    pub fn get(&self, name: &str) -> Option<&HelperFn> {
        self.helpers.get(name)
    }

    /// Copy every helper from `other` into this registry, shadowing
    /// existing names.
    pub fn extend_from(&mut self, other: &HelperRegistry) {
        for (name, helper) in &other.helpers {
            self.helpers.insert(name.clone(), helper.clone());
        }
    }
}

static DEFAULTS: Lazy<HelperRegistry> = Lazy::new(|| {
    let mut registry = HelperRegistry::new();
    registry.register_fn("if", if_helper);
    registry.register_fn("unless", unless_helper);
    registry.register_fn("with", with_helper);
    registry.register_fn("each", each_helper);
    registry.register_fn("foreach", foreach_helper);
    registry.register_fn("lookup", lookup_helper);
    registry.register_fn("blockHelperMissing", block_helper_missing);
    registry.register_fn("helperMissing", helper_missing);
    registry
});

/// Invoke a value when it is callable, otherwise pass it through.
fn call_if_callable(
    value: TemplateValue,
    scope: &Scope<'_>,
    options: &HelperOptions<'_>,
) -> TemplateResult<TemplateValue> {
    match value {
        TemplateValue::Helper(f) => f(scope, options, &[], &BTreeMap::new()),
        other => Ok(other),
    }
}

fn if_helper(
    scope: &Scope<'_>,
    options: &HelperOptions<'_>,
    args: &[TemplateValue],
    _kwargs: &BTreeMap<String, TemplateValue>,
) -> TemplateResult<TemplateValue> {
    let condition = call_if_callable(args.first().cloned().unwrap_or_default(), scope, options)?;
    let rendered = if condition.is_truthy() {
        options.render_fn(scope)?
    } else {
        options.render_inverse(scope)?
    };
    Ok(TemplateValue::String(rendered))
}

fn unless_helper(
    scope: &Scope<'_>,
    options: &HelperOptions<'_>,
    args: &[TemplateValue],
    _kwargs: &BTreeMap<String, TemplateValue>,
) -> TemplateResult<TemplateValue> {
    let condition = call_if_callable(args.first().cloned().unwrap_or_default(), scope, options)?;
    let rendered = if condition.is_truthy() {
        options.render_inverse(scope)?
    } else {
        options.render_fn(scope)?
    };
    Ok(TemplateValue::String(rendered))
}

fn with_helper(
    scope: &Scope<'_>,
    options: &HelperOptions<'_>,
    args: &[TemplateValue],
    _kwargs: &BTreeMap<String, TemplateValue>,
) -> TemplateResult<TemplateValue> {
    // No truthiness check: the body always runs with the new context
    let context = args.first().cloned().unwrap_or_default();
    let child = scope.child(context);
    Ok(TemplateValue::String(options.render_fn(&child)?))
}

fn each_helper(
    scope: &Scope<'_>,
    options: &HelperOptions<'_>,
    args: &[TemplateValue],
    kwargs: &BTreeMap<String, TemplateValue>,
) -> TemplateResult<TemplateValue> {
    iterate(scope, options, args, kwargs, false)
}

fn foreach_helper(
    scope: &Scope<'_>,
    options: &HelperOptions<'_>,
    args: &[TemplateValue],
    kwargs: &BTreeMap<String, TemplateValue>,
) -> TemplateResult<TemplateValue> {
    iterate(scope, options, args, kwargs, true)
}

/// Shared body of `each` and `foreach`; only `foreach` honors `columns=`.
fn iterate(
    scope: &Scope<'_>,
    options: &HelperOptions<'_>,
    args: &[TemplateValue],
    kwargs: &BTreeMap<String, TemplateValue>,
    columns_allowed: bool,
) -> TemplateResult<TemplateValue> {
    let collection = args.first().cloned().unwrap_or_default();
    let columns = if columns_allowed {
        kwargs.get("columns").and_then(value_as_usize)
    } else {
        None
    };

    let entries = collection_entries(&collection);
    if entries.is_empty() {
        return Ok(TemplateValue::String(options.render_inverse(scope)?));
    }

    let len = entries.len();
    let mut out = String::new();
    for (index, (key, item)) in entries.into_iter().enumerate() {
        let child = scope.iteration_child(item, index, index == 0, index + 1 == len, key, columns);
        out.push_str(&options.render_fn(&child)?);
    }
    Ok(TemplateValue::String(out))
}

/// One `(key, value)` entry per iteration. Lists and strings have no keys;
/// maps iterate in sorted key order. Scalars have no length and yield
/// nothing.
fn collection_entries(value: &TemplateValue) -> Vec<(Option<String>, TemplateValue)> {
    match value {
        TemplateValue::List(items) => items.iter().map(|v| (None, v.clone())).collect(),
        TemplateValue::Map(m) => m.iter().map(|(k, v)| (Some(k.clone()), v.clone())).collect(),
        TemplateValue::String(s) => s
            .chars()
            .map(|c| (None, TemplateValue::String(c.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

fn value_as_usize(value: &TemplateValue) -> Option<usize> {
    match value {
        TemplateValue::Int(i) if *i >= 0 => Some(*i as usize),
        TemplateValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn lookup_helper(
    _scope: &Scope<'_>,
    _options: &HelperOptions<'_>,
    args: &[TemplateValue],
    _kwargs: &BTreeMap<String, TemplateValue>,
) -> TemplateResult<TemplateValue> {
    let container = args.first().cloned().unwrap_or_default();
    Ok(match args.get(1) {
        Some(TemplateValue::Int(i)) if *i >= 0 => container.member(&i.to_string()),
        Some(TemplateValue::String(key)) => container.member(key),
        _ => TemplateValue::Null,
    })
}

/// Fallback for a block whose name resolved to a plain value instead of a
/// registered helper. This is what makes an arbitrary truthy/falsy/iterable
/// value usable directly as a block's driving context.
fn block_helper_missing(
    scope: &Scope<'_>,
    options: &HelperOptions<'_>,
    args: &[TemplateValue],
    _kwargs: &BTreeMap<String, TemplateValue>,
) -> TemplateResult<TemplateValue> {
    let mut value = args.first().cloned().unwrap_or_default();
    if let TemplateValue::Helper(f) = &value {
        let f = f.clone();
        value = f(scope, options, &[], &BTreeMap::new())?;
    }

    if !value.is_truthy() {
        return Ok(TemplateValue::String(options.render_inverse(scope)?));
    }

    match value {
        TemplateValue::List(items) => {
            let list = TemplateValue::List(items);
            match options.helpers().get("each") {
                Some(each) => {
                    let each = each.clone();
                    each(scope, options, &[list], &BTreeMap::new())
                }
                None => iterate(scope, options, &[list], &BTreeMap::new(), false),
            }
        }
        TemplateValue::Bool(true) => Ok(TemplateValue::String(options.render_fn(scope)?)),
        other => {
            let child = scope.child(other);
            Ok(TemplateValue::String(options.render_fn(&child)?))
        }
    }
}

/// Fallback for an inline expression whose name resolved to nothing.
/// `args[0]` carries the unresolved name; the rest are the call's own
/// arguments. A bare miss renders empty; a miss with arguments is a hard
/// error.
fn helper_missing(
    _scope: &Scope<'_>,
    _options: &HelperOptions<'_>,
    args: &[TemplateValue],
    _kwargs: &BTreeMap<String, TemplateValue>,
) -> TemplateResult<TemplateValue> {
    if args.len() <= 1 {
        return Ok(TemplateValue::Null);
    }
    let name = match args.first() {
        Some(TemplateValue::String(s)) => s.clone(),
        _ => String::new(),
    };
    Err(TemplateError::HelperMissing { name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::partials::Partials;
    use crate::program::Program;

    fn empty_program() -> Program {
        compile(&[])
    }

    #[test]
    fn test_collection_entries() {
        let list = TemplateValue::List(vec![TemplateValue::Int(1), TemplateValue::Int(2)]);
        let entries = collection_entries(&list);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], (None, TemplateValue::Int(1)));

        let mut map = BTreeMap::new();
        map.insert("b".to_string(), TemplateValue::Int(2));
        map.insert("a".to_string(), TemplateValue::Int(1));
        let entries = collection_entries(&TemplateValue::Map(map));
        assert_eq!(entries[0].0.as_deref(), Some("a"));
        assert_eq!(entries[1].0.as_deref(), Some("b"));

        // Strings iterate per character
        let entries = collection_entries(&TemplateValue::from("ab"));
        assert_eq!(entries[1], (None, TemplateValue::from("b")));

        assert!(collection_entries(&TemplateValue::Int(5)).is_empty());
        assert!(collection_entries(&TemplateValue::Null).is_empty());
    }

    #[test]
    fn test_value_as_usize() {
        assert_eq!(value_as_usize(&TemplateValue::Int(3)), Some(3));
        assert_eq!(value_as_usize(&TemplateValue::Int(-3)), None);
        assert_eq!(value_as_usize(&TemplateValue::from("4")), Some(4));
        assert_eq!(value_as_usize(&TemplateValue::Bool(true)), None);
    }

    #[test]
    fn test_lookup_helper() {
        let program = empty_program();
        let helpers = HelperRegistry::with_defaults();
        let partials = Partials::new();
        let env = RenderEnv {
            program: &program,
            helpers: &helpers,
            partials: &partials,
        };
        let options = HelperOptions::new(&env, None, None, 0);
        let root = TemplateValue::Null;
        let scope = Scope::root_scope(TemplateValue::Null, &root);

        let list = TemplateValue::List(vec![TemplateValue::from("x"), TemplateValue::from("y")]);
        let got = lookup_helper(
            &scope,
            &options,
            &[list.clone(), TemplateValue::Int(1)],
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(got, TemplateValue::from("y"));

        // Failure is Null, never an error
        let got = lookup_helper(
            &scope,
            &options,
            &[list, TemplateValue::Int(9)],
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(got, TemplateValue::Null);
    }

    #[test]
    fn test_helper_missing_contract() {
        let program = empty_program();
        let helpers = HelperRegistry::with_defaults();
        let partials = Partials::new();
        let env = RenderEnv {
            program: &program,
            helpers: &helpers,
            partials: &partials,
        };
        let options = HelperOptions::new(&env, None, None, 0);
        let root = TemplateValue::Null;
        let scope = Scope::root_scope(TemplateValue::Null, &root);

        // Zero-argument miss renders empty
        let got = helper_missing(
            &scope,
            &options,
            &[TemplateValue::from("nope")],
            &BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(got, TemplateValue::Null);

        // A miss with arguments is a hard error
        let err = helper_missing(
            &scope,
            &options,
            &[TemplateValue::from("nope"), TemplateValue::Int(1)],
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, TemplateError::HelperMissing { name } if name == "nope"));
    }

    #[test]
    fn test_registry_shadowing_leaves_defaults_alone() {
        let mut custom = HelperRegistry::new();
        custom.register_fn("if", |_scope, _options, _args, _kwargs| {
            Ok(TemplateValue::from("shadowed"))
        });

        let mut merged = HelperRegistry::with_defaults();
        merged.extend_from(&custom);

        assert!(merged.get("if").is_some());
        assert!(merged.get("each").is_some());

        // The process-wide defaults are untouched by the merge
        let fresh = HelperRegistry::with_defaults();
        assert!(!Arc::ptr_eq(
            fresh.get("if").unwrap(),
            merged.get("if").unwrap()
        ));
    }
}
