/*
 * evaluator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Program evaluation.
//!
//! Executes the ops of a compiled [`Program`] against a scope chain,
//! accumulating output. Expression dispatch order: registered helper (for a
//! simple leading symbol), then path resolution, then invocation when the
//! resolved value is callable, then the `helperMissing` fallback for an
//! unresolved simple name. Block dispatch falls back to
//! `blockHelperMissing` instead, so plain values can drive blocks.

use std::collections::BTreeMap;

use crate::ast::{Arg, Expression};
use crate::error::{TemplateError, TemplateResult};
use crate::escape::escape_html;
use crate::helpers::{HelperOptions, HelperRegistry};
use crate::partials::Partials;
use crate::program::{Op, Program};
use crate::scope::Scope;
use crate::value::TemplateValue;

/// Partial nesting bound; exceeding it is an error rather than a stack
/// overflow.
pub(crate) const MAX_PARTIAL_DEPTH: usize = 50;

/// Everything an executing block needs besides its scope.
pub(crate) struct RenderEnv<'a> {
    pub(crate) program: &'a Program,
    pub(crate) helpers: &'a HelperRegistry,
    pub(crate) partials: &'a Partials,
}

/// Execute one block unit to a string.
pub(crate) fn execute_block(
    env: &RenderEnv<'_>,
    block_id: usize,
    scope: &Scope<'_>,
    depth: usize,
) -> TemplateResult<String> {
    let block = env
        .program
        .blocks
        .get(block_id)
        .ok_or_else(|| TemplateError::InvalidPrecompiled {
            message: format!("block id {block_id} out of range"),
        })?;

    let mut out = String::new();
    for op in &block.ops {
        exec_op(env, op, scope, &mut out, depth)?;
    }
    Ok(out)
}

fn exec_op(
    env: &RenderEnv<'_>,
    op: &Op,
    scope: &Scope<'_>,
    out: &mut String,
    depth: usize,
) -> TemplateResult<()> {
    match op {
        Op::Append(text) => out.push_str(text),

        Op::Expand { expr, escape } => {
            let value = eval_expression(env, scope, expr, depth)?;
            let rendered = value.render();
            if *escape {
                out.push_str(&escape_html(&rendered));
            } else {
                out.push_str(&rendered);
            }
        }

        Op::Invoke {
            name,
            path,
            args,
            kwargs,
            fn_block,
            inverse,
            inverted,
        } => {
            let (args_v, kwargs_v) = eval_args(env, scope, args, kwargs, depth)?;
            let (fn_id, inverse_id) = if *inverted {
                (*inverse, Some(*fn_block))
            } else {
                (Some(*fn_block), *inverse)
            };
            let options = HelperOptions::new(env, fn_id, inverse_id, depth);

            let result = if let Some(helper) = env.helpers.get(name) {
                helper(scope, &options, &args_v, &kwargs_v)?
            } else {
                let value = scope.resolve(path);
                if let TemplateValue::Helper(f) = &value {
                    let f = f.clone();
                    f(scope, &options, &args_v, &kwargs_v)?
                } else {
                    call_named_helper(
                        env,
                        scope,
                        &options,
                        "blockHelperMissing",
                        &[value],
                        &BTreeMap::new(),
                    )?
                }
            };
            out.push_str(&result.render());
        }

        Op::Iterate {
            keyword,
            path,
            bound,
            columns,
            fn_block,
            inverse,
        } => {
            let collection = scope.resolve(path);
            let args_v = vec![collection, TemplateValue::String(bound.clone())];
            let mut kwargs_v = BTreeMap::new();
            if let Some(columns_arg) = columns {
                kwargs_v.insert(
                    "columns".to_string(),
                    eval_arg(env, scope, columns_arg, depth)?,
                );
            }
            let options = HelperOptions::new(env, Some(*fn_block), *inverse, depth);
            let result = call_named_helper(
                env,
                scope,
                &options,
                keyword.helper_name(),
                &args_v,
                &kwargs_v,
            )?;
            out.push_str(&result.render());
        }

        Op::Partial { name, arg, kwargs } => {
            if depth + 1 > MAX_PARTIAL_DEPTH {
                return Err(TemplateError::RecursionLimit {
                    max: MAX_PARTIAL_DEPTH,
                });
            }
            let program = env.partials.resolve(name)?;
            tracing::trace!(partial = name.as_str(), "rendering partial");

            let context = match arg {
                Some(arg) => eval_arg(env, scope, arg, depth)?,
                None => scope.context().clone(),
            };
            let mut overrides = BTreeMap::new();
            for (key, value_arg) in kwargs {
                overrides.insert(key.clone(), eval_arg(env, scope, value_arg, depth)?);
            }
            let child = scope.partial_child(context, overrides);

            let sub_env = RenderEnv {
                program: program.as_ref(),
                helpers: env.helpers,
                partials: env.partials,
            };
            let rendered = execute_block(&sub_env, program.entry, &child, depth + 1)?;
            out.push_str(&rendered);
        }
    }
    Ok(())
}

/// Evaluate an inline expression to a value.
pub(crate) fn eval_expression(
    env: &RenderEnv<'_>,
    scope: &Scope<'_>,
    expr: &Expression,
    depth: usize,
) -> TemplateResult<TemplateValue> {
    let (args_v, kwargs_v) = eval_args(env, scope, &expr.args, &expr.kwargs, depth)?;
    let options = HelperOptions::new(env, None, None, depth);

    if let Some(name) = expr.path.simple_name() {
        if let Some(helper) = env.helpers.get(name) {
            return helper(scope, &options, &args_v, &kwargs_v);
        }
    }

    let value = scope.resolve(&expr.path);
    if let TemplateValue::Helper(f) = &value {
        let f = f.clone();
        return f(scope, &options, &args_v, &kwargs_v);
    }

    if value.is_null() {
        if let Some(name) = expr.path.simple_name() {
            return call_helper_missing(env, scope, &options, name, &args_v);
        }
    }
    Ok(value)
}

fn eval_args(
    env: &RenderEnv<'_>,
    scope: &Scope<'_>,
    args: &[Arg],
    kwargs: &[(String, Arg)],
    depth: usize,
) -> TemplateResult<(Vec<TemplateValue>, BTreeMap<String, TemplateValue>)> {
    let mut args_v = Vec::with_capacity(args.len());
    for arg in args {
        args_v.push(eval_arg(env, scope, arg, depth)?);
    }
    let mut kwargs_v = BTreeMap::new();
    for (key, arg) in kwargs {
        kwargs_v.insert(key.clone(), eval_arg(env, scope, arg, depth)?);
    }
    Ok((args_v, kwargs_v))
}

/// Evaluate one argument. Subexpressions are a direct call of the named
/// helper with their own resolved arguments, recursively.
pub(crate) fn eval_arg(
    env: &RenderEnv<'_>,
    scope: &Scope<'_>,
    arg: &Arg,
    depth: usize,
) -> TemplateResult<TemplateValue> {
    match arg {
        Arg::Literal(literal) => Ok(TemplateValue::from(literal)),
        Arg::Path(path) => Ok(scope.resolve(path)),
        Arg::SubExpr { name, args, kwargs } => {
            let (args_v, kwargs_v) = eval_args(env, scope, args, kwargs, depth)?;
            let options = HelperOptions::new(env, None, None, depth);
            match env.helpers.get(name) {
                Some(helper) => helper(scope, &options, &args_v, &kwargs_v),
                None => call_helper_missing(env, scope, &options, name, &args_v),
            }
        }
    }
}

/// Route an unresolved simple name through `helperMissing`, which the
/// caller may have overridden.
fn call_helper_missing(
    env: &RenderEnv<'_>,
    scope: &Scope<'_>,
    options: &HelperOptions<'_>,
    name: &str,
    args: &[TemplateValue],
) -> TemplateResult<TemplateValue> {
    let mut missing_args = Vec::with_capacity(args.len() + 1);
    missing_args.push(TemplateValue::String(name.to_string()));
    missing_args.extend_from_slice(args);
    match env.helpers.get("helperMissing") {
        Some(helper) => helper(scope, options, &missing_args, &BTreeMap::new()),
        None if args.is_empty() => Ok(TemplateValue::Null),
        None => Err(TemplateError::HelperMissing {
            name: name.to_string(),
        }),
    }
}

fn call_named_helper(
    env: &RenderEnv<'_>,
    scope: &Scope<'_>,
    options: &HelperOptions<'_>,
    name: &str,
    args: &[TemplateValue],
    kwargs: &BTreeMap<String, TemplateValue>,
) -> TemplateResult<TemplateValue> {
    match env.helpers.get(name) {
        Some(helper) => helper(scope, options, args, kwargs),
        None => Ok(TemplateValue::Null),
    }
}
