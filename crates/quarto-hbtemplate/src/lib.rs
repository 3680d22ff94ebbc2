/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Handlebars-compatible web template engine for Quarto.
//!
//! This crate compiles Handlebars-style template source into an invocable
//! render function. It supports:
//!
//! - Variable interpolation with HTML escaping: `{{title}}`
//! - Raw interpolation: `{{{body}}}` or `{{&body}}`
//! - Dotted and slashed paths with scope ascension: `{{post.title}}`,
//!   `{{../author/name}}`, `{{@../index}}`
//! - Block helpers with `{{else}}`/`{{^}}` alternates:
//!   `{{#if ...}}`, `{{#unless ...}}`, `{{#with ...}}`, `{{#each ...}}`,
//!   `{{#foreach ... columns=N}}`
//! - Inverted blocks: `{{^posts}}no posts{{/posts}}`
//! - Blocks driven by plain values (truthy scalars, lists, maps)
//! - Partials with context arguments and keyword overrides:
//!   `{{> author post.author compact=true}}`
//! - Subexpressions: `{{#if (lookup flags 0)}}`
//! - Comments: `{{! note }}` and `{{!-- note --}}`
//! - Special iteration variables: `@index`, `@key`, `@first`, `@last`,
//!   `@odd`, `@even`, `@rowStart`, `@rowEnd`, plus `@root`
//!
//! # Architecture
//!
//! Source text is parsed to an AST ([`parser`]), blank-line noise around
//! standalone block tags is trimmed ([`normalize`]), and the result is
//! lowered to a flat program of ops — one named unit per block scope
//! ([`compiler`], [`program`]) — which the evaluator executes against a
//! scope chain ([`scope`]). Helpers and partials are runtime registries
//! merged per render ([`helpers`], [`partials`]); compiled programs are
//! cached process-wide by logical path ([`template`]).
//!
//! # Example
//!
//! ```ignore
//! use quarto_hbtemplate::{Template, TemplateValue};
//!
//! let template = Template::compile("Hello, {{name}}!")?;
//!
//! let context = TemplateValue::from(serde_json::json!({"name": "World"}));
//! let output = template.render(&context)?;
//! assert_eq!(output, "Hello, World!");
//! ```

pub mod ast;
pub mod compiler;
pub mod error;
pub mod escape;
pub(crate) mod evaluator;
pub mod helpers;
pub mod normalize;
pub mod parser;
pub mod partials;
pub mod program;
pub mod scope;
pub mod template;
pub mod value;

// Re-export main types at crate root
pub use ast::{Arg, BlockNode, Expression, LiteralValue, Node, PartialNode, Path, Segment};
pub use error::{TemplateError, TemplateResult};
pub use helpers::{HelperFn, HelperOptions, HelperRegistry};
pub use partials::Partials;
pub use program::{Program, FORMAT_VERSION};
pub use scope::Scope;
pub use template::Template;
pub use value::TemplateValue;
