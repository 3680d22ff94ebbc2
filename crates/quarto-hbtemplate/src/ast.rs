/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template AST types.
//!
//! This module defines the abstract syntax tree produced by the parser and
//! consumed by the whitespace normalizer and the compiler. Text is kept in
//! three kinds (`Text`, `Whitespace`, `Newline`) so the normalizer can
//! recognize lines that contain nothing but a block tag.

use serde::{Deserialize, Serialize};

/// A node in the template AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text to be output as-is.
    Text(String),

    /// A run of spaces and tabs.
    Whitespace(String),

    /// A single line ending (`\n`, `\r\n`, or `\r`).
    Newline(String),

    /// Comment (not rendered): `{{! ... }}` or `{{!-- ... --}}`
    Comment(String),

    /// Raw interpolation (no escaping): `{{{expr}}}` or `{{&expr}}`
    Expand(Expression),

    /// Escaped interpolation: `{{expr}}`
    EscapedExpand(Expression),

    /// Block helper invocation: `{{#name args}}...{{/name}}`
    Block(BlockNode),

    /// Inverted block: `{{^name args}}...{{/name}}`
    InvertedBlock(BlockNode),

    /// Partial inclusion: `{{> name arg key=value}}`
    Partial(PartialNode),
}

impl Node {
    /// True for the token kinds the whitespace normalizer may delete.
    pub fn is_whitespace(&self) -> bool {
        matches!(self, Node::Whitespace(_))
    }

    /// True for line-ending tokens.
    pub fn is_newline(&self) -> bool {
        matches!(self, Node::Newline(_))
    }
}

/// An inline expression: a path plus positional and keyword arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub path: Path,
    pub args: Vec<Arg>,
    pub kwargs: Vec<(String, Arg)>,
}

/// A block helper invocation with a primary body and an optional
/// `{{else}}`/`{{^}}` alternate body.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    /// The raw symbol from the opening tag; the closing tag must match it.
    pub name: String,
    /// The opening symbol parsed as a path, for dispatch fallback.
    pub path: Path,
    pub args: Vec<Arg>,
    pub kwargs: Vec<(String, Arg)>,
    pub body: Vec<Node>,
    pub alt: Option<Vec<Node>>,
}

/// A partial reference with an optional context argument and keyword
/// overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialNode {
    pub name: String,
    pub arg: Option<Arg>,
    pub kwargs: Vec<(String, Arg)>,
}

/// A dotted/slashed identifier, split into segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub segments: Vec<Segment>,
}

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    /// Produced by `.` and `this`; resolution no-op.
    This,
    /// Produced by `..`; ascend one scope.
    Parent,
    /// Produced by `@..`; ascend one scope and read the next segment as a
    /// `@`-special variable (the `@../index` form).
    ParentAttr,
    /// A raw identifier, possibly beginning with `@`.
    Name(String),
}

impl Path {
    /// A path consisting of a single named segment.
    pub fn simple(name: impl Into<String>) -> Self {
        Path {
            segments: vec![Segment::Name(name.into())],
        }
    }

    /// The name of a simple (single named segment) path.
    ///
    /// Simplicity gates the `helperMissing` fallback: only a bare symbol
    /// that resolved to nothing falls through to it.
    pub fn simple_name(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [Segment::Name(name)] => Some(name),
            _ => None,
        }
    }
}

/// An argument to an expression, block, or partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Arg {
    /// A literal parameter: string, integer, boolean, or null.
    Literal(LiteralValue),

    /// A path resolved against the current scope.
    Path(Path),

    /// A parenthesized helper call usable as an argument: `(helper args)`.
    /// Nests without bound.
    SubExpr {
        name: String,
        args: Vec<Arg>,
        kwargs: Vec<(String, Arg)>,
    },
}

/// A literal argument value. Both `null` and `undefined` parse to `Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
}
