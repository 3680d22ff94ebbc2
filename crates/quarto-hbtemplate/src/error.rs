/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template compilation and rendering.

use thiserror::Error;

/// Errors that can occur during template operations.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Malformed template syntax. Positions are 1-based; `character` is the
    /// offset within the line.
    #[error("syntax error at line {line}, character {character}: {message}")]
    Parse {
        line: usize,
        character: usize,
        message: String,
    },

    /// A name that resolved to neither a helper nor a value was invoked
    /// with arguments.
    #[error("could not resolve helper or value '{name}' called with arguments")]
    HelperMissing { name: String },

    /// A `{{> name}}` reference with no registered or built-in partial.
    #[error("partial not found: {name}")]
    PartialNotFound { name: String },

    /// Recursive partial inclusion detected.
    #[error("recursive partial inclusion detected (depth > {max})")]
    RecursionLimit { max: usize },

    /// A precompiled program was produced by an incompatible library version.
    #[error("precompiled template uses format {found}, but this runtime supports format {expected}")]
    FormatMismatch { found: u64, expected: u64 },

    /// A precompiled program could not be decoded at all.
    #[error("invalid precompiled template: {message}")]
    InvalidPrecompiled { message: String },

    /// A user-supplied helper failed.
    #[error("helper '{name}' failed: {message}")]
    Helper { name: String, message: String },
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;
