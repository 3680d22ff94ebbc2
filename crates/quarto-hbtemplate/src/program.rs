/*
 * program.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled program representation.
//!
//! A [`Program`] is the compiler's output: one named executable unit per
//! block scope (the root template plus one per nested block body), each a
//! flat list of ops interpreted by the evaluator. The serialized form is
//! the "generated source" surface: `precompile` emits it as JSON carrying a
//! format version, and loading checks that version before anything runs.

use serde::{Deserialize, Serialize};

use crate::ast::{Arg, Expression, Path};
use crate::error::{TemplateError, TemplateResult};

/// Version stamp for the precompiled format. Bumped whenever the op
/// encoding changes; loading a mismatched stamp fails fast.
pub const FORMAT_VERSION: u64 = 1;

/// A compiled template: an entry unit plus the units for nested blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub format: u64,
    pub entry: usize,
    pub blocks: Vec<BlockFn>,
}

/// One executable unit. The outermost is named `render`; nested block
/// bodies are `block_<n>` with a monotonically increasing counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockFn {
    pub name: String,
    pub ops: Vec<Op>,
}

/// One evaluation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    /// Emit literal text.
    Append(String),

    /// Evaluate an inline expression and emit its rendered value,
    /// HTML-escaped when `escape` is set.
    Expand { expr: Expression, escape: bool },

    /// Dispatch a block: helper by name, else resolved path value, else
    /// `blockHelperMissing`. `inverted` swaps fn/inverse before dispatch.
    Invoke {
        name: String,
        path: Path,
        args: Vec<Arg>,
        kwargs: Vec<(String, Arg)>,
        fn_block: usize,
        inverse: Option<usize>,
        inverted: bool,
    },

    /// An `each`/`foreach` block: the bound collection path is resolved
    /// once and handed straight to the iteration helper.
    Iterate {
        keyword: IterateKeyword,
        path: Path,
        bound: String,
        columns: Option<Arg>,
        fn_block: usize,
        inverse: Option<usize>,
    },

    /// Include a partial, with an optional context argument and keyword
    /// overrides.
    Partial {
        name: String,
        arg: Option<Arg>,
        kwargs: Vec<(String, Arg)>,
    },
}

/// Which iteration helper an `Iterate` op dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IterateKeyword {
    Each,
    Foreach,
}

impl IterateKeyword {
    pub fn helper_name(self) -> &'static str {
        match self {
            IterateKeyword::Each => "each",
            IterateKeyword::Foreach => "foreach",
        }
    }
}

impl Program {
    /// Serialize to the precompiled text form.
    pub fn to_precompiled(&self) -> TemplateResult<String> {
        serde_json::to_string(self).map_err(|e| TemplateError::InvalidPrecompiled {
            message: e.to_string(),
        })
    }

    /// Load a program from its precompiled text form.
    ///
    /// The format version is checked before decoding the ops, so a program
    /// emitted by an incompatible library version fails fast instead of
    /// executing under a mismatched runtime.
    pub fn from_precompiled(text: &str) -> TemplateResult<Program> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| TemplateError::InvalidPrecompiled {
                message: e.to_string(),
            })?;
        let found = value
            .get("format")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| TemplateError::InvalidPrecompiled {
                message: "missing format version".to_string(),
            })?;
        if found != FORMAT_VERSION {
            return Err(TemplateError::FormatMismatch {
                found,
                expected: FORMAT_VERSION,
            });
        }
        serde_json::from_value(value).map_err(|e| TemplateError::InvalidPrecompiled {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_program() -> Program {
        Program {
            format: FORMAT_VERSION,
            entry: 0,
            blocks: vec![BlockFn {
                name: "render".to_string(),
                ops: vec![Op::Append("hello".to_string())],
            }],
        }
    }

    #[test]
    fn test_precompiled_round_trip() {
        let program = sample_program();
        let text = program.to_precompiled().unwrap();
        let back = Program::from_precompiled(&text).unwrap();
        assert_eq!(program, back);
    }

    #[test]
    fn test_format_mismatch_fails_fast() {
        let mut doctored: serde_json::Value =
            serde_json::from_str(&sample_program().to_precompiled().unwrap()).unwrap();
        doctored["format"] = serde_json::json!(FORMAT_VERSION + 1);
        let err = Program::from_precompiled(&doctored.to_string()).unwrap_err();
        match err {
            TemplateError::FormatMismatch { found, expected } => {
                assert_eq!(found, FORMAT_VERSION + 1);
                assert_eq!(expected, FORMAT_VERSION);
            }
            other => panic!("expected format mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_garbage_is_invalid_not_a_panic() {
        assert!(matches!(
            Program::from_precompiled("not json"),
            Err(TemplateError::InvalidPrecompiled { .. })
        ));
        assert!(matches!(
            Program::from_precompiled("{\"no\": \"format\"}"),
            Err(TemplateError::InvalidPrecompiled { .. })
        ));
    }
}
