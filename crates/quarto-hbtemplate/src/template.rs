/*
 * template.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template handles and the module cache.
//!
//! [`Template::compile`] runs the full pipeline (parse → normalize →
//! generate) and returns an invocable handle. Compiling under a logical
//! path keys the result into a process-wide module cache so identical
//! sources are not recompiled; anonymous templates get counter-suffixed
//! names from an atomic counter, so concurrent compilations never collide.
//! Published programs are immutable and freely shared.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;

use crate::compiler::compile;
use crate::error::TemplateResult;
use crate::evaluator::{execute_block, RenderEnv};
use crate::helpers::HelperRegistry;
use crate::normalize::normalize;
use crate::parser::parse;
use crate::partials::Partials;
use crate::program::Program;
use crate::scope::Scope;
use crate::value::TemplateValue;

static MODULE_CACHE: Lazy<Mutex<HashMap<String, Arc<Program>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

static ANONYMOUS_TEMPLATES: AtomicU64 = AtomicU64::new(0);

/// Run the compilation pipeline without touching the cache.
pub(crate) fn build_program(source: &str) -> TemplateResult<Program> {
    let mut nodes = parse(source)?;
    normalize(&mut nodes);
    Ok(compile(&nodes))
}

fn anonymous_name() -> String {
    let id = ANONYMOUS_TEMPLATES.fetch_add(1, Ordering::Relaxed);
    format!("template_{id}")
}

/// A compiled template ready to render.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    program: Arc<Program>,
}

impl Template {
    /// Compile a template from source text under an anonymous name.
    pub fn compile(source: &str) -> TemplateResult<Template> {
        let name = anonymous_name();
        let program = Arc::new(build_program(source)?);
        tracing::debug!(name = name.as_str(), "compiled template");
        Ok(Template { name, program })
    }

    /// Compile a template under a logical path.
    ///
    /// The path names the compiled unit for debugging and keys the module
    /// cache: a second compile under the same path returns the published
    /// program without reparsing.
    pub fn compile_with_path(source: &str, path: &str) -> TemplateResult<Template> {
        {
            let cache = MODULE_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(program) = cache.get(path) {
                tracing::trace!(path, "module cache hit");
                return Ok(Template {
                    name: path.to_string(),
                    program: program.clone(),
                });
            }
        }

        let program = Arc::new(build_program(source)?);
        let mut cache = MODULE_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
        let program = cache.entry(path.to_string()).or_insert(program).clone();
        tracing::debug!(path, "compiled template");
        Ok(Template {
            name: path.to_string(),
            program,
        })
    }

    /// Emit the generated program text without producing a handle.
    ///
    /// The output is self-describing: it carries a format version that
    /// [`Template::from_precompiled`] checks before executing anything.
    pub fn precompile(source: &str) -> TemplateResult<String> {
        build_program(source)?.to_precompiled()
    }

    /// Load a template from precompiled program text.
    pub fn from_precompiled(text: &str) -> TemplateResult<Template> {
        let program = Program::from_precompiled(text)?;
        Ok(Template {
            name: anonymous_name(),
            program: Arc::new(program),
        })
    }

    /// The template's logical name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The compiled program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub(crate) fn program_arc(&self) -> Arc<Program> {
        self.program.clone()
    }

    /// Render with the default helpers and partials, the context doubling
    /// as the root.
    pub fn render(&self, context: &TemplateValue) -> TemplateResult<String> {
        self.render_with(context, None, None, None)
    }

    /// Render with call-time helpers and partials merged over the
    /// defaults, and an optional explicit root context.
    pub fn render_with(
        &self,
        context: &TemplateValue,
        helpers: Option<&HelperRegistry>,
        partials: Option<&Partials>,
        root: Option<&TemplateValue>,
    ) -> TemplateResult<String> {
        let mut merged_helpers = HelperRegistry::with_defaults();
        if let Some(extra) = helpers {
            merged_helpers.extend_from(extra);
        }
        let merged_partials = partials.cloned().unwrap_or_default();
        let root_value = root.unwrap_or(context);

        let scope = Scope::root_scope(context.clone(), root_value);
        let env = RenderEnv {
            program: &self.program,
            helpers: &merged_helpers,
            partials: &merged_partials,
        };
        execute_block(&env, self.program.entry, &scope, 0)
    }
}
