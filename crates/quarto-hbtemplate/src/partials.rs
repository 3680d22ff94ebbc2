/*
 * partials.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Partial templates.
//!
//! A [`Partials`] set maps names to templates included via `{{> name}}`.
//! Entries are either raw source (compiled when first referenced in a
//! render) or already-compiled templates. Two pseudo-partials,
//! `navigation` and `pagination`, carry inline default source and resolve
//! without touching the filesystem; a caller-supplied entry under either
//! name shadows the built-in.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::Lazy;

use crate::error::{TemplateError, TemplateResult};
use crate::program::Program;
use crate::template::{build_program, Template};

/// Default source for the `navigation` pseudo-partial.
const NAVIGATION_SOURCE: &str = "<ul class=\"navigation\">\n\
{{#each links}}\n\
<li{{#if @first}} class=\"first\"{{/if}}><a href=\"{{{url}}}\">{{title}}</a></li>\n\
{{/each}}\n\
</ul>";

/// Default source for the `pagination` pseudo-partial.
const PAGINATION_SOURCE: &str = "<div class=\"pagination\">\n\
{{#if previous}}\n\
<a class=\"newer\" href=\"{{{previous}}}\">&larr; newer</a>\n\
{{/if}}\n\
{{#if next}}\n\
<a class=\"older\" href=\"{{{next}}}\">older &rarr;</a>\n\
{{/if}}\n\
</div>";

/// A name→template map consulted by `{{> name}}`.
#[derive(Debug, Clone, Default)]
pub struct Partials {
    entries: BTreeMap<String, PartialEntry>,
}

#[derive(Debug, Clone)]
enum PartialEntry {
    Source(String),
    Compiled(Arc<Program>),
}

impl Partials {
    /// Create a new empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a partial from raw template source.
    ///
    /// The name should match what will be used in the template (e.g.
    /// "header"). Source entries are compiled when first referenced.
    pub fn add_source(&mut self, name: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.entries
            .insert(name.into(), PartialEntry::Source(source.into()));
        self
    }

    /// Add an already-compiled partial.
    pub fn add_template(&mut self, name: impl Into<String>, template: &Template) -> &mut Self {
        self.entries
            .insert(name.into(), PartialEntry::Compiled(template.program_arc()));
        self
    }

    /// Create a set from `(name, source)` pairs.
    pub fn with_sources(
        sources: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let mut partials = Self::new();
        for (name, source) in sources {
            partials.add_source(name, source);
        }
        partials
    }

    /// Whether `name` would resolve, counting the built-ins.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name) || builtin_source(name).is_some()
    }

    /// Resolve a partial to its compiled program.
    pub(crate) fn resolve(&self, name: &str) -> TemplateResult<Arc<Program>> {
        if let Some(entry) = self.entries.get(name) {
            return match entry {
                PartialEntry::Compiled(program) => Ok(program.clone()),
                PartialEntry::Source(source) => Ok(Arc::new(build_program(source)?)),
            };
        }
        match builtin_partial(name)? {
            Some(program) => Ok(program),
            None => Err(TemplateError::PartialNotFound {
                name: name.to_string(),
            }),
        }
    }
}

fn builtin_source(name: &str) -> Option<&'static str> {
    match name {
        "navigation" => Some(NAVIGATION_SOURCE),
        "pagination" => Some(PAGINATION_SOURCE),
        _ => None,
    }
}

static BUILTIN_CACHE: Lazy<Mutex<BTreeMap<String, Arc<Program>>>> =
    Lazy::new(|| Mutex::new(BTreeMap::new()));

fn builtin_partial(name: &str) -> TemplateResult<Option<Arc<Program>>> {
    let Some(source) = builtin_source(name) else {
        return Ok(None);
    };
    let mut cache = BUILTIN_CACHE.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(program) = cache.get(name) {
        return Ok(Some(program.clone()));
    }
    let program = Arc::new(build_program(source)?);
    cache.insert(name.to_string(), program.clone());
    Ok(Some(program))
}
