//! Pluggable template rendering.
//!
//! The store only needs "compile once, render many": a [`TemplateEngine`]
//! turns template text into a [`CompiledTemplate`], which renders against a
//! [`QueryContext`]. [`TeraEngine`] is the default implementation.

use lazyorm_core::{Error, Result, TemplateError};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::sync::Arc;
use tera::{Context, Tera};

/// Key/value data a query template is rendered against.
///
/// # Example
///
/// ```
/// use lazyorm_query::QueryContext;
///
/// let ctx = QueryContext::new()
///     .with("table", "employees")
///     .with("columns", vec!["id", "name"]);
/// assert_eq!(ctx.get("table").and_then(|v| v.as_str()), Some("employees"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct QueryContext {
    entries: Map<String, JsonValue>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry (builder style).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Add any serializable value, e.g. a table descriptor struct.
    pub fn insert_serialized<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|e| {
            Error::Template(TemplateError {
                name: key.clone(),
                message: format!("context value is not serializable: {e}"),
                source: Some(Box::new(e)),
            })
        })?;
        self.entries.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<JsonValue>> FromIterator<(K, V)> for QueryContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut ctx = QueryContext::new();
        for (key, value) in iter {
            ctx.insert(key, value);
        }
        ctx
    }
}

/// A template compiled once and rendered many times.
pub trait CompiledTemplate: Send + Sync {
    fn render(&self, context: &QueryContext) -> Result<String>;
}

/// Compiles template text.
pub trait TemplateEngine: Send + Sync {
    /// Compile `source`; `name` identifies the query in errors.
    fn compile(&self, name: &str, source: &str) -> Result<Arc<dyn CompiledTemplate>>;
}

/// [`TemplateEngine`] backed by Tera (Jinja2-style syntax).
///
/// Autoescaping is disabled: output is query text, not HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeraEngine;

impl TeraEngine {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateEngine for TeraEngine {
    fn compile(&self, name: &str, source: &str) -> Result<Arc<dyn CompiledTemplate>> {
        tracing::trace!(query = name, "Compiling query template");

        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        tera.add_raw_template(name, source)
            .map_err(|e| template_error(name, "failed to compile template", e))?;

        Ok(Arc::new(TeraTemplate {
            name: name.to_string(),
            tera,
        }))
    }
}

struct TeraTemplate {
    name: String,
    tera: Tera,
}

impl CompiledTemplate for TeraTemplate {
    fn render(&self, context: &QueryContext) -> Result<String> {
        let ctx = Context::from_serialize(context)
            .map_err(|e| template_error(&self.name, "invalid render context", e))?;
        self.tera
            .render(&self.name, &ctx)
            .map_err(|e| template_error(&self.name, "failed to render template", e))
    }
}

impl fmt::Debug for TeraTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeraTemplate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Tera reports the useful detail (line, column, missing variable) in the
/// error's source chain, so it is flattened into the message.
fn template_error(name: &str, what: &str, err: tera::Error) -> Error {
    let mut message = format!("{what}: {err}");
    let mut cause = std::error::Error::source(&err);
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }

    Error::Template(TemplateError {
        name: name.to_string(),
        message,
        source: Some(Box::new(err)),
    })
}
