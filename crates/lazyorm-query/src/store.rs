//! Named query definitions rendered into dialect-specific text.

use crate::engine::{CompiledTemplate, QueryContext, TemplateEngine, TeraEngine};
use lazyorm_core::{ConfigError, Error, QueryError, QueryErrorKind, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Shared boilerplate prepended to every other query at validation time.
pub const COMMON_CODE: &str = "#commonCode";

pub const CREATE_TABLE: &str = "createTableTemplate";
pub const CREATE_EXTENDED_TABLE: &str = "createExtendedTableTemplate";
pub const CREATE_INDEX: &str = "createIndexTemplate";
pub const SAVE_QUERY: &str = "saveTemplate";
pub const UPDATE_QUERY: &str = "updateTemplate";
pub const SAVE_UPDATE_QUERY: &str = "saveUpdateTemplate";
pub const DELETE_QUERY: &str = "deleteTemplate";
pub const FINDER_QUERY: &str = "finderTemplate";
pub const AGGREGATE_QUERY: &str = "aggregateTemplate";
pub const CHILDREN_EXISTENCE_QUERY: &str = "childrenExistenceTemplate";
pub const FETCH_CHILDREN_IDS_QUERY: &str = "fetchChildrenIdsTemplate";
pub const DROP_QUERY: &str = "dropTableTemplate";
pub const AUTO_ID_CONVERSION_QUERY: &str = "autoIdConversionQuery";

/// Queries every dialect configuration must define.
pub const MANDATORY_QUERIES: &[&str] = &[
    CREATE_TABLE,
    CREATE_INDEX,
    CREATE_EXTENDED_TABLE,
    SAVE_QUERY,
    UPDATE_QUERY,
    DELETE_QUERY,
    FINDER_QUERY,
    AGGREGATE_QUERY,
    CHILDREN_EXISTENCE_QUERY,
    FETCH_CHILDREN_IDS_QUERY,
    DROP_QUERY,
];

/// Capture group a constraint-error pattern must define.
pub const CONSTRAINT_NAME_GROUP: &str = "name";

/// Dialect switches read by the repository layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialectFlags {
    /// The dialect supports LIMIT/OFFSET style paging.
    pub paging_supported: bool,
    /// Generated ids can only be read back through a synthetic unique-id column.
    pub unique_id_column_required: bool,
    /// Table and column names are lower-cased when querying metadata.
    pub lower_case_names: bool,
}

impl DialectFlags {
    pub const fn new() -> Self {
        Self {
            paging_supported: true,
            unique_id_column_required: false,
            lower_case_names: false,
        }
    }

    pub const fn paging_supported(mut self, supported: bool) -> Self {
        self.paging_supported = supported;
        self
    }

    pub const fn unique_id_column_required(mut self, required: bool) -> Self {
        self.unique_id_column_required = required;
        self
    }

    pub const fn lower_case_names(mut self, lower: bool) -> Self {
        self.lower_case_names = lower;
        self
    }
}

impl Default for DialectFlags {
    fn default() -> Self {
        Self::new()
    }
}

/// One statement of a [`Query`].
pub struct QueryStep {
    template: String,
    ignore_on_error: bool,
    lock: Mutex<()>,
    compiled: OnceLock<Arc<dyn CompiledTemplate>>,
}

impl QueryStep {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ignore_on_error: false,
            lock: Mutex::new(()),
            compiled: OnceLock::new(),
        }
    }

    /// Mark the step as tolerating failure (e.g. index creation).
    #[must_use]
    pub fn ignore_on_error(mut self, ignore: bool) -> Self {
        self.ignore_on_error = ignore;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn is_ignore_on_error(&self) -> bool {
        self.ignore_on_error
    }

    /// Has the template been compiled yet?
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    fn prepend(&mut self, code: &str) {
        self.template = format!("{code}\n{}", self.template);
        self.compiled = OnceLock::new();
    }

    fn render(
        &self,
        engine: &dyn TemplateEngine,
        name: &str,
        context: &QueryContext,
    ) -> Result<String> {
        self.compiled(engine, name)?.render(context)
    }

    fn compiled(
        &self,
        engine: &dyn TemplateEngine,
        name: &str,
    ) -> Result<&Arc<dyn CompiledTemplate>> {
        if let Some(compiled) = self.compiled.get() {
            return Ok(compiled);
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(compiled) = self.compiled.get() {
            return Ok(compiled);
        }

        let compiled = engine.compile(name, &self.template)?;
        Ok(self.compiled.get_or_init(|| compiled))
    }
}

impl fmt::Debug for QueryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryStep")
            .field("template", &self.template)
            .field("ignore_on_error", &self.ignore_on_error)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

/// A named, ordered list of statements.
#[derive(Debug)]
pub struct Query {
    name: String,
    steps: Vec<QueryStep>,
}

impl Query {
    /// A single-step query.
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: vec![QueryStep::new(template)],
        }
    }

    /// A query with no steps yet; see [`step`](Self::step).
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step (builder style).
    #[must_use]
    pub fn step(mut self, step: QueryStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn add_step(&mut self, step: QueryStep) {
        self.steps.push(step);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[QueryStep] {
        &self.steps
    }

    fn is_blank(&self) -> bool {
        self.steps.first().is_none_or(|s| s.template.trim().is_empty())
    }

    fn prepend(&mut self, code: &str) {
        for step in &mut self.steps {
            step.prepend(code);
        }
    }
}

/// Named query templates for one database dialect.
///
/// Load with [`add_query`](Self::add_query) / [`add_template`](Self::add_template)
/// (or [`from_json_str`](Self::from_json_str)), then call
/// [`validate`](Self::validate) once before rendering. Validation checks the
/// mandatory queries and folds the `#commonCode` query into every other one.
pub struct QueryTemplates {
    queries: HashMap<String, Query>,
    engine: Arc<dyn TemplateEngine>,
    constraint_error_patterns: Vec<Regex>,
    flags: DialectFlags,
}

impl QueryTemplates {
    /// Empty store rendering through [`TeraEngine`].
    pub fn new() -> Self {
        Self::with_engine(Arc::new(TeraEngine::new()))
    }

    pub fn with_engine(engine: Arc<dyn TemplateEngine>) -> Self {
        Self {
            queries: HashMap::new(),
            engine,
            constraint_error_patterns: Vec::new(),
            flags: DialectFlags::new(),
        }
    }

    /// Set the dialect flags (builder style).
    #[must_use]
    pub fn flags(mut self, flags: DialectFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn set_flags(&mut self, flags: DialectFlags) {
        self.flags = flags;
    }

    pub fn dialect_flags(&self) -> DialectFlags {
        self.flags
    }

    pub fn is_paging_supported(&self) -> bool {
        self.flags.paging_supported
    }

    pub fn is_unique_id_column_required(&self) -> bool {
        self.flags.unique_id_column_required
    }

    pub fn is_lower_case_names(&self) -> bool {
        self.flags.lower_case_names
    }

    /// Register a single-step query, replacing any query of that name.
    pub fn add_template(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.add_query(Query::new(name, template));
    }

    /// Register a query, replacing any query of the same name.
    pub fn add_query(&mut self, query: Query) {
        self.queries.insert(query.name.clone(), query);
    }

    pub fn has_query(&self, name: &str) -> bool {
        self.queries.contains_key(name)
    }

    pub fn query(&self, name: &str) -> Option<&Query> {
        self.queries.get(name)
    }

    /// Names of all registered queries, sorted.
    pub fn query_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.queries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check mandatory queries and fold the common code into every query.
    ///
    /// The common-code query is removed from the store and its first step's
    /// text is prepended, followed by a newline, to every step of every other
    /// query. Running it again is harmless.
    pub fn validate(&mut self) -> Result<()> {
        for name in MANDATORY_QUERIES {
            if self.queries.get(*name).is_none_or(Query::is_blank) {
                return Err(Error::config(format!(
                    "mandatory query '{name}' is missing or empty"
                )));
            }
        }

        let Some(common) = self.queries.remove(COMMON_CODE) else {
            return Ok(());
        };
        let Some(code) = common.steps.first().map(|s| s.template.clone()) else {
            return Ok(());
        };

        tracing::debug!(
            queries = self.queries.len(),
            "Prepending common code to query templates"
        );
        for query in self.queries.values_mut() {
            query.prepend(&code);
        }
        Ok(())
    }

    /// Render the first step of query `name`.
    pub fn build_query(&self, name: &str, context: &QueryContext) -> Result<String> {
        self.build_step(name, 0, context)
    }

    /// Render step `index` of query `name`.
    ///
    /// The step's template is compiled on first use and reused afterwards.
    pub fn build_step(&self, name: &str, index: usize, context: &QueryContext) -> Result<String> {
        let query = self
            .queries
            .get(name)
            .ok_or_else(|| Error::config(format!("no query named '{name}'")))?;
        let step = query.steps.get(index).ok_or_else(|| {
            Error::config(format!(
                "query '{}' has {} step(s), no step {}",
                name,
                query.steps.len(),
                index
            ))
        })?;
        step.render(self.engine.as_ref(), name, context)
    }

    /// Register a pattern extracting a constraint name from driver errors.
    ///
    /// The pattern must define a capture group named `name`.
    pub fn add_constraint_error_pattern(&mut self, pattern: &str) -> Result<()> {
        let pattern = pattern.trim();
        let regex = Regex::new(pattern).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("invalid constraint error pattern '{pattern}': {e}"),
                source: Some(Box::new(e)),
            })
        })?;

        if !regex
            .capture_names()
            .any(|group| group == Some(CONSTRAINT_NAME_GROUP))
        {
            return Err(Error::config(format!(
                "no group named '{CONSTRAINT_NAME_GROUP}' in constraint error pattern: {pattern}"
            )));
        }

        self.constraint_error_patterns.push(regex);
        Ok(())
    }

    pub fn constraint_error_patterns(&self) -> &[Regex] {
        &self.constraint_error_patterns
    }

    /// Logical constraint name from a raw driver error message.
    ///
    /// Patterns are tried in registration order; the first match wins.
    pub fn constraint_name(&self, message: &str) -> Option<String> {
        self.constraint_error_patterns.iter().find_map(|regex| {
            regex
                .captures(message)
                .and_then(|caps| caps.name(CONSTRAINT_NAME_GROUP))
                .map(|m| m.as_str().to_string())
        })
    }

    /// Translate a raw driver error message into a query error.
    ///
    /// A message matching a constraint pattern becomes a
    /// [`QueryErrorKind::Constraint`] error carrying the constraint name.
    pub fn constraint_error(&self, message: &str) -> Error {
        let constraint = self.constraint_name(message);
        let kind = if constraint.is_some() {
            QueryErrorKind::Constraint
        } else {
            QueryErrorKind::Database
        };
        Error::Query(QueryError {
            kind,
            message: message.to_string(),
            constraint,
            source: None,
        })
    }
}

impl Default for QueryTemplates {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryTemplates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryTemplates")
            .field("queries", &self.query_names())
            .field(
                "constraint_error_patterns",
                &self
                    .constraint_error_patterns
                    .iter()
                    .map(Regex::as_str)
                    .collect::<Vec<_>>(),
            )
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}
