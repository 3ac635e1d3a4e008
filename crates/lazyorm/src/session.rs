//! Session wiring for LazyORM.
//!
//! A [`Session`] bundles the three runtime pieces a data layer needs: the
//! [`RepositoryRegistry`] lazy placeholders resolve through, a
//! [`TransactionManager`] over a connection source, and a dialect's
//! [`QueryTemplates`].
//!
//! # Example
//!
//! ```rust,ignore
//! use lazyorm::prelude::*;
//!
//! let session = Session::builder()
//!     .connection_source(pool)
//!     .query_templates(templates)
//!     .build();
//!
//! session.register::<Employee>(employees)?;
//! let employee = session.lazy::<Employee>(42)?;
//! ```

use lazyorm_core::{
    ConnectionSource, Error, Repository, Result, RowData, SearchCondition, Value,
};
use lazyorm_proxy::{Entity, LazyEntity, RepositoryRegistry};
use lazyorm_query::{QueryContext, QueryTemplates};
use lazyorm_tx::{Transaction, TransactionManager};
use std::fmt;
use std::sync::Arc;

/// Shared entry point of a data layer.
///
/// A session is `Send + Sync` and is meant to be shared across threads;
/// transactions it opens stay bound to the thread that opened them.
pub struct Session {
    registry: Arc<RepositoryRegistry>,
    transactions: Option<TransactionManager>,
    queries: Option<Arc<QueryTemplates>>,
}

impl Session {
    /// Create a session builder.
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Register the repository serving entity type `T`.
    pub fn register<T: Entity>(&self, repository: Arc<dyn Repository<T>>) -> Result<()> {
        self.registry.register(repository)
    }

    pub fn registry(&self) -> &Arc<RepositoryRegistry> {
        &self.registry
    }

    /// Placeholder for the `T` with primary key `id`. Nothing is fetched.
    pub fn lazy<T: Entity>(&self, id: impl Into<Value>) -> Result<LazyEntity<T>> {
        LazyEntity::by_id(
            self.registry.repository::<T>()?,
            Arc::clone(&self.registry),
            id,
        )
    }

    /// Placeholder for the first `T` matching `condition`. Nothing is fetched.
    pub fn lazy_where<T: Entity>(&self, condition: SearchCondition) -> Result<LazyEntity<T>> {
        LazyEntity::by_condition(
            self.registry.repository::<T>()?,
            Arc::clone(&self.registry),
            condition,
        )
    }

    /// Wrap an entity just read from `row`, installing lazy relations.
    pub fn wrap<T: Entity>(&self, entity: T, row: &RowData) -> Result<LazyEntity<T>> {
        LazyEntity::wrapping(
            self.registry.repository::<T>()?,
            Arc::clone(&self.registry),
            entity,
            row,
        )
    }

    /// The transaction manager, if a connection source was configured.
    pub fn transactions(&self) -> Result<&TransactionManager> {
        self.transactions
            .as_ref()
            .ok_or_else(|| Error::config("session has no connection source"))
    }

    /// Join the thread's open transaction or open a new one.
    pub fn transaction(&self) -> Result<Transaction> {
        self.transactions()?.new_or_existing_transaction()
    }

    /// Run `f` inside the thread's transaction.
    ///
    /// See [`TransactionManager::run_in_transaction`].
    pub fn run_in_transaction<R>(
        &self,
        f: impl FnOnce(&mut Transaction) -> Result<R>,
    ) -> Result<R> {
        self.transactions()?.run_in_transaction(f)
    }

    /// The query templates, if configured.
    pub fn queries(&self) -> Result<&QueryTemplates> {
        self.queries
            .as_deref()
            .ok_or_else(|| Error::config("session has no query templates"))
    }

    /// Render the first step of query `name`.
    pub fn build_query(&self, name: &str, context: &QueryContext) -> Result<String> {
        self.queries()?.build_query(name, context)
    }

    /// Translate a raw driver error message through the constraint patterns.
    ///
    /// Without query templates the message becomes a plain database error.
    pub fn translate_error(&self, message: &str) -> Error {
        match self.queries.as_deref() {
            Some(queries) => queries.constraint_error(message),
            None => QueryTemplates::new().constraint_error(message),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("registry", &self.registry)
            .field("transactions", &self.transactions)
            .field("queries", &self.queries.is_some())
            .finish()
    }
}

/// Builder for [`Session`].
///
/// # Example
///
/// ```rust,ignore
/// let session = Session::builder()
///     .connection_source(pool)
///     .query_templates(QueryTemplates::from_json_str(config)?)
///     .build();
/// ```
#[derive(Default)]
pub struct SessionBuilder {
    registry: Option<Arc<RepositoryRegistry>>,
    source: Option<Arc<dyn ConnectionSource>>,
    queries: Option<Arc<QueryTemplates>>,
}

impl SessionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing registry instead of creating an empty one.
    #[must_use]
    pub fn registry(mut self, registry: Arc<RepositoryRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Source of connections for transactions.
    #[must_use]
    pub fn connection_source(mut self, source: Arc<dyn ConnectionSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Validated query templates of the target dialect.
    #[must_use]
    pub fn query_templates(mut self, queries: QueryTemplates) -> Self {
        self.queries = Some(Arc::new(queries));
        self
    }

    /// Load, validate and attach query templates from a JSON document.
    pub fn query_config_json(self, json: &str) -> Result<Self> {
        Ok(self.query_templates(QueryTemplates::from_json_str(json)?))
    }

    pub fn build(self) -> Session {
        let session = Session {
            registry: self.registry.unwrap_or_else(RepositoryRegistry::new),
            transactions: self.source.map(TransactionManager::new),
            queries: self.queries,
        };
        tracing::debug!(
            transactions = session.transactions.is_some(),
            queries = session.queries.is_some(),
            "Session built"
        );
        session
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("registry", &self.registry.is_some())
            .field("connection_source", &self.source.is_some())
            .field("queries", &self.queries.is_some())
            .finish()
    }
}
