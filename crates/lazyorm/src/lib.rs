//! LazyORM - lazy entity resolution for Rust data layers.
//!
//! LazyORM sits between a repository layer and the code that reads entities:
//!
//! - Relation fields of a just-read entity are filled with lazy placeholders
//!   that fetch on first use, at most once, even under concurrent access
//! - Each thread gets at most one open transaction per manager, shared by
//!   nested callers
//! - Named, dialect-specific query templates are rendered on demand, with
//!   driver error messages translated into named constraint failures
//!
//! # Quick Start
//!
//! ```ignore
//! use lazyorm::prelude::*;
//!
//! let session = Session::builder()
//!     .connection_source(data_source)
//!     .query_templates(QueryTemplates::from_json_str(MYSQL_QUERIES)?)
//!     .build();
//!
//! session.register::<Department>(department_repository)?;
//! session.register::<Employee>(employee_repository)?;
//!
//! // Nothing is fetched yet
//! let department = session.lazy::<Department>(7)?;
//!
//! session.run_in_transaction(|tx| {
//!     for employee in department.get()?.employees.iter()? {
//!         tx.with_connection(|conn| audit(conn, employee))?;
//!     }
//!     Ok(())
//! })?;
//! ```

// Re-export all public types from sub-crates
pub use lazyorm_core::{
    ArgumentError, Cardinality, CollectionKind, ConfigError, Connection, ConnectionSource,
    EntityDescriptor, Error, FieldDescriptor, JoinTableInfo, NotFoundError, Operator, QueryError,
    QueryErrorKind, RelationDescriptor, RelationShape, Repository, Result, RowData,
    SearchCondition, TemplateError, TransactionError, TransactionErrorKind, Value,
};

pub use lazyorm_proxy::{
    Entity, LazyCollection, LazyEntity, LazyJoinCollection, LazySource, RelationKind,
    RelationPlan, RelationValue, RepositoryRegistry, plan_relation, populate_relations,
};

pub use lazyorm_tx::{Transaction, TransactionManager, TransactionStatus};

pub use lazyorm_query::{
    CompiledTemplate, DialectFlags, Query, QueryConfig, QueryContext, QueryStep, QueryTemplates,
    QueryTemplatesConfig, StepConfig, TemplateEngine, TeraEngine,
};

/// Well-known query names.
pub mod queries {
    pub use lazyorm_query::{
        AGGREGATE_QUERY, AUTO_ID_CONVERSION_QUERY, CHILDREN_EXISTENCE_QUERY, COMMON_CODE,
        CONSTRAINT_NAME_GROUP, CREATE_EXTENDED_TABLE, CREATE_INDEX, CREATE_TABLE, DELETE_QUERY,
        DROP_QUERY, FETCH_CHILDREN_IDS_QUERY, FINDER_QUERY, MANDATORY_QUERIES, SAVE_QUERY,
        SAVE_UPDATE_QUERY, UPDATE_QUERY,
    };
}

// Session management
pub mod session;
pub use session::{Session, SessionBuilder};

// ============================================================================
// Prelude
// ============================================================================

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::{
        // Metadata
        Cardinality,
        CollectionKind,
        // Connections
        Connection,
        ConnectionSource,
        // Proxies
        Entity,
        EntityDescriptor,
        Error,
        FieldDescriptor,
        LazyCollection,
        LazyEntity,
        LazyJoinCollection,
        // Queries
        QueryContext,
        QueryTemplates,
        RelationDescriptor,
        RelationValue,
        Repository,
        RepositoryRegistry,
        Result,
        RowData,
        SearchCondition,
        // Session
        Session,
        SessionBuilder,
        // Transactions
        Transaction,
        TransactionManager,
        Value,
    };
}
