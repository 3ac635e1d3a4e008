//! Query template store for LazyORM.
//!
//! `lazyorm-query` holds the named, dialect-specific query templates the data
//! layer renders on demand:
//!
//! - **Queries**: a name plus ordered [`QueryStep`]s, each compiled once on
//!   first use and rendered against a [`QueryContext`].
//! - **Common code**: a `#commonCode` query folded into every other query by
//!   [`QueryTemplates::validate`].
//! - **Constraint-error patterns**: regexes with a `name` group that turn raw
//!   driver messages into named constraint failures.
//! - **Dialect flags**: [`DialectFlags`] read by the repository layer.
//!
//! Rendering goes through the [`TemplateEngine`] abstraction; [`TeraEngine`]
//! is the default.

pub mod config;
pub mod engine;
pub mod store;

pub use config::{QueryConfig, QueryTemplatesConfig, StepConfig};
pub use engine::{CompiledTemplate, QueryContext, TemplateEngine, TeraEngine};
pub use store::{
    AGGREGATE_QUERY, AUTO_ID_CONVERSION_QUERY, CHILDREN_EXISTENCE_QUERY, COMMON_CODE,
    CONSTRAINT_NAME_GROUP, CREATE_EXTENDED_TABLE, CREATE_INDEX, CREATE_TABLE, DELETE_QUERY,
    DROP_QUERY, DialectFlags, FETCH_CHILDREN_IDS_QUERY, FINDER_QUERY, MANDATORY_QUERIES, Query,
    QueryStep, QueryTemplates, SAVE_QUERY, SAVE_UPDATE_QUERY, UPDATE_QUERY,
};
