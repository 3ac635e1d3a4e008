//! Core types and traits for LazyORM.
//!
//! This crate provides the shared vocabulary of the lazy data layer:
//!
//! - `EntityDescriptor` / `FieldDescriptor` metadata with precomputed relation shapes
//! - `SearchCondition` values passed to repositories
//! - `Repository` contract that lazy placeholders call back into
//! - `Connection` / `ConnectionSource` contracts driven by the transaction manager
//! - `Error` taxonomy separating "not found" from "could not check"

pub mod condition;
pub mod connection;
pub mod descriptor;
pub mod error;
pub mod repository;
pub mod row;
pub mod value;

pub use condition::{Operator, SearchCondition};
pub use connection::{Connection, ConnectionSource};
pub use descriptor::{
    Cardinality, CollectionKind, EntityDescriptor, FieldDescriptor, JoinTableInfo,
    RelationDescriptor, RelationShape,
};
pub use error::{
    ArgumentError, ConfigError, Error, NotFoundError, QueryError, QueryErrorKind, Result,
    TemplateError, TransactionError, TransactionErrorKind,
};
pub use repository::Repository;
pub use row::RowData;
pub use value::Value;
