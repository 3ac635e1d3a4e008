//! Error types for lazy resolution, transactions and query configuration.

use std::fmt;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type for all LazyORM operations.
#[derive(Debug)]
pub enum Error {
    /// A lazily referenced row does not exist
    NotFound(NotFoundError),
    /// Invalid construction arguments (null id, null condition, wrong entity type)
    Argument(ArgumentError),
    /// Transaction misuse or transaction infrastructure failure
    Transaction(TransactionError),
    /// Configuration errors (missing queries, malformed patterns)
    Config(ConfigError),
    /// Query execution errors reported by the driver
    Query(QueryError),
    /// Template compilation or rendering errors
    Template(TemplateError),
    /// Custom error with message
    Custom(String),
}

/// A lazy placeholder resolved to "no such row".
#[derive(Debug, Clone)]
pub struct NotFoundError {
    /// Name of the entity that was looked up
    pub entity: String,
    /// Human-readable description of the lookup (id or condition)
    pub lookup: String,
}

#[derive(Debug, Clone)]
pub struct ArgumentError {
    pub message: String,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
    pub source: Option<BoxedSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// The calling thread already has an open transaction
    AlreadyActive,
    /// No transaction is bound to the calling thread
    NoActiveTransaction,
    /// The transaction was already committed, rolled back or closed
    Closed,
    /// Opening, committing or rolling back the connection failed
    Failed,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<BoxedSource>,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub message: String,
    /// Logical constraint name, when the raw message matched a constraint pattern
    pub constraint: Option<String>,
    pub source: Option<BoxedSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Connection-level failure
    Connection,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TemplateError {
    /// Name of the query (or step) being compiled or rendered
    pub name: String,
    pub message: String,
    pub source: Option<BoxedSource>,
}

impl Error {
    /// Build a not-found error for an entity lookup.
    pub fn not_found(entity: impl Into<String>, lookup: impl Into<String>) -> Self {
        Error::NotFound(NotFoundError {
            entity: entity.into(),
            lookup: lookup.into(),
        })
    }

    /// Build an invalid-construction error.
    pub fn argument(message: impl Into<String>) -> Self {
        Error::Argument(ArgumentError {
            message: message.into(),
        })
    }

    /// Build a transaction error without an underlying cause.
    pub fn transaction(kind: TransactionErrorKind, message: impl Into<String>) -> Self {
        Error::Transaction(TransactionError {
            kind,
            message: message.into(),
            source: None,
        })
    }

    /// Wrap an infrastructure failure raised while driving a transaction.
    pub fn transaction_failed(message: impl Into<String>, cause: Error) -> Self {
        Error::Transaction(TransactionError {
            kind: TransactionErrorKind::Failed,
            message: message.into(),
            source: Some(Box::new(cause)),
        })
    }

    /// Build a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
            source: None,
        })
    }

    /// Did a lazy lookup find no row?
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Is this a transaction state misuse (as opposed to an infrastructure failure)?
    pub fn is_transaction_misuse(&self) -> bool {
        match self {
            Error::Transaction(t) => !matches!(t.kind, TransactionErrorKind::Failed),
            _ => false,
        }
    }

    /// Get the transaction error kind, if this is a transaction error.
    pub fn transaction_kind(&self) -> Option<TransactionErrorKind> {
        match self {
            Error::Transaction(t) => Some(t.kind),
            _ => None,
        }
    }

    /// Get the logical constraint name of a constraint violation.
    pub fn constraint_name(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.constraint.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(e) => write!(f, "Not found: {}", e),
            Error::Argument(e) => write!(f, "Invalid argument: {}", e.message),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e),
            Error::Template(e) => write!(f, "Template error in '{}': {}", e.name, e.message),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let source = match self {
            Error::Transaction(e) => e.source.as_deref(),
            Error::Config(e) => e.source.as_deref(),
            Error::Query(e) => e.source.as_deref(),
            Error::Template(e) => e.source.as_deref(),
            _ => None,
        };
        source.map(|err| err as &(dyn std::error::Error + 'static))
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no {} found for {}", self.entity, self.lookup)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(constraint) = &self.constraint {
            write!(f, "{} (constraint {})", self.message, constraint)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl From<NotFoundError> for Error {
    fn from(err: NotFoundError) -> Self {
        Error::NotFound(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TemplateError> for Error {
    fn from(err: TemplateError) -> Self {
        Error::Template(err)
    }
}

/// Result type alias for LazyORM operations.
pub type Result<T> = std::result::Result<T, Error>;
