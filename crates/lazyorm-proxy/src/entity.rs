//! The capability interface lazy placeholders need from an entity type.

use crate::relation::RelationValue;
use lazyorm_core::{Result, Value};

/// An entity type whose relation fields can be filled with lazy placeholders.
///
/// Implemented once per entity struct (typically generated by the metadata
/// layer). Relation fields are usually declared as `Option<LazyEntity<_>>`,
/// `Option<LazyCollection<_>>` or `Option<LazyJoinCollection<_>>`, with `None`
/// meaning "not populated by the read".
///
/// # Example
///
/// ```ignore
/// impl Entity for Employee {
///     fn entity_name() -> &'static str {
///         "Employee"
///     }
///
///     fn id(&self) -> Option<Value> {
///         Some(Value::BigInt(self.id))
///     }
///
///     fn relation_is_set(&self, field: &str) -> bool {
///         match field {
///             "department" => self.department.is_some(),
///             _ => false,
///         }
///     }
///
///     fn install_relation(&mut self, field: &str, value: RelationValue) -> Result<()> {
///         match field {
///             "department" => self.department = Some(value.into_single()?),
///             other => return Err(Error::argument(format!("unknown relation {other}"))),
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Entity: Send + Sync + Sized + 'static {
    /// Type identity, matched against `EntityDescriptor::name`.
    fn entity_name() -> &'static str;

    /// Primary key of this instance, if assigned.
    fn id(&self) -> Option<Value>;

    /// Whether the named relation field already holds a value.
    fn relation_is_set(&self, field: &str) -> bool;

    /// Store a lazy placeholder in the named relation field.
    fn install_relation(&mut self, field: &str, value: RelationValue) -> Result<()>;

    /// Raw foreign key of an owned single-valued relation.
    ///
    /// Consulted when the row data read with the entity does not carry it,
    /// e.g. after a lazy fetch.
    fn foreign_key(&self, _field: &str) -> Option<Value> {
        None
    }
}
