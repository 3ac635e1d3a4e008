//! The repository contract lazy placeholders call back into.

use crate::Result;
use crate::condition::SearchCondition;
use crate::descriptor::EntityDescriptor;
use crate::value::Value;
use std::sync::Arc;

/// Minimal repository interface needed to resolve lazy placeholders.
///
/// Implemented by the data layer on top of its SQL execution machinery. All
/// calls are blocking and may perform a database round trip. A missing row is
/// reported as `Ok(None)` / an empty `Vec`, never as an error: errors are
/// reserved for "could not check".
pub trait Repository<T>: Send + Sync {
    /// Metadata of the entity this repository serves.
    fn descriptor(&self) -> &Arc<EntityDescriptor>;

    /// Load one entity by primary key.
    fn find_by_id(&self, id: &Value) -> Result<Option<T>>;

    /// Load every entity matching `condition`, in repository order.
    fn search(&self, condition: &SearchCondition) -> Result<Vec<T>>;

    /// Load the targets of an owned many-to-many relation through its join table.
    ///
    /// `owner` describes the entity declaring `relation_field`; its join table
    /// metadata tells the repository how to link `parent_id` to its rows.
    fn fetch_join_collection(
        &self,
        owner: &EntityDescriptor,
        relation_field: &str,
        parent_id: &Value,
    ) -> Result<Vec<T>>;
}
