//! Collection-shaped lazy placeholders for the "many" side of a relation.
//!
//! Both [`LazyCollection`] (fetched by condition) and [`LazyJoinCollection`]
//! (fetched through a join table) share the same resolve-once cell: an empty
//! fetch result resolves to an empty collection, never to "missing".

use crate::entity::Entity;
use crate::lazy::checked_descriptor;
use crate::registry::RepositoryRegistry;
use crate::relation::populate_relations;
use lazyorm_core::{
    CollectionKind, EntityDescriptor, Error, RelationShape, Repository, Result, RowData,
    SearchCondition, Value,
};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Resolve-once backing store shared by both collection placeholders.
struct ItemsCell<T: Entity> {
    descriptor: Arc<EntityDescriptor>,
    kind: CollectionKind,
    repository: Arc<dyn Repository<T>>,
    registry: Arc<RepositoryRegistry>,
    lock: Mutex<()>,
    items: OnceLock<Vec<T>>,
}

impl<T: Entity> ItemsCell<T> {
    fn new(
        repository: Arc<dyn Repository<T>>,
        registry: Arc<RepositoryRegistry>,
        kind: CollectionKind,
    ) -> Result<Self> {
        Ok(Self {
            descriptor: checked_descriptor::<T>(repository.as_ref())?,
            kind,
            repository,
            registry,
            lock: Mutex::new(()),
            items: OnceLock::new(),
        })
    }

    fn resolve<F>(&self, fetch: F) -> Result<&[T]>
    where
        F: FnOnce(&dyn Repository<T>) -> Result<Vec<T>>,
    {
        if let Some(items) = self.items.get() {
            return Ok(items);
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(items) = self.items.get() {
            return Ok(items);
        }

        let mut items = fetch(self.repository.as_ref())?;
        if self.kind == CollectionKind::Set {
            items = dedupe_by_id(items);
        }
        for item in &mut items {
            populate_relations(item, &self.descriptor, &RowData::new(), &self.registry)?;
        }

        tracing::debug!(
            entity = self.descriptor.name(),
            count = items.len(),
            "Lazy collection resolved"
        );
        Ok(self.items.get_or_init(|| items))
    }

    fn state(&self) -> &'static str {
        match self.items.get() {
            None => "unresolved",
            Some(_) => "resolved",
        }
    }
}

/// Keep the first element seen for each id; elements without an id are kept.
fn dedupe_by_id<T: Entity>(items: Vec<T>) -> Vec<T> {
    let mut seen: Vec<Value> = Vec::with_capacity(items.len());
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        if let Some(id) = item.id() {
            if seen.iter().any(|s| s.identity_eq(&id)) {
                continue;
            }
            seen.push(id);
        }
        kept.push(item);
    }
    kept
}

// Accessors shared by both placeholders; each type provides `items()`.
macro_rules! collection_accessors {
    () => {
        /// Number of elements, fetching on first use.
        pub fn len(&self) -> Result<usize> {
            Ok(self.items()?.len())
        }

        pub fn is_empty(&self) -> Result<bool> {
            Ok(self.items()?.is_empty())
        }

        /// Iterate the elements, fetching on first use.
        pub fn iter(&self) -> Result<std::slice::Iter<'_, T>> {
            Ok(self.items()?.iter())
        }

        /// Element at `index`.
        pub fn get(&self, index: usize) -> Result<Option<&T>> {
            Ok(self.items()?.get(index))
        }

        /// Whether an element with this id is present.
        pub fn contains_id(&self, id: &Value) -> Result<bool> {
            Ok(self
                .items()?
                .iter()
                .any(|item| item.id().is_some_and(|own| own.identity_eq(id))))
        }

        /// Ids of all elements that have one, in collection order.
        pub fn ids(&self) -> Result<Vec<Value>> {
            Ok(self.items()?.iter().filter_map(Entity::id).collect())
        }

        /// Clone the elements out.
        pub fn to_vec(&self) -> Result<Vec<T>>
        where
            T: Clone,
        {
            Ok(self.items()?.to_vec())
        }

        /// Whether the fetch has completed.
        #[must_use]
        pub fn is_resolved(&self) -> bool {
            self.cell.items.get().is_some()
        }

        /// Declared container kind.
        #[must_use]
        pub fn kind(&self) -> CollectionKind {
            self.cell.kind
        }
    };
}

/// Lazily fetched collection of the rows matching a condition.
///
/// Installed for mapped one-to-many relations with the condition
/// `mapped_by == parent id`. With [`CollectionKind::Set`] duplicate ids are
/// dropped, keeping the first occurrence.
pub struct LazyCollection<T: Entity> {
    condition: SearchCondition,
    cell: ItemsCell<T>,
}

impl<T: Entity> LazyCollection<T> {
    pub fn by_condition(
        repository: Arc<dyn Repository<T>>,
        registry: Arc<RepositoryRegistry>,
        condition: SearchCondition,
        kind: CollectionKind,
    ) -> Result<Self> {
        if condition.is_empty() {
            return Err(Error::argument(format!(
                "lazy {} collection requires a non-empty condition",
                T::entity_name()
            )));
        }
        Ok(Self {
            condition,
            cell: ItemsCell::new(repository, registry, kind)?,
        })
    }

    /// All elements, fetching on first use.
    pub fn items(&self) -> Result<&[T]> {
        self.cell.resolve(|repository| {
            tracing::debug!(
                entity = T::entity_name(),
                condition = %self.condition,
                "Resolving lazy collection"
            );
            repository.search(&self.condition)
        })
    }

    collection_accessors!();

    #[must_use]
    pub fn condition(&self) -> &SearchCondition {
        &self.condition
    }
}

/// Lazily fetched collection of rows linked through a join table.
///
/// The fetch goes through [`Repository::fetch_join_collection`] with the
/// owner's relation field and the parent id.
pub struct LazyJoinCollection<T: Entity> {
    owner: Arc<EntityDescriptor>,
    field: &'static str,
    parent_id: Value,
    cell: ItemsCell<T>,
}

impl<T: Entity> LazyJoinCollection<T> {
    /// `field` must be an owned multi-valued relation of `owner` declared
    /// with a join table; `parent_id` must be non-null.
    pub fn new(
        owner: Arc<EntityDescriptor>,
        repository: Arc<dyn Repository<T>>,
        registry: Arc<RepositoryRegistry>,
        field: &'static str,
        parent_id: impl Into<Value>,
    ) -> Result<Self> {
        let parent_id = parent_id.into();
        if parent_id.is_null() {
            return Err(Error::argument(format!(
                "join collection {}.{} requires a non-null parent id",
                owner.name(),
                field
            )));
        }

        let relation = owner.field_by_name(field).ok_or_else(|| {
            Error::argument(format!("{} has no field '{}'", owner.name(), field))
        })?;
        if relation.shape() != Some(RelationShape::OwnedJoin) {
            return Err(Error::argument(format!(
                "{}.{} is not an owned join-table relation",
                owner.name(),
                field
            )));
        }
        let kind = relation.collection_kind().unwrap_or_default();

        Ok(Self {
            owner,
            field,
            parent_id,
            cell: ItemsCell::new(repository, registry, kind)?,
        })
    }

    /// All elements, fetching on first use.
    pub fn items(&self) -> Result<&[T]> {
        self.cell.resolve(|repository| {
            tracing::debug!(
                owner = self.owner.name(),
                field = self.field,
                parent_id = %self.parent_id,
                "Resolving lazy join collection"
            );
            repository.fetch_join_collection(&self.owner, self.field, &self.parent_id)
        })
    }

    collection_accessors!();

    /// Relation field on the owning entity.
    #[must_use]
    pub fn field(&self) -> &'static str {
        self.field
    }

    #[must_use]
    pub fn parent_id(&self) -> &Value {
        &self.parent_id
    }
}

impl<T: Entity> fmt::Debug for LazyCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyCollection")
            .field("entity", &self.cell.descriptor.name())
            .field("condition", &self.condition)
            .field("kind", &self.cell.kind)
            .field("state", &self.cell.state())
            .finish_non_exhaustive()
    }
}

impl<T: Entity> fmt::Debug for LazyJoinCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyJoinCollection")
            .field("entity", &self.cell.descriptor.name())
            .field("owner", &self.owner.name())
            .field("field", &self.field)
            .field("parent_id", &self.parent_id)
            .field("state", &self.cell.state())
            .finish_non_exhaustive()
    }
}

fn serialize_items<T, S>(cell: &ItemsCell<T>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    T: Entity + Serialize,
    S: Serializer,
{
    match cell.items.get() {
        Some(items) => items.serialize(serializer),
        None => serializer.serialize_none(),
    }
}

impl<T: Entity + Serialize> Serialize for LazyCollection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serialize_items(&self.cell, serializer)
    }
}

impl<T: Entity + Serialize> Serialize for LazyJoinCollection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serialize_items(&self.cell, serializer)
    }
}
