//! Relation routing: deciding which lazy placeholder a null relation field gets.
//!
//! Routing runs eagerly when a row is wrapped (and again after every lazy
//! fetch), but it only builds placeholders; nothing here touches the database.

use crate::collection::{LazyCollection, LazyJoinCollection};
use crate::entity::Entity;
use crate::lazy::LazyEntity;
use crate::registry::RepositoryRegistry;
use lazyorm_core::{
    CollectionKind, EntityDescriptor, Error, FieldDescriptor, RelationShape, Result, RowData,
    SearchCondition, Value,
};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// What to install in one relation field.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationPlan {
    /// Owned multi-valued relation fetched through its join table.
    JoinCollection {
        owner: Arc<EntityDescriptor>,
        field: &'static str,
        parent_id: Value,
    },
    /// Mapped multi-valued relation: `mapped_by == parent id`.
    MappedCollection {
        condition: SearchCondition,
        kind: CollectionKind,
    },
    /// Owned single-valued relation with a known foreign key.
    ById(Value),
    /// Mapped single-valued relation: `mapped_by == parent id`.
    ByCondition(SearchCondition),
}

/// Route one relation field.
///
/// Returns `None` when the field must be left unset: a non-relation field, a
/// mapped or join relation whose owner id is unknown, or an owned single
/// relation without a raw foreign key.
pub fn plan_relation(
    owner: &Arc<EntityDescriptor>,
    field: &FieldDescriptor,
    owner_id: Option<&Value>,
    raw_id: Option<&Value>,
) -> Option<RelationPlan> {
    let shape = field.shape()?;
    let relation = field.relation_descriptor()?;
    let mapped_by_owner = |mapped_by: Option<&'static str>| {
        Some(SearchCondition::eq(mapped_by?, owner_id?.clone()))
    };

    match shape {
        RelationShape::OwnedJoin => Some(RelationPlan::JoinCollection {
            owner: Arc::clone(owner),
            field: field.name(),
            parent_id: owner_id?.clone(),
        }),
        RelationShape::MappedCollection => Some(RelationPlan::MappedCollection {
            condition: mapped_by_owner(relation.mapped_by)?,
            kind: field.collection_kind().unwrap_or_default(),
        }),
        RelationShape::OwnedSingle => Some(RelationPlan::ById(raw_id?.clone())),
        RelationShape::MappedSingle => {
            Some(RelationPlan::ByCondition(mapped_by_owner(relation.mapped_by)?))
        }
    }
}

/// Kind of placeholder carried by a [`RelationValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// A [`LazyEntity`] resolved by id.
    SingleById,
    /// A [`LazyEntity`] resolved by condition.
    SingleByCondition,
    /// A [`LazyCollection`].
    Collection,
    /// A [`LazyJoinCollection`].
    JoinCollection,
}

/// A type-erased placeholder ready to be installed in a relation field.
///
/// The entity recovers the typed placeholder with one of the `into_*`
/// methods; asking for the wrong target type is an invalid-construction error.
pub struct RelationValue {
    kind: RelationKind,
    target: &'static str,
    proxy: Box<dyn Any + Send + Sync>,
}

impl RelationValue {
    pub(crate) fn new<P: Any + Send + Sync>(
        kind: RelationKind,
        target: &'static str,
        proxy: P,
    ) -> Self {
        Self {
            kind,
            target,
            proxy: Box::new(proxy),
        }
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Name of the related entity.
    pub fn target(&self) -> &'static str {
        self.target
    }

    /// Recover a single-entity placeholder.
    pub fn into_single<T: Entity>(self) -> Result<LazyEntity<T>> {
        self.downcast()
    }

    /// Recover a condition-based collection placeholder.
    pub fn into_collection<T: Entity>(self) -> Result<LazyCollection<T>> {
        self.downcast()
    }

    /// Recover a join-table collection placeholder.
    pub fn into_join_collection<T: Entity>(self) -> Result<LazyJoinCollection<T>> {
        self.downcast()
    }

    fn downcast<P: Any>(self) -> Result<P> {
        let kind = self.kind;
        let target = self.target;
        self.proxy.downcast::<P>().map(|p| *p).map_err(|_| {
            Error::argument(format!(
                "relation placeholder {:?} for '{}' is not a {}",
                kind,
                target,
                std::any::type_name::<P>()
            ))
        })
    }
}

impl fmt::Debug for RelationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationValue")
            .field("kind", &self.kind)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Install lazy placeholders into every unset relation field of `entity`.
///
/// `row` is the raw data read together with the entity (empty after a lazy
/// fetch). Fields that already hold a value are left alone.
pub fn populate_relations<T: Entity>(
    entity: &mut T,
    descriptor: &Arc<EntityDescriptor>,
    row: &RowData,
    registry: &Arc<RepositoryRegistry>,
) -> Result<()> {
    let mut owner_id: Option<Option<Value>> = None;

    for field in descriptor.relation_fields() {
        if entity.relation_is_set(field.name()) {
            continue;
        }

        let id = owner_id.get_or_insert_with(|| entity.id()).clone();
        let raw_id = row
            .relation_id(field)
            .cloned()
            .or_else(|| entity.foreign_key(field.name()));

        let Some(plan) = plan_relation(descriptor, field, id.as_ref(), raw_id.as_ref()) else {
            tracing::trace!(
                entity = descriptor.name(),
                field = field.name(),
                "Relation left unset: no id to resolve it with"
            );
            continue;
        };

        let target = field
            .relation_descriptor()
            .map(|r| r.target)
            .unwrap_or_default();
        tracing::trace!(
            entity = descriptor.name(),
            field = field.name(),
            target = target,
            plan = ?plan,
            "Installing lazy relation"
        );

        let value = registry.build_relation(target, plan)?;
        entity.install_relation(field.name(), value)?;
    }

    Ok(())
}
