//! Repository lookup by entity name.
//!
//! Relation metadata names its target entity by string, while placeholders are
//! generic over the target type. The registry bridges the two: registering a
//! typed repository stores a factory that knows how to build typed
//! placeholders for that entity, so routing can stay non-generic.

use crate::collection::{LazyCollection, LazyJoinCollection};
use crate::entity::Entity;
use crate::lazy::LazyEntity;
use crate::relation::{RelationKind, RelationPlan, RelationValue};
use lazyorm_core::{EntityDescriptor, Error, Repository, Result};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

trait PlaceholderFactory: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn descriptor(&self) -> &Arc<EntityDescriptor>;

    fn build(&self, registry: &Arc<RepositoryRegistry>, plan: RelationPlan)
    -> Result<RelationValue>;
}

struct TypedFactory<T: Entity> {
    repository: Arc<dyn Repository<T>>,
}

impl<T: Entity> PlaceholderFactory for TypedFactory<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn descriptor(&self) -> &Arc<EntityDescriptor> {
        self.repository.descriptor()
    }

    fn build(
        &self,
        registry: &Arc<RepositoryRegistry>,
        plan: RelationPlan,
    ) -> Result<RelationValue> {
        let repository = Arc::clone(&self.repository);
        let registry = Arc::clone(registry);
        let target = T::entity_name();

        Ok(match plan {
            RelationPlan::ById(id) => RelationValue::new(
                RelationKind::SingleById,
                target,
                LazyEntity::by_id(repository, registry, id)?,
            ),
            RelationPlan::ByCondition(condition) => RelationValue::new(
                RelationKind::SingleByCondition,
                target,
                LazyEntity::by_condition(repository, registry, condition)?,
            ),
            RelationPlan::MappedCollection { condition, kind } => RelationValue::new(
                RelationKind::Collection,
                target,
                LazyCollection::by_condition(repository, registry, condition, kind)?,
            ),
            RelationPlan::JoinCollection {
                owner,
                field,
                parent_id,
            } => RelationValue::new(
                RelationKind::JoinCollection,
                target,
                LazyJoinCollection::new(owner, repository, registry, field, parent_id)?,
            ),
        })
    }
}

/// Repositories keyed by entity name.
///
/// Shared behind an `Arc` by every placeholder so a resolved entity can
/// populate its own relations with placeholders for other entity types.
#[derive(Default)]
pub struct RepositoryRegistry {
    factories: RwLock<HashMap<&'static str, Arc<dyn PlaceholderFactory>>>,
}

impl RepositoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register the repository serving entity type `T`.
    ///
    /// The repository's descriptor must describe `T`; re-registering replaces
    /// the previous repository.
    pub fn register<T: Entity>(&self, repository: Arc<dyn Repository<T>>) -> Result<()> {
        let described = repository.descriptor().name();
        if described != T::entity_name() {
            return Err(Error::argument(format!(
                "repository describes '{}' but was registered for '{}'",
                described,
                T::entity_name()
            )));
        }

        tracing::debug!(entity = T::entity_name(), "Registering repository");
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(T::entity_name(), Arc::new(TypedFactory { repository }));
        Ok(())
    }

    /// Typed repository for `T`.
    pub fn repository<T: Entity>(&self) -> Result<Arc<dyn Repository<T>>> {
        let factory = self.factory(T::entity_name())?;
        factory
            .as_any()
            .downcast_ref::<TypedFactory<T>>()
            .map(|typed| Arc::clone(&typed.repository))
            .ok_or_else(|| {
                Error::config(format!(
                    "repository registered for '{}' serves a different type",
                    T::entity_name()
                ))
            })
    }

    /// Descriptor of a registered entity.
    pub fn descriptor(&self, entity: &str) -> Result<Arc<EntityDescriptor>> {
        Ok(Arc::clone(self.factory(entity)?.descriptor()))
    }

    /// Is a repository registered for `entity`?
    pub fn contains(&self, entity: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(entity)
    }

    /// Build the placeholder described by `plan` for the `target` entity.
    pub fn build_relation(
        self: &Arc<Self>,
        target: &str,
        plan: RelationPlan,
    ) -> Result<RelationValue> {
        self.factory(target)?.build(self, plan)
    }

    fn factory(&self, entity: &str) -> Result<Arc<dyn PlaceholderFactory>> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity)
            .cloned()
            .ok_or_else(|| Error::config(format!("no repository registered for '{entity}'")))
    }
}

impl std::fmt::Debug for RepositoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&'static str> = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        names.sort_unstable();
        f.debug_struct("RepositoryRegistry")
            .field("entities", &names)
            .finish()
    }
}
