//! Single-entity lazy placeholder.

use crate::entity::Entity;
use crate::registry::RepositoryRegistry;
use crate::relation::populate_relations;
use lazyorm_core::{EntityDescriptor, Error, Repository, Result, RowData, SearchCondition, Value};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// How a [`LazyEntity`] finds its row.
#[derive(Debug, Clone, PartialEq)]
pub enum LazySource {
    /// Primary-key lookup; the id is known without fetching.
    Id(Value),
    /// First row matching a condition (mapped relations).
    Condition(SearchCondition),
    /// Constructed around an entity that was already read.
    Loaded,
}

impl fmt::Display for LazySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LazySource::Id(id) => write!(f, "id {id}"),
            LazySource::Condition(condition) => write!(f, "{condition}"),
            LazySource::Loaded => write!(f, "loaded instance"),
        }
    }
}

/// A row that is fetched on first use.
///
/// # States
///
/// - **Unresolved**: nothing fetched yet
/// - **Resolved**: the entity was fetched (or supplied) and is cached
/// - **Missing**: the fetch found no row; every access reports not-found
///
/// Resolution is single-flight: concurrent first accesses block on a
/// per-placeholder lock and exactly one of them calls the repository. A
/// repository failure is returned to the caller and leaves the placeholder
/// unresolved, so a later access tries again.
///
/// # Example
///
/// ```ignore
/// let manager = LazyEntity::<Employee>::by_id(employees, registry, 3_i64)?;
///
/// // Identity never fetches
/// assert_eq!(manager.id()?, Some(Value::BigInt(3)));
///
/// // First real access fetches, later ones reuse the result
/// let name = manager.with(|e| e.name.clone())?;
/// ```
pub struct LazyEntity<T: Entity> {
    descriptor: Arc<EntityDescriptor>,
    source: LazySource,
    repository: Arc<dyn Repository<T>>,
    registry: Arc<RepositoryRegistry>,
    lock: Mutex<()>,
    state: OnceLock<Option<Box<T>>>,
}

impl<T: Entity> LazyEntity<T> {
    /// Placeholder for the row with primary key `id`.
    ///
    /// A null id is rejected.
    pub fn by_id(
        repository: Arc<dyn Repository<T>>,
        registry: Arc<RepositoryRegistry>,
        id: impl Into<Value>,
    ) -> Result<Self> {
        let id = id.into();
        if id.is_null() {
            return Err(Error::argument(format!(
                "lazy {} requires a non-null id",
                T::entity_name()
            )));
        }
        Self::unresolved(repository, registry, LazySource::Id(id))
    }

    /// Placeholder for the first row matching `condition`.
    ///
    /// A condition without any comparison is rejected.
    pub fn by_condition(
        repository: Arc<dyn Repository<T>>,
        registry: Arc<RepositoryRegistry>,
        condition: SearchCondition,
    ) -> Result<Self> {
        if condition.is_empty() {
            return Err(Error::argument(format!(
                "lazy {} requires a non-empty condition",
                T::entity_name()
            )));
        }
        Self::unresolved(repository, registry, LazySource::Condition(condition))
    }

    /// Wrap an entity that was just read, installing lazy placeholders into
    /// its unset relation fields.
    ///
    /// `row` carries the raw values read with the entity; owned single-valued
    /// relations take their foreign keys from it.
    pub fn wrapping(
        repository: Arc<dyn Repository<T>>,
        registry: Arc<RepositoryRegistry>,
        mut entity: T,
        row: &RowData,
    ) -> Result<Self> {
        let descriptor = checked_descriptor::<T>(repository.as_ref())?;
        populate_relations(&mut entity, &descriptor, row, &registry)?;

        let state = OnceLock::new();
        let _ = state.set(Some(Box::new(entity)));
        Ok(Self {
            descriptor,
            source: LazySource::Loaded,
            repository,
            registry,
            lock: Mutex::new(()),
            state,
        })
    }

    fn unresolved(
        repository: Arc<dyn Repository<T>>,
        registry: Arc<RepositoryRegistry>,
        source: LazySource,
    ) -> Result<Self> {
        Ok(Self {
            descriptor: checked_descriptor::<T>(repository.as_ref())?,
            source,
            repository,
            registry,
            lock: Mutex::new(()),
            state: OnceLock::new(),
        })
    }

    /// Primary key of the entity.
    ///
    /// Answered from the captured id without fetching when built by id;
    /// otherwise the entity is resolved first.
    pub fn id(&self) -> Result<Option<Value>> {
        match &self.source {
            LazySource::Id(id) => Ok(Some(id.clone())),
            LazySource::Condition(_) | LazySource::Loaded => Ok(self.get()?.id()),
        }
    }

    /// The resolved entity, fetching it on first use.
    ///
    /// Returns a not-found error, on this and every later call, when no row
    /// exists.
    pub fn get(&self) -> Result<&T> {
        self.resolve()?.ok_or_else(|| self.not_found())
    }

    /// Like [`get`](Self::get), but a missing row is `Ok(None)`.
    pub fn try_get(&self) -> Result<Option<&T>> {
        self.resolve()
    }

    /// Run `f` against the resolved entity.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.get().map(f)
    }

    /// Whether the fetch has completed (hit or miss).
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state.get().is_some()
    }

    /// How this placeholder finds its row.
    #[must_use]
    pub fn source(&self) -> &LazySource {
        &self.source
    }

    #[must_use]
    pub fn descriptor(&self) -> &Arc<EntityDescriptor> {
        &self.descriptor
    }

    fn resolve(&self) -> Result<Option<&T>> {
        if let Some(state) = self.state.get() {
            return Ok(state.as_deref());
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = self.state.get() {
            return Ok(state.as_deref());
        }

        let fetched = self.fetch()?;
        Ok(self.state.get_or_init(|| fetched.map(Box::new)).as_deref())
    }

    #[tracing::instrument(level = "debug", skip(self), fields(entity = self.descriptor.name(), source = %self.source))]
    fn fetch(&self) -> Result<Option<T>> {
        tracing::debug!("Resolving lazy entity");

        let found = match &self.source {
            LazySource::Id(id) => self.repository.find_by_id(id)?,
            LazySource::Condition(condition) => {
                self.repository.search(condition)?.into_iter().next()
            }
            // state is preset at construction
            LazySource::Loaded => None,
        };

        let Some(mut entity) = found else {
            tracing::debug!("Lazy entity resolved to no row");
            return Ok(None);
        };

        populate_relations(&mut entity, &self.descriptor, &RowData::new(), &self.registry)?;
        tracing::debug!("Lazy entity resolved");
        Ok(Some(entity))
    }

    fn not_found(&self) -> Error {
        Error::not_found(self.descriptor.name(), self.source.to_string())
    }
}

/// Repository descriptor, checked against the entity type it serves.
pub(crate) fn checked_descriptor<T: Entity>(
    repository: &dyn Repository<T>,
) -> Result<Arc<EntityDescriptor>> {
    let descriptor = repository.descriptor();
    if descriptor.name() != T::entity_name() {
        return Err(Error::argument(format!(
            "descriptor '{}' does not describe entity type '{}'",
            descriptor.name(),
            T::entity_name()
        )));
    }
    Ok(Arc::clone(descriptor))
}

impl<T: Entity> fmt::Debug for LazyEntity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state.get() {
            None => "unresolved",
            Some(Some(_)) => "resolved",
            Some(None) => "missing",
        };

        f.debug_struct("LazyEntity")
            .field("entity", &self.descriptor.name())
            .field("source", &self.source)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

/// Serializes the cached entity, or `null` when unresolved or missing.
/// Never triggers a fetch.
impl<T> Serialize for LazyEntity<T>
where
    T: Entity + Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.state.get() {
            Some(Some(entity)) => entity.serialize(serializer),
            Some(None) | None => serializer.serialize_none(),
        }
    }
}
