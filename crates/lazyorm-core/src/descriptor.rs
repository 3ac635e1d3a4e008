//! Entity metadata consumed by the lazy resolution layer.
//!
//! Descriptors are built once per entity type by the metadata layer and shared
//! read-only (usually behind an `Arc`) by every repository and proxy. The
//! relation shape of each relation field is computed here, at build time, so
//! routing a freshly read row to the right kind of proxy is a plain `match`.

use std::sync::Arc;

/// Container kind declared for a multi-valued relation field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CollectionKind {
    /// Ordered, duplicates preserved (`Vec`-like).
    #[default]
    List,
    /// One element per entity id, in first-seen order.
    Set,
}

/// Whether a relation field holds one related entity or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Single reference (many-to-one / one-to-one).
    Single,
    /// Multi-valued container (one-to-many / many-to-many).
    Many(CollectionKind),
}

/// Relation shape, deciding which lazy placeholder a null relation field gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationShape {
    /// Multi-valued, owned by this table through a join table.
    OwnedJoin,
    /// Multi-valued, the other side holds the foreign key.
    MappedCollection,
    /// Single-valued, this table holds the foreign key.
    OwnedSingle,
    /// Single-valued, the other side holds the foreign key.
    MappedSingle,
}

impl RelationShape {
    /// Compute the shape from cardinality and ownership.
    #[must_use]
    pub const fn of(cardinality: Cardinality, mapped: bool) -> Self {
        match (cardinality, mapped) {
            (Cardinality::Many(_), false) => RelationShape::OwnedJoin,
            (Cardinality::Many(_), true) => RelationShape::MappedCollection,
            (Cardinality::Single, false) => RelationShape::OwnedSingle,
            (Cardinality::Single, true) => RelationShape::MappedSingle,
        }
    }

    /// Does the current table own the relation?
    #[must_use]
    pub const fn is_owned(self) -> bool {
        matches!(self, RelationShape::OwnedJoin | RelationShape::OwnedSingle)
    }
}

/// Join table used by an owned many-to-many relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinTableInfo {
    /// The join table name (e.g., `"department_projects"`).
    pub table_name: &'static str,

    /// Column pointing to the owning entity (e.g., `"department_id"`).
    pub join_column: &'static str,

    /// Column pointing to the target entity (e.g., `"project_id"`).
    pub inverse_join_column: &'static str,
}

impl JoinTableInfo {
    /// Create a new join-table definition.
    #[must_use]
    pub const fn new(
        table_name: &'static str,
        join_column: &'static str,
        inverse_join_column: &'static str,
    ) -> Self {
        Self {
            table_name,
            join_column,
            inverse_join_column,
        }
    }
}

/// Metadata carried by a relation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDescriptor {
    /// Name of the target entity (matches its `EntityDescriptor::name`).
    pub target: &'static str,

    /// Field on the other side establishing the relation (mapped side only).
    pub mapped_by: Option<&'static str>,

    /// Join table for owned many-to-many relations.
    pub join_table: Option<JoinTableInfo>,
}

impl RelationDescriptor {
    /// A relation owned by the current table.
    #[must_use]
    pub const fn owned(target: &'static str) -> Self {
        Self {
            target,
            mapped_by: None,
            join_table: None,
        }
    }

    /// A relation whose foreign key lives on the other side.
    #[must_use]
    pub const fn mapped(target: &'static str, mapped_by: &'static str) -> Self {
        Self {
            target,
            mapped_by: Some(mapped_by),
            join_table: None,
        }
    }

    /// Set the join table of an owned many-to-many relation.
    #[must_use]
    pub const fn join_table(mut self, join_table: JoinTableInfo) -> Self {
        self.join_table = Some(join_table);
        self
    }

    /// Is the other side the owner?
    #[must_use]
    pub const fn is_mapped(&self) -> bool {
        self.mapped_by.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RelationField {
    relation: RelationDescriptor,
    cardinality: Cardinality,
    shape: RelationShape,
}

/// Metadata about a single entity field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: &'static str,
    column_name: &'static str,
    relation: Option<RelationField>,
}

impl FieldDescriptor {
    /// A plain column field.
    #[must_use]
    pub const fn column(name: &'static str, column_name: &'static str) -> Self {
        Self {
            name,
            column_name,
            relation: None,
        }
    }

    /// A relation field; its shape is computed immediately.
    #[must_use]
    pub const fn relation(
        name: &'static str,
        column_name: &'static str,
        cardinality: Cardinality,
        relation: RelationDescriptor,
    ) -> Self {
        Self {
            name,
            column_name,
            relation: Some(RelationField {
                relation,
                cardinality,
                shape: RelationShape::of(cardinality, relation.is_mapped()),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn column_name(&self) -> &'static str {
        self.column_name
    }

    /// Does this field participate in a relationship?
    pub fn is_relation(&self) -> bool {
        self.relation.is_some()
    }

    /// Does the current table own the relation (holds the FK or declares the join)?
    pub fn is_table_owned(&self) -> bool {
        self.shape().is_some_and(RelationShape::is_owned)
    }

    /// Is the declared type a multi-valued container?
    pub fn is_multi_valued(&self) -> bool {
        matches!(self.cardinality(), Some(Cardinality::Many(_)))
    }

    pub fn relation_descriptor(&self) -> Option<&RelationDescriptor> {
        self.relation.as_ref().map(|r| &r.relation)
    }

    pub fn cardinality(&self) -> Option<Cardinality> {
        self.relation.as_ref().map(|r| r.cardinality)
    }

    pub fn shape(&self) -> Option<RelationShape> {
        self.relation.as_ref().map(|r| r.shape)
    }

    /// Container kind of a multi-valued relation.
    pub fn collection_kind(&self) -> Option<CollectionKind> {
        match self.cardinality() {
            Some(Cardinality::Many(kind)) => Some(kind),
            _ => None,
        }
    }
}

/// Per-entity metadata: identity, id field and ordered field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    name: &'static str,
    table_name: &'static str,
    id_field: FieldDescriptor,
    fields: Vec<FieldDescriptor>,
}

impl EntityDescriptor {
    /// Create a descriptor with the given id field.
    ///
    /// The id field is also the first entry of [`fields`](Self::fields).
    #[must_use]
    pub fn new(name: &'static str, table_name: &'static str, id_field: FieldDescriptor) -> Self {
        Self {
            name,
            table_name,
            fields: vec![id_field.clone()],
            id_field,
        }
    }

    /// Append a field.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Freeze into a shareable handle.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Entity type identity.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn table_name(&self) -> &'static str {
        self.table_name
    }

    pub fn id_field(&self) -> &FieldDescriptor {
        &self.id_field
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Iterate relation fields in declaration order.
    pub fn relation_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_relation())
    }
}
