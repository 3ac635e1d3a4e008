//! Lazy placeholders for LazyORM.
//!
//! A repository that reads a row hands back a [`LazyEntity::wrapping`] of it;
//! every unset relation field is then filled with a placeholder chosen from
//! the field's precomputed [`RelationShape`](lazyorm_core::RelationShape):
//!
//! | Shape | Placeholder |
//! |---|---|
//! | owned, multi-valued, join table | [`LazyJoinCollection`] |
//! | mapped, multi-valued | [`LazyCollection`] with `mapped_by == parent id` |
//! | owned, single-valued, foreign key known | [`LazyEntity::by_id`] |
//! | mapped, single-valued | [`LazyEntity::by_condition`] with `mapped_by == parent id` |
//!
//! Placeholders fetch at most once, on first real use, and the entities they
//! fetch are populated the same way so deeper relations stay lazy.

pub mod collection;
pub mod entity;
pub mod lazy;
pub mod registry;
pub mod relation;

pub use collection::{LazyCollection, LazyJoinCollection};
pub use entity::Entity;
pub use lazy::{LazyEntity, LazySource};
pub use registry::RepositoryRegistry;
pub use relation::{RelationKind, RelationPlan, RelationValue, plan_relation, populate_relations};
