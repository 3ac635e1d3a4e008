//! Relation routing and collection placeholders, driven through a wrapped
//! Department read.

mod fixtures;

use fixtures::{Employee, Project, World, department_descriptor};
use lazyorm_core::{CollectionKind, Error, SearchCondition, Value};
use lazyorm_proxy::{LazyCollection, LazyJoinCollection, LazySource};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn test_wrap_installs_placeholder_per_shape() {
    let world = World::new();
    let lazy = world.read_department(7);
    let department = lazy.get().unwrap();

    let employees = department.employees.as_ref().unwrap();
    assert_eq!(
        employees.condition(),
        &SearchCondition::eq("departmentId", 7_i64)
    );
    assert_eq!(employees.kind(), CollectionKind::List);

    let projects = department.projects.as_ref().unwrap();
    assert_eq!(projects.field(), "projects");
    assert_eq!(projects.parent_id(), &Value::BigInt(7));
    assert_eq!(projects.kind(), CollectionKind::Set);

    let manager = department.manager.as_ref().unwrap();
    assert_eq!(manager.source(), &LazySource::Id(Value::BigInt(1)));

    let head = department.head.as_ref().unwrap();
    assert_eq!(
        head.source(),
        &LazySource::Condition(SearchCondition::eq("headOf", 7_i64))
    );

    assert_eq!(world.employees.total_calls(), 0);
    assert_eq!(world.projects.total_calls(), 0);
}

#[test]
fn test_owned_single_without_raw_id_left_unset() {
    let world = World::new();
    let lazy = world.read_department(8);
    let department = lazy.get().unwrap();

    assert!(department.manager.is_none());
    assert!(department.employees.is_some());
    assert!(department.head.is_some());
}

#[test]
fn test_mapped_relations_skipped_without_owner_id() {
    let world = World::new();
    let mut row = world.departments.row(7).unwrap();
    row.insert("id", Value::Null);
    let mut entity = fixtures::Department::from_row(&row);
    entity.id = None;

    let lazy = lazyorm_proxy::LazyEntity::wrapping(
        world.departments.clone(),
        Arc::clone(&world.registry),
        entity,
        &row,
    )
    .unwrap();
    let department = lazy.get().unwrap();

    assert!(department.employees.is_none());
    assert!(department.projects.is_none());
    assert!(department.head.is_none());
    // the owned foreign key does not need the owner id
    assert!(department.manager.is_some());
}

#[test]
fn test_department_scenario_size_fetches_once() {
    let world = World::new();
    let lazy = world.read_department(7);
    let employees = lazy.get().unwrap().employees.as_ref().unwrap();

    assert!(!employees.is_resolved());
    assert_eq!(employees.len().unwrap(), 2);
    assert_eq!(world.employees.search_calls.load(Ordering::SeqCst), 1);

    assert_eq!(employees.len().unwrap(), 2);
    assert!(employees.contains_id(&Value::BigInt(2)).unwrap());
    assert_eq!(
        employees.ids().unwrap(),
        vec![Value::BigInt(1), Value::BigInt(2)]
    );
    assert_eq!(world.employees.search_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_empty_collection_is_not_missing() {
    let world = World::new();
    let lazy = world.read_department(9);
    let employees = lazy.get().unwrap().employees.as_ref().unwrap();

    for _ in 0..3 {
        assert_eq!(employees.len().unwrap(), 0);
        assert!(employees.is_empty().unwrap());
        assert_eq!(employees.iter().unwrap().count(), 0);
        assert!(employees.get(0).unwrap().is_none());
    }
    assert!(employees.is_resolved());
    assert_eq!(world.employees.search_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_join_collection_dedupes_set() {
    let world = World::new();
    let lazy = world.read_department(7);
    let projects = lazy.get().unwrap().projects.as_ref().unwrap();

    let titles: Vec<String> = projects
        .iter()
        .unwrap()
        .map(|p| p.title.clone())
        .collect();
    assert_eq!(titles, vec!["Compiler", "Runtime"]);
    assert_eq!(
        projects.to_vec().unwrap(),
        vec![
            Project {
                id: Some(10),
                title: "Compiler".to_string()
            },
            Project {
                id: Some(11),
                title: "Runtime".to_string()
            },
        ]
    );
    assert_eq!(world.projects.join_calls.load(Ordering::SeqCst), 1);
    assert_eq!(world.projects.search_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_join_collection_as_list_keeps_duplicates() {
    let world = World::new();
    let list_owner = lazyorm_core::EntityDescriptor::new(
        "Department",
        "departments",
        lazyorm_core::FieldDescriptor::column("id", "id"),
    )
    .field(lazyorm_core::FieldDescriptor::relation(
        "projects",
        "projects",
        lazyorm_core::Cardinality::Many(CollectionKind::List),
        lazyorm_core::RelationDescriptor::owned("Project").join_table(
            lazyorm_core::JoinTableInfo::new("department_projects", "department_id", "project_id"),
        ),
    ))
    .shared();

    let projects = LazyJoinCollection::<Project>::new(
        list_owner,
        world.projects.clone(),
        Arc::clone(&world.registry),
        "projects",
        7_i64,
    )
    .unwrap();
    assert_eq!(projects.len().unwrap(), 3);
}

#[test]
fn test_join_collection_single_flight() {
    let world = World::new();
    world.projects.set_delay(Duration::from_millis(20));
    let projects = LazyJoinCollection::<Project>::new(
        department_descriptor(),
        world.projects.clone(),
        Arc::clone(&world.registry),
        "projects",
        7_i64,
    )
    .unwrap();
    let threads = 6;
    let barrier = Barrier::new(threads);

    thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                barrier.wait();
                assert_eq!(projects.len().unwrap(), 2);
            });
        }
    });

    assert_eq!(world.projects.join_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_collection_single_flight() {
    let world = World::new();
    world.employees.set_delay(Duration::from_millis(20));
    let employees = LazyCollection::<Employee>::by_condition(
        world.employees.clone(),
        Arc::clone(&world.registry),
        SearchCondition::eq("departmentId", 7_i64),
        CollectionKind::List,
    )
    .unwrap();
    let threads = 8;
    let barrier = Barrier::new(threads);

    thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                barrier.wait();
                assert!(employees.contains_id(&Value::BigInt(1)).unwrap());
            });
        }
    });

    assert_eq!(world.employees.search_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_collection_failure_is_retried() {
    let world = World::new();
    world.employees.fail_next(1);
    let lazy = world.read_department(7);
    let employees = lazy.get().unwrap().employees.as_ref().unwrap();

    assert!(matches!(employees.len().unwrap_err(), Error::Query(_)));
    assert!(!employees.is_resolved());
    assert_eq!(employees.len().unwrap(), 2);
    assert_eq!(world.employees.search_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_collection_elements_are_populated() {
    let world = World::new();
    let lazy = world.read_department(7);
    let employees = lazy.get().unwrap().employees.as_ref().unwrap();

    let first = employees.get(0).unwrap().unwrap();
    let back = first.department.as_ref().unwrap();
    assert_eq!(back.id().unwrap(), Some(Value::BigInt(7)));
    assert_eq!(world.departments.total_calls(), 0);
    assert_eq!(back.get().unwrap().name, "Engineering");
    assert_eq!(world.departments.find_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_join_collection_rejects_bad_construction() {
    let world = World::new();

    let null_parent = LazyJoinCollection::<Project>::new(
        department_descriptor(),
        world.projects.clone(),
        Arc::clone(&world.registry),
        "projects",
        Value::Null,
    );
    assert!(matches!(null_parent.unwrap_err(), Error::Argument(_)));

    let not_join = LazyJoinCollection::<Project>::new(
        department_descriptor(),
        world.projects.clone(),
        Arc::clone(&world.registry),
        "employees",
        7_i64,
    );
    assert!(matches!(not_join.unwrap_err(), Error::Argument(_)));

    let unknown = LazyJoinCollection::<Project>::new(
        department_descriptor(),
        world.projects.clone(),
        Arc::clone(&world.registry),
        "budget",
        7_i64,
    );
    assert!(matches!(unknown.unwrap_err(), Error::Argument(_)));
}

#[test]
fn test_collection_rejects_empty_condition() {
    let world = World::new();
    let err = LazyCollection::<Employee>::by_condition(
        world.employees.clone(),
        Arc::clone(&world.registry),
        SearchCondition::Any(vec![]),
        CollectionKind::Set,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Argument(_)));
}

#[test]
fn test_debug_collection_does_not_resolve() {
    let world = World::new();
    let lazy = world.read_department(7);
    let projects = lazy.get().unwrap().projects.as_ref().unwrap();
    assert_eq!(world.projects.total_calls(), 0);
    assert!(format!("{projects:?}").contains("unresolved"));
}
