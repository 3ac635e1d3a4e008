//! In-memory entities and repositories for placeholder tests.

#![allow(dead_code)] // Not every test file uses every fixture

use lazyorm_core::{
    Cardinality, CollectionKind, EntityDescriptor, Error, FieldDescriptor, JoinTableInfo,
    QueryError, QueryErrorKind, RelationDescriptor, Repository, Result, RowData,
    SearchCondition, Value,
};
use lazyorm_proxy::{
    Entity, LazyCollection, LazyEntity, LazyJoinCollection, RelationValue, RepositoryRegistry,
};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug)]
pub struct Department {
    pub id: Option<i64>,
    pub name: String,
    pub employees: Option<LazyCollection<Employee>>,
    pub projects: Option<LazyJoinCollection<Project>>,
    pub manager: Option<LazyEntity<Employee>>,
    pub head: Option<LazyEntity<Employee>>,
}

impl Department {
    pub fn from_row(row: &RowData) -> Self {
        Self {
            id: row.get("id").and_then(Value::as_i64),
            name: text(row, "name"),
            employees: None,
            projects: None,
            manager: None,
            head: None,
        }
    }
}

impl Entity for Department {
    fn entity_name() -> &'static str {
        "Department"
    }

    fn id(&self) -> Option<Value> {
        self.id.map(Value::BigInt)
    }

    fn relation_is_set(&self, field: &str) -> bool {
        match field {
            "employees" => self.employees.is_some(),
            "projects" => self.projects.is_some(),
            "manager" => self.manager.is_some(),
            "head" => self.head.is_some(),
            _ => false,
        }
    }

    fn install_relation(&mut self, field: &str, value: RelationValue) -> Result<()> {
        match field {
            "employees" => self.employees = Some(value.into_collection()?),
            "projects" => self.projects = Some(value.into_join_collection()?),
            "manager" => self.manager = Some(value.into_single()?),
            "head" => self.head = Some(value.into_single()?),
            other => {
                return Err(Error::argument(format!(
                    "Department has no relation '{other}'"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Employee {
    pub id: Option<i64>,
    pub name: String,
    pub department_id: Option<i64>,
    pub department: Option<LazyEntity<Department>>,
}

impl Employee {
    pub fn from_row(row: &RowData) -> Self {
        Self {
            id: row.get("id").and_then(Value::as_i64),
            name: text(row, "name"),
            department_id: row.get("departmentId").and_then(Value::as_i64),
            department: None,
        }
    }
}

impl Entity for Employee {
    fn entity_name() -> &'static str {
        "Employee"
    }

    fn id(&self) -> Option<Value> {
        self.id.map(Value::BigInt)
    }

    fn relation_is_set(&self, field: &str) -> bool {
        field == "department" && self.department.is_some()
    }

    fn install_relation(&mut self, field: &str, value: RelationValue) -> Result<()> {
        if field != "department" {
            return Err(Error::argument(format!("Employee has no relation '{field}'")));
        }
        self.department = Some(value.into_single()?);
        Ok(())
    }

    fn foreign_key(&self, field: &str) -> Option<Value> {
        match field {
            "department" => self.department_id.map(Value::BigInt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: Option<i64>,
    pub title: String,
}

impl Project {
    pub fn from_row(row: &RowData) -> Self {
        Self {
            id: row.get("id").and_then(Value::as_i64),
            title: text(row, "title"),
        }
    }
}

impl Entity for Project {
    fn entity_name() -> &'static str {
        "Project"
    }

    fn id(&self) -> Option<Value> {
        self.id.map(Value::BigInt)
    }

    fn relation_is_set(&self, _field: &str) -> bool {
        false
    }

    fn install_relation(&mut self, field: &str, _value: RelationValue) -> Result<()> {
        Err(Error::argument(format!("Project has no relation '{field}'")))
    }
}

fn text(row: &RowData, key: &str) -> String {
    row.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

// ============================================================================
// Descriptors
// ============================================================================

pub fn department_descriptor() -> Arc<EntityDescriptor> {
    EntityDescriptor::new("Department", "departments", FieldDescriptor::column("id", "id"))
        .field(FieldDescriptor::column("name", "name"))
        .field(FieldDescriptor::relation(
            "employees",
            "employees",
            Cardinality::Many(CollectionKind::List),
            RelationDescriptor::mapped("Employee", "departmentId"),
        ))
        .field(FieldDescriptor::relation(
            "projects",
            "projects",
            Cardinality::Many(CollectionKind::Set),
            RelationDescriptor::owned("Project").join_table(JoinTableInfo::new(
                "department_projects",
                "department_id",
                "project_id",
            )),
        ))
        .field(FieldDescriptor::relation(
            "manager",
            "manager_id",
            Cardinality::Single,
            RelationDescriptor::owned("Employee"),
        ))
        .field(FieldDescriptor::relation(
            "head",
            "head",
            Cardinality::Single,
            RelationDescriptor::mapped("Employee", "headOf"),
        ))
        .shared()
}

pub fn employee_descriptor() -> Arc<EntityDescriptor> {
    EntityDescriptor::new("Employee", "employees", FieldDescriptor::column("id", "id"))
        .field(FieldDescriptor::column("name", "name"))
        .field(FieldDescriptor::relation(
            "department",
            "department_id",
            Cardinality::Single,
            RelationDescriptor::owned("Department"),
        ))
        .shared()
}

pub fn project_descriptor() -> Arc<EntityDescriptor> {
    EntityDescriptor::new("Project", "projects", FieldDescriptor::column("id", "id"))
        .field(FieldDescriptor::column("title", "title"))
        .shared()
}

// ============================================================================
// Repository
// ============================================================================

/// Row-backed repository that counts every call.
pub struct MemoryRepository<T> {
    descriptor: Arc<EntityDescriptor>,
    build: fn(&RowData) -> T,
    rows: Mutex<Vec<RowData>>,
    /// (relation field, parent id, child id)
    links: Mutex<Vec<(String, Value, Value)>>,
    pending_failures: AtomicUsize,
    delay_ms: AtomicU64,
    pub find_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub join_calls: AtomicUsize,
}

impl<T> MemoryRepository<T> {
    pub fn new(descriptor: Arc<EntityDescriptor>, build: fn(&RowData) -> T) -> Self {
        Self {
            descriptor,
            build,
            rows: Mutex::new(Vec::new()),
            links: Mutex::new(Vec::new()),
            pending_failures: AtomicUsize::new(0),
            delay_ms: AtomicU64::new(0),
            find_calls: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            join_calls: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, row: RowData) {
        self.rows.lock().unwrap().push(row);
    }

    pub fn link(&self, field: &str, parent_id: i64, child_id: i64) {
        self.links.lock().unwrap().push((
            field.to_string(),
            Value::BigInt(parent_id),
            Value::BigInt(child_id),
        ));
    }

    /// The next `n` calls fail with a connection error.
    pub fn fail_next(&self, n: usize) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    /// Every call sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap();
        self.delay_ms.store(millis, Ordering::SeqCst);
    }

    pub fn row(&self, id: i64) -> Option<RowData> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|row| row.get("id").and_then(Value::as_i64) == Some(id))
            .cloned()
    }

    pub fn total_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
            + self.search_calls.load(Ordering::SeqCst)
            + self.join_calls.load(Ordering::SeqCst)
    }

    fn enter(&self, counter: &AtomicUsize) -> Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }

        let failing = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::Query(QueryError {
                kind: QueryErrorKind::Connection,
                message: "connection reset".to_string(),
                constraint: None,
                source: None,
            }));
        }
        Ok(())
    }

    fn rows_where(&self, mut predicate: impl FnMut(&RowData) -> bool) -> Vec<RowData> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| predicate(row))
            .cloned()
            .collect()
    }
}

fn matches(row: &RowData, condition: &SearchCondition) -> bool {
    match condition {
        SearchCondition::Compare { field, value, .. } => {
            row.get(field).is_some_and(|v| v.identity_eq(value))
        }
        SearchCondition::All(items) => items.iter().all(|c| matches(row, c)),
        SearchCondition::Any(items) => items.iter().any(|c| matches(row, c)),
    }
}

impl<T: Entity> Repository<T> for MemoryRepository<T> {
    fn descriptor(&self) -> &Arc<EntityDescriptor> {
        &self.descriptor
    }

    fn find_by_id(&self, id: &Value) -> Result<Option<T>> {
        self.enter(&self.find_calls)?;
        let rows = self.rows_where(|row| row.get("id").is_some_and(|v| v.identity_eq(id)));
        Ok(rows.first().map(self.build))
    }

    fn search(&self, condition: &SearchCondition) -> Result<Vec<T>> {
        self.enter(&self.search_calls)?;
        let rows = self.rows_where(|row| matches(row, condition));
        Ok(rows.iter().map(self.build).collect())
    }

    fn fetch_join_collection(
        &self,
        owner: &EntityDescriptor,
        relation_field: &str,
        parent_id: &Value,
    ) -> Result<Vec<T>> {
        self.enter(&self.join_calls)?;
        assert!(
            owner
                .field_by_name(relation_field)
                .and_then(|f| f.relation_descriptor())
                .is_some_and(|r| r.join_table.is_some()),
            "join fetch for a field without join table"
        );

        let child_ids: Vec<Value> = self
            .links
            .lock()
            .unwrap()
            .iter()
            .filter(|(field, parent, _)| field == relation_field && parent.identity_eq(parent_id))
            .map(|(_, _, child)| child.clone())
            .collect();

        let mut out = Vec::new();
        for child in &child_ids {
            let rows = self.rows_where(|row| row.get("id").is_some_and(|v| v.identity_eq(child)));
            out.extend(rows.iter().map(self.build));
        }
        Ok(out)
    }
}

// ============================================================================
// World
// ============================================================================

/// Departments, employees and projects wired through one registry.
///
/// - Department 7 "Engineering": manager 1, employees 1 and 2, head 1,
///   projects 10 and 11 (10 linked twice)
/// - Department 8 "Sales": employee 3, no manager
/// - Department 9 "Empty": nothing related
pub struct World {
    pub registry: Arc<RepositoryRegistry>,
    pub departments: Arc<MemoryRepository<Department>>,
    pub employees: Arc<MemoryRepository<Employee>>,
    pub projects: Arc<MemoryRepository<Project>>,
}

impl World {
    pub fn new() -> Self {
        let departments = Arc::new(MemoryRepository::new(
            department_descriptor(),
            Department::from_row,
        ));
        let employees = Arc::new(MemoryRepository::new(
            employee_descriptor(),
            Employee::from_row,
        ));
        let projects = Arc::new(MemoryRepository::new(
            project_descriptor(),
            Project::from_row,
        ));

        departments.insert(
            RowData::new()
                .with("id", 7_i64)
                .with("name", "Engineering")
                .with("managerId", 1_i64),
        );
        departments.insert(RowData::new().with("id", 8_i64).with("name", "Sales"));
        departments.insert(RowData::new().with("id", 9_i64).with("name", "Empty"));

        employees.insert(
            RowData::new()
                .with("id", 1_i64)
                .with("name", "Ada")
                .with("departmentId", 7_i64)
                .with("headOf", 7_i64),
        );
        employees.insert(
            RowData::new()
                .with("id", 2_i64)
                .with("name", "Grace")
                .with("departmentId", 7_i64),
        );
        employees.insert(
            RowData::new()
                .with("id", 3_i64)
                .with("name", "Linus")
                .with("departmentId", 8_i64),
        );

        projects.insert(RowData::new().with("id", 10_i64).with("title", "Compiler"));
        projects.insert(RowData::new().with("id", 11_i64).with("title", "Runtime"));
        projects.link("projects", 7, 10);
        projects.link("projects", 7, 11);
        projects.link("projects", 7, 10);

        let registry = RepositoryRegistry::new();
        let repo: Arc<dyn Repository<Department>> = departments.clone();
        registry.register(repo).unwrap();
        let repo: Arc<dyn Repository<Employee>> = employees.clone();
        registry.register(repo).unwrap();
        let repo: Arc<dyn Repository<Project>> = projects.clone();
        registry.register(repo).unwrap();

        Self {
            registry,
            departments,
            employees,
            projects,
        }
    }

    /// Read department `id` the way a repository would, without touching
    /// the call counters, and wrap it.
    pub fn read_department(&self, id: i64) -> LazyEntity<Department> {
        let row = self.departments.row(id).unwrap();
        let entity = Department::from_row(&row);
        LazyEntity::wrapping(
            self.departments.clone(),
            Arc::clone(&self.registry),
            entity,
            &row,
        )
        .unwrap()
    }

    pub fn lazy_employee(&self, id: i64) -> LazyEntity<Employee> {
        LazyEntity::by_id(self.employees.clone(), Arc::clone(&self.registry), id).unwrap()
    }
}
