use crate::calendar::WorkingHoursCalendar;
use crate::config::SchedulerConfig;
use crate::error::{CircularDependencyError, Relation, ScheduleError, ValidationError};
use crate::forest::TaskForest;
use crate::graph::dependency_graph::{DependencyGraph, ForestView, Proposal};
use crate::resource::{Project, Resource};
use crate::task::{ProjectId, ResourceId, TaskId, TaskNode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum PersistenceError {
    Serialization(SerdeJsonError),
    Io(io::Error),
    #[cfg(feature = "sqlite")]
    Sqlite(rusqlite::Error),
    Schedule(ScheduleError),
    InvalidData(String),
    StoreUnavailable,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Serialization(err) => write!(f, "serialization error: {err}"),
            PersistenceError::Io(err) => write!(f, "io error: {err}"),
            #[cfg(feature = "sqlite")]
            PersistenceError::Sqlite(err) => write!(f, "sqlite error: {err}"),
            PersistenceError::Schedule(err) => write!(f, "schedule error: {err}"),
            PersistenceError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            PersistenceError::StoreUnavailable => write!(f, "store connection is unavailable"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<SerdeJsonError> for PersistenceError {
    fn from(value: SerdeJsonError) -> Self {
        Self::Serialization(value)
    }
}

impl From<io::Error> for PersistenceError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<ScheduleError> for PersistenceError {
    fn from(value: ScheduleError) -> Self {
        Self::Schedule(value)
    }
}

impl From<ValidationError> for PersistenceError {
    fn from(value: ValidationError) -> Self {
        Self::Schedule(value.into())
    }
}

impl From<CircularDependencyError> for PersistenceError {
    fn from(value: CircularDependencyError) -> Self {
        Self::Schedule(value.into())
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

pub trait ForestStore {
    fn save_forest(&self, forest: &TaskForest) -> PersistenceResult<()>;
    fn load_forest(&self) -> PersistenceResult<Option<TaskForest>>;
}

/// Everything needed to rebuild a [`TaskForest`]. Derived fields are stored
/// but recomputed on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestSnapshot {
    pub config: SchedulerConfig,
    pub calendar: WorkingHoursCalendar,
    pub now: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub projects: Vec<Project>,
    pub tasks: Vec<TaskNode>,
    pub resources: Vec<Resource>,
    pub next_project_id: u32,
    pub next_task_id: u32,
}

impl ForestSnapshot {
    pub fn from_forest(forest: &TaskForest) -> Self {
        Self {
            config: forest.config.clone(),
            calendar: forest.calendar.clone(),
            now: forest.now,
            window_start: forest.window_start,
            window_end: forest.window_end,
            projects: forest.projects.values().cloned().collect(),
            tasks: forest.tasks.values().cloned().collect(),
            resources: forest.resources.values().cloned().collect(),
            next_project_id: forest.next_project_id,
            next_task_id: forest.next_task_id,
        }
    }

    /// Rebuilds the forest, rejecting dangling references and cycles.
    pub fn into_forest(self) -> PersistenceResult<TaskForest> {
        self.config
            .validate()
            .map_err(|err| PersistenceError::Schedule(err.into()))?;
        let calendar = self.calendar.checked()?;
        if self.window_end <= self.window_start {
            return Err(PersistenceError::InvalidData(format!(
                "scheduling window {} - {} is empty",
                self.window_start, self.window_end
            )));
        }

        let projects = index_unique(self.projects, Project::id, "project")?;
        let tasks = index_unique(self.tasks, TaskNode::id, "task")?;
        let resources = index_unique(self.resources, Resource::id, "resource")?;

        validate_references(&projects, &tasks, &resources)?;

        let next_project_id = projects
            .keys()
            .map(|id| id.0 + 1)
            .max()
            .unwrap_or(1)
            .max(self.next_project_id);
        let next_task_id = tasks
            .keys()
            .map(|id| id.0 + 1)
            .max()
            .unwrap_or(1)
            .max(self.next_task_id);

        let mut forest = TaskForest {
            config: self.config,
            calendar,
            now: self.now,
            window_start: self.window_start,
            window_end: self.window_end,
            projects,
            tasks,
            resources,
            next_project_id,
            next_task_id,
        };
        validate_graph(&forest)?;
        forest.recompute_all(false);
        Ok(forest)
    }
}

fn index_unique<K: Ord + Copy + fmt::Display, V>(
    values: Vec<V>,
    key: fn(&V) -> K,
    kind: &str,
) -> PersistenceResult<BTreeMap<K, V>> {
    let mut indexed = BTreeMap::new();
    for value in values {
        let id = key(&value);
        if indexed.insert(id, value).is_some() {
            return Err(PersistenceError::InvalidData(format!(
                "duplicate {kind} id {id}"
            )));
        }
    }
    Ok(indexed)
}

fn validate_references(
    projects: &BTreeMap<ProjectId, Project>,
    tasks: &BTreeMap<TaskId, TaskNode>,
    resources: &BTreeMap<ResourceId, Resource>,
) -> PersistenceResult<()> {
    let known_resource = |id: &ResourceId, owner: String| {
        if resources.contains_key(id) {
            Ok(())
        } else {
            Err(PersistenceError::InvalidData(format!(
                "{owner} refers to unknown resource {id}"
            )))
        }
    };

    for project in projects.values() {
        if let Some(lead) = project.lead() {
            known_resource(&lead, format!("project {}", project.id()))?;
        }
    }

    for task in tasks.values() {
        let id = task.id();
        if !projects.contains_key(&task.project()) {
            return Err(PersistenceError::InvalidData(format!(
                "task {id} belongs to unknown project {}",
                task.project()
            )));
        }
        if let Some(parent_id) = task.parent() {
            let Some(parent) = tasks.get(&parent_id) else {
                return Err(PersistenceError::InvalidData(format!(
                    "task {id} has unknown parent {parent_id}"
                )));
            };
            if !parent.children().contains(&id) {
                return Err(PersistenceError::InvalidData(format!(
                    "task {parent_id} does not list child {id}"
                )));
            }
            if parent.project() != task.project() {
                return Err(PersistenceError::InvalidData(format!(
                    "task {id} and its parent {parent_id} are in different projects"
                )));
            }
        }
        let mut children = HashSet::new();
        for child in task.children() {
            if !children.insert(*child) {
                return Err(PersistenceError::InvalidData(format!(
                    "task {id} lists child {child} twice"
                )));
            }
            if tasks.get(child).and_then(TaskNode::parent) != Some(id) {
                return Err(PersistenceError::InvalidData(format!(
                    "child {child} of task {id} does not point back to it"
                )));
            }
        }
        for target in task.dependency().ids() {
            if !tasks.contains_key(&target) {
                return Err(PersistenceError::InvalidData(format!(
                    "task {id} depends on unknown task {target}"
                )));
            }
        }
        if task.is_container() && !task.time_logs().is_empty() {
            return Err(PersistenceError::InvalidData(format!(
                "container task {id} carries time logs"
            )));
        }
        for resource in task
            .resources()
            .iter()
            .chain(task.alternative_resources())
            .chain(task.own_responsible().as_ref())
        {
            known_resource(resource, format!("task {id}"))?;
        }
        for log in task.time_logs() {
            known_resource(&log.resource(), format!("time log of task {id}"))?;
        }
    }
    Ok(())
}

fn validate_graph(forest: &TaskForest) -> PersistenceResult<()> {
    let proposal = Proposal::default();
    let view = ForestView::new(forest, &proposal);
    for id in forest.tasks.keys() {
        if let Some(other) = view.lineage_conflict(*id) {
            return Err(CircularDependencyError {
                task: *id,
                other,
                relation: Relation::DependsOn,
            }
            .into());
        }
    }
    DependencyGraph::build(forest).scheduling_order()?;
    Ok(())
}

#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod file;

pub use file::{JsonForestStore, load_forest_from_json, save_forest_to_json};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteForestStore;
