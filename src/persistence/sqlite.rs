use super::{ForestSnapshot, ForestStore, PersistenceError, PersistenceResult};
use crate::calendar::WorkingHoursCalendar;
use crate::config::SchedulerConfig;
use crate::forest::TaskForest;
use crate::resource::{Project, Resource};
use crate::task::TaskNode;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, instrument};

/// Forest-level settings stored in the single `forest_settings` row.
#[derive(Serialize, Deserialize)]
struct ForestSettings {
    config: SchedulerConfig,
    calendar: WorkingHoursCalendar,
    now: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    next_project_id: u32,
    next_task_id: u32,
}

pub struct SqliteForestStore {
    connection: Mutex<Connection>,
}

impl SqliteForestStore {
    pub fn new<P: AsRef<Path>>(path: P) -> PersistenceResult<Self> {
        let connection = Connection::open(path)?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    pub fn in_memory() -> PersistenceResult<Self> {
        let connection = Connection::open_in_memory()?;
        Self::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn initialize_schema(connection: &Connection) -> PersistenceResult<()> {
        let ddl = r#"
            CREATE TABLE IF NOT EXISTS forest_settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                settings_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY,
                project_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS resources (
                id INTEGER PRIMARY KEY,
                resource_json TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY,
                project_id INTEGER NOT NULL,
                parent_id INTEGER,
                task_json TEXT NOT NULL
            );
        "#;
        connection.execute_batch(ddl)?;
        Ok(())
    }

    fn lock(&self) -> PersistenceResult<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| PersistenceError::StoreUnavailable)
    }

    fn save_settings(tx: &Transaction, snapshot: &ForestSnapshot) -> PersistenceResult<()> {
        let settings = ForestSettings {
            config: snapshot.config.clone(),
            calendar: snapshot.calendar.clone(),
            now: snapshot.now,
            window_start: snapshot.window_start,
            window_end: snapshot.window_end,
            next_project_id: snapshot.next_project_id,
            next_task_id: snapshot.next_task_id,
        };
        let json = serde_json::to_string(&settings)?;
        tx.execute("DELETE FROM forest_settings", [])?;
        tx.execute(
            "INSERT INTO forest_settings (id, settings_json) VALUES (1, ?1)",
            params![json],
        )?;
        Ok(())
    }

    fn save_entities(tx: &Transaction, snapshot: &ForestSnapshot) -> PersistenceResult<()> {
        tx.execute("DELETE FROM projects", [])?;
        tx.execute("DELETE FROM resources", [])?;
        tx.execute("DELETE FROM tasks", [])?;

        let mut stmt = tx.prepare("INSERT INTO projects (id, project_json) VALUES (?1, ?2)")?;
        for project in &snapshot.projects {
            stmt.execute(params![project.id().0, serde_json::to_string(project)?])?;
        }

        let mut stmt = tx.prepare("INSERT INTO resources (id, resource_json) VALUES (?1, ?2)")?;
        for resource in &snapshot.resources {
            stmt.execute(params![resource.id().0, serde_json::to_string(resource)?])?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO tasks (id, project_id, parent_id, task_json) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for task in &snapshot.tasks {
            stmt.execute(params![
                task.id().0,
                task.project().0,
                task.parent().map(|parent| parent.0),
                serde_json::to_string(task)?
            ])?;
        }
        Ok(())
    }

    fn load_rows<T: DeserializeOwned>(
        connection: &Connection,
        query: &str,
    ) -> PersistenceResult<Vec<T>> {
        let mut stmt = connection.prepare(query)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut values = Vec::new();
        for json in rows {
            values.push(serde_json::from_str(&json?)?);
        }
        Ok(values)
    }
}

impl ForestStore for SqliteForestStore {
    #[instrument(skip_all)]
    fn save_forest(&self, forest: &TaskForest) -> PersistenceResult<()> {
        let snapshot = ForestSnapshot::from_forest(forest);
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::save_settings(&tx, &snapshot)?;
        Self::save_entities(&tx, &snapshot)?;
        tx.commit()?;
        info!(tasks = snapshot.tasks.len(), "forest saved");
        Ok(())
    }

    #[instrument(skip_all)]
    fn load_forest(&self) -> PersistenceResult<Option<TaskForest>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT settings_json FROM forest_settings WHERE id = 1")?;
        let settings_json: Option<String> = stmt.query_row([], |row| row.get(0)).optional()?;
        let Some(settings_json) = settings_json else {
            return Ok(None);
        };
        let settings: ForestSettings = serde_json::from_str(&settings_json)?;

        let projects: Vec<Project> =
            Self::load_rows(&conn, "SELECT project_json FROM projects ORDER BY id ASC")?;
        let resources: Vec<Resource> =
            Self::load_rows(&conn, "SELECT resource_json FROM resources ORDER BY id ASC")?;
        let tasks: Vec<TaskNode> =
            Self::load_rows(&conn, "SELECT task_json FROM tasks ORDER BY id ASC")?;

        let snapshot = ForestSnapshot {
            config: settings.config,
            calendar: settings.calendar,
            now: settings.now,
            window_start: settings.window_start,
            window_end: settings.window_end,
            projects,
            tasks,
            resources,
            next_project_id: settings.next_project_id,
            next_task_id: settings.next_task_id,
        };
        let forest = snapshot.into_forest()?;
        info!(tasks = forest.len(), "forest loaded");
        Ok(Some(forest))
    }
}
