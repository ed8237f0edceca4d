use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use studio_schedule::persistence::{
    ForestSnapshot, ForestStore, JsonForestStore, PersistenceError, load_forest_from_json,
    save_forest_to_json,
};
use studio_schedule::error::ScheduleError;
use studio_schedule::task::{DependencyAttrs, NewTask, ScheduleUnit, TimeLog};
use studio_schedule::{Resource, ResourceId, SchedulerConfig, TaskForest, TaskId, TaskNode};
use tempfile::tempdir;

fn at(d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
}

fn sample_forest() -> TaskForest {
    let mut forest = TaskForest::with_now(SchedulerConfig::default(), at(8, 12)).unwrap();
    let project = forest.add_project("Feature");
    let artist = forest
        .add_resource(Resource::new(ResourceId(3), "Artist"))
        .unwrap();
    forest.set_project_lead(project, Some(artist)).unwrap();

    let shot = forest.add_task(NewTask::new(project, "Shot")).unwrap();
    let anim = forest
        .add_task(
            NewTask::new(project, "Anim")
                .parent(shot)
                .schedule(2.0, ScheduleUnit::Day)
                .resources([artist]),
        )
        .unwrap();
    let comp = forest
        .add_task(
            NewTask::new(project, "Comp")
                .parent(shot)
                .schedule(4.0, ScheduleUnit::Hour),
        )
        .unwrap();
    forest
        .add_dependency(comp, anim, DependencyAttrs::default())
        .unwrap();
    forest
        .add_time_log(anim, TimeLog::new(artist, at(4, 9), at(4, 15)).unwrap())
        .unwrap();
    forest
        .set_computed(comp, at(11, 9), at(11, 13), Vec::new())
        .unwrap();
    forest
}

fn tasks(forest: &TaskForest) -> Vec<TaskNode> {
    forest.tasks().cloned().collect()
}

#[test]
fn json_round_trip_keeps_every_task() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("forest.json");
    let forest = sample_forest();

    save_forest_to_json(&forest, &path).unwrap();
    let loaded = load_forest_from_json(&path).unwrap();

    assert_eq!(tasks(&loaded), tasks(&forest));
    assert_eq!(loaded.scheduling_window(), forest.scheduling_window());
    assert_eq!(loaded.calendar(), forest.calendar());
    assert_eq!(
        loaded.project_totals(studio_schedule::ProjectId(1)).unwrap(),
        forest.project_totals(studio_schedule::ProjectId(1)).unwrap()
    );
    assert_eq!(loaded.responsible(TaskId(2)).unwrap(), Some(ResourceId(3)));
}

#[test]
fn json_store_reports_missing_file_as_empty() {
    let dir = tempdir().unwrap();
    let store = JsonForestStore::new(dir.path().join("absent.json"));
    assert!(store.load_forest().unwrap().is_none());

    store.save_forest(&sample_forest()).unwrap();
    let loaded = store.load_forest().unwrap().unwrap();
    assert_eq!(loaded.len(), 3);
}

#[test]
fn loaded_forest_continues_numbering_after_highest_id() {
    let mut snapshot = ForestSnapshot::from_forest(&sample_forest());
    snapshot.next_task_id = 1;
    snapshot.next_project_id = 1;
    let mut forest = snapshot.into_forest().unwrap();

    let project = forest.add_project("Next");
    assert_eq!(project.0, 2);
    let id = forest.add_task(NewTask::new(project, "Fresh")).unwrap();
    assert_eq!(id, TaskId(4));
}

#[test]
fn dangling_parent_is_invalid_data() {
    let mut snapshot = ForestSnapshot::from_forest(&sample_forest());
    snapshot.tasks.retain(|task| task.id() != TaskId(1));
    assert!(matches!(
        snapshot.into_forest(),
        Err(PersistenceError::InvalidData(_))
    ));
}

#[test]
fn unknown_resource_is_invalid_data() {
    let mut snapshot = ForestSnapshot::from_forest(&sample_forest());
    snapshot.resources.clear();
    assert!(matches!(
        snapshot.into_forest(),
        Err(PersistenceError::InvalidData(_))
    ));
}

#[test]
fn cyclic_snapshot_is_rejected() {
    let snapshot = ForestSnapshot::from_forest(&sample_forest());
    let mut value = serde_json::to_value(&snapshot).unwrap();
    // tasks are stored in id order: Shot, Anim, Comp
    let mut back_edge = value["tasks"][2]["dependency"]["depends_on"][0].clone();
    back_edge["depends_on"] = json!(3);
    value["tasks"][1]["dependency"]["depends_on"] = json!([back_edge]);

    let tampered: ForestSnapshot = serde_json::from_value(value).unwrap();
    assert!(matches!(
        tampered.into_forest(),
        Err(PersistenceError::Schedule(_))
    ));
}

#[test]
fn stored_calendar_is_validated_on_load() {
    let snapshot = ForestSnapshot::from_forest(&sample_forest());
    let value = serde_json::to_value(&snapshot).unwrap();

    let mut reversed = value.clone();
    reversed["calendar"]["days"][0] = json!([{ "start": 600, "end": 500 }]);
    let mut no_hours = value;
    no_hours["calendar"]["daily_working_hours"] = json!(0);

    for tampered in [reversed, no_hours] {
        let tampered: ForestSnapshot = serde_json::from_value(tampered).unwrap();
        assert!(matches!(
            tampered.into_forest(),
            Err(PersistenceError::Schedule(ScheduleError::Validation(_)))
        ));
    }
}

#[test]
fn empty_window_is_invalid_data() {
    let mut snapshot = ForestSnapshot::from_forest(&sample_forest());
    snapshot.window_end = snapshot.window_start;
    assert!(matches!(
        snapshot.into_forest(),
        Err(PersistenceError::InvalidData(_))
    ));
}

#[cfg(feature = "sqlite")]
mod sqlite {
    use super::*;
    use studio_schedule::persistence::SqliteForestStore;

    #[test]
    fn empty_database_loads_nothing() {
        let store = SqliteForestStore::in_memory().unwrap();
        assert!(store.load_forest().unwrap().is_none());
    }

    #[test]
    fn sqlite_round_trip_and_overwrite() {
        let dir = tempdir().unwrap();
        let store = SqliteForestStore::new(dir.path().join("forest.db")).unwrap();
        let mut forest = sample_forest();
        store.save_forest(&forest).unwrap();

        let loaded = store.load_forest().unwrap().unwrap();
        assert_eq!(tasks(&loaded), tasks(&forest));
        assert!(loaded.task(TaskId(3)).unwrap().is_scheduled());

        forest.remove_task(TaskId(3)).unwrap();
        store.save_forest(&forest).unwrap();
        let reloaded = store.load_forest().unwrap().unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.task(TaskId(3)).is_none());
    }
}
