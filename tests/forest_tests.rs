use chrono::{TimeZone, Utc};
use studio_schedule::error::ScheduleError;
use studio_schedule::task::{AllocationStrategy, NewTask, TaskId};
use studio_schedule::{
    ProjectId, Resource, ResourceId, SchedulerConfig, TaskForest, Vacation, WalkMode,
};

fn forest() -> (TaskForest, ProjectId) {
    let now = Utc.with_ymd_and_hms(2024, 3, 4, 10, 20, 0).unwrap();
    let mut forest = TaskForest::with_now(SchedulerConfig::default(), now).unwrap();
    let project = forest.add_project("Feature");
    (forest, project)
}

fn tree(forest: &mut TaskForest, project: ProjectId) -> [TaskId; 5] {
    let root = forest.add_task(NewTask::new(project, "Root")).unwrap();
    let a = forest
        .add_task(NewTask::new(project, "A").parent(root))
        .unwrap();
    let b = forest
        .add_task(NewTask::new(project, "B").parent(root))
        .unwrap();
    let a1 = forest
        .add_task(NewTask::new(project, "A1").parent(a))
        .unwrap();
    let a2 = forest
        .add_task(NewTask::new(project, "A2").parent(a))
        .unwrap();
    [root, a, b, a1, a2]
}

#[test]
fn new_forest_rounds_the_window_start() {
    let (forest, _) = forest();
    let (start, end) = forest.scheduling_window();
    assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 4, 10, 0, 0).unwrap());
    assert_eq!((end - start).num_days(), 730);
}

#[test]
fn window_must_not_be_empty() {
    let (mut forest, _) = forest();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert!(forest.set_scheduling_window(start, start).is_err());
    assert!(forest
        .set_scheduling_window(start, start + chrono::Duration::days(1))
        .is_ok());
}

#[test]
fn walks_visit_subtree_in_requested_order() {
    let (mut forest, project) = forest();
    let [root, a, b, a1, a2] = tree(&mut forest, project);

    assert_eq!(
        forest.walk_hierarchy(root, WalkMode::DepthFirst),
        vec![root, a, a1, a2, b]
    );
    assert_eq!(
        forest.walk_hierarchy(root, WalkMode::BreadthFirst),
        vec![root, a, b, a1, a2]
    );
    assert_eq!(forest.descendants(a), vec![a1, a2]);
    assert_eq!(forest.ancestors(a2), vec![a, root]);
    assert_eq!(forest.level(a2), 2);
    assert_eq!(forest.root_tasks(project), vec![root]);
}

#[test]
fn absolute_ids_prefix_project_and_ancestors() {
    let (mut forest, project) = forest();
    let [root, a, _, _, a2] = tree(&mut forest, project);
    assert_eq!(
        forest.tjp_abs_id(a2).unwrap(),
        format!("Project_{}.Task_{}.Task_{}.Task_{}", project, root, a, a2)
    );
    assert!(matches!(
        forest.tjp_abs_id(TaskId(999)),
        Err(ScheduleError::TaskNotFound(_))
    ));
}

#[test]
fn responsible_is_inherited_then_falls_back_to_lead() {
    let (mut forest, project) = forest();
    let [root, a, b, a1, _] = tree(&mut forest, project);
    let lead = forest.add_resource(Resource::new(ResourceId(1), "Lead")).unwrap();
    let sup = forest.add_resource(Resource::new(ResourceId(2), "Sup")).unwrap();

    assert_eq!(forest.responsible(a1).unwrap(), None);
    forest.set_project_lead(project, Some(lead)).unwrap();
    assert_eq!(forest.responsible(a1).unwrap(), Some(lead));

    forest.set_responsible(a, Some(sup)).unwrap();
    assert_eq!(forest.responsible(a1).unwrap(), Some(sup));
    assert_eq!(forest.responsible(b).unwrap(), Some(lead));
    assert_eq!(forest.responsible(root).unwrap(), Some(lead));
}

#[test]
fn unknown_references_are_rejected() {
    let (mut forest, project) = forest();
    assert!(matches!(
        forest.add_task(NewTask::new(ProjectId(42), "Lost")),
        Err(ScheduleError::ProjectNotFound(_))
    ));
    assert!(matches!(
        forest.add_task(NewTask::new(project, "Orphan").parent(TaskId(42))),
        Err(ScheduleError::TaskNotFound(_))
    ));
    assert!(matches!(
        forest.add_task(NewTask::new(project, "Nobody").resources([ResourceId(9)])),
        Err(ScheduleError::ResourceNotFound(_))
    ));
    assert!(forest.is_empty());
}

#[test]
fn resources_are_deduplicated_and_validated() {
    let (mut forest, project) = forest();
    let artist = forest.add_resource(Resource::new(ResourceId(1), "Artist")).unwrap();
    let backup = forest.add_resource(Resource::new(ResourceId(2), "Backup")).unwrap();
    let id = forest.add_task(NewTask::new(project, "Anim")).unwrap();

    forest.set_resources(id, vec![artist, artist]).unwrap();
    forest.set_alternative_resources(id, vec![backup]).unwrap();
    forest
        .set_allocation(id, AllocationStrategy::Order, false)
        .unwrap();

    let task = forest.task(id).unwrap();
    assert_eq!(task.resources(), &[artist]);
    assert_eq!(task.alternative_resources(), &[backup]);
    assert_eq!(task.allocation_strategy(), AllocationStrategy::Order);
    assert!(!task.persistent_allocation());

    assert!(matches!(
        forest.add_resource(Resource::new(ResourceId(1), "Clone")),
        Err(ScheduleError::Validation(_))
    ));
}

#[test]
fn resource_efficiency_and_vacation_are_validated() {
    assert!(Resource::new(ResourceId(1), "Zero").with_efficiency(0.0).is_err());
    assert!(Resource::new(ResourceId(1), "Nan").with_efficiency(f64::NAN).is_err());
    let start = Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap();
    assert!(Vacation::new(start, start).is_err());
    let resource = Resource::new(ResourceId(1), "Away")
        .with_efficiency(0.5)
        .unwrap()
        .with_vacation(Vacation::new(start, start + chrono::Duration::days(14)).unwrap());
    assert_eq!(resource.vacations().len(), 1);
    assert_eq!(resource.efficiency(), 0.5);
}

#[test]
fn computed_values_stay_separate_from_planned_ones() {
    let (mut forest, project) = forest();
    let artist = forest.add_resource(Resource::new(ResourceId(1), "Artist")).unwrap();
    let id = forest
        .add_task(NewTask::new(project, "Anim").resources([artist]))
        .unwrap();
    let task = forest.task(id).unwrap();
    assert!(!task.is_scheduled());
    assert_eq!(task.computed_resources(), &[artist]);

    let start = Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2024, 3, 11, 10, 0, 0).unwrap();
    assert!(forest.set_computed(id, end, start, vec![]).is_err());
    forest.set_computed(id, start, end, vec![]).unwrap();

    let task = forest.task(id).unwrap();
    assert!(task.is_scheduled());
    assert_eq!(task.schedule().computed_start(), Some(start));
    assert_eq!(task.schedule().start(), start);
    assert!(task.computed_resources().is_empty());

    forest.clear_computed(id).unwrap();
    assert!(!forest.task(id).unwrap().is_scheduled());
}

#[test]
fn inactive_projects_are_kept_but_flagged() {
    let (mut forest, project) = forest();
    forest.set_project_active(project, false).unwrap();
    assert!(!forest.project(project).unwrap().is_active());
    assert!(matches!(
        forest.set_project_active(ProjectId(77), true),
        Err(ScheduleError::ProjectNotFound(_))
    ));
}
