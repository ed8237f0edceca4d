use chrono::{DateTime, TimeZone, Utc};
use studio_schedule::calculations::ContainerTotals;
use studio_schedule::error::ScheduleError;
use studio_schedule::task::{NewTask, ScheduleConstraint, ScheduleModel, ScheduleUnit, TimeLog};
use studio_schedule::{ProjectId, Resource, ResourceId, SchedulerConfig, TaskForest, TaskId};

fn at(d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
}

fn forest() -> (TaskForest, ProjectId, ResourceId) {
    let mut forest = TaskForest::with_now(SchedulerConfig::default(), at(20, 12)).unwrap();
    let project = forest.add_project("Feature");
    let artist = forest
        .add_resource(Resource::new(ResourceId(1), "Artist"))
        .unwrap();
    (forest, project, artist)
}

fn leaf(
    forest: &mut TaskForest,
    project: ProjectId,
    parent: TaskId,
    name: &str,
    start: DateTime<Utc>,
) -> TaskId {
    forest
        .add_task(
            NewTask::new(project, name)
                .parent(parent)
                .constraint(ScheduleConstraint::Start)
                .starting_at(start)
                .schedule(9.0, ScheduleUnit::Hour),
        )
        .unwrap()
}

fn log(forest: &mut TaskForest, task: TaskId, resource: ResourceId, day: u32, hours: u32) {
    let entry = TimeLog::new(resource, at(day, 8), at(day, 8 + hours)).unwrap();
    forest.add_time_log(task, entry).unwrap();
}

fn assert_container_spans_children(forest: &TaskForest, container: TaskId) {
    let task = forest.task(container).unwrap();
    let children: Vec<_> = task
        .children()
        .iter()
        .map(|id| forest.task(*id).unwrap())
        .collect();
    let start = children.iter().map(|c| c.schedule().start()).min().unwrap();
    let end = children.iter().map(|c| c.schedule().end()).max().unwrap();
    assert_eq!(task.schedule().start(), start);
    assert_eq!(task.schedule().end(), end);
}

#[test]
fn container_logs_more_than_scheduled() {
    let (mut forest, project, artist) = forest();
    let shot = forest.add_task(NewTask::new(project, "Shot")).unwrap();
    let anim = leaf(&mut forest, project, shot, "Anim", at(4, 9));
    let light = leaf(&mut forest, project, shot, "Light", at(5, 9));

    log(&mut forest, anim, artist, 4, 8);
    log(&mut forest, light, artist, 5, 6);
    log(&mut forest, light, artist, 6, 6);

    let container = forest.task(shot).unwrap();
    assert_eq!(container.schedule().schedule_seconds(), 18 * 3600);
    assert_eq!(container.schedule().total_logged_seconds(), 20 * 3600);
    assert!((container.percent_complete() - 111.111).abs() < 0.01);
    assert_eq!(container.remaining_seconds(), -2 * 3600);
}

#[test]
fn container_range_follows_every_mutation() {
    let (mut forest, project, _) = forest();
    let shot = forest.add_task(NewTask::new(project, "Shot")).unwrap();
    let anim = leaf(&mut forest, project, shot, "Anim", at(4, 9));
    let light = leaf(&mut forest, project, shot, "Light", at(6, 9));

    assert_eq!(forest.task(shot).unwrap().schedule().start(), at(4, 9));
    assert_eq!(forest.task(shot).unwrap().schedule().end(), at(6, 18));

    forest.set_start(anim, at(2, 9)).unwrap();
    assert_container_spans_children(&forest, shot);
    assert_eq!(forest.task(shot).unwrap().schedule().start(), at(2, 9));

    forest.set_schedule_timing(light, 30.0).unwrap();
    assert_container_spans_children(&forest, shot);
    assert_eq!(
        forest.task(shot).unwrap().schedule().schedule_seconds(),
        39 * 3600
    );

    forest.remove_task(light).unwrap();
    assert_container_spans_children(&forest, shot);
    assert_eq!(forest.task(shot).unwrap().schedule().end(), at(2, 18));
}

#[test]
fn nested_containers_aggregate_upwards() {
    let (mut forest, project, artist) = forest();
    let sequence = forest.add_task(NewTask::new(project, "Sequence")).unwrap();
    let shot = forest
        .add_task(NewTask::new(project, "Shot").parent(sequence))
        .unwrap();
    let anim = leaf(&mut forest, project, shot, "Anim", at(4, 9));
    leaf(&mut forest, project, sequence, "Edit", at(8, 9));

    log(&mut forest, anim, artist, 4, 3);

    let top = forest.task(sequence).unwrap();
    assert_eq!(top.schedule().schedule_seconds(), 18 * 3600);
    assert_eq!(top.schedule().total_logged_seconds(), 3 * 3600);
    assert_eq!(top.schedule().start(), at(4, 9));
    assert_eq!(top.schedule().end(), at(8, 18));
    assert_container_spans_children(&forest, sequence);

    forest.set_start(anim, at(11, 9)).unwrap();
    assert_eq!(forest.task(shot).unwrap().schedule().end(), at(11, 18));
    assert_eq!(forest.task(sequence).unwrap().schedule().start(), at(8, 9));
    assert_eq!(forest.task(sequence).unwrap().schedule().end(), at(11, 18));
}

#[test]
fn moving_a_child_updates_both_containers() {
    let (mut forest, project, _) = forest();
    let first = forest.add_task(NewTask::new(project, "First")).unwrap();
    let second = forest.add_task(NewTask::new(project, "Second")).unwrap();
    leaf(&mut forest, project, first, "Early", at(4, 9));
    let late = leaf(&mut forest, project, first, "Late", at(7, 9));
    leaf(&mut forest, project, second, "Anchor", at(12, 9));

    forest.add_child(second, late).unwrap();

    assert_eq!(forest.task(first).unwrap().schedule().end(), at(4, 18));
    assert_eq!(forest.task(second).unwrap().schedule().start(), at(7, 9));
    assert_eq!(
        forest.task(second).unwrap().schedule().schedule_seconds(),
        18 * 3600
    );
}

#[test]
fn container_dates_and_resources_are_not_settable() {
    let (mut forest, project, artist) = forest();
    let shot = forest.add_task(NewTask::new(project, "Shot")).unwrap();
    leaf(&mut forest, project, shot, "Anim", at(4, 9));

    assert!(matches!(
        forest.set_start(shot, at(1, 9)),
        Err(ScheduleError::Validation(_))
    ));
    assert!(matches!(
        forest.set_resources(shot, vec![artist]),
        Err(ScheduleError::Validation(_))
    ));
    assert!(matches!(
        forest.set_schedule_timing(shot, 3.0),
        Err(ScheduleError::Validation(_))
    ));
    let entry = TimeLog::new(artist, at(4, 9), at(4, 10)).unwrap();
    assert!(matches!(
        forest.add_time_log(shot, entry),
        Err(ScheduleError::Validation(_))
    ));
}

#[test]
fn leaf_becoming_container_gives_up_resources() {
    let (mut forest, project, artist) = forest();
    let shot = forest
        .add_task(NewTask::new(project, "Shot").resources([artist]))
        .unwrap();
    assert_eq!(forest.task(shot).unwrap().resources(), &[artist]);

    leaf(&mut forest, project, shot, "Anim", at(4, 9));
    assert!(forest.task(shot).unwrap().resources().is_empty());
}

#[test]
fn task_with_time_logs_cannot_become_parent() {
    let (mut forest, project, artist) = forest();
    let logged = forest.add_task(NewTask::new(project, "Logged")).unwrap();
    log(&mut forest, logged, artist, 4, 2);
    let other = forest.add_task(NewTask::new(project, "Other")).unwrap();

    assert!(matches!(
        forest.add_task(NewTask::new(project, "Child").parent(logged)),
        Err(ScheduleError::Validation(_))
    ));
    assert!(matches!(
        forest.set_parent(other, Some(logged)),
        Err(ScheduleError::Validation(_))
    ));
}

#[test]
fn project_totals_sum_root_tasks() {
    let (mut forest, project, artist) = forest();
    let shot = forest.add_task(NewTask::new(project, "Shot")).unwrap();
    let anim = leaf(&mut forest, project, shot, "Anim", at(4, 9));
    let single = forest
        .add_task(NewTask::new(project, "Single").schedule(9.0, ScheduleUnit::Hour))
        .unwrap();
    log(&mut forest, anim, artist, 4, 9);
    log(&mut forest, single, artist, 5, 9);

    assert_eq!(
        forest.project_totals(project).unwrap(),
        (18 * 3600, 18 * 3600)
    );
    assert_eq!(forest.project_percent_complete(project).unwrap(), 100.0);
}

#[test]
fn zero_schedule_means_zero_percent() {
    let (mut forest, project, _) = forest();
    let milestone = forest
        .add_task(NewTask::new(project, "Delivery").milestone())
        .unwrap();
    assert_eq!(forest.percent_complete(milestone).unwrap(), 0.0);
}

#[test]
fn totals_of_no_children_are_empty() {
    assert!(ContainerTotals::from_children(std::iter::empty()).is_none());
}

#[test]
fn solver_range_refreshes_elapsed_time() {
    let (mut forest, project, _) = forest();
    let shot = forest.add_task(NewTask::new(project, "Shot")).unwrap();
    let review = forest
        .add_task(
            NewTask::new(project, "Review")
                .parent(shot)
                .model(ScheduleModel::Duration)
                .schedule(1.0, ScheduleUnit::Day),
        )
        .unwrap();
    assert_eq!(forest.task(review).unwrap().schedule().total_logged_seconds(), 0);

    forest
        .set_computed(review, at(1, 0), at(2, 0), Vec::new())
        .unwrap();

    assert_eq!(
        forest.task(review).unwrap().schedule().total_logged_seconds(),
        86_400
    );
    assert_eq!(
        forest.task(shot).unwrap().schedule().total_logged_seconds(),
        86_400
    );
}
