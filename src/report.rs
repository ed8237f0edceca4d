use crate::forest::TaskForest;
use chrono::{DateTime, Utc};
use polars::prelude::*;
use polars::prelude::PlSmallStr;

/// One row per task in id order, for reporting and export.
pub fn forest_dataframe(forest: &TaskForest) -> PolarsResult<DataFrame> {
    let tasks: Vec<_> = forest.tasks().collect();
    let mut columns: Vec<Column> = Vec::with_capacity(14);

    let ids: Vec<u32> = tasks.iter().map(|task| task.id().0).collect();
    columns.push(Series::new(PlSmallStr::from_static("id"), ids).into_column());

    let projects: Vec<u32> = tasks.iter().map(|task| task.project().0).collect();
    columns.push(Series::new(PlSmallStr::from_static("project_id"), projects).into_column());

    let parents: Vec<Option<u32>> = tasks
        .iter()
        .map(|task| task.parent().map(|parent| parent.0))
        .collect();
    columns.push(Series::new(PlSmallStr::from_static("parent_id"), parents).into_column());

    let names: Vec<&str> = tasks.iter().map(|task| task.name()).collect();
    columns.push(Series::new(PlSmallStr::from_static("name"), names).into_column());

    let levels: Vec<u32> = tasks
        .iter()
        .map(|task| forest.level(task.id()) as u32)
        .collect();
    columns.push(Series::new(PlSmallStr::from_static("level"), levels).into_column());

    let containers: Vec<bool> = tasks.iter().map(|task| task.is_container()).collect();
    columns.push(Series::new(PlSmallStr::from_static("is_container"), containers).into_column());

    let milestones: Vec<bool> = tasks
        .iter()
        .map(|task| task.schedule().is_milestone())
        .collect();
    columns.push(Series::new(PlSmallStr::from_static("is_milestone"), milestones).into_column());

    let starts: Vec<Option<i64>> = tasks
        .iter()
        .map(|task| Some(millis(task.schedule().start())))
        .collect();
    columns.push(datetime_series("start", starts)?.into_column());

    let ends: Vec<Option<i64>> = tasks
        .iter()
        .map(|task| Some(millis(task.schedule().end())))
        .collect();
    columns.push(datetime_series("end", ends)?.into_column());

    let computed_starts: Vec<Option<i64>> = tasks
        .iter()
        .map(|task| task.schedule().computed_start().map(millis))
        .collect();
    columns.push(datetime_series("computed_start", computed_starts)?.into_column());

    let computed_ends: Vec<Option<i64>> = tasks
        .iter()
        .map(|task| task.schedule().computed_end().map(millis))
        .collect();
    columns.push(datetime_series("computed_end", computed_ends)?.into_column());

    let scheduled: Vec<i64> = tasks
        .iter()
        .map(|task| task.schedule().schedule_seconds())
        .collect();
    columns.push(Series::new(PlSmallStr::from_static("schedule_seconds"), scheduled).into_column());

    let logged: Vec<i64> = tasks
        .iter()
        .map(|task| task.schedule().total_logged_seconds())
        .collect();
    columns.push(
        Series::new(PlSmallStr::from_static("total_logged_seconds"), logged).into_column(),
    );

    let percent: Vec<f64> = tasks.iter().map(|task| task.percent_complete()).collect();
    columns.push(Series::new(PlSmallStr::from_static("percent_complete"), percent).into_column());

    DataFrame::new(columns)
}

fn millis(timestamp: DateTime<Utc>) -> i64 {
    timestamp.timestamp_millis()
}

fn datetime_series(name: &'static str, values: Vec<Option<i64>>) -> PolarsResult<Series> {
    Series::new(PlSmallStr::from_static(name), values)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
}
