use crate::error::ExternalSchedulerError;
use crate::task::{ProjectId, ResourceId, TaskId};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::io::Read;

pub const RESULT_TIME_FORMAT: &str = "%Y-%m-%d-%H:%M";

/// Entity named by the last segment of a result id path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultEntity {
    Project(ProjectId),
    Task(TaskId),
}

/// One parsed row of the solver's task report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub path: String,
    pub entity: ResultEntity,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub resources: Vec<ResourceId>,
}

/// Parses a `;` separated report with a header row. Every row must parse or
/// the whole report is rejected.
pub fn parse_report<R: Read>(
    reader: R,
    read_resources: bool,
) -> Result<Vec<ResultRow>, ExternalSchedulerError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(index + 2);

        let path = record.get(0).unwrap_or("").trim();
        if path.is_empty() {
            continue;
        }
        let entity = parse_entity(path).map_err(|reason| ExternalSchedulerError::Parse {
            line,
            reason,
        })?;
        let start = parse_time(record.get(1).unwrap_or(""))
            .map_err(|reason| ExternalSchedulerError::Parse { line, reason })?;
        let end = parse_time(record.get(2).unwrap_or(""))
            .map_err(|reason| ExternalSchedulerError::Parse { line, reason })?;
        if end < start {
            return Err(ExternalSchedulerError::Parse {
                line,
                reason: format!("'{path}' ends before it starts"),
            });
        }
        let resources = if read_resources {
            parse_resources(record.get(3).unwrap_or(""))
                .map_err(|reason| ExternalSchedulerError::Parse { line, reason })?
        } else {
            Vec::new()
        };

        rows.push(ResultRow {
            path: path.to_string(),
            entity,
            start,
            end,
            resources,
        });
    }
    Ok(rows)
}

/// `Project_1.Task_3.Task_7` names task 7.
fn parse_entity(path: &str) -> Result<ResultEntity, String> {
    let segment = path.rsplit('.').next().unwrap_or(path);
    let (kind, number) = segment
        .rsplit_once('_')
        .ok_or_else(|| format!("id '{path}' has no numeric suffix"))?;
    let number: u32 = number
        .parse()
        .map_err(|_| format!("id '{path}' has no numeric suffix"))?;
    match kind {
        "Project" => Ok(ResultEntity::Project(ProjectId(number))),
        "Task" => Ok(ResultEntity::Task(TaskId(number))),
        _ => Err(format!("id '{path}' is neither a project nor a task")),
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(raw.trim(), RESULT_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|err| format!("bad timestamp '{raw}': {err}"))
}

/// Tokens look like `Jane Doe (User_12)`; the number after the last `_` is the id.
fn parse_resources(raw: &str) -> Result<Vec<ResourceId>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            let tail = token.rsplit('_').next().unwrap_or(token);
            let digits = tail.split(')').next().unwrap_or(tail).trim();
            digits
                .parse::<u32>()
                .map(ResourceId)
                .map_err(|_| format!("bad resource '{token}'"))
        })
        .collect()
}
