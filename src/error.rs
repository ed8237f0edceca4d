use crate::task::{ProjectId, ResourceId, TaskId};
use std::fmt;
use std::io;
use thiserror::Error;

/// A field value that failed validation. Raised before anything is mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{value}' for {field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub value: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, value: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    DependsOn,
    Parent,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::DependsOn => write!(f, "depend on"),
            Relation::Parent => write!(f, "be a child of"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task {task} cannot {relation} task {other}: it would create a circular dependency")]
pub struct CircularDependencyError {
    pub task: TaskId,
    pub other: TaskId,
    pub relation: Relation,
}

#[derive(Debug, Error)]
pub enum ExternalSchedulerError {
    #[error("could not launch external scheduler: {0}")]
    Launch(#[source] io::Error),
    #[error("external scheduler exited with status {status:?}: {diagnostics}")]
    Process {
        status: Option<i32>,
        diagnostics: String,
    },
    #[error("scheduler artifact io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed scheduler result at line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("scheduler result references unknown entity '{0}'")]
    UnknownEntity(String),
}

impl ExternalSchedulerError {
    /// Captured output of the failed run, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            ExternalSchedulerError::Process { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}

impl From<csv::Error> for ExternalSchedulerError {
    fn from(value: csv::Error) -> Self {
        let line = value
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or_default();
        ExternalSchedulerError::Parse {
            line,
            reason: value.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Circular(#[from] CircularDependencyError),
    #[error(transparent)]
    ExternalScheduler(#[from] ExternalSchedulerError),
    #[error("task {0} not found")]
    TaskNotFound(TaskId),
    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),
    #[error("resource {0} not found")]
    ResourceNotFound(ResourceId),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
