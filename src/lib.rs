pub mod bridge;
pub mod calculations;
pub mod calendar;
pub mod config;
pub mod error;
pub mod forest;
pub mod graph;
pub mod persistence;
pub mod report;
pub mod resource;
pub mod task;

pub use bridge::{ExternalSchedulerBridge, SchedulerProcess, TaskJugglerBridge};
pub use calculations::{Aggregator, ScheduleResolver};
pub use calendar::WorkingHoursCalendar;
pub use config::SchedulerConfig;
pub use error::{
    CircularDependencyError, ExternalSchedulerError, ScheduleError, ScheduleResult,
    ValidationError,
};
pub use forest::{TaskForest, WalkMode};
pub use graph::DependencyGraph;
pub use resource::{Project, Resource, Vacation};
pub use task::{NewTask, ProjectId, ResourceId, TaskDependency, TaskId, TaskNode};
