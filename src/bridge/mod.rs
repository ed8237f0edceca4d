pub mod export;
pub mod process;
pub mod result;

pub use export::{STUDIO_TJP_ID, format_timing, render};
pub use process::{ProcessOutput, SchedulerProcess, Tj3Command};
pub use result::{ResultEntity, ResultRow, parse_report};

use crate::calculations::Aggregator;
use crate::config::SchedulerConfig;
use crate::error::ExternalSchedulerError;
use crate::forest::TaskForest;
use crate::task::{ProjectId, ResourceId, Schedulable, TaskId};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use tracing::{debug, info, instrument, warn};

pub const INPUT_FILE: &str = "schedule.tjp";
pub const DEFAULT_REPORT_NAME: &str = "schedule";

/// Counts of what one scheduling run wrote back into the forest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleRunSummary {
    pub tasks: usize,
    pub projects: usize,
}

/// Hands the forest to an out-of-process solver and writes its answer back.
pub trait ExternalSchedulerBridge {
    /// Solver input for the current forest state.
    fn export(&self, forest: &TaskForest) -> String;

    /// Runs the solver once and applies every result row, or none of them.
    fn run_and_apply(
        &self,
        forest: &mut TaskForest,
        process: &dyn SchedulerProcess,
    ) -> Result<ScheduleRunSummary, ExternalSchedulerError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskJugglerBridge {
    report_name: String,
    compute_resources: bool,
}

impl Default for TaskJugglerBridge {
    fn default() -> Self {
        Self {
            report_name: DEFAULT_REPORT_NAME.to_string(),
            compute_resources: false,
        }
    }
}

impl TaskJugglerBridge {
    pub fn new(compute_resources: bool) -> Self {
        Self {
            compute_resources,
            ..Self::default()
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.compute_resources)
    }

    pub fn with_report_name(mut self, name: impl Into<String>) -> Self {
        self.report_name = name.into();
        self
    }

    pub fn report_name(&self) -> &str {
        &self.report_name
    }

    pub fn compute_resources(&self) -> bool {
        self.compute_resources
    }

    fn report_file(&self) -> String {
        format!("{}.csv", self.report_name)
    }

    /// Matches one row to a forest entity without touching the forest.
    fn resolve_row(
        &self,
        forest: &TaskForest,
        row: ResultRow,
    ) -> Result<PendingResult, ExternalSchedulerError> {
        match row.entity {
            ResultEntity::Task(id) => {
                let Some(task) = forest.task(id) else {
                    return Err(ExternalSchedulerError::UnknownEntity(row.path));
                };
                let resources = if self.compute_resources {
                    row.resources
                        .into_iter()
                        .filter(|resource| {
                            task.resources().contains(resource)
                                || task.alternative_resources().contains(resource)
                        })
                        .collect()
                } else {
                    task.resources().to_vec()
                };
                Ok(PendingResult::Task {
                    id,
                    start: row.start,
                    end: row.end,
                    resources,
                })
            }
            ResultEntity::Project(id) => {
                if forest.project(id).is_none() {
                    return Err(ExternalSchedulerError::UnknownEntity(row.path));
                }
                Ok(PendingResult::Project {
                    id,
                    start: row.start,
                    end: row.end,
                })
            }
        }
    }
}

enum PendingResult {
    Task {
        id: TaskId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        resources: Vec<ResourceId>,
    },
    Project {
        id: ProjectId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl ExternalSchedulerBridge for TaskJugglerBridge {
    fn export(&self, forest: &TaskForest) -> String {
        render(forest, &self.report_name, self.compute_resources)
    }

    #[instrument(skip_all, fields(report = %self.report_name))]
    fn run_and_apply(
        &self,
        forest: &mut TaskForest,
        process: &dyn SchedulerProcess,
    ) -> Result<ScheduleRunSummary, ExternalSchedulerError> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join(INPUT_FILE);
        fs::write(&input, self.export(forest))?;
        debug!(input = %input.display(), "solver input written");

        let output = process.run(&input, scratch.path())?;
        if !output.is_success() {
            warn!(
                status = ?output.status_code,
                diagnostics = %output.diagnostics,
                "external scheduler failed"
            );
            return Err(ExternalSchedulerError::Process {
                status: output.status_code,
                diagnostics: output.diagnostics,
            });
        }

        let report = File::open(scratch.path().join(self.report_file()))?;
        let rows = parse_report(report, self.compute_resources)?;
        debug!(rows = rows.len(), "solver report parsed");
        let pending = rows
            .into_iter()
            .map(|row| self.resolve_row(forest, row))
            .collect::<Result<Vec<_>, _>>()?;

        let mut summary = ScheduleRunSummary::default();
        for result in pending {
            match result {
                PendingResult::Task {
                    id,
                    start,
                    end,
                    resources,
                } => {
                    if let Ok(task) = forest.task_mut(id) {
                        task.apply_computed_range(start, end);
                        task.schedule.computed_resources = resources;
                        forest.refresh_task(id);
                        summary.tasks += 1;
                    }
                }
                PendingResult::Project { id, start, end } => {
                    if let Some(project) = forest.project_entry_mut(id) {
                        project.apply_computed_range(start, end);
                        summary.projects += 1;
                    }
                }
            }
        }
        Aggregator::recompute_all(&mut forest.tasks);

        info!(
            tasks = summary.tasks,
            projects = summary.projects,
            "schedule applied"
        );
        Ok(summary)
    }
}
