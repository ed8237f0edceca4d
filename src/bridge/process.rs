use crate::config::SchedulerConfig;
use crate::error::ExternalSchedulerError;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, instrument};

/// Exit status and captured diagnostics of one solver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status_code: Option<i32>,
    pub diagnostics: String,
}

impl ProcessOutput {
    pub fn success() -> Self {
        Self {
            status_code: Some(0),
            diagnostics: String::new(),
        }
    }

    pub fn failure(status_code: i32, diagnostics: impl Into<String>) -> Self {
        Self {
            status_code: Some(status_code),
            diagnostics: diagnostics.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == Some(0)
    }
}

/// Runs the external solver on `input`, writing its reports into `output_dir`.
/// Blocks until the solver exits.
pub trait SchedulerProcess {
    fn run(&self, input: &Path, output_dir: &Path) -> Result<ProcessOutput, ExternalSchedulerError>;
}

/// Invokes the TaskJuggler `tj3` executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tj3Command {
    program: String,
}

impl Tj3Command {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.tj_command.clone())
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SchedulerProcess for Tj3Command {
    #[instrument(skip(self), fields(program = %self.program))]
    fn run(&self, input: &Path, output_dir: &Path) -> Result<ProcessOutput, ExternalSchedulerError> {
        let output = Command::new(&self.program)
            .arg(input)
            .arg("-o")
            .arg(output_dir)
            .stdin(Stdio::null())
            .output()
            .map_err(ExternalSchedulerError::Launch)?;

        let diagnostics = String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .inspect(|line| debug!(target: "tj3", "{line}"))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ProcessOutput {
            status_code: output.status.code(),
            diagnostics,
        })
    }
}
