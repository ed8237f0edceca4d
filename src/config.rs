use crate::calendar::{WorkingHoursCalendar, WorkingHoursConfig};
use crate::error::ValidationError;
use crate::task::{AllocationStrategy, DEFAULT_PRIORITY, MAX_PRIORITY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] io::Error),
    #[error("could not parse config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Scheduling defaults handed explicitly to a [`crate::TaskForest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub daily_working_hours: u8,
    pub working_hours: WorkingHoursConfig,
    pub utc_offset_minutes: i32,
    pub timing_resolution_minutes: u32,
    pub default_priority: u16,
    pub tj_command: String,
    pub compute_resources: bool,
    pub allocation_strategy: AllocationStrategy,
    pub persistent_allocation: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            daily_working_hours: 9,
            working_hours: WorkingHoursCalendar::default().to_config(),
            utc_offset_minutes: 0,
            timing_resolution_minutes: 60,
            default_priority: DEFAULT_PRIORITY,
            tj_command: "tj3".to_string(),
            compute_resources: false,
            allocation_strategy: AllocationStrategy::MinAllocated,
            persistent_allocation: true,
        }
    }
}

impl SchedulerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SchedulerConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.calendar()?;
        if self.timing_resolution_minutes == 0 {
            return Err(ValidationError::new(
                "timing_resolution_minutes",
                self.timing_resolution_minutes,
                "must be positive",
            ));
        }
        if self.default_priority > MAX_PRIORITY {
            return Err(ValidationError::new(
                "default_priority",
                self.default_priority,
                "must be in 0..=1000",
            ));
        }
        if self.tj_command.trim().is_empty() {
            return Err(ValidationError::new(
                "tj_command",
                &self.tj_command,
                "must name an executable",
            ));
        }
        Ok(())
    }

    /// Studio calendar described by this config.
    pub fn calendar(&self) -> Result<WorkingHoursCalendar, ValidationError> {
        let base = WorkingHoursCalendar::new(self.daily_working_hours, self.utc_offset_minutes)?;
        WorkingHoursCalendar::from_config(&self.working_hours, &base)
    }

    pub fn timing_resolution_seconds(&self) -> i64 {
        self.timing_resolution_minutes as i64 * 60
    }
}
