use crate::error::ValidationError;
use crate::task::{ProjectId, ResourceId, Schedulable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time a resource is unavailable for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vacation {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Vacation {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::new(
                "vacation.end",
                end,
                format!("must be after start {start}"),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    id: ResourceId,
    name: String,
    efficiency: f64,
    vacations: Vec<Vacation>,
}

impl Resource {
    pub fn new(id: ResourceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            efficiency: 1.0,
            vacations: Vec::new(),
        }
    }

    pub fn with_efficiency(mut self, efficiency: f64) -> Result<Self, ValidationError> {
        if !efficiency.is_finite() || efficiency <= 0.0 {
            return Err(ValidationError::new(
                "efficiency",
                efficiency,
                "must be a positive number",
            ));
        }
        self.efficiency = efficiency;
        Ok(self)
    }

    pub fn with_vacation(mut self, vacation: Vacation) -> Self {
        self.vacations.push(vacation);
        self
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn efficiency(&self) -> f64 {
        self.efficiency
    }

    pub fn vacations(&self) -> &[Vacation] {
        &self.vacations
    }
}

/// Top-level container of root tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub(crate) id: ProjectId,
    pub(crate) name: String,
    pub(crate) lead: Option<ResourceId>,
    pub(crate) active: bool,
    pub(crate) start: DateTime<Utc>,
    pub(crate) end: DateTime<Utc>,
    pub(crate) computed_start: Option<DateTime<Utc>>,
    pub(crate) computed_end: Option<DateTime<Utc>>,
}

impl Project {
    pub fn id(&self) -> ProjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lead(&self) -> Option<ResourceId> {
        self.lead
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn computed_start(&self) -> Option<DateTime<Utc>> {
        self.computed_start
    }

    pub fn computed_end(&self) -> Option<DateTime<Utc>> {
        self.computed_end
    }
}

impl Schedulable for Project {
    fn tjp_id(&self) -> String {
        self.id.tjp_id()
    }

    fn computed_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.computed_start.zip(self.computed_end)
    }

    fn apply_computed_range(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.computed_start = Some(start);
        self.computed_end = Some(end);
        self.start = start;
        self.end = end;
    }
}
