use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PRIORITY: u16 = 500;
pub const MAX_PRIORITY: u16 = 1000;

macro_rules! entity_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Identifier used for this entity in exported scheduler input.
            pub fn tjp_id(self) -> String {
                format!(concat!($prefix, "_{}"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(ProjectId, "Project");
entity_id!(TaskId, "Task");
entity_id!(ResourceId, "User");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleModel {
    #[default]
    Effort,
    Duration,
    Length,
}

impl ScheduleModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleModel::Effort => "effort",
            ScheduleModel::Duration => "duration",
            ScheduleModel::Length => "length",
        }
    }
}

impl FromStr for ScheduleModel {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "effort" => Ok(ScheduleModel::Effort),
            "duration" => Ok(ScheduleModel::Duration),
            "length" => Ok(ScheduleModel::Length),
            _ => Err(ValidationError::new(
                "schedule_model",
                value,
                "expected one of effort, duration, length",
            )),
        }
    }
}

/// Time unit of a schedule or gap timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ScheduleUnit {
    #[serde(rename = "min")]
    Minute,
    #[default]
    #[serde(rename = "h")]
    Hour,
    #[serde(rename = "d")]
    Day,
    #[serde(rename = "w")]
    Week,
    #[serde(rename = "m")]
    Month,
    #[serde(rename = "y")]
    Year,
}

impl ScheduleUnit {
    /// Units from the largest to the smallest.
    pub const DESCENDING: [ScheduleUnit; 6] = [
        ScheduleUnit::Year,
        ScheduleUnit::Month,
        ScheduleUnit::Week,
        ScheduleUnit::Day,
        ScheduleUnit::Hour,
        ScheduleUnit::Minute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleUnit::Minute => "min",
            ScheduleUnit::Hour => "h",
            ScheduleUnit::Day => "d",
            ScheduleUnit::Week => "w",
            ScheduleUnit::Month => "m",
            ScheduleUnit::Year => "y",
        }
    }
}

impl FromStr for ScheduleUnit {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        // short tokens are case sensitive: "m" is month, "min" is minute
        match value.trim() {
            "min" => return Ok(ScheduleUnit::Minute),
            "h" => return Ok(ScheduleUnit::Hour),
            "d" => return Ok(ScheduleUnit::Day),
            "w" => return Ok(ScheduleUnit::Week),
            "m" => return Ok(ScheduleUnit::Month),
            "y" => return Ok(ScheduleUnit::Year),
            _ => {}
        }
        match value.trim().to_ascii_lowercase().as_str() {
            "minute" => Ok(ScheduleUnit::Minute),
            "hour" => Ok(ScheduleUnit::Hour),
            "day" => Ok(ScheduleUnit::Day),
            "week" => Ok(ScheduleUnit::Week),
            "month" => Ok(ScheduleUnit::Month),
            "year" => Ok(ScheduleUnit::Year),
            _ => Err(ValidationError::new(
                "schedule_unit",
                value,
                "expected one of min, h, d, w, m, y",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleConstraint {
    #[default]
    None,
    Start,
    End,
    Both,
}

impl ScheduleConstraint {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleConstraint::None => "none",
            ScheduleConstraint::Start => "start",
            ScheduleConstraint::End => "end",
            ScheduleConstraint::Both => "both",
        }
    }

    pub fn pins_start(&self) -> bool {
        matches!(self, ScheduleConstraint::Start | ScheduleConstraint::Both)
    }

    pub fn pins_end(&self) -> bool {
        matches!(self, ScheduleConstraint::End | ScheduleConstraint::Both)
    }
}

impl FromStr for ScheduleConstraint {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(ScheduleConstraint::None),
            "start" => Ok(ScheduleConstraint::Start),
            "end" => Ok(ScheduleConstraint::End),
            "both" => Ok(ScheduleConstraint::Both),
            _ => Err(ValidationError::new(
                "schedule_constraint",
                value,
                "expected one of none, start, end, both",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyTarget {
    #[default]
    OnEnd,
    OnStart,
}

impl DependencyTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyTarget::OnEnd => "onend",
            DependencyTarget::OnStart => "onstart",
        }
    }
}

impl FromStr for DependencyTarget {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "onend" => Ok(DependencyTarget::OnEnd),
            "onstart" => Ok(DependencyTarget::OnStart),
            _ => Err(ValidationError::new(
                "dependency_target",
                value,
                "expected one of onend, onstart",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapModel {
    #[default]
    Length,
    Duration,
}

impl GapModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapModel::Length => "length",
            GapModel::Duration => "duration",
        }
    }
}

impl FromStr for GapModel {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "length" => Ok(GapModel::Length),
            "duration" => Ok(GapModel::Duration),
            _ => Err(ValidationError::new(
                "gap_model",
                value,
                "expected one of length, duration",
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStrategy {
    #[default]
    MinAllocated,
    MaxLoaded,
    MinLoaded,
    Order,
    Random,
}

impl AllocationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStrategy::MinAllocated => "minallocated",
            AllocationStrategy::MaxLoaded => "maxloaded",
            AllocationStrategy::MinLoaded => "minloaded",
            AllocationStrategy::Order => "order",
            AllocationStrategy::Random => "random",
        }
    }
}

impl FromStr for AllocationStrategy {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "minallocated" => Ok(AllocationStrategy::MinAllocated),
            "maxloaded" => Ok(AllocationStrategy::MaxLoaded),
            "minloaded" => Ok(AllocationStrategy::MinLoaded),
            "order" => Ok(AllocationStrategy::Order),
            "random" => Ok(AllocationStrategy::Random),
            _ => Err(ValidationError::new(
                "allocation_strategy",
                value,
                "expected one of minallocated, maxloaded, minloaded, order, random",
            )),
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(
    ScheduleModel,
    ScheduleUnit,
    ScheduleConstraint,
    DependencyTarget,
    GapModel,
    AllocationStrategy
);

/// Clamps a requested priority into `[0, 1000]`.
pub fn clamp_priority(priority: i64) -> u16 {
    priority.clamp(0, MAX_PRIORITY as i64) as u16
}

pub(crate) fn validate_timing(field: &'static str, timing: f64) -> Result<f64, ValidationError> {
    if !timing.is_finite() {
        return Err(ValidationError::new(field, timing, "must be a finite number"));
    }
    if timing < 0.0 {
        return Err(ValidationError::new(field, timing, "must not be negative"));
    }
    Ok(timing)
}

/// Attributes carried by a dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DependencyAttrs {
    pub target: DependencyTarget,
    pub gap_model: GapModel,
    pub gap_timing: f64,
    pub gap_unit: ScheduleUnit,
    pub gap_constraint: ScheduleConstraint,
}

impl Default for DependencyAttrs {
    fn default() -> Self {
        Self {
            target: DependencyTarget::OnEnd,
            gap_model: GapModel::Length,
            gap_timing: 0.0,
            gap_unit: ScheduleUnit::Hour,
            gap_constraint: ScheduleConstraint::None,
        }
    }
}

impl DependencyAttrs {
    pub fn on_start() -> Self {
        Self {
            target: DependencyTarget::OnStart,
            ..Self::default()
        }
    }

    pub fn with_gap(mut self, timing: f64, unit: ScheduleUnit, model: GapModel) -> Self {
        self.gap_timing = timing;
        self.gap_unit = unit;
        self.gap_model = model;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_timing("gap_timing", self.gap_timing).map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskDependency {
    pub depends_on: TaskId,
    pub attrs: DependencyAttrs,
}

impl TaskDependency {
    pub fn new(depends_on: TaskId) -> Self {
        Self {
            depends_on,
            attrs: DependencyAttrs::default(),
        }
    }

    pub fn with_attrs(depends_on: TaskId, attrs: DependencyAttrs) -> Self {
        Self { depends_on, attrs }
    }
}

/// Uninterrupted span of work a resource logged against a leaf task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLog {
    resource: ResourceId,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeLog {
    pub fn new(
        resource: ResourceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::new(
                "time_log.end",
                end,
                format!("must be after start {start}"),
            ));
        }
        Ok(Self {
            resource,
            start,
            end,
        })
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// Scheduling half of a task: user intent, solver answer and cached totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleInfo {
    pub(crate) model: ScheduleModel,
    pub(crate) timing: f64,
    pub(crate) unit: ScheduleUnit,
    pub(crate) constraint: ScheduleConstraint,
    pub(crate) bid_timing: f64,
    pub(crate) bid_unit: ScheduleUnit,
    pub(crate) priority: u16,
    pub(crate) is_milestone: bool,
    pub(crate) start: DateTime<Utc>,
    pub(crate) end: DateTime<Utc>,
    pub(crate) computed_start: Option<DateTime<Utc>>,
    pub(crate) computed_end: Option<DateTime<Utc>>,
    pub(crate) computed_resources: Vec<ResourceId>,
    pub(crate) schedule_seconds: i64,
    pub(crate) total_logged_seconds: i64,
}

impl ScheduleInfo {
    pub fn model(&self) -> ScheduleModel {
        self.model
    }

    pub fn timing(&self) -> f64 {
        self.timing
    }

    pub fn unit(&self) -> ScheduleUnit {
        self.unit
    }

    pub fn constraint(&self) -> ScheduleConstraint {
        self.constraint
    }

    pub fn bid_timing(&self) -> f64 {
        self.bid_timing
    }

    pub fn bid_unit(&self) -> ScheduleUnit {
        self.bid_unit
    }

    pub fn priority(&self) -> u16 {
        self.priority
    }

    pub fn is_milestone(&self) -> bool {
        self.is_milestone
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

    pub fn computed_resources(&self) -> &[ResourceId] {
        &self.computed_resources
    }

    pub fn schedule_seconds(&self) -> i64 {
        self.schedule_seconds
    }

    pub fn total_logged_seconds(&self) -> i64 {
        self.total_logged_seconds
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyInfo {
    pub(crate) depends_on: Vec<TaskDependency>,
}

impl DependencyInfo {
    pub fn edges(&self) -> &[TaskDependency] {
        &self.depends_on
    }

    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.depends_on.iter().map(|dep| dep.depends_on)
    }

    pub fn get(&self, target: TaskId) -> Option<&TaskDependency> {
        self.depends_on.iter().find(|dep| dep.depends_on == target)
    }

    pub fn contains(&self, target: TaskId) -> bool {
        self.get(target).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.depends_on.is_empty()
    }
}

/// Something the external scheduler assigns dates to.
pub trait Schedulable {
    fn tjp_id(&self) -> String;
    fn computed_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)>;
    fn apply_computed_range(&mut self, start: DateTime<Utc>, end: DateTime<Utc>);
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    pub(crate) id: TaskId,
    pub(crate) name: String,
    pub(crate) project: ProjectId,
    pub(crate) parent: Option<TaskId>,
    pub(crate) children: Vec<TaskId>,
    pub(crate) schedule: ScheduleInfo,
    pub(crate) dependency: DependencyInfo,
    pub(crate) responsible: Option<ResourceId>,
    pub(crate) resources: Vec<ResourceId>,
    pub(crate) alternative_resources: Vec<ResourceId>,
    pub(crate) allocation_strategy: AllocationStrategy,
    pub(crate) persistent_allocation: bool,
    pub(crate) time_logs: Vec<TimeLog>,
}

impl TaskNode {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project(&self) -> ProjectId {
        self.project
    }

    pub fn parent(&self) -> Option<TaskId> {
        self.parent
    }

    pub fn children(&self) -> &[TaskId] {
        &self.children
    }

    pub fn schedule(&self) -> &ScheduleInfo {
        &self.schedule
    }

    pub fn dependency(&self) -> &DependencyInfo {
        &self.dependency
    }

    pub fn depends_on(&self) -> &[TaskDependency] {
        self.dependency.edges()
    }

    /// Explicitly assigned responsible, without inheritance.
    pub fn own_responsible(&self) -> Option<ResourceId> {
        self.responsible
    }

    pub fn resources(&self) -> &[ResourceId] {
        &self.resources
    }

    pub fn alternative_resources(&self) -> &[ResourceId] {
        &self.alternative_resources
    }

    pub fn allocation_strategy(&self) -> AllocationStrategy {
        self.allocation_strategy
    }

    pub fn persistent_allocation(&self) -> bool {
        self.persistent_allocation
    }

    pub fn time_logs(&self) -> &[TimeLog] {
        &self.time_logs
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_container(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_scheduled(&self) -> bool {
        self.schedule.computed_start.is_some() && self.schedule.computed_end.is_some()
    }

    /// Solver-assigned resources; falls back to the planned ones until scheduled.
    pub fn computed_resources(&self) -> &[ResourceId] {
        if self.is_scheduled() {
            &self.schedule.computed_resources
        } else {
            &self.resources
        }
    }

    /// Logged over scheduled time as a percentage. Not clamped.
    pub fn percent_complete(&self) -> f64 {
        if self.schedule.schedule_seconds <= 0 {
            return 0.0;
        }
        self.schedule.total_logged_seconds as f64 / self.schedule.schedule_seconds as f64 * 100.0
    }

    pub fn remaining_seconds(&self) -> i64 {
        self.schedule.schedule_seconds - self.schedule.total_logged_seconds
    }
}

impl Schedulable for TaskNode {
    fn tjp_id(&self) -> String {
        self.id.tjp_id()
    }

    fn computed_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.schedule.computed_start.zip(self.schedule.computed_end)
    }

    fn apply_computed_range(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.schedule.computed_start = Some(start);
        self.schedule.computed_end = Some(end);
        // container dates stay derived from the children
        if self.is_leaf() {
            self.schedule.start = start;
            self.schedule.end = end;
        }
    }
}

/// Partial edit of a task's schedule fields, applied all at once.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScheduleUpdate {
    pub timing: Option<f64>,
    pub unit: Option<ScheduleUnit>,
    pub model: Option<ScheduleModel>,
    pub constraint: Option<ScheduleConstraint>,
}

impl ScheduleUpdate {
    /// Parses raw text values. Fails on the first invalid field.
    pub fn parse(
        timing: Option<&str>,
        unit: Option<&str>,
        model: Option<&str>,
        constraint: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let timing = timing
            .map(|raw| {
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| ValidationError::new("schedule_timing", raw, "must be a number"))
                    .and_then(|value| validate_timing("schedule_timing", value))
            })
            .transpose()?;
        Ok(Self {
            timing,
            unit: unit.map(str::parse).transpose()?,
            model: model.map(str::parse).transpose()?,
            constraint: constraint.map(str::parse).transpose()?,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(timing) = self.timing {
            validate_timing("schedule_timing", timing)?;
        }
        Ok(())
    }
}

/// Parameters for creating a task. Only `project` and `name` are required.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub project: ProjectId,
    pub name: String,
    pub parent: Option<TaskId>,
    pub schedule_model: ScheduleModel,
    pub schedule_timing: f64,
    pub schedule_unit: ScheduleUnit,
    pub schedule_constraint: ScheduleConstraint,
    pub bid_timing: Option<f64>,
    pub bid_unit: Option<ScheduleUnit>,
    pub priority: Option<i64>,
    pub is_milestone: bool,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub responsible: Option<ResourceId>,
    pub resources: Vec<ResourceId>,
    pub alternative_resources: Vec<ResourceId>,
    pub allocation_strategy: Option<AllocationStrategy>,
    pub persistent_allocation: Option<bool>,
    pub depends_on: Vec<TaskDependency>,
}

impl NewTask {
    pub fn new(project: ProjectId, name: impl Into<String>) -> Self {
        Self {
            project,
            name: name.into(),
            parent: None,
            schedule_model: ScheduleModel::Effort,
            schedule_timing: 1.0,
            schedule_unit: ScheduleUnit::Hour,
            schedule_constraint: ScheduleConstraint::None,
            bid_timing: None,
            bid_unit: None,
            priority: None,
            is_milestone: false,
            start: None,
            end: None,
            responsible: None,
            resources: Vec::new(),
            alternative_resources: Vec::new(),
            allocation_strategy: None,
            persistent_allocation: None,
            depends_on: Vec::new(),
        }
    }

    pub fn parent(mut self, parent: TaskId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn schedule(mut self, timing: f64, unit: ScheduleUnit) -> Self {
        self.schedule_timing = timing;
        self.schedule_unit = unit;
        self
    }

    pub fn model(mut self, model: ScheduleModel) -> Self {
        self.schedule_model = model;
        self
    }

    pub fn constraint(mut self, constraint: ScheduleConstraint) -> Self {
        self.schedule_constraint = constraint;
        self
    }

    pub fn bid(mut self, timing: f64, unit: ScheduleUnit) -> Self {
        self.bid_timing = Some(timing);
        self.bid_unit = Some(unit);
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn milestone(mut self) -> Self {
        self.is_milestone = true;
        self
    }

    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn ending_at(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn responsible(mut self, resource: ResourceId) -> Self {
        self.responsible = Some(resource);
        self
    }

    pub fn resources(mut self, resources: impl IntoIterator<Item = ResourceId>) -> Self {
        self.resources = resources.into_iter().collect();
        self
    }

    pub fn alternative_resources(
        mut self,
        resources: impl IntoIterator<Item = ResourceId>,
    ) -> Self {
        self.alternative_resources = resources.into_iter().collect();
        self
    }

    pub fn allocation(mut self, strategy: AllocationStrategy, persistent: bool) -> Self {
        self.allocation_strategy = Some(strategy);
        self.persistent_allocation = Some(persistent);
        self
    }

    pub fn depends_on(mut self, dependency: TaskDependency) -> Self {
        self.depends_on.push(dependency);
        self
    }
}
