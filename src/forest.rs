use crate::calculations::{Aggregator, ScheduleResolver};
use crate::calendar::WorkingHoursCalendar;
use crate::config::SchedulerConfig;
use crate::error::{
    CircularDependencyError, Relation, ScheduleError, ScheduleResult, ValidationError,
};
use crate::graph::dependency_graph::{check_proposal, Proposal};
use crate::resource::{Project, Resource};
use crate::task::{
    clamp_priority, validate_timing, AllocationStrategy, DependencyInfo, NewTask, ProjectId,
    ResourceId, Schedulable, ScheduleConstraint, ScheduleInfo, ScheduleModel, ScheduleUnit,
    ScheduleUpdate, TaskDependency, TaskId, TaskNode, TimeLog,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{debug, instrument, warn};

const DEFAULT_WINDOW_DAYS: i64 = 730;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    DepthFirst,
    BreadthFirst,
}

/// Arena holding every project, task and resource of a studio.
///
/// Tasks refer to each other only by [`TaskId`]. Every mutation validates
/// first and then recomputes the touched task and its ancestor chain before
/// returning.
#[derive(Debug, Clone)]
pub struct TaskForest {
    pub(crate) config: SchedulerConfig,
    pub(crate) calendar: WorkingHoursCalendar,
    pub(crate) now: DateTime<Utc>,
    pub(crate) window_start: DateTime<Utc>,
    pub(crate) window_end: DateTime<Utc>,
    pub(crate) projects: BTreeMap<ProjectId, Project>,
    pub(crate) tasks: BTreeMap<TaskId, TaskNode>,
    pub(crate) resources: BTreeMap<ResourceId, Resource>,
    pub(crate) next_project_id: u32,
    pub(crate) next_task_id: u32,
}

impl TaskForest {
    pub fn new(config: SchedulerConfig) -> Result<Self, ValidationError> {
        Self::with_now(config, Utc::now())
    }

    /// Forest whose notion of the current time is `now`.
    pub fn with_now(config: SchedulerConfig, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        config.validate()?;
        let calendar = config.calendar()?;
        let mut forest = Self {
            config,
            calendar,
            now,
            window_start: now,
            window_end: now,
            projects: BTreeMap::new(),
            tasks: BTreeMap::new(),
            resources: BTreeMap::new(),
            next_project_id: 1,
            next_task_id: 1,
        };
        let start = forest.resolver().round_time(now);
        forest.window_start = start;
        forest.window_end = start
            .checked_add_signed(Duration::days(DEFAULT_WINDOW_DAYS))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Ok(forest)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn calendar(&self) -> &WorkingHoursCalendar {
        &self.calendar
    }

    pub fn resolver(&self) -> ScheduleResolver<'_> {
        ScheduleResolver::new(&self.calendar, self.config.timing_resolution_seconds())
    }

    /// Replaces the studio calendar and recomputes every task. Rejected when
    /// an unscheduled leaf could no longer be placed on a date.
    pub fn set_calendar(&mut self, calendar: WorkingHoursCalendar) -> Result<(), ValidationError> {
        let resolver = ScheduleResolver::new(&calendar, self.config.timing_resolution_seconds());
        for task in self
            .tasks
            .values()
            .filter(|task| task.is_leaf() && !task.is_scheduled())
        {
            resolver.resolve(&mut task.schedule.clone())?;
        }
        self.calendar = calendar;
        self.recompute_all(true);
        Ok(())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Moves the clock used for elapsed-time progress and recomputes.
    pub fn set_now(&mut self, now: DateTime<Utc>) {
        self.now = now;
        self.recompute_all(false);
    }

    pub fn scheduling_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.window_start, self.window_end)
    }

    pub fn set_scheduling_window(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        if end <= start {
            return Err(ValidationError::new(
                "scheduling_window.end",
                end,
                format!("must be after start {start}"),
            ));
        }
        self.window_start = start;
        self.window_end = end;
        Ok(())
    }

    // ---- projects and resources ----

    pub fn add_project(&mut self, name: impl Into<String>) -> ProjectId {
        let id = ProjectId(self.next_project_id);
        self.next_project_id += 1;
        self.projects.insert(
            id,
            Project {
                id,
                name: name.into(),
                lead: None,
                active: true,
                start: self.window_start,
                end: self.window_end,
                computed_start: None,
                computed_end: None,
            },
        );
        id
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(&id)
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn set_project_lead(
        &mut self,
        id: ProjectId,
        lead: Option<ResourceId>,
    ) -> ScheduleResult<()> {
        if let Some(lead) = lead {
            self.require_resource(lead)?;
        }
        self.project_mut(id)?.lead = lead;
        Ok(())
    }

    pub fn set_project_active(&mut self, id: ProjectId, active: bool) -> ScheduleResult<()> {
        self.project_mut(id)?.active = active;
        Ok(())
    }

    pub fn add_resource(&mut self, resource: Resource) -> ScheduleResult<ResourceId> {
        let id = resource.id();
        if self.resources.contains_key(&id) {
            return Err(ValidationError::new("resource.id", id, "already registered").into());
        }
        self.resources.insert(id, resource);
        Ok(id)
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(&id)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    // ---- task creation and removal ----

    #[instrument(skip(self, new), fields(project = %new.project, name = %new.name))]
    pub fn add_task(&mut self, new: NewTask) -> ScheduleResult<TaskId> {
        self.require_project(new.project)?;
        validate_timing("schedule_timing", new.schedule_timing)?;
        if let Some(bid) = new.bid_timing {
            validate_timing("bid_timing", bid)?;
        }
        if let Some(parent) = new.parent {
            let parent_task = self.get(parent)?;
            if parent_task.project != new.project {
                return Err(ValidationError::new(
                    "parent",
                    parent,
                    format!("belongs to project {}", parent_task.project),
                )
                .into());
            }
            if !parent_task.time_logs.is_empty() {
                return Err(ValidationError::new(
                    "parent",
                    parent,
                    "task has time logs and cannot become a container",
                )
                .into());
            }
        }
        if let Some(responsible) = new.responsible {
            self.require_resource(responsible)?;
        }
        for resource in new.resources.iter().chain(&new.alternative_resources) {
            self.require_resource(*resource)?;
        }
        let resources = if new.is_milestone && !new.resources.is_empty() {
            debug!(resources = ?new.resources, "milestone resources dropped");
            Vec::new()
        } else {
            dedup(new.resources)
        };
        if let (Some(start), Some(end)) = (new.start, new.end) {
            if end < start {
                return Err(ValidationError::new(
                    "end",
                    end,
                    format!("must not be before start {start}"),
                )
                .into());
            }
        }
        let depends_on = self.checked_dependency_list(&new.depends_on)?;

        let id = TaskId(self.next_task_id);
        if !depends_on.is_empty() {
            let proposal = Proposal {
                added: depends_on.iter().map(|dep| (id, *dep)).collect(),
                inserted: Some((id, new.parent)),
                ..Proposal::default()
            };
            let first = depends_on[0].depends_on;
            check_proposal(
                self,
                &proposal,
                &[id],
                CircularDependencyError {
                    task: id,
                    other: first,
                    relation: Relation::DependsOn,
                },
            )?;
        }

        let resolver = self.resolver();
        let start = new
            .start
            .or(new.end)
            .unwrap_or_else(|| resolver.round_time(self.now));
        let end = new.end.unwrap_or(start);
        let mut schedule = ScheduleInfo {
            model: new.schedule_model,
            timing: new.schedule_timing,
            unit: new.schedule_unit,
            constraint: new.schedule_constraint,
            bid_timing: new.bid_timing.unwrap_or(new.schedule_timing),
            bid_unit: new.bid_unit.unwrap_or(new.schedule_unit),
            priority: new
                .priority
                .map(clamp_priority)
                .unwrap_or(self.config.default_priority),
            is_milestone: new.is_milestone,
            start,
            end,
            computed_start: None,
            computed_end: None,
            computed_resources: Vec::new(),
            schedule_seconds: 0,
            total_logged_seconds: 0,
        };
        resolver.resolve(&mut schedule)?;

        let task = TaskNode {
            id,
            name: new.name,
            project: new.project,
            parent: new.parent,
            children: Vec::new(),
            schedule,
            dependency: DependencyInfo { depends_on },
            responsible: new.responsible,
            resources,
            alternative_resources: dedup(new.alternative_resources),
            allocation_strategy: new
                .allocation_strategy
                .unwrap_or(self.config.allocation_strategy),
            persistent_allocation: new
                .persistent_allocation
                .unwrap_or(self.config.persistent_allocation),
            time_logs: Vec::new(),
        };

        self.next_task_id += 1;
        self.tasks.insert(id, task);
        if let Some(parent) = new.parent {
            self.attach_child(parent, id);
        }
        self.refresh_task(id);
        self.propagate(new.parent);
        debug!(task = %id, "task added");
        Ok(id)
    }

    /// Removes the task with its whole subtree and every dependency on it.
    #[instrument(skip(self))]
    pub fn remove_task(&mut self, id: TaskId) -> ScheduleResult<Vec<TaskId>> {
        let parent = self.get(id)?.parent;
        let mut removed = vec![id];
        removed.extend(self.descendants(id));
        let gone: HashSet<TaskId> = removed.iter().copied().collect();

        for task_id in &removed {
            self.tasks.remove(task_id);
        }
        for task in self.tasks.values_mut() {
            task.dependency
                .depends_on
                .retain(|dep| !gone.contains(&dep.depends_on));
        }
        if let Some(parent) = parent {
            self.detach_child(parent, id);
        }
        self.propagate(parent);
        debug!(task = %id, removed = removed.len(), "task removed");
        Ok(removed)
    }

    // ---- schedule fields ----

    /// Applies every present field of `update` or none of them.
    #[instrument(skip(self))]
    pub fn update_schedule(&mut self, id: TaskId, update: ScheduleUpdate) -> ScheduleResult<()> {
        update.validate()?;
        let task = self.get(id)?;
        if task.is_container() {
            return Err(ValidationError::new(
                "schedule",
                id,
                "container schedules are derived from their children",
            )
            .into());
        }
        let mut schedule = task.schedule.clone();
        if let Some(timing) = update.timing {
            schedule.timing = timing;
        }
        if let Some(unit) = update.unit {
            schedule.unit = unit;
        }
        if let Some(model) = update.model {
            schedule.model = model;
        }
        if let Some(constraint) = update.constraint {
            schedule.constraint = constraint;
        }
        self.store_resolved(id, schedule)
    }

    pub fn set_schedule_timing(&mut self, id: TaskId, timing: f64) -> ScheduleResult<()> {
        self.update_schedule(
            id,
            ScheduleUpdate {
                timing: Some(timing),
                ..ScheduleUpdate::default()
            },
        )
    }

    pub fn set_schedule_unit(&mut self, id: TaskId, unit: ScheduleUnit) -> ScheduleResult<()> {
        self.update_schedule(
            id,
            ScheduleUpdate {
                unit: Some(unit),
                ..ScheduleUpdate::default()
            },
        )
    }

    pub fn set_schedule_model(&mut self, id: TaskId, model: ScheduleModel) -> ScheduleResult<()> {
        self.update_schedule(
            id,
            ScheduleUpdate {
                model: Some(model),
                ..ScheduleUpdate::default()
            },
        )
    }

    pub fn set_schedule_constraint(
        &mut self,
        id: TaskId,
        constraint: ScheduleConstraint,
    ) -> ScheduleResult<()> {
        self.update_schedule(
            id,
            ScheduleUpdate {
                constraint: Some(constraint),
                ..ScheduleUpdate::default()
            },
        )
    }

    pub fn set_bid(&mut self, id: TaskId, timing: f64, unit: ScheduleUnit) -> ScheduleResult<()> {
        validate_timing("bid_timing", timing)?;
        let task = self.task_mut(id)?;
        task.schedule.bid_timing = timing;
        task.schedule.bid_unit = unit;
        Ok(())
    }

    /// Sets a leaf's start. The end follows unless the end is pinned.
    pub fn set_start(&mut self, id: TaskId, start: DateTime<Utc>) -> ScheduleResult<()> {
        let task = self.get(id)?;
        Self::require_settable_dates(task, "start")?;
        let constraint = task.schedule.constraint;
        if constraint == ScheduleConstraint::End {
            return Err(ValidationError::new(
                "start",
                start,
                "start is derived from the end under constraint 'end'",
            )
            .into());
        }
        if constraint == ScheduleConstraint::Both && start > task.schedule.end {
            return Err(ValidationError::new(
                "start",
                start,
                format!("must not be after end {}", task.schedule.end),
            )
            .into());
        }
        let mut schedule = task.schedule.clone();
        schedule.start = start;
        self.store_resolved(id, schedule)
    }

    /// Sets a leaf's end. Only allowed when the end is pinned.
    pub fn set_end(&mut self, id: TaskId, end: DateTime<Utc>) -> ScheduleResult<()> {
        let task = self.get(id)?;
        Self::require_settable_dates(task, "end")?;
        let constraint = task.schedule.constraint;
        if !constraint.pins_end() {
            return Err(ValidationError::new(
                "end",
                end,
                format!("end is derived from the start under constraint '{constraint}'"),
            )
            .into());
        }
        if constraint == ScheduleConstraint::Both && end < task.schedule.start {
            return Err(ValidationError::new(
                "end",
                end,
                format!("must not be before start {}", task.schedule.start),
            )
            .into());
        }
        let mut schedule = task.schedule.clone();
        schedule.end = end;
        self.store_resolved(id, schedule)
    }

    pub fn set_priority(&mut self, id: TaskId, priority: i64) -> ScheduleResult<u16> {
        let clamped = clamp_priority(priority);
        self.task_mut(id)?.schedule.priority = clamped;
        Ok(clamped)
    }

    /// Marking a milestone drops its resources and zeroes its schedule.
    pub fn set_milestone(&mut self, id: TaskId, is_milestone: bool) -> ScheduleResult<()> {
        let task = self.get(id)?;
        Self::require_settable_dates(task, "is_milestone")?;
        let mut schedule = task.schedule.clone();
        schedule.is_milestone = is_milestone;
        self.store_resolved(id, schedule)?;
        if is_milestone {
            self.task_mut(id)?.resources.clear();
        }
        Ok(())
    }

    // ---- people ----

    pub fn set_resources(&mut self, id: TaskId, resources: Vec<ResourceId>) -> ScheduleResult<()> {
        let task = self.get(id)?;
        if task.is_container() && !resources.is_empty() {
            return Err(ValidationError::new(
                "resources",
                format!("{resources:?}"),
                "container tasks cannot hold resources",
            )
            .into());
        }
        let is_milestone = task.schedule.is_milestone;
        for resource in &resources {
            self.require_resource(*resource)?;
        }
        let resources = if is_milestone && !resources.is_empty() {
            debug!(task = %id, ?resources, "milestone resources dropped");
            Vec::new()
        } else {
            dedup(resources)
        };
        self.task_mut(id)?.resources = resources;
        Ok(())
    }

    pub fn set_alternative_resources(
        &mut self,
        id: TaskId,
        resources: Vec<ResourceId>,
    ) -> ScheduleResult<()> {
        if self.get(id)?.is_container() && !resources.is_empty() {
            return Err(ValidationError::new(
                "alternative_resources",
                format!("{resources:?}"),
                "container tasks cannot hold resources",
            )
            .into());
        }
        for resource in &resources {
            self.require_resource(*resource)?;
        }
        self.task_mut(id)?.alternative_resources = dedup(resources);
        Ok(())
    }

    pub fn set_allocation(
        &mut self,
        id: TaskId,
        strategy: AllocationStrategy,
        persistent: bool,
    ) -> ScheduleResult<()> {
        let task = self.task_mut(id)?;
        task.allocation_strategy = strategy;
        task.persistent_allocation = persistent;
        Ok(())
    }

    pub fn set_responsible(
        &mut self,
        id: TaskId,
        responsible: Option<ResourceId>,
    ) -> ScheduleResult<()> {
        if let Some(resource) = responsible {
            self.require_resource(resource)?;
        }
        self.task_mut(id)?.responsible = responsible;
        Ok(())
    }

    /// Own responsible, else the nearest ancestor's, else the project lead.
    pub fn responsible(&self, id: TaskId) -> ScheduleResult<Option<ResourceId>> {
        let task = self.get(id)?;
        if let Some(own) = task.responsible {
            return Ok(Some(own));
        }
        for ancestor in self.ancestors(id) {
            if let Some(inherited) = self.tasks.get(&ancestor).and_then(|t| t.responsible) {
                return Ok(Some(inherited));
            }
        }
        Ok(self.projects.get(&task.project).and_then(|p| p.lead))
    }

    #[instrument(skip(self, log), fields(resource = %log.resource()))]
    pub fn add_time_log(&mut self, id: TaskId, log: TimeLog) -> ScheduleResult<()> {
        self.require_resource(log.resource())?;
        if self.get(id)?.is_container() {
            return Err(ValidationError::new(
                "time_log.task",
                id,
                "time can only be logged on leaf tasks",
            )
            .into());
        }
        self.task_mut(id)?.time_logs.push(log);
        self.refresh_and_propagate(id);
        Ok(())
    }

    // ---- solver results ----

    /// Stores the solver's answer. Leaves also take it as their nominal range.
    pub fn set_computed(
        &mut self,
        id: TaskId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        resources: Vec<ResourceId>,
    ) -> ScheduleResult<()> {
        if end < start {
            return Err(ValidationError::new(
                "computed_end",
                end,
                format!("must not be before computed start {start}"),
            )
            .into());
        }
        let task = self.task_mut(id)?;
        task.apply_computed_range(start, end);
        task.schedule.computed_resources = resources;
        self.refresh_and_propagate(id);
        Ok(())
    }

    pub fn clear_computed(&mut self, id: TaskId) -> ScheduleResult<()> {
        let task = self.task_mut(id)?;
        task.schedule.computed_start = None;
        task.schedule.computed_end = None;
        task.schedule.computed_resources.clear();
        Ok(())
    }

    // ---- queries ----

    pub fn task(&self, id: TaskId) -> Option<&TaskNode> {
        self.tasks.get(&id)
    }

    pub fn get(&self, id: TaskId) -> ScheduleResult<&TaskNode> {
        self.tasks.get(&id).ok_or(ScheduleError::TaskNotFound(id))
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn root_tasks(&self, project: ProjectId) -> Vec<TaskId> {
        self.tasks
            .values()
            .filter(|task| task.project == project && task.is_root())
            .map(|task| task.id)
            .collect()
    }

    /// Parent chain, nearest first.
    pub fn ancestors(&self, id: TaskId) -> Vec<TaskId> {
        let mut chain = Vec::new();
        let mut current = self.tasks.get(&id).and_then(|task| task.parent);
        while let Some(parent) = current {
            if chain.contains(&parent) || chain.len() > self.tasks.len() {
                break;
            }
            chain.push(parent);
            current = self.tasks.get(&parent).and_then(|task| task.parent);
        }
        chain
    }

    pub fn descendants(&self, id: TaskId) -> Vec<TaskId> {
        self.walk_hierarchy(id, WalkMode::BreadthFirst)
            .into_iter()
            .skip(1)
            .collect()
    }

    /// The task itself followed by its subtree in the requested order.
    pub fn walk_hierarchy(&self, id: TaskId, mode: WalkMode) -> Vec<TaskId> {
        let mut order = Vec::new();
        if !self.tasks.contains_key(&id) {
            return order;
        }
        let mut seen = HashSet::new();
        let mut pending = VecDeque::from([id]);
        while let Some(next) = match mode {
            WalkMode::DepthFirst => pending.pop_back(),
            WalkMode::BreadthFirst => pending.pop_front(),
        } {
            if !seen.insert(next) {
                continue;
            }
            order.push(next);
            if let Some(task) = self.tasks.get(&next) {
                match mode {
                    WalkMode::DepthFirst => pending.extend(task.children.iter().rev()),
                    WalkMode::BreadthFirst => pending.extend(task.children.iter()),
                }
            }
        }
        order
    }

    /// Depth below the project, roots are level 0.
    pub fn level(&self, id: TaskId) -> usize {
        self.ancestors(id).len()
    }

    /// Dotted scheduler path such as `Project_1.Task_3.Task_7`.
    pub fn tjp_abs_id(&self, id: TaskId) -> ScheduleResult<String> {
        let task = self.get(id)?;
        let mut segments: Vec<String> = self
            .ancestors(id)
            .into_iter()
            .rev()
            .map(TaskId::tjp_id)
            .collect();
        segments.insert(0, task.project.tjp_id());
        segments.push(id.tjp_id());
        Ok(segments.join("."))
    }

    pub fn percent_complete(&self, id: TaskId) -> ScheduleResult<f64> {
        Ok(self.get(id)?.percent_complete())
    }

    /// `(schedule_seconds, total_logged_seconds)` summed over a project's roots.
    pub fn project_totals(&self, project: ProjectId) -> ScheduleResult<(i64, i64)> {
        self.require_project(project)?;
        Ok(self
            .root_tasks(project)
            .into_iter()
            .filter_map(|id| self.tasks.get(&id))
            .fold((0, 0), |(scheduled, logged), task| {
                (
                    scheduled + task.schedule.schedule_seconds,
                    logged + task.schedule.total_logged_seconds,
                )
            }))
    }

    pub fn project_percent_complete(&self, project: ProjectId) -> ScheduleResult<f64> {
        let (scheduled, logged) = self.project_totals(project)?;
        if scheduled <= 0 {
            return Ok(0.0);
        }
        Ok(logged as f64 / scheduled as f64 * 100.0)
    }

    // ---- internals ----

    pub(crate) fn task_mut(&mut self, id: TaskId) -> ScheduleResult<&mut TaskNode> {
        self.tasks.get_mut(&id).ok_or(ScheduleError::TaskNotFound(id))
    }

    fn project_mut(&mut self, id: ProjectId) -> ScheduleResult<&mut Project> {
        self.projects
            .get_mut(&id)
            .ok_or(ScheduleError::ProjectNotFound(id))
    }

    pub(crate) fn project_entry_mut(&mut self, id: ProjectId) -> Option<&mut Project> {
        self.projects.get_mut(&id)
    }

    pub(crate) fn require_project(&self, id: ProjectId) -> ScheduleResult<()> {
        if self.projects.contains_key(&id) {
            Ok(())
        } else {
            Err(ScheduleError::ProjectNotFound(id))
        }
    }

    pub(crate) fn require_resource(&self, id: ResourceId) -> ScheduleResult<()> {
        if self.resources.contains_key(&id) {
            Ok(())
        } else {
            Err(ScheduleError::ResourceNotFound(id))
        }
    }

    fn require_settable_dates(task: &TaskNode, field: &'static str) -> Result<(), ValidationError> {
        if task.is_container() {
            return Err(ValidationError::new(
                field,
                task.id,
                "container dates are derived from their children",
            ));
        }
        Ok(())
    }

    /// Validates dependency targets and attrs, collapsing repeated targets.
    pub(crate) fn checked_dependency_list(
        &self,
        deps: &[TaskDependency],
    ) -> ScheduleResult<Vec<TaskDependency>> {
        let mut checked: Vec<TaskDependency> = Vec::with_capacity(deps.len());
        for dep in deps {
            self.get(dep.depends_on)?;
            dep.attrs.validate()?;
            if let Some(existing) = checked
                .iter_mut()
                .find(|seen| seen.depends_on == dep.depends_on)
            {
                existing.attrs = dep.attrs;
            } else {
                checked.push(*dep);
            }
        }
        Ok(checked)
    }

    /// Links `child` under `parent`. A leaf turning into a container gives
    /// up its resources.
    pub(crate) fn attach_child(&mut self, parent: TaskId, child: TaskId) {
        if let Some(task) = self.tasks.get_mut(&parent) {
            if task.children.is_empty() {
                task.resources.clear();
                task.alternative_resources.clear();
            }
            if !task.children.contains(&child) {
                task.children.push(child);
            }
        }
        if let Some(task) = self.tasks.get_mut(&child) {
            task.parent = Some(parent);
        }
    }

    /// Unlinks `child` from `parent`. A parent left without children is
    /// resolved again as a leaf.
    pub(crate) fn detach_child(&mut self, parent: TaskId, child: TaskId) {
        let became_leaf = match self.tasks.get_mut(&parent) {
            Some(task) => {
                task.children.retain(|id| *id != child);
                task.children.is_empty()
            }
            None => false,
        };
        if let Some(task) = self.tasks.get_mut(&child) {
            if task.parent == Some(parent) {
                task.parent = None;
            }
        }
        if became_leaf {
            self.reschedule_task(parent);
        }
    }

    /// Recomputes a leaf's schedule seconds and logged time. With
    /// `reschedule` the unpinned side of its range is moved as well.
    fn resolve_leaf(&mut self, id: TaskId, reschedule: bool) {
        let resolver =
            ScheduleResolver::new(&self.calendar, self.config.timing_resolution_seconds());
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        if task.is_container() {
            return;
        }
        if reschedule {
            if let Err(err) = resolver.resolve(&mut task.schedule) {
                warn!(task = %id, %err, "schedule kept as it was");
                resolver.refresh(&mut task.schedule);
            }
        } else {
            resolver.refresh(&mut task.schedule);
        }
        task.schedule.total_logged_seconds =
            resolver.logged_seconds(&task.schedule, &task.time_logs, self.now);
    }

    /// Resolves `schedule` for the leaf `id` and stores it, or fails leaving
    /// the task untouched.
    fn store_resolved(&mut self, id: TaskId, mut schedule: ScheduleInfo) -> ScheduleResult<()> {
        self.resolver().resolve(&mut schedule)?;
        self.task_mut(id)?.schedule = schedule;
        self.refresh_and_propagate(id);
        Ok(())
    }

    pub(crate) fn refresh_task(&mut self, id: TaskId) {
        self.resolve_leaf(id, false);
    }

    pub(crate) fn reschedule_task(&mut self, id: TaskId) {
        self.resolve_leaf(id, true);
    }

    pub(crate) fn propagate(&mut self, from: Option<TaskId>) {
        Aggregator::propagate_up(&mut self.tasks, from);
    }

    pub(crate) fn refresh_and_propagate(&mut self, id: TaskId) {
        self.refresh_task(id);
        let parent = self.tasks.get(&id).and_then(|task| task.parent);
        self.propagate(parent);
    }

    /// Refreshes every leaf, then every container bottom-up. Unscheduled
    /// leaves are also rescheduled when `reschedule` is set; solver-assigned
    /// ranges are never moved.
    pub(crate) fn recompute_all(&mut self, reschedule: bool) {
        let leaves: Vec<(TaskId, bool)> = self
            .tasks
            .values()
            .filter(|task| task.is_leaf())
            .map(|task| (task.id, task.is_scheduled()))
            .collect();
        for (id, scheduled) in leaves {
            self.resolve_leaf(id, reschedule && !scheduled);
        }
        Aggregator::recompute_all(&mut self.tasks);
    }
}

fn dedup(resources: Vec<ResourceId>) -> Vec<ResourceId> {
    let mut seen = HashSet::new();
    resources.into_iter().filter(|id| seen.insert(*id)).collect()
}
