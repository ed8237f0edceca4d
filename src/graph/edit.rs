use super::dependency_graph::{check_proposal, DependencyGraph, ForestView, Proposal};
use crate::error::{CircularDependencyError, Relation, ScheduleResult, ValidationError};
use crate::forest::{TaskForest, WalkMode};
use crate::task::{DependencyAttrs, TaskDependency, TaskId};
use tracing::{debug, instrument};

impl TaskForest {
    /// Makes `from` depend on `to`. An existing edge only has its attrs replaced.
    #[instrument(skip(self, attrs))]
    pub fn add_dependency(
        &mut self,
        from: TaskId,
        to: TaskId,
        attrs: DependencyAttrs,
    ) -> ScheduleResult<()> {
        self.get(from)?;
        self.get(to)?;
        attrs.validate()?;

        let circular = CircularDependencyError {
            task: from,
            other: to,
            relation: Relation::DependsOn,
        };
        let current = &self.get(from)?.dependency.depends_on;
        if current.iter().any(|dep| dep.depends_on == to) {
            // a changed target can still close a cycle
            let updated: Vec<TaskDependency> = current
                .iter()
                .map(|dep| {
                    if dep.depends_on == to {
                        TaskDependency::with_attrs(to, attrs)
                    } else {
                        *dep
                    }
                })
                .collect();
            let proposal = Proposal {
                replaced: Some((from, updated.clone())),
                ..Proposal::default()
            };
            check_proposal(self, &proposal, &[from], circular)?;
            self.task_mut(from)?.dependency.depends_on = updated;
            return Ok(());
        }

        let proposal = Proposal {
            added: vec![(from, TaskDependency::with_attrs(to, attrs))],
            ..Proposal::default()
        };
        check_proposal(self, &proposal, &[from], circular)?;

        self.task_mut(from)?
            .dependency
            .depends_on
            .push(TaskDependency::with_attrs(to, attrs));
        let parent = self.get(from)?.parent;
        self.propagate(parent);
        debug!(%from, %to, "dependency added");
        Ok(())
    }

    /// Returns whether an edge was removed.
    pub fn remove_dependency(&mut self, from: TaskId, to: TaskId) -> bool {
        let Some(task) = self.tasks.get_mut(&from) else {
            return false;
        };
        let before = task.dependency.depends_on.len();
        task.dependency.depends_on.retain(|dep| dep.depends_on != to);
        let removed = task.dependency.depends_on.len() != before;
        if removed {
            let parent = task.parent;
            self.propagate(parent);
            debug!(%from, %to, "dependency removed");
        }
        removed
    }

    /// Replaces the whole dependency list of `task`, or leaves it untouched.
    #[instrument(skip(self, deps), fields(count = deps.len()))]
    pub fn set_dependencies(
        &mut self,
        task: TaskId,
        deps: Vec<TaskDependency>,
    ) -> ScheduleResult<()> {
        self.get(task)?;
        let deps = self.checked_dependency_list(&deps)?;
        if let Some(first) = deps.first() {
            let proposal = Proposal {
                replaced: Some((task, deps.clone())),
                ..Proposal::default()
            };
            check_proposal(
                self,
                &proposal,
                &[task],
                CircularDependencyError {
                    task,
                    other: first.depends_on,
                    relation: Relation::DependsOn,
                },
            )?;
        }
        self.task_mut(task)?.dependency.depends_on = deps;
        let parent = self.get(task)?.parent;
        self.propagate(parent);
        Ok(())
    }

    /// Moves `node` under `new_parent`, or to the project root with `None`.
    #[instrument(skip(self))]
    pub fn set_parent(&mut self, node: TaskId, new_parent: Option<TaskId>) -> ScheduleResult<()> {
        let current = self.get(node)?;
        let old_parent = current.parent;
        let project = current.project;
        if old_parent == new_parent {
            return Ok(());
        }

        if let Some(parent) = new_parent {
            let circular = CircularDependencyError {
                task: node,
                other: parent,
                relation: Relation::Parent,
            };
            if parent == node {
                return Err(circular.into());
            }
            let parent_task = self.get(parent)?;
            if parent_task.project != project {
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
            if self.descendants(node).contains(&parent) {
                return Err(circular.into());
            }

            let subtree = self.walk_hierarchy(node, WalkMode::BreadthFirst);
            let no_proposal = Proposal::default();
            let reached = ForestView::new(self, &no_proposal).dependency_closure(&subtree);
            if reached.contains(&parent)
                || self.ancestors(parent).iter().any(|up| reached.contains(up))
            {
                return Err(circular.into());
            }

            let mut subjects = subtree;
            subjects.push(parent);
            subjects.extend(self.ancestors(parent));
            let proposal = Proposal {
                reparent: Some((node, new_parent)),
                ..Proposal::default()
            };
            check_proposal(self, &proposal, &subjects, circular)?;
        }

        if let Some(old) = old_parent {
            self.detach_child(old, node);
        }
        match new_parent {
            Some(parent) => self.attach_child(parent, node),
            None => {
                if let Some(task) = self.tasks.get_mut(&node) {
                    task.parent = None;
                }
            }
        }
        self.propagate(old_parent);
        self.propagate(new_parent);
        debug!(%node, ?old_parent, ?new_parent, "task re-parented");
        Ok(())
    }

    pub fn add_child(&mut self, parent: TaskId, child: TaskId) -> ScheduleResult<()> {
        self.set_parent(child, Some(parent))
    }

    /// Event graph of the current forest.
    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::build(self)
    }

    /// Every task ordered after its parent and after what it depends on.
    pub fn scheduling_order(&self) -> Result<Vec<TaskId>, CircularDependencyError> {
        self.dependency_graph().scheduling_order()
    }
}
