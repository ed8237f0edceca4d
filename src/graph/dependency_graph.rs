use crate::error::{CircularDependencyError, Relation};
use crate::forest::TaskForest;
use crate::task::{DependencyTarget, TaskDependency, TaskId};
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graphmap::DiGraphMap;
use std::collections::{HashSet, VecDeque};

/// Start or end of a task. Edges between events mean "happens no later than".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskEvent {
    Start(TaskId),
    End(TaskId),
}

impl TaskEvent {
    pub fn task(&self) -> TaskId {
        match self {
            TaskEvent::Start(id) | TaskEvent::End(id) => *id,
        }
    }
}

/// Structural edits evaluated against the forest before they are applied.
#[derive(Debug, Clone, Default)]
pub(crate) struct Proposal {
    pub added: Vec<(TaskId, TaskDependency)>,
    pub replaced: Option<(TaskId, Vec<TaskDependency>)>,
    pub reparent: Option<(TaskId, Option<TaskId>)>,
    pub inserted: Option<(TaskId, Option<TaskId>)>,
}

/// Read view of the hierarchy and dependency lists with a proposal layered on top.
pub(crate) struct ForestView<'a> {
    forest: &'a TaskForest,
    proposal: &'a Proposal,
}

impl<'a> ForestView<'a> {
    pub fn new(forest: &'a TaskForest, proposal: &'a Proposal) -> Self {
        Self { forest, proposal }
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.forest.tasks.keys().copied().collect();
        if let Some((id, _)) = self.proposal.inserted {
            ids.push(id);
        }
        ids
    }

    pub fn parent_of(&self, id: TaskId) -> Option<TaskId> {
        if let Some((node, parent)) = self.proposal.reparent {
            if node == id {
                return parent;
            }
        }
        if let Some((node, parent)) = self.proposal.inserted {
            if node == id {
                return parent;
            }
        }
        self.forest.tasks.get(&id).and_then(|task| task.parent)
    }

    pub fn children_of(&self, id: TaskId) -> Vec<TaskId> {
        let mut children = self
            .forest
            .tasks
            .get(&id)
            .map(|task| task.children.clone())
            .unwrap_or_default();
        if let Some((node, parent)) = self.proposal.reparent {
            children.retain(|child| *child != node);
            if parent == Some(id) {
                children.push(node);
            }
        }
        if let Some((node, parent)) = self.proposal.inserted {
            if parent == Some(id) {
                children.push(node);
            }
        }
        children
    }

    pub fn dependencies_of(&self, id: TaskId) -> Vec<TaskDependency> {
        let mut deps = match &self.proposal.replaced {
            Some((node, deps)) if *node == id => deps.clone(),
            _ => self
                .forest
                .tasks
                .get(&id)
                .map(|task| task.dependency.depends_on.clone())
                .unwrap_or_default(),
        };
        deps.extend(
            self.proposal
                .added
                .iter()
                .filter(|(from, _)| *from == id)
                .map(|(_, dep)| *dep),
        );
        deps
    }

    /// Parent chain, nearest first. Stops if the chain loops back on itself.
    pub fn ancestors(&self, id: TaskId) -> Vec<TaskId> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            if !seen.insert(parent) {
                break;
            }
            chain.push(parent);
            current = self.parent_of(parent);
        }
        chain
    }

    /// All descendants in breadth-first order.
    pub fn descendants(&self, id: TaskId) -> Vec<TaskId> {
        let mut found = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut queue: VecDeque<TaskId> = self.children_of(id).into();
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            found.push(next);
            queue.extend(self.children_of(next));
        }
        found
    }

    /// Every task reachable from `roots` by following `depends_on`, whatever
    /// the dependency target.
    pub fn dependency_closure(&self, roots: &[TaskId]) -> HashSet<TaskId> {
        let mut reached = HashSet::new();
        let mut queue: VecDeque<TaskId> = roots
            .iter()
            .flat_map(|root| self.dependencies_of(*root))
            .map(|dep| dep.depends_on)
            .collect();
        while let Some(next) = queue.pop_front() {
            if !reached.insert(next) {
                continue;
            }
            queue.extend(self.dependencies_of(next).iter().map(|dep| dep.depends_on));
        }
        reached
    }

    /// A task may not depend on itself, its ancestors or its descendants.
    /// Returns the first offending dependency of `id`.
    pub fn lineage_conflict(&self, id: TaskId) -> Option<TaskId> {
        let deps = self.dependencies_of(id);
        if deps.is_empty() {
            return None;
        }
        let mut lineage: HashSet<TaskId> = self.ancestors(id).into_iter().collect();
        lineage.extend(self.descendants(id));
        lineage.insert(id);
        deps.iter()
            .map(|dep| dep.depends_on)
            .find(|target| lineage.contains(target))
    }
}

/// Event graph over the whole forest: every task contributes a start and an
/// end event, hierarchy nests children inside parents and each dependency
/// orders the dependent's start after its target's start or end.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraphMap<TaskEvent, ()>,
}

impl DependencyGraph {
    pub fn build(forest: &TaskForest) -> Self {
        let proposal = Proposal::default();
        Self::build_view(&ForestView::new(forest, &proposal))
    }

    pub(crate) fn build_view(view: &ForestView<'_>) -> Self {
        let ids = view.task_ids();
        let known: HashSet<TaskId> = ids.iter().copied().collect();
        let mut graph: DiGraphMap<TaskEvent, ()> = DiGraphMap::new();

        // Add nodes first
        for id in &ids {
            graph.add_edge(TaskEvent::Start(*id), TaskEvent::End(*id), ());
        }

        for id in &ids {
            if let Some(parent) = view.parent_of(*id) {
                graph.add_edge(TaskEvent::Start(parent), TaskEvent::Start(*id), ());
                graph.add_edge(TaskEvent::End(*id), TaskEvent::End(parent), ());
            }
            for dep in view.dependencies_of(*id) {
                if !known.contains(&dep.depends_on) {
                    continue;
                }
                let before = match dep.attrs.target {
                    DependencyTarget::OnEnd => TaskEvent::End(dep.depends_on),
                    DependencyTarget::OnStart => TaskEvent::Start(dep.depends_on),
                };
                graph.add_edge(before, TaskEvent::Start(*id), ());
            }
        }

        Self { graph }
    }

    pub fn event_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.graph)
    }

    /// Tasks ordered so that every task comes after its parent and after the
    /// tasks it depends on.
    pub fn scheduling_order(&self) -> Result<Vec<TaskId>, CircularDependencyError> {
        let events = toposort(&self.graph, None).map_err(|cycle| {
            let task = cycle.node_id().task();
            CircularDependencyError {
                task,
                other: task,
                relation: Relation::DependsOn,
            }
        })?;
        Ok(events
            .into_iter()
            .filter_map(|event| match event {
                TaskEvent::Start(id) => Some(id),
                TaskEvent::End(_) => None,
            })
            .collect())
    }
}

/// Fails with `error` if the proposal gives any of `subjects` a lineage
/// dependency or closes a cycle anywhere in the event graph.
pub(crate) fn check_proposal(
    forest: &TaskForest,
    proposal: &Proposal,
    subjects: &[TaskId],
    error: CircularDependencyError,
) -> Result<(), CircularDependencyError> {
    let view = ForestView::new(forest, proposal);
    if subjects
        .iter()
        .any(|subject| view.lineage_conflict(*subject).is_some())
    {
        return Err(error);
    }
    if !DependencyGraph::build_view(&view).is_acyclic() {
        return Err(error);
    }
    Ok(())
}
