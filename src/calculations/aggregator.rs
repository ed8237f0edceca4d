use crate::task::{TaskId, TaskNode};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

/// Values a container derives from its direct children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerTotals {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub schedule_seconds: i64,
    pub total_logged_seconds: i64,
}

impl ContainerTotals {
    /// `None` when there are no children.
    pub fn from_children<'a, I>(children: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a TaskNode>,
    {
        children.into_iter().fold(None, |acc, child| {
            let info = child.schedule();
            Some(match acc {
                None => Self {
                    start: info.start(),
                    end: info.end(),
                    schedule_seconds: info.schedule_seconds(),
                    total_logged_seconds: info.total_logged_seconds(),
                },
                Some(totals) => Self {
                    start: totals.start.min(info.start()),
                    end: totals.end.max(info.end()),
                    schedule_seconds: totals.schedule_seconds + info.schedule_seconds(),
                    total_logged_seconds: totals.total_logged_seconds
                        + info.total_logged_seconds(),
                },
            })
        })
    }

    pub fn percent_complete(&self) -> f64 {
        if self.schedule_seconds <= 0 {
            0.0
        } else {
            self.total_logged_seconds as f64 / self.schedule_seconds as f64 * 100.0
        }
    }
}

/// Keeps container tasks consistent with their children.
pub struct Aggregator;

impl Aggregator {
    /// Recomputes one container from its children. Leaves are left alone.
    pub fn recompute(tasks: &mut BTreeMap<TaskId, TaskNode>, id: TaskId) -> bool {
        let Some(task) = tasks.get(&id) else {
            return false;
        };
        if task.is_leaf() {
            return false;
        }
        let totals = ContainerTotals::from_children(
            task.children.iter().filter_map(|child| tasks.get(child)),
        );
        let Some(totals) = totals else {
            return false;
        };
        let Some(task) = tasks.get_mut(&id) else {
            return false;
        };
        task.schedule.start = totals.start;
        task.schedule.end = totals.end;
        task.schedule.schedule_seconds = totals.schedule_seconds;
        task.schedule.total_logged_seconds = totals.total_logged_seconds;
        debug!(
            task = %id,
            schedule_seconds = totals.schedule_seconds,
            logged_seconds = totals.total_logged_seconds,
            "container recomputed"
        );
        true
    }

    /// Recomputes `from` and every ancestor up to the root.
    pub fn propagate_up(tasks: &mut BTreeMap<TaskId, TaskNode>, from: Option<TaskId>) {
        let mut current = from;
        let mut remaining = tasks.len();
        while let Some(id) = current {
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            Self::recompute(tasks, id);
            current = tasks.get(&id).and_then(|task| task.parent);
        }
    }

    /// Recomputes every container, children before parents.
    pub fn recompute_all(tasks: &mut BTreeMap<TaskId, TaskNode>) {
        let roots: Vec<TaskId> = tasks
            .values()
            .filter(|task| task.is_root())
            .map(|task| task.id)
            .collect();
        for root in roots {
            for id in Self::post_order(tasks, root) {
                Self::recompute(tasks, id);
            }
        }
    }

    fn post_order(tasks: &BTreeMap<TaskId, TaskNode>, root: TaskId) -> Vec<TaskId> {
        let mut order = Vec::new();
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            if let Some(task) = tasks.get(&id) {
                for child in task.children.iter().rev() {
                    stack.push((*child, false));
                }
            }
        }
        order
    }
}
