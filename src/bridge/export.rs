use crate::forest::TaskForest;
use crate::resource::Resource;
use crate::task::{ScheduleConstraint, TaskDependency, TaskId, TaskNode, DEFAULT_PRIORITY};
use chrono::{DateTime, Utc};
use std::fmt::Write as _;

pub const STUDIO_TJP_ID: &str = "Studio_1";
const TAB: &str = "    ";
const MINUTE_FORMAT: &str = "%Y-%m-%d-%H:%M";
const SECOND_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

/// Renders the whole forest as TaskJuggler project input. The generated
/// `taskreport` writes `{report_name}.csv` next to the input file.
pub fn render(forest: &TaskForest, report_name: &str, compute_resources: bool) -> String {
    let mut out = String::new();
    out.push_str("# Generated by studio-schedule\n");
    write_studio(&mut out, forest);
    out.push('\n');

    out.push_str("# resources\n");
    out.push_str("resource resources \"Resources\" {\n");
    for resource in forest.resources() {
        write_resource(&mut out, resource);
    }
    out.push_str("}\n\n");

    out.push_str("# tasks\n");
    for project in forest.projects().filter(|project| project.is_active()) {
        let tjp_id = project.id().tjp_id();
        let _ = writeln!(out, "task {tjp_id} \"{tjp_id}\" {{");
        for root in forest.root_tasks(project.id()) {
            write_task(&mut out, forest, root, 1);
        }
        out.push_str("}\n");
    }
    out.push('\n');

    out.push_str("# reports\n");
    let _ = writeln!(out, "taskreport breakdown \"{report_name}\" {{");
    let _ = writeln!(out, "{TAB}formats csv");
    let _ = writeln!(out, "{TAB}timeformat \"{MINUTE_FORMAT}\"");
    if compute_resources {
        let _ = writeln!(out, "{TAB}columns id, start, end, resources");
    } else {
        let _ = writeln!(out, "{TAB}columns id, start, end");
    }
    out.push_str("}\n");
    out
}

fn write_studio(out: &mut String, forest: &TaskForest) {
    let (start, end) = forest.scheduling_window();
    let calendar = forest.calendar();
    let _ = writeln!(
        out,
        "project {STUDIO_TJP_ID} \"{STUDIO_TJP_ID}\" {} - {} {{",
        start.date_naive(),
        end.date_naive()
    );
    let _ = writeln!(
        out,
        "{TAB}timingresolution {}min",
        forest.config().timing_resolution_minutes
    );
    let _ = writeln!(out, "{TAB}now {}", stamp(forest.now(), MINUTE_FORMAT));
    let _ = writeln!(
        out,
        "{TAB}dailyworkinghours {}",
        calendar.daily_working_hours()
    );
    let _ = writeln!(out, "{TAB}weekstartsmonday");
    for line in calendar.to_calendar_export().lines() {
        let _ = writeln!(out, "{TAB}{line}");
    }
    let _ = writeln!(out, "{TAB}timeformat \"%Y-%m-%d\"");
    let _ = writeln!(out, "{TAB}scenario plan \"Plan\"");
    let _ = writeln!(out, "{TAB}trackingscenario plan");
    out.push_str("}\n");
}

fn write_resource(out: &mut String, resource: &Resource) {
    let tjp_id = resource.id().tjp_id();
    let _ = writeln!(out, "{TAB}resource {tjp_id} \"{tjp_id}\" {{");
    let _ = writeln!(out, "{TAB}{TAB}efficiency {:.1}", resource.efficiency());
    for vacation in resource.vacations() {
        let _ = writeln!(
            out,
            "{TAB}{TAB}vacation {} - {}",
            stamp(vacation.start(), SECOND_FORMAT),
            stamp(vacation.end(), SECOND_FORMAT)
        );
    }
    let _ = writeln!(out, "{TAB}}}");
}

fn write_task(out: &mut String, forest: &TaskForest, id: TaskId, depth: usize) {
    let Some(task) = forest.task(id) else {
        return;
    };
    let indent = TAB.repeat(depth);
    let inner = TAB.repeat(depth + 1);
    let schedule = task.schedule();
    let tjp_id = id.tjp_id();
    let _ = writeln!(out, "{indent}task {tjp_id} \"{tjp_id}\" {{");

    if schedule.priority() != DEFAULT_PRIORITY {
        let _ = writeln!(out, "{inner}priority {}", schedule.priority());
    }

    if !task.depends_on().is_empty() {
        let deps = task
            .depends_on()
            .iter()
            .filter_map(|dep| dependency_clause(forest, dep))
            .collect::<Vec<_>>();
        if !deps.is_empty() {
            let _ = writeln!(out, "{inner}depends {}", deps.join(", "));
        }
    }

    if task.is_container() {
        for child in task.children() {
            write_task(out, forest, *child, depth + 1);
        }
        let _ = writeln!(out, "{indent}}}");
        return;
    }

    if schedule.is_milestone() {
        let _ = writeln!(out, "{inner}milestone");
        if schedule.constraint().pins_end() {
            let _ = writeln!(out, "{inner}end {}", stamp(schedule.end(), MINUTE_FORMAT));
        } else if schedule.constraint() != ScheduleConstraint::None {
            let _ = writeln!(out, "{inner}start {}", stamp(schedule.start(), MINUTE_FORMAT));
        }
    } else if !task.resources().is_empty() {
        if schedule.constraint().pins_start() {
            let _ = writeln!(out, "{inner}start {}", stamp(schedule.start(), MINUTE_FORMAT));
        }
        if schedule.constraint().pins_end() {
            let _ = writeln!(out, "{inner}end {}", stamp(schedule.end(), MINUTE_FORMAT));
        }
        let _ = writeln!(
            out,
            "{inner}{} {}{}",
            schedule.model(),
            format_timing(schedule.timing()),
            schedule.unit()
        );
        let _ = writeln!(out, "{inner}allocate {}", allocation_clause(task));
    }

    // bookings are kept even for leaves nobody is allocated to
    for log in task.time_logs() {
        let _ = writeln!(
            out,
            "{inner}booking {} {} - {} {{ overtime 2 }}",
            log.resource().tjp_id(),
            stamp(log.start(), SECOND_FORMAT),
            stamp(log.end(), SECOND_FORMAT)
        );
    }

    let _ = writeln!(out, "{indent}}}");
}

fn dependency_clause(forest: &TaskForest, dep: &TaskDependency) -> Option<String> {
    let path = forest.tjp_abs_id(dep.depends_on).ok()?;
    let mut clause = format!("{path} {{{}", dep.attrs.target);
    if dep.attrs.gap_timing > 0.0 {
        let _ = write!(
            clause,
            " gap{} {}{}",
            dep.attrs.gap_model,
            format_timing(dep.attrs.gap_timing),
            dep.attrs.gap_unit
        );
    }
    clause.push('}');
    Some(clause)
}

fn allocation_clause(task: &TaskNode) -> String {
    let mut sorted = task.resources().to_vec();
    sorted.sort();
    sorted
        .iter()
        .map(|resource| {
            let mut clause = resource.tjp_id();
            if !task.alternative_resources().is_empty() {
                let alternatives = task
                    .alternative_resources()
                    .iter()
                    .map(|alt| alt.tjp_id())
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = write!(
                    clause,
                    " {{ alternative {alternatives} select {}",
                    task.allocation_strategy()
                );
                if task.persistent_allocation() {
                    clause.push_str(" persistent");
                }
                clause.push_str(" }");
            }
            clause
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `10` for whole numbers, `1.5` otherwise.
pub fn format_timing(timing: f64) -> String {
    if timing.fract() == 0.0 && timing.abs() < i64::MAX as f64 {
        format!("{}", timing as i64)
    } else {
        format!("{timing}")
    }
}

fn stamp(timestamp: DateTime<Utc>, format: &str) -> String {
    timestamp.format(format).to_string()
}

#[cfg(test)]
mod tests {
    use super::format_timing;

    #[test]
    fn timing_drops_trailing_zero() {
        assert_eq!(format_timing(10.0), "10");
        assert_eq!(format_timing(1.5), "1.5");
        assert_eq!(format_timing(1e20), "100000000000000000000");
    }
}
