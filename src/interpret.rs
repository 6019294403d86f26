//! Turns solver values back into domain answers, and renders them as text.
//!
//! Nothing here talks to a solver: values come in through a lookup closure.

use itertools::{Itertools, iproduct};

use crate::data::{ProjectInstance, ProjectSchedule, ShiftAssignment, ShiftInstance, TaskAssignment};
use crate::error::SolveError;
use crate::formulation::{ProjectFormulation, ShiftFormulation};
use crate::milp::VarId;

/// Binary decisions come back as floats near 0 or 1.
pub const BINARY_THRESHOLD: f64 = 0.5;

pub fn is_selected(value: f64) -> bool {
    value > BINARY_THRESHOLD
}

fn read(value: &impl Fn(VarId) -> Option<f64>, var: VarId) -> Result<f64, SolveError> {
    value(var).ok_or_else(|| SolveError::internal(format!("no value for variable {}", var.0)))
}

pub fn read_shift_assignment(
    formulation: &ShiftFormulation,
    value: impl Fn(VarId) -> Option<f64>,
) -> Result<ShiftAssignment, SolveError> {
    let (agents, days, shifts) = formulation.dimensions();
    let mut grid = vec![vec![vec![false; shifts]; days]; agents];
    for (e, d, s) in iproduct!(0..agents, 0..days, 0..shifts) {
        grid[e][d][s] = is_selected(read(&value, formulation.var(e, d, s))?);
    }
    Ok(ShiftAssignment { grid })
}

pub fn read_project_schedule(
    formulation: &ProjectFormulation,
    instance: &ProjectInstance,
    value: impl Fn(VarId) -> Option<f64>,
) -> Result<ProjectSchedule, SolveError> {
    let mut tasks = Vec::with_capacity(formulation.tasks.len());
    for (i, &task) in formulation.tasks.iter().enumerate() {
        let mut team = None;
        for (t, &var) in formulation.assign[i].iter().enumerate() {
            if is_selected(read(&value, var)?) {
                team = Some(t);
                break;
            }
        }
        let team = team.ok_or_else(|| {
            SolveError::internal(format!(
                "task {} of project {} has no team in the solution",
                task.index, task.project
            ))
        })?;
        // solver noise can leave a start a hair below zero
        let start = read(&value, formulation.start[i])?.max(0.0);
        let duration = formulation.durations[i];
        tasks.push(TaskAssignment {
            task,
            project_name: instance.projects[task.project].name.clone(),
            team,
            start,
            duration,
            end: start + duration,
        });
    }
    tasks.sort_by_key(|t| t.task);

    let makespan = tasks.iter().map(|t| t.end).fold(0.0, f64::max);
    Ok(ProjectSchedule {
        fits_horizon: makespan <= instance.horizon_hours,
        tasks,
        makespan,
    })
}

pub fn render_shift_report(
    assignment: &ShiftAssignment,
    instance: &ShiftInstance,
    runtime_seconds: f64,
) -> String {
    let header = format!(
        "Shift assignment: {} agents, {} days, {} shifts per day",
        instance.agents, instance.days, instance.shifts
    );
    let agents = (0..instance.agents).map(|agent| {
        let days = (0..instance.days)
            .map(|day| {
                (0..instance.shifts)
                    .find(|&s| assignment.is_assigned(agent, day, s))
                    .map_or_else(|| "-".to_string(), |s| (s + 1).to_string())
            })
            .join(" ");
        format!(
            "agent {:>3}: {:>2} shifts | {}",
            agent + 1,
            assignment.shifts_worked(agent),
            days
        )
    });
    let footer = [
        format!("Total cost: {:.2}", assignment.total_cost(instance)),
        format!("Runtime: {runtime_seconds:.3}s"),
    ];
    std::iter::once(header)
        .chain(agents)
        .chain(footer)
        .map(|line| line + "\n")
        .collect()
}

pub fn render_project_report(schedule: &ProjectSchedule, instance: &ProjectInstance) -> String {
    let header = format!(
        "{:<16} {:>4} {:<12} {:>8} {:>8}",
        "project", "task", "team", "start", "end"
    );
    let rows = schedule.tasks.iter().map(|t| {
        format!(
            "{:<16} {:>4} {:<12} {:>8.2} {:>8.2}",
            t.project_name,
            t.task.index + 1,
            instance.team_label(t.team),
            t.start,
            t.end
        )
    });
    let timelines = (0..instance.teams).map(|team| {
        let timeline = schedule
            .tasks_on_team(team)
            .sorted_by(|a, b| a.start.total_cmp(&b.start).then(a.task.cmp(&b.task)))
            .map(|t| format!("{}#{} [{:.2}, {:.2})", t.project_name, t.task.index + 1, t.start, t.end))
            .join(", ");
        format!("{}: {}", instance.team_label(team), timeline)
    });
    let footer = format!(
        "Makespan: {:.2}h ({} the {:.0}h horizon)",
        schedule.makespan,
        if schedule.fits_horizon { "within" } else { "beyond" },
        instance.horizon_hours
    );
    std::iter::once(header)
        .chain(rows)
        .chain(timelines)
        .chain(std::iter::once(footer))
        .map(|line| line + "\n")
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Project, TaskRef};
    use std::collections::HashMap;

    #[test]
    fn threshold_is_strict() {
        assert!(!is_selected(0.5));
        assert!(is_selected(0.9999));
        assert!(!is_selected(1e-7));
    }

    #[test]
    fn reads_shift_grid_with_threshold() {
        let instance = ShiftInstance::new(2, vec![vec![1, 1]], 1);
        let f = ShiftFormulation::build(&instance);
        let values: HashMap<VarId, f64> = [
            (f.var(0, 0, 0), 0.99999),
            (f.var(0, 0, 1), 1e-9),
            (f.var(1, 0, 0), 0.0),
            (f.var(1, 0, 1), 1.0),
        ]
        .into_iter()
        .collect();
        let assignment = read_shift_assignment(&f, |v| values.get(&v).copied()).unwrap();
        assert_eq!(assignment.grid, vec![vec![vec![true, false]], vec![vec![false, true]]]);

        let report = render_shift_report(&assignment, &instance, 0.25);
        assert!(report.contains("agent   1:  1 shifts | 1"));
        assert!(report.contains("agent   2:  1 shifts | 2"));
        assert!(report.contains("Total cost: 2.00"));
    }

    #[test]
    fn missing_values_are_internal_errors() {
        let f = ShiftFormulation::build(&ShiftInstance::new(1, vec![vec![1]], 1));
        let err = read_shift_assignment(&f, |_| None).unwrap_err();
        assert!(matches!(err, SolveError::Internal { .. }));
    }

    fn two_projects() -> ProjectInstance {
        ProjectInstance::new(
            vec![
                Project {
                    name: "alpha".into(),
                    durations: vec![2.0, 3.0],
                },
                Project {
                    name: "beta".into(),
                    durations: vec![4.0],
                },
            ],
            2,
        )
    }

    #[test]
    fn reads_schedule_sorted_with_clamped_starts() {
        let instance = two_projects();
        let f = ProjectFormulation::build(&instance);
        let mut values: HashMap<VarId, f64> = HashMap::new();
        values.insert(f.start[0], -1e-9);
        values.insert(f.start[1], 2.0);
        values.insert(f.start[2], 0.0);
        values.insert(f.assign[0][0], 1.0);
        values.insert(f.assign[0][1], 0.0);
        values.insert(f.assign[1][0], 0.9999);
        values.insert(f.assign[1][1], 0.0);
        values.insert(f.assign[2][0], 0.0);
        values.insert(f.assign[2][1], 1.0);

        let schedule = read_project_schedule(&f, &instance, |v| values.get(&v).copied()).unwrap();
        assert_eq!(schedule.tasks[0].start, 0.0);
        assert_eq!(schedule.tasks[1].task, TaskRef { project: 0, index: 1 });
        assert_eq!(schedule.tasks[2].team, 1);
        assert_eq!(schedule.tasks[2].project_name, "beta");
        assert_eq!(schedule.makespan, 5.0);
        assert!(schedule.fits_horizon);

        let report = render_project_report(&schedule, &instance);
        assert!(report.contains("team 1: alpha#1 [0.00, 2.00), alpha#2 [2.00, 5.00)"));
        assert!(report.contains("team 2: beta#1 [0.00, 4.00)"));
        assert!(report.contains("Makespan: 5.00h"));

        let named = two_projects().with_team_names(vec!["red".into(), "blue".into()]);
        let report = render_project_report(&schedule, &named);
        assert!(report.contains("red: alpha#1 [0.00, 2.00)"));
        assert!(report.contains("blue: beta#1 [0.00, 4.00)"));
        assert!(report.ends_with("horizon)\n"));
    }

    #[test]
    fn task_without_team_is_an_internal_error() {
        let instance = two_projects();
        let f = ProjectFormulation::build(&instance);
        let err = read_project_schedule(&f, &instance, |_| Some(0.0)).unwrap_err();
        assert!(matches!(err, SolveError::Internal { .. }));
    }
}
