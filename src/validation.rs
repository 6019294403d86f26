//! Instance validation before model building, and verification of solved
//! schedules against their instance.

use itertools::Itertools;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::config::Limits;
use crate::data::{
    AgentId, Day, InstanceFinding, ProjectInstance, ProjectSchedule, ShiftAssignment,
    ShiftInstance, ShiftSlot, TaskRef, TeamId,
};
use crate::error::SolveError;

/// Size checks for a shift instance, cheap enough to run before any cost
/// table is allocated.
pub fn check_shift_dimensions(
    agents: usize,
    days: usize,
    shifts: usize,
    limits: &Limits,
) -> Result<(), SolveError> {
    if agents == 0 {
        return Err(SolveError::invalid("at least one agent is required"));
    }
    if days == 0 || shifts == 0 {
        return Err(SolveError::invalid("at least one day and one shift are required"));
    }
    let caps = [
        ("agents", agents, limits.max_agents),
        ("days", days, limits.max_days),
        ("shifts per day", shifts, limits.max_shifts),
    ];
    for (what, count, cap) in caps {
        if count > cap {
            return Err(SolveError::invalid(format!(
                "{count} {what} exceed the limit of {cap}"
            )));
        }
    }
    let variables = agents
        .checked_mul(days)
        .and_then(|n| n.checked_mul(shifts))
        .unwrap_or(usize::MAX);
    if variables > limits.max_shift_variables {
        return Err(SolveError::invalid(format!(
            "{agents}×{days}×{shifts} assignments exceed the limit of {}",
            limits.max_shift_variables
        )));
    }
    Ok(())
}

pub fn validate_shift_instance(instance: &ShiftInstance, limits: &Limits) -> Result<(), SolveError> {
    check_shift_dimensions(instance.agents, instance.days, instance.shifts, limits)?;
    if instance.demand.len() != instance.days
        || instance.demand.iter().any(|row| row.len() != instance.shifts)
    {
        return Err(SolveError::invalid(format!(
            "demand must be a {}×{} table",
            instance.days, instance.shifts
        )));
    }
    let cost_shape_ok = instance.cost.len() == instance.agents
        && instance.cost.iter().all(|agent| {
            agent.len() == instance.days && agent.iter().all(|day| day.len() == instance.shifts)
        });
    if !cost_shape_ok {
        return Err(SolveError::invalid(format!(
            "cost must be a {}×{}×{} table",
            instance.agents, instance.days, instance.shifts
        )));
    }
    if let Some(bad) = instance
        .cost
        .iter()
        .flatten()
        .flatten()
        .find(|c| !c.is_finite() || **c < 0.0)
    {
        return Err(SolveError::invalid(format!(
            "costs must be finite and non-negative, got {bad}"
        )));
    }
    Ok(())
}

/// Structural reasons an instance may be infeasible. Only diagnosed; the
/// model is still built and solved.
pub fn diagnose_shift_instance(instance: &ShiftInstance) -> Vec<InstanceFinding> {
    let mut findings = Vec::new();
    for (day, row) in instance.demand.iter().enumerate() {
        for (shift, &demand) in row.iter().enumerate() {
            if demand as usize > instance.agents {
                findings.push(InstanceFinding::SlotDemandExceedsAgents {
                    day,
                    shift,
                    demand,
                    agents: instance.agents,
                });
            }
        }
    }
    let total_demand = instance.total_demand();
    let capacity = instance.workforce_capacity();
    if total_demand > capacity {
        findings.push(InstanceFinding::DemandExceedsWorkforce {
            total_demand,
            capacity,
        });
    }
    findings
}

pub fn validate_project_instance(
    instance: &ProjectInstance,
    limits: &Limits,
) -> Result<(), SolveError> {
    if instance.projects.is_empty() {
        return Err(SolveError::invalid("at least one project is required"));
    }
    if instance.teams == 0 || instance.teams > limits.max_teams {
        return Err(SolveError::invalid(format!(
            "team count must lie in 1..={}, got {}",
            limits.max_teams, instance.teams
        )));
    }
    if !instance.team_names.is_empty() && instance.team_names.len() != instance.teams {
        return Err(SolveError::invalid(format!(
            "{} team names given for {} teams",
            instance.team_names.len(),
            instance.teams
        )));
    }
    if !(instance.horizon_hours.is_finite() && instance.horizon_hours > 0.0) {
        return Err(SolveError::invalid(format!(
            "horizon must be a positive number of hours, got {}",
            instance.horizon_hours
        )));
    }
    let mut names = HashSet::new();
    for project in &instance.projects {
        if project.name.trim().is_empty() {
            return Err(SolveError::invalid("project names must not be empty"));
        }
        if !names.insert(project.name.as_str()) {
            return Err(SolveError::invalid(format!(
                "duplicate project name '{}'",
                project.name
            )));
        }
        if project.durations.is_empty() {
            return Err(SolveError::invalid(format!(
                "project '{}' has no tasks",
                project.name
            )));
        }
        if let Some(bad) = project
            .durations
            .iter()
            .find(|d| !d.is_finite() || **d <= 0.0)
        {
            return Err(SolveError::invalid(format!(
                "project '{}' has a non-positive duration {}",
                project.name, bad
            )));
        }
    }
    let tasks = instance.task_count();
    if tasks > limits.max_tasks {
        return Err(SolveError::invalid(format!(
            "{} tasks exceed the limit of {}",
            tasks, limits.max_tasks
        )));
    }
    Ok(())
}

/// A broken invariant in a solved schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Violation {
    #[serde(rename_all = "camelCase")]
    SeveralShiftsOnDay { agent: AgentId, day: Day },
    #[serde(rename_all = "camelCase")]
    NightThenMorning { agent: AgentId, day: Day },
    #[serde(rename_all = "camelCase")]
    Undercovered {
        day: Day,
        shift: ShiftSlot,
        assigned: u32,
        demand: u32,
    },
    #[serde(rename_all = "camelCase")]
    ShiftCapExceeded { agent: AgentId, worked: usize, cap: u32 },
    #[serde(rename_all = "camelCase")]
    MissingTask { task: TaskRef },
    #[serde(rename_all = "camelCase")]
    InvalidTeam { task: TaskRef, team: TeamId },
    #[serde(rename_all = "camelCase")]
    NegativeStart { task: TaskRef },
    #[serde(rename_all = "camelCase")]
    PrecedenceBroken { task: TaskRef },
    #[serde(rename_all = "camelCase")]
    TeamOverlap {
        team: TeamId,
        first: TaskRef,
        second: TaskRef,
    },
    #[serde(rename_all = "camelCase")]
    MakespanTooShort { makespan: f64, last_end: f64 },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::SeveralShiftsOnDay { agent, day } => {
                write!(f, "agent {agent} works several shifts on day {day}")
            }
            Violation::NightThenMorning { agent, day } => {
                write!(f, "agent {agent} works the night of day {day} and the next morning")
            }
            Violation::Undercovered {
                day,
                shift,
                assigned,
                demand,
            } => write!(f, "day {day} shift {shift} has {assigned} of {demand} agents"),
            Violation::ShiftCapExceeded { agent, worked, cap } => {
                write!(f, "agent {agent} works {worked} shifts, cap is {cap}")
            }
            Violation::MissingTask { task } => {
                write!(f, "task {}/{} is missing", task.project, task.index)
            }
            Violation::InvalidTeam { task, team } => {
                write!(f, "task {}/{} is on unknown team {team}", task.project, task.index)
            }
            Violation::NegativeStart { task } => {
                write!(f, "task {}/{} starts before 0", task.project, task.index)
            }
            Violation::PrecedenceBroken { task } => write!(
                f,
                "task {}/{} starts before its predecessor ends",
                task.project, task.index
            ),
            Violation::TeamOverlap {
                team,
                first,
                second,
            } => write!(
                f,
                "tasks {}/{} and {}/{} overlap on team {team}",
                first.project, first.index, second.project, second.index
            ),
            Violation::MakespanTooShort { makespan, last_end } => {
                write!(f, "makespan {makespan} ends before the last task at {last_end}")
            }
        }
    }
}

pub fn verify_shift_assignment(
    assignment: &ShiftAssignment,
    instance: &ShiftInstance,
) -> Vec<Violation> {
    let (agents, days, shifts) = (instance.agents, instance.days, instance.shifts);
    let mut violations = Vec::new();

    for agent in 0..agents {
        for day in 0..days {
            let worked = (0..shifts)
                .filter(|&s| assignment.is_assigned(agent, day, s))
                .count();
            if worked > 1 {
                violations.push(Violation::SeveralShiftsOnDay { agent, day });
            }
            if shifts >= 2
                && day + 1 < days
                && assignment.is_assigned(agent, day, shifts - 1)
                && assignment.is_assigned(agent, day + 1, 0)
            {
                violations.push(Violation::NightThenMorning { agent, day });
            }
        }
        let worked = assignment.shifts_worked(agent);
        if worked > instance.max_shifts as usize {
            violations.push(Violation::ShiftCapExceeded {
                agent,
                worked,
                cap: instance.max_shifts,
            });
        }
    }

    for day in 0..days {
        for shift in 0..shifts {
            let assigned = assignment.coverage(day, shift);
            let demand = instance.demand[day][shift];
            if assigned < demand {
                violations.push(Violation::Undercovered {
                    day,
                    shift,
                    assigned,
                    demand,
                });
            }
        }
    }
    violations
}

pub fn verify_project_schedule(
    schedule: &ProjectSchedule,
    instance: &ProjectInstance,
    tolerance: f64,
) -> Vec<Violation> {
    let mut violations = Vec::new();

    for (task, duration) in instance.tasks() {
        let Some(scheduled) = schedule.task(task) else {
            violations.push(Violation::MissingTask { task });
            continue;
        };
        if scheduled.team >= instance.teams {
            violations.push(Violation::InvalidTeam {
                task,
                team: scheduled.team,
            });
        }
        if scheduled.start < -tolerance {
            violations.push(Violation::NegativeStart { task });
        }
        if task.index > 0 {
            let previous = TaskRef {
                project: task.project,
                index: task.index - 1,
            };
            if let Some(prev) = schedule.task(previous) {
                if scheduled.start < prev.start + prev.duration - tolerance {
                    violations.push(Violation::PrecedenceBroken { task });
                }
            }
        }
        debug_assert!((scheduled.duration - duration).abs() <= tolerance);
    }

    for team in 0..instance.teams {
        let on_team = schedule
            .tasks_on_team(team)
            .sorted_by(|a, b| a.start.total_cmp(&b.start))
            .collect_vec();
        for (first, second) in on_team.iter().tuple_windows() {
            if second.start < first.end - tolerance {
                violations.push(Violation::TeamOverlap {
                    team,
                    first: first.task,
                    second: second.task,
                });
            }
        }
    }

    let last_end = schedule.tasks.iter().map(|t| t.end).fold(0.0, f64::max);
    if schedule.makespan < last_end - tolerance {
        violations.push(Violation::MakespanTooShort {
            makespan: schedule.makespan,
            last_end,
        });
    }
    violations
}
