use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::Limits;
use crate::demand::parse_demand_table_within;
use crate::error::SolveError;
use crate::solver::Certificate;
use crate::validation::check_shift_dimensions;

// Type aliases for clarity
pub type AgentId = usize;
pub type Day = usize;
pub type ShiftSlot = usize;
pub type TeamId = usize;

/// Cost of a regular assignment when no costs are given.
pub const DEFAULT_SHIFT_COST: f64 = 1.0;
/// Cost of the last (night) shift when a day has three or more shifts.
pub const DEFAULT_NIGHT_COST: f64 = 1.8;
pub const DEFAULT_HORIZON_HOURS: f64 = 24.0;

/// A shift-assignment problem: `agents` people, `days × shifts` demand slots.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftInstance {
    pub agents: usize,
    pub days: usize,
    pub shifts: usize,
    /// `demand[d][s]`: minimum agents on shift `s` of day `d`.
    pub demand: Vec<Vec<u32>>,
    /// Per-agent cap on assignments over the whole horizon.
    pub max_shifts: u32,
    /// `cost[e][d][s]`, non-negative.
    pub cost: Vec<Vec<Vec<f64>>>,
}

impl ShiftInstance {
    /// Builds an instance whose day and shift counts come from the demand
    /// table, with default costs.
    pub fn new(agents: usize, demand: Vec<Vec<u32>>, max_shifts: u32) -> Self {
        let days = demand.len();
        let shifts = demand.first().map_or(0, Vec::len);
        Self {
            agents,
            days,
            shifts,
            cost: default_costs(agents, days, shifts),
            demand,
            max_shifts,
        }
    }

    /// Uses the same per-shift cost for every agent and day.
    pub fn with_shift_costs(mut self, per_shift: &[f64]) -> Self {
        self.cost = (0..self.agents)
            .map(|_| (0..self.days).map(|_| per_shift.to_vec()).collect())
            .collect();
        self
    }

    pub fn with_costs(mut self, cost: Vec<Vec<Vec<f64>>>) -> Self {
        self.cost = cost;
        self
    }

    pub fn total_demand(&self) -> u64 {
        self.demand.iter().flatten().map(|&d| u64::from(d)).sum()
    }

    /// Upper bound on assignments the workforce can cover: `agents × max_shifts`.
    pub fn workforce_capacity(&self) -> u64 {
        self.agents as u64 * u64::from(self.max_shifts)
    }
}

/// Unit cost everywhere, with a night surcharge on the last shift once a day
/// has at least three shifts.
pub fn default_costs(agents: usize, days: usize, shifts: usize) -> Vec<Vec<Vec<f64>>> {
    let day: Vec<f64> = (0..shifts)
        .map(|s| {
            // surcharge follows the last shift of the day, not a fixed index
            if shifts >= 3 && s == shifts - 1 {
                DEFAULT_NIGHT_COST
            } else {
                DEFAULT_SHIFT_COST
            }
        })
        .collect();
    vec![vec![day; days]; agents]
}

/// Demand as sent over the wire: either a grid or a demand table in text form.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DemandInput {
    Grid(Vec<Vec<u32>>),
    Table(String),
}

/// The shift-assignment request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftRequest {
    pub agents: usize,
    pub demand: DemandInput,
    pub max_shifts: u32,
    #[serde(default)]
    pub cost: Option<Vec<Vec<Vec<f64>>>>,
    #[serde(default)]
    pub shift_costs: Option<Vec<f64>>,
    #[serde(default)]
    pub time_limit_secs: Option<f64>,
}

impl ShiftRequest {
    /// Checks the request's dimensions against `limits` before any cost
    /// table is built.
    pub fn into_instance(self, limits: &Limits) -> Result<ShiftInstance, SolveError> {
        let demand = match self.demand {
            DemandInput::Grid(grid) => grid,
            DemandInput::Table(text) => {
                parse_demand_table_within(&text, limits.max_days, limits.max_shifts)?
            }
        };
        let days = demand.len();
        let shifts = demand.first().map_or(0, Vec::len);
        check_shift_dimensions(self.agents, days, shifts, limits)?;

        let instance = ShiftInstance::new(self.agents, demand, self.max_shifts);
        Ok(match (self.cost, self.shift_costs) {
            (Some(_), Some(_)) => {
                return Err(SolveError::invalid(
                    "give either `cost` or `shiftCosts`, not both",
                ));
            }
            (Some(cost), None) => instance.with_costs(cost),
            (None, Some(per_shift)) => instance.with_shift_costs(&per_shift),
            (None, None) => instance,
        })
    }
}

/// `grid[e][d][s]` is true iff agent `e` works shift `s` on day `d`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftAssignment {
    pub grid: Vec<Vec<Vec<bool>>>,
}

impl ShiftAssignment {
    pub fn is_assigned(&self, agent: AgentId, day: Day, shift: ShiftSlot) -> bool {
        self.grid[agent][day][shift]
    }

    pub fn shifts_worked(&self, agent: AgentId) -> usize {
        self.grid[agent].iter().flatten().filter(|&&on| on).count()
    }

    pub fn coverage(&self, day: Day, shift: ShiftSlot) -> u32 {
        self.grid.iter().filter(|agent| agent[day][shift]).count() as u32
    }

    pub fn total_cost(&self, instance: &ShiftInstance) -> f64 {
        let mut total = 0.0;
        for (e, agent) in self.grid.iter().enumerate() {
            for (d, day) in agent.iter().enumerate() {
                for (s, &on) in day.iter().enumerate() {
                    if on {
                        total += instance.cost[e][d][s];
                    }
                }
            }
        }
        total
    }
}

/// A project: an ordered chain of task durations (hours).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub durations: Vec<f64>,
}

/// Job-shop instance. Project order matters: the first task of the first
/// project anchors the time origin.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInstance {
    pub projects: Vec<Project>,
    pub teams: usize,
    #[serde(default = "default_horizon")]
    pub horizon_hours: f64,
    /// Optional display names, one per team.
    #[serde(default)]
    pub team_names: Vec<String>,
}

fn default_horizon() -> f64 {
    DEFAULT_HORIZON_HOURS
}

impl ProjectInstance {
    pub fn new(projects: Vec<Project>, teams: usize) -> Self {
        Self {
            projects,
            teams,
            horizon_hours: DEFAULT_HORIZON_HOURS,
            team_names: Vec::new(),
        }
    }

    pub fn with_team_names(mut self, names: Vec<String>) -> Self {
        self.team_names = names;
        self
    }

    /// The team's name when one was given, else `team N` counting from 1.
    pub fn team_label(&self, team: TeamId) -> String {
        self.team_names
            .get(team)
            .cloned()
            .unwrap_or_else(|| format!("team {}", team + 1))
    }

    pub fn with_horizon(mut self, hours: f64) -> Self {
        self.horizon_hours = hours;
        self
    }

    /// Every task in declaration order, with its duration.
    pub fn tasks(&self) -> impl Iterator<Item = (TaskRef, f64)> + '_ {
        self.projects.iter().enumerate().flat_map(|(p, project)| {
            project
                .durations
                .iter()
                .enumerate()
                .map(move |(index, &duration)| (TaskRef { project: p, index }, duration))
        })
    }

    pub fn task_count(&self) -> usize {
        self.projects.iter().map(|p| p.durations.len()).sum()
    }

    pub fn total_workload(&self) -> f64 {
        self.projects.iter().flat_map(|p| &p.durations).sum()
    }

    /// Team-hours available in the horizon.
    pub fn capacity(&self) -> f64 {
        self.teams as f64 * self.horizon_hours
    }
}

/// The project-scheduling request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    pub projects: Vec<Project>,
    pub teams: usize,
    #[serde(default = "default_horizon")]
    pub horizon_hours: f64,
    #[serde(default)]
    pub team_names: Vec<String>,
    #[serde(default)]
    pub time_limit_secs: Option<f64>,
}

impl ProjectRequest {
    pub fn into_instance(self) -> ProjectInstance {
        ProjectInstance::new(self.projects, self.teams)
            .with_horizon(self.horizon_hours)
            .with_team_names(self.team_names)
    }
}

/// Addresses task `index` of project `project` (both by declaration order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    pub project: usize,
    pub index: usize,
}

/// One scheduled task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAssignment {
    pub task: TaskRef,
    pub project_name: String,
    pub team: TeamId,
    pub start: f64,
    pub duration: f64,
    pub end: f64,
}

/// A solved job-shop schedule; tasks sorted by project then task index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSchedule {
    pub tasks: Vec<TaskAssignment>,
    pub makespan: f64,
    pub fits_horizon: bool,
}

impl ProjectSchedule {
    pub fn task(&self, task: TaskRef) -> Option<&TaskAssignment> {
        self.tasks.iter().find(|t| t.task == task)
    }

    pub fn tasks_on_team(&self, team: TeamId) -> impl Iterator<Item = &TaskAssignment> + '_ {
        self.tasks.iter().filter(move |t| t.team == team)
    }
}

/// Suggested fix attached to an infeasible outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RemediationHint {
    AddAgents,
    RaiseMaxShifts,
    ReduceDemand,
    AddTeams,
    ExtendHorizon,
}

impl fmt::Display for RemediationHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RemediationHint::AddAgents => "add more agents",
            RemediationHint::RaiseMaxShifts => "raise the per-agent shift cap",
            RemediationHint::ReduceDemand => "reduce demand on some slots",
            RemediationHint::AddTeams => "add more teams",
            RemediationHint::ExtendHorizon => "extend the planning horizon",
        };
        f.write_str(text)
    }
}

/// A structural problem spotted in an instance before solving.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InstanceFinding {
    #[serde(rename_all = "camelCase")]
    SlotDemandExceedsAgents {
        day: Day,
        shift: ShiftSlot,
        demand: u32,
        agents: usize,
    },
    #[serde(rename_all = "camelCase")]
    DemandExceedsWorkforce { total_demand: u64, capacity: u64 },
}

impl fmt::Display for InstanceFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceFinding::SlotDemandExceedsAgents {
                day,
                shift,
                demand,
                agents,
            } => write!(
                f,
                "day {} shift {} needs {} agents but only {} exist",
                day + 1,
                shift + 1,
                demand,
                agents
            ),
            InstanceFinding::DemandExceedsWorkforce {
                total_demand,
                capacity,
            } => write!(
                f,
                "total demand of {total_demand} shifts exceeds workforce capacity of {capacity}"
            ),
        }
    }
}

/// What an infeasible outcome carries: the solver's conflict set as data,
/// plus hints and any findings from the instance itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfeasibilityDiagnostic {
    pub certificate: Option<Certificate>,
    pub hints: Vec<RemediationHint>,
    pub findings: Vec<InstanceFinding>,
}

/// The fully-resolved result of one solve request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SolverOutcome<T> {
    #[serde(rename_all = "camelCase")]
    Optimal {
        objective_value: f64,
        runtime_seconds: f64,
        assignment: T,
    },
    #[serde(rename_all = "camelCase")]
    Infeasible { diagnostic: InfeasibilityDiagnostic },
    /// Budget exhausted; carries the best incumbent when one was found.
    #[serde(rename_all = "camelCase")]
    TimedOut {
        best_objective: Option<f64>,
        incumbent: Option<T>,
        runtime_seconds: f64,
    },
    #[serde(rename_all = "camelCase")]
    Error { error: SolveError },
}

impl<T> SolverOutcome<T> {
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolverOutcome::Optimal { .. })
    }

    pub fn assignment(&self) -> Option<&T> {
        match self {
            SolverOutcome::Optimal { assignment, .. } => Some(assignment),
            SolverOutcome::TimedOut { incumbent, .. } => incumbent.as_ref(),
            _ => None,
        }
    }

    pub fn objective_value(&self) -> Option<f64> {
        match self {
            SolverOutcome::Optimal {
                objective_value, ..
            } => Some(*objective_value),
            SolverOutcome::TimedOut { best_objective, .. } => *best_objective,
            _ => None,
        }
    }

    pub fn runtime_seconds(&self) -> Option<f64> {
        match self {
            SolverOutcome::Optimal {
                runtime_seconds, ..
            }
            | SolverOutcome::TimedOut {
                runtime_seconds, ..
            } => Some(*runtime_seconds),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SolveError> {
        match self {
            SolverOutcome::Error { error } => Some(error),
            _ => None,
        }
    }
}

impl<T> From<SolveError> for SolverOutcome<T> {
    fn from(error: SolveError) -> Self {
        SolverOutcome::Error { error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_costs_surcharge_last_shift_only_with_three_or_more() {
        let three = default_costs(2, 1, 3);
        assert_eq!(three[1][0], vec![1.0, 1.0, 1.8]);
        let four = default_costs(1, 2, 4);
        assert_eq!(four[0][1], vec![1.0, 1.0, 1.0, 1.8]);
        let two = default_costs(1, 1, 2);
        assert_eq!(two[0][0], vec![1.0, 1.0]);
    }

    #[test]
    fn instance_dimensions_follow_demand() {
        let instance = ShiftInstance::new(4, vec![vec![1, 2, 1], vec![0, 1, 1]], 3);
        assert_eq!((instance.days, instance.shifts), (2, 3));
        assert_eq!(instance.total_demand(), 6);
        assert_eq!(instance.workforce_capacity(), 12);
        assert_eq!(instance.cost.len(), 4);
    }

    #[test]
    fn request_accepts_table_and_shift_costs() {
        let request: ShiftRequest = serde_json::from_str(
            r#"{"agents": 3, "demand": "1,2\n0,1\n", "maxShifts": 2, "shiftCosts": [2.0, 3.0]}"#,
        )
        .unwrap();
        let instance = request.into_instance(&Limits::default()).unwrap();
        assert_eq!(instance.demand, vec![vec![1, 2], vec![0, 1]]);
        assert_eq!(instance.cost[2][1], vec![2.0, 3.0]);
    }

    #[test]
    fn request_rejects_both_cost_forms() {
        let request: ShiftRequest = serde_json::from_str(
            r#"{"agents": 1, "demand": [[1]], "maxShifts": 1, "cost": [[[1.0]]], "shiftCosts": [1.0]}"#,
        )
        .unwrap();
        assert!(matches!(
            request.into_instance(&Limits::default()),
            Err(SolveError::InvalidInstance { .. })
        ));
    }

    #[test]
    fn oversized_request_is_rejected_before_costs_exist() {
        let request: ShiftRequest = serde_json::from_str(
            r#"{"agents": 1000000000000, "demand": [[1]], "maxShifts": 1}"#,
        )
        .unwrap();
        let err = request.into_instance(&Limits::default()).unwrap_err();
        assert!(err.to_string().contains("agents exceed the limit"));

        let long_table = "1\n".repeat(400);
        let request = ShiftRequest {
            agents: 2,
            demand: DemandInput::Table(long_table),
            max_shifts: 1,
            cost: None,
            shift_costs: None,
            time_limit_secs: None,
        };
        assert!(request.into_instance(&Limits::default()).is_err());
    }

    #[test]
    fn project_instance_totals() {
        let instance = ProjectInstance::new(
            vec![
                Project {
                    name: "alpha".into(),
                    durations: vec![3.0, 2.0],
                },
                Project {
                    name: "beta".into(),
                    durations: vec![4.0],
                },
            ],
            2,
        );
        assert_eq!(instance.task_count(), 3);
        assert_eq!(instance.total_workload(), 9.0);
        assert_eq!(instance.capacity(), 48.0);
        let refs: Vec<_> = instance.tasks().map(|(t, _)| (t.project, t.index)).collect();
        assert_eq!(refs, vec![(0, 0), (0, 1), (1, 0)]);
    }

    #[test]
    fn project_request_defaults_the_horizon() {
        let request: ProjectRequest = serde_json::from_str(
            r#"{"projects": [{"name": "alpha", "durations": [2.5, 1]}], "teams": 2}"#,
        )
        .unwrap();
        assert_eq!(request.time_limit_secs, None);
        let instance = request.into_instance();
        assert_eq!(instance.horizon_hours, DEFAULT_HORIZON_HOURS);
        assert_eq!(instance.projects[0].durations, vec![2.5, 1.0]);
        assert_eq!(instance.team_label(1), "team 2");

        let named: ProjectRequest = serde_json::from_str(
            r#"{"projects": [{"name": "alpha", "durations": [1]}], "teams": 2, "teamNames": ["red", "blue"]}"#,
        )
        .unwrap();
        assert_eq!(named.into_instance().team_label(1), "blue");
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome: SolverOutcome<ShiftAssignment> = SolveError::OverCapacity {
            workload: 50.0,
            capacity: 48.0,
        }
        .into();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"]["kind"], "overCapacity");
        assert_eq!(json["error"]["workload"], 50.0);
    }
}
