//! End-to-end solves against HiGHS.

use std::time::Duration;

use roster_solver::config::Config;
use roster_solver::data::{Project, ProjectInstance, ShiftInstance, SolverOutcome, TaskRef};
use roster_solver::error::SolveError;
use roster_solver::formulation::shift::COVERAGE;
use roster_solver::milp::{ConstraintName, LinearExpr, Relation, Sense, VarId};
use roster_solver::solver::{Certificate, HighsAdapter, SolveStatus, SolverAdapter};
use roster_solver::validation::{verify_project_schedule, verify_shift_assignment};
use roster_solver::{
    solve_project_schedule, solve_project_schedule_with, solve_shift_assignment,
    solve_shift_assignment_with,
};

const EPS: f64 = 1e-6;

/// Counts solves while delegating to HiGHS.
struct CountingAdapter {
    inner: HighsAdapter,
    solves: usize,
}

impl CountingAdapter {
    fn new(config: &Config) -> Self {
        Self {
            inner: HighsAdapter::from_config(&config.solver).unwrap(),
            solves: 0,
        }
    }
}

impl SolverAdapter for CountingAdapter {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn add_bounded_variable(&mut self, lower: f64, upper: Option<f64>) -> VarId {
        self.inner.add_bounded_variable(lower, upper)
    }

    fn add_binary_variable(&mut self) -> VarId {
        self.inner.add_binary_variable()
    }

    fn add_linear_constraint(&mut self, name: ConstraintName, expr: LinearExpr, relation: Relation, rhs: f64) {
        self.inner.add_linear_constraint(name, expr, relation, rhs)
    }

    fn set_objective(&mut self, expr: LinearExpr, sense: Sense) {
        self.inner.set_objective(expr, sense)
    }

    fn solve(&mut self, time_budget: Option<Duration>) -> SolveStatus {
        self.solves += 1;
        self.inner.solve(time_budget)
    }

    fn value(&self, var: VarId) -> Option<f64> {
        self.inner.value(var)
    }

    fn infeasibility_certificate(&mut self) -> Result<Certificate, SolveError> {
        self.inner.infeasibility_certificate()
    }
}

fn projects(chains: &[&[f64]], teams: usize) -> ProjectInstance {
    ProjectInstance::new(
        chains
            .iter()
            .enumerate()
            .map(|(i, durations)| Project {
                name: format!("project-{}", i + 1),
                durations: durations.to_vec(),
            })
            .collect(),
        teams,
    )
}

#[test]
fn scenario_a_both_agents_cover_the_single_shift() {
    let instance = ShiftInstance::new(2, vec![vec![2]], 1).with_shift_costs(&[1.5]);
    let outcome = solve_shift_assignment(&instance, None, &Config::default());
    let SolverOutcome::Optimal {
        objective_value,
        assignment,
        ..
    } = outcome
    else {
        panic!("expected optimal, got {outcome:?}");
    };
    assert!(assignment.is_assigned(0, 0, 0));
    assert!(assignment.is_assigned(1, 0, 0));
    assert!((objective_value - 3.0).abs() < EPS);
}

#[test]
fn scenario_b_single_agent_cannot_meet_demand_of_two() {
    let instance = ShiftInstance::new(1, vec![vec![2]], 1);
    let outcome = solve_shift_assignment(&instance, None, &Config::default());
    let SolverOutcome::Infeasible { diagnostic } = outcome else {
        panic!("expected infeasible, got {outcome:?}");
    };
    let certificate = diagnostic.certificate.expect("HiGHS supports certificates");
    assert!(certificate.contains_family(COVERAGE));
    assert!(!diagnostic.hints.is_empty());
    assert!(!diagnostic.findings.is_empty());
}

#[test]
fn scenario_c_tasks_of_one_project_run_back_to_back() {
    let instance = projects(&[&[3.0, 2.0]], 1);
    let outcome = solve_project_schedule(&instance, &Config::default());
    let SolverOutcome::Optimal { assignment, .. } = outcome else {
        panic!("expected optimal, got {outcome:?}");
    };
    assert!((assignment.makespan - 5.0).abs() < EPS);
    let second = assignment.task(TaskRef { project: 0, index: 1 }).unwrap();
    assert!((second.start - 3.0).abs() < EPS);
}

#[test]
fn scenario_d_one_team_serialises_the_projects() {
    let instance = projects(&[&[4.0], &[4.0]], 1);
    let outcome = solve_project_schedule(&instance, &Config::default());
    let makespan = outcome.objective_value().expect("optimal schedule");
    assert!((makespan - 8.0).abs() < EPS);
}

#[test]
fn scenario_e_two_teams_run_in_parallel() {
    let instance = projects(&[&[4.0], &[4.0]], 2);
    let outcome = solve_project_schedule(&instance, &Config::default());
    let schedule = outcome.assignment().expect("optimal schedule");
    assert!((schedule.makespan - 4.0).abs() < EPS);
    assert_ne!(schedule.tasks[0].team, schedule.tasks[1].team);
}

#[test]
fn over_capacity_skips_the_solver() {
    let config = Config::default();
    let instance = projects(&[&[10.0, 10.0], &[10.0]], 1).with_horizon(24.0);
    let mut adapter = CountingAdapter::new(&config);
    let outcome = solve_project_schedule_with(&instance, &config, &mut adapter);
    assert!(matches!(
        outcome.error(),
        Some(SolveError::OverCapacity { workload, capacity }) if *workload == 30.0 && *capacity == 24.0
    ));
    assert_eq!(adapter.solves, 0);
}

#[test]
fn week_of_three_shifts_satisfies_every_rule() {
    let config = Config::default();
    let instance = ShiftInstance::new(6, vec![vec![2, 1, 1]; 7], 5);
    let mut adapter = CountingAdapter::new(&config);
    let outcome = solve_shift_assignment_with(&instance, None, &config, &mut adapter);
    assert_eq!(adapter.solves, 1);

    let SolverOutcome::Optimal {
        objective_value,
        assignment,
        ..
    } = outcome
    else {
        panic!("expected optimal, got {outcome:?}");
    };
    assert!(verify_shift_assignment(&assignment, &instance).is_empty());
    // costs are positive, so the optimum staffs exactly the demand
    assert!((objective_value - 7.0 * (2.0 + 1.0 + 1.8)).abs() < EPS);
}

#[test]
fn repeated_solves_reach_the_same_objective() {
    let config = Config::default();
    let instance = ShiftInstance::new(4, vec![vec![1, 2], vec![2, 1], vec![1, 1]], 3);
    let first = solve_shift_assignment(&instance, None, &config).objective_value();
    let second = solve_shift_assignment(&instance, None, &config).objective_value();
    assert!(first.is_some());
    assert_eq!(first, second);
}

#[test]
fn mixed_projects_respect_precedence_and_team_exclusion() {
    let config = Config::default();
    let instance = projects(&[&[2.0, 3.0], &[4.0], &[1.0, 1.0, 1.0]], 2);
    let outcome = solve_project_schedule(&instance, &config);
    let schedule = outcome.assignment().expect("optimal schedule");
    assert!(verify_project_schedule(schedule, &instance, EPS).is_empty());
    // 12 hours of work on two teams, reachable as 6 + 6
    assert!((schedule.makespan - 6.0).abs() < EPS);
    assert!(schedule.fits_horizon);
    assert_eq!(schedule.tasks[0].start, 0.0);
}

#[test]
fn request_budget_overrides_the_configured_limit() {
    let config = Config::default();
    let instance = ShiftInstance::new(3, vec![vec![1, 1]; 3], 3);
    let outcome = solve_shift_assignment(&instance, Some(Duration::from_secs(30)), &config);
    assert!(outcome.is_optimal());
    assert!(outcome.runtime_seconds().unwrap() < 30.0);
}
