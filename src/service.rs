//! Caller-facing entry points: validate, build, solve, interpret.
//!
//! Every call is synchronous and owns its model and adapter; the result is a
//! fully resolved [`SolverOutcome`].

use log::{info, warn};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::data::{
    InfeasibilityDiagnostic, ProjectInstance, ProjectSchedule, RemediationHint,
    ShiftAssignment, ShiftInstance, SolverOutcome,
};
use crate::error::SolveError;
use crate::formulation::{CapacityCheck, ProjectFormulation, ShiftFormulation};
use crate::interpret::{read_project_schedule, read_shift_assignment};
use crate::solver::{Certificate, HighsAdapter, SolveStatus, SolverAdapter};
use crate::validation::{
    diagnose_shift_instance, validate_project_instance, validate_shift_instance,
    verify_project_schedule, verify_shift_assignment,
};

const SHIFT_HINTS: [RemediationHint; 3] = [
    RemediationHint::AddAgents,
    RemediationHint::RaiseMaxShifts,
    RemediationHint::ReduceDemand,
];
const PROJECT_HINTS: [RemediationHint; 2] = [RemediationHint::AddTeams, RemediationHint::ExtendHorizon];

/// Turns a caller-supplied number of seconds into a solve budget.
pub fn budget_from_secs(secs: Option<f64>) -> Result<Option<Duration>, SolveError> {
    match secs {
        None => Ok(None),
        Some(s) if s.is_finite() && s > 0.0 => Ok(Some(Duration::from_secs_f64(s))),
        Some(s) => Err(SolveError::invalid(format!(
            "time limit must be a positive number of seconds, got {s}"
        ))),
    }
}

/// Solves with HiGHS. `time_budget` overrides the configured limit.
pub fn solve_shift_assignment(
    instance: &ShiftInstance,
    time_budget: Option<Duration>,
    config: &Config,
) -> SolverOutcome<ShiftAssignment> {
    match HighsAdapter::from_config(&config.solver) {
        Ok(mut adapter) => solve_shift_assignment_with(instance, time_budget, config, &mut adapter),
        Err(e) => e.into(),
    }
}

pub fn solve_shift_assignment_with<A: SolverAdapter + ?Sized>(
    instance: &ShiftInstance,
    time_budget: Option<Duration>,
    config: &Config,
    adapter: &mut A,
) -> SolverOutcome<ShiftAssignment> {
    let budget = time_budget.or_else(|| config.solver.time_limit());
    run_shift(instance, budget, config, adapter).unwrap_or_else(|e| {
        warn!("Shift solve failed: {e}");
        e.into()
    })
}

fn run_shift<A: SolverAdapter + ?Sized>(
    instance: &ShiftInstance,
    budget: Option<Duration>,
    config: &Config,
    adapter: &mut A,
) -> Result<SolverOutcome<ShiftAssignment>, SolveError> {
    let start_time = Instant::now();
    validate_shift_instance(instance, &config.limits)?;
    let findings = diagnose_shift_instance(instance);
    for finding in &findings {
        warn!("Instance finding: {finding}");
    }

    let formulation = ShiftFormulation::build(instance);
    let loaded = formulation.model.load_into(adapter);
    let status = adapter.solve(budget);

    let extract = |adapter: &A| -> Result<ShiftAssignment, SolveError> {
        let assignment = read_shift_assignment(&formulation, |v| adapter.value(loaded.resolve(v)))?;
        let violations = verify_shift_assignment(&assignment, instance);
        if let Some(first) = violations.first() {
            return Err(SolveError::internal(format!(
                "solver returned an assignment with {} violation(s), first: {first}",
                violations.len()
            )));
        }
        Ok(assignment)
    };

    let outcome = match status {
        SolveStatus::Optimal => {
            let assignment = extract(&*adapter)?;
            let objective_value = assignment.total_cost(instance);
            info!("Optimal shift assignment with cost {objective_value:.2}");
            SolverOutcome::Optimal {
                objective_value,
                runtime_seconds: start_time.elapsed().as_secs_f64(),
                assignment,
            }
        }
        SolveStatus::Infeasible => {
            warn!("Shift instance is infeasible");
            SolverOutcome::Infeasible {
                diagnostic: InfeasibilityDiagnostic {
                    certificate: certificate_of(adapter),
                    hints: SHIFT_HINTS.to_vec(),
                    findings,
                },
            }
        }
        SolveStatus::TimedOut { incumbent } => {
            warn!("Shift solve hit its time budget (incumbent: {incumbent})");
            let incumbent = if incumbent { usable_incumbent(extract(&*adapter)) } else { None };
            SolverOutcome::TimedOut {
                best_objective: incumbent.as_ref().map(|a| a.total_cost(instance)),
                incumbent,
                runtime_seconds: start_time.elapsed().as_secs_f64(),
            }
        }
        SolveStatus::Error(message) => return Err(SolveError::Internal { message }),
    };
    Ok(outcome)
}

/// Solves with HiGHS under the configured time limit.
pub fn solve_project_schedule(
    instance: &ProjectInstance,
    config: &Config,
) -> SolverOutcome<ProjectSchedule> {
    match HighsAdapter::from_config(&config.solver) {
        Ok(mut adapter) => solve_project_schedule_with(instance, config, &mut adapter),
        Err(e) => e.into(),
    }
}

pub fn solve_project_schedule_with<A: SolverAdapter + ?Sized>(
    instance: &ProjectInstance,
    config: &Config,
    adapter: &mut A,
) -> SolverOutcome<ProjectSchedule> {
    run_project(instance, config, adapter).unwrap_or_else(|e| {
        warn!("Project solve failed: {e}");
        e.into()
    })
}

fn run_project<A: SolverAdapter + ?Sized>(
    instance: &ProjectInstance,
    config: &Config,
    adapter: &mut A,
) -> Result<SolverOutcome<ProjectSchedule>, SolveError> {
    let start_time = Instant::now();
    validate_project_instance(instance, &config.limits)?;
    CapacityCheck::of(instance).ensure_fits()?;

    let formulation = ProjectFormulation::build(instance);
    let loaded = formulation.model.load_into(adapter);
    let status = adapter.solve(config.solver.time_limit());
    let tolerance = config.solver.feasibility_tolerance * formulation.big_m.max(1.0);

    let extract = |adapter: &A| -> Result<ProjectSchedule, SolveError> {
        let schedule =
            read_project_schedule(&formulation, instance, |v| adapter.value(loaded.resolve(v)))?;
        let violations = verify_project_schedule(&schedule, instance, tolerance);
        if let Some(first) = violations.first() {
            return Err(SolveError::internal(format!(
                "solver returned a schedule with {} violation(s), first: {first}",
                violations.len()
            )));
        }
        Ok(schedule)
    };

    let outcome = match status {
        SolveStatus::Optimal => {
            let schedule = extract(&*adapter)?;
            if !schedule.fits_horizon {
                warn!(
                    "Makespan {:.2}h runs past the {}h horizon",
                    schedule.makespan, instance.horizon_hours
                );
            }
            info!("Optimal project schedule with makespan {:.2}h", schedule.makespan);
            SolverOutcome::Optimal {
                objective_value: schedule.makespan,
                runtime_seconds: start_time.elapsed().as_secs_f64(),
                assignment: schedule,
            }
        }
        SolveStatus::Infeasible => {
            warn!("Project instance is infeasible");
            SolverOutcome::Infeasible {
                diagnostic: InfeasibilityDiagnostic {
                    certificate: certificate_of(adapter),
                    hints: PROJECT_HINTS.to_vec(),
                    findings: Vec::new(),
                },
            }
        }
        SolveStatus::TimedOut { incumbent } => {
            warn!("Project solve hit its time budget (incumbent: {incumbent})");
            let incumbent = if incumbent { usable_incumbent(extract(&*adapter)) } else { None };
            SolverOutcome::TimedOut {
                best_objective: incumbent.as_ref().map(|s| s.makespan),
                incumbent,
                runtime_seconds: start_time.elapsed().as_secs_f64(),
            }
        }
        SolveStatus::Error(message) => return Err(SolveError::Internal { message }),
    };
    Ok(outcome)
}

fn certificate_of<A: SolverAdapter + ?Sized>(adapter: &mut A) -> Option<Certificate> {
    match adapter.infeasibility_certificate() {
        Ok(certificate) => {
            info!("Conflicting constraint families: {:?}", certificate.families());
            Some(certificate)
        }
        Err(e) => {
            warn!("No infeasibility certificate from {}: {e}", adapter.name());
            None
        }
    }
}

fn usable_incumbent<T>(extracted: Result<T, SolveError>) -> Option<T> {
    extracted
        .map_err(|e| warn!("Discarding incumbent: {e}"))
        .ok()
}
