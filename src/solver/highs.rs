use good_lp::solvers::SolutionStatus;
use good_lp::solvers::highs::highs;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable, constraint,
    variable,
};
use itertools::Itertools;
use log::{debug, info, trace, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use super::{Certificate, SolveStatus, SolverAdapter};
use crate::config::SolverConfig;
use crate::error::SolveError;
use crate::milp::{ConstraintName, LinearExpr, MilpModel, Relation, Sense, VarId, VariableKind};

pub const BACKEND_NAME: &str = "highs";

/// HiGHS through `good_lp`.
///
/// The adapter keeps the model it was given, so the same model can be
/// re-solved with subsets of its constraints when an infeasibility
/// certificate is requested.
#[derive(Debug)]
pub struct HighsAdapter {
    config: SolverConfig,
    model: MilpModel,
    values: Option<Vec<f64>>,
    last_status: Option<SolveStatus>,
    last_budget: Option<Duration>,
}

impl HighsAdapter {
    pub fn from_config(config: &SolverConfig) -> Result<Self, SolveError> {
        if !config.backend.eq_ignore_ascii_case(BACKEND_NAME) {
            return Err(SolveError::SolverUnavailable {
                backend: config.backend.clone(),
                reason: format!("this build only links the '{BACKEND_NAME}' backend"),
            });
        }
        Ok(Self {
            config: config.clone(),
            model: MilpModel::new(),
            values: None,
            last_status: None,
            last_budget: None,
        })
    }

    /// Re-solves with only the `active` rows, within whatever is left before
    /// `deadline`. `None` means the answer is unknown.
    fn is_still_infeasible(&self, active: &[bool], deadline: Instant) -> Option<bool> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        let budget = self.last_budget.map_or(remaining, |b| b.min(remaining));
        match run_guarded(&self.model, active, false, Some(budget), &self.config).status {
            SolveStatus::Infeasible => Some(true),
            SolveStatus::Optimal => Some(false),
            _ => None,
        }
    }
}

impl SolverAdapter for HighsAdapter {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn add_bounded_variable(&mut self, lower: f64, upper: Option<f64>) -> VarId {
        self.model.add_bounded(lower, upper)
    }

    fn add_binary_variable(&mut self) -> VarId {
        self.model.add_binary()
    }

    fn add_linear_constraint(
        &mut self,
        name: ConstraintName,
        expr: LinearExpr,
        relation: Relation,
        rhs: f64,
    ) {
        self.model.add_constraint(name, expr, relation, rhs);
    }

    fn set_objective(&mut self, expr: LinearExpr, sense: Sense) {
        self.model.set_objective(expr, sense);
    }

    fn solve(&mut self, time_budget: Option<Duration>) -> SolveStatus {
        info!(
            "Starting HiGHS on {} variables ({} binary) and {} constraints...",
            self.model.num_variables(),
            self.model.num_binaries(),
            self.model.num_constraints()
        );
        let start_time = Instant::now();
        let active = vec![true; self.model.num_constraints()];
        let run = run_guarded(&self.model, &active, true, time_budget, &self.config);
        info!("HiGHS finished with {:?} in {:.2?}", run.status, start_time.elapsed());

        self.values = run.values;
        self.last_status = Some(run.status.clone());
        self.last_budget = time_budget;
        run.status
    }

    fn value(&self, var: VarId) -> Option<f64> {
        self.values.as_ref().and_then(|values| values.get(var.0).copied())
    }

    /// Deletion filter: drop whole constraint families first, then single
    /// constraints, keeping a removal only while the rest stays infeasible.
    fn infeasibility_certificate(&mut self) -> Result<Certificate, SolveError> {
        if self.last_status != Some(SolveStatus::Infeasible) {
            return Err(SolveError::internal(
                "infeasibility certificate requested without an infeasible solve",
            ));
        }

        let constraints = self.model.constraints();
        let max_solves = self.config.certificate_max_solves;
        let started = Instant::now();
        let deadline = started + self.config.certificate_time_limit();
        let mut active = vec![true; constraints.len()];
        let mut solves = 0usize;
        let mut exhausted = false;

        let families: Vec<&'static str> = constraints.iter().map(|c| c.name.family).unique().collect();
        for family in families {
            let members: Vec<usize> = constraints
                .iter()
                .positions(|c| c.name.family == family)
                .collect();
            // singletons are covered by the per-constraint pass
            if members.len() < 2 {
                continue;
            }
            if solves >= max_solves || Instant::now() >= deadline {
                exhausted = true;
                break;
            }
            for &i in &members {
                active[i] = false;
            }
            solves += 1;
            match self.is_still_infeasible(&active, deadline) {
                Some(true) => debug!("Family '{family}' is not part of the conflict"),
                Some(false) => {
                    for &i in &members {
                        active[i] = true;
                    }
                }
                // an undecided removal is undone; the kept set stays infeasible
                None => {
                    for &i in &members {
                        active[i] = true;
                    }
                    exhausted = true;
                    break;
                }
            }
        }

        for i in 0..constraints.len() {
            if exhausted {
                break;
            }
            if !active[i] {
                continue;
            }
            if solves >= max_solves || Instant::now() >= deadline {
                exhausted = true;
                break;
            }
            active[i] = false;
            solves += 1;
            match self.is_still_infeasible(&active, deadline) {
                Some(true) => trace!("Dropped {} from the conflict set", constraints[i].name),
                Some(false) => active[i] = true,
                None => {
                    active[i] = true;
                    exhausted = true;
                }
            }
        }

        if exhausted {
            warn!(
                "Certificate search stopped after {solves} solves in {:.2?}; the set may not be minimal",
                started.elapsed()
            );
        }
        let conflict: Vec<ConstraintName> = constraints
            .iter()
            .zip(&active)
            .filter(|(_, on)| **on)
            .map(|(c, _)| c.name.clone())
            .collect();
        info!("Infeasible subsystem has {} constraint(s)", conflict.len());

        Ok(Certificate {
            constraints: conflict,
            irreducible: !exhausted,
            solves,
        })
    }
}

struct Run {
    status: SolveStatus,
    values: Option<Vec<f64>>,
}

/// A panic inside the solver must not take the host process down.
fn run_guarded(
    model: &MilpModel,
    active: &[bool],
    with_objective: bool,
    budget: Option<Duration>,
    config: &SolverConfig,
) -> Run {
    panic::catch_unwind(AssertUnwindSafe(|| {
        run_highs(model, active, with_objective, budget, config)
    }))
    .unwrap_or_else(|payload| Run {
        status: SolveStatus::Error(format!("solver panicked: {}", panic_message(&*payload))),
        values: None,
    })
}

fn run_highs(
    model: &MilpModel,
    active: &[bool],
    with_objective: bool,
    budget: Option<Duration>,
    config: &SolverConfig,
) -> Run {
    let mut problem = ProblemVariables::new();
    let handles: Vec<Variable> = model
        .variables()
        .iter()
        .map(|kind| match *kind {
            VariableKind::Binary => problem.add(variable().binary()),
            VariableKind::Continuous { lower, upper } => match upper {
                Some(upper) => problem.add(variable().min(lower).max(upper)),
                None => problem.add(variable().min(lower)),
            },
        })
        .collect();

    let objective = if with_objective {
        to_expression(model.objective(), &handles)
    } else {
        Expression::from(0.0)
    };
    let unsolved = match model.sense() {
        Sense::Minimise => problem.minimise(objective),
        Sense::Maximise => problem.maximise(objective),
    };

    let mut solver = unsolved
        .using(highs)
        .set_option("threads", config.threads as i32) // reproducible runs
        .set_option("random_seed", config.random_seed as i32)
        .set_option("log_to_console", config.log_to_console);
    if let Some(budget) = budget {
        solver = solver.set_option("time_limit", budget.as_secs_f64());
    }

    for row in model
        .constraints()
        .iter()
        .zip(active)
        .filter_map(|(row, &on)| on.then_some(row))
    {
        let lhs = to_expression(&row.expr, &handles);
        let rhs = row.rhs;
        let built = match row.relation {
            Relation::Le => constraint!(lhs <= rhs),
            Relation::Ge => constraint!(lhs >= rhs),
            Relation::Eq => constraint!(lhs == rhs),
        };
        solver.add_constraint(built);
    }

    match solver.solve() {
        Ok(solution) => {
            // with no incumbent HiGHS may hand back no columns at all
            let values = panic::catch_unwind(AssertUnwindSafe(|| {
                handles.iter().map(|h| solution.value(*h)).collect::<Vec<f64>>()
            }))
            .ok();
            match solution.status() {
                SolutionStatus::TimeLimit => {
                    let values = values
                        .filter(|v| model.is_feasible_point(v, config.feasibility_tolerance));
                    Run {
                        status: SolveStatus::TimedOut {
                            incumbent: values.is_some(),
                        },
                        values,
                    }
                }
                _ => match values {
                    Some(values) => Run {
                        status: SolveStatus::Optimal,
                        values: Some(values),
                    },
                    None => Run {
                        status: SolveStatus::Error("solver reported a solution without values".into()),
                        values: None,
                    },
                },
            }
        }
        Err(ResolutionError::Infeasible) => Run {
            status: SolveStatus::Infeasible,
            values: None,
        },
        Err(e) => Run {
            status: SolveStatus::Error(e.to_string()),
            values: None,
        },
    }
}

fn to_expression(expr: &LinearExpr, handles: &[Variable]) -> Expression {
    expr.terms()
        .iter()
        .map(|(var, coefficient)| *coefficient * handles[var.0])
        .sum()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
