//! The narrow boundary to a MILP engine.
//!
//! Formulations never talk to a solver directly: a [`crate::milp::MilpModel`]
//! is loaded into a [`SolverAdapter`], solved, and read back through it.

mod highs;

pub use highs::HighsAdapter;

use serde::Serialize;
use std::time::Duration;

use crate::error::SolveError;
use crate::milp::{ConstraintName, LinearExpr, Relation, Sense, VarId};

/// Status of the last solve.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    /// The time budget ran out; `incumbent` tells whether the values read
    /// back form a feasible point.
    TimedOut { incumbent: bool },
    Error(String),
}

/// An infeasible subsystem reported by the solver, as named constraints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub constraints: Vec<ConstraintName>,
    /// False when the search budget ran out before the set was minimal.
    pub irreducible: bool,
    pub solves: usize,
}

impl Certificate {
    pub fn families(&self) -> Vec<&'static str> {
        let mut families: Vec<&'static str> = self.constraints.iter().map(|c| c.family).collect();
        families.sort_unstable();
        families.dedup();
        families
    }

    pub fn contains_family(&self, family: &str) -> bool {
        self.constraints.iter().any(|c| c.family == family)
    }
}

/// MILP solving capability.
///
/// One adapter owns one model; it is never shared between solves.
pub trait SolverAdapter {
    fn name(&self) -> &'static str;

    fn add_bounded_variable(&mut self, lower: f64, upper: Option<f64>) -> VarId;

    fn add_continuous_variable(&mut self, lower: f64) -> VarId {
        self.add_bounded_variable(lower, None)
    }

    fn add_binary_variable(&mut self) -> VarId;

    fn add_linear_constraint(
        &mut self,
        name: ConstraintName,
        expr: LinearExpr,
        relation: Relation,
        rhs: f64,
    );

    fn set_objective(&mut self, expr: LinearExpr, sense: Sense);

    /// Blocks until the model is solved or `time_budget` elapses.
    fn solve(&mut self, time_budget: Option<Duration>) -> SolveStatus;

    /// Value of `var` in the last solution; `None` when there is none.
    fn value(&self, var: VarId) -> Option<f64>;

    /// Valid only after a solve that returned [`SolveStatus::Infeasible`].
    fn infeasibility_certificate(&mut self) -> Result<Certificate, SolveError>;
}
