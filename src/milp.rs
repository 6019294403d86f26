use serde::Serialize;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Neg, Sub};

use crate::solver::SolverAdapter;

/// Handle of a decision variable, either inside a [`MilpModel`] or inside a
/// solver adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

/// Domain of a decision variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VariableKind {
    Continuous { lower: f64, upper: Option<f64> },
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Relation {
    Le,
    Ge,
    Eq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sense {
    Minimise,
    Maximise,
}

/// A linear expression `Σ coef·var + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    pub fn term(var: VarId, coefficient: f64) -> Self {
        Self {
            terms: vec![(var, coefficient)],
            constant: 0.0,
        }
    }

    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        self.terms.push((var, coefficient));
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant_part(&self) -> f64 {
        self.constant
    }

    /// Evaluates the expression, looking every variable up through `value`.
    pub fn evaluate(&self, value: impl Fn(VarId) -> f64) -> f64 {
        self.terms
            .iter()
            .map(|(var, coefficient)| coefficient * value(*var))
            .sum::<f64>()
            + self.constant
    }

    /// Rewrites every variable handle through `map`.
    pub fn remap(&self, map: impl Fn(VarId) -> VarId) -> Self {
        Self {
            terms: self
                .terms
                .iter()
                .map(|(var, coefficient)| (map(*var), *coefficient))
                .collect(),
            constant: self.constant,
        }
    }
}

impl From<VarId> for LinearExpr {
    fn from(var: VarId) -> Self {
        LinearExpr::term(var, 1.0)
    }
}

impl From<f64> for LinearExpr {
    fn from(value: f64) -> Self {
        LinearExpr::constant(value)
    }
}

impl<R: Into<LinearExpr>> Add<R> for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: R) -> LinearExpr {
        let rhs = rhs.into();
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
        self
    }
}

impl<R: Into<LinearExpr>> Sub<R> for LinearExpr {
    type Output = LinearExpr;

    fn sub(self, rhs: R) -> LinearExpr {
        self + (-rhs.into())
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;

    fn neg(self) -> LinearExpr {
        self * -1.0
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;

    fn mul(mut self, factor: f64) -> LinearExpr {
        for (_, coefficient) in &mut self.terms {
            *coefficient *= factor;
        }
        self.constant *= factor;
        self
    }
}

impl Mul<LinearExpr> for f64 {
    type Output = LinearExpr;

    fn mul(self, expr: LinearExpr) -> LinearExpr {
        expr * self
    }
}

impl Mul<VarId> for f64 {
    type Output = LinearExpr;

    fn mul(self, var: VarId) -> LinearExpr {
        LinearExpr::term(var, self)
    }
}

impl Sub<LinearExpr> for f64 {
    type Output = LinearExpr;

    fn sub(self, expr: LinearExpr) -> LinearExpr {
        LinearExpr::constant(self) - expr
    }
}

impl Sub<VarId> for f64 {
    type Output = LinearExpr;

    fn sub(self, var: VarId) -> LinearExpr {
        LinearExpr::constant(self) - var
    }
}

impl<R: Into<LinearExpr>> Add<R> for VarId {
    type Output = LinearExpr;

    fn add(self, rhs: R) -> LinearExpr {
        LinearExpr::from(self) + rhs
    }
}

impl<R: Into<LinearExpr>> Sub<R> for VarId {
    type Output = LinearExpr;

    fn sub(self, rhs: R) -> LinearExpr {
        LinearExpr::from(self) - rhs
    }
}

impl Sum<VarId> for LinearExpr {
    fn sum<I: Iterator<Item = VarId>>(iter: I) -> Self {
        Self {
            terms: iter.map(|var| (var, 1.0)).collect(),
            constant: 0.0,
        }
    }
}

impl Sum<LinearExpr> for LinearExpr {
    fn sum<I: Iterator<Item = LinearExpr>>(iter: I) -> Self {
        iter.fold(LinearExpr::new(), |acc, expr| acc + expr)
    }
}

/// Structured constraint name: a family (e.g. `coverage`) plus the indices
/// that instantiate it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ConstraintName {
    pub family: &'static str,
    pub index: Vec<usize>,
}

impl ConstraintName {
    pub fn new(family: &'static str, index: &[usize]) -> Self {
        Self {
            family,
            index: index.to_vec(),
        }
    }
}

impl fmt::Display for ConstraintName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.family)?;
        for (i, idx) in self.index.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{idx}")?;
        }
        write!(f, "]")
    }
}

/// `expr relation rhs`, with every constant folded into `rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub name: ConstraintName,
    pub expr: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
}

impl LinearConstraint {
    pub fn new(name: ConstraintName, lhs: LinearExpr, relation: Relation, rhs: LinearExpr) -> Self {
        let mut expr = lhs - rhs;
        let rhs = -expr.constant;
        expr.constant = 0.0;
        Self {
            name,
            expr,
            relation,
            rhs,
        }
    }

    pub fn is_satisfied(&self, value: impl Fn(VarId) -> f64, tolerance: f64) -> bool {
        let activity = self.expr.evaluate(value);
        let slack = tolerance * self.rhs.abs().max(1.0);
        match self.relation {
            Relation::Le => activity <= self.rhs + slack,
            Relation::Ge => activity >= self.rhs - slack,
            Relation::Eq => (activity - self.rhs).abs() <= slack,
        }
    }
}

/// A solver-agnostic MILP: variables, constraints and one objective.
#[derive(Debug, Clone)]
pub struct MilpModel {
    variables: Vec<VariableKind>,
    constraints: Vec<LinearConstraint>,
    objective: LinearExpr,
    sense: Sense,
}

impl Default for MilpModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MilpModel {
    pub fn new() -> Self {
        Self {
            variables: Vec::new(),
            constraints: Vec::new(),
            objective: LinearExpr::new(),
            sense: Sense::Minimise,
        }
    }

    pub fn add_binary(&mut self) -> VarId {
        self.push_variable(VariableKind::Binary)
    }

    pub fn add_continuous(&mut self, lower: f64) -> VarId {
        self.add_bounded(lower, None)
    }

    pub fn add_bounded(&mut self, lower: f64, upper: Option<f64>) -> VarId {
        self.push_variable(VariableKind::Continuous { lower, upper })
    }

    fn push_variable(&mut self, kind: VariableKind) -> VarId {
        self.variables.push(kind);
        VarId(self.variables.len() - 1)
    }

    pub fn add_constraint(
        &mut self,
        name: ConstraintName,
        lhs: impl Into<LinearExpr>,
        relation: Relation,
        rhs: impl Into<LinearExpr>,
    ) {
        self.constraints
            .push(LinearConstraint::new(name, lhs.into(), relation, rhs.into()));
    }

    pub fn set_objective(&mut self, objective: impl Into<LinearExpr>, sense: Sense) {
        self.objective = objective.into();
        self.sense = sense;
    }

    pub fn variables(&self) -> &[VariableKind] {
        &self.variables
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_binaries(&self) -> usize {
        self.variables
            .iter()
            .filter(|kind| matches!(kind, VariableKind::Binary))
            .count()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn count_family(&self, family: &str) -> usize {
        self.constraints
            .iter()
            .filter(|c| c.name.family == family)
            .count()
    }

    /// Checks bounds, integrality and every constraint at `values`
    /// (indexed by this model's variable ids).
    pub fn is_feasible_point(&self, values: &[f64], tolerance: f64) -> bool {
        if values.len() != self.variables.len() {
            return false;
        }
        let within_bounds = self.variables.iter().zip(values).all(|(kind, &v)| {
            if !v.is_finite() {
                return false;
            }
            match *kind {
                VariableKind::Binary => {
                    (v - v.round()).abs() <= tolerance && (-tolerance..=1.0 + tolerance).contains(&v)
                }
                VariableKind::Continuous { lower, upper } => {
                    let slack = tolerance * v.abs().max(1.0);
                    v >= lower - slack && upper.is_none_or(|ub| v <= ub + slack)
                }
            }
        });
        within_bounds
            && self
                .constraints
                .iter()
                .all(|c| c.is_satisfied(|var| values[var.0], tolerance))
    }

    /// Pushes the whole model into `adapter` and returns the mapping from
    /// this model's ids to the adapter's ids.
    pub fn load_into<A: SolverAdapter + ?Sized>(&self, adapter: &mut A) -> LoadedModel {
        let ids: Vec<VarId> = self
            .variables
            .iter()
            .map(|kind| match *kind {
                VariableKind::Binary => adapter.add_binary_variable(),
                VariableKind::Continuous { lower, upper } => {
                    adapter.add_bounded_variable(lower, upper)
                }
            })
            .collect();
        let resolve = |var: VarId| ids[var.0];
        for constraint in &self.constraints {
            adapter.add_linear_constraint(
                constraint.name.clone(),
                constraint.expr.remap(resolve),
                constraint.relation,
                constraint.rhs,
            );
        }
        adapter.set_objective(self.objective.remap(resolve), self.sense);
        LoadedModel { ids }
    }
}

/// Id mapping produced by [`MilpModel::load_into`].
#[derive(Debug, Clone)]
pub struct LoadedModel {
    ids: Vec<VarId>,
}

impl LoadedModel {
    pub fn resolve(&self, var: VarId) -> VarId {
        self.ids[var.0]
    }
}
