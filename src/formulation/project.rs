use itertools::Itertools;
use log::{info, trace, warn};
use std::collections::BTreeMap;

use crate::data::{ProjectInstance, TaskRef};
use crate::error::SolveError;
use crate::milp::{ConstraintName, LinearExpr, MilpModel, Relation, Sense, VarId};

pub const PRECEDENCE: &str = "precedence";
pub const ONE_TEAM: &str = "one_team_per_task";
pub const A_BEFORE_B: &str = "team_exclusion_a_first";
pub const B_BEFORE_A: &str = "team_exclusion_b_first";
pub const MAKESPAN: &str = "makespan";

/// Aggregate workload against team-hours, computed before any model exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityCheck {
    pub workload: f64,
    pub capacity: f64,
}

impl CapacityCheck {
    pub fn of(instance: &ProjectInstance) -> Self {
        Self {
            workload: instance.total_workload(),
            capacity: instance.capacity(),
        }
    }

    /// Only rules out instances that cannot fit even with perfect packing;
    /// passing says nothing about sequencing.
    pub fn ensure_fits(self) -> Result<Self, SolveError> {
        if self.workload > self.capacity {
            warn!(
                "Workload {}h exceeds capacity {}h; skipping the solver.",
                self.workload, self.capacity
            );
            return Err(SolveError::OverCapacity {
                workload: self.workload,
                capacity: self.capacity,
            });
        }
        Ok(self)
    }
}

/// The job-shop MILP: start times, task→team assignment, pairwise order
/// variables, and a makespan to minimise.
#[derive(Debug, Clone)]
pub struct ProjectFormulation {
    pub model: MilpModel,
    /// All tasks flattened in declaration order; positions index the vectors
    /// below.
    pub tasks: Vec<TaskRef>,
    pub durations: Vec<f64>,
    pub start: Vec<VarId>,
    /// `assign[task][team]`
    pub assign: Vec<Vec<VarId>>,
    /// One order variable per unordered pair `(a, b)` with `a < b`; 0 puts
    /// `a` first on a shared team, 1 puts `b` first.
    pub order: BTreeMap<(usize, usize), VarId>,
    pub makespan: VarId,
    pub big_m: f64,
}

impl ProjectFormulation {
    /// Expects a validated instance.
    pub fn build(instance: &ProjectInstance) -> Self {
        let teams = instance.teams;
        let (tasks, durations): (Vec<TaskRef>, Vec<f64>) = instance.tasks().unzip();
        let n = tasks.len();
        // a serial schedule finishes by the total duration, so no optimum
        // needs a start or makespan beyond it
        let big_m: f64 = durations.iter().sum();
        info!(
            "Setting up project model with {} projects, {} tasks and {} teams (M = {})...",
            instance.projects.len(),
            n,
            teams,
            big_m
        );

        let mut model = MilpModel::new();
        let start: Vec<VarId> = durations
            .iter()
            .enumerate()
            .map(|(i, d)| {
                if i == 0 {
                    model.add_bounded(0.0, Some(0.0))
                } else {
                    model.add_bounded(0.0, Some(big_m - d))
                }
            })
            .collect();
        let assign: Vec<Vec<VarId>> = (0..n)
            .map(|_| (0..teams).map(|_| model.add_binary()).collect())
            .collect();
        let order: BTreeMap<(usize, usize), VarId> = (0..n)
            .tuple_combinations()
            .map(|(a, b)| ((a, b), model.add_binary()))
            .collect();
        let makespan = model.add_bounded(0.0, Some(big_m));
        trace!(
            "Generated {} start, {} assignment and {} order variables.",
            start.len(),
            n * teams,
            order.len()
        );

        for (i, task) in tasks.iter().enumerate() {
            if task.index > 0 {
                // the previous task of the same project sits right before it
                model.add_constraint(
                    ConstraintName::new(PRECEDENCE, &[task.project, task.index]),
                    start[i],
                    Relation::Ge,
                    start[i - 1] + durations[i - 1],
                );
            }
            let teams_used: LinearExpr = assign[i].iter().copied().sum();
            model.add_constraint(
                ConstraintName::new(ONE_TEAM, &[task.project, task.index]),
                teams_used,
                Relation::Eq,
                1.0,
            );
        }

        for (&(a, b), &y) in &order {
            for team in 0..teams {
                let (xa, xb) = (assign[a][team], assign[b][team]);
                // start[b] >= start[a] + d_a - M * (3 - xa - xb - (1 - y))
                let relax_a_first = 3.0 - (xa + xb + (1.0 - y));
                model.add_constraint(
                    ConstraintName::new(A_BEFORE_B, &[a, b, team]),
                    start[b],
                    Relation::Ge,
                    start[a] + durations[a] - big_m * relax_a_first,
                );
                // start[a] >= start[b] + d_b - M * (3 - xa - xb - y)
                let relax_b_first = 3.0 - (xa + xb + y);
                model.add_constraint(
                    ConstraintName::new(B_BEFORE_A, &[a, b, team]),
                    start[a],
                    Relation::Ge,
                    start[b] + durations[b] - big_m * relax_b_first,
                );
            }
        }

        for (i, task) in tasks.iter().enumerate() {
            let is_last = i + 1 == n || tasks[i + 1].project != task.project;
            if is_last {
                model.add_constraint(
                    ConstraintName::new(MAKESPAN, &[task.project]),
                    makespan,
                    Relation::Ge,
                    start[i] + durations[i],
                );
            }
        }

        model.set_objective(makespan, Sense::Minimise);
        info!(
            "Project model has {} variables ({} binary) and {} constraints.",
            model.num_variables(),
            model.num_binaries(),
            model.num_constraints()
        );

        Self {
            model,
            tasks,
            durations,
            start,
            assign,
            order,
            makespan,
            big_m,
        }
    }
}

/// Number of mutual-exclusion rows the model will hold: two per team per
/// unordered task pair.
pub fn exclusion_rows(tasks: usize, teams: usize) -> usize {
    tasks * tasks.saturating_sub(1) * teams
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Project;

    fn instance(projects: &[&[f64]], teams: usize) -> ProjectInstance {
        ProjectInstance::new(
            projects
                .iter()
                .enumerate()
                .map(|(i, durations)| Project {
                    name: format!("P{}", i + 1),
                    durations: durations.to_vec(),
                })
                .collect(),
            teams,
        )
    }

    #[test]
    fn variable_and_constraint_counts() {
        let f = ProjectFormulation::build(&instance(&[&[3.0, 2.0], &[4.0, 1.0, 1.0]], 3));
        let n = 5;
        assert_eq!(f.start.len(), n);
        assert_eq!(f.order.len(), n * (n - 1) / 2);
        assert_eq!(f.model.num_binaries(), n * 3 + n * (n - 1) / 2);
        assert_eq!(f.model.num_variables(), n + n * 3 + n * (n - 1) / 2 + 1);
        assert_eq!(f.model.count_family(PRECEDENCE), 3);
        assert_eq!(f.model.count_family(ONE_TEAM), n);
        assert_eq!(
            f.model.count_family(A_BEFORE_B) + f.model.count_family(B_BEFORE_A),
            exclusion_rows(n, 3)
        );
        assert_eq!(f.model.count_family(MAKESPAN), 2);
    }

    #[test]
    fn big_m_is_total_duration() {
        let f = ProjectFormulation::build(&instance(&[&[3.0, 2.0], &[4.5]], 2));
        assert_eq!(f.big_m, 9.5);
    }

    #[test]
    fn first_task_is_pinned_at_zero() {
        let f = ProjectFormulation::build(&instance(&[&[3.0], &[2.0]], 1));
        assert_eq!(
            f.model.variables()[f.start[0].0],
            crate::milp::VariableKind::Continuous {
                lower: 0.0,
                upper: Some(0.0)
            }
        );
    }

    #[test]
    fn exclusion_binds_only_on_shared_team_and_chosen_order() {
        let built = ProjectFormulation::build(&instance(&[&[4.0], &[4.0]], 2));
        let f = &built;
        let row = |family: &'static str| {
            f.model
                .constraints()
                .iter()
                .find(|c| c.name == ConstraintName::new(family, &[0, 1, 1]))
                .unwrap()
                .clone()
        };
        let a_first = row(A_BEFORE_B);
        let values_with = |xa: f64, xb: f64, y: f64, sa: f64, sb: f64| {
            move |v: VarId| {
                if v == f.start[0] {
                    sa
                } else if v == f.start[1] {
                    sb
                } else if v == f.assign[0][1] {
                    xa
                } else if v == f.assign[1][1] {
                    xb
                } else if v == f.order[&(0, 1)] {
                    y
                } else {
                    0.0
                }
            }
        };
        // both on team 1, a first: overlap is rejected, sequencing accepted
        assert!(!a_first.is_satisfied(values_with(1.0, 1.0, 0.0, 0.0, 2.0), 1e-9));
        assert!(a_first.is_satisfied(values_with(1.0, 1.0, 0.0, 0.0, 4.0), 1e-9));
        // different teams or the other order: vacuous
        assert!(a_first.is_satisfied(values_with(1.0, 0.0, 0.0, 0.0, 0.0), 1e-9));
        assert!(a_first.is_satisfied(values_with(1.0, 1.0, 1.0, 4.0, 0.0), 1e-9));

        let b_first = row(B_BEFORE_A);
        assert!(!b_first.is_satisfied(values_with(1.0, 1.0, 1.0, 0.0, 0.0), 1e-9));
        assert!(b_first.is_satisfied(values_with(1.0, 1.0, 1.0, 4.0, 0.0), 1e-9));
    }

    #[test]
    fn capacity_check_rejects_overload() {
        let inst = instance(&[&[5.0, 5.0], &[5.0]], 1).with_horizon(12.0);
        let err = CapacityCheck::of(&inst).ensure_fits().unwrap_err();
        assert_eq!(
            err,
            SolveError::OverCapacity {
                workload: 15.0,
                capacity: 12.0
            }
        );
        let ok = CapacityCheck::of(&instance(&[&[5.0]], 1)).ensure_fits().unwrap();
        assert_eq!(ok.capacity, 24.0);
    }
}
