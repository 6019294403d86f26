use itertools::iproduct;
use log::{info, trace};

use crate::data::{AgentId, Day, ShiftInstance, ShiftSlot};
use crate::milp::{ConstraintName, LinearExpr, MilpModel, Relation, Sense, VarId};

pub const DAILY_EXCLUSIVITY: &str = "one_shift_per_day";
pub const NIGHT_TO_MORNING: &str = "no_night_then_morning";
pub const COVERAGE: &str = "coverage";
pub const WORKLOAD_CAP: &str = "max_shifts";

/// The call-center MILP: `x[e][d][s] = 1` iff agent `e` works shift `s` on
/// day `d`.
#[derive(Debug, Clone)]
pub struct ShiftFormulation {
    pub model: MilpModel,
    agents: usize,
    days: usize,
    shifts: usize,
    x: Vec<VarId>,
}

impl ShiftFormulation {
    /// Expects a validated instance.
    pub fn build(instance: &ShiftInstance) -> Self {
        let (agents, days, shifts) = (instance.agents, instance.days, instance.shifts);
        info!(
            "Setting up shift model with {} agents, {} days and {} shifts per day...",
            agents, days, shifts
        );

        let mut model = MilpModel::new();
        let x: Vec<VarId> = (0..agents * days * shifts).map(|_| model.add_binary()).collect();
        let var = |e: AgentId, d: Day, s: ShiftSlot| x[(e * days + d) * shifts + s];
        trace!("Generated {} assignment variables.", x.len());

        // at most one shift per agent and day
        for (e, d) in iproduct!(0..agents, 0..days) {
            let worked: LinearExpr = (0..shifts).map(|s| var(e, d, s)).sum();
            model.add_constraint(
                ConstraintName::new(DAILY_EXCLUSIVITY, &[e, d]),
                worked,
                Relation::Le,
                1.0,
            );
        }

        // rest between the last shift of a day and the first shift of the next
        if shifts >= 2 {
            for (e, d) in iproduct!(0..agents, 0..days.saturating_sub(1)) {
                let night = var(e, d, shifts - 1);
                let morning = var(e, d + 1, 0);
                model.add_constraint(
                    ConstraintName::new(NIGHT_TO_MORNING, &[e, d]),
                    night + morning,
                    Relation::Le,
                    1.0,
                );
            }
        }

        for (d, s) in iproduct!(0..days, 0..shifts) {
            let staffed: LinearExpr = (0..agents).map(|e| var(e, d, s)).sum();
            model.add_constraint(
                ConstraintName::new(COVERAGE, &[d, s]),
                staffed,
                Relation::Ge,
                f64::from(instance.demand[d][s]),
            );
        }

        for e in 0..agents {
            let total: LinearExpr = iproduct!(0..days, 0..shifts)
                .map(|(d, s)| var(e, d, s))
                .sum();
            model.add_constraint(
                ConstraintName::new(WORKLOAD_CAP, &[e]),
                total,
                Relation::Le,
                f64::from(instance.max_shifts),
            );
        }

        let mut cost = LinearExpr::new();
        for (e, d, s) in iproduct!(0..agents, 0..days, 0..shifts) {
            cost.add_term(var(e, d, s), instance.cost[e][d][s]);
        }
        model.set_objective(cost, Sense::Minimise);
        info!(
            "Shift model has {} variables and {} constraints.",
            model.num_variables(),
            model.num_constraints()
        );

        Self {
            model,
            agents,
            days,
            shifts,
            x,
        }
    }

    pub fn var(&self, agent: AgentId, day: Day, shift: ShiftSlot) -> VarId {
        self.x[(agent * self.days + day) * self.shifts + shift]
    }

    pub fn dimensions(&self) -> (usize, usize, usize) {
        (self.agents, self.days, self.shifts)
    }
}
