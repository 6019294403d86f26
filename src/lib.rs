//! MILP formulations for call-center shift assignment and multi-project
//! job-shop scheduling, solved with HiGHS.

pub mod config;
pub mod data;
pub mod demand;
pub mod error;
pub mod formulation;
pub mod interpret;
pub mod milp;
pub mod server;
pub mod service;
pub mod solver;
pub mod validation;

pub use config::Config;
pub use data::{ProjectInstance, ProjectSchedule, ShiftAssignment, ShiftInstance, SolverOutcome};
pub use error::SolveError;
pub use service::{
    solve_project_schedule, solve_project_schedule_with, solve_shift_assignment,
    solve_shift_assignment_with,
};
