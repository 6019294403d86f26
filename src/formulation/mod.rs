//! Compiles scheduling instances into solver-agnostic MILPs.

pub mod project;
pub mod shift;

pub use project::{CapacityCheck, ProjectFormulation};
pub use shift::ShiftFormulation;
