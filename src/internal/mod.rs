// SPDX-License-Identifier: MPL-2.0

//! Non exposed modules.

mod arena;
mod core;
mod incompatibility;
mod partial_solution;

pub(crate) use arena::Arena;
pub use arena::Id;
pub(crate) use self::core::State;
pub(crate) use incompatibility::Relation;
pub use incompatibility::{Cause, IncompId, Incompatibility};
pub(crate) use partial_solution::{DecisionLevel, PartialSolution};
