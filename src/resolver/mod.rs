// src/resolver/mod.rs

//! Dependency solving
//!
//! [`DependencySolver`] drives the job planner to a fixpoint: plan, check
//! the job set against the installed system, repair unmet dependencies and
//! broken erasures, and plan again. The result is a [`Resolution`] carrying
//! the final jobs together with anything that could not be repaired.

mod conflict;
mod engine;
mod plan;

pub use conflict::KeepEntry;
pub use engine::DependencySolver;
pub use plan::{Outcome, Resolution};
