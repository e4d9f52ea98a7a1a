// src/lib.rs

//! Conary Update Planner
//!
//! Reconciles an installed set of troves with requested changes: computes
//! a minimal, consistent, dependency-satisfying job set that moves the
//! system from one state to the other.
//!
//! # Architecture
//!
//! - Flavors: dependency sets scored and merged to match builds to systems
//! - Troves: versioned, flavored units that contain other troves
//! - Jobs: install, update and erase operations collected in job sets
//! - Planner: expands requests through containment, affinity and pins
//! - Solver: repairs unmet dependencies and broken erasures to a fixpoint
//! - Sources: trove repositories, the local database and resolution
//!   strategies, reached only through traits

pub mod config;
pub mod depcheck;
pub mod dependencies;
mod error;
pub mod flavor;
pub mod job;
pub mod label;
pub mod planner;
pub mod resolver;
pub mod source;
pub mod trove;
pub mod version;

pub use config::{PlannerConfig, SolverConfig, UpdateConfig};
pub use depcheck::{BrokenErasure, DepCheckResult, UnmetDependency};
pub use dependencies::{Dependency, DependencyClass, DependencySet, MergeMode, Sense};
pub use error::{Error, PathConflictMap, Result};
pub use flavor::{Flavor, FlavorArena, FlavorId};
pub use job::{Job, JobKind, JobSet, JobSide};
pub use label::{Label, LabelParseError, LabelPath};
pub use planner::{JobPlanner, Plan, PlanOverrides};
pub use resolver::{DependencySolver, KeepEntry, Outcome, Resolution};
pub use source::{
    FindOptions, LabelPathResolver, LocalDatabase, LocalUpdate, MemoryDatabase, MemoryRepository,
    ResolutionSource, Suggestions, TroveSource, TroveSpec, TroveState,
};
pub use trove::{Identity, PathHashes, RedirectTarget, Trove, TroveKind, TroveRef};
pub use version::{Branch, Revision, Version};
