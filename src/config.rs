// src/config.rs

//! Update configuration
//!
//! Planner and solver flags, loadable from TOML:
//!
//! ```toml
//! [planner]
//! recurse = true
//! update_only = false
//!
//! [solver]
//! resolve_deps = true
//! max_iterations = 64
//! ```
//!
//! Missing keys and sections take their defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default cap on solver iterations
pub const DEFAULT_MAX_ITERATIONS: usize = 64;

fn default_true() -> bool {
    true
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

/// Flags for the job planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Descend into the contents of requested containers
    #[serde(default = "default_true")]
    pub recurse: bool,

    /// Fail when a primary request would replace or erase a pinned trove
    #[serde(default = "default_true")]
    pub check_primary_pins: bool,

    /// Only update; never freshly install primaries
    #[serde(default)]
    pub update_only: bool,

    /// Keep troves on their branch unless a switch is explicitly requested
    #[serde(default = "default_true")]
    pub respect_branch_affinity: bool,

    /// Refuse implicit updates to an incompatible flavor
    #[serde(default = "default_true")]
    pub respect_flavor_affinity: bool,

    /// Install by-default children that are referenced but missing
    #[serde(default)]
    pub install_missing_refs: bool,

    /// Erase installed children that a new container lists as not by default
    #[serde(default)]
    pub remove_not_by_default: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            recurse: true,
            check_primary_pins: true,
            update_only: false,
            respect_branch_affinity: true,
            respect_flavor_affinity: true,
            install_missing_refs: false,
            remove_not_by_default: false,
        }
    }
}

/// Flags for the dependency solver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Add troves that provide unmet dependencies
    #[serde(default = "default_true")]
    pub resolve_deps: bool,

    /// Repair erasures that break installed troves
    #[serde(default = "default_true")]
    pub keep_required: bool,

    /// Compute an application order for the final jobs
    #[serde(default = "default_true")]
    pub find_ordering: bool,

    /// Give up after this many check/resolve rounds
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            resolve_deps: true,
            keep_required: true,
            find_ordering: true,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Complete update configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    #[serde(default)]
    pub planner: PlannerConfig,

    #[serde(default)]
    pub solver: SolverConfig,
}

impl UpdateConfig {
    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<()> {
        if self.solver.max_iterations == 0 {
            return Err(Error::Config(
                "solver.max_iterations must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize the configuration to TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Parse an update configuration from a TOML file
pub fn parse_config_file(path: &Path) -> Result<UpdateConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config_string(&content)
}

/// Parse an update configuration from a TOML string
pub fn parse_config_string(content: &str) -> Result<UpdateConfig> {
    let config: UpdateConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}
