// src/resolver/conflict.rs

//! Erasures reverted by the solver

use crate::dependencies::Dependency;
use crate::job::Job;
use crate::trove::Identity;
use serde::Serialize;
use std::fmt;

/// An erasure the solver reverted because an installed trove still needs it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct KeepEntry {
    /// The job that would have removed the trove
    pub job: Job,
    pub dependency: Dependency,
    pub required_by: Identity,
}

impl fmt::Display for KeepEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Kept {} because {} requires {}",
            self.job, self.required_by, self.dependency
        )
    }
}

/// How an erased provider can be reverted
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum KeepAction {
    /// Pure erasure: leave the trove installed
    Keep,
    /// Install the new trove next to the old one
    SideBySide,
    /// Same files: keep the old trove and skip the new one
    KeepOld(Identity),
    /// File sets overlap; nothing can be done
    Impossible,
}
