// src/resolver/plan.rs

//! Resolution result types
//!
//! Problems the solver could not repair are data here, not errors.

use super::conflict::KeepEntry;
use crate::depcheck::{BrokenErasure, UnmetDependency};
use crate::job::{Job, JobSet};
use crate::source::Suggestions;
use crate::trove::Identity;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeSet;

/// Overall state of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every dependency is satisfied
    Complete,
    /// Some requirements have no provider
    UnmetDependencies,
    /// Some erasures still break installed troves
    BrokenErasures,
    /// Providers were found but automatic resolution is disabled
    NeedsResolution,
}

impl Outcome {
    pub fn as_str(&self) -> &str {
        match self {
            Outcome::Complete => "complete",
            Outcome::UnmetDependencies => "unmet_dependencies",
            Outcome::BrokenErasures => "broken_erasures",
            Outcome::NeedsResolution => "needs_resolution",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final job set and whatever is left unresolved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub jobs: JobSet,
    /// Jobs in application order; jobs sharing a group form a cycle
    pub ordering: Vec<Vec<Job>>,
    pub unmet: Vec<UnmetDependency>,
    pub broken_erasures: Vec<BrokenErasure>,
    /// Requirer → troves suggested to satisfy it
    pub suggestions: Suggestions,
    pub keep_list: Vec<KeepEntry>,
    /// Installed troves the planner left in place
    pub kept: BTreeSet<Identity>,
    pub iterations: usize,
    /// Whether suggestions were added to the job set automatically
    pub auto_resolve: bool,
}

impl Resolution {
    pub fn outcome(&self) -> Outcome {
        if !self.unmet.is_empty() {
            if !self.auto_resolve && !self.suggestions.is_empty() {
                Outcome::NeedsResolution
            } else {
                Outcome::UnmetDependencies
            }
        } else if !self.broken_erasures.is_empty() {
            Outcome::BrokenErasures
        } else {
            Outcome::Complete
        }
    }

    pub fn is_complete(&self) -> bool {
        self.outcome() == Outcome::Complete
    }

    /// Structured report for renderers
    pub fn report(&self) -> Value {
        let suggestions: serde_json::Map<String, Value> = self
            .suggestions
            .iter()
            .map(|(requirer, troves)| {
                let troves: Vec<String> = troves.iter().map(|t| t.to_string()).collect();
                (requirer.to_string(), json!(troves))
            })
            .collect();

        json!({
            "outcome": self.outcome(),
            "iterations": self.iterations,
            "jobs": self.jobs.iter().map(|j| j.to_string()).collect::<Vec<_>>(),
            "unmet": self
                .unmet
                .iter()
                .map(|u| json!({
                    "trove": u.trove.to_string(),
                    "dependency": u.dependency.to_string(),
                }))
                .collect::<Vec<_>>(),
            "broken_erasures": self
                .broken_erasures
                .iter()
                .map(|b| json!({
                    "required_by": b.required_by.to_string(),
                    "dependency": b.dependency.to_string(),
                    "providers": b.providers.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
                }))
                .collect::<Vec<_>>(),
            "suggestions": suggestions,
            "kept": self
                .keep_list
                .iter()
                .map(|k| json!({
                    "job": k.job.to_string(),
                    "dependency": k.dependency.to_string(),
                    "required_by": k.required_by.to_string(),
                }))
                .collect::<Vec<_>>(),
        })
    }
}
