// src/error.rs

//! Error types for job planning and dependency resolution
//!
//! Planning-internal invariant violations ([`Error::InternalConsistency`],
//! [`Error::InvalidJob`]) are fatal and propagate immediately. Dependency
//! problems that the solver could not repair are not errors at all; they are
//! returned as data on [`crate::resolver::Resolution`].

use crate::dependencies::Sense;
use crate::label::LabelParseError;
use crate::trove::Identity;
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Conflicting identity pairs grouped by trove name
pub type PathConflictMap = BTreeMap<String, Vec<(Identity, Identity)>>;

#[derive(Debug, Error)]
pub enum Error {
    /// A job set would add and remove the same trove, or repeat a side
    #[error("Internal consistency error: {0}")]
    InternalConsistency(String),

    /// A job with neither an old nor a new side
    #[error("Invalid job for {name}: {reason}")]
    InvalidJob { name: String, reason: String },

    /// A primary request needs to replace or remove a pinned trove
    #[error("{}", describe_pinned(.old, .new.as_ref()))]
    PinnedTrove { old: Identity, new: Option<Identity> },

    /// Accepted jobs would install overlapping files for the same name and branch
    #[error("{}", describe_path_conflicts(.0))]
    PathConflicts(PathConflictMap),

    /// A redirect chain revisits one of its own members
    #[error("Redirect loop detected: {}", describe_chain(.chain))]
    RedirectLoop { chain: Vec<Identity> },

    /// The dependency solver did not reach a fixpoint
    #[error("Dependency resolution did not settle after {iterations} iterations")]
    ResolutionLimit { iterations: usize },

    /// Two flavors disagree on a flag in normal merge mode
    #[error("Flavor conflict on {name}: flag '{flag}' is both {first} and {second}")]
    FlavorConflict {
        name: String,
        flag: String,
        first: Sense,
        second: Sense,
    },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error(transparent)]
    Label(#[from] LabelParseError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is a planning-internal invariant violation
    ///
    /// Fatal errors are never retried by the solver; everything else may be
    /// treated as a rejected hypothesis while exploring strategies.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InternalConsistency(_) | Self::InvalidJob { .. })
    }
}

fn describe_pinned(old: &Identity, new: Option<&Identity>) -> String {
    match new {
        Some(new) => format!(
            "Cannot replace pinned trove {} with {}; unpin it first",
            old, new
        ),
        None => format!("Cannot erase pinned trove {}; unpin it first", old),
    }
}

fn describe_path_conflicts(conflicts: &PathConflictMap) -> String {
    let mut lines = vec!["Path conflicts between troves:".to_string()];
    for (name, pairs) in conflicts {
        for (first, second) in pairs {
            lines.push(format!("  {}: {} and {}", name, first, second));
        }
    }
    lines.join("\n")
}

fn describe_chain(chain: &[Identity]) -> String {
    chain
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
