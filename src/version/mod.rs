// src/version/mod.rs

//! Branch-qualified trove versions
//!
//! A trove version is a branch plus a revision:
//!
//! - `/conary.example.com@rpl:2/1.2-1-1`
//! - `/conary.example.com@rpl:2//local@local:shadow/1.2-1-1` (a shadow)
//!
//! The branch is a sequence of labels. Each `//` separator starts a shadow
//! of the branch to its left. The revision is `upstream-source[-build]`.
//! Upstream versions are compared after normalizing them to semver where
//! possible; source and build counts are compared numerically.

use crate::error::{Error, Result};
use crate::label::{Label, LabelParseError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A line of development: one or more labels, shadows separated by `//`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Branch {
    labels: Vec<Label>,
}

impl Branch {
    /// A branch directly on a label
    pub fn new(label: Label) -> Self {
        Self { labels: vec![label] }
    }

    /// Parse `/label` or `/label//shadow-label`
    pub fn parse(s: &str) -> std::result::Result<Self, LabelParseError> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| LabelParseError::NotABranch(s.to_string()))?;
        let labels = rest
            .split("//")
            .map(Label::parse)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { labels })
    }

    /// The label troves on this branch are committed to
    pub fn label(&self) -> &Label {
        // parse() and new() guarantee at least one label
        &self.labels[self.labels.len() - 1]
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn is_shadow(&self) -> bool {
        self.labels.len() > 1
    }

    /// The branch this one shadows, if any
    pub fn parent(&self) -> Option<Branch> {
        if self.is_shadow() {
            Some(Self {
                labels: self.labels[..self.labels.len() - 1].to_vec(),
            })
        } else {
            None
        }
    }

    /// Create a shadow of this branch onto another label
    pub fn shadow(&self, label: Label) -> Branch {
        let mut labels = self.labels.clone();
        labels.push(label);
        Self { labels }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, label) in self.labels.iter().enumerate() {
            if i == 0 {
                write!(f, "/{}", label)?;
            } else {
                write!(f, "//{}", label)?;
            }
        }
        Ok(())
    }
}

impl FromStr for Branch {
    type Err = LabelParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Branch::parse(s)
    }
}

/// The revision part of a version: `upstream-source[-build]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision {
    /// Upstream version, e.g. "1.2.3"
    pub upstream: String,
    /// Source (recipe) revision count
    pub source_count: u32,
    /// Build count; absent for source troves
    pub build_count: Option<u32>,
}

impl Revision {
    /// Parse a revision string
    ///
    /// Examples:
    /// - "1.2-1" → upstream="1.2", source=1, build=None
    /// - "1.2-1-3" → upstream="1.2", source=1, build=Some(3)
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() < 2 || parts.len() > 3 {
            return Err(Error::ParseError(format!(
                "Revision must be upstream-source[-build]: '{}'",
                s
            )));
        }

        let upstream = parts[0];
        if upstream.is_empty() {
            return Err(Error::ParseError(format!(
                "Empty upstream version in revision '{}'",
                s
            )));
        }

        let count = |part: &str| {
            part.parse::<u32>().map_err(|e| {
                Error::ParseError(format!("Invalid count '{}' in revision '{}': {}", part, s, e))
            })
        };

        let source_count = count(parts[1])?;
        let build_count = parts.get(2).map(|p| count(p)).transpose()?;

        Ok(Self {
            upstream: upstream.to_string(),
            source_count,
            build_count,
        })
    }

    /// Normalize the upstream version to semver for comparison
    ///
    /// Upstream versions are rarely semver-compliant, so missing components
    /// default to zero. Returns None when nothing numeric can be extracted.
    fn to_semver(&self) -> Option<semver::Version> {
        if let Ok(v) = semver::Version::parse(&self.upstream) {
            return Some(v);
        }

        let parts: Vec<&str> = self.upstream.split('.').collect();
        let major = parts.first().and_then(|s| s.parse::<u64>().ok())?;
        let minor = parts.get(1).and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
        let patch = parts.get(2).and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);

        Some(semver::Version::new(major, minor, patch))
    }

    /// Compare two revisions
    pub fn compare(&self, other: &Revision) -> Ordering {
        let upstream = match (self.to_semver(), other.to_semver()) {
            (Some(v1), Some(v2)) => v1.cmp(&v2),
            _ => Ordering::Equal,
        };

        upstream
            .then_with(|| self.source_count.cmp(&other.source_count))
            .then_with(|| self.build_count.cmp(&other.build_count))
            // Keep Ord consistent with Eq when normalization hides a difference
            .then_with(|| self.upstream.cmp(&other.upstream))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.upstream, self.source_count)?;
        if let Some(build) = self.build_count {
            write!(f, "-{}", build)?;
        }
        Ok(())
    }
}

impl Ord for Revision {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for Revision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A full trove version: branch plus revision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    pub branch: Branch,
    pub revision: Revision,
}

impl Version {
    pub fn new(branch: Branch, revision: Revision) -> Self {
        Self { branch, revision }
    }

    /// Parse `/host@ns:tag/upstream-source-build`
    pub fn parse(s: &str) -> Result<Self> {
        let (branch, revision) = s
            .rsplit_once('/')
            .ok_or_else(|| Error::ParseError(format!("Version has no revision: '{}'", s)))?;
        if branch.is_empty() {
            return Err(Error::ParseError(format!("Version has no branch: '{}'", s)));
        }

        Ok(Self {
            branch: Branch::parse(branch)?,
            revision: Revision::parse(revision)?,
        })
    }

    /// Whether `self` is a later revision than `other` on the same branch
    ///
    /// Versions on different branches are not ordered against each other.
    pub fn is_newer_than(&self, other: &Version) -> bool {
        self.branch == other.branch && self.revision > other.revision
    }

    /// The label this version was committed to
    pub fn trailing_label(&self) -> &Label {
        self.branch.label()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.branch, self.revision)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.branch
            .cmp(&other.branch)
            .then_with(|| self.revision.cmp(&other.revision))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
