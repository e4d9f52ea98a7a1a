// src/label.rs

//! Conary-style labels and label paths
//!
//! A label names one line of development in a repository using the format
//! `host@namespace:tag`:
//!
//! - `conary.example.com@rpl:2` - rPath Linux 2 from conary.example.com
//! - `local@local:shadow` - a local shadow of some other label
//!
//! Branches are built from one or more labels (see [`crate::version::Branch`]).
//! A [`LabelPath`] is the ordered list of labels searched when looking for
//! troves that satisfy a dependency. Earlier labels win.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A label identifying a line of development: `host@namespace:tag`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    /// Repository host name
    pub host: String,
    /// Namespace within the repository
    pub namespace: String,
    /// Branch tag
    pub tag: String,
}

impl Label {
    pub fn new(host: impl Into<String>, namespace: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            namespace: namespace.into(),
            tag: tag.into(),
        }
    }

    /// Parse a label from `host@namespace:tag`
    pub fn parse(s: &str) -> Result<Self, LabelParseError> {
        let at_pos = s.find('@').ok_or_else(|| LabelParseError::MissingAt(s.to_string()))?;

        // The namespace/tag separator must come after the @
        let colon_pos = s[at_pos..]
            .find(':')
            .map(|p| at_pos + p)
            .ok_or_else(|| LabelParseError::MissingColon(s.to_string()))?;

        let host = &s[..at_pos];
        let namespace = &s[at_pos + 1..colon_pos];
        let tag = &s[colon_pos + 1..];

        if host.is_empty() {
            return Err(LabelParseError::EmptyHost(s.to_string()));
        }
        if namespace.is_empty() {
            return Err(LabelParseError::EmptyNamespace(s.to_string()));
        }
        if tag.is_empty() {
            return Err(LabelParseError::EmptyTag(s.to_string()));
        }

        let valid_chars = |c: char| c.is_alphanumeric() || c == '.' || c == '-' || c == '_';
        for component in [host, namespace, tag] {
            if !component.chars().all(valid_chars) {
                return Err(LabelParseError::InvalidCharacters(s.to_string()));
            }
        }

        Ok(Self::new(host, namespace, tag))
    }

    /// Whether two labels live in the same repository namespace
    pub fn same_namespace(&self, other: &Label) -> bool {
        self.host == other.host && self.namespace == other.namespace
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.host, self.namespace, self.tag)
    }
}

impl FromStr for Label {
    type Err = LabelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::parse(s)
    }
}

/// Errors that can occur when parsing a label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelParseError {
    MissingAt(String),
    MissingColon(String),
    EmptyHost(String),
    EmptyNamespace(String),
    EmptyTag(String),
    InvalidCharacters(String),
    /// A branch string that does not start with '/'
    NotABranch(String),
}

impl fmt::Display for LabelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelParseError::MissingAt(s) => write!(f, "Missing '@' in label: {}", s),
            LabelParseError::MissingColon(s) => write!(f, "Missing ':' in label: {}", s),
            LabelParseError::EmptyHost(s) => write!(f, "Empty host in label: {}", s),
            LabelParseError::EmptyNamespace(s) => write!(f, "Empty namespace in label: {}", s),
            LabelParseError::EmptyTag(s) => write!(f, "Empty tag in label: {}", s),
            LabelParseError::InvalidCharacters(s) => write!(f, "Invalid characters in label: {}", s),
            LabelParseError::NotABranch(s) => write!(f, "Branch must start with '/': {}", s),
        }
    }
}

impl std::error::Error for LabelParseError {}

/// Search order used when resolving dependencies against repositories
///
/// Labels earlier in the path have higher priority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelPath {
    labels: Vec<Label>,
}

impl LabelPath {
    pub fn new() -> Self {
        Self { labels: Vec::new() }
    }

    pub fn from_labels(labels: Vec<Label>) -> Self {
        Self { labels }
    }

    /// Add a label at the lowest priority
    pub fn push(&mut self, label: Label) {
        self.labels.push(label);
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn get(&self, index: usize) -> Option<&Label> {
        self.labels.get(index)
    }

    /// Priority of a label (0 = highest, None = not on the path)
    pub fn priority(&self, label: &Label) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Parse a whitespace or comma separated list of labels
    ///
    /// Example: `conary.example.com@rpl:2 contrib.example.com@rpl:2`
    pub fn parse(s: &str) -> Result<Self, LabelParseError> {
        let labels = s
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|part| !part.is_empty())
            .map(Label::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { labels })
    }
}

impl fmt::Display for LabelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<String> = self.labels.iter().map(|l| l.to_string()).collect();
        write!(f, "{}", labels.join(" "))
    }
}
