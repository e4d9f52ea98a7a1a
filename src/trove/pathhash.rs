// src/trove/pathhash.rs

//! Path hashes for side-by-side compatibility checks
//!
//! Each trove carries a set of 64-bit XXH3 hashes of the file paths it owns.
//! Two troves can be installed next to each other when their sets are
//! disjoint. This comparison is unrelated to flavor scoring.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use xxhash_rust::xxh3::xxh3_64;

/// Hash a single path
#[inline]
pub fn hash_path(path: &str) -> u64 {
    xxh3_64(path.as_bytes())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathHashes(BTreeSet<u64>);

impl PathHashes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(paths.into_iter().map(|p| hash_path(p.as_ref())).collect())
    }

    pub fn insert_path(&mut self, path: &str) -> bool {
        self.0.insert(hash_path(path))
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.0.contains(&hash_path(path))
    }

    /// No path in common
    pub fn is_disjoint(&self, other: &PathHashes) -> bool {
        self.0.is_disjoint(&other.0)
    }

    /// Number of shared paths
    pub fn overlap(&self, other: &PathHashes) -> usize {
        self.0.intersection(&other.0).count()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
