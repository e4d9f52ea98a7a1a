// src/planner/conflict.rs

//! Path conflict detection
//!
//! Troves of one name on one branch may only be installed side by side when
//! their files do not overlap. After planning, every (name, branch) that will
//! hold more than one trove is checked pairwise.

use crate::error::PathConflictMap;
use crate::trove::{Identity, PathHashes};
use crate::version::Branch;
use std::collections::BTreeMap;
use tracing::warn;

/// Overlapping pairs among the troves that will be present
///
/// `new` holds the troves being installed, `surviving` the present troves
/// that remain. Pairs of surviving troves are never reported.
pub fn find_path_conflicts(
    new: &BTreeMap<Identity, PathHashes>,
    surviving: &BTreeMap<Identity, PathHashes>,
) -> PathConflictMap {
    let mut groups: BTreeMap<(&str, &Branch), Vec<(&Identity, &PathHashes, bool)>> = BTreeMap::new();
    for (id, hashes) in new {
        groups
            .entry((id.name.as_str(), id.branch()))
            .or_default()
            .push((id, hashes, true));
    }
    for (id, hashes) in surviving {
        if let Some(group) = groups.get_mut(&(id.name.as_str(), id.branch())) {
            group.push((id, hashes, false));
        }
    }

    let mut conflicts = PathConflictMap::new();
    for ((name, _), troves) in groups {
        for (i, (a, a_hashes, a_new)) in troves.iter().enumerate() {
            for (b, b_hashes, b_new) in &troves[i + 1..] {
                if !(*a_new || *b_new) || a_hashes.is_disjoint(b_hashes) {
                    continue;
                }
                warn!(
                    "{} and {} share {} paths",
                    a,
                    b,
                    a_hashes.overlap(b_hashes)
                );
                conflicts
                    .entry(name.to_string())
                    .or_default()
                    .push(((*a).clone(), (*b).clone()));
            }
        }
    }
    conflicts
}
