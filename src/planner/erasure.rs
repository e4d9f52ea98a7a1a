// src/planner/erasure.rs

//! Erasure closure by mark and sweep
//!
//! The graph holds every trove that might be erased (replaced olds, primary
//! erasures and not-by-default removals) together with everything they
//! contain. Nodes start out [`EraseState::Unknown`]; keep seeds and all
//! troves reachable from them are marked [`EraseState::Keep`], and the sweep
//! turns what is left into [`EraseState::Erase`].

use super::state::InstalledState;
use crate::trove::Identity;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EraseState {
    Erase,
    Keep,
    Unknown,
}

/// Containment among erasure candidates
#[derive(Debug, Default)]
pub struct ContainmentGraph {
    children: BTreeMap<Identity, BTreeSet<Identity>>,
}

impl ContainmentGraph {
    /// Build the graph from `roots` and everything they contain
    ///
    /// Referenced children that were replaced by a local update are followed
    /// to the locally installed product.
    pub fn build(state: &InstalledState, roots: &BTreeSet<Identity>) -> Self {
        let mut graph = Self::default();
        let mut queue: VecDeque<Identity> = roots.iter().cloned().collect();

        while let Some(node) = queue.pop_front() {
            if graph.children.contains_key(&node) {
                continue;
            }
            let mut children = BTreeSet::new();
            for child in state.children(&node) {
                children.insert(child.identity.clone());
                if !state.is_present(&child.identity)
                    && let Some(product) = state.product_of(&child.identity)
                {
                    children.insert(product.clone());
                }
            }
            queue.extend(children.iter().cloned());
            graph.children.insert(node, children);
        }
        graph
    }

    pub fn contains(&self, id: &Identity) -> bool {
        self.children.contains_key(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Identity> {
        self.children.keys()
    }

    pub fn children(&self, id: &Identity) -> impl Iterator<Item = &Identity> {
        self.children.get(id).into_iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Mark everything reachable from `keep` as kept and sweep the rest to erase
pub fn mark_and_sweep(
    graph: &ContainmentGraph,
    keep: &BTreeSet<Identity>,
) -> BTreeMap<Identity, EraseState> {
    let mut states: BTreeMap<Identity, EraseState> = graph
        .nodes()
        .map(|id| (id.clone(), EraseState::Unknown))
        .collect();

    // Mark
    let mut queue: VecDeque<&Identity> = keep.iter().filter(|id| graph.contains(id)).collect();
    while let Some(node) = queue.pop_front() {
        match states.get_mut(node) {
            Some(state) if *state != EraseState::Keep => *state = EraseState::Keep,
            _ => continue,
        }
        queue.extend(graph.children(node));
    }

    // Sweep
    for state in states.values_mut() {
        if *state == EraseState::Unknown {
            *state = EraseState::Erase;
        }
    }
    states
}
