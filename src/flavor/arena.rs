// src/flavor/arena.rs

//! Interning arena for flavors
//!
//! Planning compares the same handful of flavors many times. The arena
//! hands out a small [`FlavorId`] per distinct flavor and caches pairwise
//! scores, so repeated comparisons are a hash lookup.

use super::Flavor;
use std::collections::HashMap;

/// Index of an interned flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlavorId(u32);

#[derive(Debug, Default)]
pub struct FlavorArena {
    flavors: Vec<Flavor>,
    ids: HashMap<Flavor, FlavorId>,
    /// (score, architectures compatible) per (provided, required)
    scores: HashMap<(FlavorId, FlavorId), (Option<i32>, bool)>,
}

impl FlavorArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a flavor, returning the id of an equal flavor if already present
    pub fn intern(&mut self, flavor: &Flavor) -> FlavorId {
        if let Some(id) = self.ids.get(flavor) {
            return *id;
        }
        let id = FlavorId(self.flavors.len() as u32);
        self.flavors.push(flavor.clone());
        self.ids.insert(flavor.clone(), id);
        id
    }

    pub fn get(&self, id: FlavorId) -> Option<&Flavor> {
        self.flavors.get(id.0 as usize)
    }

    fn lookup(&mut self, provided: FlavorId, required: FlavorId) -> (Option<i32>, bool) {
        if let Some(entry) = self.scores.get(&(provided, required)) {
            return *entry;
        }
        let entry = match (self.get(provided), self.get(required)) {
            (Some(p), Some(r)) => (p.score(r), p.arch_compatible(r)),
            _ => (None, false),
        };
        self.scores.insert((provided, required), entry);
        entry
    }

    /// Cached [`Flavor::score`] of `provided` against `required`
    pub fn score(&mut self, provided: FlavorId, required: FlavorId) -> Option<i32> {
        self.lookup(provided, required).0
    }

    /// Cached [`Flavor::match_score`]
    pub fn match_score(&mut self, provided: FlavorId, required: FlavorId) -> Option<i32> {
        match self.lookup(provided, required) {
            (score, true) => score,
            (_, false) => None,
        }
    }

    /// Compatible in at least one direction, architectures included
    pub fn is_compatible(&mut self, a: FlavorId, b: FlavorId) -> bool {
        self.match_score(a, b).is_some() || self.match_score(b, a).is_some()
    }

    /// Convenience: intern both flavors and score them
    pub fn score_flavors(&mut self, provided: &Flavor, required: &Flavor) -> Option<i32> {
        let p = self.intern(provided);
        let r = self.intern(required);
        self.score(p, r)
    }

    /// Convenience: intern both flavors and take the architecture-gated score
    pub fn match_flavors(&mut self, provided: &Flavor, required: &Flavor) -> Option<i32> {
        let p = self.intern(provided);
        let r = self.intern(required);
        self.match_score(p, r)
    }

    pub fn len(&self) -> usize {
        self.flavors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flavors.is_empty()
    }
}
