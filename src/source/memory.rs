// src/source/memory.rs

//! In-memory trove sources
//!
//! [`MemoryRepository`] holds troves available for installation;
//! [`MemoryDatabase`] holds the present troves of a system together with
//! pins and local updates.

use super::{FindOptions, LocalDatabase, LocalUpdate, TroveSource, TroveSpec, TroveState};
use crate::dependencies::Dependency;
use crate::depcheck::{DepCheckResult, check_dependencies};
use crate::error::{Error, Result};
use crate::job::JobSet;
use crate::label::Label;
use crate::trove::{Identity, PathHashes, Trove};
use crate::version::Branch;
use std::collections::{BTreeMap, BTreeSet};

fn lookup(troves: &BTreeMap<Identity, Trove>, id: &Identity, with_files: bool) -> Result<Trove> {
    let trove = troves
        .get(id)
        .ok_or_else(|| Error::NotFound(format!("trove {}", id)))?;
    Ok(if with_files {
        trove.clone()
    } else {
        trove.without_files()
    })
}

/// Identities in `troves` matching one spec
fn find_matching(
    troves: &BTreeMap<Identity, Trove>,
    spec: &TroveSpec,
    options: FindOptions,
) -> Vec<Identity> {
    let mut matches: Vec<&Identity> = troves
        .keys()
        .filter(|id| id.name == spec.name)
        .filter(|id| spec.branch.as_ref().is_none_or(|b| &id.version.branch == b))
        .filter(|id| spec.version.as_ref().is_none_or(|v| &id.version == v))
        .filter(|id| match &spec.flavor {
            None => true,
            Some(flavor) if options.exact_flavors => &id.flavor == flavor,
            Some(flavor) => flavor.satisfies(&id.flavor),
        })
        .collect();

    if options.use_affinity && spec.version.is_none() {
        let mut newest: BTreeMap<&Branch, &Identity> = BTreeMap::new();
        for &id in &matches {
            let entry = newest.entry(&id.version.branch).or_insert(id);
            if id.version.revision > entry.version.revision {
                *entry = id;
            }
        }
        matches.retain(|id| {
            newest
                .get(&id.version.branch)
                .is_some_and(|best| best.version == id.version)
        });

        // At the newest version, keep only the best flavor matches
        if let Some(flavor) = &spec.flavor {
            let best = matches.iter().filter_map(|id| flavor.score(&id.flavor)).max();
            matches.retain(|id| flavor.score(&id.flavor) == best);
        }
    }

    matches.into_iter().cloned().collect()
}

fn find_all(
    troves: &BTreeMap<Identity, Trove>,
    specs: &[TroveSpec],
    options: FindOptions,
) -> BTreeMap<TroveSpec, Vec<Identity>> {
    specs
        .iter()
        .map(|spec| (spec.clone(), find_matching(troves, spec, options)))
        .collect()
}

/// Troves available for installation
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    troves: BTreeMap<Identity, Trove>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, trove: Trove) {
        self.troves.insert(trove.identity.clone(), trove);
    }

    pub fn with(mut self, trove: Trove) -> Self {
        self.add(trove);
        self
    }

    pub fn get(&self, id: &Identity) -> Option<&Trove> {
        self.troves.get(id)
    }

    pub fn len(&self) -> usize {
        self.troves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.troves.is_empty()
    }
}

impl TroveSource for MemoryRepository {
    fn has_troves(&self, ids: &[Identity]) -> Result<Vec<bool>> {
        Ok(ids.iter().map(|id| self.troves.contains_key(id)).collect())
    }

    fn get_trove(&self, id: &Identity, with_files: bool) -> Result<Trove> {
        lookup(&self.troves, id, with_files)
    }

    fn find_troves(
        &self,
        specs: &[TroveSpec],
        options: FindOptions,
    ) -> Result<BTreeMap<TroveSpec, Vec<Identity>>> {
        Ok(find_all(&self.troves, specs, options))
    }

    /// Newest provider per (name, flavor) on the label
    fn resolve_dependencies(
        &self,
        label: &Label,
        deps: &[Dependency],
    ) -> Result<BTreeMap<Dependency, Vec<Identity>>> {
        let mut result = BTreeMap::new();
        for dep in deps {
            let mut newest: BTreeMap<(&str, &crate::flavor::Flavor), &Identity> = BTreeMap::new();
            for trove in self.troves.values() {
                let id = &trove.identity;
                if id.version.trailing_label() != label || !trove.provides.satisfies(dep) {
                    continue;
                }
                let entry = newest.entry((id.name.as_str(), &id.flavor)).or_insert(id);
                if id.version.revision > entry.version.revision {
                    *entry = id;
                }
            }

            let mut providers: Vec<Identity> = newest.into_values().cloned().collect();
            providers.sort_by(|a, b| b.version.revision.cmp(&a.version.revision));
            if !providers.is_empty() {
                result.insert(dep.clone(), providers);
            }
        }
        Ok(result)
    }
}

/// The present troves of a system
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    troves: BTreeMap<Identity, Trove>,
    pins: BTreeSet<Identity>,
    local_updates: Vec<LocalUpdate>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a trove present
    pub fn install(&mut self, trove: Trove) {
        self.troves.insert(trove.identity.clone(), trove);
    }

    pub fn pin(&mut self, id: &Identity) {
        self.pins.insert(id.clone());
    }

    pub fn unpin(&mut self, id: &Identity) {
        self.pins.remove(id);
    }

    /// Record that `installed` was put in place of the referenced `original`
    pub fn record_local_update(&mut self, original: &Identity, installed: &Identity) {
        self.local_updates.push(LocalUpdate {
            original: original.clone(),
            installed: installed.clone(),
        });
    }

    pub fn is_present(&self, id: &Identity) -> bool {
        self.troves.contains_key(id)
    }

    pub fn present(&self) -> impl Iterator<Item = &Identity> {
        self.troves.keys()
    }
}

impl TroveSource for MemoryDatabase {
    fn has_troves(&self, ids: &[Identity]) -> Result<Vec<bool>> {
        Ok(ids.iter().map(|id| self.troves.contains_key(id)).collect())
    }

    fn get_trove(&self, id: &Identity, with_files: bool) -> Result<Trove> {
        lookup(&self.troves, id, with_files)
    }

    fn find_troves(
        &self,
        specs: &[TroveSpec],
        options: FindOptions,
    ) -> Result<BTreeMap<TroveSpec, Vec<Identity>>> {
        Ok(find_all(&self.troves, specs, options))
    }
}

impl LocalDatabase for MemoryDatabase {
    fn trove_states(&self) -> Result<Vec<TroveState>> {
        let mut states: BTreeMap<&Identity, TroveState> = BTreeMap::new();
        for id in self.troves.keys() {
            states.insert(
                id,
                TroveState {
                    identity: id.clone(),
                    present: true,
                    referenced: false,
                    pinned: self.pins.contains(id),
                },
            );
        }

        for trove in self.troves.values() {
            for child in &trove.troves {
                let state = states.entry(&child.identity).or_insert_with(|| TroveState {
                    identity: child.identity.clone(),
                    present: false,
                    referenced: false,
                    pinned: false,
                });
                state.referenced = true;
            }
        }

        Ok(states.into_values().collect())
    }

    fn troves_are_pinned(&self, ids: &[Identity]) -> Result<Vec<bool>> {
        Ok(ids.iter().map(|id| self.pins.contains(id)).collect())
    }

    fn local_updates(&self) -> Result<Vec<LocalUpdate>> {
        Ok(self.local_updates.clone())
    }

    fn path_hashes(&self, ids: &[Identity]) -> Result<Vec<PathHashes>> {
        ids.iter()
            .map(|id| {
                self.troves
                    .get(id)
                    .map(|t| t.path_hashes.clone())
                    .ok_or_else(|| Error::NotFound(format!("installed trove {}", id)))
            })
            .collect()
    }

    fn dep_check(
        &self,
        jobs: &JobSet,
        source: &dyn TroveSource,
        find_ordering: bool,
    ) -> Result<DepCheckResult> {
        let installed: Vec<Trove> = self.troves.values().cloned().collect();
        check_dependencies(&installed, jobs, source, find_ordering)
    }
}
