// src/depcheck/mod.rs

//! Dependency checking of a job set against an installed system
//!
//! Given the present troves and a job set, compute:
//!
//! - unmet dependencies of troves being installed,
//! - installed troves that lose a provider because of an erasure,
//! - an application order for the jobs.

mod graph;

pub use graph::JobGraph;

use crate::dependencies::{Dependency, DependencyClass};
use crate::error::Result;
use crate::job::{Job, JobSet};
use crate::source::TroveSource;
use crate::trove::{Identity, Trove};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, trace};

/// A requirement of a trove being installed that nothing will provide
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UnmetDependency {
    pub trove: Identity,
    pub dependency: Dependency,
}

impl fmt::Display for UnmetDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} requires {}", self.trove, self.dependency)
    }
}

/// An installed trove whose requirement was provided only by erased troves
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BrokenErasure {
    pub required_by: Identity,
    pub dependency: Dependency,
    /// Troves being erased that provided the dependency
    pub providers: Vec<Identity>,
}

impl fmt::Display for BrokenErasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: Vec<String> = self.providers.iter().map(|p| p.to_string()).collect();
        write!(
            f,
            "{} requires {}, which is provided by erased {}",
            self.required_by,
            self.dependency,
            providers.join(", ")
        )
    }
}

/// Outcome of checking a job set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepCheckResult {
    pub unmet: Vec<UnmetDependency>,
    pub cannot_resolve: Vec<BrokenErasure>,
    /// Groups of jobs in application order; jobs within a group form a cycle
    pub ordering: Vec<Vec<Job>>,
}

impl DepCheckResult {
    pub fn is_satisfied(&self) -> bool {
        self.unmet.is_empty() && self.cannot_resolve.is_empty()
    }
}

/// Index of troves by the (class, name) pairs they provide
struct ProviderIndex<'t> {
    by_key: HashMap<(DependencyClass, &'t str), Vec<&'t Trove>>,
}

impl<'t> ProviderIndex<'t> {
    fn new(troves: impl IntoIterator<Item = &'t Trove>) -> Self {
        let mut by_key: HashMap<(DependencyClass, &'t str), Vec<&'t Trove>> = HashMap::new();
        for trove in troves {
            for class in trove.provides.classes() {
                for name in trove.provides.names(class) {
                    by_key.entry((class, name)).or_default().push(trove);
                }
            }
        }
        Self { by_key }
    }

    fn providers<'a>(&'a self, dep: &'a Dependency) -> impl Iterator<Item = &'t Trove> + 'a {
        self.by_key
            .get(&(dep.class, dep.name.as_str()))
            .into_iter()
            .flatten()
            .copied()
            .filter(move |trove| trove.provides.satisfies(dep))
    }

    fn is_provided(&self, dep: &Dependency) -> bool {
        self.providers(dep).next().is_some()
    }
}

/// Check `jobs` against the `installed` (present) troves
///
/// New troves are fetched from `source`.
pub fn check_dependencies(
    installed: &[Trove],
    jobs: &JobSet,
    source: &dyn TroveSource,
    find_ordering: bool,
) -> Result<DepCheckResult> {
    let erased = jobs.erased();

    let mut new_troves = Vec::with_capacity(jobs.installed().len());
    for id in jobs.installed() {
        new_troves.push(source.get_trove(id, false)?);
    }

    let before = ProviderIndex::new(installed.iter());
    let surviving: Vec<&Trove> = installed
        .iter()
        .filter(|t| !erased.contains(&t.identity))
        .collect();
    let after = ProviderIndex::new(surviving.iter().copied().chain(new_troves.iter()));

    let mut result = DepCheckResult::default();

    for trove in &new_troves {
        for dep in trove.requires.iter() {
            if !after.is_provided(&dep) {
                trace!("{} has unmet dependency {}", trove.identity, dep);
                result.unmet.push(UnmetDependency {
                    trove: trove.identity.clone(),
                    dependency: dep,
                });
            }
        }
    }

    for trove in &surviving {
        for dep in trove.requires.iter() {
            if after.is_provided(&dep) {
                continue;
            }
            let providers: Vec<Identity> = before
                .providers(&dep)
                .filter(|p| erased.contains(&p.identity))
                .map(|p| p.identity.clone())
                .collect();
            if !providers.is_empty() {
                trace!("erasure breaks {} for {}", dep, trove.identity);
                result.cannot_resolve.push(BrokenErasure {
                    required_by: trove.identity.clone(),
                    dependency: dep,
                    providers,
                });
            }
        }
    }

    result.unmet.sort();
    result.cannot_resolve.sort();

    if find_ordering {
        result.ordering = order_jobs(jobs, &new_troves);
    }

    debug!(
        "dependency check: {} jobs, {} unmet, {} broken erasures",
        jobs.len(),
        result.unmet.len(),
        result.cannot_resolve.len()
    );
    Ok(result)
}

/// Order install and update jobs by their dependencies; pure erasures go last
fn order_jobs(jobs: &JobSet, new_troves: &[Trove]) -> Vec<Vec<Job>> {
    let installing: Vec<&Job> = jobs.iter().filter(|j| j.new.is_some()).collect();
    let erasing: Vec<Job> = jobs.iter().filter(|j| j.is_erase()).cloned().collect();

    let by_identity: HashMap<&Identity, &Trove> =
        new_troves.iter().map(|t| (&t.identity, t)).collect();
    let nodes: Vec<Option<&Trove>> = installing
        .iter()
        .map(|job| {
            job.new_identity()
                .and_then(|id| by_identity.get(&id).copied())
        })
        .collect();

    let index = ProviderIndex::new(nodes.iter().flatten().copied());
    let position: HashMap<&Identity, usize> = nodes
        .iter()
        .enumerate()
        .filter_map(|(i, t)| t.map(|t| (&t.identity, i)))
        .collect();

    let mut graph = JobGraph::new(installing.len());
    for (i, trove) in nodes.iter().enumerate() {
        let Some(trove) = trove else { continue };
        for dep in trove.requires.iter() {
            for provider in index.providers(&dep) {
                if let Some(&j) = position.get(&provider.identity) {
                    graph.add_edge(i, j);
                }
            }
        }
    }

    if let Some(cycle) = graph.detect_cycle() {
        let names: BTreeSet<&str> = cycle.iter().map(|&i| installing[i].name.as_str()).collect();
        debug!("dependency cycle between {:?}; applying together", names);
    }

    let mut ordering: Vec<Vec<Job>> = graph
        .install_order()
        .into_iter()
        .map(|group| group.into_iter().map(|i| installing[i].clone()).collect())
        .collect();
    if !erasing.is_empty() {
        ordering.push(erasing);
    }
    ordering
}
