// src/resolver/engine.rs

//! Dependency solver
//!
//! Runs the planner, checks the result against the installed system and
//! repairs what it can:
//!
//! - unmet requirements are handed to a resolution source and the troves
//!   it suggests become extra requests;
//! - erasures that break installed troves are first repaired by updating
//!   the requiring package, then by keeping the erased trove.
//!
//! The loop ends when a check finds nothing left to repair. Each repair
//! consumes an entry from a finite set (suggestions, update-ineligible
//! requirers, keep-ineligible erasures), and `max_iterations` bounds the
//! loop regardless.

use super::conflict::{KeepAction, KeepEntry};
use super::plan::Resolution;
use crate::config::{SolverConfig, UpdateConfig};
use crate::dependencies::Dependency;
use crate::depcheck::{DepCheckResult, UnmetDependency};
use crate::error::{Error, Result};
use crate::job::Job;
use crate::planner::{JobPlanner, Plan, PlanOverrides};
use crate::source::{FindOptions, LocalDatabase, ResolutionSource, Suggestions, TroveSource, TroveSpec};
use crate::trove::Identity;
use std::collections::BTreeSet;
use tracing::{debug, info, trace};

/// Bookkeeping carried across solver iterations
#[derive(Debug, Default)]
struct SolverState {
    overrides: PlanOverrides,
    suggested: BTreeSet<Identity>,
    suggestions: Suggestions,
    keep_list: Vec<KeepEntry>,
    /// Packages already tried for erase-by-updating
    update_ineligible: BTreeSet<Identity>,
    /// (provider, dependency, requirer) already tried for erase-by-keeping
    keep_ineligible: BTreeSet<(Identity, Dependency, Identity)>,
}

/// Plans jobs and repairs their dependency problems
pub struct DependencySolver<'a> {
    planner: JobPlanner<'a>,
    config: SolverConfig,
}

impl<'a> DependencySolver<'a> {
    pub fn new(source: &'a dyn TroveSource, db: &'a dyn LocalDatabase, config: &UpdateConfig) -> Self {
        Self {
            planner: JobPlanner::new(source, db, config.planner.clone()),
            config: config.solver.clone(),
        }
    }

    pub fn from_planner(planner: JobPlanner<'a>, config: SolverConfig) -> Self {
        Self { planner, config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Plan `primaries` and repair dependency problems until nothing changes
    pub fn resolve(
        &self,
        primaries: &[Job],
        mut resolver: Option<&mut dyn ResolutionSource>,
    ) -> Result<Resolution> {
        let source = self.planner.source();
        let db = self.planner.database();
        let mut state = SolverState::default();
        let mut iterations = 0;

        loop {
            if iterations >= self.config.max_iterations {
                return Err(Error::ResolutionLimit { iterations });
            }
            iterations += 1;

            let plan = self.planner.plan(primaries, &state.overrides)?;
            let check = db.dep_check(&plan.jobs, source, self.config.find_ordering)?;
            debug!(
                "iteration {}: {} jobs, {} unmet, {} broken erasures",
                iterations,
                plan.jobs.len(),
                check.unmet.len(),
                check.cannot_resolve.len()
            );

            if !check.unmet.is_empty()
                && let Some(resolver) = resolver.as_deref_mut()
            {
                let found = self.suggest(resolver, &check.unmet, &mut state)?;
                if !found.is_empty() && self.config.resolve_deps {
                    info!("adding {} troves to satisfy dependencies", found.len());
                    for id in found {
                        state.overrides.additions.push(Job::install(&id, true));
                        state.suggested.insert(id);
                    }
                    continue;
                }
            }

            if !check.cannot_resolve.is_empty() && self.config.keep_required {
                if self.erase_by_updating(primaries, &check, &mut state)? {
                    continue;
                }
                if self.erase_by_keeping(&plan, &check, &mut state)? {
                    continue;
                }
            }

            return Ok(self.finish(plan, check, state, iterations));
        }
    }

    /// Ask the resolution source for providers, one phase at a time
    fn suggest(
        &self,
        resolver: &mut dyn ResolutionSource,
        unmet: &[UnmetDependency],
        state: &mut SolverState,
    ) -> Result<Vec<Identity>> {
        while resolver.prepare_for_resolution(unmet)? {
            let found = resolver.resolve_dependencies()?;
            let picked = resolver.filter_suggestions(unmet, &found, &state.suggested)?;

            for (requirer, troves) in found {
                let entry = state.suggestions.entry(requirer).or_default();
                for trove in troves {
                    if !entry.contains(&trove) {
                        entry.push(trove);
                    }
                }
            }
            if !picked.is_empty() {
                return Ok(picked);
            }
        }
        Ok(Vec::new())
    }

    /// Try updating the packages that require erased troves
    ///
    /// An update is accepted only when it reduces the number of broken
    /// erasures without adding unmet dependencies. An updated requirer that
    /// still needs the erased trove shows up as unmet instead of broken.
    /// Every requiring package is tried at most once.
    fn erase_by_updating(
        &self,
        primaries: &[Job],
        check: &DepCheckResult,
        state: &mut SolverState,
    ) -> Result<bool> {
        let source = self.planner.source();
        let db = self.planner.database();
        let mut broken = check.cannot_resolve.len();
        let mut unmet = check.unmet.len();
        let mut changed = false;

        let packages: BTreeSet<Identity> = check
            .cannot_resolve
            .iter()
            .map(|b| {
                let req = &b.required_by;
                Identity::new(req.package_name(), req.version.clone(), req.flavor.clone())
            })
            .collect();

        for package in packages {
            if !state.update_ineligible.insert(package.clone()) {
                continue;
            }

            let spec = TroveSpec::new(package.name.clone())
                .on_branch(package.branch().clone())
                .with_flavor(package.flavor.clone());
            let found = source.find_troves(
                std::slice::from_ref(&spec),
                FindOptions {
                    use_affinity: true,
                    exact_flavors: false,
                },
            )?;
            let Some(newest) = found.get(&spec).and_then(|ids| ids.iter().max()).cloned() else {
                trace!("no candidates to update {}", package);
                continue;
            };
            if !newest.version.is_newer_than(&package.version) {
                trace!("{} is already the newest version", package);
                continue;
            }

            let mut trial = state.overrides.clone();
            trial.additions.push(Job::install(&newest, true));
            let outcome = self
                .planner
                .plan(primaries, &trial)
                .and_then(|plan| db.dep_check(&plan.jobs, source, false));

            match outcome {
                Ok(result) if result.cannot_resolve.len() < broken && result.unmet.len() <= unmet => {
                    info!("updating {} to {} keeps its dependencies", package, newest);
                    broken = result.cannot_resolve.len();
                    unmet = result.unmet.len();
                    state.overrides = trial;
                    changed = true;
                }
                Ok(_) => debug!("updating {} to {} does not help", package, newest),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!("updating {} to {} failed: {}", package, newest, e),
            }
        }
        Ok(changed)
    }

    /// Revert erasures that installed troves still need
    fn erase_by_keeping(&self, plan: &Plan, check: &DepCheckResult, state: &mut SolverState) -> Result<bool> {
        let mut changed = false;

        for broken in &check.cannot_resolve {
            for provider in &broken.providers {
                let key = (
                    provider.clone(),
                    broken.dependency.clone(),
                    broken.required_by.clone(),
                );
                if !state.keep_ineligible.insert(key) {
                    continue;
                }
                let Some(job) = plan.jobs.job_removing(provider).cloned() else {
                    continue;
                };

                match self.keep_action(&job, provider)? {
                    KeepAction::Impossible => {
                        debug!("cannot keep {}: files overlap with its replacement", provider);
                        continue;
                    }
                    KeepAction::KeepOld(new) => {
                        state.overrides.ineligible.insert(new);
                    }
                    KeepAction::Keep | KeepAction::SideBySide => {}
                }

                info!("keeping {} for {}", provider, broken.required_by);
                state.overrides.keep.insert(provider.clone());
                state.keep_list.push(KeepEntry {
                    job,
                    dependency: broken.dependency.clone(),
                    required_by: broken.required_by.clone(),
                });
                changed = true;
            }
        }
        Ok(changed)
    }

    fn keep_action(&self, job: &Job, old: &Identity) -> Result<KeepAction> {
        let Some(new) = job.new_identity() else {
            return Ok(KeepAction::Keep);
        };
        let old_hashes = self
            .planner
            .database()
            .path_hashes(std::slice::from_ref(old))?
            .into_iter()
            .next()
            .unwrap_or_default();
        let new_hashes = self.planner.source().get_trove(&new, true)?.path_hashes;

        Ok(if old_hashes == new_hashes {
            KeepAction::KeepOld(new)
        } else if old_hashes.is_disjoint(&new_hashes) {
            KeepAction::SideBySide
        } else {
            KeepAction::Impossible
        })
    }

    fn finish(&self, plan: Plan, check: DepCheckResult, state: SolverState, iterations: usize) -> Resolution {
        let mut keep_list = state.keep_list;
        keep_list.sort();
        keep_list.dedup();

        let resolution = Resolution {
            jobs: plan.jobs,
            ordering: check.ordering,
            unmet: check.unmet,
            broken_erasures: check.cannot_resolve,
            suggestions: state.suggestions,
            keep_list,
            kept: plan.kept,
            iterations,
            auto_resolve: self.config.resolve_deps,
        };
        debug!(
            "resolution finished after {} iterations: {}",
            iterations,
            resolution.outcome()
        );
        resolution
    }
}
