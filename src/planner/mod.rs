// src/planner/mod.rs

//! Job planning
//!
//! Expands primary jobs (explicit requests) into the complete set of jobs
//! needed to move the installed system to the requested state:
//!
//! 1. Redirects among the requested troves are followed.
//! 2. The closure of everything the requests contain is collected and
//!    diffed against the installed and referenced troves, pairing each new
//!    trove with the old trove it replaces.
//! 3. A worklist visits the requests and then the children of every
//!    accepted container, deciding per trove whether to install, update or
//!    leave it alone (branch and flavor affinity, pins, local changes).
//! 4. Troves that are no longer wanted are found by mark and sweep over
//!    the replaced troves and everything they contain.
//! 5. The result is validated: no trove added and removed, and no file
//!    overlap between troves installed side by side.

mod conflict;
mod diff;
mod erasure;
mod redirect;
mod state;

pub use conflict::find_path_conflicts;
pub use diff::diff_troves;
pub use redirect::follow_redirects;

use crate::config::PlannerConfig;
use crate::error::{Error, Result};
use crate::flavor::{Flavor, FlavorArena};
use crate::job::{Job, JobSet};
use crate::source::{LocalDatabase, TroveSource};
use crate::trove::{Identity, PathHashes, TroveRef};
use crate::version::Branch;
use erasure::{ContainmentGraph, EraseState, mark_and_sweep};
use state::InstalledState;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, trace};

/// Adjustments the dependency solver makes between planning passes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOverrides {
    /// Troves that must not be installed
    pub ineligible: BTreeSet<Identity>,
    /// Installed troves whose erasure was reverted
    pub keep: BTreeSet<Identity>,
    /// Extra requests; pins are not checked for these
    pub additions: Vec<Job>,
}

/// Result of one planning pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub jobs: JobSet,
    /// Installed troves left in place that a request would have replaced
    pub kept: BTreeSet<Identity>,
}

/// Expands requests into complete job sets
pub struct JobPlanner<'a> {
    source: &'a dyn TroveSource,
    db: &'a dyn LocalDatabase,
    config: PlannerConfig,
}

impl<'a> JobPlanner<'a> {
    pub fn new(source: &'a dyn TroveSource, db: &'a dyn LocalDatabase, config: PlannerConfig) -> Self {
        Self { source, db, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn source(&self) -> &'a dyn TroveSource {
        self.source
    }

    pub fn database(&self) -> &'a dyn LocalDatabase {
        self.db
    }

    /// Plan `primaries` against the installed system
    pub fn plan(&self, primaries: &[Job], overrides: &PlanOverrides) -> Result<Plan> {
        let state = InstalledState::load(self.db)?;
        let mut ctx = PlannerContext::new(self, &state, overrides);

        for job in primaries {
            ctx.add_primary(job, self.config.check_primary_pins)?;
        }
        for job in &overrides.additions {
            ctx.add_primary(job, false)?;
        }

        ctx.collect_closure()?;
        ctx.run()?;
        ctx.finish()
    }
}

/// What the parent of a candidate did
#[derive(Debug, Clone, Default)]
struct ParentInfo {
    accepted: bool,
    fresh_install: bool,
    updated: bool,
    /// (old branch, new branch) when the parent moved branches
    branch_switch: Option<(Branch, Branch)>,
}

/// A trove under consideration
#[derive(Debug, Clone)]
struct Candidate {
    identity: Identity,
    primary: bool,
    /// Old side named by the request
    explicit_old: Option<Identity>,
    absolute: bool,
    check_pins: bool,
    by_default: bool,
    parent: Option<ParentInfo>,
}

/// How a candidate relates to what is installed
enum Replacement {
    Fresh,
    Replace(Identity),
    Skip,
}

/// Working state of one planning pass
struct PlannerContext<'p> {
    source: &'p dyn TroveSource,
    db: &'p dyn LocalDatabase,
    config: &'p PlannerConfig,
    state: &'p InstalledState,
    overrides: &'p PlanOverrides,
    arena: FlavorArena,
    queue: VecDeque<Candidate>,
    primary_erases: BTreeSet<Identity>,
    available: BTreeSet<Identity>,
    children: BTreeMap<Identity, Vec<TroveRef>>,
    /// New → old pairs from the trove-set diff
    replacements: BTreeMap<Identity, Identity>,
    jobs: JobSet,
    handled: BTreeSet<Identity>,
    /// Installed troves the requested state still contains
    wanted: BTreeSet<Identity>,
    kept: BTreeSet<Identity>,
    /// Installed troves listed as not by default by their new container
    unwanted: BTreeSet<Identity>,
    /// Olds of primaries that were not recursed into
    non_recursing: BTreeSet<Identity>,
    new_hashes: BTreeMap<Identity, PathHashes>,
}

impl<'p> PlannerContext<'p> {
    fn new(planner: &'p JobPlanner<'p>, state: &'p InstalledState, overrides: &'p PlanOverrides) -> Self {
        Self {
            source: planner.source,
            db: planner.db,
            config: &planner.config,
            state,
            overrides,
            arena: FlavorArena::new(),
            queue: VecDeque::new(),
            primary_erases: BTreeSet::new(),
            available: BTreeSet::new(),
            children: BTreeMap::new(),
            replacements: BTreeMap::new(),
            jobs: JobSet::new(),
            handled: BTreeSet::new(),
            wanted: BTreeSet::new(),
            kept: BTreeSet::new(),
            unwanted: BTreeSet::new(),
            non_recursing: BTreeSet::new(),
            new_hashes: BTreeMap::new(),
        }
    }

    fn add_primary(&mut self, job: &Job, check_pins: bool) -> Result<()> {
        let Some(new) = job.new_identity() else {
            let old = job.old_identity().ok_or_else(|| Error::InvalidJob {
                name: job.name.clone(),
                reason: "job has neither an old nor a new side".to_string(),
            })?;
            return self.add_primary_erase(old, check_pins);
        };

        if !self.source.has_trove(&new)? {
            return Err(Error::NotFound(format!("{} is not available", new)));
        }
        let targets = follow_redirects(self.source, &new)?;
        if !targets.iter().any(|t| t.name == new.name) {
            // Redirected away from this name: what is installed under it goes
            let olds: Vec<Identity> = match job.old_identity() {
                Some(old) => vec![old],
                None => self
                    .state
                    .visible_named(&new.name)
                    .filter(|id| self.state.is_present(id))
                    .cloned()
                    .collect(),
            };
            for old in olds {
                if self.state.is_present(&old) {
                    self.add_primary_erase(old, check_pins)?;
                }
            }
        }

        for target in targets {
            let same_name = target.name == new.name;
            self.queue.push_back(Candidate {
                explicit_old: if same_name { job.old_identity() } else { None },
                absolute: job.absolute || !same_name,
                identity: target,
                primary: true,
                check_pins,
                by_default: true,
                parent: None,
            });
        }
        Ok(())
    }

    fn add_primary_erase(&mut self, old: Identity, check_pins: bool) -> Result<()> {
        if !self.state.is_present(&old) {
            return Err(Error::NotFound(format!("{} is not installed", old)));
        }
        if check_pins && self.state.is_pinned(&old) {
            return Err(Error::PinnedTrove { old, new: None });
        }
        debug!("erase requested for {}", old);
        self.primary_erases.insert(old);
        Ok(())
    }

    /// Collect everything the requests contain and pair it with what is visible
    fn collect_closure(&mut self) -> Result<()> {
        let mut pending: VecDeque<Identity> = self.queue.iter().map(|c| c.identity.clone()).collect();
        while let Some(id) = pending.pop_front() {
            if !self.available.insert(id.clone()) {
                continue;
            }
            if !self.config.recurse || id.is_component() {
                continue;
            }
            let refs = self.source.iter_trove_list(&id)?;
            pending.extend(refs.iter().filter(|r| r.strong).map(|r| r.identity.clone()));
            self.children.insert(id, refs);
        }

        let visible: BTreeSet<Identity> = self.state.visible().cloned().collect();
        self.replacements = diff_troves(&self.available, &visible, &mut self.arena);
        trace!(
            "closure: {} available, {} visible, {} replacements",
            self.available.len(),
            visible.len(),
            self.replacements.len()
        );
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        while let Some(candidate) = self.queue.pop_front() {
            self.process(candidate)?;
        }
        Ok(())
    }

    fn process(&mut self, cand: Candidate) -> Result<()> {
        let state = self.state;
        let id = cand.identity.clone();
        if !self.handled.insert(id.clone()) {
            return Ok(());
        }

        if state.is_present(&id) {
            let parent_accepted = cand.parent.as_ref().is_some_and(|p| p.accepted);
            if self.config.remove_not_by_default && !cand.primary && !cand.by_default && parent_accepted {
                debug!("{} is not installed by default any more", id);
                self.unwanted.insert(id.clone());
            } else {
                trace!("{} is already installed", id);
                self.wanted.insert(id.clone());
            }
            self.enqueue_children(
                &id,
                ParentInfo {
                    accepted: true,
                    ..ParentInfo::default()
                },
            );
            return Ok(());
        }

        if self.overrides.ineligible.contains(&id) {
            trace!("{} is ineligible", id);
            return Ok(());
        }

        let parent = cand.parent.clone().unwrap_or_default();
        let old = match self.lookup_replacement(&cand, &parent) {
            Replacement::Skip => return Ok(()),
            Replacement::Fresh => {
                let allowed = if cand.primary {
                    !self.config.update_only
                } else {
                    cand.by_default && parent.accepted
                };
                if !allowed {
                    trace!("not installing {}", id);
                    return Ok(());
                }
                return self.emit(&cand, None);
            }
            Replacement::Replace(old) => old,
        };

        if self.config.respect_branch_affinity && !cand.primary && old.branch() != id.branch() {
            let reversion = state
                .original_of(&old)
                .is_some_and(|orig| orig.branch() == id.branch());
            let same_switch = parent
                .branch_switch
                .as_ref()
                .is_some_and(|(from, to)| from == old.branch() && to == id.branch());
            let upstream =
                state.is_referenced(&old) && state.original_of(&old).is_none() && parent.updated;
            if !(reversion || same_switch || upstream) {
                debug!("keeping {} on its branch instead of {}", old, id);
                self.kept.insert(old);
                return Ok(());
            }
        }

        if self.config.respect_flavor_affinity && !cand.primary {
            let original = state.original_of(&old).cloned();
            let compatible = self.flavors_compatible(&old.flavor, &id.flavor)
                || original.is_some_and(|orig| self.flavors_compatible(&orig.flavor, &id.flavor));
            if !compatible {
                debug!("keeping {}: {} has an incompatible flavor", old, id);
                self.kept.insert(old);
                return Ok(());
            }
        }

        let keep_old = self.overrides.keep.contains(&old);
        if keep_old || state.is_pinned(&old) {
            if keep_old || self.side_by_side_ok(&id, &old)? {
                debug!("installing {} alongside {}", id, old);
                self.kept.insert(old);
                return self.emit(&cand, None);
            }
            if !cand.primary {
                debug!("{} is pinned; not updating to {}", old, id);
                self.kept.insert(old);
                return Ok(());
            }
            if cand.check_pins {
                return Err(Error::PinnedTrove { old, new: Some(id) });
            }
            debug!("replacing pinned {} as requested", old);
        }

        self.emit(&cand, Some(old))
    }

    /// Find the installed trove a candidate replaces
    fn lookup_replacement(&self, cand: &Candidate, parent: &ParentInfo) -> Replacement {
        let state = self.state;
        let id = &cand.identity;

        // Referenced but missing: removed or replaced locally
        if state.is_referenced(id) {
            let forced = cand.primary
                || (cand.by_default && parent.fresh_install)
                || (cand.by_default && self.config.install_missing_refs);
            let product = state.product_of(id).cloned();
            if !forced {
                trace!("{} was removed locally; leaving it out", id);
                return Replacement::Skip;
            }
            return product.map_or(Replacement::Fresh, Replacement::Replace);
        }

        let old = if let Some(old) = &cand.explicit_old {
            Some(old.clone())
        } else if cand.primary && !cand.absolute {
            None
        } else {
            self.replacements.get(id).cloned()
        };
        let Some(old) = old else {
            return Replacement::Fresh;
        };
        if state.is_present(&old) {
            return Replacement::Replace(old);
        }

        // Follow a local update to what is actually installed
        if let Some(product) = state.product_of(&old) {
            return Replacement::Replace(product.clone());
        }

        let weak_everywhere = state.parents(&old).iter().all(|(_, by_default)| !by_default);
        if cand.primary || (cand.by_default && weak_everywhere) {
            trace!("{} replaces {}, which is only referenced", id, old);
            Replacement::Fresh
        } else {
            trace!("{} was removed locally; not installing {}", old, id);
            Replacement::Skip
        }
    }

    fn flavors_compatible(&mut self, a: &Flavor, b: &Flavor) -> bool {
        self.arena.match_flavors(a, b).is_some() || self.arena.match_flavors(b, a).is_some()
    }

    fn new_path_hashes(&mut self, id: &Identity) -> Result<PathHashes> {
        if let Some(hashes) = self.new_hashes.get(id) {
            return Ok(hashes.clone());
        }
        let hashes = self.source.get_trove(id, true)?.path_hashes;
        self.new_hashes.insert(id.clone(), hashes.clone());
        Ok(hashes)
    }

    /// Whether `new` can be installed next to the installed `old`
    fn side_by_side_ok(&mut self, new: &Identity, old: &Identity) -> Result<bool> {
        let new_hashes = self.new_path_hashes(new)?;
        let old_hashes = self.db.path_hashes(std::slice::from_ref(old))?;
        Ok(old_hashes.first().is_some_and(|h| h.is_disjoint(&new_hashes)))
    }

    fn emit(&mut self, cand: &Candidate, old: Option<Identity>) -> Result<()> {
        let id = &cand.identity;
        let old = old.filter(|o| {
            let taken = self.jobs.erased().contains(o);
            if taken {
                debug!("{} is already replaced; installing {} alongside", o, id);
            }
            !taken
        });

        let job = match &old {
            Some(old) => Job::update(old, id),
            None => Job::install(id, false),
        };
        debug!("{}", job);
        self.jobs.insert(job)?;

        if cand.primary
            && !self.config.recurse
            && let Some(old) = &old
        {
            self.non_recursing.insert(old.clone());
        }

        let info = ParentInfo {
            accepted: true,
            fresh_install: old.is_none(),
            updated: old.is_some(),
            branch_switch: old
                .as_ref()
                .filter(|o| o.branch() != id.branch())
                .map(|o| (o.branch().clone(), id.branch().clone())),
        };
        self.enqueue_children(id, info);
        Ok(())
    }

    fn enqueue_children(&mut self, id: &Identity, info: ParentInfo) {
        let Some(refs) = self.children.get(id) else {
            return;
        };
        for child in refs.iter().filter(|r| r.strong) {
            self.queue.push_back(Candidate {
                identity: child.identity.clone(),
                primary: false,
                explicit_old: None,
                absolute: false,
                check_pins: false,
                by_default: child.by_default,
                parent: Some(info.clone()),
            });
        }
    }

    /// Whether an erasure candidate must stay
    fn is_keep_seed(&self, graph: &ContainmentGraph, node: &Identity) -> bool {
        let state = self.state;
        if self.jobs.erased().contains(node) {
            return false;
        }
        if self.primary_erases.contains(node) || self.unwanted.contains(node) {
            return self.overrides.keep.contains(node);
        }
        state.is_pinned(node)
            || self.jobs.installed().contains(node)
            || self.wanted.contains(node)
            || self.kept.contains(node)
            || self.overrides.keep.contains(node)
            || state.parents(node).iter().any(|(parent, _)| !graph.contains(parent))
    }

    /// Erase what is no longer wanted
    fn sweep_erasures(&mut self) -> Result<()> {
        let state = self.state;
        let mut roots: BTreeSet<Identity> = self.jobs.erased().clone();
        roots.extend(self.primary_erases.iter().cloned());
        roots.extend(self.unwanted.iter().cloned());

        let graph = ContainmentGraph::build(state, &roots);
        let mut keep: BTreeSet<Identity> = graph
            .nodes()
            .filter(|node| self.is_keep_seed(&graph, node))
            .cloned()
            .collect();
        for old in &self.non_recursing {
            keep.extend(state.children(old).iter().map(|r| r.identity.clone()));
        }

        let states = mark_and_sweep(&graph, &keep);
        trace!("erasure graph: {} troves, {} keep seeds", graph.len(), keep.len());
        for (id, erase_state) in states {
            if erase_state == EraseState::Erase
                && state.is_present(&id)
                && !self.jobs.erased().contains(&id)
            {
                debug!("erasing {}", id);
                self.jobs.insert(Job::erase(&id))?;
            }
        }
        Ok(())
    }

    /// Troves of one name and branch installed side by side must not share files
    fn check_path_conflicts(&mut self) -> Result<()> {
        let state = self.state;
        let erased = self.jobs.erased().clone();
        let installed = self.jobs.installed().clone();
        let surviving: Vec<&Identity> = state
            .present()
            .iter()
            .filter(|id| !erased.contains(*id))
            .collect();

        let same_slot = |a: &Identity, b: &Identity| a != b && a.name == b.name && a.branch() == b.branch();
        let mut new_hashes = BTreeMap::new();
        let mut neighbours: BTreeSet<Identity> = BTreeSet::new();
        for id in &installed {
            let others: Vec<&Identity> = surviving
                .iter()
                .copied()
                .filter(|o| same_slot(id, *o))
                .collect();
            let crowded = !others.is_empty() || installed.iter().any(|o| same_slot(id, o));
            if !crowded {
                continue;
            }
            neighbours.extend(others.into_iter().cloned());
            new_hashes.insert(id.clone(), self.new_path_hashes(id)?);
        }
        if new_hashes.is_empty() {
            return Ok(());
        }

        let neighbours: Vec<Identity> = neighbours.into_iter().collect();
        let hashes = self.db.path_hashes(&neighbours)?;
        let surviving_hashes: BTreeMap<Identity, PathHashes> = neighbours.into_iter().zip(hashes).collect();

        let conflicts = find_path_conflicts(&new_hashes, &surviving_hashes);
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(Error::PathConflicts(conflicts))
        }
    }

    fn finish(mut self) -> Result<Plan> {
        self.sweep_erasures()?;
        self.jobs.validate()?;
        self.check_path_conflicts()?;

        debug!("planned {} jobs, kept {} troves", self.jobs.len(), self.kept.len());
        Ok(Plan {
            jobs: self.jobs,
            kept: self.kept,
        })
    }
}
