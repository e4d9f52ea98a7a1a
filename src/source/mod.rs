// src/source/mod.rs

//! Collaborator interfaces: trove sources, the local database and
//! dependency resolution sources
//!
//! The planner and solver only talk to the outside world through these
//! traits. In-memory implementations are provided for embedding and tests.

mod memory;
mod resolve;

pub use memory::{MemoryDatabase, MemoryRepository};
pub use resolve::LabelPathResolver;

use crate::dependencies::Dependency;
use crate::depcheck::{DepCheckResult, UnmetDependency};
use crate::error::Result;
use crate::flavor::Flavor;
use crate::job::JobSet;
use crate::label::Label;
use crate::trove::{Identity, PathHashes, Trove, TroveRef};
use crate::version::{Branch, Version};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A query for troves by name, narrowed by branch, version and flavor
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TroveSpec {
    pub name: String,
    pub branch: Option<Branch>,
    pub version: Option<Version>,
    pub flavor: Option<Flavor>,
}

impl TroveSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branch: None,
            version: None,
            flavor: None,
        }
    }

    pub fn on_branch(mut self, branch: Branch) -> Self {
        self.branch = Some(branch);
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = Some(flavor);
        self
    }
}

impl fmt::Display for TroveSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(version) = &self.version {
            write!(f, "={}", version)?;
        } else if let Some(branch) = &self.branch {
            write!(f, "={}", branch)?;
        }
        if let Some(flavor) = &self.flavor {
            write!(f, "{}", flavor)?;
        }
        Ok(())
    }
}

/// Options for [`TroveSource::find_troves`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Return only the newest match on each branch
    pub use_affinity: bool,
    /// Flavors must match exactly instead of by compatibility
    pub exact_flavors: bool,
}

/// Read access to troves
pub trait TroveSource {
    /// Which of `ids` exist in this source
    fn has_troves(&self, ids: &[Identity]) -> Result<Vec<bool>>;

    fn has_trove(&self, id: &Identity) -> Result<bool> {
        Ok(self
            .has_troves(std::slice::from_ref(id))?
            .first()
            .copied()
            .unwrap_or(false))
    }

    /// Fetch a trove; path hashes are only filled in when `with_files` is set
    fn get_trove(&self, id: &Identity, with_files: bool) -> Result<Trove>;

    /// Resolve specs to matching identities; specs without matches map to
    /// empty lists
    fn find_troves(
        &self,
        specs: &[TroveSpec],
        options: FindOptions,
    ) -> Result<BTreeMap<TroveSpec, Vec<Identity>>>;

    /// Children of a container trove
    fn iter_trove_list(&self, id: &Identity) -> Result<Vec<TroveRef>> {
        Ok(self.get_trove(id, false)?.troves)
    }

    /// Troves committed to `label` that provide each dependency, newest first
    fn resolve_dependencies(
        &self,
        _label: &Label,
        _deps: &[Dependency],
    ) -> Result<BTreeMap<Dependency, Vec<Identity>>> {
        Ok(BTreeMap::new())
    }
}

/// Installed state of one identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TroveState {
    pub identity: Identity,
    /// Unpacked on the system
    pub present: bool,
    /// Named as a child of some present trove
    pub referenced: bool,
    pub pinned: bool,
}

/// A locally made substitution of a referenced trove
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalUpdate {
    /// What the containing trove references
    pub original: Identity,
    /// What is actually installed in its place
    pub installed: Identity,
}

/// The installed system
pub trait LocalDatabase: TroveSource {
    /// Every present or referenced identity
    fn trove_states(&self) -> Result<Vec<TroveState>>;

    fn troves_are_pinned(&self, ids: &[Identity]) -> Result<Vec<bool>>;

    fn local_updates(&self) -> Result<Vec<LocalUpdate>>;

    fn path_hashes(&self, ids: &[Identity]) -> Result<Vec<PathHashes>>;

    /// Check `jobs` against the installed system
    fn dep_check(
        &self,
        jobs: &JobSet,
        source: &dyn TroveSource,
        find_ordering: bool,
    ) -> Result<DepCheckResult>;
}

/// Requirer → troves suggested to satisfy it
pub type Suggestions = BTreeMap<Identity, Vec<Identity>>;

/// A strategy for finding troves that satisfy unmet dependencies
///
/// Sources may work in phases (for example one label at a time);
/// [`ResolutionSource::prepare_for_resolution`] returns false once no phase
/// is left for the given dependencies.
pub trait ResolutionSource {
    fn prepare_for_resolution(&mut self, unmet: &[UnmetDependency]) -> Result<bool>;

    fn resolve_dependencies(&mut self) -> Result<Suggestions>;

    /// Choose the troves to add, skipping any in `already_suggested`
    fn filter_suggestions(
        &mut self,
        unmet: &[UnmetDependency],
        suggestions: &Suggestions,
        already_suggested: &BTreeSet<Identity>,
    ) -> Result<Vec<Identity>>;
}
