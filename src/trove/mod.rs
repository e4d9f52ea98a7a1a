// src/trove/mod.rs

//! Trove identities and trove contents
//!
//! A trove is any versioned, flavored unit: a component (`foo:runtime`), a
//! package (`foo`), a collection (`group-base`) or a redirect. Troves name
//! their children through [`TroveRef`]s; a child can be installed by default
//! or merely referenced.

mod pathhash;

pub use pathhash::{PathHashes, hash_path};

use crate::dependencies::{Dependency, DependencySet};
use crate::error::Result;
use crate::flavor::Flavor;
use crate::version::{Branch, Version};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// (name, version, flavor): the identity of a trove
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub version: Version,
    pub flavor: Flavor,
}

impl Identity {
    pub fn new(name: impl Into<String>, version: Version, flavor: Flavor) -> Self {
        Self {
            name: name.into(),
            version,
            flavor,
        }
    }

    /// Parse `name=version[flavor]`
    pub fn parse(s: &str) -> Result<Self> {
        let (name, rest) = s.split_once('=').ok_or_else(|| {
            crate::error::Error::ParseError(format!("Trove identity needs name=version: '{}'", s))
        })?;
        let (version, flavor) = match rest.find('[') {
            Some(pos) => (&rest[..pos], Flavor::parse(&rest[pos..])?),
            None => (rest, Flavor::empty()),
        };
        Ok(Self::new(name.trim(), Version::parse(version.trim())?, flavor))
    }

    /// The package this trove belongs to: `foo:runtime` → `foo`
    pub fn package_name(&self) -> &str {
        package_name(&self.name)
    }

    pub fn is_component(&self) -> bool {
        self.name.contains(':')
    }

    pub fn branch(&self) -> &Branch {
        &self.version.branch
    }
}

/// The package part of a trove name
pub fn package_name(name: &str) -> &str {
    name.split_once(':').map_or(name, |(pkg, _)| pkg)
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}{}", self.name, self.version, self.flavor)
    }
}

impl FromStr for Identity {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Identity::parse(s)
    }
}

/// A reference from a container trove to a child
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TroveRef {
    pub identity: Identity,
    /// Installed along with the container unless the user opts out
    pub by_default: bool,
    /// Direct child (strong) or included through another child (weak)
    pub strong: bool,
}

/// What kind of trove this is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TroveKind {
    Package,
    Component,
    Collection,
    Redirect,
}

impl TroveKind {
    pub fn as_str(&self) -> &str {
        match self {
            TroveKind::Package => "package",
            TroveKind::Component => "component",
            TroveKind::Collection => "collection",
            TroveKind::Redirect => "redirect",
        }
    }

    /// Kind implied by a trove name
    pub fn for_name(name: &str) -> Self {
        if name.contains(':') {
            TroveKind::Component
        } else if name.starts_with("group-") {
            TroveKind::Collection
        } else {
            TroveKind::Package
        }
    }
}

impl FromStr for TroveKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "package" => Ok(TroveKind::Package),
            "component" => Ok(TroveKind::Component),
            "collection" => Ok(TroveKind::Collection),
            "redirect" => Ok(TroveKind::Redirect),
            _ => Err(format!("Invalid trove kind: {s}")),
        }
    }
}

impl fmt::Display for TroveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a redirect trove points
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RedirectTarget {
    pub name: String,
    pub branch: Branch,
    /// Flavor to look for; the redirect's own flavor when absent
    pub flavor: Option<Flavor>,
}

/// A trove with its children, dependencies and file paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trove {
    pub identity: Identity,
    pub kind: TroveKind,
    pub troves: Vec<TroveRef>,
    pub provides: DependencySet,
    pub requires: DependencySet,
    pub path_hashes: PathHashes,
    /// Targets of a redirect; empty for a redirect to nothing
    pub redirects: Vec<RedirectTarget>,
}

impl Trove {
    /// Create a trove that provides its own name
    pub fn new(identity: Identity) -> Self {
        let provides = DependencySet::from(Dependency::trove(identity.name.clone()));
        Self {
            kind: TroveKind::for_name(&identity.name),
            identity,
            troves: Vec::new(),
            provides,
            requires: DependencySet::new(),
            path_hashes: PathHashes::new(),
            redirects: Vec::new(),
        }
    }

    /// A redirect trove pointing at `targets`
    pub fn redirect(identity: Identity, targets: Vec<RedirectTarget>) -> Self {
        let mut trove = Self::new(identity);
        trove.kind = TroveKind::Redirect;
        trove.provides = DependencySet::new();
        trove.redirects = targets;
        trove
    }

    pub fn with_kind(mut self, kind: TroveKind) -> Self {
        self.kind = kind;
        self
    }

    /// Add a strong child reference
    pub fn with_child(mut self, identity: Identity, by_default: bool) -> Self {
        self.troves.push(TroveRef {
            identity,
            by_default,
            strong: true,
        });
        self
    }

    /// Add a weak child reference
    pub fn with_weak_child(mut self, identity: Identity, by_default: bool) -> Self {
        self.troves.push(TroveRef {
            identity,
            by_default,
            strong: false,
        });
        self
    }

    pub fn with_provides(mut self, dep: Dependency) -> Self {
        self.provides.add(dep);
        self
    }

    pub fn with_requires(mut self, dep: Dependency) -> Self {
        self.requires.add(dep);
        self
    }

    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for path in paths {
            self.path_hashes.insert_path(path.as_ref());
        }
        self
    }

    pub fn is_redirect(&self) -> bool {
        self.kind == TroveKind::Redirect
    }

    /// Child references, optionally only the strong ones
    pub fn children(&self, strong_only: bool) -> impl Iterator<Item = &TroveRef> {
        self.troves.iter().filter(move |r| r.strong || !strong_only)
    }

    /// Copy without file information
    pub fn without_files(&self) -> Trove {
        let mut trove = self.clone();
        trove.path_hashes = PathHashes::new();
        trove
    }
}
