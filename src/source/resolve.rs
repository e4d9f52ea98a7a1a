// src/source/resolve.rs

//! Label-path dependency resolution
//!
//! Unmet dependencies are looked up one label at a time, in label-path
//! order. Each call to `prepare_for_resolution` moves to the next label
//! until the path is exhausted; a changed set of unmet dependencies starts
//! over at the first label.

use super::{ResolutionSource, Suggestions, TroveSource};
use crate::dependencies::Dependency;
use crate::depcheck::UnmetDependency;
use crate::error::Result;
use crate::flavor::Flavor;
use crate::label::{Label, LabelPath};
use crate::trove::Identity;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// Resolves dependencies against a [`TroveSource`] along a label path
pub struct LabelPathResolver<'a> {
    source: &'a dyn TroveSource,
    label_path: LabelPath,
    system_flavor: Flavor,
    next_label: usize,
    current: Option<Label>,
    pending: Vec<UnmetDependency>,
}

impl<'a> LabelPathResolver<'a> {
    pub fn new(source: &'a dyn TroveSource, label_path: LabelPath, system_flavor: Flavor) -> Self {
        Self {
            source,
            label_path,
            system_flavor,
            next_label: 0,
            current: None,
            pending: Vec::new(),
        }
    }

    /// The label being searched, if any
    pub fn current_label(&self) -> Option<&Label> {
        self.current.as_ref()
    }
}

impl ResolutionSource for LabelPathResolver<'_> {
    fn prepare_for_resolution(&mut self, unmet: &[UnmetDependency]) -> Result<bool> {
        if unmet != self.pending.as_slice() {
            self.pending = unmet.to_vec();
            self.next_label = 0;
        }

        match self.label_path.get(self.next_label) {
            Some(label) => {
                debug!("resolving {} dependencies on {}", self.pending.len(), label);
                self.current = Some(label.clone());
                self.next_label += 1;
                Ok(true)
            }
            None => {
                self.current = None;
                Ok(false)
            }
        }
    }

    fn resolve_dependencies(&mut self) -> Result<Suggestions> {
        let mut suggestions = Suggestions::new();
        let Some(label) = &self.current else {
            return Ok(suggestions);
        };

        let deps: Vec<Dependency> = self
            .pending
            .iter()
            .map(|u| u.dependency.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let found = self.source.resolve_dependencies(label, &deps)?;

        for unmet in &self.pending {
            let Some(providers) = found.get(&unmet.dependency) else {
                continue;
            };
            let candidates: Vec<(Flavor, &Identity)> =
                providers.iter().map(|p| (p.flavor.clone(), p)).collect();
            if let Some(best) = Flavor::select_best(&candidates, &self.system_flavor) {
                trace!("{} for {} on {}", best, unmet.dependency, label);
                let entry = suggestions.entry(unmet.trove.clone()).or_default();
                if !entry.contains(*best) {
                    entry.push((*best).clone());
                }
            }
        }

        Ok(suggestions)
    }

    fn filter_suggestions(
        &mut self,
        _unmet: &[UnmetDependency],
        suggestions: &Suggestions,
        already_suggested: &BTreeSet<Identity>,
    ) -> Result<Vec<Identity>> {
        let picked: BTreeSet<Identity> = suggestions
            .values()
            .flatten()
            .filter(|id| !already_suggested.contains(*id))
            .filter(|id| self.system_flavor.satisfies(&id.flavor))
            .cloned()
            .collect();
        Ok(picked.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryRepository;
    use crate::trove::Trove;

    fn ident(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    fn unmet(requirer: &str, dep: &str) -> UnmetDependency {
        UnmetDependency {
            trove: ident(requirer),
            dependency: Dependency::trove(dep),
        }
    }

    #[test]
    fn test_walks_label_path_in_order() {
        let repo = MemoryRepository::new()
            .with(Trove::new(ident("bar:lib=/contrib.example.com@rpl:2/1.0-1-1")));
        let path = LabelPath::parse("conary.example.com@rpl:2 contrib.example.com@rpl:2").unwrap();
        let mut resolver = LabelPathResolver::new(&repo, path, Flavor::empty());
        let pending = vec![unmet("foo=/conary.example.com@rpl:2/1.0-1-1", "bar:lib")];

        assert!(resolver.prepare_for_resolution(&pending).unwrap());
        assert!(resolver.resolve_dependencies().unwrap().is_empty());

        assert!(resolver.prepare_for_resolution(&pending).unwrap());
        assert_eq!(resolver.current_label().unwrap().host, "contrib.example.com");
        let suggestions = resolver.resolve_dependencies().unwrap();
        assert_eq!(
            suggestions[&pending[0].trove],
            vec![ident("bar:lib=/contrib.example.com@rpl:2/1.0-1-1")]
        );

        assert!(!resolver.prepare_for_resolution(&pending).unwrap());
    }

    #[test]
    fn test_changed_dependencies_restart_path() {
        let repo = MemoryRepository::new();
        let path = LabelPath::parse("conary.example.com@rpl:2").unwrap();
        let mut resolver = LabelPathResolver::new(&repo, path, Flavor::empty());

        let first = vec![unmet("foo=/conary.example.com@rpl:2/1.0-1-1", "bar:lib")];
        assert!(resolver.prepare_for_resolution(&first).unwrap());
        assert!(!resolver.prepare_for_resolution(&first).unwrap());

        let second = vec![unmet("foo=/conary.example.com@rpl:2/1.0-1-1", "baz:lib")];
        assert!(resolver.prepare_for_resolution(&second).unwrap());
    }

    #[test]
    fn test_best_flavor_and_filtering() {
        let ssl = ident("bar:lib=/conary.example.com@rpl:2/1.0-1-1[ssl]");
        let nossl = ident("bar:lib=/conary.example.com@rpl:2/1.0-1-1[!ssl]");
        let repo = MemoryRepository::new()
            .with(Trove::new(ssl.clone()))
            .with(Trove::new(nossl));
        let path = LabelPath::parse("conary.example.com@rpl:2").unwrap();
        let mut resolver = LabelPathResolver::new(&repo, path, Flavor::parse("[ssl]").unwrap());
        let pending = vec![unmet("foo=/conary.example.com@rpl:2/1.0-1-1", "bar:lib")];

        assert!(resolver.prepare_for_resolution(&pending).unwrap());
        let suggestions = resolver.resolve_dependencies().unwrap();
        let picked = resolver
            .filter_suggestions(&pending, &suggestions, &BTreeSet::new())
            .unwrap();
        assert_eq!(picked, vec![ssl.clone()]);

        let already = BTreeSet::from([ssl]);
        let picked = resolver.filter_suggestions(&pending, &suggestions, &already).unwrap();
        assert!(picked.is_empty());
    }
}
