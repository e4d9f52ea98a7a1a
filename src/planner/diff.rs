// src/planner/diff.rs

//! Trove-set diff
//!
//! Pairs troves that are available but not yet visible with visible troves
//! of the same name that they would replace. Pairs are ranked by branch
//! match, flavor compatibility, flavor score and version, and taken greedily
//! so each old and each new trove is used at most once.

use crate::flavor::FlavorArena;
use crate::trove::Identity;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PairRank {
    same_branch: bool,
    compatible: bool,
    score: i32,
}

/// Pair new troves with the old troves they replace
///
/// Identities present on both sides are ignored. Returns new → old.
pub fn diff_troves(
    available: &BTreeSet<Identity>,
    visible: &BTreeSet<Identity>,
    arena: &mut FlavorArena,
) -> BTreeMap<Identity, Identity> {
    let mut olds_by_name: BTreeMap<&str, Vec<&Identity>> = BTreeMap::new();
    for old in visible.difference(available) {
        olds_by_name.entry(old.name.as_str()).or_default().push(old);
    }

    let mut news_by_name: BTreeMap<&str, Vec<&Identity>> = BTreeMap::new();
    for new in available.difference(visible) {
        news_by_name.entry(new.name.as_str()).or_default().push(new);
    }

    let mut pairs = BTreeMap::new();
    for (name, news) in news_by_name {
        let Some(olds) = olds_by_name.get(name) else {
            continue;
        };

        let mut ranked = Vec::with_capacity(news.len() * olds.len());
        for &new in &news {
            for &old in olds {
                let forward = arena.match_flavors(&new.flavor, &old.flavor);
                let backward = arena.match_flavors(&old.flavor, &new.flavor);
                let rank = PairRank {
                    same_branch: new.version.branch == old.version.branch,
                    compatible: forward.is_some() || backward.is_some(),
                    score: forward.or(backward).unwrap_or(i32::MIN),
                };
                ranked.push((rank, new, old));
            }
        }

        // Best rank first; among equals the newest versions pair up first
        ranked.sort_by(|a, b| {
            (Reverse(a.0), Reverse(&a.1.version), Reverse(&a.2.version))
                .cmp(&(Reverse(b.0), Reverse(&b.1.version), Reverse(&b.2.version)))
        });

        let mut used_new = BTreeSet::new();
        let mut used_old = BTreeSet::new();
        for (_, new, old) in ranked {
            if used_new.contains(new) || used_old.contains(old) {
                continue;
            }
            used_new.insert(new);
            used_old.insert(old);
            pairs.insert(new.clone(), old.clone());
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> Identity {
        Identity::parse(s).unwrap()
    }

    #[test]
    fn test_pairs_same_branch_first() {
        let old_main = ident("foo=/conary.example.com@rpl:2/1.0-1-1");
        let old_devel = ident("foo=/conary.example.com@rpl:devel/1.5-1-1");
        let new_main = ident("foo=/conary.example.com@rpl:2/2.0-1-1");

        let available = BTreeSet::from([new_main.clone()]);
        let visible = BTreeSet::from([old_main.clone(), old_devel]);
        let pairs = diff_troves(&available, &visible, &mut FlavorArena::new());

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[&new_main], old_main);
    }

    #[test]
    fn test_pairs_by_flavor() {
        let old_ssl = ident("foo=/conary.example.com@rpl:2/1.0-1-1[ssl]");
        let old_nossl = ident("foo=/conary.example.com@rpl:2/1.0-1-1[!ssl]");
        let new_ssl = ident("foo=/conary.example.com@rpl:2/2.0-1-1[ssl]");
        let new_nossl = ident("foo=/conary.example.com@rpl:2/2.0-1-1[!ssl]");

        let available = BTreeSet::from([new_ssl.clone(), new_nossl.clone()]);
        let visible = BTreeSet::from([old_ssl.clone(), old_nossl.clone()]);
        let pairs = diff_troves(&available, &visible, &mut FlavorArena::new());

        assert_eq!(pairs[&new_ssl], old_ssl);
        assert_eq!(pairs[&new_nossl], old_nossl);
    }

    #[test]
    fn test_identical_and_unrelated_troves_ignored() {
        let same = ident("foo=/conary.example.com@rpl:2/1.0-1-1");
        let other = ident("bar=/conary.example.com@rpl:2/1.0-1-1");

        let available = BTreeSet::from([same.clone(), other]);
        let visible = BTreeSet::from([same]);
        assert!(diff_troves(&available, &visible, &mut FlavorArena::new()).is_empty());
    }

    #[test]
    fn test_incompatible_flavors_still_pair() {
        let old = ident("foo=/conary.example.com@rpl:2/1.0-1-1[is: x86]");
        let new = ident("foo=/conary.example.com@rpl:2/2.0-1-1[is: x86_64]");

        let pairs = diff_troves(
            &BTreeSet::from([new.clone()]),
            &BTreeSet::from([old.clone()]),
            &mut FlavorArena::new(),
        );
        assert_eq!(pairs[&new], old);
    }
}
