// src/flavor/mod.rs
//! Flavor parsing, scoring and merging
//!
//! Flavors represent build-time variations like architecture and features.
//! Syntax follows original Conary: `[ssl, !debug, ~vmware, ~!xen, is: x86_64(sse2)]`
//!
//! A flavor is a [`DependencySet`] restricted to the instruction-set and
//! use-flag classes. Scoring asks how well a provided flavor (usually the
//! system or an installed trove) suits a required one; merging combines two
//! flavor requests.

mod arena;

pub use arena::{FlavorArena, FlavorId};

use crate::dependencies::{Dependency, DependencyClass, DependencySet, Flags, MergeMode, Sense};
use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Name under which use flags are stored
const USE_NAME: &str = "use";

static ARCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z0-9_]+)\s*(?:\(([^()]*)\))?").expect("architecture pattern is valid")
});

/// A trove or system flavor
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Flavor(DependencySet);

impl Flavor {
    /// Create an empty flavor
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a flavor from a dependency set, keeping only flavor classes
    pub fn from_deps(mut deps: DependencySet) -> Self {
        deps.retain_classes(|class| class.is_flavor());
        Self(deps)
    }

    pub fn deps(&self) -> &DependencySet {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add a use flag
    pub fn with_use(mut self, flag: &str, sense: Sense) -> Self {
        self.0
            .add(Dependency::new(DependencyClass::Use, USE_NAME).with_flag(flag, sense));
        self
    }

    /// Add an instruction set with optional flags
    pub fn with_arch(mut self, arch: &str, flags: &[(&str, Sense)]) -> Self {
        let mut dep = Dependency::new(DependencyClass::InstructionSet, arch);
        for (flag, sense) in flags {
            dep = dep.with_flag(*flag, *sense);
        }
        self.0.add(dep);
        self
    }

    pub fn use_flags(&self) -> Option<&Flags> {
        self.0.flags(DependencyClass::Use, USE_NAME)
    }

    pub fn architectures(&self) -> impl Iterator<Item = &str> {
        self.0.names(DependencyClass::InstructionSet)
    }

    /// Parse a flavor specification string
    ///
    /// Examples:
    /// - `[ssl, !debug, is: x86_64]`
    /// - `ssl, !debug` (without brackets)
    /// - `[]` (empty)
    /// - `[is: x86(i486,i686) x86_64]` (arch only, with instruction set flags)
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        // Handle bracketed form
        let inner = if s.starts_with('[') && s.ends_with(']') {
            &s[1..s.len() - 1]
        } else {
            s
        };

        let (use_part, arch_part) = match find_arch_marker(inner) {
            Some(pos) => (&inner[..pos], Some(&inner[pos + 3..])),
            None => (inner, None),
        };

        let mut flavor = Self::empty();
        for item in use_part.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            let (sense, name) = Sense::parse_with_name(item)?;
            flavor = flavor.with_use(name, sense);
        }

        if let Some(arch_part) = arch_part {
            flavor.parse_architectures(arch_part)?;
        }

        Ok(flavor)
    }

    fn parse_architectures(&mut self, s: &str) -> Result<()> {
        let mut last_end = 0;
        let mut found = false;

        for caps in ARCH_RE.captures_iter(s) {
            let Some(whole) = caps.get(0) else { continue };
            check_separator(&s[last_end..whole.start()], s)?;
            last_end = whole.end();
            found = true;

            let mut dep = Dependency::new(DependencyClass::InstructionSet, &caps[1]);
            if let Some(flags) = caps.get(2) {
                for token in flags
                    .as_str()
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|t| !t.is_empty())
                {
                    let (sense, flag) = Sense::parse_with_name(token)?;
                    dep.flags.insert(flag.to_string(), sense);
                }
            }
            self.0.add(dep);
        }
        check_separator(&s[last_end..], s)?;

        if !found {
            return Err(Error::ParseError(
                "Empty architecture specification after 'is:'".to_string(),
            ));
        }
        Ok(())
    }

    /// Score this (provided) flavor against a required flavor
    ///
    /// None means incompatible; higher scores are better matches.
    pub fn score(&self, required: &Flavor) -> Option<i32> {
        self.0.score(&required.0)
    }

    /// Whether `self` declares every architecture `required` names
    ///
    /// A flavor without instruction sets accepts any architecture.
    pub fn arch_compatible(&self, required: &Flavor) -> bool {
        self.0.names_compatible(&required.0)
    }

    /// Score gated by architecture compatibility
    pub fn match_score(&self, required: &Flavor) -> Option<i32> {
        if !self.arch_compatible(required) {
            return None;
        }
        self.score(required)
    }

    /// Whether a trove of flavor `required` can be used where `self` is provided
    pub fn satisfies(&self, required: &Flavor) -> bool {
        self.match_score(required).is_some()
    }

    /// Compatible in at least one direction
    pub fn is_compatible(&self, other: &Flavor) -> bool {
        self.satisfies(other) || other.satisfies(self)
    }

    pub fn merge(&self, other: &Flavor, mode: MergeMode) -> Result<Flavor> {
        Ok(Self(self.0.merge(&other.0, mode)?))
    }

    /// Promote preferences to requirements
    ///
    /// Used when comparing pinned troves, where a soft preference must not
    /// mask a real conflict.
    pub fn to_strong(&self) -> Flavor {
        Self(self.0.to_strong())
    }

    /// Select the best matching flavor from candidates for a system flavor
    pub fn select_best<'a, T>(candidates: &'a [(Flavor, T)], system: &Flavor) -> Option<&'a T> {
        candidates
            .iter()
            .filter(|(flavor, _)| system.arch_compatible(flavor))
            .filter_map(|(flavor, item)| system.score(flavor).map(|score| (score, item)))
            .max_by_key(|(score, _)| *score)
            .map(|(_, item)| item)
    }
}

/// Position of an `is:` that starts an item
fn find_arch_marker(s: &str) -> Option<usize> {
    s.match_indices("is:").map(|(i, _)| i).find(|&i| {
        i == 0 || s[..i].ends_with(|c: char| c.is_whitespace() || c == ',')
    })
}

fn check_separator(gap: &str, whole: &str) -> Result<()> {
    if gap.chars().all(|c| c.is_whitespace() || c == ',') {
        Ok(())
    } else {
        Err(Error::ParseError(format!(
            "Malformed architecture specification: '{}'",
            whole.trim()
        )))
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }

        write!(f, "[")?;
        let mut first = true;
        if let Some(flags) = self.use_flags() {
            for (flag, sense) in flags {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{}{}", sense.prefix(), flag)?;
                first = false;
            }
        }

        // Architecture always goes last
        let mut arches = self.architectures().peekable();
        if arches.peek().is_some() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "is:")?;
            for arch in arches {
                write!(f, " {}", arch)?;
                if let Some(flags) = self.0.flags(DependencyClass::InstructionSet, arch)
                    && !flags.is_empty()
                {
                    DependencySet::fmt_flags(f, flags, ",")?;
                }
            }
        }
        write!(f, "]")
    }
}

impl FromStr for Flavor {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Flavor::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flavor(s: &str) -> Flavor {
        Flavor::parse(s).unwrap()
    }

    // === Parsing tests ===

    #[test]
    fn test_parse_empty() {
        assert!(flavor("").is_empty());
        assert!(flavor("[]").is_empty());
        assert_eq!(Flavor::empty().to_string(), "");
    }

    #[test]
    fn test_parse_all_senses() {
        let f = flavor("[ssl, !debug, ~vmware, ~!xen]");
        let flags = f.use_flags().unwrap();
        assert_eq!(flags["ssl"], Sense::Required);
        assert_eq!(flags["debug"], Sense::Disallowed);
        assert_eq!(flags["vmware"], Sense::Preferred);
        assert_eq!(flags["xen"], Sense::PreferNot);
        assert_eq!(f.architectures().count(), 0);
    }

    #[test]
    fn test_parse_without_brackets() {
        let f = flavor("ssl, !debug");
        assert_eq!(f.use_flags().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_multi_arch() {
        let f = flavor("[is: x86_64 x86]");
        assert_eq!(f.architectures().collect::<Vec<_>>(), vec!["x86", "x86_64"]);
        assert_eq!(f.to_string(), "[is: x86 x86_64]");
    }

    #[test]
    fn test_parse_arch_flags() {
        let f = flavor("[ssl, is: x86(i486, ~i686) x86_64]");
        let x86 = f.deps().flags(DependencyClass::InstructionSet, "x86").unwrap();
        assert_eq!(x86["i486"], Sense::Required);
        assert_eq!(x86["i686"], Sense::Preferred);
        assert!(f.deps().contains(DependencyClass::InstructionSet, "x86_64"));
        assert_eq!(f.to_string(), "[ssl, is: x86(i486,~i686) x86_64]");
    }

    #[test]
    fn test_parse_original_conary_example() {
        // From conaryopedia: [!dom0, ~!domU, ~vmware, ~!xen is: x86 x86_64]
        let f = flavor("[!dom0, ~!domU, ~vmware, ~!xen is: x86 x86_64]");
        assert_eq!(f.use_flags().unwrap().len(), 4);
        assert_eq!(f.architectures().count(), 2);
    }

    #[test]
    fn test_parse_errors() {
        assert!(Flavor::parse("[is: ]").is_err());
        assert!(Flavor::parse("[is: x86 )(]").is_err());
        assert!(Flavor::parse("[ssl, ~!]").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        let original = "[!debug, ssl, ~vmware, is: x86 x86_64(sse2)]";
        let f = flavor(original);
        assert_eq!(f.to_string(), original);
        assert_eq!(flavor(&f.to_string()), f);
    }

    #[test]
    fn test_canonical_order() {
        assert_eq!(flavor("[ssl, debug]"), flavor("[debug, ssl]"));
        assert_eq!(flavor("[ssl, debug]").to_string(), "[debug, ssl]");
    }

    #[test]
    fn test_from_deps_drops_non_flavor_classes() {
        let deps = DependencySet::new()
            .with(Dependency::trove("foo:runtime"))
            .with(Dependency::new(DependencyClass::InstructionSet, "x86_64"));
        let f = Flavor::from_deps(deps);
        assert_eq!(f, flavor("[is: x86_64]"));
    }

    // === Scoring tests ===

    #[test]
    fn test_score_required_present() {
        let system = flavor("[ssl, is: x86_64]");
        assert!(system.score(&flavor("[ssl, is: x86_64]")).unwrap() > 0);
    }

    #[test]
    fn test_score_required_vs_disallowed() {
        let system = flavor("[ssl]");
        assert_eq!(system.score(&flavor("[!ssl]")), None);
        assert_eq!(flavor("[!ssl]").score(&system), None);
        assert!(!system.is_compatible(&flavor("[!ssl]")));
    }

    #[test]
    fn test_score_preferences() {
        let with = flavor("[vmware]");
        let without = flavor("[!vmware]");
        let wants = flavor("[~vmware]");

        assert!(with.score(&wants).unwrap() > without.score(&wants).unwrap());
    }

    #[test]
    fn test_score_architecture() {
        let system = flavor("[is: x86_64]");
        // No flags on either side: the table alone never rejects
        assert_eq!(system.score(&flavor("[is: aarch64]")), Some(0));
        assert!(!system.arch_compatible(&flavor("[is: aarch64]")));
        assert_eq!(system.match_score(&flavor("[is: aarch64]")), None);
        assert!(system.satisfies(&flavor("[is: x86_64]")));
        assert!(!system.satisfies(&flavor("[is: aarch64]")));
        // Nothing declared about architecture: never incompatible
        assert!(flavor("[ssl]").satisfies(&flavor("[is: aarch64]")));
    }

    #[test]
    fn test_score_against_empty_flavor() {
        assert_eq!(flavor("[ssl, is: x86_64]").score(&Flavor::empty()), Some(0));
        assert!(Flavor::empty().satisfies(&flavor("[ssl, !debug]")));
    }

    // === Merge tests ===

    #[test]
    fn test_merge_modes() {
        let base = flavor("[ssl, ~xen]");
        let request = flavor("[!ssl, ~!xen]");

        assert!(matches!(
            base.merge(&request, MergeMode::Normal),
            Err(Error::FlavorConflict { .. })
        ));
        assert_eq!(base.merge(&request, MergeMode::Override).unwrap(), request);
        assert_eq!(
            base.merge(&request, MergeMode::DropConflicts).unwrap(),
            flavor("[~!xen]")
        );
    }

    #[test]
    fn test_to_strong() {
        assert_eq!(flavor("[~ssl, ~!xen]").to_strong(), flavor("[ssl, !xen]"));
    }

    // === Select best tests ===

    #[test]
    fn test_select_best() {
        let candidates = vec![
            (flavor("[ssl]"), "pkg-ssl"),
            (flavor("[!ssl]"), "pkg-no-ssl"),
            (flavor("[~ssl]"), "pkg-prefers-ssl"),
        ];

        // Required match beats preference
        assert_eq!(Flavor::select_best(&candidates, &flavor("[ssl]")), Some(&"pkg-ssl"));
        assert_eq!(Flavor::select_best(&candidates, &flavor("[!ssl]")), Some(&"pkg-no-ssl"));
    }

    #[test]
    fn test_select_best_no_match() {
        let candidates = vec![(flavor("[is: aarch64]"), "pkg-arm")];
        assert!(Flavor::select_best(&candidates, &flavor("[is: x86_64]")).is_none());
    }
}
