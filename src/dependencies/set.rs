// src/dependencies/set.rs

//! Dependency sets and the sense algebra behind flavors
//!
//! A [`DependencySet`] maps class → dependency name → flag → [`Sense`]. The
//! same structure carries a trove's provides and requires as well as its
//! flavor; flavor semantics (scoring, merging) are defined here and wrapped
//! by [`crate::flavor::Flavor`].

use super::DependencyClass;
use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

/// Flags of one dependency, one sense per flag
pub type Flags = BTreeMap<String, Sense>;

/// How strongly a flag is asked for
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Sense {
    /// Not mentioned (`?` prefix when written out)
    #[default]
    Unspecified,
    /// Must be present (no prefix)
    Required,
    /// Soft preference for the flag (`~` prefix)
    Preferred,
    /// Soft preference against the flag (`~!` prefix)
    PreferNot,
    /// Must be absent (`!` prefix)
    Disallowed,
}

/// Compatibility table indexed by [provided][required] in
/// Unspecified, Required, Preferred, PreferNot, Disallowed order.
/// `None` marks an incompatible pair.
const SENSE_SCORES: [[Option<i32>; 5]; 5] = [
    [Some(0), Some(-1), Some(-1), Some(1), Some(0)],
    [Some(0), Some(2), Some(1), Some(-1), None],
    [Some(0), Some(1), Some(2), Some(-1), Some(-1)],
    [Some(0), Some(-1), Some(-1), Some(1), Some(1)],
    [Some(0), None, Some(-1), Some(1), Some(2)],
];

impl Sense {
    /// Get the string prefix for this sense
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Unspecified => "?",
            Self::Required => "",
            Self::Preferred => "~",
            Self::PreferNot => "~!",
            Self::Disallowed => "!",
        }
    }

    /// Parse a sense prefix and flag name from a string
    /// Returns (sense, remaining name)
    pub fn parse_with_name(s: &str) -> Result<(Self, &str)> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::ParseError("Empty flag".to_string()));
        }

        // Check longer prefixes first
        let (sense, rest) = if let Some(rest) = s.strip_prefix("~!") {
            (Self::PreferNot, rest)
        } else if let Some(rest) = s.strip_prefix('~') {
            (Self::Preferred, rest)
        } else if let Some(rest) = s.strip_prefix('!') {
            (Self::Disallowed, rest)
        } else if let Some(rest) = s.strip_prefix('?') {
            (Self::Unspecified, rest)
        } else {
            (Self::Required, s)
        };

        let name = rest.trim();
        if name.is_empty() {
            return Err(Error::ParseError(format!(
                "Missing flag name after '{}'",
                sense.prefix()
            )));
        }
        Ok((sense, name))
    }

    fn index(self) -> usize {
        match self {
            Self::Unspecified => 0,
            Self::Required => 1,
            Self::Preferred => 2,
            Self::PreferNot => 3,
            Self::Disallowed => 4,
        }
    }

    /// Score this (provided) sense against a required sense
    ///
    /// Returns None for required-vs-disallowed in either direction.
    pub fn score_against(self, required: Sense) -> Option<i32> {
        SENSE_SCORES[self.index()][required.index()]
    }

    pub fn is_strong(self) -> bool {
        matches!(self, Self::Required | Self::Disallowed)
    }

    /// Promote soft preferences to hard requirements
    pub fn to_strong(self) -> Self {
        match self {
            Self::Preferred => Self::Required,
            Self::PreferNot => Self::Disallowed,
            other => other,
        }
    }
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Self::Unspecified => "unspecified",
            Self::Required => "required",
            Self::Preferred => "preferred",
            Self::PreferNot => "prefer-not",
            Self::Disallowed => "disallowed",
        };
        write!(f, "{}", word)
    }
}

/// How two flag mappings for the same dependency are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MergeMode {
    /// Opposite hard senses are an error; otherwise the stronger sense wins
    Normal,
    /// The right-hand side always wins
    Override,
    /// The right-hand side wins, except disallowed beats prefer-not
    Prefs,
    /// Conflicting flags are removed
    DropConflicts,
}

/// Winner of two different senses in normal merging, None on a hard conflict
fn stronger(ours: Sense, theirs: Sense) -> Option<Sense> {
    match (ours, theirs) {
        (Sense::Unspecified, s) | (s, Sense::Unspecified) => Some(s),
        (a, b) if a.is_strong() && b.is_strong() => None,
        (a, _) if a.is_strong() => Some(a),
        (_, b) => Some(b),
    }
}

fn prefs_winner(ours: Sense, theirs: Sense) -> Sense {
    match (ours, theirs) {
        (Sense::Disallowed, Sense::PreferNot) | (Sense::PreferNot, Sense::Disallowed) => {
            Sense::Disallowed
        }
        (_, theirs) => theirs,
    }
}

/// Merge `other` into `target` for the dependency `name`
fn merge_flags(name: &str, target: &mut Flags, other: &Flags, mode: MergeMode) -> Result<()> {
    for (flag, &theirs) in other {
        let Some(&ours) = target.get(flag) else {
            target.insert(flag.clone(), theirs);
            continue;
        };
        if ours == theirs {
            continue;
        }

        let merged = match mode {
            MergeMode::Override => Some(theirs),
            MergeMode::Prefs => Some(prefs_winner(ours, theirs)),
            MergeMode::Normal => Some(stronger(ours, theirs).ok_or_else(|| {
                Error::FlavorConflict {
                    name: name.to_string(),
                    flag: flag.clone(),
                    first: ours,
                    second: theirs,
                }
            })?),
            MergeMode::DropConflicts => stronger(ours, theirs),
        };

        match merged {
            Some(sense) => {
                target.insert(flag.clone(), sense);
            }
            None => {
                target.remove(flag);
            }
        }
    }
    Ok(())
}

static DEPENDENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z0-9_-]*)\s*:\s*([^\s()]+)\s*(?:\(([^()]*)\))?\s*$")
        .expect("dependency pattern is valid")
});

/// A single dependency: class, name and flags
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dependency {
    pub class: DependencyClass,
    pub name: String,
    pub flags: Flags,
}

impl Dependency {
    pub fn new(class: DependencyClass, name: impl Into<String>) -> Self {
        Self {
            class,
            name: name.into(),
            flags: Flags::new(),
        }
    }

    /// A dependency on another trove by name
    pub fn trove(name: impl Into<String>) -> Self {
        Self::new(DependencyClass::Trove, name)
    }

    pub fn with_flag(mut self, flag: impl Into<String>, sense: Sense) -> Self {
        self.flags.insert(flag.into(), sense);
        self
    }

    /// Parse a dependency line like `soname: ELF64/libc.so.6(SysV x86_64)`
    pub fn parse(s: &str) -> Result<Self> {
        let caps = DEPENDENCY_RE
            .captures(s)
            .ok_or_else(|| Error::ParseError(format!("Malformed dependency: '{}'", s)))?;

        let class = DependencyClass::from_prefix(&caps[1]).ok_or_else(|| {
            Error::ParseError(format!("Unknown dependency class '{}' in '{}'", &caps[1], s))
        })?;

        let mut dep = Self::new(class, &caps[2]);
        if let Some(flags) = caps.get(3) {
            for token in flags
                .as_str()
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
            {
                let (sense, flag) = Sense::parse_with_name(token)?;
                dep.flags.insert(flag.to_string(), sense);
            }
        }
        Ok(dep)
    }
}

fn write_flags(f: &mut fmt::Formatter<'_>, flags: &Flags, separator: &str) -> fmt::Result {
    let rendered: Vec<String> = flags
        .iter()
        .map(|(flag, sense)| format!("{}{}", sense.prefix(), flag))
        .collect();
    write!(f, "({})", rendered.join(separator))
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class, self.name)?;
        if !self.flags.is_empty() {
            write_flags(f, &self.flags, " ")?;
        }
        Ok(())
    }
}

/// A set of dependencies keyed by class and name
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencySet {
    classes: BTreeMap<DependencyClass, BTreeMap<String, Flags>>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Number of (class, name) entries
    pub fn len(&self) -> usize {
        self.classes.values().map(|deps| deps.len()).sum()
    }

    /// Add a dependency; flags already present take the new sense
    pub fn add(&mut self, dep: Dependency) {
        let flags = self
            .classes
            .entry(dep.class)
            .or_default()
            .entry(dep.name)
            .or_default();
        flags.extend(dep.flags);
    }

    /// Builder form of [`DependencySet::add`]
    pub fn with(mut self, dep: Dependency) -> Self {
        self.add(dep);
        self
    }

    pub fn contains(&self, class: DependencyClass, name: &str) -> bool {
        self.flags(class, name).is_some()
    }

    pub fn flags(&self, class: DependencyClass, name: &str) -> Option<&Flags> {
        self.classes.get(&class).and_then(|deps| deps.get(name))
    }

    /// Names present in one class, in sorted order
    pub fn names(&self, class: DependencyClass) -> impl Iterator<Item = &str> {
        self.classes
            .get(&class)
            .into_iter()
            .flat_map(|deps| deps.keys().map(String::as_str))
    }

    pub fn classes(&self) -> impl Iterator<Item = DependencyClass> + '_ {
        self.classes.keys().copied()
    }

    /// Iterate over the dependencies as owned values
    pub fn iter(&self) -> impl Iterator<Item = Dependency> + '_ {
        self.classes.iter().flat_map(|(class, deps)| {
            deps.iter().map(move |(name, flags)| Dependency {
                class: *class,
                name: name.clone(),
                flags: flags.clone(),
            })
        })
    }

    /// Keep only the classes matching `keep`
    pub fn retain_classes(&mut self, mut keep: impl FnMut(DependencyClass) -> bool) {
        self.classes.retain(|class, _| keep(*class));
    }

    /// Score this (provided) set against a required set
    ///
    /// Returns None when a required flag meets an incompatible provided
    /// sense. Flags missing from this set count as unspecified, so scoring
    /// against a set that declares nothing never fails.
    pub fn score(&self, required: &DependencySet) -> Option<i32> {
        let mut total = 0;
        for (class, deps) in &required.classes {
            let provided = self.classes.get(class);
            for (name, required_flags) in deps {
                let provided_flags = provided.and_then(|p| p.get(name));
                for (flag, &required_sense) in required_flags {
                    let provided_sense = provided_flags
                        .and_then(|f| f.get(flag))
                        .copied()
                        .unwrap_or_default();
                    total += provided_sense.score_against(required_sense)?;
                }
            }
        }
        Some(total)
    }

    /// Whether every required name of a name-significant class is declared
    ///
    /// A class this set declares no names of accepts anything.
    pub fn names_compatible(&self, required: &DependencySet) -> bool {
        required
            .classes
            .iter()
            .filter(|(class, _)| class.name_significant())
            .all(|(class, deps)| match self.classes.get(class) {
                Some(provided) if !provided.is_empty() => {
                    deps.keys().all(|name| provided.contains_key(name))
                }
                _ => true,
            })
    }

    /// Merge `other` into this set
    pub fn union(&mut self, other: &DependencySet, mode: MergeMode) -> Result<()> {
        for (class, deps) in &other.classes {
            let ours = self.classes.entry(*class).or_default();
            for (name, flags) in deps {
                let target = ours.entry(name.clone()).or_default();
                merge_flags(name, target, flags, mode)?;
            }
        }
        Ok(())
    }

    /// Merged copy of two sets
    pub fn merge(&self, other: &DependencySet, mode: MergeMode) -> Result<DependencySet> {
        let mut merged = self.clone();
        merged.union(other, mode)?;
        Ok(merged)
    }

    /// Copy with every soft preference promoted to a hard requirement
    pub fn to_strong(&self) -> DependencySet {
        let mut strong = self.clone();
        for deps in strong.classes.values_mut() {
            for flags in deps.values_mut() {
                for sense in flags.values_mut() {
                    *sense = sense.to_strong();
                }
            }
        }
        strong
    }

    /// Whether this set, read as provides, satisfies a required dependency
    ///
    /// Required flags must be provided; disallowed flags must not be.
    pub fn satisfies(&self, required: &Dependency) -> bool {
        let Some(provided) = self.flags(required.class, &required.name) else {
            return false;
        };
        required.flags.iter().all(|(flag, sense)| {
            let has = provided.get(flag) == Some(&Sense::Required);
            match sense {
                Sense::Required => has,
                Sense::Disallowed => !has,
                _ => true,
            }
        })
    }

    /// Parse one dependency per line
    pub fn parse(s: &str) -> Result<Self> {
        let mut set = Self::new();
        for line in s.lines().map(str::trim).filter(|l| !l.is_empty()) {
            set.add(Dependency::parse(line)?);
        }
        Ok(set)
    }

    /// Write the flags of one dependency using a custom separator
    pub(crate) fn fmt_flags(f: &mut fmt::Formatter<'_>, flags: &Flags, separator: &str) -> fmt::Result {
        write_flags(f, flags, separator)
    }
}

impl fmt::Display for DependencySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, dep) in self.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", dep)?;
        }
        Ok(())
    }
}

impl From<Dependency> for DependencySet {
    fn from(dep: Dependency) -> Self {
        Self::new().with(dep)
    }
}

impl FromIterator<Dependency> for DependencySet {
    fn from_iter<I: IntoIterator<Item = Dependency>>(iter: I) -> Self {
        let mut set = Self::new();
        for dep in iter {
            set.add(dep);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Sense; 5] = [
        Sense::Unspecified,
        Sense::Required,
        Sense::Preferred,
        Sense::PreferNot,
        Sense::Disallowed,
    ];

    fn use_flags(flags: &[(&str, Sense)]) -> DependencySet {
        let mut dep = Dependency::new(DependencyClass::Use, "use");
        for (flag, sense) in flags {
            dep = dep.with_flag(*flag, *sense);
        }
        DependencySet::from(dep)
    }

    #[test]
    fn test_sense_parse_with_name() {
        assert_eq!(Sense::parse_with_name("ssl").unwrap(), (Sense::Required, "ssl"));
        assert_eq!(Sense::parse_with_name("!debug").unwrap(), (Sense::Disallowed, "debug"));
        assert_eq!(Sense::parse_with_name("~vmware").unwrap(), (Sense::Preferred, "vmware"));
        assert_eq!(Sense::parse_with_name("  ~! xen ").unwrap(), (Sense::PreferNot, "xen"));
        assert_eq!(Sense::parse_with_name("?x").unwrap(), (Sense::Unspecified, "x"));
        assert!(Sense::parse_with_name("").is_err());
        assert!(Sense::parse_with_name("~!").is_err());
    }

    #[test]
    fn test_only_hard_opposites_are_incompatible() {
        for provided in ALL {
            for required in ALL {
                let incompatible = matches!(
                    (provided, required),
                    (Sense::Required, Sense::Disallowed) | (Sense::Disallowed, Sense::Required)
                );
                assert_eq!(
                    provided.score_against(required).is_none(),
                    incompatible,
                    "{} vs {}",
                    provided,
                    required
                );
            }
        }
    }

    #[test]
    fn test_unspecified_provider_never_incompatible() {
        for required in ALL {
            assert!(Sense::Unspecified.score_against(required).is_some());
        }
    }

    #[test]
    fn test_score_sums_flags() {
        let provided = use_flags(&[("ssl", Sense::Required), ("debug", Sense::Disallowed)]);
        let required = use_flags(&[("ssl", Sense::Required), ("debug", Sense::PreferNot)]);
        assert_eq!(provided.score(&required), Some(3));

        let conflicting = use_flags(&[("ssl", Sense::Disallowed)]);
        assert_eq!(provided.score(&conflicting), None);
        assert_eq!(conflicting.score(&provided), None);
    }

    #[test]
    fn test_score_against_empty_never_fails() {
        let empty = DependencySet::new();
        let required = use_flags(&[("ssl", Sense::Required), ("debug", Sense::Disallowed)]);
        assert!(empty.score(&required).is_some());
        assert_eq!(required.score(&empty), Some(0));
    }

    #[test]
    fn test_instruction_set_name_is_significant() {
        let x86 = DependencySet::from(Dependency::new(DependencyClass::InstructionSet, "x86"));
        let x86_64 = DependencySet::from(Dependency::new(DependencyClass::InstructionSet, "x86_64"));

        // Names alone carry no flags to score
        assert_eq!(x86.score(&x86_64), Some(0));
        assert!(!x86.names_compatible(&x86_64));
        assert!(x86_64.names_compatible(&x86_64));
        assert!(DependencySet::new().names_compatible(&x86_64));
    }

    #[test]
    fn test_use_names_are_not_significant() {
        let a = DependencySet::from(Dependency::new(DependencyClass::Use, "a"));
        let b = DependencySet::from(Dependency::new(DependencyClass::Use, "b"));
        assert!(a.names_compatible(&b));
    }

    #[test]
    fn test_merge_normal() {
        let a = use_flags(&[("ssl", Sense::Preferred)]);
        let b = use_flags(&[("ssl", Sense::Required), ("gtk", Sense::PreferNot)]);
        let merged = a.merge(&b, MergeMode::Normal).unwrap();
        let flags = merged.flags(DependencyClass::Use, "use").unwrap();
        assert_eq!(flags["ssl"], Sense::Required);
        assert_eq!(flags["gtk"], Sense::PreferNot);

        let c = use_flags(&[("ssl", Sense::Disallowed)]);
        match b.merge(&c, MergeMode::Normal) {
            Err(Error::FlavorConflict { flag, first, second, .. }) => {
                assert_eq!(flag, "ssl");
                assert_eq!(first, Sense::Required);
                assert_eq!(second, Sense::Disallowed);
            }
            other => panic!("expected flavor conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_override_and_drop() {
        let a = use_flags(&[("ssl", Sense::Required), ("gtk", Sense::Required)]);
        let b = use_flags(&[("ssl", Sense::Disallowed)]);

        let overridden = a.merge(&b, MergeMode::Override).unwrap();
        assert_eq!(overridden.flags(DependencyClass::Use, "use").unwrap()["ssl"], Sense::Disallowed);

        let dropped = a.merge(&b, MergeMode::DropConflicts).unwrap();
        let flags = dropped.flags(DependencyClass::Use, "use").unwrap();
        assert!(!flags.contains_key("ssl"));
        assert_eq!(flags["gtk"], Sense::Required);
    }

    #[test]
    fn test_merge_prefs() {
        let disallowed = use_flags(&[("xen", Sense::Disallowed)]);
        let prefer_not = use_flags(&[("xen", Sense::PreferNot)]);
        let preferred = use_flags(&[("xen", Sense::Preferred)]);

        for merged in [
            disallowed.merge(&prefer_not, MergeMode::Prefs).unwrap(),
            prefer_not.merge(&disallowed, MergeMode::Prefs).unwrap(),
        ] {
            assert_eq!(merged.flags(DependencyClass::Use, "use").unwrap()["xen"], Sense::Disallowed);
        }

        let merged = disallowed.merge(&preferred, MergeMode::Prefs).unwrap();
        assert_eq!(merged.flags(DependencyClass::Use, "use").unwrap()["xen"], Sense::Preferred);
    }

    #[test]
    fn test_to_strong() {
        let soft = use_flags(&[("ssl", Sense::Preferred), ("xen", Sense::PreferNot)]);
        let strong = soft.to_strong();
        let flags = strong.flags(DependencyClass::Use, "use").unwrap();
        assert_eq!(flags["ssl"], Sense::Required);
        assert_eq!(flags["xen"], Sense::Disallowed);
    }

    #[test]
    fn test_dependency_parse_and_display() {
        let dep = Dependency::parse("soname: ELF64/libc.so.6(SysV x86_64)").unwrap();
        assert_eq!(dep.class, DependencyClass::Soname);
        assert_eq!(dep.name, "ELF64/libc.so.6");
        assert_eq!(dep.flags.len(), 2);
        assert_eq!(dep.to_string(), "soname: ELF64/libc.so.6(SysV x86_64)");

        let trove = Dependency::parse("trove: bar:lib").unwrap();
        assert_eq!(trove, Dependency::trove("bar:lib"));
        assert_eq!(trove.to_string(), "trove: bar:lib");

        assert!(Dependency::parse("nonsense").is_err());
        assert!(Dependency::parse("bogus: name").is_err());
    }

    #[test]
    fn test_dependency_set_parse() {
        let set = DependencySet::parse("trove: bar:lib\n\nsoname: ELF64/libz.so.1(SysV)\n").unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains(DependencyClass::Trove, "bar:lib"));
        assert_eq!(DependencySet::parse(&set.to_string()).unwrap(), set);
    }

    #[test]
    fn test_satisfies() {
        let provides = DependencySet::new()
            .with(Dependency::new(DependencyClass::Soname, "ELF64/libc.so.6").with_flag("SysV", Sense::Required));

        assert!(provides.satisfies(&Dependency::new(DependencyClass::Soname, "ELF64/libc.so.6")));
        assert!(provides.satisfies(
            &Dependency::new(DependencyClass::Soname, "ELF64/libc.so.6").with_flag("SysV", Sense::Required)
        ));
        assert!(!provides.satisfies(
            &Dependency::new(DependencyClass::Soname, "ELF64/libc.so.6").with_flag("GLIBC_2.38", Sense::Required)
        ));
        assert!(!provides.satisfies(&Dependency::trove("bar:lib")));
    }
}
