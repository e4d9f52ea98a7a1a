// src/dependencies/classes.rs

//! Dependency class definitions
//!
//! Every dependency and every flavor flag lives in a class. Two classes carry
//! flavor information: instruction sets (`is`) and use flags (`use`). The rest
//! describe what troves provide and require.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter, EnumString};

/// Dependency classes, in display order
///
/// The textual form of a dependency is `class: name(flags)`, for example
/// `soname: ELF64/libc.so.6(SysV x86_64)` or `trove: bar:lib`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumIter,
    EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum DependencyClass {
    /// Instruction set architecture, e.g. `x86_64(sse2)`
    #[strum(serialize = "is")]
    InstructionSet,

    /// Build-time use flags; the flags are stored under the name `use`
    #[strum(serialize = "use")]
    Use,

    /// Another trove by name, e.g. `trove: bar:lib`
    #[strum(serialize = "trove")]
    Trove,

    /// Shared library, e.g. `soname: ELF64/libssl.so.3(SysV x86_64)`
    #[strum(serialize = "soname")]
    Soname,

    /// A specific file must exist
    #[strum(serialize = "file")]
    File,

    /// ABI compatibility tag
    #[strum(serialize = "abi")]
    Abi,

    /// ELF interpreter
    #[strum(serialize = "interpreter")]
    Interpreter,

    #[strum(serialize = "python")]
    Python,

    #[strum(serialize = "perl")]
    Perl,

    #[strum(serialize = "ruby")]
    Ruby,

    #[strum(serialize = "java")]
    Java,

    /// .NET/Mono assembly
    #[strum(serialize = "cil")]
    Cil,

    #[strum(serialize = "pkgconfig")]
    PkgConfig,

    #[strum(serialize = "cmake")]
    CMake,

    /// Executable on PATH
    #[strum(serialize = "binary")]
    Binary,

    #[strum(serialize = "kmod")]
    KernelModule,
}

impl DependencyClass {
    /// Get the string prefix for this dependency class
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::InstructionSet => "is",
            Self::Use => "use",
            Self::Trove => "trove",
            Self::Soname => "soname",
            Self::File => "file",
            Self::Abi => "abi",
            Self::Interpreter => "interpreter",
            Self::Python => "python",
            Self::Perl => "perl",
            Self::Ruby => "ruby",
            Self::Java => "java",
            Self::Cil => "cil",
            Self::PkgConfig => "pkgconfig",
            Self::CMake => "cmake",
            Self::Binary => "binary",
            Self::KernelModule => "kmod",
        }
    }

    /// Parse a dependency class from its prefix
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        prefix.trim().parse().ok()
    }

    /// Return all dependency classes
    pub fn all() -> Vec<DependencyClass> {
        Self::iter().collect()
    }

    /// Does this class carry flavor information?
    pub fn is_flavor(&self) -> bool {
        matches!(self, Self::InstructionSet | Self::Use)
    }

    /// Whether a missing name makes a flavor incompatible
    ///
    /// An x86_64 trove cannot run on a system that only declares x86, but a
    /// use flag is just a flag under the fixed name `use`.
    pub fn name_significant(&self) -> bool {
        !matches!(self, Self::Use)
    }

    /// Get a human-readable description of this dependency class
    pub fn description(&self) -> &'static str {
        match self {
            Self::InstructionSet => "Instruction set",
            Self::Use => "Use flags",
            Self::Trove => "Trove",
            Self::Soname => "Shared library (soname)",
            Self::File => "File path",
            Self::Abi => "ABI compatibility",
            Self::Interpreter => "ELF interpreter",
            Self::Python => "Python module",
            Self::Perl => "Perl module",
            Self::Ruby => "Ruby gem",
            Self::Java => "Java package",
            Self::Cil => ".NET/Mono assembly",
            Self::PkgConfig => "pkg-config module",
            Self::CMake => "CMake package",
            Self::Binary => "Executable binary",
            Self::KernelModule => "Kernel module",
        }
    }
}

impl fmt::Display for DependencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}
