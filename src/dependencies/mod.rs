// src/dependencies/mod.rs

//! Typed dependencies and dependency sets
//!
//! Dependencies follow the Conary class system. Each dependency has a class,
//! a name and a set of flags, each flag carrying a [`Sense`]:
//!
//! - `trove: bar:lib` - requires the trove `bar:lib`
//! - `soname: ELF64/libssl.so.3(SysV x86_64)` - shared library with flags
//! - `is: x86_64(sse2 ~i686)` - instruction set, as used in flavors
//!
//! # Example
//!
//! ```ignore
//! use conary_planner::dependencies::{Dependency, DependencyClass, DependencySet};
//!
//! let provides = DependencySet::parse("trove: bar:lib").unwrap();
//! assert!(provides.satisfies(&Dependency::trove("bar:lib")));
//! ```

mod classes;
mod set;

pub use classes::DependencyClass;
pub use set::{Dependency, DependencySet, Flags, MergeMode, Sense};
