// tests/common/mod.rs

//! Shared fixtures for planner and solver integration tests.

#![allow(dead_code)]

use conary_planner::{Branch, Identity, Job, JobSet, LabelPath, MemoryDatabase, Trove};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

pub const MAIN: &str = "/conary.example.com@rpl:2";
pub const DEVEL: &str = "/conary.example.com@rpl:devel";

static TRACING: Once = Once::new();

/// Route planner logs to the test harness; filter with RUST_LOG
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Identity on the main branch, e.g. `ident("foo:lib", "1.0-1-1")`
pub fn ident(name: &str, rev: &str) -> Identity {
    Identity::parse(&format!("{}={}/{}", name, MAIN, rev)).unwrap()
}

/// Identity on the devel branch
pub fn devel(name: &str, rev: &str) -> Identity {
    Identity::parse(&format!("{}={}/{}", name, DEVEL, rev)).unwrap()
}

/// Identity on the main branch with a flavor, e.g. `flavored("foo", "1.0-1-1", "is: x86")`
pub fn flavored(name: &str, rev: &str, flavor: &str) -> Identity {
    Identity::parse(&format!("{}={}/{}[{}]", name, MAIN, rev, flavor)).unwrap()
}

pub fn main_branch() -> Branch {
    Branch::parse(MAIN).unwrap()
}

pub fn main_label_path() -> LabelPath {
    LabelPath::parse("conary.example.com@rpl:2").unwrap()
}

/// Install a package with components, all present
pub fn install_package(db: &mut MemoryDatabase, package: &Identity, components: &[&Identity]) {
    let mut trove = Trove::new(package.clone());
    for component in components {
        trove = trove.with_child((*component).clone(), true);
        db.install(Trove::new((*component).clone()));
    }
    db.install(trove);
}

pub fn sorted_jobs(jobs: &JobSet) -> Vec<Job> {
    jobs.iter().cloned().collect()
}
