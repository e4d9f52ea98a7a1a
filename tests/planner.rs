// tests/planner.rs

//! Job planning scenarios against in-memory repositories and databases.

mod common;

use common::{devel, flavored, ident, init_tracing, install_package, main_branch, sorted_jobs};
use conary_planner::{
    Error, Job, JobPlanner, JobSide, MemoryDatabase, MemoryRepository, PlanOverrides, PlannerConfig,
    RedirectTarget, Trove,
};
use std::collections::BTreeSet;

fn planner<'a>(repo: &'a MemoryRepository, db: &'a MemoryDatabase) -> JobPlanner<'a> {
    JobPlanner::new(repo, db, PlannerConfig::default())
}

/// A component that was only referenced becomes by-default in the new version
#[test]
fn test_update_installs_newly_default_component() {
    init_tracing();
    let foo1 = ident("foo", "1.0-1-1");
    let foo2 = ident("foo", "2.0-1-1");
    let runtime1 = ident("foo:runtime", "1.0-1-1");
    let runtime2 = ident("foo:runtime", "2.0-1-1");

    let mut db = MemoryDatabase::new();
    db.install(Trove::new(foo1.clone()).with_child(runtime1, false));
    let repo = MemoryRepository::new()
        .with(Trove::new(foo2.clone()).with_child(runtime2.clone(), true))
        .with(Trove::new(runtime2.clone()));

    let plan = planner(&repo, &db)
        .plan(&[Job::install(&foo2, true)], &PlanOverrides::default())
        .unwrap();

    assert_eq!(
        sorted_jobs(&plan.jobs),
        vec![Job::update(&foo1, &foo2), Job::install(&runtime2, false)]
    );
}

#[test]
fn test_relative_update_leaves_other_versions_alone() {
    init_tracing();
    let foo1 = ident("foo", "1.0-1-1");
    let foo2 = ident("foo", "2.0-1-1");

    let mut db = MemoryDatabase::new();
    db.install(Trove::new(foo1.clone()).with_paths(["/usr/bin/foo"]));
    let repo = MemoryRepository::new().with(Trove::new(foo2.clone()).with_paths(["/usr/share/foo-2"]));

    // A non-absolute request without an old side is a plain install
    let plan = planner(&repo, &db)
        .plan(&[Job::install(&foo2, false)], &PlanOverrides::default())
        .unwrap();
    assert_eq!(sorted_jobs(&plan.jobs), vec![Job::install(&foo2, false)]);

    // Naming the old side turns it into an update
    let plan = planner(&repo, &db)
        .plan(
            &[Job::new("foo", Some(JobSide::from(&foo1)), Some(JobSide::from(&foo2)), false).unwrap()],
            &PlanOverrides::default(),
        )
        .unwrap();
    assert_eq!(sorted_jobs(&plan.jobs), vec![Job::update(&foo1, &foo2)]);
}

#[test]
fn test_upstream_branch_change_is_followed() {
    init_tracing();
    let group1 = ident("group-base", "1.0-1-1");
    let group2 = ident("group-base", "2.0-1-1");
    let lib1 = ident("lib", "1.0-1-1");
    let lib2 = devel("lib", "2.0-1-1");

    let mut db = MemoryDatabase::new();
    db.install(Trove::new(group1.clone()).with_child(lib1.clone(), true));
    db.install(Trove::new(lib1.clone()));
    let repo = MemoryRepository::new()
        .with(Trove::new(group2.clone()).with_child(lib2.clone(), true))
        .with(Trove::new(lib2.clone()));

    let plan = planner(&repo, &db)
        .plan(&[Job::install(&group2, true)], &PlanOverrides::default())
        .unwrap();

    assert!(plan.jobs.contains(&Job::update(&group1, &group2)));
    assert!(plan.jobs.contains(&Job::update(&lib1, &lib2)));
}

#[test]
fn test_unrelated_branch_is_not_switched() {
    init_tracing();
    let group = ident("group-dev", "1.0-1-1");
    let lib_devel = devel("lib", "1.0-1-1");
    let lib_main = ident("lib", "2.0-1-1");

    // lib was installed on its own from the devel branch
    let mut db = MemoryDatabase::new();
    db.install(Trove::new(lib_devel.clone()));
    let repo = MemoryRepository::new()
        .with(Trove::new(group.clone()).with_child(lib_main.clone(), true))
        .with(Trove::new(lib_main));

    let plan = planner(&repo, &db)
        .plan(&[Job::install(&group, true)], &PlanOverrides::default())
        .unwrap();

    assert_eq!(sorted_jobs(&plan.jobs), vec![Job::install(&group, false)]);
    assert!(plan.kept.contains(&lib_devel));
}

#[test]
fn test_local_branch_switch_is_reverted_by_update() {
    init_tracing();
    let foo1 = ident("foo", "1.0-1-1");
    let foo2 = ident("foo", "2.0-1-1");
    let lib1 = ident("foo:lib", "1.0-1-1");
    let lib_local = devel("foo:lib", "1.1-1-1");
    let lib2 = ident("foo:lib", "2.0-1-1");

    let mut db = MemoryDatabase::new();
    db.install(Trove::new(foo1.clone()).with_child(lib1.clone(), true));
    db.install(Trove::new(lib_local.clone()));
    db.record_local_update(&lib1, &lib_local);
    let repo = MemoryRepository::new()
        .with(Trove::new(foo2.clone()).with_child(lib2.clone(), true))
        .with(Trove::new(lib2.clone()));

    let plan = planner(&repo, &db)
        .plan(&[Job::install(&foo2, true)], &PlanOverrides::default())
        .unwrap();

    assert!(plan.jobs.contains(&Job::update(&foo1, &foo2)));
    assert!(plan.jobs.contains(&Job::update(&lib_local, &lib2)));
}

#[test]
fn test_flavor_affinity_can_be_disabled() {
    init_tracing();
    let foo1 = ident("foo", "1.0-1-1");
    let foo2 = ident("foo", "2.0-1-1");
    let lib1 = flavored("foo:lib", "1.0-1-1", "is: x86");
    let lib2 = flavored("foo:lib", "2.0-1-1", "is: x86_64");

    let mut db = MemoryDatabase::new();
    db.install(Trove::new(foo1.clone()).with_child(lib1.clone(), true));
    db.install(Trove::new(lib1.clone()));
    let repo = MemoryRepository::new()
        .with(Trove::new(foo2.clone()).with_child(lib2.clone(), true))
        .with(Trove::new(lib2.clone()));

    let config = PlannerConfig {
        respect_flavor_affinity: false,
        ..PlannerConfig::default()
    };
    let plan = JobPlanner::new(&repo, &db, config)
        .plan(&[Job::install(&foo2, true)], &PlanOverrides::default())
        .unwrap();

    assert!(plan.jobs.contains(&Job::update(&lib1, &lib2)));
}

#[test]
fn test_pinned_primary_with_overlapping_files() {
    init_tracing();
    let k1 = ident("kernel", "6.1-1-1");
    let k2 = ident("kernel", "6.2-1-1");

    let mut db = MemoryDatabase::new();
    db.install(Trove::new(k1.clone()).with_paths(["/boot/vmlinuz"]));
    db.pin(&k1);
    let repo = MemoryRepository::new().with(Trove::new(k2.clone()).with_paths(["/boot/vmlinuz"]));

    let result = planner(&repo, &db).plan(&[Job::install(&k2, true)], &PlanOverrides::default());
    match result {
        Err(Error::PinnedTrove { old, new }) => {
            assert_eq!(old, k1);
            assert_eq!(new, Some(k2.clone()));
        }
        other => panic!("expected a pinned trove error, got {:?}", other),
    }

    let config = PlannerConfig {
        check_primary_pins: false,
        ..PlannerConfig::default()
    };
    let plan = JobPlanner::new(&repo, &db, config)
        .plan(&[Job::install(&k2, true)], &PlanOverrides::default())
        .unwrap();
    assert_eq!(sorted_jobs(&plan.jobs), vec![Job::update(&k1, &k2)]);
}

#[test]
fn test_erasing_pinned_trove() {
    init_tracing();
    let bar = ident("bar", "1.0-1-1");
    let mut db = MemoryDatabase::new();
    db.install(Trove::new(bar.clone()));
    db.pin(&bar);

    let result = planner(&MemoryRepository::new(), &db).plan(&[Job::erase(&bar)], &PlanOverrides::default());
    assert!(matches!(result, Err(Error::PinnedTrove { new: None, .. })));
}

#[test]
fn test_side_by_side_path_conflict() {
    init_tracing();
    let k1 = ident("kernel", "6.1-1-1");
    let k2 = ident("kernel", "6.2-1-1");

    let mut db = MemoryDatabase::new();
    db.install(Trove::new(k1.clone()).with_paths(["/boot/vmlinuz", "/boot/config-6.1"]));
    let repo = MemoryRepository::new().with(Trove::new(k2.clone()).with_paths(["/boot/vmlinuz", "/boot/config-6.2"]));

    let overrides = PlanOverrides {
        keep: BTreeSet::from([k1.clone()]),
        ..PlanOverrides::default()
    };
    let result = planner(&repo, &db).plan(&[Job::install(&k2, true)], &overrides);
    match result {
        Err(Error::PathConflicts(conflicts)) => {
            assert_eq!(conflicts.len(), 1);
            assert!(conflicts.contains_key("kernel"));
        }
        other => panic!("expected path conflicts, got {:?}", other),
    }
}

#[test]
fn test_redirect_loop_is_reported() {
    init_tracing();
    let a = ident("a", "1.0-1-1");
    let b = ident("b", "1.0-1-1");
    let target = |name: &str| RedirectTarget {
        name: name.to_string(),
        branch: main_branch(),
        flavor: None,
    };
    let repo = MemoryRepository::new()
        .with(Trove::redirect(a.clone(), vec![target("b")]))
        .with(Trove::redirect(b, vec![target("a")]));

    let result = planner(&repo, &MemoryDatabase::new()).plan(&[Job::install(&a, true)], &PlanOverrides::default());
    match result {
        Err(Error::RedirectLoop { chain }) => {
            assert_eq!(chain.first(), Some(&a));
            assert_eq!(chain.last(), Some(&a));
        }
        other => panic!("expected a redirect loop, got {:?}", other),
    }
}

#[test]
fn test_shared_component_survives_container_erase() {
    init_tracing();
    let foo = ident("foo", "1.0-1-1");
    let group = ident("group-base", "1.0-1-1");
    let shared = ident("shared", "1.0-1-1");

    let mut db = MemoryDatabase::new();
    install_package(&mut db, &foo, &[&shared]);
    db.install(Trove::new(group.clone()).with_child(shared.clone(), true));

    let plan = planner(&MemoryRepository::new(), &db)
        .plan(&[Job::erase(&foo)], &PlanOverrides::default())
        .unwrap();

    assert_eq!(sorted_jobs(&plan.jobs), vec![Job::erase(&foo)]);
}

#[test]
fn test_recurse_disabled_touches_only_primaries() {
    init_tracing();
    let foo1 = ident("foo", "1.0-1-1");
    let foo2 = ident("foo", "2.0-1-1");
    let lib1 = ident("foo:lib", "1.0-1-1");
    let lib2 = ident("foo:lib", "2.0-1-1");

    let mut db = MemoryDatabase::new();
    install_package(&mut db, &foo1, &[&lib1]);
    let repo = MemoryRepository::new()
        .with(Trove::new(foo2.clone()).with_child(lib2.clone(), true))
        .with(Trove::new(lib2));

    let config = PlannerConfig {
        recurse: false,
        ..PlannerConfig::default()
    };
    let plan = JobPlanner::new(&repo, &db, config)
        .plan(&[Job::install(&foo2, true)], &PlanOverrides::default())
        .unwrap();

    assert_eq!(sorted_jobs(&plan.jobs), vec![Job::update(&foo1, &foo2)]);
}

/// A by-default child that was never installed is added on request
#[test]
fn test_missing_reference_installed_when_requested() {
    init_tracing();
    let foo = ident("foo", "1.0-1-1");
    let runtime = ident("foo:runtime", "1.0-1-1");

    let mut db = MemoryDatabase::new();
    db.install(Trove::new(foo.clone()).with_child(runtime.clone(), true));
    let repo = MemoryRepository::new()
        .with(Trove::new(foo.clone()).with_child(runtime.clone(), true))
        .with(Trove::new(runtime.clone()));

    // Left out by default
    let plan = planner(&repo, &db)
        .plan(&[Job::install(&foo, true)], &PlanOverrides::default())
        .unwrap();
    assert!(plan.jobs.is_empty());

    let config = PlannerConfig {
        install_missing_refs: true,
        ..PlannerConfig::default()
    };
    let plan = JobPlanner::new(&repo, &db, config)
        .plan(&[Job::install(&foo, true)], &PlanOverrides::default())
        .unwrap();
    assert_eq!(sorted_jobs(&plan.jobs), vec![Job::install(&runtime, false)]);
}

/// Children of a freshly installed trove come along even if referenced elsewhere
#[test]
fn test_fresh_parent_installs_referenced_child() {
    init_tracing();
    let group = ident("group-base", "1.0-1-1");
    let foo = ident("foo", "1.0-1-1");
    let runtime = ident("foo:runtime", "1.0-1-1");

    let mut db = MemoryDatabase::new();
    db.install(
        Trove::new(group.clone())
            .with_child(foo.clone(), false)
            .with_weak_child(runtime.clone(), false),
    );
    let repo = MemoryRepository::new()
        .with(Trove::new(foo.clone()).with_child(runtime.clone(), true))
        .with(Trove::new(runtime.clone()));

    let plan = planner(&repo, &db)
        .plan(&[Job::install(&foo, true)], &PlanOverrides::default())
        .unwrap();

    assert_eq!(
        sorted_jobs(&plan.jobs),
        vec![Job::install(&foo, false), Job::install(&runtime, false)]
    );
}

#[test]
fn test_unavailable_primary_is_not_found() {
    init_tracing();
    let foo = ident("foo", "1.0-1-1");
    let result = planner(&MemoryRepository::new(), &MemoryDatabase::new())
        .plan(&[Job::install(&foo, true)], &PlanOverrides::default());
    assert!(matches!(result, Err(Error::NotFound(_))));
}
