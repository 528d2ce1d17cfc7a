// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Invariant tests for resolution and lock-file behavior
//!
//! These verify the load-bearing properties:
//! 1. Wanted-set computation is exactly reachability from the seeds,
//!    for acyclic and cyclic graphs alike
//! 2. Lock diff classification matches set semantics over the union
//!    of port names
//! 3. The generated gitignore region never eats user content

use portyard::ignore::update_gitignore;
use portyard::lockfile::{LockChange, LockFile};
use portyard::project::{resource_id, Project, ProjectBuilder};
use portyard::tracker::Tracker;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Materialize a project with directory-backed resources described as
/// `(name, deps)`.
fn make_project(root: &TempDir, name: &str, resources: &[(String, Vec<String>)]) -> Project {
    let dir = root.path().join(name);
    fs::create_dir_all(&dir).unwrap();
    let mut builder = ProjectBuilder::new(&dir, name != "app").unwrap();
    for (res_name, deps) in resources {
        fs::create_dir_all(dir.join(res_name)).unwrap();
        let mut rb = builder.resource(res_name);
        for dep in deps {
            rb.dependency(dep).unwrap();
        }
        let resource = rb.build().unwrap();
        builder.add_resource(resource).unwrap();
    }
    builder.build()
}

/// Reference reachability: plain BFS over the id graph.
fn reachable(
    edges: &BTreeMap<String, Vec<String>>,
    seeds: &[String],
) -> BTreeSet<String> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut queue: VecDeque<String> = seeds.iter().cloned().collect();
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Some(deps) = edges.get(&id) {
            for dep in deps {
                queue.push_back(dep.clone());
            }
        }
    }
    seen
}

// =============================================================================
// Wanted-Set Reachability
// =============================================================================

/// Strategy: up to 8 resources spread over the root project and two
/// ports, with arbitrary (possibly cyclic) dependency edges.
fn graph_strategy() -> impl Strategy<Value = Vec<(usize, Vec<usize>)>> {
    // Per resource index: its dependency targets. Sets, because a
    // resource may not declare the same dependency twice.
    prop::collection::vec(prop::collection::btree_set(0..8usize, 0..4), 1..8)
        .prop_map(|deps| {
            deps.into_iter()
                .map(|set| set.into_iter().collect())
                .enumerate()
                .collect()
        })
}

fn owner_of(index: usize) -> &'static str {
    match index % 3 {
        0 => "app",
        1 => "lib-a",
        _ => "lib-b",
    }
}

fn id_of(index: usize) -> String {
    resource_id(owner_of(index), &format!("r{index}"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_wanted_set_is_reachability_from_seeds(graph in graph_strategy()) {
        let tmp = TempDir::new().unwrap();

        // Group resources by owning project
        let mut per_project: BTreeMap<&str, Vec<(String, Vec<String>)>> = BTreeMap::new();
        let mut edges: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (index, deps) in &graph {
            let deps: Vec<String> = deps
                .iter()
                .filter(|d| **d < graph.len())
                .map(|d| id_of(*d))
                .collect();
            edges.insert(id_of(*index), deps.clone());
            per_project
                .entry(owner_of(*index))
                .or_default()
                .push((format!("r{index}"), deps));
        }

        let mut tracker = Tracker::new(&tmp.path().join("ports"));
        let mut seeds: Vec<String> = Vec::new();
        for (name, resources) in &per_project {
            let project = make_project(&tmp, name, resources);
            if *name == "app" {
                seeds = project.exported_ids();
            }
            tracker.add_project(project);
        }
        // Graphs without an "app" resource have an empty wanted set
        if per_project.contains_key("app") {
            let wanted = tracker.wanted("app");
            let expected = reachable(&edges, &seeds);
            let actual: BTreeSet<String> =
                wanted.ids().map(str::to_string).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}

#[test]
fn test_cycle_closure_is_exact() {
    let tmp = TempDir::new().unwrap();
    // app!r0 -> lib!x -> lib!y -> lib!x (cycle), lib!z unreachable
    let app = make_project(
        &tmp,
        "app",
        &[("r0".to_string(), vec!["lib!x".to_string()])],
    );
    let lib = make_project(
        &tmp,
        "lib",
        &[
            ("x".to_string(), vec!["lib!y".to_string()]),
            ("y".to_string(), vec!["lib!x".to_string()]),
            ("z".to_string(), vec![]),
        ],
    );

    let mut tracker = Tracker::new(&tmp.path().join("ports"));
    tracker.add_project(app);
    tracker.add_project(lib);

    let wanted = tracker.wanted("app");
    let ids: Vec<&str> = wanted.ids().collect();
    assert_eq!(ids, vec!["app!r0", "lib!x", "lib!y"]);
    assert!(tracker.missing_dependencies(&wanted).is_empty());
}

// =============================================================================
// Lock Diff Semantics
// =============================================================================

fn lock_of(entries: &BTreeMap<String, String>) -> LockFile {
    LockFile {
        generated_at: None,
        ports: entries.clone(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_lock_diff_matches_set_semantics(
        older in prop::collection::btree_map("[a-d]{1,2}", "[0-9]{1,2}", 0..6),
        newer in prop::collection::btree_map("[a-d]{1,2}", "[0-9]{1,2}", 0..6),
    ) {
        let mut added = 0usize;
        let mut removed = 0usize;
        let mut changed = 0usize;
        let mismatch = LockFile::compare(&lock_of(&older), &lock_of(&newer), |_, change| {
            match change {
                LockChange::Added { .. } => added += 1,
                LockChange::Removed { .. } => removed += 1,
                LockChange::Changed { .. } => changed += 1,
            }
        });

        let older_keys: BTreeSet<_> = older.keys().collect();
        let newer_keys: BTreeSet<_> = newer.keys().collect();
        prop_assert_eq!(added, newer_keys.difference(&older_keys).count());
        prop_assert_eq!(removed, older_keys.difference(&newer_keys).count());
        let expect_changed = older_keys
            .intersection(&newer_keys)
            .filter(|k| older[**k] != newer[**k])
            .count();
        prop_assert_eq!(changed, expect_changed);
        prop_assert_eq!(mismatch, added + removed + changed > 0);
    }
}

// =============================================================================
// Gitignore Region
// =============================================================================

#[test]
fn test_gitignore_region_survives_repeated_regeneration() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join(".gitignore");
    fs::write(&path, "target/\n").unwrap();

    for round in 0..3 {
        let links = vec![format!("link{round}")];
        update_gitignore(tmp.path(), &links).unwrap();
    }

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("target/\n"));
    // Only the latest link survives, with exactly one marker pair
    assert!(text.contains("/link2"));
    assert!(!text.contains("/link0"));
    assert_eq!(text.matches("portyard generated").count(), 2);
}
