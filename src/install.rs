// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Install engine: the resolve/clone/re-resolve fixpoint
//!
//! Every pass rebuilds the whole graph from manifests with a fresh
//! [`Tracker`]; newly cloned ports may declare further ports, so the
//! wanted and missing sets are recomputed against the full graph
//! rather than patched incrementally. The loop terminates when a pass
//! produces no missing port: each pass either clones at least one port
//! (whose directory then exists for every later pass) or converges.

use crate::error::UserError;
use crate::gitio;
use crate::ignore;
use crate::linker;
use crate::lockfile::LockFile;
use crate::manifest;
use crate::project::{Project, PORTS_DIR};
use crate::tracker::Tracker;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What one install invocation did
#[derive(Debug, Default)]
pub struct InstallReport {
    /// Resolution passes executed
    pub passes: usize,
    /// Ports cloned, in discovery order
    pub cloned: Vec<String>,
    /// Resource ids whose prepare scripts ran
    pub prepared: Vec<String>,
    /// Top-level link names in the root project
    pub linked: Vec<String>,
}

/// Environment bindings describing the current evaluation context.
///
/// Rebound per invocation: a port's prepare command sees the consuming
/// install's paths, not the paths current when its manifest was first
/// written.
#[must_use]
pub fn context_env(
    resource_path: Option<&Path>,
    project: &Project,
    install: &Project,
) -> Vec<(String, String)> {
    let mut env = vec![
        (
            "PORTYARD_PROJECT_PATH".to_string(),
            project.path.display().to_string(),
        ),
        ("PORTYARD_PROJECT_NAME".to_string(), project.name.clone()),
        (
            "PORTYARD_INSTALL_PATH".to_string(),
            install.path.display().to_string(),
        ),
        ("PORTYARD_INSTALL_NAME".to_string(), install.name.clone()),
        (
            "PORTYARD_IS_PORT".to_string(),
            project.is_port.to_string(),
        ),
    ];
    if let Some(path) = resource_path {
        env.push((
            "PORTYARD_RESOURCE_PATH".to_string(),
            path.display().to_string(),
        ));
    }
    env
}

/// Run the full install for the project rooted at `root_dir`.
pub async fn install(root_dir: &Path) -> Result<InstallReport> {
    let root_dir = root_dir
        .canonicalize()
        .with_context(|| format!("project root not found: {}", root_dir.display()))?;
    let ports_dir = root_dir.join(PORTS_DIR);

    let mut prepared_ports: HashSet<String> = HashSet::new();
    let mut report = InstallReport::default();

    loop {
        report.passes += 1;
        debug!("resolution pass {}", report.passes);

        // Fresh context per pass; stale entries are a correctness bug.
        let mut tracker = Tracker::new(&ports_dir);
        let root = manifest::evaluate(&root_dir, &mut tracker, false)?;
        tracker.add_project(root.clone());
        load_present_ports(&mut tracker)?;

        let wanted = tracker.wanted(&root.name);
        let missing = tracker.missing_ports(&wanted);

        if missing.is_empty() {
            let unresolved = tracker.missing_dependencies(&wanted);
            if !unresolved.is_empty() {
                return Err(UserError::UnresolvedDependencies { ids: unresolved }.into());
            }
            let linked = linker::link_wanted(&tracker, &root, &wanted).await?;
            ignore::update_gitignore(&root.path, &linked)?;
            report.linked = linked;
            return Ok(report);
        }

        std::fs::create_dir_all(&ports_dir)
            .with_context(|| format!("failed to create {}", ports_dir.display()))?;

        // Sequential on purpose: a port's manifest or prepare script may
        // register further ports that the next pass must see, and the
        // tracker is a single-writer resource within a pass.
        for port in missing {
            info!("cloning port '{}'", port.name);
            gitio::clone(&port.clone_url(), &port.dir, &root.path)?;
            report.cloned.push(port.name.clone());

            let project = manifest::evaluate(&port.dir, &mut tracker, true)?;
            tracker.add_project(project);

            if prepared_ports.insert(port.name.clone()) {
                let wanted_now = tracker.wanted(&root.name);
                run_prepares(&tracker, &port.name, &wanted_now, &root, &mut report)?;
            }
        }
    }
}

/// Evaluate every registered port whose directory is already on disk,
/// recursively: loading one port may register more.
fn load_present_ports(tracker: &mut Tracker) -> Result<()> {
    loop {
        let pending = tracker.unloaded_present_ports();
        if pending.is_empty() {
            return Ok(());
        }
        for port in pending {
            debug!("loading port '{}' from {}", port.name, port.dir.display());
            let project = manifest::evaluate(&port.dir, tracker, true)?;
            tracker.add_project(project);
        }
    }
}

/// Run the prepare commands of a freshly-cloned port's wanted resources.
fn run_prepares(
    tracker: &Tracker,
    port_name: &str,
    wanted: &crate::tracker::Wanted,
    install_project: &Project,
    report: &mut InstallReport,
) -> Result<()> {
    let Some(port_project) = tracker.project(port_name) else {
        return Ok(());
    };
    for (id, cwd, command) in tracker.prepare_commands(port_name, wanted) {
        info!("preparing {}", id);
        let env = context_env(Some(&cwd), port_project, install_project);
        gitio::run_shell(&command, &cwd, &env)
            .with_context(|| format!("prepare script of '{id}' failed"))?;
        report.prepared.push(id);
    }
    Ok(())
}

/// Run `git pull` in every real (non-linked) port checkout.
pub fn update_ports(root_dir: &Path) -> Result<Vec<String>> {
    let ports_dir = root_dir.join(PORTS_DIR);
    let mut updated = Vec::new();
    let entries = match std::fs::read_dir(&ports_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(updated),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", ports_dir.display()))
        }
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            std::fs::symlink_metadata(p)
                .map(|m| m.is_dir() && !m.file_type().is_symlink())
                .unwrap_or(false)
        })
        .filter(|p| p.join(".git").exists())
        .collect();
    dirs.sort();
    for dir in dirs {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        info!("pulling port '{}'", name);
        gitio::pull(&dir)?;
        updated.push(name);
    }
    Ok(updated)
}

/// Load the final resolved graph without installing anything: one
/// evaluation pass over the root and every present port.
pub fn load_resolved(root_dir: &Path) -> Result<(Tracker, Project)> {
    let root_dir = root_dir
        .canonicalize()
        .with_context(|| format!("project root not found: {}", root_dir.display()))?;
    let ports_dir = root_dir.join(PORTS_DIR);
    let mut tracker = Tracker::new(&ports_dir);
    let root = manifest::evaluate(&root_dir, &mut tracker, false)?;
    tracker.add_project(root.clone());
    load_present_ports(&mut tracker)?;
    Ok((tracker, root))
}

/// Snapshot the current resolved refs for every tracked port.
pub async fn lock_from_tracker(tracker: &Tracker) -> Result<LockFile> {
    LockFile::from_live(tracker.ports().cloned().collect()).await
}
