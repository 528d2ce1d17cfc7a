// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Lock commands - snapshot and diff resolved port refs

use crate::install::{load_resolved, lock_from_tracker};
use crate::lockfile::{LockChange, LockFile};
use anyhow::{bail, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;

/// Run a lock action: save, diff or show
pub fn run(action: &str, path: Option<PathBuf>) -> Result<()> {
    let root_dir = super::project_root(path)?;
    let (tracker, root) = load_resolved(&root_dir)?;
    let lock_path = LockFile::path_for(&root.path);

    match action {
        "save" | "write" => {
            let runtime = super::runtime()?;
            let snapshot = runtime.block_on(lock_from_tracker(&tracker))?;
            snapshot.save(&lock_path)?;
            println!(
                "Locked {} port(s) in {}",
                snapshot.ports.len(),
                lock_path.display()
            );
        }

        "show" | "list" => {
            let runtime = super::runtime()?;
            let snapshot = runtime.block_on(LockFile::load_or_live(
                &lock_path,
                tracker.ports().cloned().collect(),
            ))?;
            if snapshot.ports.is_empty() {
                println!("No ports locked.");
                return Ok(());
            }
            for (name, hash) in &snapshot.ports {
                println!("  {name} {hash}");
            }
        }

        "diff" | "check" => {
            let older = LockFile::load(&lock_path)?;
            let runtime = super::runtime()?;
            let newer = runtime.block_on(lock_from_tracker(&tracker))?;

            let mismatch = LockFile::compare(&older, &newer, |name, change| match change {
                LockChange::Added { new } => {
                    println!("  {} {} {}", "+".green(), name, new);
                }
                LockChange::Removed { old } => {
                    println!("  {} {} {}", "-".red(), name, old);
                }
                LockChange::Changed { old, new } => {
                    println!("  {} {} {} -> {}", "~".yellow(), name, old, new);
                }
            });

            if mismatch {
                println!("Lock file differs from the resolved state.");
            } else {
                println!("Lock file matches the resolved state.");
            }
        }

        other => {
            bail!("Unknown lock action: {}. Valid: save, diff, show", other);
        }
    }
    Ok(())
}
