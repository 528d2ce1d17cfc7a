// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Sync commands - the local-port developer side channel

use crate::install::load_resolved;
use crate::linker;
use anyhow::{bail, Result};
use std::path::PathBuf;

/// Run `sync this` / `sync with <name|all>`
pub fn run_sync(target: &str, name: Option<String>, path: Option<PathBuf>) -> Result<()> {
    let root_dir = super::project_root(path)?;
    let local_dir = linker::local_ports_dir();
    let (tracker, root) = load_resolved(&root_dir)?;

    match target {
        "this" => {
            linker::sync_this(&root, &local_dir)?;
            println!("Published '{}' to {}", root.name, local_dir.display());
        }
        "with" => match name.as_deref() {
            Some("all") => {
                let names = linker::syncable_ports(&tracker, &local_dir);
                if names.is_empty() {
                    println!("No published local ports match this project's imports.");
                    return Ok(());
                }
                for name in names {
                    linker::sync_with(&root, &tracker, &name, &local_dir)?;
                    println!("Using local '{name}'");
                }
            }
            Some(name) => {
                linker::sync_with(&root, &tracker, name, &local_dir)?;
                println!("Using local '{name}'");
            }
            None => bail!("sync with requires a port name or 'all'"),
        },
        other => {
            bail!("Unknown sync target: {}. Valid: this, with", other);
        }
    }
    Ok(())
}

/// Run `unsync this` / `unsync with <name|all>`
pub fn run_unsync(target: &str, name: Option<String>, path: Option<PathBuf>) -> Result<()> {
    let root_dir = super::project_root(path)?;
    let local_dir = linker::local_ports_dir();
    let (tracker, root) = load_resolved(&root_dir)?;

    match target {
        "this" => {
            linker::unsync_this(&root, &local_dir)?;
            println!("Removed local publish of '{}'", root.name);
        }
        "with" => match name.as_deref() {
            Some("all") => {
                for name in linker::syncable_ports(&tracker, &local_dir) {
                    linker::unsync_with(&root, &name)?;
                    println!("Dropped local '{name}'");
                }
            }
            Some(name) => {
                linker::unsync_with(&root, name)?;
                println!("Dropped local '{name}'");
            }
            None => bail!("unsync with requires a port name or 'all'"),
        },
        other => {
            bail!("Unknown unsync target: {}. Valid: this, with", other);
        }
    }
    Ok(())
}
