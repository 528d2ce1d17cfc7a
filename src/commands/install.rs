// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Install command - resolve, fetch, prepare and link dependencies

use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::time::Instant;

/// Run the install command
pub fn run(path: Option<PathBuf>) -> Result<()> {
    let root = super::project_root(path)?;
    let started = Instant::now();

    let runtime = super::runtime()?;
    let report = runtime.block_on(crate::install::install(&root))?;

    if !report.cloned.is_empty() {
        println!("Cloned {} port(s):", report.cloned.len());
        for name in &report.cloned {
            println!("  {name}");
        }
    }
    if !report.prepared.is_empty() {
        println!("Prepared {} resource(s)", report.prepared.len());
    }
    if !report.linked.is_empty() {
        println!("Linked {} resource(s):", report.linked.len());
        for name in &report.linked {
            println!("  {name}");
        }
    }

    println!(
        "{} in {:.1}s ({} pass{})",
        "Install complete".green(),
        started.elapsed().as_secs_f64(),
        report.passes,
        if report.passes == 1 { "" } else { "es" }
    );
    Ok(())
}
