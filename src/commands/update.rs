// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Update command - git pull every present port

use anyhow::Result;
use std::path::PathBuf;

/// Run the update command
pub fn run(path: Option<PathBuf>) -> Result<()> {
    let root = super::project_root(path)?;
    let updated = crate::install::update_ports(&root)?;
    if updated.is_empty() {
        println!("No port checkouts to update.");
    } else {
        println!("Updated {} port(s):", updated.len());
        for name in updated {
            println!("  {name}");
        }
    }
    Ok(())
}
