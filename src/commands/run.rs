// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Run command - invoke a project's named run-scripts

use crate::error::UserError;
use crate::install::context_env;
use crate::{gitio, manifest, tracker::Tracker};
use anyhow::Result;
use std::path::PathBuf;

/// Run a named script, or list the available scripts when no name is
/// given.
pub fn run(name: Option<String>, args: Vec<String>, path: Option<PathBuf>) -> Result<()> {
    let root_dir = super::project_root(path)?;
    let mut tracker = Tracker::new(&root_dir.join(crate::project::PORTS_DIR));
    let project = manifest::evaluate(&root_dir, &mut tracker, false)?;

    let Some(name) = name else {
        if project.scripts.is_empty() {
            println!("No scripts defined. Add a [scripts.<name>] table to ports.toml.");
            return Ok(());
        }
        println!("Scripts ({}):", project.scripts.len());
        for (script_name, script) in &project.scripts {
            let desc = script.desc.as_deref().unwrap_or("");
            let argc = if script.args > 0 {
                format!(" ({} arg{})", script.args, if script.args == 1 { "" } else { "s" })
            } else {
                String::new()
            };
            println!("  {script_name}{argc} - {desc}");
        }
        return Ok(());
    };

    let script = project
        .scripts
        .get(&name)
        .ok_or_else(|| UserError::UnknownScript { name: name.clone() })?;

    if args.len() != script.args {
        return Err(UserError::ScriptArgCount {
            name,
            expected: script.args,
            got: args.len(),
        }
        .into());
    }

    let mut command = script.run.clone();
    for arg in &args {
        command.push(' ');
        command.push_str(&gitio::shell_quote(arg));
    }

    let env = context_env(None, &project, &project);
    gitio::run_shell(&command, &project.path, &env)?;
    Ok(())
}
