// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod completions;
pub mod install;
pub mod lock;
pub mod run;
pub mod sync;
pub mod update;

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Tokio runtime for commands that fan out I/O.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

/// The project root a command operates on: an explicit path or the
/// current directory.
pub(crate) fn project_root(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => std::env::current_dir().context("failed to determine current directory"),
    }
}
