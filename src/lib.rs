// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Portyard library - source-level dependency manager for git ports
//!
//! Projects declare external "ports" (git-backed source dependencies)
//! and named "resources" in a `ports.toml` manifest. Portyard resolves
//! the transitive set of wanted resources, clones missing ports,
//! links resolved resources into the consuming tree and snapshots the
//! exact resolved refs in a lock file.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod commands;
pub mod error;
pub mod gitio;
pub mod ignore;
pub mod install;
pub mod linker;
pub mod lockfile;
pub mod manifest;
pub mod project;
pub mod tracker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::UserError;
    pub use crate::lockfile::{LockChange, LockFile};
    pub use crate::project::{Project, Resource};
    pub use crate::tracker::{Port, Tracker, Wanted};
    pub use anyhow::{Context, Result};
}
