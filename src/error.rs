// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! User-facing error types with stable short codes
//!
//! Configuration mistakes, unsatisfiable dependencies and filesystem
//! preconditions are `UserError`s: they carry a stable code, render
//! without a backtrace and are never retried. Everything unexpected
//! propagates through `anyhow` with full diagnostic detail.

use std::path::PathBuf;
use thiserror::Error;

/// A configuration or resolution mistake made by the user
#[derive(Debug, Error)]
pub enum UserError {
    /// The same port name was declared with two different sources
    #[error("port '{name}' declared twice with different sources: '{existing}' vs '{conflicting}'")]
    DuplicatePort {
        /// Derived port name
        name: String,
        /// Source registered first
        existing: String,
        /// Conflicting source
        conflicting: String,
    },

    /// The same resource id was declared twice within one project
    #[error("resource '{id}' declared twice in the same project")]
    DuplicateResource {
        /// Resource id
        id: String,
    },

    /// The same dependency was attached twice to one resource
    #[error("resource '{id}' declares dependency '{dep}' twice")]
    DuplicateDependency {
        /// Resource id
        id: String,
        /// Duplicated dependency id
        dep: String,
    },

    /// `internal` was set more than once on a resource
    #[error("resource '{id}': internal flag set twice")]
    InternalSetTwice {
        /// Resource id
        id: String,
    },

    /// A prepare script was attached more than once to a resource
    #[error("resource '{id}': prepare script set twice")]
    PrepareSetTwice {
        /// Resource id
        id: String,
    },

    /// A resource's resolved path does not exist
    #[error("resource '{id}': directory not found: {path}")]
    ResourceDirMissing {
        /// Resource id
        id: String,
        /// Resolved path
        path: PathBuf,
    },

    /// A resource's resolved path exists but is not a directory
    #[error("resource '{id}': not a directory: {path}")]
    ResourceNotADirectory {
        /// Resource id
        id: String,
        /// Resolved path
        path: PathBuf,
    },

    /// No manifest was found where one is required
    #[error("no ports.toml manifest found at {path}")]
    ManifestMissing {
        /// Expected manifest path
        path: PathBuf,
    },

    /// The manifest failed to parse
    #[error("invalid manifest {path}: {reason}")]
    ManifestInvalid {
        /// Manifest path
        path: PathBuf,
        /// Parser diagnostic
        reason: String,
    },

    /// Wanted resources that no loaded project exports
    #[error("unresolved dependencies: {}", ids.join(", "))]
    UnresolvedDependencies {
        /// Every unresolved resource id
        ids: Vec<String>,
    },

    /// The lock file exists but could not be understood
    #[error("malformed lock file {path}: {reason}")]
    MalformedLock {
        /// Lock file path
        path: PathBuf,
        /// Parser diagnostic
        reason: String,
    },

    /// A run-script name that the project does not define
    #[error("unknown script '{name}'")]
    UnknownScript {
        /// Requested script name
        name: String,
    },

    /// A run-script invoked with the wrong number of arguments
    #[error("script '{name}' expects {expected} argument(s), got {got}")]
    ScriptArgCount {
        /// Script name
        name: String,
        /// Declared argument count
        expected: usize,
        /// Provided argument count
        got: usize,
    },

    /// `sync with` named a project that was never published locally
    #[error("local port '{name}' is not published; run 'portyard sync this' in that project first")]
    LocalPortNotPublished {
        /// Requested port name
        name: String,
    },

    /// A sync target that the current project does not import
    #[error("port '{name}' is not imported by this project")]
    PortNotImported {
        /// Requested port name
        name: String,
    },

    /// `git rev-parse HEAD` kept returning nothing
    #[error("could not resolve a git ref for port '{port}'")]
    GitRefUnavailable {
        /// Port name
        port: String,
    },
}

impl UserError {
    /// Stable short code for this error class
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicatePort { .. } => "dup-port",
            Self::DuplicateResource { .. } => "dup-resource",
            Self::DuplicateDependency { .. } => "dup-dependency",
            Self::InternalSetTwice { .. } => "internal-twice",
            Self::PrepareSetTwice { .. } => "prepare-twice",
            Self::ResourceDirMissing { .. } => "resource-dir-missing",
            Self::ResourceNotADirectory { .. } => "resource-not-a-dir",
            Self::ManifestMissing { .. } => "manifest-missing",
            Self::ManifestInvalid { .. } => "manifest-invalid",
            Self::UnresolvedDependencies { .. } => "unresolved-deps",
            Self::MalformedLock { .. } => "malformed-lock",
            Self::UnknownScript { .. } => "unknown-script",
            Self::ScriptArgCount { .. } => "script-argc",
            Self::LocalPortNotPublished { .. } => "not-published",
            Self::PortNotImported { .. } => "not-imported",
            Self::GitRefUnavailable { .. } => "git-ref-unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let err = UserError::DuplicatePort {
            name: "utils".into(),
            existing: "https://a".into(),
            conflicting: "https://b".into(),
        };
        assert_eq!(err.code(), "dup-port");
        assert!(err.to_string().contains("utils"));

        let err = UserError::UnresolvedDependencies {
            ids: vec!["utils!missing".into()],
        };
        assert_eq!(err.code(), "unresolved-deps");
        assert!(err.to_string().contains("utils!missing"));
    }
}
