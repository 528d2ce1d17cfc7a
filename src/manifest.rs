// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Manifest evaluation
//!
//! Each project carries a `ports.toml` describing its ports, resources,
//! run-scripts and implicit `use` dependencies. Evaluating a manifest
//! registers its ports with the pass's [`Tracker`] and produces an
//! immutable [`Project`] via the builders. Deferred callback bodies
//! (`prepare`, `scripts.*.run`) are shell command lines; their context
//! constants are bound as environment variables at invocation time,
//! not at load time, because a port's manifest is evaluated once per
//! consuming install.

use crate::error::UserError;
use crate::project::{resource_id, Project, ProjectBuilder, Script, MANIFEST_FILE};
use crate::tracker::Tracker;
use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Top-level `ports.toml` schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Port declarations: name is ignored, the source decides the name
    #[serde(default)]
    pub ports: Vec<String>,
    /// Named resource declarations
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceDecl>,
    /// Implicit dependency pulls that export nothing
    #[serde(rename = "use", default)]
    pub uses: Vec<String>,
    /// Resource groups sharing a directory prefix
    #[serde(default)]
    pub prefix: BTreeMap<String, PrefixDecl>,
    /// User-invokable run-scripts
    #[serde(default)]
    pub scripts: BTreeMap<String, ScriptDecl>,
}

/// One resource declaration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceDecl {
    /// Dependency ids, either `port!resource` or a bare sibling name
    #[serde(default)]
    pub deps: Vec<String>,
    /// Directory override relative to the project root
    pub path: Option<String>,
    /// Exclude from consumer imports
    #[serde(default)]
    pub internal: bool,
    /// Deferred setup command
    pub prepare: Option<String>,
}

/// Resources grouped under a shared directory prefix
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixDecl {
    /// Resource declarations rooted at the prefix directory
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceDecl>,
}

/// One run-script declaration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptDecl {
    /// Shell command line
    pub run: String,
    /// Help text
    pub desc: Option<String>,
    /// Expected positional argument count
    #[serde(default)]
    pub args: usize,
}

/// Evaluate the manifest of the project rooted at `dir`.
///
/// Ports are registered with `tracker` as a side effect. A port
/// directory without a manifest evaluates to an empty project (it
/// exports nothing); a missing root manifest is a user error.
pub fn evaluate(dir: &Path, tracker: &mut Tracker, is_port: bool) -> Result<Project> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let mut builder = ProjectBuilder::new(dir, is_port)?;

    if !manifest_path.exists() {
        if is_port {
            debug!("no manifest in port {}, treating as empty", dir.display());
            return Ok(builder.build());
        }
        return Err(UserError::ManifestMissing {
            path: manifest_path,
        }
        .into());
    }

    let text = std::fs::read_to_string(&manifest_path)?;
    let manifest: Manifest = toml::from_str(&text).map_err(|e| UserError::ManifestInvalid {
        path: manifest_path.clone(),
        reason: e.to_string(),
    })?;

    for source in &manifest.ports {
        let name = tracker.add_port(source)?;
        debug!("registered port '{}' from {}", name, source);
    }

    let project_name = builder.name().to_string();

    for (name, decl) in &manifest.resources {
        let resource = build_resource(&builder, &project_name, name, decl, None)?;
        builder.add_resource(resource)?;
    }

    for (prefix, group) in &manifest.prefix {
        for (name, decl) in &group.resources {
            let resource = build_resource(&builder, &project_name, name, decl, Some(prefix))?;
            builder.add_resource(resource)?;
        }
    }

    for dep in &manifest.uses {
        builder.add_use(&qualify(&project_name, dep));
    }

    for (name, decl) in &manifest.scripts {
        builder.add_script(
            name,
            Script {
                run: decl.run.clone(),
                desc: decl.desc.clone(),
                args: decl.args,
            },
        );
    }

    Ok(builder.build())
}

fn build_resource(
    builder: &ProjectBuilder,
    project_name: &str,
    name: &str,
    decl: &ResourceDecl,
    prefix: Option<&str>,
) -> Result<crate::project::Resource, UserError> {
    let mut rb = builder.resource(name);
    match (prefix, &decl.path) {
        (Some(prefix), Some(path)) => {
            rb.path(&format!("{prefix}/{path}"));
        }
        (Some(prefix), None) => {
            rb.path(&format!("{prefix}/{name}"));
        }
        (None, Some(path)) => {
            rb.path(path);
        }
        (None, None) => {}
    }
    if decl.internal {
        rb.internal()?;
    }
    if let Some(cmd) = &decl.prepare {
        rb.prepare(cmd)?;
    }
    for dep in &decl.deps {
        rb.dependency(&qualify(project_name, dep))?;
    }
    rb.build()
}

/// Qualify a dependency reference: bare names refer to a sibling
/// resource of the same project.
fn qualify(project_name: &str, dep: &str) -> String {
    if dep.contains(crate::project::ID_SEPARATOR) {
        dep.to_string()
    } else {
        resource_id(project_name, dep)
    }
}
