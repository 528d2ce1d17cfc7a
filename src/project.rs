// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Project and resource graph values plus their builders
//!
//! A `Project` is the immutable result of evaluating one manifest; a
//! `Resource` is a named, directory-backed unit within it. Dependency
//! edges are plain resource-id strings, so cyclic graphs are
//! representable without ownership cycles.

use crate::error::UserError;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Separator between the port name and the resource name in an id
pub const ID_SEPARATOR: char = '!';

/// Name of the per-project manifest file
pub const MANIFEST_FILE: &str = "ports.toml";

/// Name of the ports folder under a project root
pub const PORTS_DIR: &str = "ports";

/// Build a resource id from its two halves.
#[must_use]
pub fn resource_id(project: &str, resource: &str) -> String {
    format!("{project}{ID_SEPARATOR}{resource}")
}

/// Split a resource id into `(project, resource)`.
#[must_use]
pub fn split_id(id: &str) -> Option<(&str, &str)> {
    id.split_once(ID_SEPARATOR)
}

/// A named, user-invokable run-script bound to a project
#[derive(Debug, Clone)]
pub struct Script {
    /// Shell command line
    pub run: String,
    /// Help text shown in listings
    pub desc: Option<String>,
    /// Expected positional argument count
    pub args: usize,
}

/// A named, directory-backed unit of code within a project
#[derive(Debug, Clone)]
pub struct Resource {
    /// Globally unique `project!name` id
    pub id: String,
    /// Resource name (the part after the separator)
    pub name: String,
    /// Absolute directory backing this resource
    pub path: PathBuf,
    /// Ordered resource-ids this resource requires
    pub dependencies: Vec<String>,
    /// Deferred setup command, run once per install when freshly required
    pub prepare: Option<String>,
    /// Internal resources are not importable by consumer projects
    pub internal: bool,
}

/// The immutable result of evaluating one project manifest
#[derive(Debug, Clone)]
pub struct Project {
    /// Name derived from the project directory
    pub name: String,
    /// Absolute project root
    pub path: PathBuf,
    /// Derived ports folder path (`<path>/ports`)
    pub ports_dir: PathBuf,
    /// Resources keyed by id
    pub resources: BTreeMap<String, Resource>,
    /// Dependency ids pulled in by `use` without exporting a resource
    pub uses: Vec<String>,
    /// Run-scripts keyed by name
    pub scripts: BTreeMap<String, Script>,
    /// Whether this project was evaluated as a port of another project
    pub is_port: bool,
}

impl Project {
    /// Ids of resources a consumer project may import
    #[must_use]
    pub fn exported_ids(&self) -> Vec<String> {
        self.resources
            .values()
            .filter(|r| !r.internal)
            .map(|r| r.id.clone())
            .collect()
    }
}

/// Accumulates declarations into an immutable [`Project`]
#[derive(Debug)]
pub struct ProjectBuilder {
    name: String,
    path: PathBuf,
    resources: BTreeMap<String, Resource>,
    uses: Vec<String>,
    scripts: BTreeMap<String, Script>,
    is_port: bool,
}

impl ProjectBuilder {
    /// Start a builder for the project rooted at `path`. The project
    /// name is the directory basename.
    pub fn new(path: &Path, is_port: bool) -> anyhow::Result<Self> {
        let path = path
            .canonicalize()
            .map_err(|_| UserError::ResourceDirMissing {
                id: "<project>".into(),
                path: path.to_path_buf(),
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "root".to_string());
        Ok(Self {
            name,
            path,
            resources: BTreeMap::new(),
            uses: Vec::new(),
            scripts: BTreeMap::new(),
            is_port,
        })
    }

    /// Project name derived from the directory
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Project root path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start a resource declaration on this project.
    #[must_use]
    pub fn resource(&self, name: &str) -> ResourceBuilder {
        ResourceBuilder::new(&self.name, &self.path, name)
    }

    /// Register a finalized resource. Duplicate ids are fatal.
    pub fn add_resource(&mut self, resource: Resource) -> Result<(), UserError> {
        if self.resources.contains_key(&resource.id) {
            return Err(UserError::DuplicateResource { id: resource.id });
        }
        self.resources.insert(resource.id.clone(), resource);
        Ok(())
    }

    /// Declare a dependency without exporting a named resource.
    pub fn add_use(&mut self, dependency_id: &str) {
        self.uses.push(dependency_id.to_string());
    }

    /// Register a named run-script.
    pub fn add_script(&mut self, name: &str, script: Script) {
        self.scripts.insert(name.to_string(), script);
    }

    /// Finalize into an immutable project.
    #[must_use]
    pub fn build(self) -> Project {
        let ports_dir = self.path.join(PORTS_DIR);
        Project {
            name: self.name,
            path: self.path,
            ports_dir,
            resources: self.resources,
            uses: self.uses,
            scripts: self.scripts,
            is_port: self.is_port,
        }
    }
}

/// Accumulates one resource declaration
#[derive(Debug)]
pub struct ResourceBuilder {
    id: String,
    name: String,
    project_path: PathBuf,
    dependencies: Vec<String>,
    dependency_set: HashSet<String>,
    path_override: Option<PathBuf>,
    internal: bool,
    internal_set: bool,
    prepare: Option<String>,
}

impl ResourceBuilder {
    fn new(project_name: &str, project_path: &Path, name: &str) -> Self {
        Self {
            id: resource_id(project_name, name),
            name: name.to_string(),
            project_path: project_path.to_path_buf(),
            dependencies: Vec::new(),
            dependency_set: HashSet::new(),
            path_override: None,
            internal: false,
            internal_set: false,
            prepare: None,
        }
    }

    /// Attach a dependency id. Declaring the same id twice is fatal.
    pub fn dependency(&mut self, id: &str) -> Result<&mut Self, UserError> {
        if !self.dependency_set.insert(id.to_string()) {
            return Err(UserError::DuplicateDependency {
                id: self.id.clone(),
                dep: id.to_string(),
            });
        }
        self.dependencies.push(id.to_string());
        Ok(self)
    }

    /// Override the backing directory, relative to the project root.
    pub fn path(&mut self, relative: &str) -> &mut Self {
        self.path_override = Some(PathBuf::from(relative));
        self
    }

    /// Mark the resource internal. Setting it twice is fatal.
    pub fn internal(&mut self) -> Result<&mut Self, UserError> {
        if self.internal_set {
            return Err(UserError::InternalSetTwice {
                id: self.id.clone(),
            });
        }
        self.internal = true;
        self.internal_set = true;
        Ok(self)
    }

    /// Attach a prepare command. Setting it twice is fatal.
    pub fn prepare(&mut self, command: &str) -> Result<&mut Self, UserError> {
        if self.prepare.is_some() {
            return Err(UserError::PrepareSetTwice {
                id: self.id.clone(),
            });
        }
        self.prepare = Some(command.to_string());
        Ok(self)
    }

    /// Resolve the final path and construct the immutable resource.
    ///
    /// Without an override, a literal `<project>/<name>` directory wins;
    /// a dotted name (`a.b.c`) then falls back to the nested directory
    /// `a/b/c`. The resolved path must be an existing directory.
    pub fn build(&self) -> Result<Resource, UserError> {
        let path = match &self.path_override {
            Some(rel) => self.project_path.join(rel),
            None => {
                let literal = self.project_path.join(&self.name);
                if !literal.exists() && self.name.contains('.') {
                    self.project_path
                        .join(self.name.replace('.', std::path::MAIN_SEPARATOR_STR))
                } else {
                    literal
                }
            }
        };

        if !path.exists() {
            return Err(UserError::ResourceDirMissing {
                id: self.id.clone(),
                path,
            });
        }
        if !path.is_dir() {
            return Err(UserError::ResourceNotADirectory {
                id: self.id.clone(),
                path,
            });
        }

        Ok(Resource {
            id: self.id.clone(),
            name: self.name.clone(),
            path,
            dependencies: self.dependencies.clone(),
            prepare: self.prepare.clone(),
            internal: self.internal,
        })
    }
}
