// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Per-pass resolution context
//!
//! The `Tracker` collects every port and project encountered while
//! evaluating manifests during one resolution pass. It is constructed
//! fresh for every pass; carrying entries across passes is a
//! correctness bug, so there is deliberately no `reset` method.

use crate::error::UserError;
use crate::gitio;
use crate::project::{split_id, Project};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// An external source reference with its derived short name
#[derive(Debug, Clone)]
pub struct Port {
    /// Derived short name (URL basename without `.git`)
    pub name: String,
    /// Source string exactly as declared
    pub source: String,
    /// Directory this port occupies once fetched
    pub dir: PathBuf,
}

impl Port {
    /// Resolve the URL handed to `git clone`, expanding the `github:`
    /// shorthand and injecting the auth token when configured.
    #[must_use]
    pub fn clone_url(&self) -> String {
        let url = match self.source.strip_prefix("github:") {
            Some(path) => gitio::github_url(path),
            None => self.source.clone(),
        };
        gitio::with_auth_token(&url)
    }
}

/// The transitive closure of required resource ids
#[derive(Debug, Default)]
pub struct Wanted {
    ids: BTreeSet<String>,
    consumers: BTreeMap<String, BTreeSet<String>>,
}

impl Wanted {
    /// Whether `id` is wanted
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// All wanted ids in sorted order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Number of wanted ids
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is wanted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Project names that requested `id`
    #[must_use]
    pub fn consumers_of(&self, id: &str) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();
        self.consumers.get(id).unwrap_or(&EMPTY)
    }

    /// Wanted ids grouped by owning project name
    #[must_use]
    pub fn by_project(&self) -> BTreeMap<String, Vec<String>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for id in &self.ids {
            if let Some((project, _)) = split_id(id) {
                grouped.entry(project.to_string()).or_default().push(id.clone());
            }
        }
        grouped
    }
}

/// Registry of ports and projects for one resolution pass
#[derive(Debug)]
pub struct Tracker {
    ports_dir: PathBuf,
    ports: BTreeMap<String, Port>,
    projects: BTreeMap<String, Project>,
}

impl Tracker {
    /// A fresh context. `ports_dir` is the root project's ports folder;
    /// every port of the pass, however deeply declared, lands there.
    #[must_use]
    pub fn new(ports_dir: &Path) -> Self {
        Self {
            ports_dir: ports_dir.to_path_buf(),
            ports: BTreeMap::new(),
            projects: BTreeMap::new(),
        }
    }

    /// Register a port by source, deduplicating by derived name.
    ///
    /// Re-declaring a name with the same source reuses the single
    /// registration; a different source is a fatal conflict.
    pub fn add_port(&mut self, source: &str) -> Result<String, UserError> {
        let name = match source.strip_prefix("github:") {
            Some(path) => gitio::port_name(path),
            None => gitio::port_name(source),
        };
        if let Some(existing) = self.ports.get(&name) {
            if existing.source != source {
                return Err(UserError::DuplicatePort {
                    name,
                    existing: existing.source.clone(),
                    conflicting: source.to_string(),
                });
            }
            return Ok(name);
        }
        let dir = self.ports_dir.join(&name);
        self.ports.insert(
            name.clone(),
            Port {
                name: name.clone(),
                source: source.to_string(),
                dir,
            },
        );
        Ok(name)
    }

    /// Register a GitHub port from an `owner/repo` path.
    pub fn add_github_port(&mut self, owner_slash_repo: &str) -> Result<String, UserError> {
        self.add_port(&format!("github:{}", owner_slash_repo.trim_matches('/')))
    }

    /// Record an evaluated project.
    pub fn add_project(&mut self, project: Project) {
        self.projects.insert(project.name.clone(), project);
    }

    /// Look up a loaded project by name
    #[must_use]
    pub fn project(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    /// Look up a registered port by name
    #[must_use]
    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.get(name)
    }

    /// All registered ports in name order
    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    /// Registered ports whose directory exists but whose project has
    /// not been evaluated yet this pass.
    #[must_use]
    pub fn unloaded_present_ports(&self) -> Vec<Port> {
        self.ports
            .values()
            .filter(|p| p.dir.exists() && !self.projects.contains_key(&p.name))
            .cloned()
            .collect()
    }

    /// Compute the wanted-resource closure from the root project's
    /// exported resources and `use` declarations.
    ///
    /// Reachability over the id graph; monotonic, so cycles converge.
    #[must_use]
    pub fn wanted(&self, root: &str) -> Wanted {
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut indices: HashMap<String, NodeIndex> = HashMap::new();

        let mut node = |graph: &mut DiGraph<String, ()>,
                        indices: &mut HashMap<String, NodeIndex>,
                        id: &str| {
            *indices
                .entry(id.to_string())
                .or_insert_with(|| graph.add_node(id.to_string()))
        };

        for project in self.projects.values() {
            for resource in project.resources.values() {
                let from = node(&mut graph, &mut indices, &resource.id);
                for dep in &resource.dependencies {
                    let to = node(&mut graph, &mut indices, dep);
                    graph.add_edge(from, to, ());
                }
            }
        }

        let mut wanted = Wanted::default();
        let Some(root_project) = self.projects.get(root) else {
            return wanted;
        };

        let mut seeds: Vec<String> = root_project.exported_ids();
        seeds.extend(root_project.uses.iter().cloned());

        for seed in &seeds {
            wanted
                .consumers
                .entry(seed.clone())
                .or_default()
                .insert(root.to_string());
            let start = node(&mut graph, &mut indices, seed);
            let mut dfs = Dfs::new(&graph, start);
            while let Some(idx) = dfs.next(&graph) {
                wanted.ids.insert(graph[idx].clone());
            }
        }

        // Record who pulled each wanted id in: the owner of the edge source.
        for project in self.projects.values() {
            for resource in project.resources.values() {
                if !wanted.ids.contains(&resource.id) {
                    continue;
                }
                for dep in &resource.dependencies {
                    wanted
                        .consumers
                        .entry(dep.clone())
                        .or_default()
                        .insert(project.name.clone());
                }
            }
        }

        wanted
    }

    /// Ports referenced by wanted ids whose backing directory does not
    /// exist on disk yet.
    #[must_use]
    pub fn missing_ports(&self, wanted: &Wanted) -> Vec<Port> {
        let mut names: BTreeSet<&str> = BTreeSet::new();
        for id in wanted.ids() {
            if let Some((project, _)) = split_id(id) {
                names.insert(project);
            }
        }
        names
            .into_iter()
            .filter_map(|name| self.ports.get(name))
            .filter(|port| !port.dir.exists())
            .cloned()
            .collect()
    }

    /// Wanted ids no loaded project exports, after every known port has
    /// been loaded. Non-empty means the install is unsatisfiable.
    #[must_use]
    pub fn missing_dependencies(&self, wanted: &Wanted) -> Vec<String> {
        let mut missing = Vec::new();
        for id in wanted.ids() {
            let Some((owner, _)) = split_id(id) else {
                missing.push(id.to_string());
                continue;
            };
            let Some(project) = self.projects.get(owner) else {
                missing.push(id.to_string());
                continue;
            };
            let Some(resource) = project.resources.get(id) else {
                missing.push(id.to_string());
                continue;
            };
            if resource.internal
                && wanted.consumers_of(id).iter().any(|c| c != owner)
            {
                // Importable only within its own project
                missing.push(id.to_string());
            }
        }
        missing
    }

    /// Prepare commands of a port's resources that sit on the path to a
    /// wanted resource: `(resource id, working directory, command)`.
    #[must_use]
    pub fn prepare_commands(&self, port: &str, wanted: &Wanted) -> Vec<(String, PathBuf, String)> {
        let Some(project) = self.projects.get(port) else {
            return Vec::new();
        };
        project
            .resources
            .values()
            .filter(|r| wanted.contains(&r.id))
            .filter_map(|r| {
                r.prepare
                    .as_ref()
                    .map(|cmd| (r.id.clone(), r.path.clone(), cmd.clone()))
            })
            .collect()
    }
}
