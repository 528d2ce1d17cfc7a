// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Resource linking and the local-port side channel
//!
//! Resolved dependencies are surfaced to the consuming project as
//! directory links at the project root. The local linker publishes
//! un-committed projects into a well-known local-ports directory so
//! sibling projects can consume them live, without a clone.

use crate::error::UserError;
use crate::project::Project;
use crate::tracker::{Tracker, Wanted};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Environment variable overriding the local-ports directory
pub const LOCAL_PORTS_ENV: &str = "PORTYARD_LOCAL_PORTS";

/// Result of one link creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The link was created
    Created,
    /// Something already exists at the link path; skipped
    Existed,
}

/// Create a directory link at `link` pointing at `target`.
/// "Already exists" is success; any other filesystem error is fatal.
pub fn make_dir_link(link: &Path, target: &Path) -> Result<LinkOutcome> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(target, link);
    #[cfg(windows)]
    let result = std::os::windows::fs::symlink_dir(target, link);

    match result {
        Ok(()) => {
            debug!("linked {} -> {}", link.display(), target.display());
            Ok(LinkOutcome::Created)
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            debug!("link {} already exists, skipping", link.display());
            Ok(LinkOutcome::Existed)
        }
        Err(e) => Err(e).with_context(|| {
            format!(
                "failed to link {} -> {}",
                link.display(),
                target.display()
            )
        }),
    }
}

/// Remove whatever occupies `path`: a link, a directory tree or a file.
/// A missing path is fine.
pub fn remove_entry(path: &Path) -> Result<()> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("failed to stat {}", path.display())),
    };
    if meta.is_dir() {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove {}", path.display()))
    } else {
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove {}", path.display()))
    }
}

/// Link every wanted dependency into each consuming project's tree,
/// the root project and loaded ports alike.
///
/// Links for one owning port's resources are issued concurrently and
/// joined. Returns the names of the root project's top-level links,
/// created or pre-existing, for the `.gitignore` region.
pub async fn link_wanted(tracker: &Tracker, root: &Project, wanted: &Wanted) -> Result<Vec<String>> {
    let mut root_links = Vec::new();
    for (owner, ids) in wanted.by_project() {
        let Some(project) = tracker.project(&owner) else {
            continue;
        };

        let mut tasks: JoinSet<Result<(String, bool, LinkOutcome)>> = JoinSet::new();
        for id in ids {
            let Some(resource) = project.resources.get(&id) else {
                continue;
            };
            for consumer in wanted.consumers_of(&id) {
                if consumer == &owner {
                    continue;
                }
                let Some(consumer_project) = tracker.project(consumer) else {
                    continue;
                };
                let link = consumer_project.path.join(&resource.name);
                let target = resource.path.clone();
                let name = resource.name.clone();
                let is_root = consumer == &root.name;
                tasks.spawn_blocking(move || {
                    let outcome = make_dir_link(&link, &target)?;
                    Ok((name, is_root, outcome))
                });
            }
        }

        while let Some(joined) = tasks.join_next().await {
            let (name, is_root, outcome) = joined.context("link task panicked")??;
            if outcome == LinkOutcome::Created {
                info!("linked resource '{}'", name);
            }
            if is_root {
                root_links.push(name);
            }
        }
    }
    root_links.sort();
    root_links.dedup();
    Ok(root_links)
}

/// The flat directory holding locally-published projects.
#[must_use]
pub fn local_ports_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(LOCAL_PORTS_ENV) {
        return PathBuf::from(dir);
    }
    directories::ProjectDirs::from("org", "hyperpolymath", "portyard")
        .map(|dirs| dirs.data_dir().join("local-ports"))
        .unwrap_or_else(|| {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".portyard-local-ports")
        })
}

/// Publish the current project into the local-ports directory under
/// its own name, replacing a previous publish.
pub fn sync_this(project: &Project, local_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(local_dir)
        .with_context(|| format!("failed to create {}", local_dir.display()))?;
    let published = local_dir.join(&project.name);
    remove_entry(&published)?;
    make_dir_link(&published, &project.path)?;
    info!("published '{}' to {}", project.name, local_dir.display());
    Ok(())
}

/// Remove this project's local publish, if any.
pub fn unsync_this(project: &Project, local_dir: &Path) -> Result<()> {
    remove_entry(&local_dir.join(&project.name))
}

/// Consume a locally-published port instead of a clone: replaces any
/// previously-resolved copy under the ports folder with a link.
pub fn sync_with(root: &Project, tracker: &Tracker, name: &str, local_dir: &Path) -> Result<()> {
    let published = local_dir.join(name);
    if !published.exists() {
        return Err(UserError::LocalPortNotPublished {
            name: name.to_string(),
        }
        .into());
    }
    if tracker.port(name).is_none() {
        return Err(UserError::PortNotImported {
            name: name.to_string(),
        }
        .into());
    }
    std::fs::create_dir_all(&root.ports_dir)
        .with_context(|| format!("failed to create {}", root.ports_dir.display()))?;
    let slot = root.ports_dir.join(name);
    remove_entry(&slot)?;
    make_dir_link(&slot, &published)?;
    info!("port '{}' now resolves to the local publish", name);
    Ok(())
}

/// Drop the local-link for a port so the next install clones it again.
pub fn unsync_with(root: &Project, name: &str) -> Result<()> {
    let slot = root.ports_dir.join(name);
    match std::fs::symlink_metadata(&slot) {
        Ok(meta) if meta.file_type().is_symlink() => remove_entry(&slot),
        Ok(_) => {
            debug!("port '{}' is not locally linked, leaving it alone", name);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to stat {}", slot.display())),
    }
}

/// Names of locally-published ports that this project also imports.
#[must_use]
pub fn syncable_ports(tracker: &Tracker, local_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(local_dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| tracker.port(name).is_some())
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::ProjectBuilder;
    use std::fs;
    use tempfile::TempDir;

    fn make_root(tmp: &TempDir) -> Project {
        let dir = tmp.path().join("app");
        fs::create_dir_all(&dir).unwrap();
        ProjectBuilder::new(&dir, false).unwrap().build()
    }

    #[test]
    fn test_make_dir_link_idempotent() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("target");
        fs::create_dir(&target).unwrap();
        let link = tmp.path().join("link");

        assert_eq!(make_dir_link(&link, &target).unwrap(), LinkOutcome::Created);
        assert_eq!(make_dir_link(&link, &target).unwrap(), LinkOutcome::Existed);
        assert!(link.join("..").exists());
    }

    #[test]
    fn test_sync_this_replaces_previous_publish() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("local-ports");
        let project = make_root(&tmp);

        sync_this(&project, &local).unwrap();
        // Publishing again must not fail on the existing link
        sync_this(&project, &local).unwrap();

        let published = local.join(&project.name);
        assert!(published.exists());
        assert!(fs::symlink_metadata(&published).unwrap().file_type().is_symlink());

        unsync_this(&project, &local).unwrap();
        assert!(!published.exists());
    }

    #[test]
    fn test_sync_with_requires_publish_and_import() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("local-ports");
        fs::create_dir_all(&local).unwrap();
        let project = make_root(&tmp);
        let mut tracker = Tracker::new(&project.ports_dir);
        tracker.add_port("https://example.com/acme/utils.git").unwrap();

        // Not published yet
        let err = sync_with(&project, &tracker, "utils", &local).unwrap_err();
        assert!(matches!(
            err.downcast::<UserError>().unwrap(),
            UserError::LocalPortNotPublished { .. }
        ));

        // Published but not imported
        fs::create_dir(local.join("stranger")).unwrap();
        let err = sync_with(&project, &tracker, "stranger", &local).unwrap_err();
        assert!(matches!(
            err.downcast::<UserError>().unwrap(),
            UserError::PortNotImported { .. }
        ));

        // Published and imported: replaces a previously-cloned copy
        fs::create_dir(local.join("utils")).unwrap();
        fs::create_dir_all(project.ports_dir.join("utils")).unwrap();
        sync_with(&project, &tracker, "utils", &local).unwrap();
        let slot = project.ports_dir.join("utils");
        assert!(fs::symlink_metadata(&slot).unwrap().file_type().is_symlink());

        // Unsync drops the link; a real clone would be left alone
        unsync_with(&project, "utils").unwrap();
        assert!(!slot.exists());
    }

    #[test]
    fn test_syncable_ports_intersects_published_and_imported() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("local-ports");
        fs::create_dir_all(&local).unwrap();
        fs::create_dir(local.join("utils")).unwrap();
        fs::create_dir(local.join("unimported")).unwrap();

        let project = make_root(&tmp);
        let mut tracker = Tracker::new(&project.ports_dir);
        tracker.add_port("https://example.com/acme/utils.git").unwrap();

        assert_eq!(syncable_ports(&tracker, &local), vec!["utils"]);
    }

    #[tokio::test]
    async fn test_link_wanted_creates_and_skips() {
        let tmp = TempDir::new().unwrap();
        let root_dir = tmp.path().join("app");
        fs::create_dir_all(root_dir.join("main")).unwrap();
        let mut root_builder = ProjectBuilder::new(&root_dir, false).unwrap();
        let mut main = root_builder.resource("main");
        main.dependency("utils!strings").unwrap();
        let main = main.build().unwrap();
        root_builder.add_resource(main).unwrap();
        let root = root_builder.build();

        let utils_dir = tmp.path().join("utils");
        fs::create_dir_all(utils_dir.join("strings")).unwrap();
        let mut utils_builder = ProjectBuilder::new(&utils_dir, true).unwrap();
        let strings = utils_builder.resource("strings").build().unwrap();
        utils_builder.add_resource(strings).unwrap();

        let mut tracker = Tracker::new(&root.ports_dir);
        tracker.add_project(root.clone());
        tracker.add_project(utils_builder.build());

        let wanted = tracker.wanted("app");
        let names = link_wanted(&tracker, &root, &wanted).await.unwrap();
        assert_eq!(names, vec!["strings"]);
        assert!(root.path.join("strings").join("..").exists());

        // Second run: the existing link is not an error
        let names = link_wanted(&tracker, &root, &wanted).await.unwrap();
        assert_eq!(names, vec!["strings"]);
    }
}
