// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Lock file: snapshot and diff of resolved port refs
//!
//! A lock file maps each port name to the exact commit its checkout
//! resolves to. Snapshots are built from live git state with one
//! concurrent `rev-parse` task per port; a freshly-initialized
//! repository can transiently report an empty ref, so resolution
//! retries before giving up.

use crate::error::UserError;
use crate::gitio;
use crate::tracker::Port;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::debug;

/// Name of the lock file at the project root
pub const LOCK_FILE: &str = "ports.lock";

const REF_RETRIES: u32 = 10;
const REF_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Classification of one port between two snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockChange {
    /// Present only in the newer snapshot
    Added {
        /// New ref
        new: String,
    },
    /// Present only in the older snapshot
    Removed {
        /// Old ref
        old: String,
    },
    /// Present in both with different refs
    Changed {
        /// Old ref
        old: String,
        /// New ref
        new: String,
    },
}

/// An ordered snapshot of resolved port refs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockFile {
    /// When this snapshot was taken
    pub generated_at: Option<DateTime<Utc>>,
    /// Port name to commit hash, ordered by name
    #[serde(default)]
    pub ports: BTreeMap<String, String>,
}

impl LockFile {
    /// Load a snapshot from `path`. A missing file is the empty lock;
    /// malformed JSON or non-string refs are fatal user errors.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no lock file at {}, starting empty", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        serde_json::from_str(&text).map_err(|e| {
            UserError::MalformedLock {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Lock file path for a project root
    #[must_use]
    pub fn path_for(project_root: &Path) -> PathBuf {
        project_root.join(LOCK_FILE)
    }

    /// Persist the snapshot.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize lock file")?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Build a snapshot from live git state, resolving every port's
    /// HEAD concurrently. Ports without a checkout are skipped: a
    /// declared port that nothing wanted is never fetched.
    pub async fn from_live(ports: Vec<Port>) -> Result<Self> {
        let mut tasks: JoinSet<Result<(String, String)>> = JoinSet::new();
        for port in ports {
            if !port.dir.exists() {
                debug!("port '{}' has no checkout, skipping", port.name);
                continue;
            }
            tasks.spawn(async move {
                let hash = resolve_ref(&port).await?;
                Ok((port.name, hash))
            });
        }

        let mut entries = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (name, hash) = joined.context("ref resolution task panicked")??;
            entries.insert(name, hash);
        }

        Ok(Self {
            generated_at: Some(Utc::now()),
            ports: entries,
        })
    }

    /// Load `path` if it exists, otherwise snapshot live state.
    pub async fn load_or_live(path: &Path, ports: Vec<Port>) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Self::from_live(ports).await
        }
    }

    /// Diff two snapshots over the union of their port names, invoking
    /// `on_diff` per difference. Returns whether any mismatch existed.
    pub fn compare(
        older: &Self,
        newer: &Self,
        mut on_diff: impl FnMut(&str, &LockChange),
    ) -> bool {
        let names: std::collections::BTreeSet<&String> =
            older.ports.keys().chain(newer.ports.keys()).collect();

        let mut mismatch = false;
        for name in names {
            let change = match (older.ports.get(name), newer.ports.get(name)) {
                (None, Some(new)) => Some(LockChange::Added { new: new.clone() }),
                (Some(old), None) => Some(LockChange::Removed { old: old.clone() }),
                (Some(old), Some(new)) if old != new => Some(LockChange::Changed {
                    old: old.clone(),
                    new: new.clone(),
                }),
                _ => None,
            };
            if let Some(change) = change {
                mismatch = true;
                on_diff(name, &change);
            }
        }
        mismatch
    }
}

/// Resolve a port's HEAD, retrying the known transient empty-output
/// condition before treating it as fatal.
async fn resolve_ref(port: &Port) -> Result<String> {
    let dir = port.dir.clone();
    let name = port.name.clone();
    for attempt in 0..REF_RETRIES {
        let dir = dir.clone();
        let output = tokio::task::spawn_blocking(move || gitio::rev_parse_head(&dir))
            .await
            .context("rev-parse task panicked")?
            .with_context(|| format!("git rev-parse failed for port '{name}'"))?;
        if !output.is_empty() {
            return Ok(output);
        }
        debug!(
            "empty ref for port '{}' (attempt {}/{})",
            name,
            attempt + 1,
            REF_RETRIES
        );
        tokio::time::sleep(REF_RETRY_DELAY).await;
    }
    Err(UserError::GitRefUnavailable { port: name }.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lock(entries: &[(&str, &str)]) -> LockFile {
        LockFile {
            generated_at: None,
            ports: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn collect_diff(older: &LockFile, newer: &LockFile) -> (bool, Vec<(String, LockChange)>) {
        let mut diffs = Vec::new();
        let mismatch = LockFile::compare(older, newer, |name, change| {
            diffs.push((name.to_string(), change.clone()));
        });
        (mismatch, diffs)
    }

    #[test]
    fn test_compare_classifies_both_directions() {
        let a = lock(&[("p1", "abc")]);
        let b = lock(&[("p1", "def"), ("p2", "123")]);

        let (mismatch, diffs) = collect_diff(&a, &b);
        assert!(mismatch);
        assert_eq!(diffs.len(), 2);
        assert_eq!(
            diffs[0],
            (
                "p1".to_string(),
                LockChange::Changed {
                    old: "abc".into(),
                    new: "def".into()
                }
            )
        );
        assert_eq!(
            diffs[1],
            ("p2".to_string(), LockChange::Added { new: "123".into() })
        );

        let (mismatch, diffs) = collect_diff(&b, &a);
        assert!(mismatch);
        assert_eq!(
            diffs[1],
            ("p2".to_string(), LockChange::Removed { old: "123".into() })
        );
    }

    #[test]
    fn test_compare_identical_reports_nothing() {
        let a = lock(&[("p1", "abc")]);
        let (mismatch, diffs) = collect_diff(&a, &a.clone());
        assert!(!mismatch);
        assert!(diffs.is_empty());
    }

    #[test]
    fn test_load_missing_is_empty() {
        let tmp = TempDir::new().unwrap();
        let loaded = LockFile::load(&tmp.path().join(LOCK_FILE)).unwrap();
        assert!(loaded.ports.is_empty());
    }

    #[test]
    fn test_load_malformed_is_user_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(LOCK_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        let err = LockFile::load(&path).unwrap_err();
        assert!(matches!(
            err.downcast::<UserError>().unwrap(),
            UserError::MalformedLock { .. }
        ));

        // Non-string refs are also malformed, not silently coerced
        std::fs::write(&path, r#"{"ports": {"p1": 42}}"#).unwrap();
        let err = LockFile::load(&path).unwrap_err();
        assert!(matches!(
            err.downcast::<UserError>().unwrap(),
            UserError::MalformedLock { .. }
        ));
    }

    #[tokio::test]
    async fn test_from_live_skips_ports_without_checkout() {
        let tmp = TempDir::new().unwrap();
        let port = Port {
            name: "unused".into(),
            source: "https://example.com/acme/unused.git".into(),
            dir: tmp.path().join("ports/unused"),
        };
        let snapshot = LockFile::from_live(vec![port]).await.unwrap();
        assert!(snapshot.ports.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(LOCK_FILE);
        let mut snapshot = lock(&[("zeta", "111"), ("alpha", "222")]);
        snapshot.generated_at = Some(Utc::now());
        snapshot.save(&path).unwrap();

        let loaded = LockFile::load(&path).unwrap();
        assert_eq!(loaded.ports, snapshot.ports);
        // BTreeMap keeps the snapshot ordered by port name
        let keys: Vec<_> = loaded.ports.keys().collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }
}
