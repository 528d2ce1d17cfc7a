// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Generated `.gitignore` region maintenance
//!
//! Install keeps a marked section of the project's `.gitignore` up to
//! date with the ports folder and every created top-level link. The
//! section is replaced idempotently; user-authored content outside the
//! markers is never touched.

use crate::project::PORTS_DIR;
use anyhow::{Context, Result};
use std::path::Path;

const BEGIN_MARKER: &str = "# >>> portyard generated >>>";
const END_MARKER: &str = "# <<< portyard generated <<<";

/// Rewrite the generated region of `<project_root>/.gitignore`,
/// listing the ports folder and each top-level link name.
pub fn update_gitignore(project_root: &Path, link_names: &[String]) -> Result<()> {
    let path = project_root.join(".gitignore");
    let existing = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };

    let updated = splice_region(&existing, &render_region(link_names));
    std::fs::write(&path, updated)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn render_region(link_names: &[String]) -> String {
    let mut region = String::new();
    region.push_str(BEGIN_MARKER);
    region.push('\n');
    region.push_str(&format!("/{PORTS_DIR}/\n"));
    for name in link_names {
        region.push('/');
        region.push_str(name);
        region.push('\n');
    }
    region.push_str(END_MARKER);
    region.push('\n');
    region
}

fn splice_region(existing: &str, region: &str) -> String {
    let begin = existing.find(BEGIN_MARKER);
    let end = existing.find(END_MARKER);

    match (begin, end) {
        (Some(begin), Some(end)) if begin <= end => {
            let after_end = existing[end..]
                .find('\n')
                .map_or(existing.len(), |n| end + n + 1);
            let mut out = String::with_capacity(existing.len() + region.len());
            out.push_str(&existing[..begin]);
            out.push_str(region);
            out.push_str(&existing[after_end..]);
            out
        }
        _ => {
            let mut out = existing.to_string();
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(region);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_gitignore_from_scratch() {
        let tmp = TempDir::new().unwrap();
        update_gitignore(tmp.path(), &["utils".into(), "widgets".into()]).unwrap();

        let text = std::fs::read_to_string(tmp.path().join(".gitignore")).unwrap();
        assert!(text.contains(BEGIN_MARKER));
        assert!(text.contains("/ports/"));
        assert!(text.contains("/utils"));
        assert!(text.contains("/widgets"));
        assert!(text.contains(END_MARKER));
    }

    #[test]
    fn test_preserves_user_text_on_both_sides() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".gitignore");
        std::fs::write(
            &path,
            format!("target/\n\n{BEGIN_MARKER}\n/ports/\n/old-link\n{END_MARKER}\n*.swp\n"),
        )
        .unwrap();

        update_gitignore(tmp.path(), &["utils".into()]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("target/\n"));
        assert!(text.ends_with("*.swp\n"));
        assert!(text.contains("/utils"));
        assert!(!text.contains("/old-link"));
    }

    #[test]
    fn test_idempotent_no_marker_duplication() {
        let tmp = TempDir::new().unwrap();
        update_gitignore(tmp.path(), &["utils".into()]).unwrap();
        update_gitignore(tmp.path(), &["utils".into()]).unwrap();

        let text = std::fs::read_to_string(tmp.path().join(".gitignore")).unwrap();
        assert_eq!(text.matches(BEGIN_MARKER).count(), 1);
        assert_eq!(text.matches(END_MARKER).count(), 1);
    }
}
