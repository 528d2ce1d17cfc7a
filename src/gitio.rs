// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Subprocess collaborator and git integration
//!
//! All process spawning in the crate goes through [`run_command`] /
//! [`run_shell`]. Git is always shelled out, never linked in, so the
//! user's own git configuration (credentials, ssh agent) applies.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable holding an auth token injected into clone URLs
pub const GIT_TOKEN_ENV: &str = "PORTYARD_GIT_TOKEN";
/// Environment variable switching `github:` ports to SSH clone URLs
pub const GIT_SSH_ENV: &str = "PORTYARD_GIT_SSH";

/// Subprocess failure, split by kind
#[derive(Debug, Error)]
pub enum CommandError {
    /// The process could not be started at all
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        /// Program name
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The process ran but exited non-zero
    #[error("'{program}' exited with status {code}")]
    Failed {
        /// Program name
        program: String,
        /// Exit code (-1 when killed by signal)
        code: i32,
    },
}

/// Run a program, capturing stdout and passing stderr/stdin through.
///
/// Captured stdout is returned trimmed and also forwarded for display
/// at info level. A non-zero exit is a [`CommandError::Failed`],
/// distinct from a spawn failure.
pub fn run_command(program: &str, args: &[&str], cwd: &Path) -> Result<String, CommandError> {
    debug!("run: {} {} (in {})", program, args.join(" "), cwd.display());
    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .stdin(Stdio::inherit())
        .output()
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if !stdout.is_empty() {
        info!("{}: {}", program, stdout);
    }

    if output.status.success() {
        Ok(stdout)
    } else {
        Err(CommandError::Failed {
            program: program.to_string(),
            code: output.status.code().unwrap_or(-1),
        })
    }
}

/// Run a shell command line (prepare scripts, run-scripts) with extra
/// environment bindings for the invocation context.
pub fn run_shell(command: &str, cwd: &Path, env: &[(String, String)]) -> Result<(), CommandError> {
    debug!("shell: {} (in {})", command, cwd.display());
    #[cfg(unix)]
    let (program, flag) = ("sh", "-c");
    #[cfg(windows)]
    let (program, flag) = ("cmd", "/C");

    let status = Command::new(program)
        .arg(flag)
        .arg(command)
        .current_dir(cwd)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .status()
        .map_err(|source| CommandError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(CommandError::Failed {
            program: program.to_string(),
            code: status.code().unwrap_or(-1),
        })
    }
}

/// Quote one argument for inclusion in a shell command line, so
/// whitespace and shell metacharacters survive as a single word.
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"_-./=:@".contains(&b));
    if plain {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Clone `url` into `dest`.
pub fn clone(url: &str, dest: &Path, cwd: &Path) -> Result<()> {
    let dest_str = dest.to_string_lossy();
    run_command("git", &["clone", url, &dest_str], cwd)
        .with_context(|| format!("git clone of '{url}' failed"))?;
    Ok(())
}

/// Run `git pull` in a repository directory.
pub fn pull(repo_dir: &Path) -> Result<()> {
    run_command("git", &["pull"], repo_dir)
        .with_context(|| format!("git pull in {} failed", repo_dir.display()))?;
    Ok(())
}

/// Resolve the HEAD commit of a repository. May legitimately return an
/// empty string on a freshly-initialized repository; callers retry.
pub fn rev_parse_head(repo_dir: &Path) -> Result<String, CommandError> {
    run_command("git", &["rev-parse", "HEAD"], repo_dir)
}

/// Rewrite the user-info component of an absolute http(s) URL with the
/// token from [`GIT_TOKEN_ENV`]. Anything that is not an absolute
/// http(s) URL (ssh remotes, local paths) is returned unchanged.
#[must_use]
pub fn with_auth_token(url: &str) -> String {
    let Ok(token) = std::env::var(GIT_TOKEN_ENV) else {
        return url.to_string();
    };
    if token.is_empty() {
        return url.to_string();
    }
    inject_user_info(url, &token)
}

fn inject_user_info(url: &str, token: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    if scheme != "http" && scheme != "https" {
        return url.to_string();
    }
    let authority_end = rest.find('/').unwrap_or(rest.len());
    let (authority, path) = rest.split_at(authority_end);
    if authority.is_empty() {
        return url.to_string();
    }
    // Replace any existing user-info
    let host = authority.rsplit('@').next().unwrap_or(authority);
    format!("{scheme}://{token}@{host}{path}")
}

/// Build the clone URL for a `github:owner/repo` shorthand. SSH when
/// [`GIT_SSH_ENV`] is set, HTTPS otherwise.
#[must_use]
pub fn github_url(owner_slash_repo: &str) -> String {
    let path = owner_slash_repo.trim_matches('/');
    if std::env::var(GIT_SSH_ENV).is_ok() {
        format!("git@github.com:{path}.git")
    } else {
        format!("https://github.com/{path}.git")
    }
}

/// Derive the short port name from a source: the basename of the URL
/// or path, without a trailing `.git`.
#[must_use]
pub fn port_name(source: &str) -> String {
    let trimmed = source.trim_end_matches('/');
    let base = trimmed
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(trimmed);
    base.strip_suffix(".git").unwrap_or(base).to_string()
}
