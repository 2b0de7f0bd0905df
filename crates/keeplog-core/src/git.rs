//! Repository coordinates from git remotes.
//!
//! Shells out to `git` so the user's own configuration (`insteadOf`
//! rewrites, includes) applies to the remote URL we read.

use std::process::Command;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::links::RepositoryCoordinates;

/// Remote consulted when nothing is configured.
pub const DEFAULT_REMOTE: &str = "origin";

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "remote").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// URL of the named remote, or `None` if it does not exist.
#[instrument]
pub fn remote_url(remote: &str) -> GitResult<Option<String>> {
    match git(&["remote", "get-url", remote]) {
        Ok(url) => {
            let url = url.trim().to_string();
            debug!(%remote, %url, "remote URL");
            Ok(Some(url))
        }
        Err(GitError::Command { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Coordinates of the `origin` remote.
///
/// `None` outside a repository, without an `origin`, or when its URL is not
/// a recognizable `host/owner/name` remote.
#[instrument]
pub fn origin_coordinates() -> GitResult<Option<RepositoryCoordinates>> {
    let url = match remote_url(DEFAULT_REMOTE) {
        Ok(url) => url,
        Err(GitError::NotARepo) => return Ok(None),
        Err(e) => return Err(e),
    };
    Ok(url.as_deref().and_then(parse_remote))
}

/// Parse a remote URL into repository coordinates.
///
/// Accepts URL forms (`https://github.com/owner/repo.git`,
/// `ssh://git@host:22/owner/repo`) and scp-like SSH
/// (`git@github.com:owner/repo.git`). Nested group paths are rejected.
pub fn parse_remote(url: &str) -> Option<RepositoryCoordinates> {
    let url = url.trim();
    let (host, path) = match url.split_once("://") {
        Some((_, rest)) => {
            let (authority, path) = rest.split_once('/')?;
            let host = strip_user(authority);
            (host.split_once(':').map_or(host, |(host, _port)| host), path)
        }
        None => {
            let (authority, path) = url.split_once(':')?;
            (strip_user(authority), path)
        }
    };

    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let (owner, name) = path.split_once('/')?;

    if host.is_empty() || owner.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }

    Some(RepositoryCoordinates::new(owner, name).with_host(host))
}

fn strip_user(authority: &str) -> &str {
    authority.rsplit_once('@').map_or(authority, |(_, host)| host)
}

/// Run a git command and return its stdout.
fn git(args: &[&str]) -> GitResult<String> {
    let output = Command::new("git").args(args).output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }

        Err(GitError::Command {
            command: args.first().unwrap_or(&"").to_string(),
            stderr,
        })
    }
}
