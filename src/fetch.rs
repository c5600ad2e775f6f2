//! Acquiring a local copy of a source's documentation subtree.
//!
//! The default [`GitFetcher`] does a shallow, sparse, blob-filtered fetch
//! of a single branch into a temporary directory, so only the docs subtree
//! at the tip of the branch is ever downloaded. [`LocalFetcher`] serves
//! sources configured with `local_path` straight from disk.

use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::sources::SourceSpec;

/// A fetched subtree on local disk.
///
/// Temporary checkouts are removed when the value is dropped.
#[derive(Debug)]
pub struct Checkout {
    root: PathBuf,
    _tmp: Option<TempDir>,
}

impl Checkout {
    /// Directory containing the source's documentation files.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Obtains the documentation subtree for a source.
#[async_trait]
pub trait RepositoryFetcher: Send + Sync {
    async fn fetch(&self, spec: &SourceSpec, branch: &str) -> Result<Checkout>;
}

/// Sparse shallow fetch through the `git` binary.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    depth: u32,
}

impl GitFetcher {
    pub fn new(depth: u32) -> Self {
        Self {
            depth: depth.max(1),
        }
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl RepositoryFetcher for GitFetcher {
    async fn fetch(&self, spec: &SourceSpec, branch: &str) -> Result<Checkout> {
        let spec = spec.clone();
        let branch = branch.to_string();
        let depth = self.depth;
        let origin = spec.source;

        tokio::task::spawn_blocking(move || sparse_checkout(&spec, &branch, depth))
            .await
            .map_err(|e| Error::fetch(origin, format!("fetch task failed: {}", e)))?
    }
}

fn sparse_checkout(spec: &SourceSpec, branch: &str, depth: u32) -> Result<Checkout> {
    let tmp = TempDir::new().map_err(|e| Error::io(std::env::temp_dir(), e))?;
    let dir = tmp.path();
    let depth = depth.to_string();

    tracing::info!(
        source = %spec.source,
        repo = %spec.repo_url,
        subtree = %spec.subtree,
        branch,
        "fetching"
    );

    let steps: [Vec<&str>; 5] = [
        vec!["init", "--quiet"],
        vec!["sparse-checkout", "set", spec.subtree.as_str()],
        vec!["remote", "add", "origin", spec.repo_url.as_str()],
        vec![
            "fetch",
            "--quiet",
            "--depth",
            depth.as_str(),
            "--filter=blob:none",
            "origin",
            branch,
        ],
        vec!["checkout", "--quiet", "FETCH_HEAD"],
    ];
    for args in &steps {
        git(spec, dir, args)?;
    }

    let root = dir.join(&spec.subtree);
    if !root.is_dir() {
        return Err(Error::fetch(
            spec.source,
            format!("subtree '{}' not found on branch '{}'", spec.subtree, branch),
        ));
    }

    Ok(Checkout {
        root,
        _tmp: Some(tmp),
    })
}

fn git(spec: &SourceSpec, dir: &Path, args: &[&str]) -> Result<()> {
    tracing::debug!(source = %spec.source, ?args, "git");

    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(|e| Error::fetch(spec.source, format!("failed to execute git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::fetch(
            spec.source,
            format!("git {} failed: {}", args[0], stderr.trim()),
        ));
    }
    Ok(())
}

/// Reads an existing checkout named by the source's `local_path`.
#[derive(Debug, Clone, Default)]
pub struct LocalFetcher;

#[async_trait]
impl RepositoryFetcher for LocalFetcher {
    async fn fetch(&self, spec: &SourceSpec, _branch: &str) -> Result<Checkout> {
        let Some(path) = spec.local_path.as_ref() else {
            return Err(Error::fetch(spec.source, "no local_path configured"));
        };
        if !path.is_dir() {
            return Err(Error::fetch(
                spec.source,
                format!("local path does not exist: {}", path.display()),
            ));
        }
        Ok(Checkout {
            root: path.clone(),
            _tmp: None,
        })
    }
}

/// Uses [`LocalFetcher`] for sources with a `local_path` and `git`
/// for everything else.
#[derive(Debug, Clone, Default)]
pub struct DefaultFetcher {
    git: GitFetcher,
}

impl DefaultFetcher {
    pub fn new(depth: u32) -> Self {
        Self {
            git: GitFetcher::new(depth),
        }
    }
}

#[async_trait]
impl RepositoryFetcher for DefaultFetcher {
    async fn fetch(&self, spec: &SourceSpec, branch: &str) -> Result<Checkout> {
        if spec.local_path.is_some() {
            LocalFetcher.fetch(spec, branch).await
        } else {
            self.git.fetch(spec, branch).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Source;
    use crate::sources::spec_for;

    #[tokio::test]
    async fn local_fetcher_serves_existing_directory() {
        let dir = TempDir::new().unwrap();
        let mut spec = spec_for(&Config::default(), Source::Core);
        spec.local_path = Some(dir.path().to_path_buf());

        let checkout = DefaultFetcher::default().fetch(&spec, "main").await.unwrap();
        assert_eq!(checkout.root(), dir.path());
    }

    #[tokio::test]
    async fn local_fetcher_rejects_missing_directory() {
        let dir = TempDir::new().unwrap();
        let mut spec = spec_for(&Config::default(), Source::Client);
        spec.local_path = Some(dir.path().join("missing"));

        let err = LocalFetcher.fetch(&spec, "main").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Fetch {
                origin: Source::Client,
                ..
            }
        ));
        assert!(!err.is_fatal());
    }
}
