//! TOML configuration.
//!
//! Every field has a default, so the tool runs without a config file:
//!
//! ```toml
//! [db]
//! path = "./data/airflow-docs.db"
//!
//! [index]
//! branch = "main"
//! depth = 1
//!
//! [retrieval]
//! default_limit = 10
//! max_limit = 50
//! title_weight = 5.0
//! description_weight = 2.0
//! content_weight = 1.0
//! snippet_tokens = 32
//!
//! [server]
//! bind = "127.0.0.1:7331"
//!
//! [sources.airflow-core]
//! local_path = "/src/airflow/docs/apache-airflow"
//! exclude = ["_api/**"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::Source;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Per-source overrides keyed by identifier (or alias).
    #[serde(default)]
    pub sources: BTreeMap<Source, SourceOverride>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/airflow-docs.db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Branch or ref fetched when `--branch` is not given.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// History depth of the shallow fetch.
    #[serde(default = "default_depth")]
    pub depth: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            depth: default_depth(),
        }
    }
}

fn default_branch() -> String {
    "main".to_string()
}
fn default_depth() -> u32 {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
    #[serde(default = "default_title_weight")]
    pub title_weight: f64,
    #[serde(default = "default_description_weight")]
    pub description_weight: f64,
    #[serde(default = "default_content_weight")]
    pub content_weight: f64,
    /// Approximate number of tokens in a result snippet.
    #[serde(default = "default_snippet_tokens")]
    pub snippet_tokens: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            title_weight: default_title_weight(),
            description_weight: default_description_weight(),
            content_weight: default_content_weight(),
            snippet_tokens: default_snippet_tokens(),
        }
    }
}

impl RetrievalConfig {
    /// Clamp a caller-supplied limit to `1..=max_limit`, using the default
    /// when absent.
    pub fn clamp_limit(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit)
    }
}

fn default_limit() -> i64 {
    10
}
fn default_max_limit() -> i64 {
    50
}
fn default_title_weight() -> f64 {
    5.0
}
fn default_description_weight() -> f64 {
    2.0
}
fn default_content_weight() -> f64 {
    1.0
}
fn default_snippet_tokens() -> i64 {
    32
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7331".to_string()
}

/// Optional replacements for a registry row.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourceOverride {
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub subtree: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Read an existing checkout of the subtree instead of fetching.
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Load `path` if given, otherwise use the defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None => Ok(Config::default()),
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }

    if config.index.branch.trim().is_empty() {
        anyhow::bail!("index.branch must not be empty");
    }
    if config.index.depth == 0 {
        anyhow::bail!("index.depth must be >= 1");
    }

    let r = &config.retrieval;
    if r.max_limit < 1 {
        anyhow::bail!("retrieval.max_limit must be >= 1");
    }
    if !(1..=r.max_limit).contains(&r.default_limit) {
        anyhow::bail!(
            "retrieval.default_limit must be in [1, {}] (retrieval.max_limit)",
            r.max_limit
        );
    }
    for (name, weight) in [
        ("title_weight", r.title_weight),
        ("description_weight", r.description_weight),
        ("content_weight", r.content_weight),
    ] {
        if !weight.is_finite() || weight < 0.0 {
            anyhow::bail!("retrieval.{} must be a non-negative number", name);
        }
    }
    if !(1..=64).contains(&r.snippet_tokens) {
        anyhow::bail!("retrieval.snippet_tokens must be in [1, 64]");
    }

    for (source, o) in &config.sources {
        if let Some(subtree) = &o.subtree {
            if subtree.starts_with('/') || subtree.split('/').any(|p| p == "..") {
                anyhow::bail!(
                    "sources.{}.subtree must be a relative path inside the repository",
                    source
                );
            }
        }
        for pattern in &o.exclude {
            globset::Glob::new(pattern).with_context(|| {
                format!("sources.{}.exclude: invalid glob '{}'", source, pattern)
            })?;
        }
    }

    Ok(())
}
