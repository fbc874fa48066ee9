//! Command-line and Artifactory configuration.

use crate::audit::AuditOptions;
use crate::cache::CacheCategory;
use crate::registry::RetryPolicy;
use crate::types::{ArtiscopeError, ConnectionInfo, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the per-user directory under `$HOME`.
pub const CONFIG_DIR_NAME: &str = ".artiscope";

/// Config file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "artiscope.config";

pub const ENV_ARTIFACTORY_URL: &str = "ARTISCOPE_ARTIFACTORY_URL";
pub const ENV_ARTIFACTORY_USERNAME: &str = "ARTISCOPE_ARTIFACTORY_USERNAME";
pub const ENV_ARTIFACTORY_PASSWORD: &str = "ARTISCOPE_ARTIFACTORY_PASSWORD";

/// Dependency confusion reconnaissance for Artifactory-hosted npm and PyPI packages.
#[derive(Parser, Debug, Clone)]
#[command(name = "artiscope")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file (defaults to ~/.artiscope/artiscope.config)
    #[arg(long, global = true, env = "ARTISCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Concurrent probes against Artifactory
    #[arg(long, global = true, default_value = "8")]
    pub concurrency: usize,

    /// Concurrent probes against public registries
    #[arg(long, global = true, default_value = "4")]
    pub upstream_concurrency: usize,

    /// Attempts per request while rate limited (HTTP 429)
    #[arg(long, global = true, env = "ARTISCOPE_RETRIES", default_value = "5")]
    pub retries: u32,

    /// Seconds to wait between rate-limited attempts
    #[arg(long, global = true, env = "ARTISCOPE_RETRY_PAUSE", default_value = "2")]
    pub retry_pause: u64,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value = "30")]
    pub timeout: u64,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_secs(self.retry_pause))
    }

    pub fn audit_options(&self) -> AuditOptions {
        AuditOptions {
            concurrency: self.concurrency.max(1),
            upstream_concurrency: self.upstream_concurrency.max(1),
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Local packages not covered by the trusted or excluded lists
    ExcludeCandidates(ExcludeCandidatesArgs),
    /// Local packages the remote has already fetched from upstream
    Cached(CachedArgs),
    /// Local packages that exist upstream but do not resolve through the remote
    InferredExclude(InferredExcludeArgs),
    /// Local names and scopes nobody has claimed upstream
    NotClaimed(NotClaimedArgs),
    /// Show an upstream npm package
    NpmInfo(NpmInfoArgs),
    /// Search the upstream npm registry
    NpmSearch(NpmSearchArgs),
    /// Remove cached registry answers
    CacheClear(CacheClearArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::ExcludeCandidates(_) => "exclude-candidates",
            Commands::Cached(_) => "cached",
            Commands::InferredExclude(_) => "inferred-exclude",
            Commands::NotClaimed(_) => "not-claimed",
            Commands::NpmInfo(_) => "npm-info",
            Commands::NpmSearch(_) => "npm-search",
            Commands::CacheClear(_) => "cache-clear",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ExcludeCandidatesArgs {
    /// Package system: npm or pypi
    #[arg(short = 'p', long)]
    pub package_system: String,

    /// Local repository name
    #[arg(long)]
    pub local: String,

    /// File of trusted names, one per line
    #[arg(long)]
    pub trusted: Option<PathBuf>,

    /// File of excluded names, one per line
    #[arg(long)]
    pub excluded: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CachedArgs {
    /// Package system: npm or pypi
    #[arg(short = 'p', long)]
    pub package_system: String,

    /// Local repository name
    #[arg(long)]
    pub local: String,

    /// Remote repository name (its cache is `<remote>-cache`)
    #[arg(long)]
    pub remote: String,
}

#[derive(Args, Debug, Clone)]
pub struct InferredExcludeArgs {
    /// Package system: npm or pypi
    #[arg(short = 'p', long)]
    pub package_system: String,

    /// Local repository name
    #[arg(long)]
    pub local: String,

    /// Remote repository name
    #[arg(long)]
    pub remote: String,

    /// Allow sending local package names to the public registry
    #[arg(long)]
    pub query_upstream: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NotClaimedArgs {
    /// Package system: npm or pypi
    #[arg(short = 'p', long)]
    pub package_system: String,

    /// Local repository name
    #[arg(long)]
    pub local: String,

    /// File of excluded names, one per line
    #[arg(long)]
    pub excluded: Option<PathBuf>,

    /// Allow sending local package names to the public registry
    #[arg(long)]
    pub query_upstream: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NpmInfoArgs {
    /// Package, e.g. `lodash` or `@babel/core`
    #[arg(long)]
    pub package: String,

    /// Allow sending the package name to the public registry
    #[arg(long)]
    pub query_upstream: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NpmSearchArgs {
    /// Search text
    #[arg(long)]
    pub text: String,

    /// Maximum number of hits
    #[arg(long, default_value = "20")]
    pub size: u32,

    /// Allow sending the search text to the public registry
    #[arg(long)]
    pub query_upstream: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CacheClearArgs {
    /// Only entries for this registry prefix, e.g. https://registry.npmjs.org
    #[arg(long)]
    pub registry: Option<String>,

    /// Only this entry (requires --registry and --key)
    #[arg(long, value_enum, requires = "registry", requires = "key")]
    pub category: Option<CacheCategory>,

    /// Cached key, e.g. a canonical package name
    #[arg(long, requires = "category")]
    pub key: Option<String>,
}

/// `~/.artiscope`
pub fn config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or_else(|| ArtiscopeError::ConfigError("Could not determine home directory".to_string()))
}

/// `~/.artiscope/cache`
pub fn cache_dir() -> Result<PathBuf> {
    Ok(config_dir()?.join("cache"))
}

/// On-disk config file. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    artifactory_url: Option<String>,
    artifactory_username: Option<String>,
    artifactory_password: Option<String>,
}

impl ConfigFile {
    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ArtiscopeError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ArtiscopeError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }
}

/// Where and how to reach the organization's Artifactory.
#[derive(Clone, PartialEq, Eq)]
pub struct ArtifactoryConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for ArtifactoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactoryConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl ArtifactoryConfig {
    /// Resolve from `explicit` (must exist) or the default config file (may
    /// be absent), with the process environment taking precedence.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let file = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let default = config_dir()?.join(CONFIG_FILE_NAME);
                default.exists().then_some(default)
            }
        };
        Self::resolve(file.as_deref(), |key| std::env::var(key).ok())
    }

    /// Resolve from an optional config file and an environment lookup.
    pub fn resolve(file: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let from_file = match file {
            Some(path) => ConfigFile::read(path)?,
            None => ConfigFile::default(),
        };
        let source = file
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| format!("~/{}/{}", CONFIG_DIR_NAME, CONFIG_FILE_NAME));

        let pick = |env_key: &str, file_key: &str, file_value: Option<String>| -> Result<String> {
            env(env_key)
                .filter(|v| !v.is_empty())
                .or(file_value.filter(|v| !v.is_empty()))
                .ok_or_else(|| {
                    ArtiscopeError::ConfigError(format!(
                        "'{}' is not set, add it to {} or set {}",
                        file_key, source, env_key
                    ))
                })
        };

        let url = pick(ENV_ARTIFACTORY_URL, "artifactoryUrl", from_file.artifactory_url)?;
        let username = pick(
            ENV_ARTIFACTORY_USERNAME,
            "artifactoryUsername",
            from_file.artifactory_username,
        )?;
        let password = pick(
            ENV_ARTIFACTORY_PASSWORD,
            "artifactoryPassword",
            from_file.artifactory_password,
        )?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            username,
            password,
        })
    }

    pub fn connection(&self) -> ConnectionInfo {
        ConnectionInfo::authenticated(&self.url, &self.username, &self.password)
    }
}
