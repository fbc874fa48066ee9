//! Core types and errors for the reconnaissance engine.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while auditing a repository.
#[derive(Error, Debug)]
pub enum ArtiscopeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid identifier '{input}': {reason}")]
    InvalidIdentifier { input: String, reason: String },

    #[error("Failed to read file at '{path}': {source}")]
    FilterFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache failure at '{path}': {source}")]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Must be 'true' or 'false' for cached '{key}', got '{value}'")]
    CorruptCacheValue { key: String, value: String },

    #[error("401 Unauthorized {0}")]
    Unauthorized(String),

    #[error("Rate limited by {url}: gave up after {attempts} attempts")]
    RateLimited { url: String, attempts: u32 },

    #[error("Unexpected status {status} from '{url}'")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Registry error for '{name}': {message}")]
    RegistryError { name: String, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unsupported package system '{given}', try one of {{{supported}}}")]
    UnsupportedPackageSystem { given: String, supported: String },

    #[error("This command only works by querying internal packages upstream, add `--query-upstream` if this is OK or don't use this command")]
    UpstreamNotAcknowledged,
}

impl ArtiscopeError {
    pub(crate) fn invalid_identifier(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArtiscopeError>;

/// Package ecosystems known to the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageSystem {
    Npm,
    Maven,
    Gradle,
    Pypi,
}

impl PackageSystem {
    /// Ecosystems the reconciliation commands can audit.
    pub const AUDITABLE: &'static [PackageSystem] = &[PackageSystem::Npm, PackageSystem::Pypi];

    pub fn alias(&self) -> &'static str {
        match self {
            PackageSystem::Npm => "npm",
            PackageSystem::Maven => "maven",
            PackageSystem::Gradle => "gradle",
            PackageSystem::Pypi => "pypi",
        }
    }

    /// Parse `raw` and check it against `supported`.
    ///
    /// Unknown and known-but-unsupported systems produce the same error, which
    /// lists the supported alternatives.
    pub fn require(raw: &str, supported: &[PackageSystem]) -> Result<PackageSystem> {
        match raw.parse::<PackageSystem>() {
            Ok(system) if supported.contains(&system) => Ok(system),
            _ => Err(Self::unsupported(raw, supported)),
        }
    }

    pub(crate) fn unsupported(given: &str, supported: &[PackageSystem]) -> ArtiscopeError {
        ArtiscopeError::UnsupportedPackageSystem {
            given: given.to_string(),
            supported: supported
                .iter()
                .map(|s| s.alias())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl FromStr for PackageSystem {
    type Err = ArtiscopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "npm" => Ok(PackageSystem::Npm),
            "maven" => Ok(PackageSystem::Maven),
            "gradle" => Ok(PackageSystem::Gradle),
            "pypi" => Ok(PackageSystem::Pypi),
            other => Err(PackageSystem::unsupported(other, PackageSystem::AUDITABLE)),
        }
    }
}

impl fmt::Display for PackageSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alias())
    }
}

/// Refuse to send internal names upstream unless the caller opted in.
pub fn require_upstream_ack(query_upstream: bool) -> Result<()> {
    if query_upstream {
        Ok(())
    } else {
        Err(ArtiscopeError::UpstreamNotAcknowledged)
    }
}

/// Username and password (or API key) for HTTP Basic auth.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Base URL of a registry plus optional credentials.
///
/// Anonymous connections are treated as third-party hosts and throttled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    prefix: String,
    credentials: Option<Credentials>,
}

impl ConnectionInfo {
    pub fn anonymous(prefix: impl Into<String>) -> Self {
        Self {
            prefix: trim_slash(prefix.into()),
            credentials: None,
        }
    }

    pub fn authenticated(
        prefix: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            prefix: trim_slash(prefix.into()),
            credentials: Some(Credentials {
                username: username.into(),
                password: password.into(),
            }),
        }
    }

    /// Same credentials, prefix extended with `suffix`.
    pub fn join(&self, suffix: &str) -> Self {
        Self {
            prefix: trim_slash(format!("{}{}", self.prefix, suffix)),
            credentials: self.credentials.clone(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.prefix, path)
    }
}

fn trim_slash(mut s: String) -> String {
    while s.ends_with('/') {
        s.pop();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_system_require() {
        assert_eq!(
            PackageSystem::require("npm", PackageSystem::AUDITABLE).unwrap(),
            PackageSystem::Npm
        );

        let err = PackageSystem::require("maven", PackageSystem::AUDITABLE).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported package system 'maven', try one of {npm, pypi}"
        );

        assert!(PackageSystem::require("cargo", PackageSystem::AUDITABLE).is_err());
    }

    #[test]
    fn test_upstream_ack() {
        assert!(require_upstream_ack(true).is_ok());
        assert!(matches!(
            require_upstream_ack(false),
            Err(ArtiscopeError::UpstreamNotAcknowledged)
        ));
    }

    #[test]
    fn test_connection_join_keeps_credentials() {
        let base = ConnectionInfo::authenticated("https://artifactory.example.com/", "ci", "key");
        let npm = base.join("/api/npm/npm-remote");
        assert_eq!(npm.prefix(), "https://artifactory.example.com/api/npm/npm-remote");
        assert_eq!(npm.credentials().unwrap().username, "ci");
        assert_eq!(npm.url("/lodash"), "https://artifactory.example.com/api/npm/npm-remote/lodash");
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let conn = ConnectionInfo::authenticated("https://a.example", "ci", "hunter2");
        let debug = format!("{:?}", conn);
        assert!(!debug.contains("hunter2"));
    }
}
