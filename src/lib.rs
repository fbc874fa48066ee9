//! artiscope - dependency confusion reconnaissance for Artifactory.
//!
//! This library audits which npm and PyPI packages an organization's
//! Artifactory hosts and reconciles them against the public registries:
//! - Lists local and remote-cache repositories through the storage API
//! - Probes npm, the npm website and PyPI for existence, caching every
//!   answer on disk for seven days
//! - Computes exclude candidates, cached packages, inferred exclusions and
//!   names nobody has claimed upstream
//!
//! # Example
//!
//! ```no_run
//! use artiscope::cache::{DiskCache, ExistenceOracle, CACHE_TTL};
//! use artiscope::ident::NpmPackageIdentifier;
//! use artiscope::registry::{HttpProbe, NpmRegistry, RetryPolicy};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> artiscope::Result<()> {
//!     let http = Arc::new(HttpProbe::new(30, RetryPolicy::default())?);
//!     let oracle = ExistenceOracle::new(Arc::new(DiskCache::new("/tmp/artiscope", CACHE_TTL)));
//!     let npm = NpmRegistry::new(http, oracle);
//!
//!     let id: NpmPackageIdentifier = "left-pad".parse()?;
//!     println!("left-pad exists: {}", npm.exists_upstream(&id).await?);
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod audit;
pub mod cache;
pub mod config;
pub mod ident;
pub mod output;
pub mod registry;
pub mod types;

pub use config::{ArtifactoryConfig, Commands, Config};
pub use output::{ConsoleOutput, Report};
pub use types::{
    require_upstream_ack, ArtiscopeError, ConnectionInfo, Credentials, PackageSystem, Result,
};
