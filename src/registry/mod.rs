//! Registry clients.
//!
//! Everything goes through one [`HttpProbe`]: internal Artifactory requests
//! carry Basic auth, public registries are throttled per host, and 429s are
//! retried according to a [`RetryPolicy`]. Existence answers are cached by the
//! [`ExistenceOracle`](crate::cache::ExistenceOracle).

pub mod artifactory;
pub mod http;
pub mod npm;
pub mod pypi;
pub mod retry;

pub use artifactory::{npm_api, pypi_api, ArtifactoryClient, FolderListing};
pub use http::HttpProbe;
pub use npm::{NpmPackageInfo, NpmRegistry, NpmRelease, NpmSearchHit};
pub use pypi::PyPiRegistry;
pub use retry::RetryPolicy;
