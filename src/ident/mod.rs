//! Package identifiers for the supported ecosystems.
//!
//! npm names carry an optional scope (`@scope/name`), PyPI names are flat.
//! Both implement [`PackageIdentifier`] so universes and set operations can be
//! written once.

pub mod filter;
pub mod npm;
pub mod pypi;

pub use filter::{parse_filter_file, read_filter_lines, ExclusionFilter};
pub use npm::{NpmPackageIdentifier, NpmPackageOrScope};
pub use pypi::PyPiPackageIdentifier;

use std::fmt::Display;
use std::hash::Hash;

/// An identifier with a canonical string form and structural equality.
pub trait PackageIdentifier:
    Clone + Eq + Hash + Ord + Display + Send + Sync + 'static
{
    /// Scope the identifier lives in, if the ecosystem has scopes.
    fn scope(&self) -> Option<&str>;

    /// Canonical string, the form used as cache key and in registry paths.
    fn canonical(&self) -> String {
        self.to_string()
    }
}
