//! Package universes read from Artifactory folder listings.

use crate::ident::{NpmPackageIdentifier, PyPiPackageIdentifier};
use crate::registry::FolderListing;
use crate::types::{ArtiscopeError, Result};
use tracing::{debug, info};

/// npm metadata namespace of a local repository.
pub const NPM_LOCAL_ROOT: &str = "/.npm/";

/// Root of a remote repository's npm cache.
pub const NPM_CACHE_ROOT: &str = "/";

/// PyPI namespace of local and cache repositories.
pub const PYPI_ROOT: &str = "/.pypi/";

/// The simple index page itself, not a package.
const PYPI_INDEX_PAGE: &str = "simple";

/// Repository holding what the remote `remote` has fetched so far.
pub fn cache_repository(remote: &str) -> String {
    format!("{}-cache", remote)
}

/// Packages under `root` of `repository`. Each `@scope` entry is listed
/// from the repository root, where its package folders live; other
/// dot-prefixed entries are skipped.
pub async fn npm_universe<L: FolderListing>(
    listing: &L,
    repository: &str,
    root: &str,
) -> Result<Vec<NpmPackageIdentifier>> {
    info!("Listing npm packages in {}{}", repository, root);

    let mut ids = Vec::new();
    for child in listing.list_folder(repository, root).await? {
        let entry = child.trim_start_matches('/');

        if let Some(scope) = entry.strip_prefix('@') {
            if scope.is_empty() {
                continue;
            }
            let scope_path = format!("/{}", entry);
            for package in listing.list_folder(repository, &scope_path).await? {
                let name = package.trim_start_matches('/');
                if !name.is_empty() {
                    ids.push(NpmPackageIdentifier::scoped(scope, name));
                }
            }
        } else if entry.is_empty() || entry.starts_with('.') {
            debug!("Skipping {}{}", repository, child);
        } else {
            ids.push(NpmPackageIdentifier::unscoped(entry));
        }
    }

    debug!("{} npm packages in {}", ids.len(), repository);
    Ok(ids)
}

pub async fn npm_local_universe<L: FolderListing>(
    listing: &L,
    local: &str,
) -> Result<Vec<NpmPackageIdentifier>> {
    npm_universe(listing, local, NPM_LOCAL_ROOT).await
}

pub async fn npm_cache_universe<L: FolderListing>(
    listing: &L,
    remote: &str,
) -> Result<Vec<NpmPackageIdentifier>> {
    npm_universe(listing, &cache_repository(remote), NPM_CACHE_ROOT).await
}

/// Packages with a `<name>.html` page under `/.pypi/` of `repository`.
pub async fn pypi_universe<L: FolderListing>(
    listing: &L,
    repository: &str,
) -> Result<Vec<PyPiPackageIdentifier>> {
    info!("Listing PyPI packages in {}{}", repository, PYPI_ROOT);

    let mut ids = Vec::new();
    for child in listing.list_folder(repository, PYPI_ROOT).await? {
        let raw = child.trim_start_matches('/');
        let decoded = urlencoding::decode(raw)
            .map_err(|e| ArtiscopeError::invalid_identifier(raw, e.to_string()))?;
        let name = decoded.strip_suffix(".html").unwrap_or(decoded.as_ref());

        if name.is_empty() || name == PYPI_INDEX_PAGE {
            continue;
        }
        ids.push(name.parse()?);
    }

    debug!("{} PyPI packages in {}", ids.len(), repository);
    Ok(ids)
}

pub async fn pypi_local_universe<L: FolderListing>(
    listing: &L,
    local: &str,
) -> Result<Vec<PyPiPackageIdentifier>> {
    pypi_universe(listing, local).await
}

pub async fn pypi_cache_universe<L: FolderListing>(
    listing: &L,
    remote: &str,
) -> Result<Vec<PyPiPackageIdentifier>> {
    pypi_universe(listing, &cache_repository(remote)).await
}
