//! Trusted/excluded filter lists.

use crate::ident::{NpmPackageIdentifier, NpmPackageOrScope, PackageIdentifier};
use crate::types::{ArtiscopeError, Result};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Read one token per line, skipping blank lines and `#` comments.
pub fn read_filter_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|source| ArtiscopeError::FilterFile {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Parse every token in a filter file. The first malformed token aborts.
pub fn parse_filter_file<T>(path: &Path) -> Result<Vec<T>>
where
    T: FromStr<Err = ArtiscopeError>,
{
    read_filter_lines(path)?
        .iter()
        .map(|line| line.parse())
        .collect()
}

/// npm filter list partitioned into scope-only, package-only and scoped entries.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    scopes: HashSet<String>,
    packages: HashSet<String>,
    scoped: HashSet<(String, String)>,
}

impl ExclusionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from the union of the given files.
    pub fn from_files<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<Self> {
        let mut filter = Self::new();
        for path in paths {
            let entries: Vec<NpmPackageOrScope> = parse_filter_file(path)?;
            debug!("Loaded {} filter entries from {:?}", entries.len(), path);
            filter.extend(entries);
        }
        Ok(filter)
    }

    pub fn insert(&mut self, entry: NpmPackageOrScope) {
        match entry {
            NpmPackageOrScope::Scope { scope } => {
                self.scopes.insert(scope);
            }
            NpmPackageOrScope::Package { name } => {
                self.packages.insert(name);
            }
            NpmPackageOrScope::Scoped { scope, name } => {
                self.scoped.insert((scope, name));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty() && self.packages.is_empty() && self.scoped.is_empty()
    }

    /// Whether `id` is covered by this filter.
    ///
    /// Scoped identifiers never match package-only entries.
    pub fn matches(&self, id: &NpmPackageIdentifier) -> bool {
        match id.scope() {
            Some(scope) => {
                self.scopes.contains(scope)
                    || self
                        .scoped
                        .contains(&(scope.to_string(), id.name().to_string()))
            }
            None => self.packages.contains(id.name()),
        }
    }

    /// Keep only identifiers the filter does not match, preserving order.
    pub fn apply(&self, ids: Vec<NpmPackageIdentifier>) -> Vec<NpmPackageIdentifier> {
        if self.is_empty() {
            return ids;
        }
        ids.into_iter().filter(|id| !self.matches(id)).collect()
    }
}

impl Extend<NpmPackageOrScope> for ExclusionFilter {
    fn extend<I: IntoIterator<Item = NpmPackageOrScope>>(&mut self, iter: I) {
        for entry in iter {
            self.insert(entry);
        }
    }
}

impl FromIterator<NpmPackageOrScope> for ExclusionFilter {
    fn from_iter<I: IntoIterator<Item = NpmPackageOrScope>>(iter: I) -> Self {
        let mut filter = Self::new();
        filter.extend(iter);
        filter
    }
}
