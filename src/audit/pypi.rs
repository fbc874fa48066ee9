//! PyPI reconciliations. PyPI has no scopes, filters match exact names.

use crate::audit::universe::{pypi_cache_universe, pypi_local_universe};
use crate::audit::{cache_intersection, probe_all, AuditOptions};
use crate::ident::{parse_filter_file, PyPiPackageIdentifier};
use crate::registry::{pypi_api, FolderListing, PyPiRegistry};
use crate::types::{ConnectionInfo, Result};
use indicatif::ProgressBar;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

pub struct PyPiAudit<L> {
    listing: L,
    registry: PyPiRegistry,
    artifactory: ConnectionInfo,
    options: AuditOptions,
    progress: ProgressBar,
}

impl<L: FolderListing> PyPiAudit<L> {
    pub fn new(
        listing: L,
        registry: PyPiRegistry,
        artifactory: ConnectionInfo,
        options: AuditOptions,
    ) -> Self {
        Self {
            listing,
            registry,
            artifactory,
            options,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub async fn exclude_candidates(
        &self,
        local: &str,
        trusted: Option<&Path>,
        excluded: Option<&Path>,
    ) -> Result<Vec<PyPiPackageIdentifier>> {
        let exclude = load_names(trusted.into_iter().chain(excluded))?;

        let candidates: Vec<PyPiPackageIdentifier> = pypi_local_universe(&self.listing, local)
            .await?
            .into_iter()
            .filter(|id| !exclude.contains(id))
            .collect();
        info!("{} exclude candidates in {}", candidates.len(), local);
        Ok(candidates)
    }

    pub async fn cached(&self, local: &str, remote: &str) -> Result<Vec<PyPiPackageIdentifier>> {
        let local_packages = pypi_local_universe(&self.listing, local).await?;
        let cached = pypi_cache_universe(&self.listing, remote).await?;
        Ok(cache_intersection(local_packages, &cached))
    }

    /// Local packages that exist upstream but do not resolve through
    /// `remote`, sorted.
    pub async fn inferred_exclude(&self, local: &str, remote: &str) -> Result<Vec<PyPiPackageIdentifier>> {
        let local_packages = pypi_local_universe(&self.listing, local).await?;

        let upstream = probe_all(
            &local_packages,
            self.options.upstream_concurrency,
            &self.progress,
            |id| async move { self.registry.exists_upstream(&id).await },
        )
        .await?;

        let candidates: Vec<PyPiPackageIdentifier> = local_packages
            .into_iter()
            .filter(|id| upstream.contains(id))
            .collect();

        let remote_api = pypi_api(&self.artifactory, remote);
        let resolvable = probe_all(
            &candidates,
            self.options.concurrency,
            &self.progress,
            |id| {
                let remote_api = &remote_api;
                async move { self.registry.package_exists(remote_api, &id).await }
            },
        )
        .await?;
        self.progress.finish_and_clear();

        let mut result: Vec<PyPiPackageIdentifier> = candidates
            .into_iter()
            .filter(|id| !resolvable.contains(id))
            .collect();
        result.sort();

        info!("{} inferred exclusions for {} via {}", result.len(), local, remote);
        Ok(result)
    }

    /// Local packages, minus `excluded`, that do not exist upstream.
    pub async fn not_claimed(&self, local: &str, excluded: Option<&Path>) -> Result<Vec<PyPiPackageIdentifier>> {
        let exclude = load_names(excluded)?;
        let local_packages: Vec<PyPiPackageIdentifier> = pypi_local_universe(&self.listing, local)
            .await?
            .into_iter()
            .filter(|id| !exclude.contains(id))
            .collect();

        let upstream = probe_all(
            &local_packages,
            self.options.upstream_concurrency,
            &self.progress,
            |id| async move { self.registry.exists_upstream(&id).await },
        )
        .await?;
        self.progress.finish_and_clear();

        let result: Vec<PyPiPackageIdentifier> = local_packages
            .into_iter()
            .filter(|id| !upstream.contains(id))
            .collect();

        info!("{} unclaimed names in {}", result.len(), local);
        Ok(result)
    }
}

fn load_names<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<HashSet<PyPiPackageIdentifier>> {
    let mut names = HashSet::new();
    for path in paths {
        names.extend(parse_filter_file::<PyPiPackageIdentifier>(path)?);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::universe::tests::StaticListing;
    use crate::cache::{ExistenceOracle, MemoryCache, CACHE_TTL};
    use crate::registry::{HttpProbe, RetryPolicy};
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LOCAL: &str = "pypi-local";

    fn audit(listing: StaticListing, server: &MockServer) -> PyPiAudit<StaticListing> {
        let http = HttpProbe::new(10, RetryPolicy::new(3, Duration::ZERO))
            .unwrap()
            .with_politeness(None);
        let registry = PyPiRegistry::with_upstream(
            Arc::new(http),
            ExistenceOracle::new(Arc::new(MemoryCache::new(CACHE_TTL))),
            ConnectionInfo::anonymous(format!("{}/upstream", server.uri())),
        );
        PyPiAudit::new(
            listing,
            registry,
            ConnectionInfo::authenticated(format!("{}/artifactory", server.uri()), "ci", "token"),
            AuditOptions::default(),
        )
    }

    async fn respond(server: &MockServer, at: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(server)
            .await;
    }

    fn local(pages: &[&str]) -> StaticListing {
        StaticListing::default().with(LOCAL, "/.pypi/", pages)
    }

    fn names(ids: &[PyPiPackageIdentifier]) -> Vec<&str> {
        ids.iter().map(|id| id.name()).collect()
    }

    #[tokio::test]
    async fn test_exclude_candidates_exact_match() {
        let server = MockServer::start().await;
        let mut trusted = NamedTempFile::new().unwrap();
        writeln!(trusted, "requests\n\n# mirrored on purpose\nacme").unwrap();

        let result = audit(local(&["/simple.html", "/requests.html", "/acme-core.html", "/acme.html"]), &server)
            .exclude_candidates(LOCAL, Some(trusted.path()), None)
            .await
            .unwrap();
        assert_eq!(names(&result), vec!["acme-core"]);
    }

    #[tokio::test]
    async fn test_cached() {
        let server = MockServer::start().await;
        let listing = local(&["/a.html", "/b.html", "/c.html"])
            .with("pypi-cache", "/.pypi/", &["/simple.html", "/c.html", "/b.html", "/d.html"]);

        let result = audit(listing, &server).cached(LOCAL, "pypi").await.unwrap();
        assert_eq!(names(&result), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_inferred_exclude() {
        let server = MockServer::start().await;
        respond(&server, "/upstream/simple/b/", 200).await;
        respond(&server, "/upstream/simple/a/", 200).await;
        respond(&server, "/upstream/simple/c/", 404).await;
        respond(&server, "/artifactory/api/pypi/pypi/simple/a/", 404).await;
        respond(&server, "/artifactory/api/pypi/pypi/simple/b/", 200).await;

        let result = audit(local(&["/c.html", "/b.html", "/a.html"]), &server)
            .inferred_exclude(LOCAL, "pypi")
            .await
            .unwrap();
        assert_eq!(names(&result), vec!["a"]);
    }

    #[tokio::test]
    async fn test_not_claimed() {
        let server = MockServer::start().await;
        respond(&server, "/upstream/simple/requests/", 200).await;
        respond(&server, "/upstream/simple/acme-core/", 404).await;
        let mut excluded = NamedTempFile::new().unwrap();
        writeln!(excluded, "acme-legacy").unwrap();

        let result = audit(
            local(&["/requests.html", "/acme-core.html", "/acme-legacy.html"]),
            &server,
        )
        .not_claimed(LOCAL, Some(excluded.path()))
        .await
        .unwrap();
        assert_eq!(names(&result), vec!["acme-core"]);
    }
}
