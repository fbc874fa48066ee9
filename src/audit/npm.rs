//! npm reconciliations.

use crate::audit::universe::{npm_cache_universe, npm_local_universe};
use crate::audit::{cache_intersection, probe_all, AuditOptions};
use crate::ident::{ExclusionFilter, NpmPackageIdentifier, NpmPackageOrScope, PackageIdentifier};
use crate::registry::{npm_api, FolderListing, NpmRegistry};
use crate::types::{ConnectionInfo, Result};
use indicatif::ProgressBar;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

pub struct NpmAudit<L> {
    listing: L,
    registry: NpmRegistry,
    artifactory: ConnectionInfo,
    options: AuditOptions,
    progress: ProgressBar,
}

impl<L: FolderListing> NpmAudit<L> {
    pub fn new(
        listing: L,
        registry: NpmRegistry,
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

    /// Report probe progress on `progress`.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Local packages not covered by the trusted or excluded lists.
    pub async fn exclude_candidates(
        &self,
        local: &str,
        trusted: Option<&Path>,
        excluded: Option<&Path>,
    ) -> Result<Vec<NpmPackageIdentifier>> {
        // Bad filter files fail before anything is fetched
        let filter = ExclusionFilter::from_files(trusted.into_iter().chain(excluded))?;

        let candidates = filter.apply(npm_local_universe(&self.listing, local).await?);
        info!("{} exclude candidates in {}", candidates.len(), local);
        Ok(candidates)
    }

    /// Local packages the remote has already fetched from upstream.
    pub async fn cached(&self, local: &str, remote: &str) -> Result<Vec<NpmPackageIdentifier>> {
        let local_packages = npm_local_universe(&self.listing, local).await?;
        let cached = npm_cache_universe(&self.listing, remote).await?;
        Ok(cache_intersection(local_packages, &cached))
    }

    /// Unscoped local packages that exist upstream but do not resolve
    /// through `remote`, sorted.
    ///
    /// Scoped names are never sent upstream here.
    pub async fn inferred_exclude(&self, local: &str, remote: &str) -> Result<Vec<NpmPackageIdentifier>> {
        let unscoped: Vec<NpmPackageIdentifier> = npm_local_universe(&self.listing, local)
            .await?
            .into_iter()
            .filter(|id| id.scope().is_none())
            .collect();

        let upstream = probe_all(
            &unscoped,
            self.options.upstream_concurrency,
            &self.progress,
            |id| async move { self.registry.exists_upstream(&id).await },
        )
        .await?;

        let candidates: Vec<NpmPackageIdentifier> = unscoped
            .into_iter()
            .filter(|id| upstream.contains(id))
            .collect();

        let remote_api = npm_api(&self.artifactory, remote);
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

        let mut result: Vec<NpmPackageIdentifier> = candidates
            .into_iter()
            .filter(|id| !resolvable.contains(id))
            .collect();
        result.sort();

        info!("{} inferred exclusions for {} via {}", result.len(), local, remote);
        Ok(result)
    }

    /// Local names nobody has claimed upstream: unscoped packages missing
    /// from the registry, in local order, then unclaimed scopes, sorted.
    pub async fn not_claimed(&self, local: &str, excluded: Option<&Path>) -> Result<Vec<NpmPackageOrScope>> {
        let filter = ExclusionFilter::from_files(excluded)?;
        let local_packages = filter.apply(npm_local_universe(&self.listing, local).await?);

        let unscoped: Vec<NpmPackageIdentifier> = local_packages
            .iter()
            .filter(|id| id.scope().is_none())
            .cloned()
            .collect();
        let scopes: Vec<String> = local_packages
            .iter()
            .filter_map(|id| id.scope().map(str::to_string))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let upstream = probe_all(
            &unscoped,
            self.options.upstream_concurrency,
            &self.progress,
            |id| async move { self.registry.exists_upstream(&id).await },
        )
        .await?;

        let claimed_scopes = probe_all(
            &scopes,
            self.options.upstream_concurrency,
            &self.progress,
            |scope| async move { self.registry.scope_claimed(&scope).await },
        )
        .await?;
        self.progress.finish_and_clear();

        let mut result: Vec<NpmPackageOrScope> = unscoped
            .iter()
            .filter(|id| !upstream.contains(*id))
            .map(NpmPackageOrScope::from)
            .collect();
        result.extend(
            scopes
                .into_iter()
                .filter(|scope| !claimed_scopes.contains(scope))
                .map(|scope| NpmPackageOrScope::Scope { scope }),
        );

        info!("{} unclaimed names in {}", result.len(), local);
        Ok(result)
    }
}
