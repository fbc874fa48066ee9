//! Command dispatch.
//!
//! Every check that can fail without touching the network (package system,
//! upstream acknowledgement, identifiers, configuration) runs before the
//! first request.

use crate::audit::{AuditOptions, NpmAudit, PyPiAudit};
use crate::cache::{CacheKey, CacheStore, DiskCache, ExistenceOracle, CACHE_TTL};
use crate::config::{cache_dir, ArtifactoryConfig, CacheClearArgs, Commands, Config};
use crate::ident::NpmPackageIdentifier;
use crate::output::{ConsoleOutput, Report};
use crate::registry::{ArtifactoryClient, HttpProbe, NpmRegistry, PyPiRegistry};
use crate::types::{require_upstream_ack, PackageSystem, Result};
use indicatif::ProgressBar;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Run the selected command.
pub async fn run(config: &Config, console: &ConsoleOutput) -> Result<Report> {
    info!("Running {}", config.command.name());

    match &config.command {
        Commands::ExcludeCandidates(args) => {
            let system = PackageSystem::require(&args.package_system, PackageSystem::AUDITABLE)?;
            let auditor = Services::new(config)?.auditor(system, config, console)?;
            auditor
                .exclude_candidates(&args.local, args.trusted.as_deref(), args.excluded.as_deref())
                .await
        }
        Commands::Cached(args) => {
            let system = PackageSystem::require(&args.package_system, PackageSystem::AUDITABLE)?;
            let auditor = Services::new(config)?.auditor(system, config, console)?;
            auditor.cached(&args.local, &args.remote).await
        }
        Commands::InferredExclude(args) => {
            let system = PackageSystem::require(&args.package_system, PackageSystem::AUDITABLE)?;
            require_upstream_ack(args.query_upstream)?;
            let auditor = Services::new(config)?.auditor(system, config, console)?;
            auditor.inferred_exclude(&args.local, &args.remote).await
        }
        Commands::NotClaimed(args) => {
            let system = PackageSystem::require(&args.package_system, PackageSystem::AUDITABLE)?;
            require_upstream_ack(args.query_upstream)?;
            let auditor = Services::new(config)?.auditor(system, config, console)?;
            auditor.not_claimed(&args.local, args.excluded.as_deref()).await
        }
        Commands::NpmInfo(args) => {
            require_upstream_ack(args.query_upstream)?;
            let id: NpmPackageIdentifier = args.package.parse()?;
            let info = Services::new(config)?.npm().package_info(&id).await?;
            Ok(Report::Info(info))
        }
        Commands::NpmSearch(args) => {
            require_upstream_ack(args.query_upstream)?;
            let hits = Services::new(config)?.npm().search(&args.text, args.size).await?;
            Ok(Report::Search(hits))
        }
        Commands::CacheClear(args) => clear_cache(&DiskCache::new(cache_dir()?, CACHE_TTL), args),
    }
}

/// Shared HTTP client and answer cache for one invocation.
struct Services {
    http: Arc<HttpProbe>,
    oracle: ExistenceOracle,
}

impl Services {
    fn new(config: &Config) -> Result<Self> {
        let http = HttpProbe::new(config.timeout, config.retry_policy())?;
        let cache = DiskCache::new(cache_dir()?, CACHE_TTL);
        debug!("Using cache at {:?}", cache.root());

        Ok(Self {
            http: Arc::new(http),
            oracle: ExistenceOracle::new(Arc::new(cache)),
        })
    }

    fn npm(&self) -> NpmRegistry {
        NpmRegistry::new(self.http.clone(), self.oracle.clone())
    }

    fn pypi(&self) -> PyPiRegistry {
        PyPiRegistry::new(self.http.clone(), self.oracle.clone())
    }

    fn auditor(&self, system: PackageSystem, config: &Config, console: &ConsoleOutput) -> Result<Auditor> {
        let artifactory = ArtifactoryConfig::load(config.config.as_deref())?.connection();
        let listing = ArtifactoryClient::new(self.http.clone(), artifactory.clone());
        let options: AuditOptions = config.audit_options();
        let progress: ProgressBar = console.create_progress_bar("probing");

        match system {
            PackageSystem::Npm => Ok(Auditor::Npm(
                NpmAudit::new(listing, self.npm(), artifactory, options).with_progress(progress),
            )),
            PackageSystem::Pypi => Ok(Auditor::PyPi(
                PyPiAudit::new(listing, self.pypi(), artifactory, options).with_progress(progress),
            )),
            other => Err(PackageSystem::unsupported(other.alias(), PackageSystem::AUDITABLE)),
        }
    }
}

/// Audit for one of the auditable package systems.
enum Auditor {
    Npm(NpmAudit<ArtifactoryClient>),
    PyPi(PyPiAudit<ArtifactoryClient>),
}

impl Auditor {
    async fn exclude_candidates(
        &self,
        local: &str,
        trusted: Option<&Path>,
        excluded: Option<&Path>,
    ) -> Result<Report> {
        Ok(match self {
            Auditor::Npm(audit) => Report::Npm(audit.exclude_candidates(local, trusted, excluded).await?),
            Auditor::PyPi(audit) => Report::PyPi(audit.exclude_candidates(local, trusted, excluded).await?),
        })
    }

    async fn cached(&self, local: &str, remote: &str) -> Result<Report> {
        Ok(match self {
            Auditor::Npm(audit) => Report::Npm(audit.cached(local, remote).await?),
            Auditor::PyPi(audit) => Report::PyPi(audit.cached(local, remote).await?),
        })
    }

    async fn inferred_exclude(&self, local: &str, remote: &str) -> Result<Report> {
        Ok(match self {
            Auditor::Npm(audit) => Report::Npm(audit.inferred_exclude(local, remote).await?),
            Auditor::PyPi(audit) => Report::PyPi(audit.inferred_exclude(local, remote).await?),
        })
    }

    async fn not_claimed(&self, local: &str, excluded: Option<&Path>) -> Result<Report> {
        Ok(match self {
            Auditor::Npm(audit) => Report::NpmOrScope(audit.not_claimed(local, excluded).await?),
            Auditor::PyPi(audit) => Report::PyPi(audit.not_claimed(local, excluded).await?),
        })
    }
}

fn clear_cache(cache: &DiskCache, args: &CacheClearArgs) -> Result<Report> {
    let message = match (&args.registry, args.category, &args.key) {
        (Some(registry), Some(category), Some(key)) => {
            let entry = CacheKey::new(registry.as_str(), category, key.as_str());
            if cache.remove(&entry)? {
                format!("Removed {}", entry)
            } else {
                format!("No cached entry for {}", entry)
            }
        }
        (Some(registry), _, _) => {
            cache.clear(Some(registry))?;
            format!("Cleared cached answers for {}", registry)
        }
        (None, _, _) => {
            cache.clear(None)?;
            format!("Cleared {}", cache.root().display())
        }
    };
    Ok(Report::Notice(message))
}
