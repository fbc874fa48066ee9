//! Reconciliation of local, remote-cache and upstream package universes.
//!
//! Each audit lists the universes it needs from Artifactory, probes the
//! registries for the identifiers that need it, and returns a
//! deterministic list. Probes run through a bounded pool; the first error
//! drops the pool and cancels every probe still in flight.

pub mod npm;
pub mod pypi;
pub mod universe;

pub use npm::NpmAudit;
pub use pypi::PyPiAudit;

use crate::ident::PackageIdentifier;
use crate::types::Result;
use futures::stream::{self, StreamExt, TryStreamExt};
use indicatif::ProgressBar;
use std::collections::HashSet;
use std::future::Future;
use std::hash::Hash;
use tracing::{debug, info};

/// Pool sizes for existence probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditOptions {
    /// Concurrent probes against the internal Artifactory.
    pub concurrency: usize,
    /// Concurrent probes against public registries.
    pub upstream_concurrency: usize,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            upstream_concurrency: 4,
        }
    }
}

/// Run `probe` for every item with at most `concurrency` in flight and
/// return the items it answered `true` for.
pub async fn probe_all<T, F, Fut>(
    items: &[T],
    concurrency: usize,
    progress: &ProgressBar,
    probe: F,
) -> Result<HashSet<T>>
where
    T: Clone + Eq + Hash,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    progress.set_length(items.len() as u64);
    progress.set_position(0);

    let probe = &probe;
    let answers: Vec<Option<T>> = stream::iter(items.iter().cloned())
        .map(|item| async move {
            let found = probe(item.clone()).await?;
            progress.inc(1);
            Ok::<_, crate::types::ArtiscopeError>(found.then_some(item))
        })
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;

    let found: HashSet<T> = answers.into_iter().flatten().collect();
    debug!("{} of {} probed identifiers found", found.len(), items.len());
    Ok(found)
}

/// Local identifiers also present in the remote cache, in local order.
pub fn cache_intersection<T: PackageIdentifier>(local: Vec<T>, cached: &[T]) -> Vec<T> {
    let cached: HashSet<&T> = cached.iter().collect();
    let local_count = local.len();
    let result: Vec<T> = local.into_iter().filter(|id| cached.contains(id)).collect();

    info!(
        "{} of {} local packages are in the remote cache ({} cached)",
        result.len(),
        local_count,
        cached.len()
    );
    result
}
