//! Upstream PyPI existence checks over the simple index.

use crate::cache::{CacheCategory, ExistenceOracle};
use crate::ident::{PackageIdentifier, PyPiPackageIdentifier};
use crate::registry::http::HttpProbe;
use crate::types::{ConnectionInfo, Result};
use std::sync::Arc;
use tracing::trace;

/// Public PyPI.
pub const PYPI_URL: &str = "https://pypi.org";

#[derive(Clone)]
pub struct PyPiRegistry {
    http: Arc<HttpProbe>,
    oracle: ExistenceOracle,
    upstream: ConnectionInfo,
}

impl PyPiRegistry {
    pub fn new(http: Arc<HttpProbe>, oracle: ExistenceOracle) -> Self {
        Self::with_upstream(http, oracle, ConnectionInfo::anonymous(PYPI_URL))
    }

    pub fn with_upstream(http: Arc<HttpProbe>, oracle: ExistenceOracle, upstream: ConnectionInfo) -> Self {
        Self {
            http,
            oracle,
            upstream,
        }
    }

    pub fn upstream(&self) -> &ConnectionInfo {
        &self.upstream
    }

    /// Does `id` have a simple-index page at `connection`? The public index,
    /// or an Artifactory PyPI API endpoint.
    pub async fn package_exists(
        &self,
        connection: &ConnectionInfo,
        id: &PyPiPackageIdentifier,
    ) -> Result<bool> {
        let canonical = id.canonical();
        let path = format!("/simple/{}/", urlencoding::encode(&canonical));
        trace!("Checking PyPI package {} at {}", canonical, connection.prefix());

        self.oracle
            .exists(
                connection.prefix(),
                CacheCategory::PackageExists,
                &canonical,
                || self.http.exists(connection, &path),
            )
            .await
    }

    pub async fn exists_upstream(&self, id: &PyPiPackageIdentifier) -> Result<bool> {
        self.package_exists(&self.upstream, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, CACHE_TTL};
    use crate::registry::retry::RetryPolicy;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_package_exists_uses_simple_index() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/requests/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/simple/acme-internal/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let http = HttpProbe::new(10, RetryPolicy::new(3, Duration::ZERO))
            .unwrap()
            .with_politeness(None);
        let registry = PyPiRegistry::with_upstream(
            Arc::new(http),
            ExistenceOracle::new(Arc::new(MemoryCache::new(CACHE_TTL))),
            ConnectionInfo::anonymous(server.uri()),
        );

        let requests = PyPiPackageIdentifier::new("requests");
        assert!(registry.exists_upstream(&requests).await.unwrap());
        assert!(registry.exists_upstream(&requests).await.unwrap());
        assert!(!registry
            .exists_upstream(&PyPiPackageIdentifier::new("acme-internal"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_url_metacharacters_stay_in_the_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/foo/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/simple/foo%3Fbar/"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let http = HttpProbe::new(10, RetryPolicy::new(3, Duration::ZERO))
            .unwrap()
            .with_politeness(None);
        let registry = PyPiRegistry::with_upstream(
            Arc::new(http),
            ExistenceOracle::new(Arc::new(MemoryCache::new(CACHE_TTL))),
            ConnectionInfo::anonymous(server.uri()),
        );

        assert!(!registry
            .exists_upstream(&PyPiPackageIdentifier::new("foo?bar"))
            .await
            .unwrap());
    }
}
