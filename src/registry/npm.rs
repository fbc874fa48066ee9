//! Upstream npm registry: package existence, scope claims, package documents
//! and search.

use crate::cache::{CacheCategory, ExistenceOracle};
use crate::ident::{NpmPackageIdentifier, PackageIdentifier};
use crate::registry::http::HttpProbe;
use crate::types::{ArtiscopeError, ConnectionInfo, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Public npm registry API.
pub const NPM_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Public npm website, which answers organization lookups.
pub const NPM_WEBSITE_URL: &str = "https://www.npmjs.com";

/// npm registry package document, reduced to what we report.
#[derive(Debug, Deserialize)]
struct PackageDocument {
    name: Option<String>,
    #[serde(default)]
    versions: HashMap<String, serde_json::Value>,
    #[serde(default)]
    time: HashMap<String, String>,
    #[serde(rename = "dist-tags")]
    dist_tags: Option<DistTags>,
    maintainers: Option<Vec<Maintainer>>,
    error: Option<String>,
    errors: Option<Vec<DocumentError>>,
}

#[derive(Debug, Deserialize)]
struct DistTags {
    latest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Maintainer {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocumentError {
    status: Option<u16>,
    message: Option<String>,
}

/// npm registry API response for search.
#[derive(Debug, Deserialize)]
struct NpmSearchResponse {
    objects: Vec<NpmSearchObject>,
}

#[derive(Debug, Deserialize)]
struct NpmSearchObject {
    package: NpmSearchPackage,
}

#[derive(Debug, Deserialize)]
struct NpmSearchPackage {
    name: String,
    scope: Option<String>,
    description: Option<String>,
    date: Option<String>,
}

/// One published version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NpmRelease {
    pub version: String,
    pub published: Option<String>,
}

/// Summary of an upstream package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NpmPackageInfo {
    pub name: String,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub latest: Option<String>,
    /// Oldest first.
    pub releases: Vec<NpmRelease>,
    /// `name <email>`
    pub maintainers: Vec<String>,
}

impl NpmPackageInfo {
    fn from_document(id: &NpmPackageIdentifier, doc: PackageDocument) -> Result<Self> {
        if let Some(first) = doc.errors.as_ref().and_then(|errors| errors.first()) {
            return Err(ArtiscopeError::RegistryError {
                name: id.to_string(),
                message: format!(
                    "code {}, message {}",
                    first.status.unwrap_or_default(),
                    first.message.as_deref().unwrap_or("")
                ),
            });
        }
        if let Some(error) = doc.error {
            return Err(ArtiscopeError::RegistryError {
                name: id.to_string(),
                message: error,
            });
        }

        let mut releases: Vec<NpmRelease> = doc
            .versions
            .keys()
            .map(|version| NpmRelease {
                version: version.clone(),
                published: doc.time.get(version).cloned(),
            })
            .collect();
        // npm timestamps are uniform ISO-8601 UTC, so they sort as strings
        releases.sort_by(|a, b| {
            a.published
                .cmp(&b.published)
                .then_with(|| a.version.cmp(&b.version))
        });

        let maintainers = doc
            .maintainers
            .unwrap_or_default()
            .into_iter()
            .map(|m| {
                format!(
                    "{} <{}>",
                    m.name.unwrap_or_default(),
                    m.email.unwrap_or_default()
                )
            })
            .collect();

        Ok(Self {
            name: doc.name.unwrap_or_else(|| id.to_string()),
            created: doc.time.get("created").cloned(),
            modified: doc.time.get("modified").cloned(),
            latest: doc.dist_tags.and_then(|tags| tags.latest),
            releases,
            maintainers,
        })
    }
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NpmSearchHit {
    pub name: String,
    pub scope: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
}

/// Client for the public npm registry and website, answering through the
/// existence oracle.
#[derive(Clone)]
pub struct NpmRegistry {
    http: Arc<HttpProbe>,
    oracle: ExistenceOracle,
    upstream: ConnectionInfo,
    website: ConnectionInfo,
}

impl NpmRegistry {
    pub fn new(http: Arc<HttpProbe>, oracle: ExistenceOracle) -> Self {
        Self::with_endpoints(
            http,
            oracle,
            ConnectionInfo::anonymous(NPM_REGISTRY_URL),
            ConnectionInfo::anonymous(NPM_WEBSITE_URL),
        )
    }

    /// Point the client at other hosts, e.g. a mock server.
    pub fn with_endpoints(
        http: Arc<HttpProbe>,
        oracle: ExistenceOracle,
        upstream: ConnectionInfo,
        website: ConnectionInfo,
    ) -> Self {
        Self {
            http,
            oracle,
            upstream,
            website,
        }
    }

    pub fn upstream(&self) -> &ConnectionInfo {
        &self.upstream
    }

    /// Does `id` resolve at `connection`? The public registry, or an
    /// Artifactory npm API endpoint.
    pub async fn package_exists(
        &self,
        connection: &ConnectionInfo,
        id: &NpmPackageIdentifier,
    ) -> Result<bool> {
        let canonical = id.canonical();
        let path = document_path(id);
        trace!("Checking npm package {} at {}", canonical, connection.prefix());

        self.oracle
            .exists(
                connection.prefix(),
                CacheCategory::PackageExists,
                &canonical,
                || self.http.exists(connection, &path),
            )
            .await
    }

    /// Does `id` exist on the public registry?
    pub async fn exists_upstream(&self, id: &NpmPackageIdentifier) -> Result<bool> {
        self.package_exists(&self.upstream, id).await
    }

    /// Is `scope` (without `@`) an organization on the npm website?
    pub async fn scope_claimed(&self, scope: &str) -> Result<bool> {
        let path = format!("/org/{}", urlencoding::encode(scope));
        let claimed = self
            .oracle
            .exists(self.website.prefix(), CacheCategory::Org, scope, || {
                self.http.exists(&self.website, &path)
            })
            .await?;

        if !claimed {
            debug!("Scope @{} is not claimed upstream", scope);
        }
        Ok(claimed)
    }

    /// Upstream package document.
    pub async fn package_info(&self, id: &NpmPackageIdentifier) -> Result<NpmPackageInfo> {
        let canonical = id.canonical();
        let path = document_path(id);
        let body = self
            .oracle
            .get_or_probe(
                self.upstream.prefix(),
                CacheCategory::PackageInfo,
                &canonical,
                || self.http.fetch(&self.upstream, &path),
            )
            .await?;

        let doc: PackageDocument = serde_json::from_str(&body)?;
        NpmPackageInfo::from_document(id, doc)
    }

    /// Full-text search, at most `size` hits.
    pub async fn search(&self, text: &str, size: u32) -> Result<Vec<NpmSearchHit>> {
        let path = format!(
            "/-/v1/search?text={}&size={}",
            urlencoding::encode(text),
            size
        );
        let key = format!("{}?size={}", text, size);
        let body = self
            .oracle
            .get_or_probe(self.upstream.prefix(), CacheCategory::Search, &key, || {
                self.http.fetch(&self.upstream, &path)
            })
            .await?;

        let response: NpmSearchResponse = serde_json::from_str(&body)?;
        Ok(response
            .objects
            .into_iter()
            .map(|object| NpmSearchHit {
                name: object.package.name,
                scope: object.package.scope,
                description: object.package.description,
                date: object.package.date,
            })
            .collect())
    }
}

/// Registry path of a package document; the scope keeps its literal `@/`.
fn document_path(id: &NpmPackageIdentifier) -> String {
    match id.scope() {
        Some(scope) => format!(
            "/@{}/{}",
            urlencoding::encode(scope),
            urlencoding::encode(id.name())
        ),
        None => format!("/{}", urlencoding::encode(id.name())),
    }
}
