//! Internal Artifactory instance: folder listings and per-remote API
//! endpoints.

use crate::registry::http::HttpProbe;
use crate::types::{ConnectionInfo, Result};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Lists the immediate children of a folder in a repository.
pub trait FolderListing: Send + Sync {
    /// Child URIs relative to `path`, each with a leading `/`
    /// (`/lodash`, `/@babel`, `/.npm`).
    fn list_folder(
        &self,
        repository: &str,
        path: &str,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Artifactory storage API folder info.
#[derive(Debug, Deserialize)]
struct FolderInfo {
    #[serde(default)]
    children: Vec<FolderChild>,
}

#[derive(Debug, Deserialize)]
struct FolderChild {
    uri: String,
}

/// Authenticated client for the organization's Artifactory.
#[derive(Clone)]
pub struct ArtifactoryClient {
    http: Arc<HttpProbe>,
    connection: ConnectionInfo,
}

impl ArtifactoryClient {
    pub fn new(http: Arc<HttpProbe>, connection: ConnectionInfo) -> Self {
        Self { http, connection }
    }

    pub fn connection(&self) -> &ConnectionInfo {
        &self.connection
    }
}

/// npm API of `repository`, as seen by an npm client.
pub fn npm_api(artifactory: &ConnectionInfo, repository: &str) -> ConnectionInfo {
    artifactory.join(&format!("/api/npm/{}", repository))
}

/// PyPI API of `repository`, as seen by pip.
pub fn pypi_api(artifactory: &ConnectionInfo, repository: &str) -> ConnectionInfo {
    artifactory.join(&format!("/api/pypi/{}", repository))
}

impl FolderListing for ArtifactoryClient {
    async fn list_folder(&self, repository: &str, path: &str) -> Result<Vec<String>> {
        let body = self
            .http
            .fetch(&self.connection, &format!("/api/storage/{}{}", repository, path))
            .await?;
        let info: FolderInfo = serde_json::from_str(&body)?;

        debug!("{}{}: {} children", repository, path, info.children.len());
        Ok(info.children.into_iter().map(|child| child.uri).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::retry::RetryPolicy;
    use crate::types::ArtiscopeError;
    use std::time::Duration;
    use wiremock::matchers::{basic_auth, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ArtifactoryClient {
        let http = HttpProbe::new(10, RetryPolicy::new(3, Duration::ZERO))
            .unwrap()
            .with_politeness(None);
        ArtifactoryClient::new(
            Arc::new(http),
            ConnectionInfo::authenticated(format!("{}/artifactory/", server.uri()), "ci", "token"),
        )
    }

    #[tokio::test]
    async fn test_list_folder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/storage/npm-local/.npm/"))
            .and(basic_auth("ci", "token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "repo": "npm-local",
                "path": "/.npm",
                "children": [
                    { "uri": "/lodash", "folder": true },
                    { "uri": "/@company", "folder": true }
                ]
            })))
            .mount(&server)
            .await;

        let children = client(&server).list_folder("npm-local", "/.npm/").await.unwrap();
        assert_eq!(children, vec!["/lodash", "/@company"]);
    }

    #[tokio::test]
    async fn test_list_missing_folder_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).list_folder("nope", "/").await.unwrap_err();
        assert!(matches!(err, ArtiscopeError::UnexpectedStatus { status: 404, .. }));
    }

    #[test]
    fn test_api_endpoints() {
        let base = ConnectionInfo::authenticated("https://repo.example.com/artifactory/", "u", "p");

        let npm = npm_api(&base, "npmjs-remote");
        assert_eq!(npm.prefix(), "https://repo.example.com/artifactory/api/npm/npmjs-remote");
        assert!(npm.credentials().is_some());
        assert_eq!(
            pypi_api(&base, "pypi-remote").prefix(),
            "https://repo.example.com/artifactory/api/pypi/pypi-remote"
        );
    }
}
