//! HTTP GET probe shared by every registry client.

use crate::registry::retry::{retry_rate_limited, Attempt, RetryPolicy};
use crate::types::{ArtiscopeError, ConnectionInfo, Result};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// Minimum spacing between anonymous requests to the same host.
pub const POLITENESS_INTERVAL: Duration = Duration::from_secs(1);

type HostRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Single-GET client with Basic auth, per-host politeness for anonymous
/// hosts, and 429 retries.
pub struct HttpProbe {
    client: Client,
    retry: RetryPolicy,
    politeness: Option<Arc<HostRateLimiter>>,
}

impl HttpProbe {
    /// Create a new probe with the default politeness interval.
    pub fn new(timeout_secs: u64, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.min(50)))
            .user_agent(concat!("artiscope/", env!("CARGO_PKG_VERSION")))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            retry,
            politeness: host_limiter(POLITENESS_INTERVAL),
        })
    }

    /// Override the spacing between anonymous requests. `None` or a zero
    /// interval disables throttling.
    pub fn with_politeness(mut self, interval: Option<Duration>) -> Self {
        self.politeness = interval.and_then(host_limiter);
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// GET `path` and return the body. Any non-2xx status is an error.
    pub async fn fetch(&self, connection: &ConnectionInfo, path: &str) -> Result<String> {
        let url = connection.url(path);
        let response = self.get(connection, path).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArtiscopeError::UnexpectedStatus {
                url,
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }

    /// `true` on 200, `false` on 404, an error for anything else.
    pub async fn exists(&self, connection: &ConnectionInfo, path: &str) -> Result<bool> {
        let url = connection.url(path);
        let response = self.get(connection, path).await?;

        match response.status() {
            StatusCode::OK => {
                debug!("Exists: {}", url);
                Ok(true)
            }
            StatusCode::NOT_FOUND => {
                debug!("Not found: {}", url);
                Ok(false)
            }
            status => Err(ArtiscopeError::UnexpectedStatus {
                url,
                status: status.as_u16(),
            }),
        }
    }

    async fn get(&self, connection: &ConnectionInfo, path: &str) -> Result<Response> {
        let url = connection.url(path);
        let parsed = Url::parse(&url)?;
        let host = format!(
            "{}:{}",
            parsed.host_str().unwrap_or_default(),
            parsed.port_or_known_default().unwrap_or_default()
        );

        retry_rate_limited(&self.retry, &url, || async {
            let mut request = self.client.get(parsed.clone());
            match connection.credentials() {
                Some(credentials) => {
                    request = request.basic_auth(&credentials.username, Some(&credentials.password));
                }
                None => {
                    // Third-party registry: be polite
                    if let Some(limiter) = &self.politeness {
                        limiter.until_key_ready(&host).await;
                    }
                }
            }

            trace!("Fetching {}", url);
            let response = request.send().await?;

            match response.status() {
                StatusCode::TOO_MANY_REQUESTS => Ok(Attempt::RateLimited),
                StatusCode::UNAUTHORIZED => Err(ArtiscopeError::Unauthorized(url.clone())),
                _ => Ok(Attempt::Done(response)),
            }
        })
        .await
    }
}

fn host_limiter(interval: Duration) -> Option<Arc<HostRateLimiter>> {
    Quota::with_period(interval).map(|quota| Arc::new(RateLimiter::keyed(quota)))
}
