//! HTTP GET capability used by the pagination walker.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::UpstreamConfig;
use crate::error::UpstreamError;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Ordered `(name, value)` pairs for headers or query parameters.
pub type Pairs = Vec<(String, String)>;

/// A completed upstream response, successful or not.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// Final request URL including the query string.
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Decode the body as JSON. Anything unparseable is treated as `null`.
    pub fn json(&self) -> Value {
        match serde_json::from_str(&self.body) {
            Ok(value) => value,
            Err(e) => {
                warn!(url = %self.url, error = %e, "Upstream body is not JSON, treating as empty");
                Value::Null
            }
        }
    }

    pub fn into_error(self) -> UpstreamError {
        UpstreamError::status(self.url, self.status, &self.body)
    }
}

/// Issue a single GET. Implementations map transport failures to
/// [`UpstreamError`] but return HTTP error statuses as responses.
#[async_trait]
pub trait HttpGet: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        query: &[(String, String)],
    ) -> Result<UpstreamResponse, UpstreamError>;
}

/// `reqwest`-backed transport with a request timeout and a shared rate limiter.
pub struct ReqwestTransport {
    http: reqwest::Client,
    limiter: Arc<Limiter>,
}

impl ReqwestTransport {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            limiter: create_rate_limiter(config.requests_per_second, config.burst_size),
        })
    }
}

#[async_trait]
impl HttpGet for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        query: &[(String, String)],
    ) -> Result<UpstreamResponse, UpstreamError> {
        self.limiter.until_ready().await;

        let mut request = self.http.get(url).query(query);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| classify(url, e))?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| classify(url, e))?;

        debug!(url = %final_url, status, bytes = body.len(), "Upstream GET");

        Ok(UpstreamResponse {
            url: final_url,
            status,
            body,
        })
    }
}

fn classify(url: &str, e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
        UpstreamError::Timeout {
            url: url.to_string(),
        }
    } else {
        UpstreamError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

fn create_rate_limiter(requests_per_second: u32, burst_size: u32) -> Arc<Limiter> {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::new(10).unwrap());
    let burst = NonZeroU32::new(burst_size).unwrap_or(rps);

    let quota = Quota::per_second(rps).allow_burst(burst);
    Arc::new(RateLimiter::direct(quota))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> UpstreamConfig {
        UpstreamConfig {
            request_timeout_seconds: 1,
            ..UpstreamConfig::default()
        }
    }

    #[tokio::test]
    async fn test_get_passes_headers_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/teams"))
            .and(query_param("page", "0"))
            .and(header("Authorization", "Bearer abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(&test_config()).unwrap();
        let resp = transport
            .get(
                &format!("{}/api/teams", server.uri()),
                &[("Authorization".to_string(), "Bearer abc".to_string())],
                &[("page".to_string(), "0".to_string())],
            )
            .await
            .unwrap();

        assert_eq!(resp.status, 200);
        assert!(resp.url.contains("page=0"));
        assert_eq!(resp.json(), serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad param"))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(&test_config()).unwrap();
        let resp = transport.get(&server.uri(), &[], &[]).await.unwrap();
        assert!(resp.is_error());
        assert_eq!(resp.json(), Value::Null);
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(&test_config()).unwrap();
        let err = transport.get(&server.uri(), &[], &[]).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Timeout { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let transport = ReqwestTransport::new(&test_config()).unwrap();
        let err = transport
            .get("http://127.0.0.1:9/api/teams", &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Transport { .. }));
    }
}
