//! HTTP transport seam
//!
//! The resolution pipeline never talks to `reqwest` directly; it goes
//! through the [`Transport`] trait so backends can be scripted in tests
//! and swapped for instrumented clients. [`HttpTransport`] is the
//! production implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, instrument};

/// Error raised by a transport implementation.
///
/// Transport failures and non-2xx statuses are treated uniformly as
/// attempt failures by the resolution coordinator, so this carries only
/// a diagnostic message.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self(err.to_string())
    }
}

/// Status and body of one backend response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Full response body, decoded to text.
    pub body: String,
}

impl TransportResponse {
    /// `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP method for form submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Minimal request surface consumed by the pipeline.
///
/// Shared read-only across all resolution attempts; implementations must
/// be safe for concurrent use.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET request with extra headers.
    async fn request(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<TransportResponse, TransportError>;

    /// Submit URL-encoded form fields.
    async fn form_request(
        &self,
        url: &str,
        method: HttpMethod,
        form: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<TransportResponse, TransportError>;
}

/// `reqwest`-backed transport with connection pooling and sane timeouts.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .http2_adaptive_window(true)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .gzip(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        Ok(Self { client })
    }

    /// Access the underlying client for requests outside the pipeline.
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, headers), fields(url = %url))]
    async fn request(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        let mut req = self.client.get(url);
        for (name, value) in headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        debug!(status, bytes = body.len(), "response received");

        Ok(TransportResponse { status, body })
    }

    #[instrument(skip(self, form, headers), fields(url = %url))]
    async fn form_request(
        &self,
        url: &str,
        method: HttpMethod,
        form: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        let mut req = match method {
            HttpMethod::Get => self.client.get(url).query(form),
            HttpMethod::Post => self.client.post(url).form(form),
        };
        for (name, value) in headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        debug!(status, bytes = body.len(), "form response received");

        Ok(TransportResponse { status, body })
    }
}
