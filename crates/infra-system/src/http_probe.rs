// HTTP endpoint probe
// reason: reqwest client reuse through a per-origin ConnectionCache
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use vigil_core::application::ConnectionCache;
use vigil_core::domain::{Outcome, ProbeError};
use vigil_core::port::Probe;

/// Default request timeout (5s)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client handles shared by HTTP probes, keyed by origin
pub type HttpClientCache = ConnectionCache<Client>;

/// Issues a GET and checks the response status
///
/// 2xx (or the configured status) is healthy; a response slower than
/// `degraded_after` is degraded. A transport failure drops the cached
/// client for the origin so the next run reconnects.
pub struct HttpProbe {
    url: Url,
    origin: String,
    expected_status: Option<u16>,
    degraded_after: Option<Duration>,
    request_timeout: Duration,
    clients: Arc<HttpClientCache>,
}

impl HttpProbe {
    pub fn new(url: &str, clients: Arc<HttpClientCache>) -> Result<Self, ProbeError> {
        let url = Url::parse(url).map_err(|e| ProbeError::Config(format!("invalid url '{}': {}", url, e)))?;
        let origin = url.origin().ascii_serialization();

        Ok(Self {
            url,
            origin,
            expected_status: None,
            degraded_after: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            clients,
        })
    }

    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.expected_status = Some(status);
        self
    }

    pub fn with_degraded_after(mut self, latency: Duration) -> Self {
        self.degraded_after = Some(latency);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn client(&self) -> Result<Client, ProbeError> {
        let timeout = self.request_timeout;
        self.clients
            .get_or_try_insert_with(&self.origin, || async move {
                Client::builder()
                    .timeout(timeout)
                    .build()
                    .map_err(|e| ProbeError::Config(format!("http client: {}", e)))
            })
            .await
    }

    fn status_ok(&self, status: u16) -> bool {
        match self.expected_status {
            Some(expected) => status == expected,
            None => (200..300).contains(&status),
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn evaluate(&self, cancel: CancellationToken) -> Result<Outcome, ProbeError> {
        let client = self.client().await?;
        let started = Instant::now();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
            response = client.get(self.url.clone()).send() => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                self.clients.invalidate(&self.origin);
                if e.is_timeout() {
                    return Err(ProbeError::Timeout(self.request_timeout.as_millis() as u64));
                }
                return Err(ProbeError::Connection(format!("{}: {}", self.url, e)));
            }
        };

        let latency = started.elapsed();
        let status = response.status().as_u16();
        debug!(url = %self.url, status = status, latency_ms = latency.as_millis() as u64, "HTTP probe response");

        let outcome = if !self.status_ok(status) {
            Outcome::unhealthy(format!("{} returned {}", self.url, status))
        } else if self.degraded_after.is_some_and(|limit| latency > limit) {
            Outcome::degraded(format!("{} slow: {}ms", self.url, latency.as_millis()))
        } else {
            Outcome::healthy(format!("{} returned {}", self.url, status))
        };

        Ok(outcome
            .with_data("status_code", status)
            .with_data("latency_ms", latency.as_millis() as u64))
    }
}
