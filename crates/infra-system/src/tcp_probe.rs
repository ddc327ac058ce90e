// TCP reachability probe
// reason: tokio TcpStream, retries bounded by the probe's cancellation signal
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use vigil_core::application::RetryPolicy;
use vigil_core::domain::{Outcome, ProbeError};
use vigil_core::port::Probe;

/// Default per-attempt connect timeout (2s)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Checks that a TCP endpoint accepts connections
pub struct TcpProbe {
    address: String,
    connect_timeout: Duration,
    retry: RetryPolicy,
}

impl TcpProbe {
    /// Create a TCP probe
    ///
    /// # Example
    /// ```ignore
    /// let probe = TcpProbe::new("127.0.0.1", 5432).with_retry(RetryPolicy::default());
    /// ```
    pub fn new(host: impl AsRef<str>, port: u16) -> Self {
        Self {
            address: format!("{}:{}", host.as_ref(), port),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn connect_once(&self) -> Result<(), ProbeError> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(ProbeError::Connection(format!("{}: {}", self.address, e))),
            Err(_) => Err(ProbeError::Timeout(self.connect_timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn evaluate(&self, cancel: CancellationToken) -> Result<Outcome, ProbeError> {
        let started = Instant::now();

        let attempts = self
            .retry
            .retry(&self.address, &cancel, |attempt| async move {
                self.connect_once().await.map(|_| attempt + 1)
            })
            .await?;

        let connect_ms = started.elapsed().as_millis() as u64;
        debug!(address = %self.address, attempts = attempts, connect_ms = connect_ms, "TCP connect succeeded");

        Ok(Outcome::healthy(format!("connected to {}", self.address))
            .with_data("address", self.address.clone())
            .with_data("attempts", attempts)
            .with_data("connect_ms", connect_ms))
    }
}
