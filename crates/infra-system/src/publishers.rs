// Report publishers: structured log line and HTTP webhook
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vigil_core::domain::{HealthStatus, Report};
use vigil_core::port::{PublishError, Publisher};

/// Default webhook request timeout (10s)
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Writes each report to the tracing pipeline
///
/// One summary line at info, plus a warn line per entry that is not healthy.
pub struct LogPublisher {
    name: String,
}

impl LogPublisher {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LogPublisher {
    fn default() -> Self {
        Self::new("log")
    }
}

#[async_trait]
impl Publisher for LogPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, report: Arc<Report>, _cancel: CancellationToken) -> Result<(), PublishError> {
        info!(
            run_id = %report.run_id(),
            status = %report.status(),
            checks = report.len(),
            unhealthy = report.count_by_status(HealthStatus::Unhealthy),
            degraded = report.count_by_status(HealthStatus::Degraded),
            total_elapsed_ms = report.total_elapsed().as_millis() as u64,
            "Health report"
        );

        for (name, entry) in report.entries() {
            if entry.status() == HealthStatus::Healthy {
                continue;
            }
            let data = serde_json::to_string(&entry.outcome.data)?;
            let error = entry.outcome.error.as_ref().map(|e| e.to_string()).unwrap_or_default();
            warn!(
                run_id = %report.run_id(),
                check = %name,
                status = %entry.status(),
                description = %entry.outcome.description,
                error = %error,
                elapsed_ms = entry.outcome.elapsed.as_millis() as u64,
                data = %data,
                "Health check not healthy"
            );
        }
        Ok(())
    }
}

/// POSTs each report as JSON to a webhook URL
pub struct WebhookPublisher {
    name: String,
    url: String,
    client: Client,
}

impl WebhookPublisher {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Other(format!("http client: {}", e)))?;

        Ok(Self {
            name: name.into(),
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Publisher for WebhookPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, report: Arc<Report>, cancel: CancellationToken) -> Result<(), PublishError> {
        let request = self.client.post(&self.url).json(report.as_ref()).send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PublishError::Cancelled),
            response = request => response.map_err(|e| PublishError::Transport(e.to_string()))?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
