// Outcome Domain Model

use super::error::ProbeError;
use super::status::HealthStatus;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Diagnostic payload attached to an outcome (key -> scalar)
pub type OutcomeData = BTreeMap<String, serde_json::Value>;

/// Result of running one probe
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub status: HealthStatus,
    pub description: String,
    #[serde(serialize_with = "serialize_error", skip_serializing_if = "Option::is_none")]
    pub error: Option<Arc<ProbeError>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: OutcomeData,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl Outcome {
    pub fn new(status: HealthStatus, description: impl Into<String>) -> Self {
        Self {
            status,
            description: description.into(),
            error: None,
            data: OutcomeData::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn healthy(description: impl Into<String>) -> Self {
        Self::new(HealthStatus::Healthy, description)
    }

    pub fn degraded(description: impl Into<String>) -> Self {
        Self::new(HealthStatus::Degraded, description)
    }

    pub fn unhealthy(description: impl Into<String>) -> Self {
        Self::new(HealthStatus::Unhealthy, description)
    }

    /// Attach a diagnostic value
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Attach the captured failure
    pub fn with_error(mut self, error: ProbeError) -> Self {
        self.error = Some(Arc::new(error));
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }
}

fn serialize_error<S>(error: &Option<Arc<ProbeError>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match error {
        Some(err) => serializer.serialize_str(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_attaches_data_and_error() {
        let outcome = Outcome::degraded("slow")
            .with_data("latency_ms", 812)
            .with_data("host", "db-1")
            .with_error(ProbeError::Timeout(500));

        assert_eq!(outcome.status, HealthStatus::Degraded);
        assert_eq!(outcome.data["latency_ms"], serde_json::json!(812));
        assert_eq!(outcome.data["host"], serde_json::json!("db-1"));
        assert!(matches!(
            outcome.error.as_deref(),
            Some(ProbeError::Timeout(500))
        ));
    }

    #[test]
    fn test_serialize_flattens_error_and_elapsed() {
        let outcome = Outcome::unhealthy("refused")
            .with_error(ProbeError::Connection("refused".to_string()))
            .with_elapsed(Duration::from_millis(42));

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "UNHEALTHY");
        assert_eq!(json["elapsed_ms"], 42);
        assert_eq!(json["error"], "Connection failed: refused");
        assert!(json.get("data").is_none());
    }
}
