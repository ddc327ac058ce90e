// Health Status Domain Model

use serde::{Deserialize, Serialize};

/// Health status of a single probe or of a whole report
///
/// Variants are ordered by severity: `Healthy < Degraded < Unhealthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Fold statuses into the worst one
    ///
    /// Unhealthy if any is Unhealthy, else Degraded if any is Degraded,
    /// else Healthy. An empty input is Healthy.
    ///
    /// # Example
    /// ```text
    /// let overall = HealthStatus::aggregate([HealthStatus::Healthy, HealthStatus::Degraded]);
    /// assert_eq!(overall, HealthStatus::Degraded);
    /// ```
    pub fn aggregate<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        let mut worst = HealthStatus::Healthy;
        for status in statuses {
            if status == HealthStatus::Unhealthy {
                return HealthStatus::Unhealthy;
            }
            worst = worst.max(status);
        }
        worst
    }

    pub fn is_healthy(self) -> bool {
        self == HealthStatus::Healthy
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

/// Status substituted when a probe fails or times out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureSeverity {
    Degraded,
    #[default]
    Unhealthy,
}

impl From<FailureSeverity> for HealthStatus {
    fn from(severity: FailureSeverity) -> Self {
        match severity {
            FailureSeverity::Degraded => HealthStatus::Degraded,
            FailureSeverity::Unhealthy => HealthStatus::Unhealthy,
        }
    }
}

impl std::fmt::Display for FailureSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        HealthStatus::from(*self).fmt(f)
    }
}
