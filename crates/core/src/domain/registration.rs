// Registration Domain Model

use super::error::{DomainError, Result};
use super::status::FailureSeverity;
use crate::port::Probe;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Maximum registration name length
pub const MAX_NAME_LENGTH: usize = 128;

/// Static configuration binding a probe to a name, timeout and failure severity
///
/// Built once at setup and shared read-only (behind `Arc`) by every run.
#[derive(Clone)]
pub struct Registration {
    name: String,
    probe: Arc<dyn Probe>,
    failure_severity: FailureSeverity,
    timeout: Duration,
    tags: BTreeSet<String>,
}

impl Registration {
    /// Create a registration with default severity (Unhealthy), no own timeout
    /// and no tags
    ///
    /// # Errors
    /// - DomainError::InvalidName if the name is blank or too long
    pub fn new(name: impl Into<String>, probe: Arc<dyn Probe>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;

        Ok(Self {
            name,
            probe,
            failure_severity: FailureSeverity::default(),
            timeout: Duration::ZERO,
            tags: BTreeSet::new(),
        })
    }

    pub fn with_failure_severity(mut self, severity: FailureSeverity) -> Self {
        self.failure_severity = severity;
        self
    }

    /// Per-probe timeout; `Duration::ZERO` inherits the caller's cancellation
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn probe(&self) -> &Arc<dyn Probe> {
        &self.probe
    }

    pub fn failure_severity(&self) -> FailureSeverity {
        self.failure_severity
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Own timeout, or None when the caller's cancellation is inherited
    pub fn own_timeout(&self) -> Option<Duration> {
        (!self.timeout.is_zero()).then_some(self.timeout)
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("failure_severity", &self.failure_severity)
            .field("timeout", &self.timeout)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DomainError::InvalidName(
            "name cannot be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(DomainError::InvalidName(format!(
            "name too long (max {} chars): {}",
            MAX_NAME_LENGTH, name
        )));
    }
    Ok(())
}
