// Last-known-healthy latch for probes whose check only needs to pass once

use crate::domain::{HealthStatus, Outcome, ProbeError};
use crate::port::Probe;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// "Verified healthy" flag owned by one probe instance
///
/// Invalidated only by process restart (it is in-memory) or an explicit
/// `reset`.
#[derive(Debug, Default)]
pub struct HealthyLatch {
    latched: AtomicBool,
}

impl HealthyLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_latched(&self) -> bool {
        self.latched.load(Ordering::Acquire)
    }

    pub fn latch(&self) {
        self.latched.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.latched.store(false, Ordering::Release);
    }
}

/// Probe wrapper that stops re-running an expensive check once it passed
///
/// Typical use: schema-migration or bootstrap checks that are monotonic
/// within a process lifetime.
pub struct LatchedProbe<P> {
    inner: P,
    latch: Arc<HealthyLatch>,
}

impl<P: Probe> LatchedProbe<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            latch: Arc::new(HealthyLatch::new()),
        }
    }

    /// Shared latch, e.g. for an operator-triggered reset
    pub fn latch(&self) -> Arc<HealthyLatch> {
        Arc::clone(&self.latch)
    }
}

#[async_trait]
impl<P: Probe> Probe for LatchedProbe<P> {
    async fn evaluate(&self, cancel: CancellationToken) -> Result<Outcome, ProbeError> {
        if self.latch.is_latched() {
            return Ok(Outcome::healthy("previously verified").with_data("latched", true));
        }

        let outcome = self.inner.evaluate(cancel).await?;
        if outcome.status == HealthStatus::Healthy {
            info!("Probe verified healthy, latching");
            self.latch.latch();
        }
        Ok(outcome)
    }
}
