// Probe Port - contract every health probe satisfies
// reason: async-trait for object-safe async dispatch over heterogeneous probes
use crate::domain::{Outcome, ProbeError};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Health probe for one external dependency
///
/// Implementations:
/// - TcpProbe, CommandProbe, CpuProbe, MemoryProbe, DiskProbe (infra-system)
/// - LatchedProbe: wraps any probe with a last-known-healthy latch
#[async_trait]
pub trait Probe: Send + Sync {
    /// Evaluate the dependency and report its status
    ///
    /// Must return promptly once `cancel` fires (typically with
    /// `ProbeError::Cancelled`) and must release any socket, process or
    /// handle it opened. The engine stops waiting on a cancelled probe but
    /// never forcibly terminates it.
    ///
    /// # Errors
    /// Any `ProbeError`; the engine records it with the registration's
    /// failure severity.
    async fn evaluate(&self, cancel: CancellationToken) -> Result<Outcome, ProbeError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::HealthStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Mock probe behavior (applied after the optional delay)
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Return the given status and description
        Report(HealthStatus, String),
        /// Return a probe error with message
        Fail(String),
        /// Panic with message (for isolation testing)
        Panic(String),
        /// Never return until cancelled
        Hang,
        /// Never return at all, ignoring cancellation
        HangIgnoringCancel,
    }

    /// Mock Probe for testing
    pub struct MockProbe {
        behavior: Mutex<MockBehavior>,
        delay: Duration,
        call_count: AtomicUsize,
        cancel_count: AtomicUsize,
    }

    impl MockProbe {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Mutex::new(behavior),
                delay: Duration::ZERO,
                call_count: AtomicUsize::new(0),
                cancel_count: AtomicUsize::new(0),
            }
        }

        pub fn healthy() -> Self {
            Self::new(MockBehavior::Report(HealthStatus::Healthy, "ok".to_string()))
        }

        pub fn with_status(status: HealthStatus, description: impl Into<String>) -> Self {
            Self::new(MockBehavior::Report(status, description.into()))
        }

        pub fn failing(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        pub fn panicking(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Panic(message.into()))
        }

        pub fn hanging() -> Self {
            Self::new(MockBehavior::Hang)
        }

        /// Sleep (cancellably) before applying the behavior
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn set_behavior(&self, behavior: MockBehavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Number of evaluations that observed their cancellation signal
        pub fn cancel_count(&self) -> usize {
            self.cancel_count.load(Ordering::SeqCst)
        }

        async fn wait_cancelled(&self, cancel: &CancellationToken) -> ProbeError {
            cancel.cancelled().await;
            self.cancel_count.fetch_add(1, Ordering::SeqCst);
            ProbeError::Cancelled
        }
    }

    #[async_trait]
    impl Probe for MockProbe {
        async fn evaluate(&self, cancel: CancellationToken) -> Result<Outcome, ProbeError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay) => {},
                    err = self.wait_cancelled(&cancel) => return Err(err),
                }
            }

            let behavior = self.behavior.lock().unwrap().clone();

            match behavior {
                MockBehavior::Report(status, description) => Ok(Outcome::new(status, description)),
                MockBehavior::Fail(msg) => Err(ProbeError::Other(msg)),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for isolation testing
                }
                MockBehavior::Hang => Err(self.wait_cancelled(&cancel).await),
                MockBehavior::HangIgnoringCancel => std::future::pending().await,
            }
        }
    }
}
