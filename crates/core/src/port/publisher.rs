// Publisher Port - sinks that receive completed reports
use crate::domain::Report;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Publisher errors
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rejected by receiver with status {0}")]
    Rejected(u16),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Publish cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Report publisher
///
/// The same `Report` is handed to every publisher concurrently; it is
/// read-only to them.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Deliver a completed report
    ///
    /// # Errors
    /// Any `PublishError`; it is logged and never affects other publishers.
    async fn publish(&self, report: Arc<Report>, cancel: CancellationToken) -> Result<(), PublishError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Mock publisher behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Record the report and succeed
        Record,
        /// Always fail with message
        Fail(String),
        /// Panic with message (for isolation testing)
        Panic(String),
    }

    /// Mock Publisher for testing
    pub struct MockPublisher {
        name: String,
        behavior: MockBehavior,
        delay: Duration,
        received: Mutex<Vec<Arc<Report>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl MockPublisher {
        pub fn new(name: impl Into<String>, behavior: MockBehavior) -> Self {
            Self {
                name: name.into(),
                behavior,
                delay: Duration::ZERO,
                received: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn recording(name: impl Into<String>) -> Self {
            Self::new(name, MockBehavior::Record)
        }

        pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
            Self::new(name, MockBehavior::Fail(message.into()))
        }

        pub fn panicking(name: impl Into<String>, message: impl Into<String>) -> Self {
            Self::new(name, MockBehavior::Panic(message.into()))
        }

        /// Sleep (cancellably) before applying the behavior
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Reports received so far (successful publishes only)
        pub fn received(&self) -> Vec<Arc<Report>> {
            self.received.lock().unwrap().clone()
        }

        /// Invocation instants, successful or not
        pub fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Publisher for MockPublisher {
        fn name(&self) -> &str {
            &self.name
        }

        async fn publish(&self, report: Arc<Report>, cancel: CancellationToken) -> Result<(), PublishError> {
            self.calls.lock().unwrap().push(Instant::now());

            if !self.delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.delay) => {},
                    _ = cancel.cancelled() => return Err(PublishError::Cancelled),
                }
            }

            match &self.behavior {
                MockBehavior::Record => {
                    self.received.lock().unwrap().push(report);
                    Ok(())
                }
                MockBehavior::Fail(msg) => Err(PublishError::Other(msg.clone())),
                MockBehavior::Panic(msg) => panic!("{}", msg),
            }
        }
    }
}
