// Application Layer - Engine services

pub mod constants;
pub mod executor;
pub mod fanout;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod support;

// Re-exports
pub use executor::HealthExecutor;
pub use fanout::{FanoutSummary, PublisherFanout};
pub use registry::RegistrationTable;
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{CycleOutcome, HealthScheduler, SchedulerConfig, SchedulerHandle, SchedulerState};
pub use support::{ConnectionCache, HealthyLatch, LatchedProbe};
