// Port Layer - Interfaces for external collaborators

pub mod id_provider; // For deterministic testing
pub mod probe;
pub mod publisher;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use probe::Probe;
pub use publisher::{PublishError, Publisher};
pub use time_provider::TimeProvider;
