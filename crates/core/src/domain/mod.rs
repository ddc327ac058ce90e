// Domain Layer - Health model and value types

pub mod error;
pub mod filter;
pub mod outcome;
pub mod registration;
pub mod report;
pub mod status;

// Re-exports
pub use error::{DomainError, ProbeError};
pub use filter::{Predicate, RegistrationFilter};
pub use outcome::{Outcome, OutcomeData};
pub use registration::Registration;
pub use report::{Report, ReportEntry};
pub use status::{FailureSeverity, HealthStatus};
