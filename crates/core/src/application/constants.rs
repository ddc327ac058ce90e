// Engine constants (no magic values)
use std::time::Duration;

/// Initial delay before the first scheduled cycle (5s)
pub const DEFAULT_SCHEDULER_DELAY: Duration = Duration::from_secs(5);

/// Interval between the end of one cycle and the start of the next (30s)
pub const DEFAULT_SCHEDULER_PERIOD: Duration = Duration::from_secs(30);

/// Overall budget for one cycle, probes plus publishers (30s)
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Description recorded when a probe's own timeout fires
pub const TIMED_OUT_DESCRIPTION: &str = "timed out";

/// Default number of attempts for probe-internal retries
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Default base delay between probe-internal retries (100ms)
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Default exponential backoff factor for probe-internal retries
pub const DEFAULT_RETRY_BACKOFF_FACTOR: f64 = 2.0;

/// Grace period between SIGTERM and SIGKILL for cancelled command probes (5s)
pub const GRACEFUL_KILL_TIMEOUT: Duration = Duration::from_secs(5);
