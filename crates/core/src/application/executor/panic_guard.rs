// Panic isolation for probe and publisher tasks
use std::any::Any;
use tokio::task::JoinError;
use tracing::error;

/// Result of a panic-guarded task
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Task completed (its own Result, if any, is inside)
    Success(T),
    /// Task panicked
    Panicked(String),
}

impl<T> PanicGuardResult<T> {
    /// Classify the outcome of awaiting a spawned task's `JoinHandle`
    ///
    /// Each probe/publisher runs in its own `tokio::spawn`ed task, so a panic
    /// unwinds only that task and surfaces here as a `JoinError`.
    ///
    /// # Example
    /// ```text
    /// let handle = tokio::spawn(async { panic!("boom") });
    /// match PanicGuardResult::from_join(handle.await) {
    ///     PanicGuardResult::Panicked(msg) => assert_eq!(msg, "boom"),
    ///     _ => unreachable!(),
    /// }
    /// ```
    pub fn from_join(result: Result<T, JoinError>) -> Self {
        match result {
            Ok(value) => PanicGuardResult::Success(value),
            Err(join_err) if join_err.is_panic() => {
                let panic_msg = panic_message(join_err.into_panic());
                error!(panic_msg = %panic_msg, "Guarded task panicked");
                PanicGuardResult::Panicked(panic_msg)
            }
            Err(join_err) => PanicGuardResult::Panicked(format!("task aborted: {}", join_err)),
        }
    }
}

/// Extract a readable message from a panic payload
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_passes_through() {
        let handle = tokio::spawn(async { 42 });
        match PanicGuardResult::from_join(handle.await) {
            PanicGuardResult::Success(v) => assert_eq!(v, 42),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panic_with_str_is_caught() {
        let handle = tokio::spawn(async {
            panic!("static message");
        });
        match PanicGuardResult::<()>::from_join(handle.await) {
            PanicGuardResult::Panicked(msg) => assert_eq!(msg, "static message"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panic_with_string_is_caught() {
        let handle = tokio::spawn(async {
            let code = 7;
            panic!("formatted {}", code);
        });
        match PanicGuardResult::<()>::from_join(handle.await) {
            PanicGuardResult::Panicked(msg) => assert_eq!(msg, "formatted 7"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_aborted_task_is_reported() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        match PanicGuardResult::from_join(handle.await) {
            PanicGuardResult::Panicked(msg) => assert!(msg.contains("aborted")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
