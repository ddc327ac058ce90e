// Executor - runs a set of registrations concurrently and builds a Report

mod panic_guard;

pub use panic_guard::{panic_message, PanicGuardResult};

use crate::application::constants::TIMED_OUT_DESCRIPTION;
use crate::application::registry::RegistrationTable;
use crate::domain::{Outcome, Predicate, ProbeError, Registration, Report, ReportEntry};
use crate::error::{AppError, Result};
use crate::port::id_provider::UuidProvider;
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{IdProvider, TimeProvider};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Health executor
///
/// Starts one unit of work per registration, all at once (no throttling),
/// and waits for every unit before building the report. Each unit:
/// - gets a child of the caller's cancellation token
/// - cancels that child itself when the registration's own timeout elapses
/// - runs the probe in its own task so a panic only affects that probe
pub struct HealthExecutor {
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl HealthExecutor {
    pub fn new(id_provider: Arc<dyn IdProvider>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            id_provider,
            time_provider,
        }
    }

    /// Run the registrations selected by `predicate` from `table`
    pub async fn check(
        &self,
        table: &RegistrationTable,
        predicate: Option<&Predicate>,
        cancel: &CancellationToken,
    ) -> Result<Report> {
        let registrations = table.filtered(predicate);
        self.run(&registrations, cancel).await
    }

    /// Run every registration concurrently and aggregate the outcomes
    ///
    /// Probe failures, panics and timeouts become entries with the
    /// registration's failure severity; they never fail the call.
    ///
    /// # Errors
    /// - AppError::Cancelled if `cancel` fires before every unit finished
    /// - AppError::DuplicateRegistration if two inputs share a name (ignoring case)
    pub async fn run(
        &self,
        registrations: &[Arc<Registration>],
        cancel: &CancellationToken,
    ) -> Result<Report> {
        ensure_unique_names(registrations)?;

        let run_id = self.id_provider.generate_id();
        if cancel.is_cancelled() {
            debug!(run_id = %run_id, "Run cancelled before start");
            return Err(AppError::Cancelled);
        }

        debug!(run_id = %run_id, probes = registrations.len(), "Starting health run");

        let started = Instant::now();
        let entries: DashMap<String, ReportEntry> = DashMap::with_capacity(registrations.len());

        let units = registrations
            .iter()
            .map(|reg| run_unit(Arc::clone(reg), cancel, &entries));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(run_id = %run_id, "Run cancelled by caller before all probes finished");
                return Err(AppError::Cancelled);
            }
            _ = futures::future::join_all(units) => {}
        }

        let total_elapsed = started.elapsed();
        let report = Report::new(
            run_id,
            self.time_provider.now_millis(),
            entries.into_iter(),
            total_elapsed,
        );

        info!(
            run_id = %report.run_id(),
            status = %report.status(),
            probes = report.len(),
            unhealthy = report.count_by_status(crate::domain::HealthStatus::Unhealthy),
            degraded = report.count_by_status(crate::domain::HealthStatus::Degraded),
            total_elapsed_ms = total_elapsed.as_millis() as u64,
            "Health run completed"
        );

        Ok(report)
    }
}

impl Default for HealthExecutor {
    fn default() -> Self {
        Self::new(Arc::new(UuidProvider), Arc::new(SystemTimeProvider))
    }
}

/// One unit of work: evaluate one probe and record its entry
async fn run_unit(
    reg: Arc<Registration>,
    cancel: &CancellationToken,
    entries: &DashMap<String, ReportEntry>,
) {
    let local = cancel.child_token();
    let probe = Arc::clone(reg.probe());
    let probe_token = local.clone();

    let started = Instant::now();
    let mut handle = tokio::spawn(async move { probe.evaluate(probe_token).await });

    let outcome = tokio::select! {
        biased;
        joined = &mut handle => match PanicGuardResult::from_join(joined) {
            PanicGuardResult::Success(Ok(outcome)) => outcome.with_elapsed(started.elapsed()),
            PanicGuardResult::Success(Err(err)) => failure_outcome(&reg, err, started.elapsed()),
            PanicGuardResult::Panicked(msg) => {
                failure_outcome(&reg, ProbeError::Panicked(msg), started.elapsed())
            }
        },
        _ = own_deadline(reg.own_timeout()) => {
            // Stop waiting; the probe observes its cancelled token and cleans up
            local.cancel();
            timed_out_outcome(&reg, started.elapsed())
        }
    };

    debug!(
        probe = %reg.name(),
        status = %outcome.status,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "Probe finished"
    );

    entries.insert(
        reg.name().to_string(),
        ReportEntry::new(outcome, reg.tags().clone()),
    );
}

async fn own_deadline(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}

fn failure_outcome(reg: &Registration, err: ProbeError, elapsed: Duration) -> Outcome {
    warn!(
        probe = %reg.name(),
        severity = %reg.failure_severity(),
        error = %err,
        "Probe failed"
    );
    Outcome::new(reg.failure_severity().into(), err.to_string())
        .with_error(err)
        .with_elapsed(elapsed)
}

fn timed_out_outcome(reg: &Registration, elapsed: Duration) -> Outcome {
    warn!(
        probe = %reg.name(),
        severity = %reg.failure_severity(),
        timeout_ms = reg.timeout().as_millis() as u64,
        "Probe timed out"
    );
    Outcome::new(reg.failure_severity().into(), TIMED_OUT_DESCRIPTION)
        .with_error(ProbeError::Timeout(reg.timeout().as_millis() as u64))
        .with_elapsed(elapsed)
}

fn ensure_unique_names(registrations: &[Arc<Registration>]) -> Result<()> {
    let mut seen = HashSet::with_capacity(registrations.len());
    for reg in registrations {
        if !seen.insert(reg.name().to_lowercase()) {
            return Err(AppError::DuplicateRegistration(reg.name().to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FailureSeverity, HealthStatus};
    use crate::port::id_provider::SequentialIdProvider;
    use crate::port::probe::mocks::MockProbe;
    use crate::port::time_provider::FixedTimeProvider;

    fn executor() -> HealthExecutor {
        HealthExecutor::new(
            Arc::new(SequentialIdProvider::default()),
            Arc::new(FixedTimeProvider(1_000)),
        )
    }

    fn reg(name: &str, probe: MockProbe) -> Registration {
        Registration::new(name, Arc::new(probe)).unwrap()
    }

    fn regs(list: Vec<Registration>) -> Vec<Arc<Registration>> {
        list.into_iter().map(Arc::new).collect()
    }

    #[tokio::test]
    async fn test_empty_run_is_healthy() {
        let report = executor().run(&[], &CancellationToken::new()).await.unwrap();

        assert!(report.is_empty());
        assert_eq!(report.status(), HealthStatus::Healthy);
        assert_eq!(report.run_id(), "run-1");
        assert_eq!(report.generated_at_ms(), 1_000);
    }

    #[tokio::test]
    async fn test_reported_status_used_verbatim() {
        let input = regs(vec![
            reg("ok", MockProbe::healthy()),
            reg("slow", MockProbe::with_status(HealthStatus::Degraded, "latency high")),
        ]);

        let report = executor().run(&input, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.status(), HealthStatus::Degraded);
        let slow = report.entry("slow").unwrap();
        assert_eq!(slow.outcome.description, "latency high");
        assert!(slow.outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_failure_uses_registration_severity() {
        let input = regs(vec![reg("cache", MockProbe::failing("connection refused"))
            .with_failure_severity(FailureSeverity::Degraded)]);

        let report = executor().run(&input, &CancellationToken::new()).await.unwrap();

        let entry = report.entry("cache").unwrap();
        assert_eq!(entry.status(), HealthStatus::Degraded);
        assert_eq!(entry.outcome.description, "connection refused");
        assert!(entry.outcome.error.is_some());
        assert_eq!(report.status(), HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let input = regs(vec![
            reg("boom", MockProbe::panicking("probe exploded")),
            reg("fine", MockProbe::healthy()),
        ]);

        let report = executor().run(&input, &CancellationToken::new()).await.unwrap();

        let boom = report.entry("boom").unwrap();
        assert_eq!(boom.status(), HealthStatus::Unhealthy);
        assert!(boom.outcome.description.contains("probe exploded"));
        assert_eq!(report.entry("fine").unwrap().status(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_own_timeout_records_timed_out() {
        let hanging = Arc::new(MockProbe::hanging());
        let input = vec![Arc::new(
            Registration::new("stuck", hanging.clone())
                .unwrap()
                .with_timeout(Duration::from_millis(50)),
        )];

        let report = executor().run(&input, &CancellationToken::new()).await.unwrap();

        let entry = report.entry("stuck").unwrap();
        assert_eq!(entry.status(), HealthStatus::Unhealthy);
        assert_eq!(entry.outcome.description, TIMED_OUT_DESCRIPTION);
        assert!(entry.outcome.elapsed >= Duration::from_millis(50));

        // The probe observes its own cancelled token shortly after
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hanging.cancel_count(), 1);
    }

    #[tokio::test]
    async fn test_tags_copied_into_entries() {
        let input = regs(vec![reg("pg", MockProbe::healthy()).with_tags(["db", "ready"])]);

        let report = executor().run(&input, &CancellationToken::new()).await.unwrap();

        let tags: Vec<_> = report.entry("pg").unwrap().tags.iter().cloned().collect();
        assert_eq!(tags, vec!["db", "ready"]);
    }

    #[tokio::test]
    async fn test_caller_cancellation_aborts_run() {
        let input = regs(vec![reg("stuck", MockProbe::hanging())]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let result = executor().run(&input, &cancel).await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[tokio::test]
    async fn test_already_cancelled_token_fails_fast() {
        let probe = Arc::new(MockProbe::healthy());
        let input = vec![Arc::new(Registration::new("a", probe.clone()).unwrap())];
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = executor().run(&input, &cancel).await;
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(probe.call_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_input_names_rejected() {
        let input = regs(vec![
            reg("db", MockProbe::healthy()),
            reg("DB", MockProbe::healthy()),
        ]);

        let result = executor().run(&input, &CancellationToken::new()).await;
        assert!(matches!(result, Err(AppError::DuplicateRegistration(_))));
    }

    #[tokio::test]
    async fn test_check_applies_predicate() {
        let mut table = RegistrationTable::new();
        table
            .register(reg("pg", MockProbe::healthy()).with_tags(["ready"]))
            .unwrap();
        table
            .register(reg("batch", MockProbe::failing("down")))
            .unwrap();

        let ready = crate::domain::RegistrationFilter::with_any_tag(["ready"]);
        let report = executor()
            .check(&table, Some(&ready), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.len(), 1);
        assert!(report.is_healthy());
    }
}
