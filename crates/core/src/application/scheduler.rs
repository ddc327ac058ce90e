//! Scheduler - periodic, non-overlapping run-then-publish loop
//!
//! State machine: `Idle -> Running -> (Idle | Stopped)`.
//! - The first cycle starts after `delay`
//! - The timer for the next cycle is armed only after the previous cycle
//!   (probes AND publisher fan-out) has finished, so cycles never overlap
//! - Each cycle gets a run token: a child of the shutdown token that also
//!   cancels itself after `timeout`

use crate::application::constants::{
    DEFAULT_CYCLE_TIMEOUT, DEFAULT_SCHEDULER_DELAY, DEFAULT_SCHEDULER_PERIOD,
};
use crate::application::executor::{HealthExecutor, PanicGuardResult};
use crate::application::fanout::{FanoutSummary, PublisherFanout};
use crate::application::registry::RegistrationTable;
use crate::domain::{DomainError, Predicate, Report};
use crate::error::{AppError, Result};
use crate::port::Publisher;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Scheduler knobs
#[derive(Clone)]
pub struct SchedulerConfig {
    /// Wait before the first cycle
    pub delay: Duration,
    /// Wait between the end of one cycle and the start of the next
    pub period: Duration,
    /// Budget for one whole cycle (probes + publishers)
    pub timeout: Duration,
    /// Registrations to run; None runs all
    pub predicate: Option<Predicate>,
}

impl SchedulerConfig {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Reject zero period or timeout
    pub fn validate(&self) -> std::result::Result<(), DomainError> {
        if self.period.is_zero() {
            return Err(DomainError::InvalidDuration {
                field: "period".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.timeout.is_zero() {
            return Err(DomainError::InvalidDuration {
                field: "timeout".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_SCHEDULER_DELAY,
            period: DEFAULT_SCHEDULER_PERIOD,
            timeout: DEFAULT_CYCLE_TIMEOUT,
            predicate: None,
        }
    }
}

impl fmt::Debug for SchedulerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerConfig")
            .field("delay", &self.delay)
            .field("period", &self.period)
            .field("timeout", &self.timeout)
            .field("filtered", &self.predicate.is_some())
            .finish()
    }
}

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// How a single cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Report built and handed to every publisher
    Published(FanoutSummary),
    /// The cycle's own timeout fired first
    TimedOut,
    /// Shutdown was requested while the cycle was in flight
    ShutDown,
    /// Unexpected engine error (logged)
    Failed(String),
}

/// Periodic health scheduler
pub struct HealthScheduler {
    executor: Arc<HealthExecutor>,
    registry: Arc<RegistrationTable>,
    fanout: PublisherFanout,
    config: SchedulerConfig,
    state: watch::Sender<SchedulerState>,
    latest: watch::Sender<Option<Arc<Report>>>,
}

impl HealthScheduler {
    /// Create a scheduler
    ///
    /// # Errors
    /// - AppError::Domain if the config has a zero period or timeout
    pub fn new(
        executor: Arc<HealthExecutor>,
        registry: Arc<RegistrationTable>,
        publishers: Vec<Arc<dyn Publisher>>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        config.validate()?;

        let (state, _) = watch::channel(SchedulerState::Idle);
        let (latest, _) = watch::channel(None);

        Ok(Self {
            executor,
            registry,
            fanout: PublisherFanout::new(publishers),
            config,
            state,
            latest,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Start the loop on the current tokio runtime
    ///
    /// With zero publishers there is nothing to deliver to, so no loop is
    /// started and the handle stays inert until stopped.
    pub fn start(self) -> SchedulerHandle {
        let scheduler = Arc::new(self);
        let shutdown = CancellationToken::new();
        let cycles = Arc::new(AtomicU64::new(0));

        let task = if scheduler.fanout.is_empty() {
            info!("No publishers configured, health scheduler disabled");
            None
        } else {
            info!(
                delay_ms = scheduler.config.delay.as_millis() as u64,
                period_ms = scheduler.config.period.as_millis() as u64,
                timeout_ms = scheduler.config.timeout.as_millis() as u64,
                publishers = scheduler.fanout.len(),
                probes = scheduler.registry.len(),
                "Health scheduler started"
            );
            let this = Arc::clone(&scheduler);
            let token = shutdown.clone();
            let counter = Arc::clone(&cycles);
            Some(tokio::spawn(async move { this.run_loop(token, counter).await }))
        };

        SchedulerHandle {
            state: scheduler.state.subscribe(),
            reports: scheduler.latest.subscribe(),
            scheduler,
            shutdown,
            cycles,
            task,
        }
    }

    async fn run_loop(self: Arc<Self>, shutdown: CancellationToken, cycles: Arc<AtomicU64>) {
        let mut wait = self.config.delay;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            self.state.send_replace(SchedulerState::Running);
            let started = Instant::now();

            // Own task so that even a panic in the engine cannot kill the loop
            let this = Arc::clone(&self);
            let token = shutdown.clone();
            let cycle = tokio::spawn(async move { this.run_cycle(&token).await });

            match PanicGuardResult::from_join(cycle.await) {
                PanicGuardResult::Success(outcome) => debug!(
                    outcome = ?outcome,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Health cycle finished"
                ),
                PanicGuardResult::Panicked(msg) => {
                    error!(panic_msg = %msg, "Health cycle panicked")
                }
            }
            cycles.fetch_add(1, Ordering::SeqCst);

            if shutdown.is_cancelled() {
                break;
            }
            self.state.send_replace(SchedulerState::Idle);
            wait = self.config.period;
        }

        self.state.send_replace(SchedulerState::Stopped);
        info!("Health scheduler stopped");
    }

    /// Run one cycle: execute the selected probes, then fan the report out
    ///
    /// Never fails; every error is classified into a `CycleOutcome` and logged.
    /// Only the loop calls this, so two cycles never run at once.
    pub(crate) async fn run_cycle(&self, shutdown: &CancellationToken) -> CycleOutcome {
        let run_token = shutdown.child_token();

        let timer_token = run_token.clone();
        let timeout = self.config.timeout;
        let timer = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = timer_token.cancelled() => false,
                _ = tokio::time::sleep(timeout) => {
                    timer_token.cancel();
                    true
                }
            }
        });

        let result = self.execute_and_publish(&run_token).await;

        // Releases the timer if it has not fired
        run_token.cancel();
        let timed_out = timer.await.unwrap_or(false);

        match result {
            Ok(_) | Err(AppError::Cancelled) if timed_out => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Health cycle timed out"
                );
                CycleOutcome::TimedOut
            }
            Ok(summary) => CycleOutcome::Published(summary),
            Err(AppError::Cancelled) => {
                debug!("Health cycle cancelled by shutdown");
                CycleOutcome::ShutDown
            }
            Err(e) => {
                error!(error = %e, "Health cycle failed");
                CycleOutcome::Failed(e.to_string())
            }
        }
    }

    async fn execute_and_publish(&self, run_token: &CancellationToken) -> Result<FanoutSummary> {
        let report = self
            .executor
            .check(&self.registry, self.config.predicate.as_ref(), run_token)
            .await?;

        let report = Arc::new(report);
        let summary = self.fanout.publish(Arc::clone(&report), run_token).await;
        if run_token.is_cancelled() && summary.abandoned > 0 {
            return Err(AppError::Cancelled);
        }

        self.latest.send_replace(Some(report));
        Ok(summary)
    }
}

/// Handle to a started scheduler
///
/// Dropping the handle signals shutdown without waiting; call `stop` to
/// wait for an in-flight cycle to unwind.
pub struct SchedulerHandle {
    scheduler: Arc<HealthScheduler>,
    shutdown: CancellationToken,
    state: watch::Receiver<SchedulerState>,
    reports: watch::Receiver<Option<Arc<Report>>>,
    cycles: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Number of cycles that have finished (any outcome)
    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Most recent report whose fan-out finished
    pub fn latest_report(&self) -> Option<Arc<Report>> {
        self.reports.borrow().clone()
    }

    /// Watch each report once its fan-out has finished
    ///
    /// Reports from cycles cut short while publishing are never sent.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Report>>> {
        self.reports.clone()
    }

    /// Whether the scheduler loop is running (false with zero publishers)
    pub fn is_active(&self) -> bool {
        self.task.is_some() && !self.shutdown.is_cancelled()
    }

    /// Signal shutdown and wait for the loop (and any in-flight cycle) to exit
    pub async fn stop(&mut self) {
        info!("Stopping health scheduler...");
        self.shutdown.cancel();

        if let Some(task) = self.task.take() {
            if let PanicGuardResult::Panicked(msg) = PanicGuardResult::from_join(task.await) {
                error!(panic_msg = %msg, "Health scheduler loop panicked");
            }
        }
        self.scheduler.state.send_replace(SchedulerState::Stopped);
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
