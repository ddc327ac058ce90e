//! Executor Property Tests
//!
//! Concurrency, timeout isolation and aggregation precedence of a single run

use std::sync::Arc;
use std::time::{Duration, Instant};

use vigil_core::application::{HealthExecutor, RegistrationTable};
use vigil_core::domain::{FailureSeverity, HealthStatus, Registration, RegistrationFilter};
use vigil_core::port::id_provider::SequentialIdProvider;
use vigil_core::port::probe::mocks::{MockBehavior, MockProbe};
use vigil_core::port::time_provider::FixedTimeProvider;
use vigil_core::{AppError, CancellationToken};

fn executor() -> HealthExecutor {
    HealthExecutor::new(
        Arc::new(SequentialIdProvider::default()),
        Arc::new(FixedTimeProvider(1_700_000_000_000)),
    )
}

fn registration(name: &str, probe: MockProbe) -> Arc<Registration> {
    Arc::new(Registration::new(name, Arc::new(probe)).unwrap())
}

/// Test 1: N probes with delay d run in ≈ max(d), not Σ d
#[tokio::test]
async fn test_run_is_concurrent() {
    let registrations: Vec<Arc<Registration>> = (0..5)
        .map(|i| {
            registration(
                &format!("probe-{}", i),
                MockProbe::healthy().with_delay(Duration::from_millis(200)),
            )
        })
        .collect();

    let report = executor()
        .run(&registrations, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.len(), 5);
    assert_eq!(report.status(), HealthStatus::Healthy);
    assert!(report.total_elapsed() >= Duration::from_millis(200));
    // Sequential execution would take 1000ms
    assert!(
        report.total_elapsed() < Duration::from_millis(600),
        "run took {:?}",
        report.total_elapsed()
    );
}

/// Test 2: a hung probe with a 50ms timeout does not drag its siblings down
#[tokio::test]
async fn test_timeout_isolation() {
    let registrations = vec![
        Arc::new(
            Registration::new("stuck", Arc::new(MockProbe::hanging()))
                .unwrap()
                .with_timeout(Duration::from_millis(50))
                .with_failure_severity(FailureSeverity::Degraded),
        ),
        registration("fast-a", MockProbe::healthy()),
        registration("fast-b", MockProbe::healthy().with_delay(Duration::from_millis(10))),
    ];

    let report = executor()
        .run(&registrations, &CancellationToken::new())
        .await
        .unwrap();

    let stuck = report.entry("stuck").unwrap();
    assert_eq!(stuck.status(), HealthStatus::Degraded);
    assert_eq!(stuck.outcome.description, "timed out");
    assert!(stuck.outcome.error.is_some());

    assert_eq!(report.entry("fast-a").unwrap().status(), HealthStatus::Healthy);
    assert_eq!(report.entry("fast-b").unwrap().status(), HealthStatus::Healthy);
    assert_eq!(report.status(), HealthStatus::Degraded);
}

/// Test 3: a probe that ignores cancellation is abandoned, not awaited
#[tokio::test]
async fn test_timeout_abandons_uncooperative_probe() {
    let registrations = vec![Arc::new(
        Registration::new(
            "deaf",
            Arc::new(MockProbe::new(MockBehavior::HangIgnoringCancel)),
        )
        .unwrap()
        .with_timeout(Duration::from_millis(50)),
    )];

    let started = Instant::now();
    let report = executor()
        .run(&registrations, &CancellationToken::new())
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.entry("deaf").unwrap().status(), HealthStatus::Unhealthy);
}

/// Test 4: worst status wins; empty is healthy
#[tokio::test]
async fn test_aggregation_precedence() {
    let cases: Vec<(Vec<HealthStatus>, HealthStatus)> = vec![
        (vec![], HealthStatus::Healthy),
        (vec![HealthStatus::Healthy, HealthStatus::Healthy], HealthStatus::Healthy),
        (vec![HealthStatus::Healthy, HealthStatus::Degraded], HealthStatus::Degraded),
        (
            vec![HealthStatus::Healthy, HealthStatus::Unhealthy, HealthStatus::Degraded],
            HealthStatus::Unhealthy,
        ),
    ];

    for (statuses, expected) in cases {
        let registrations: Vec<Arc<Registration>> = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                registration(&format!("p{}", i), MockProbe::with_status(*status, "reported"))
            })
            .collect();

        let report = executor()
            .run(&registrations, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.status(), expected, "statuses {:?}", statuses);
    }
}

/// Test 5: failures and panics map to the registration's failure severity
#[tokio::test]
async fn test_failures_use_failure_severity() {
    let registrations = vec![
        Arc::new(
            Registration::new("flaky", Arc::new(MockProbe::failing("connection refused")))
                .unwrap()
                .with_failure_severity(FailureSeverity::Degraded),
        ),
        registration("crashy", MockProbe::panicking("probe bug")),
        registration("fine", MockProbe::healthy()),
    ];

    let report = executor()
        .run(&registrations, &CancellationToken::new())
        .await
        .unwrap();

    let flaky = report.entry("flaky").unwrap();
    assert_eq!(flaky.status(), HealthStatus::Degraded);
    assert!(flaky.outcome.description.contains("connection refused"));

    let crashy = report.entry("crashy").unwrap();
    assert_eq!(crashy.status(), HealthStatus::Unhealthy);
    assert!(crashy.outcome.description.contains("probe bug"));

    assert_eq!(report.entry("fine").unwrap().status(), HealthStatus::Healthy);
    assert_eq!(report.count_by_status(HealthStatus::Healthy), 1);
}

/// Test 6: caller cancellation aborts the run without a report
#[tokio::test]
async fn test_caller_cancellation() {
    let probe = Arc::new(MockProbe::hanging());
    let registrations = vec![Arc::new(
        Registration::new("waiting", Arc::clone(&probe) as Arc<dyn vigil_core::port::Probe>).unwrap(),
    )];

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = executor().run(&registrations, &cancel).await;
    assert!(matches!(result, Err(AppError::Cancelled)));

    // The abandoned probe still sees its (child) token fire
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(probe.cancel_count(), 1);
}

/// Test 7: check() applies the predicate and carries tags into the report
#[tokio::test]
async fn test_check_with_tag_predicate() {
    let mut table = RegistrationTable::new();
    table
        .register(
            Registration::new("db", Arc::new(MockProbe::healthy()))
                .unwrap()
                .with_tags(["ready", "storage"]),
        )
        .unwrap();
    table
        .register(
            Registration::new("cache", Arc::new(MockProbe::with_status(HealthStatus::Unhealthy, "down")))
                .unwrap()
                .with_tags(["live"]),
        )
        .unwrap();

    let predicate = RegistrationFilter::with_any_tag(["ready"]);
    let report = executor()
        .check(&table, Some(&predicate), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.len(), 1);
    assert_eq!(report.status(), HealthStatus::Healthy);
    assert!(report.entry("db").unwrap().tags.contains("storage"));
    assert_eq!(report.run_id(), "run-1");
    assert_eq!(report.generated_at_ms(), 1_700_000_000_000);
}
