// Report Domain Model

use super::outcome::{serialize_millis, Outcome};
use super::status::HealthStatus;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Outcome of one probe plus the tags its registration carried during the run
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub tags: BTreeSet<String>,
}

impl ReportEntry {
    pub fn new(outcome: Outcome, tags: BTreeSet<String>) -> Self {
        Self { outcome, tags }
    }

    pub fn status(&self) -> HealthStatus {
        self.outcome.status
    }
}

/// Aggregate result of one run across all selected registrations
///
/// Built once when the run's barrier is passed and never mutated afterwards;
/// publishers share it behind an `Arc`.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    run_id: String,
    generated_at_ms: i64,
    status: HealthStatus,
    #[serde(rename = "total_elapsed_ms", serialize_with = "serialize_millis")]
    total_elapsed: Duration,
    entries: BTreeMap<String, ReportEntry>,
}

impl Report {
    /// Build a report; the overall status is derived from the entries
    pub fn new<I>(
        run_id: impl Into<String>,
        generated_at_ms: i64,
        entries: I,
        total_elapsed: Duration,
    ) -> Self
    where
        I: IntoIterator<Item = (String, ReportEntry)>,
    {
        let entries: BTreeMap<String, ReportEntry> = entries.into_iter().collect();
        let status = HealthStatus::aggregate(entries.values().map(ReportEntry::status));

        Self {
            run_id: run_id.into(),
            generated_at_ms,
            status,
            total_elapsed,
            entries,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn generated_at_ms(&self) -> i64 {
        self.generated_at_ms
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }

    pub fn total_elapsed(&self) -> Duration {
        self.total_elapsed
    }

    pub fn entries(&self) -> &BTreeMap<String, ReportEntry> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive entry lookup, folding case like the registration table
    pub fn entry(&self, name: &str) -> Option<&ReportEntry> {
        self.entries.get(name).or_else(|| {
            let wanted = name.to_lowercase();
            self.entries
                .iter()
                .find(|(key, _)| key.to_lowercase() == wanted)
                .map(|(_, entry)| entry)
        })
    }

    pub fn count_by_status(&self, status: HealthStatus) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.status() == status)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: HealthStatus) -> ReportEntry {
        ReportEntry::new(Outcome::new(status, "test"), BTreeSet::new())
    }

    fn report(statuses: &[HealthStatus]) -> Report {
        let entries = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| (format!("probe-{}", i), entry(*status)));
        Report::new("run-1", 1000, entries, Duration::from_millis(10))
    }

    #[test]
    fn test_empty_report_is_healthy() {
        let report = report(&[]);
        assert!(report.is_empty());
        assert_eq!(report.status(), HealthStatus::Healthy);
    }

    #[test]
    fn test_status_precedence() {
        use HealthStatus::*;

        assert_eq!(report(&[Healthy, Healthy]).status(), Healthy);
        assert_eq!(report(&[Healthy, Degraded]).status(), Degraded);
        assert_eq!(report(&[Healthy, Unhealthy, Degraded]).status(), Unhealthy);
    }

    #[test]
    fn test_entry_lookup_is_case_insensitive() {
        let entries = vec![("Postgres".to_string(), entry(HealthStatus::Healthy))];
        let report = Report::new("run-1", 0, entries, Duration::ZERO);

        assert!(report.entry("Postgres").is_some());
        assert!(report.entry("POSTGRES").is_some());
        assert!(report.entry("redis").is_none());
    }

    #[test]
    fn test_entry_lookup_folds_non_ascii_case() {
        let entries = vec![("Ärger".to_string(), entry(HealthStatus::Degraded))];
        let report = Report::new("run-1", 0, entries, Duration::ZERO);

        assert_eq!(report.entry("ärger").unwrap().status(), HealthStatus::Degraded);
        assert!(report.entry("ÄRGER").is_some());
    }

    #[test]
    fn test_count_by_status() {
        use HealthStatus::*;

        let report = report(&[Healthy, Degraded, Degraded, Unhealthy]);
        assert_eq!(report.count_by_status(Healthy), 1);
        assert_eq!(report.count_by_status(Degraded), 2);
        assert_eq!(report.count_by_status(Unhealthy), 1);
    }

    #[test]
    fn test_serialize_shape() {
        let mut tags = BTreeSet::new();
        tags.insert("db".to_string());
        let entries = vec![(
            "db".to_string(),
            ReportEntry::new(Outcome::healthy("ok"), tags),
        )];
        let report = Report::new("run-7", 5, entries, Duration::from_millis(30));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["run_id"], "run-7");
        assert_eq!(json["status"], "HEALTHY");
        assert_eq!(json["total_elapsed_ms"], 30);
        assert_eq!(json["entries"]["db"]["description"], "ok");
        assert_eq!(json["entries"]["db"]["tags"][0], "db");
    }
}
