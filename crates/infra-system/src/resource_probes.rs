// Host resource probes (CPU, memory, disk)
// reason: sysinfo for cross-platform system monitoring
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::{Disks, System};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use vigil_core::domain::{DomainError, HealthStatus, Outcome, ProbeError};
use vigil_core::port::Probe;

/// Gap between the two CPU samples a usage reading needs
const CPU_SAMPLE_INTERVAL: Duration = Duration::from_millis(250);

/// Usage percentages above which a resource reports degraded / unhealthy
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Thresholds {
    pub degraded_above: f32,
    pub unhealthy_above: f32,
}

impl Thresholds {
    pub fn new(degraded_above: f32, unhealthy_above: f32) -> Result<Self, DomainError> {
        let thresholds = Self {
            degraded_above,
            unhealthy_above,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let in_range = |v: f32| (0.0..=100.0).contains(&v);
        if !in_range(self.degraded_above) || !in_range(self.unhealthy_above) {
            return Err(DomainError::ValidationError(
                "thresholds must be percentages between 0 and 100".to_string(),
            ));
        }
        if self.degraded_above > self.unhealthy_above {
            return Err(DomainError::ValidationError(format!(
                "degraded_above ({}) must not exceed unhealthy_above ({})",
                self.degraded_above, self.unhealthy_above
            )));
        }
        Ok(())
    }

    pub fn classify(&self, percent: f32) -> HealthStatus {
        if percent > self.unhealthy_above {
            HealthStatus::Unhealthy
        } else if percent > self.degraded_above {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            degraded_above: 80.0,
            unhealthy_above: 95.0,
        }
    }
}

/// Run a blocking sysinfo read off the async workers, abandoning it on cancel
async fn sample<T, F>(cancel: &CancellationToken, read: F) -> Result<T, ProbeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProbeError> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(read);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProbeError::Cancelled),
        joined = handle => joined.map_err(|e| ProbeError::Other(format!("sampling task failed: {}", e)))?,
    }
}

fn usage_outcome(resource: &str, percent: f32, thresholds: &Thresholds) -> Outcome {
    let status = thresholds.classify(percent);
    Outcome::new(status, format!("{} usage {:.1}%", resource, percent))
        .with_data("usage_percent", f64::from(percent))
        .with_data("degraded_above", f64::from(thresholds.degraded_above))
        .with_data("unhealthy_above", f64::from(thresholds.unhealthy_above))
}

fn lock_system(system: &Mutex<System>) -> std::sync::MutexGuard<'_, System> {
    system.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Global CPU usage across all cores
///
/// Keeps one `System` across runs; each evaluation takes two samples
/// `CPU_SAMPLE_INTERVAL` apart.
pub struct CpuProbe {
    system: Arc<Mutex<System>>,
    thresholds: Thresholds,
}

impl CpuProbe {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
            thresholds,
        }
    }
}

#[async_trait]
impl Probe for CpuProbe {
    async fn evaluate(&self, cancel: CancellationToken) -> Result<Outcome, ProbeError> {
        let system = Arc::clone(&self.system);
        sample(&cancel, move || {
            lock_system(&system).refresh_cpu();
            Ok(())
        })
        .await?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProbeError::Cancelled),
            _ = tokio::time::sleep(CPU_SAMPLE_INTERVAL) => {}
        }

        let system = Arc::clone(&self.system);
        let percent = sample(&cancel, move || {
            let mut sys = lock_system(&system);
            sys.refresh_cpu();
            Ok(sys.global_cpu_info().cpu_usage())
        })
        .await?;

        debug!(cpu = %percent, "CPU usage sampled");
        Ok(usage_outcome("cpu", percent, &self.thresholds))
    }
}

/// Physical memory usage
pub struct MemoryProbe {
    thresholds: Thresholds,
}

impl MemoryProbe {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }
}

#[async_trait]
impl Probe for MemoryProbe {
    async fn evaluate(&self, cancel: CancellationToken) -> Result<Outcome, ProbeError> {
        let (used, total) = sample(&cancel, || {
            let mut sys = System::new();
            sys.refresh_memory();
            Ok((sys.used_memory(), sys.total_memory()))
        })
        .await?;

        if total == 0 {
            return Err(ProbeError::Other("total memory reported as zero".to_string()));
        }

        let percent = (used as f64 / total as f64 * 100.0) as f32;
        debug!(mem_used_mb = used / 1024 / 1024, mem_total_mb = total / 1024 / 1024, "Memory usage sampled");

        Ok(usage_outcome("memory", percent, &self.thresholds)
            .with_data("used_mb", used / 1024 / 1024)
            .with_data("total_mb", total / 1024 / 1024))
    }
}

/// Space usage of the filesystem mounted at `mount_point`
pub struct DiskProbe {
    mount_point: PathBuf,
    thresholds: Thresholds,
}

impl DiskProbe {
    pub fn new(mount_point: impl Into<PathBuf>, thresholds: Thresholds) -> Self {
        Self {
            mount_point: mount_point.into(),
            thresholds,
        }
    }
}

#[async_trait]
impl Probe for DiskProbe {
    async fn evaluate(&self, cancel: CancellationToken) -> Result<Outcome, ProbeError> {
        let mount_point = self.mount_point.clone();
        let (available, total) = sample(&cancel, move || {
            let disks = Disks::new_with_refreshed_list();
            disks
                .iter()
                .find(|disk| disk.mount_point() == mount_point)
                .map(|disk| (disk.available_space(), disk.total_space()))
                .ok_or_else(|| {
                    ProbeError::Config(format!("no disk mounted at {}", mount_point.display()))
                })
        })
        .await?;

        if total == 0 {
            return Err(ProbeError::Other(format!(
                "disk at {} reports zero capacity",
                self.mount_point.display()
            )));
        }

        let used = total.saturating_sub(available);
        let percent = (used as f64 / total as f64 * 100.0) as f32;
        debug!(mount = %self.mount_point.display(), disk_used_gb = used / 1024 / 1024 / 1024, "Disk usage sampled");

        Ok(usage_outcome("disk", percent, &self.thresholds)
            .with_data("mount_point", self.mount_point.display().to_string())
            .with_data("available_gb", available / 1024 / 1024 / 1024)
            .with_data("total_gb", total / 1024 / 1024 / 1024))
    }
}
