// Probe and publisher catalog: declarative specs -> live instances
// reason: serde tagged enums so an unknown `kind` fails at load time
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use vigil_core::application::constants::{
    DEFAULT_RETRY_BACKOFF_FACTOR, DEFAULT_RETRY_BASE_DELAY, DEFAULT_RETRY_MAX_ATTEMPTS,
};
use vigil_core::application::{LatchedProbe, RegistrationTable, RetryPolicy};
use vigil_core::domain::{FailureSeverity, ProbeError, Registration};
use vigil_core::port::{Probe, Publisher};
use vigil_core::{AppError, Result};

use crate::command_probe::CommandProbe;
use crate::http_probe::{HttpClientCache, HttpProbe};
use crate::publishers::{LogPublisher, WebhookPublisher, DEFAULT_WEBHOOK_TIMEOUT};
use crate::resource_probes::{CpuProbe, DiskProbe, MemoryProbe, Thresholds};
use crate::tcp_probe::TcpProbe;

fn default_attempts() -> u32 {
    DEFAULT_RETRY_MAX_ATTEMPTS
}

fn default_env_allowlist() -> Vec<String> {
    vec!["PATH".to_string(), "HOME".to_string()]
}

fn default_degraded_above() -> f32 {
    Thresholds::default().degraded_above
}

fn default_unhealthy_above() -> f32 {
    Thresholds::default().unhealthy_above
}

fn default_mount() -> PathBuf {
    PathBuf::from("/")
}

/// One `[[probes]]` entry
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeSpec {
    pub name: String,
    /// Per-probe timeout; 0 inherits the run's cancellation only
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub failure_severity: FailureSeverity,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Stop re-running once the probe has reported healthy
    #[serde(default)]
    pub latched: bool,
    #[serde(flatten)]
    pub kind: ProbeKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeKind {
    Tcp {
        host: String,
        port: u16,
        #[serde(default = "default_attempts")]
        attempts: u32,
        connect_timeout_ms: Option<u64>,
    },
    Http {
        url: String,
        expected_status: Option<u16>,
        degraded_after_ms: Option<u64>,
    },
    Command {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        /// `NAME=value` pairs, subject to the allowlist
        #[serde(default)]
        env: Vec<String>,
        #[serde(default = "default_env_allowlist")]
        env_allowlist: Vec<String>,
        working_dir: Option<PathBuf>,
    },
    Cpu {
        #[serde(default = "default_degraded_above")]
        degraded_above: f32,
        #[serde(default = "default_unhealthy_above")]
        unhealthy_above: f32,
    },
    Memory {
        #[serde(default = "default_degraded_above")]
        degraded_above: f32,
        #[serde(default = "default_unhealthy_above")]
        unhealthy_above: f32,
    },
    Disk {
        #[serde(default = "default_mount")]
        mount: PathBuf,
        #[serde(default = "default_degraded_above")]
        degraded_above: f32,
        #[serde(default = "default_unhealthy_above")]
        unhealthy_above: f32,
    },
}

/// One `[[publishers]]` entry
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublisherSpec {
    Log {
        name: Option<String>,
    },
    Webhook {
        name: Option<String>,
        url: String,
        timeout_ms: Option<u64>,
    },
}

fn config_error(name: &str, err: ProbeError) -> AppError {
    AppError::Config(format!("probe '{}': {}", name, err))
}

fn parse_env(name: &str, pairs: &[String]) -> Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| {
                    AppError::Config(format!("probe '{}': env entry '{}' is not NAME=value", name, pair))
                })
        })
        .collect()
}

fn finish<P: Probe + 'static>(probe: P, latched: bool) -> Arc<dyn Probe> {
    if latched {
        Arc::new(LatchedProbe::new(probe))
    } else {
        Arc::new(probe)
    }
}

/// Builds probes and publishers from their specs
///
/// HTTP probes built by one catalog share a client cache.
#[derive(Default)]
pub struct Catalog {
    http_clients: Arc<HttpClientCache>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build_probe(&self, spec: &ProbeSpec) -> Result<Arc<dyn Probe>> {
        let probe = match &spec.kind {
            ProbeKind::Tcp {
                host,
                port,
                attempts,
                connect_timeout_ms,
            } => {
                let retry = RetryPolicy::new(*attempts, DEFAULT_RETRY_BASE_DELAY, DEFAULT_RETRY_BACKOFF_FACTOR);
                let mut probe = TcpProbe::new(host, *port).with_retry(retry);
                if let Some(ms) = connect_timeout_ms {
                    probe = probe.with_connect_timeout(Duration::from_millis(*ms));
                }
                finish(probe, spec.latched)
            }
            ProbeKind::Http {
                url,
                expected_status,
                degraded_after_ms,
            } => {
                let mut probe = HttpProbe::new(url, Arc::clone(&self.http_clients))
                    .map_err(|e| config_error(&spec.name, e))?;
                if let Some(status) = expected_status {
                    probe = probe.with_expected_status(*status);
                }
                if let Some(ms) = degraded_after_ms {
                    probe = probe.with_degraded_after(Duration::from_millis(*ms));
                }
                finish(probe, spec.latched)
            }
            ProbeKind::Command {
                command,
                args,
                env,
                env_allowlist,
                working_dir,
            } => {
                let mut probe = CommandProbe::new(command, args.clone())
                    .with_env(parse_env(&spec.name, env)?)
                    .with_env_allowlist(env_allowlist.clone());
                if let Some(dir) = working_dir {
                    probe = probe.with_working_dir(dir);
                }
                finish(probe, spec.latched)
            }
            ProbeKind::Cpu {
                degraded_above,
                unhealthy_above,
            } => {
                let thresholds = Thresholds::new(*degraded_above, *unhealthy_above)?;
                finish(CpuProbe::new(thresholds), spec.latched)
            }
            ProbeKind::Memory {
                degraded_above,
                unhealthy_above,
            } => {
                let thresholds = Thresholds::new(*degraded_above, *unhealthy_above)?;
                finish(MemoryProbe::new(thresholds), spec.latched)
            }
            ProbeKind::Disk {
                mount,
                degraded_above,
                unhealthy_above,
            } => {
                let thresholds = Thresholds::new(*degraded_above, *unhealthy_above)?;
                finish(DiskProbe::new(mount, thresholds), spec.latched)
            }
        };
        Ok(probe)
    }

    pub fn build_registration(&self, spec: &ProbeSpec) -> Result<Registration> {
        let probe = self.build_probe(spec)?;
        Ok(Registration::new(&spec.name, probe)?
            .with_failure_severity(spec.failure_severity)
            .with_timeout(Duration::from_millis(spec.timeout_ms))
            .with_tags(spec.tags.iter().cloned()))
    }

    /// Build a table holding every spec
    ///
    /// # Errors
    /// - AppError::Config / AppError::Domain for an invalid spec
    /// - AppError::DuplicateRegistration for a repeated name
    pub fn build_registry(&self, specs: &[ProbeSpec]) -> Result<RegistrationTable> {
        let mut table = RegistrationTable::new();
        for spec in specs {
            table.register(self.build_registration(spec)?)?;
        }
        info!(count = table.len(), "Probe registry built");
        Ok(table)
    }

    pub fn build_publisher(&self, spec: &PublisherSpec) -> Result<Arc<dyn Publisher>> {
        let publisher: Arc<dyn Publisher> = match spec {
            PublisherSpec::Log { name } => {
                Arc::new(LogPublisher::new(name.clone().unwrap_or_else(|| "log".to_string())))
            }
            PublisherSpec::Webhook {
                name,
                url,
                timeout_ms,
            } => {
                let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(DEFAULT_WEBHOOK_TIMEOUT);
                let name = name.clone().unwrap_or_else(|| "webhook".to_string());
                let publisher = WebhookPublisher::new(name, url, timeout)
                    .map_err(|e| AppError::Config(format!("publisher '{}': {}", url, e)))?;
                Arc::new(publisher)
            }
        };
        Ok(publisher)
    }

    pub fn build_publishers(&self, specs: &[PublisherSpec]) -> Result<Vec<Arc<dyn Publisher>>> {
        specs.iter().map(|spec| self.build_publisher(spec)).collect()
    }
}
