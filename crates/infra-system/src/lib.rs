// Vigil Infrastructure - System Adapters
// Implements: Probe (tcp, http, command, cpu, memory, disk), Publisher (log, webhook)

pub mod catalog;
pub mod command_probe;
pub mod http_probe;
pub mod publishers;
pub mod resource_probes;
pub mod settings;
pub mod tcp_probe;

pub use catalog::{Catalog, ProbeKind, ProbeSpec, PublisherSpec};
pub use command_probe::CommandProbe;
pub use http_probe::{HttpClientCache, HttpProbe};
pub use publishers::{LogPublisher, WebhookPublisher};
pub use resource_probes::{CpuProbe, DiskProbe, MemoryProbe, Thresholds};
pub use settings::{SchedulerSettings, Settings};
pub use tcp_probe::TcpProbe;
