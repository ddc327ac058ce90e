// Probe support - building blocks owned by individual probes, not the engine

pub mod connection_cache;
pub mod latch;

pub use connection_cache::ConnectionCache;
pub use latch::{HealthyLatch, LatchedProbe};
