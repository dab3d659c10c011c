//! logbatch – bounded, time- and size-triggered batching of log records.
//!
//! This crate exports
//!  * `core`    – records, admission gate, batching, delivery loop, lifecycle
//!  * `config`  – TOML-driven runtime configuration
//!  * `logging` – tracing subscriber for internal diagnostics
//!  * `metrics` – per-service counters
//!
//! Producers either call [`DeliveryService::admit`] directly or go through
//! the `log` facade by installing a [`LogHook`].

// ───────────────────────────────────────────────────────────
// Public modules
// ───────────────────────────────────────────────────────────
pub mod config;
pub mod core;
pub mod logging;
pub mod metrics;

// ───────────────────────────────────────────────────────────
// Re-exports
// ───────────────────────────────────────────────────────────
pub use crate::config::{load_config, Config};
pub use crate::core::admission::Admission;
pub use crate::core::converter::{Converter, FieldConverter};
pub use crate::core::error::{DeliveryError, ServiceError};
pub use crate::core::hook::LogHook;
pub use crate::core::record::Record;
pub use crate::core::service::{DeliveryService, ServiceConfig};
pub use crate::core::state::ServiceState;
pub use crate::core::writer::{JsonLinesWriter, RemoteWriter};
