//! `log` facade integration.
//!
//! [`LogHook`] is a `log::Log` implementation that converts every enabled
//! record and admits it into a [`DeliveryService`]. It never blocks the
//! caller longer than the admission timeout and never panics into the host.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use log::{LevelFilter, Log, Metadata, SetLoggerError};
use tracing::{error, trace};

use crate::core::admission::Admission;
use crate::core::converter::Converter;
use crate::core::error::ServiceError;
use crate::core::service::DeliveryService;
use crate::metrics::StatsSnapshot;

/// `log::Log` adapter feeding a [`DeliveryService`].
///
/// `log` calls the blocking [`DeliveryService::admit`] on the logging
/// thread. On a current-thread tokio runtime the delivery loop cannot run
/// while that thread waits, so a full queue makes every such call wait out
/// the whole admission timeout. Log from a multi-thread runtime or from
/// `spawn_blocking` threads when the queue may fill up.
#[derive(Clone)]
pub struct LogHook {
    service: Arc<DeliveryService>,
    converter: Arc<dyn Converter>,
    max_level: LevelFilter,
    timeout: Duration,
}

impl LogHook {
    /// Uses the service's configured admission timeout.
    pub fn new<C: Converter>(service: Arc<DeliveryService>, converter: C, max_level: LevelFilter) -> Self {
        let timeout = service.config().admission_timeout;
        Self {
            service,
            converter: Arc::new(converter),
            max_level,
            timeout,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[inline]
    pub fn max_level(&self) -> LevelFilter {
        self.max_level
    }

    pub fn service(&self) -> &Arc<DeliveryService> {
        &self.service
    }

    /// Registers a clone of this hook as the global `log` logger.
    pub fn install(&self) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(self.clone()))?;
        log::set_max_level(self.max_level);
        Ok(())
    }

    /// Converts and admits one host record. Dropped records are not reported to the caller.
    pub fn fire(&self, record: &log::Record<'_>) -> Option<Admission> {
        let converted = match panic::catch_unwind(AssertUnwindSafe(|| self.converter.convert(record))) {
            Ok(converted) => converted,
            Err(cause) => {
                error!(
                    target_module = record.target(),
                    panic = panic_message(cause.as_ref()),
                    "recovered from panic while converting log record"
                );
                return None;
            }
        };

        let outcome = self.service.admit(converted, self.timeout);
        if outcome != Admission::Queued {
            trace!(outcome = ?outcome, "log record dropped");
        }
        Some(outcome)
    }

    /// Stops the underlying service, waiting up to `timeout` for the final flush.
    pub async fn close(&self, timeout: Duration) -> Result<(), ServiceError> {
        self.service.stop(timeout).await
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.service.stats()
    }
}

impl Log for LogHook {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            let _ = self.fire(record);
        }
    }

    // Delivery is time- and size-driven; there is nothing to flush synchronously.
    fn flush(&self) {}
}

impl std::fmt::Debug for LogHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogHook")
            .field("service", &self.service)
            .field("max_level", &self.max_level)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = cause.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = cause.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
