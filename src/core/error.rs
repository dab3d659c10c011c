use std::fmt;

/// Lifecycle errors surfaced by [`DeliveryService`](crate::core::service::DeliveryService).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceError {
    /// `start` was called on a service that already left `Created`.
    AlreadyStarted,
    /// `stop` gave up waiting; the delivery loop keeps draining in the background.
    DeadlineExceeded,
    /// The delivery loop went away without signalling completion.
    LoopAborted,
}

impl std::error::Error for ServiceError {}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::AlreadyStarted => write!(f, "Delivery service already started"),
            ServiceError::DeadlineExceeded => {
                write!(f, "Shutdown deadline exceeded before the delivery loop finished")
            }
            ServiceError::LoopAborted => write!(f, "Delivery loop terminated unexpectedly"),
        }
    }
}

/// Failure reported by a [`RemoteWriter`](crate::core::writer::RemoteWriter).
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("rejected by sink: {0}")]
    Rejected(String),
}

impl DeliveryError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        DeliveryError::Rejected(reason.into())
    }
}
