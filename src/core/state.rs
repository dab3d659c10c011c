//! Service lifecycle state shared between producers, the lifecycle
//! controller and the delivery loop.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// `Created → Running → Stopping → Stopped`. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceState {
    Created = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl ServiceState {
    #[inline]
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ServiceState::Created,
            1 => ServiceState::Running,
            2 => ServiceState::Stopping,
            _ => ServiceState::Stopped,
        }
    }

    /// Admissions are rejected once shutdown has begun.
    #[inline]
    pub fn rejects_admission(self) -> bool {
        matches!(self, ServiceState::Stopping | ServiceState::Stopped)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Created => "created",
            ServiceState::Running => "running",
            ServiceState::Stopping => "stopping",
            ServiceState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Atomic cell holding a [`ServiceState`].
///
/// Transitions use acquire/release so a producer that observes `Stopping`
/// also observes everything the stopping thread did before publishing it.
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(ServiceState::Created as u8))
    }

    #[inline]
    pub fn load(&self) -> ServiceState {
        ServiceState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `from → to` if the cell currently holds `from`. Returns whether this caller won.
    #[inline]
    pub fn transition(&self, from: ServiceState, to: ServiceState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
