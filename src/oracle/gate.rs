use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;
use crate::core::error::{Error, ErrorKind, Result};

/// Admission control for outbound oracle calls.
///
/// At most `capacity` calls run at once; a request arriving when every
/// slot is taken is refused immediately, never queued.
pub struct ConcurrencyGate {
    permits: Arc<Semaphore>,
    capacity: usize,
    admitted: AtomicU64,
    rejected: AtomicU64,
}

/// Slot held for the duration of one oracle call. Dropping it, including
/// when the owning future is cancelled, frees the slot.
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GateStats {
    pub capacity: usize,
    pub in_flight: usize,
    pub admitted: u64,
    pub rejected: u64,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        ConcurrencyGate {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
            admitted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn try_admit(&self) -> Result<GatePermit> {
        match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => {
                self.admitted.fetch_add(1, Ordering::Relaxed);
                debug!(in_flight = self.in_flight(), capacity = self.capacity, "oracle call admitted");
                Ok(GatePermit { _permit: permit })
            }
            Err(_) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(capacity = self.capacity, "oracle call rejected, gate full");
                Err(Error::new(
                    ErrorKind::ServiceOverloaded,
                    format!("all {} validation slots busy", self.capacity),
                ))
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    pub fn is_saturated(&self) -> bool {
        self.permits.available_permits() == 0
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            capacity: self.capacity,
            in_flight: self.in_flight(),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}
